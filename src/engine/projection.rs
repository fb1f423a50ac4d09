use crate::geo::{clamp_lat, wrap_lon, LngLat};
use glam::DVec2;
use std::f64::consts::PI;

/// World size in pixels at zoom 0
pub const TILE_SIZE: f64 = 512.0;

/// Equatorial circumference in meters
const EARTH_CIRCUMFERENCE_M: f64 = 40_075_016.686;

/// Web mercator: lon/lat to normalized world coordinates in [0, 1]
#[inline(always)]
pub fn mercator(c: LngLat) -> DVec2 {
    let x = (c.lon + 180.0) / 360.0;
    let lat_rad = clamp_lat(c.lat) * PI / 180.0;
    let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0;
    DVec2::new(x, y)
}

/// Inverse web mercator
#[inline(always)]
pub fn inverse_mercator(p: DVec2) -> LngLat {
    let lon = p.x * 360.0 - 180.0;
    let lat_rad = (PI * (1.0 - 2.0 * p.y)).sinh().atan();
    LngLat::new(lon, lat_rad * 180.0 / PI)
}

/// Visible map area: camera center and zoom plus the canvas size in pixels
#[derive(Clone, Debug)]
pub struct Viewport {
    pub center: LngLat,
    /// Tile zoom level (world is `TILE_SIZE * 2^zoom` pixels wide)
    pub zoom: f64,
    pub width: f64,
    pub height: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
}

impl Viewport {
    pub fn new(center: LngLat, zoom: f64, width: f64, height: f64) -> Self {
        Self {
            center,
            zoom,
            width,
            height,
            min_zoom: 0.0,
            max_zoom: 22.0,
        }
    }

    pub fn with_zoom_range(mut self, min_zoom: f64, max_zoom: f64) -> Self {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        self.zoom = self.zoom.clamp(min_zoom, max_zoom);
        self
    }

    #[inline(always)]
    pub fn world_size(&self) -> f64 {
        TILE_SIZE * 2f64.powf(self.zoom)
    }

    /// Project a geographic coordinate to screen pixels
    pub fn project(&self, c: LngLat) -> DVec2 {
        self.project_world(mercator(c))
    }

    /// Project a normalized world coordinate to screen pixels
    #[inline(always)]
    pub fn project_world(&self, p: DVec2) -> DVec2 {
        let center = mercator(self.center);
        (p - center) * self.world_size() + DVec2::new(self.width / 2.0, self.height / 2.0)
    }

    /// Screen pixels back to a geographic coordinate
    pub fn unproject(&self, px: DVec2) -> LngLat {
        let center = mercator(self.center);
        let p = (px - DVec2::new(self.width / 2.0, self.height / 2.0)) / self.world_size() + center;
        inverse_mercator(p)
    }

    /// Pan the viewport by a pixel delta
    pub fn pan(&mut self, dx: f64, dy: f64) {
        let moved = self.unproject(DVec2::new(self.width / 2.0 + dx, self.height / 2.0 + dy));
        self.center = LngLat::new(wrap_lon(moved.lon), clamp_lat(moved.lat));
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom.clamp(self.min_zoom, self.max_zoom);
    }

    /// Zoom by `delta` levels keeping the point under `anchor` fixed
    pub fn zoom_at(&mut self, anchor: DVec2, delta: f64) {
        let geo = self.unproject(anchor);
        self.set_zoom(self.zoom + delta);
        let moved = self.project(geo);
        self.pan(moved.x - anchor.x, moved.y - anchor.y);
    }

    /// Check if a projected point is on screen, with a margin in pixels
    pub fn is_visible(&self, p: DVec2, margin: f64) -> bool {
        p.x >= -margin && p.x < self.width + margin && p.y >= -margin && p.y < self.height + margin
    }

    /// Ground resolution at the camera center
    pub fn meters_per_pixel(&self) -> f64 {
        EARTH_CIRCUMFERENCE_M * (self.center.lat * PI / 180.0).cos() / self.world_size()
    }
}
