use geopol_map::engine::renderer::{CELL_HEIGHT_PX, CELL_WIDTH_PX};
use geopol_map::engine::{Engine, EngineFactory};
use geopol_map::host::{Container, ScreenPoint};
use geopol_map::{FeatureCollection, LoadState, MapConfig, MapView, ViewEvent};
use tracing::{debug, warn};

/// Application state
pub struct App {
    pub view: MapView<EngineFactory>,
    pub should_quit: bool,
    /// Last mouse position for drag tracking
    pub last_mouse: Option<(u16, u16)>,
    /// Set once a press turned into a drag; a release without it is a click
    dragged: bool,
    /// Current mouse position for cursor marker
    pub mouse_pos: Option<(u16, u16)>,
    /// Transient message for the status bar
    pub notice: Option<String>,
}

/// Map area inside the border and above the status bar, in cells
fn map_cells(width: usize, height: usize) -> (u32, u32) {
    (width.saturating_sub(2) as u32, height.saturating_sub(3) as u32)
}

impl App {
    pub fn new(config: MapConfig, features: FeatureCollection, width: usize, height: usize) -> Self {
        let mut app = Self {
            view: MapView::new(EngineFactory, config, features),
            should_quit: false,
            last_mouse: None,
            dragged: false,
            mouse_pos: None,
            notice: None,
        };
        let (cols, rows) = map_cells(width, height);
        let container = Container::new("map", cols * CELL_WIDTH_PX, rows * CELL_HEIGHT_PX);
        if let Err(e) = app.view.mount(container) {
            warn!(error = %e, "mount failed");
        }
        app
    }

    pub fn engine(&self) -> Option<&Engine> {
        self.view.host()
    }

    fn engine_mut(&mut self) -> Option<&mut Engine> {
        self.view.host_mut()
    }

    /// One event loop turn: drain host events
    pub fn tick(&mut self) {
        for event in self.view.pump() {
            debug!(?event, "view event");
            match event {
                ViewEvent::StateChanged(LoadState::Error(reason)) => {
                    self.notice = Some(reason);
                }
                ViewEvent::CameraEased(target) => {
                    self.notice = Some(format!("zoomed to {:.1}", target.zoom));
                }
                _ => {}
            }
        }
    }

    /// Update the map container when the terminal resizes
    pub fn resize(&mut self, width: usize, height: usize) {
        let (cols, rows) = map_cells(width, height);
        if let Some(engine) = self.engine_mut() {
            engine.resize(cols * CELL_WIDTH_PX, rows * CELL_HEIGHT_PX);
        }
    }

    /// Pan the map by whole cells
    pub fn pan(&mut self, dx: i32, dy: i32) {
        if let Some(engine) = self.engine_mut() {
            engine.pan(
                (dx * CELL_WIDTH_PX as i32) as f64,
                (dy * CELL_HEIGHT_PX as i32) as f64,
            );
        }
    }

    pub fn zoom_in(&mut self) {
        if let Some(engine) = self.engine_mut() {
            engine.zoom_by(1.0);
        }
    }

    pub fn zoom_out(&mut self) {
        if let Some(engine) = self.engine_mut() {
            engine.zoom_by(-1.0);
        }
    }

    /// Zoom towards a terminal column/row
    pub fn zoom_at(&mut self, col: u16, row: u16, delta: f64) {
        let point = Self::screen_point(col, row);
        if let Some(engine) = self.engine_mut() {
            engine.zoom_at(point, delta);
        }
    }

    /// Center of a terminal cell in map pixels (border is one cell)
    fn screen_point(col: u16, row: u16) -> ScreenPoint {
        ScreenPoint::new(
            (col.saturating_sub(1) as f64 + 0.5) * CELL_WIDTH_PX as f64,
            (row.saturating_sub(1) as f64 + 0.5) * CELL_HEIGHT_PX as f64,
        )
    }

    pub fn press(&mut self, col: u16, row: u16) {
        self.last_mouse = Some((col, row));
        self.dragged = false;
    }

    pub fn handle_drag(&mut self, col: u16, row: u16) {
        if let Some((last_x, last_y)) = self.last_mouse {
            let dx = last_x as i32 - col as i32;
            let dy = last_y as i32 - row as i32;
            if dx != 0 || dy != 0 {
                self.dragged = true;
                self.pan(dx, dy);
            }
        }
        self.last_mouse = Some((col, row));
    }

    /// Button released: a click unless the press became a drag
    pub fn release(&mut self, col: u16, row: u16) {
        let was_click = self.last_mouse.is_some() && !self.dragged;
        self.last_mouse = None;
        self.dragged = false;
        if was_click {
            let point = Self::screen_point(col, row);
            if let Some(engine) = self.engine_mut() {
                engine.click(point);
            }
        }
    }

    pub fn set_mouse_pos(&mut self, col: u16, row: u16) {
        self.mouse_pos = Some((col, row));
        let point = Self::screen_point(col, row);
        if let Some(engine) = self.engine_mut() {
            engine.pointer_move(point);
        }
    }

    /// Mouse position as a cell inside the map area
    pub fn mouse_cell(&self) -> Option<(u16, u16)> {
        self.mouse_pos
            .map(|(col, row)| (col.saturating_sub(1), row.saturating_sub(1)))
    }

    pub fn toggle_clustering(&mut self) {
        let mut options = *self.view.cluster_options();
        options.enabled = !options.enabled;
        self.notice = Some(match self.view.set_cluster_options(options) {
            Ok(()) if options.enabled => "clustering on".to_string(),
            Ok(()) => "clustering off".to_string(),
            Err(e) => e.to_string(),
        });
    }

    pub fn close_popup(&mut self) {
        self.view.clear_selection();
    }

    pub fn reinit(&mut self) {
        self.notice = match self.view.reinit() {
            Ok(()) => Some("map re-initialized".to_string()),
            Err(e) => Some(e.to_string()),
        };
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn zoom_level(&self) -> String {
        self.engine()
            .map(|e| format!("{:.1}", e.viewport().zoom))
            .unwrap_or_else(|| "-".to_string())
    }

    pub fn center_coords(&self) -> String {
        let Some(engine) = self.engine() else {
            return String::new();
        };
        let center = engine.viewport().center;
        format!(
            "{:.4}°{}, {:.4}°{}",
            center.lat.abs(),
            if center.lat >= 0.0 { "N" } else { "S" },
            center.lon.abs(),
            if center.lon >= 0.0 { "E" } else { "W" }
        )
    }

    /// Ground distance covered by one terminal cell, for the scale readout
    pub fn scale_label(&self) -> String {
        let Some(engine) = self.engine() else {
            return String::new();
        };
        let meters = engine.viewport().meters_per_pixel() * CELL_WIDTH_PX as f64;
        if meters >= 1000.0 {
            format!("{:.1} km/cell", meters / 1000.0)
        } else {
            format!("{meters:.0} m/cell")
        }
    }
}
