//! In-process host rendering engine.
//!
//! Implements the [`MapHost`] primitives on a web-mercator camera: GeoJSON
//! point sources (optionally clustered), circle layers evaluated through
//! paint expressions, layer-scoped pointer events, deferred cluster lookups
//! and popups. Frames are rasterized onto Braille canvases by [`renderer`].
//!
//! Screen coordinates are CSS-like pixels; the terminal maps one Braille dot
//! to [`renderer::PIXELS_PER_DOT`] of them.

pub mod cluster;
pub mod geometry;
pub mod projection;
pub mod renderer;
pub mod spatial;

use crate::config::{StyleConfig, ViewState};
use crate::error::HostError;
use crate::geo::LngLat;
use crate::host::{
    CameraTarget, CircleLayer, Container, Control, ControlId, ControlPosition, Cursor,
    GeoJsonSource, HostEvent, HostFactory, ListenerId, MapHost, Overlay, PointerEventKind,
    PopupId, RenderedFeature, RequestId, ScreenPoint, CLUSTER_ID, POINT_COUNT,
    POINT_COUNT_ABBREVIATED,
};
use cluster::{abbreviate_count, ClusterIndex};
use geojson::{JsonObject, JsonValue, Value};
use glam::DVec2;
use projection::{inverse_mercator, mercator, Viewport};
use std::collections::{BTreeMap, HashSet, VecDeque};
use tracing::{debug, info, warn};

pub use renderer::{ColorLayer, Frame};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StyleStatus {
    Pending,
    Loaded,
    Failed,
}

struct Leaf {
    position: DVec2,
    coordinate: LngLat,
    properties: JsonObject,
}

struct SourceEntry {
    leaves: Vec<Leaf>,
    index: Option<ClusterIndex>,
}

struct Listener {
    id: ListenerId,
    kind: PointerEventKind,
    layer_id: String,
}

/// A feature of a layer as drawn at the current camera
pub(crate) struct Drawn {
    pub screen: DVec2,
    pub radius: f64,
    pub stroke_width: f64,
    pub fill: String,
    pub stroke: String,
    pub label: Option<String>,
    pub feature: RenderedFeature,
}

pub struct Engine {
    container_id: String,
    style: StyleConfig,
    style_status: StyleStatus,
    viewport: Viewport,
    pitch: Option<f64>,
    bearing: Option<f64>,
    sources: BTreeMap<String, SourceEntry>,
    layers: Vec<CircleLayer>,
    listeners: Vec<Listener>,
    hovered: HashSet<String>,
    controls: Vec<(ControlId, Control, ControlPosition)>,
    popups: Vec<(PopupId, Overlay)>,
    cursor: Cursor,
    events: VecDeque<HostEvent>,
    next_id: u64,
    removed: bool,
}

impl Engine {
    /// Construct an engine; the style finishes loading on the first `poll_events`
    pub fn new(container: &Container, style: &StyleConfig, view: &ViewState) -> Result<Self, HostError> {
        if !container.is_available() {
            return Err(HostError::ContainerUnavailable(container.id.clone()));
        }
        if style.tiles.is_empty() {
            return Err(HostError::InvalidStyle("style has no tile sources".into()));
        }
        if style.tile_size == 0 || style.min_zoom > style.max_zoom {
            return Err(HostError::InvalidStyle(format!(
                "tile_size {} with zoom range {}..{}",
                style.tile_size, style.min_zoom, style.max_zoom
            )));
        }

        let viewport = Viewport::new(
            view.center,
            view.zoom,
            container.width as f64,
            container.height as f64,
        )
        .with_zoom_range(style.min_zoom as f64, style.max_zoom as f64);

        info!(container = %container.id, zoom = view.zoom, "engine created");
        Ok(Self {
            container_id: container.id.clone(),
            style: style.clone(),
            style_status: StyleStatus::Pending,
            viewport,
            pitch: view.pitch,
            bearing: view.bearing,
            sources: BTreeMap::new(),
            layers: Vec::new(),
            listeners: Vec::new(),
            hovered: HashSet::new(),
            controls: Vec::new(),
            popups: Vec::new(),
            cursor: Cursor::Default,
            events: VecDeque::new(),
            next_id: 1,
            removed: false,
        })
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Resolve the pending style load
    fn finish_style_load(&mut self) {
        if self.style_status != StyleStatus::Pending {
            return;
        }
        let broken = self.style.tiles.iter().find_map(|template| {
            if !(template.starts_with("https://") || template.starts_with("http://")) {
                return Some(format!("tile source '{template}' is not an http(s) URL"));
            }
            ["{z}", "{x}", "{y}"]
                .iter()
                .find(|placeholder| !template.contains(*placeholder))
                .map(|placeholder| format!("tile source '{template}' lacks {placeholder}"))
        });

        match broken {
            Some(message) => {
                warn!(container = %self.container_id, %message, "style load failed");
                self.style_status = StyleStatus::Failed;
                self.events.push_back(HostEvent::Error { message });
            }
            None => {
                debug!(container = %self.container_id, "style loaded");
                self.style_status = StyleStatus::Loaded;
                self.events.push_back(HostEvent::StyleLoaded);
            }
        }
    }

    /// Report a runtime failure (e.g. tile errors) to the core
    pub fn emit_error(&mut self, message: impl Into<String>) {
        if !self.removed {
            self.events.push_back(HostEvent::Error {
                message: message.into(),
            });
        }
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn attribution(&self) -> Option<&str> {
        self.controls.iter().find_map(|(_, control, _)| match control {
            Control::Attribution { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn control_count(&self) -> usize {
        self.controls.len()
    }

    pub fn open_popups(&self) -> impl Iterator<Item = &Overlay> {
        self.popups.iter().map(|(_, overlay)| overlay)
    }

    /// (kind, layer) of every subscribed listener
    pub fn listeners(&self) -> Vec<(PointerEventKind, String)> {
        self.listeners
            .iter()
            .map(|l| (l.kind, l.layer_id.clone()))
            .collect()
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport.width = width as f64;
        self.viewport.height = height as f64;
    }

    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.viewport.pan(dx, dy);
    }

    pub fn zoom_at(&mut self, point: ScreenPoint, delta: f64) {
        self.viewport.zoom_at(DVec2::new(point.x, point.y), delta);
    }

    pub fn zoom_by(&mut self, delta: f64) {
        self.viewport.set_zoom(self.viewport.zoom + delta);
    }

    /// Pointer click at a screen position
    pub fn click(&mut self, point: ScreenPoint) {
        if self.removed {
            return;
        }

        // close_on_click popups go first, like a click on the map body
        let (closing, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.popups)
            .into_iter()
            .partition(|(_, overlay)| overlay.close_on_click);
        self.popups = kept;
        for (popup, _) in closing {
            self.events.push_back(HostEvent::PopupClosed { popup });
        }

        let targets: Vec<(ListenerId, String)> = self
            .listeners
            .iter()
            .filter(|l| l.kind == PointerEventKind::Click)
            .map(|l| (l.id, l.layer_id.clone()))
            .collect();
        for (listener, layer_id) in targets {
            let features = self.query_rendered_features(Some(point), &[layer_id.as_str()]);
            if !features.is_empty() {
                self.events.push_back(HostEvent::Pointer {
                    listener,
                    kind: PointerEventKind::Click,
                    features,
                });
            }
        }
    }

    /// Pointer moved: emits enter/leave for layers with hover listeners
    pub fn pointer_move(&mut self, point: ScreenPoint) {
        if self.removed {
            return;
        }

        let watched: HashSet<String> = self
            .listeners
            .iter()
            .filter(|l| l.kind != PointerEventKind::Click)
            .map(|l| l.layer_id.clone())
            .collect();

        for layer_id in watched {
            let features = self.query_rendered_features(Some(point), &[layer_id.as_str()]);
            let was_hovered = self.hovered.contains(&layer_id);
            let kind = match (was_hovered, features.is_empty()) {
                (false, false) => PointerEventKind::MouseEnter,
                (true, true) => PointerEventKind::MouseLeave,
                _ => continue,
            };
            if kind == PointerEventKind::MouseEnter {
                self.hovered.insert(layer_id.clone());
            } else {
                self.hovered.remove(&layer_id);
            }

            for l in self.listeners.iter().filter(|l| l.kind == kind && l.layer_id == layer_id) {
                self.events.push_back(HostEvent::Pointer {
                    listener: l.id,
                    kind,
                    features: features.clone(),
                });
            }
        }
    }

    /// Points of a source as rendered at the current zoom
    fn rendered_points(&self, source_id: &str) -> Vec<(DVec2, LngLat, JsonObject)> {
        let Some(source) = self.sources.get(source_id) else {
            return Vec::new();
        };
        let leaf = |l: &Leaf| (l.position, l.coordinate, l.properties.clone());

        match source.index.as_ref().and_then(|index| index.level(self.viewport.zoom)) {
            Some(level) => level
                .iter()
                .map(|point| match point.id {
                    Some(cluster_id) => {
                        let count = point.members.len();
                        let mut props = JsonObject::new();
                        props.insert("cluster".into(), JsonValue::Bool(true));
                        props.insert(CLUSTER_ID.into(), JsonValue::from(cluster_id));
                        props.insert(POINT_COUNT.into(), JsonValue::from(count));
                        props.insert(
                            POINT_COUNT_ABBREVIATED.into(),
                            JsonValue::from(abbreviate_count(count)),
                        );
                        (point.position, inverse_mercator(point.position), props)
                    }
                    None => leaf(&source.leaves[point.members[0]]),
                })
                .collect(),
            None => source.leaves.iter().map(leaf).collect(),
        }
    }

    /// Features of one layer drawn at the current camera, viewport-culled
    pub(crate) fn draw_layer(&self, layer: &CircleLayer) -> Vec<Drawn> {
        self.rendered_points(&layer.source)
            .into_iter()
            .filter(|(_, _, props)| layer.matches(props))
            .filter_map(|(position, coordinate, properties)| {
                let screen = self.viewport.project_world(position);
                let radius = layer.paint.radius.evaluate_f64(&properties).unwrap_or(5.0);
                let stroke_width = layer.paint.stroke_width;
                if !self.viewport.is_visible(screen, radius + stroke_width) {
                    return None;
                }
                let fill = layer
                    .paint
                    .color
                    .evaluate(&properties)
                    .as_str()
                    .unwrap_or("#000000")
                    .to_string();
                let label = properties
                    .get(POINT_COUNT_ABBREVIATED)
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                Some(Drawn {
                    screen,
                    radius,
                    stroke_width,
                    fill,
                    stroke: layer.paint.stroke_color.clone(),
                    label,
                    feature: RenderedFeature {
                        layer_id: layer.id.clone(),
                        source_id: layer.source.clone(),
                        coordinate,
                        properties,
                    },
                })
            })
            .collect()
    }

    /// Layers in drawing order, bottom first
    pub(crate) fn layers(&self) -> &[CircleLayer] {
        &self.layers
    }

    /// Rasterize the current frame onto a `cols` x `rows` character grid
    pub fn render(&self, cols: usize, rows: usize) -> Frame {
        renderer::render(self, cols, rows)
    }
}

impl MapHost for Engine {
    fn is_style_loaded(&self) -> bool {
        self.style_status == StyleStatus::Loaded
    }

    fn add_control(&mut self, control: Control, position: ControlPosition) -> ControlId {
        let id = ControlId(self.next_id());
        self.controls.push((id, control, position));
        id
    }

    fn remove_control(&mut self, control: ControlId) {
        self.controls.retain(|(id, _, _)| *id != control);
    }

    fn add_source(&mut self, id: &str, source: GeoJsonSource) -> Result<(), HostError> {
        if self.removed {
            return Err(HostError::Removed);
        }
        if self.sources.contains_key(id) {
            return Err(HostError::DuplicateSource(id.to_string()));
        }

        let leaves: Vec<Leaf> = source
            .data
            .features
            .iter()
            .filter_map(|feature| match feature.geometry.as_ref().map(|g| &g.value) {
                Some(Value::Point(coords)) if coords.len() >= 2 => {
                    let coordinate = LngLat::new(coords[0], coords[1]);
                    Some(Leaf {
                        position: mercator(coordinate),
                        coordinate,
                        properties: feature.properties.clone().unwrap_or_default(),
                    })
                }
                _ => None,
            })
            .collect();

        let index = source.cluster.then(|| {
            let positions: Vec<DVec2> = leaves.iter().map(|l| l.position).collect();
            ClusterIndex::build(&positions, source.cluster_radius, source.cluster_max_zoom)
        });

        debug!(source = id, points = leaves.len(), clustered = source.cluster, "source added");
        self.sources.insert(id.to_string(), SourceEntry { leaves, index });
        Ok(())
    }

    fn remove_source(&mut self, id: &str) -> Result<(), HostError> {
        if !self.sources.contains_key(id) {
            return Err(HostError::SourceNotFound(id.to_string()));
        }
        let users: Vec<String> = self
            .layers
            .iter()
            .filter(|l| l.source == id)
            .map(|l| l.id.clone())
            .collect();
        if !users.is_empty() {
            return Err(HostError::SourceInUse {
                source_id: id.to_string(),
                layers: users,
            });
        }
        self.sources.remove(id);
        debug!(source = id, "source removed");
        Ok(())
    }

    fn has_source(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    fn source_ids(&self) -> Vec<String> {
        self.sources.keys().cloned().collect()
    }

    fn add_layer(&mut self, layer: CircleLayer) -> Result<(), HostError> {
        if self.removed {
            return Err(HostError::Removed);
        }
        if self.has_layer(&layer.id) {
            return Err(HostError::DuplicateLayer(layer.id));
        }
        if !self.sources.contains_key(&layer.source) {
            return Err(HostError::SourceNotFound(layer.source));
        }
        debug!(layer = %layer.id, source = %layer.source, "layer added");
        self.layers.push(layer);
        Ok(())
    }

    fn remove_layer(&mut self, id: &str) -> Result<(), HostError> {
        let before = self.layers.len();
        self.layers.retain(|l| l.id != id);
        if self.layers.len() == before {
            return Err(HostError::LayerNotFound(id.to_string()));
        }
        self.hovered.remove(id);
        debug!(layer = id, "layer removed");
        Ok(())
    }

    fn has_layer(&self, id: &str) -> bool {
        self.layers.iter().any(|l| l.id == id)
    }

    fn layer_ids(&self) -> Vec<String> {
        self.layers.iter().map(|l| l.id.clone()).collect()
    }

    fn on(&mut self, kind: PointerEventKind, layer_id: &str) -> ListenerId {
        let id = ListenerId(self.next_id());
        self.listeners.push(Listener {
            id,
            kind,
            layer_id: layer_id.to_string(),
        });
        id
    }

    fn off(&mut self, listener: ListenerId) {
        self.listeners.retain(|l| l.id != listener);
    }

    fn query_rendered_features(
        &self,
        point: Option<ScreenPoint>,
        layers: &[&str],
    ) -> Vec<RenderedFeature> {
        let mut hits = Vec::new();
        // Topmost layer first
        for layer in self.layers.iter().rev() {
            if !layers.is_empty() && !layers.contains(&layer.id.as_str()) {
                continue;
            }
            let mut drawn: Vec<(f64, RenderedFeature)> = self
                .draw_layer(layer)
                .into_iter()
                .filter_map(|d| match point {
                    Some(p) => {
                        let distance = d.screen.distance(DVec2::new(p.x, p.y));
                        (distance <= d.radius + d.stroke_width).then_some((distance, d.feature))
                    }
                    None => Some((0.0, d.feature)),
                })
                .collect();
            drawn.sort_by(|a, b| a.0.total_cmp(&b.0));
            hits.extend(drawn.into_iter().map(|(_, f)| f));
        }
        hits
    }

    fn request_cluster_expansion_zoom(&mut self, source_id: &str, cluster_id: u64) -> RequestId {
        let request = RequestId(self.next_id());
        let result = self
            .sources
            .get(source_id)
            .ok_or_else(|| HostError::SourceNotFound(source_id.to_string()))
            .and_then(|s| s.index.as_ref().ok_or(HostError::UnknownCluster(cluster_id)))
            .and_then(|index| index.expansion_zoom(cluster_id))
            .map(f64::from);
        if !self.removed {
            self.events
                .push_back(HostEvent::ClusterExpansionZoom { request, result });
        }
        request
    }

    fn camera(&self) -> ViewState {
        ViewState {
            center: self.viewport.center,
            zoom: self.viewport.zoom,
            pitch: self.pitch,
            bearing: self.bearing,
        }
    }

    fn ease_to(&mut self, target: CameraTarget) {
        debug!(lon = target.center.lon, lat = target.center.lat, zoom = target.zoom, "ease");
        self.viewport.center = target.center;
        self.viewport.set_zoom(target.zoom);
    }

    fn set_cursor(&mut self, cursor: Cursor) {
        self.cursor = cursor;
    }

    fn open_popup(&mut self, overlay: &Overlay) -> PopupId {
        let id = PopupId(self.next_id());
        self.popups.push((id, overlay.clone()));
        id
    }

    fn close_popup(&mut self, popup: PopupId) {
        self.popups.retain(|(id, _)| *id != popup);
    }

    fn poll_events(&mut self) -> Vec<HostEvent> {
        if self.removed {
            return Vec::new();
        }
        self.finish_style_load();
        self.events.drain(..).collect()
    }

    fn remove(&mut self) {
        if self.removed {
            return;
        }
        self.listeners.clear();
        self.hovered.clear();
        self.popups.clear();
        self.layers.clear();
        self.sources.clear();
        self.controls.clear();
        self.events.clear();
        self.cursor = Cursor::Default;
        self.removed = true;
        info!(container = %self.container_id, "engine removed");
    }
}

/// Builds [`Engine`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineFactory;

impl HostFactory for EngineFactory {
    type Host = Engine;

    fn create(
        &mut self,
        container: &Container,
        style: &StyleConfig,
        view: &ViewState,
    ) -> Result<Engine, HostError> {
        Engine::new(container, style, view)
    }
}
