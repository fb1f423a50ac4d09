//! Test host: the terminal engine wrapped with failure injection and a log
//! of what was still registered when the host was released.

#![allow(dead_code)]

use geopol_map::config::{StyleConfig, ViewState};
use geopol_map::engine::Engine;
use geopol_map::error::HostError;
use geopol_map::host::{
    CameraTarget, CircleLayer, Container, Control, ControlId, ControlPosition, Cursor,
    GeoJsonSource, HostEvent, HostFactory, ListenerId, MapHost, Overlay, PointerEventKind,
    PopupId, RenderedFeature, RequestId, ScreenPoint,
};
use geopol_map::{Category, Feature, FeatureCollection, LngLat, MapConfig, MapView};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

#[derive(Default)]
pub struct HostLog {
    /// Upcoming `add_layer` calls that fail
    pub fail_add_layer: usize,
    pub add_layer_calls: usize,
    /// (layers, sources) present when `remove` was first called
    pub at_removal: Option<(Vec<String>, Vec<String>)>,
    pub remove_calls: usize,
    /// Events appended to the next `poll_events`
    pub inject: VecDeque<HostEvent>,
}

pub struct FlakyHost {
    pub inner: Engine,
    log: Rc<RefCell<HostLog>>,
}

#[derive(Clone, Default)]
pub struct FlakyFactory {
    pub log: Rc<RefCell<HostLog>>,
}

impl HostFactory for FlakyFactory {
    type Host = FlakyHost;

    fn create(
        &mut self,
        container: &Container,
        style: &StyleConfig,
        view: &ViewState,
    ) -> Result<FlakyHost, HostError> {
        Ok(FlakyHost {
            inner: Engine::new(container, style, view)?,
            log: self.log.clone(),
        })
    }
}

impl FlakyHost {
    /// Click the spot where `coordinate` is drawn
    pub fn click_at(&mut self, coordinate: LngLat) {
        let p = self.inner.viewport().project(coordinate);
        self.inner.click(ScreenPoint::new(p.x, p.y));
    }
}

impl MapHost for FlakyHost {
    fn is_style_loaded(&self) -> bool {
        self.inner.is_style_loaded()
    }

    fn add_control(&mut self, control: Control, position: ControlPosition) -> ControlId {
        self.inner.add_control(control, position)
    }

    fn remove_control(&mut self, control: ControlId) {
        self.inner.remove_control(control)
    }

    fn add_source(&mut self, id: &str, source: GeoJsonSource) -> Result<(), HostError> {
        self.inner.add_source(id, source)
    }

    fn remove_source(&mut self, id: &str) -> Result<(), HostError> {
        self.inner.remove_source(id)
    }

    fn has_source(&self, id: &str) -> bool {
        self.inner.has_source(id)
    }

    fn source_ids(&self) -> Vec<String> {
        self.inner.source_ids()
    }

    fn add_layer(&mut self, layer: CircleLayer) -> Result<(), HostError> {
        let mut log = self.log.borrow_mut();
        log.add_layer_calls += 1;
        if log.fail_add_layer > 0 {
            log.fail_add_layer -= 1;
            return Err(HostError::DuplicateLayer(layer.id));
        }
        drop(log);
        self.inner.add_layer(layer)
    }

    fn remove_layer(&mut self, id: &str) -> Result<(), HostError> {
        self.inner.remove_layer(id)
    }

    fn has_layer(&self, id: &str) -> bool {
        self.inner.has_layer(id)
    }

    fn layer_ids(&self) -> Vec<String> {
        self.inner.layer_ids()
    }

    fn on(&mut self, kind: PointerEventKind, layer_id: &str) -> ListenerId {
        self.inner.on(kind, layer_id)
    }

    fn off(&mut self, listener: ListenerId) {
        self.inner.off(listener)
    }

    fn query_rendered_features(
        &self,
        point: Option<ScreenPoint>,
        layers: &[&str],
    ) -> Vec<RenderedFeature> {
        self.inner.query_rendered_features(point, layers)
    }

    fn request_cluster_expansion_zoom(&mut self, source_id: &str, cluster_id: u64) -> RequestId {
        self.inner.request_cluster_expansion_zoom(source_id, cluster_id)
    }

    fn camera(&self) -> ViewState {
        self.inner.camera()
    }

    fn ease_to(&mut self, target: CameraTarget) {
        self.inner.ease_to(target)
    }

    fn set_cursor(&mut self, cursor: Cursor) {
        self.inner.set_cursor(cursor)
    }

    fn open_popup(&mut self, overlay: &Overlay) -> PopupId {
        self.inner.open_popup(overlay)
    }

    fn close_popup(&mut self, popup: PopupId) {
        self.inner.close_popup(popup)
    }

    fn poll_events(&mut self) -> Vec<HostEvent> {
        let mut events = self.inner.poll_events();
        events.extend(self.log.borrow_mut().inject.drain(..));
        events
    }

    fn remove(&mut self) {
        let mut log = self.log.borrow_mut();
        log.remove_calls += 1;
        if log.at_removal.is_none() {
            log.at_removal = Some((self.inner.layer_ids(), self.inner.source_ids()));
        }
        drop(log);
        self.inner.remove()
    }
}

pub fn station(id: &str, lon: f64, lat: f64) -> Feature {
    Feature::new(
        id,
        format!("Revier {id}"),
        "Teststraße 1",
        Category::Station,
        "0711 1",
        LngLat::new(lon, lat),
    )
}

pub type Log = Rc<RefCell<HostLog>>;

/// A view mounted on a flaky host, not yet pumped
pub fn mount_on(
    config: MapConfig,
    features: FeatureCollection,
    container: Container,
) -> (MapView<FlakyFactory>, Log) {
    let factory = FlakyFactory::default();
    let log = factory.log.clone();
    let mut view = MapView::new(factory, config, features);
    view.mount(container).expect("mount");
    (view, log)
}

pub fn mounted(config: MapConfig, features: FeatureCollection) -> (MapView<FlakyFactory>, Log) {
    mount_on(config, features, Container::new("map", 800, 600))
}

/// Mounted and pumped until ready
pub fn ready(config: MapConfig, features: FeatureCollection) -> (MapView<FlakyFactory>, Log) {
    let (mut view, log) = mounted(config, features);
    view.pump();
    assert!(view.load_state().is_ready(), "state: {}", view.load_state());
    (view, log)
}
