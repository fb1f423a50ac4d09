//! Contract between the map core and a host rendering engine.
//!
//! The host is a black box exposing sources, layers, layer-scoped pointer
//! events, camera control and popups. Asynchronous work (style loading,
//! cluster expansion lookups) completes through [`HostEvent`]s that the core
//! drains with [`MapHost::poll_events`] on its own event loop turn.

pub mod style;

use crate::config::{StyleConfig, ViewState};
use crate::error::HostError;
use crate::geo::LngLat;
use geojson::JsonObject;

pub use style::{parse_hex_color, CircleLayer, CirclePaint, Expr, GeoJsonSource};

/// Property present on every aggregated cluster feature
pub const POINT_COUNT: &str = "point_count";
pub const POINT_COUNT_ABBREVIATED: &str = "point_count_abbreviated";
pub const CLUSTER_ID: &str = "cluster_id";

macro_rules! host_id {
    ($($name:ident),*) => {
        $(
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(pub u64);
        )*
    };
}

host_id!(ListenerId, RequestId, PopupId, ControlId);

/// Element the host renders into
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    pub id: String,
    pub width: u32,
    pub height: u32,
    attached: bool,
}

impl Container {
    pub fn new(id: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            id: id.into(),
            width,
            height,
            attached: true,
        }
    }

    /// Container removed from its document; hosts can no longer be built on it
    pub fn detach(&mut self) {
        self.attached = false;
    }

    pub fn is_available(&self) -> bool {
        self.attached && self.width > 0 && self.height > 0
    }
}

/// Position in screen pixels, origin top-left
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerEventKind {
    Click,
    MouseEnter,
    MouseLeave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cursor {
    #[default]
    Default,
    Pointer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Control {
    Navigation { visualize_pitch: bool },
    Scale { max_width: u32, metric: bool },
    Attribution { compact: bool, text: String },
}

/// Camera ease target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraTarget {
    pub center: LngLat,
    pub zoom: f64,
}

/// A feature as the host rendered it: either a leaf or a cluster
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFeature {
    pub layer_id: String,
    pub source_id: String,
    pub coordinate: LngLat,
    pub properties: JsonObject,
}

impl RenderedFeature {
    /// Clusters are recognised by the aggregate count property
    pub fn is_cluster(&self) -> bool {
        self.properties.contains_key(POINT_COUNT)
    }

    pub fn cluster_id(&self) -> Option<u64> {
        self.properties.get(CLUSTER_ID).and_then(|v| v.as_u64())
    }

    pub fn point_count(&self) -> Option<u64> {
        self.properties.get(POINT_COUNT).and_then(|v| v.as_u64())
    }

    pub fn feature_id(&self) -> Option<&str> {
        self.properties.get("id").and_then(|v| v.as_str())
    }
}

/// Anchored popup content
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub feature_id: String,
    pub anchor: LngLat,
    pub icon: String,
    pub heading: String,
    pub address: String,
    pub phone: OverlayLink,
    pub route: OverlayLink,
    pub close_button: bool,
    pub close_on_click: bool,
    pub max_width: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayLink {
    pub label: String,
    pub href: String,
}

/// Notifications delivered by the host on the next event loop turn
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    StyleLoaded,
    Error {
        message: String,
    },
    Pointer {
        listener: ListenerId,
        kind: PointerEventKind,
        features: Vec<RenderedFeature>,
    },
    ClusterExpansionZoom {
        request: RequestId,
        result: Result<f64, HostError>,
    },
    /// Popup closed by the host itself (close button, click elsewhere)
    PopupClosed {
        popup: PopupId,
    },
}

/// Primitives a host rendering engine offers
pub trait MapHost {
    fn is_style_loaded(&self) -> bool;

    fn add_control(&mut self, control: Control, position: ControlPosition) -> ControlId;
    fn remove_control(&mut self, control: ControlId);

    fn add_source(&mut self, id: &str, source: GeoJsonSource) -> Result<(), HostError>;
    /// Fails with `SourceInUse` while a layer still references the source
    fn remove_source(&mut self, id: &str) -> Result<(), HostError>;
    fn has_source(&self, id: &str) -> bool;
    fn source_ids(&self) -> Vec<String>;

    fn add_layer(&mut self, layer: CircleLayer) -> Result<(), HostError>;
    fn remove_layer(&mut self, id: &str) -> Result<(), HostError>;
    fn has_layer(&self, id: &str) -> bool;
    /// Layer ids in drawing order, bottom first
    fn layer_ids(&self) -> Vec<String>;

    /// Subscribe to pointer events on one layer
    fn on(&mut self, kind: PointerEventKind, layer_id: &str) -> ListenerId;
    fn off(&mut self, listener: ListenerId);

    /// Rendered features of the given layers, nearest to `point` first.
    /// Without a point, every feature rendered in the viewport.
    fn query_rendered_features(
        &self,
        point: Option<ScreenPoint>,
        layers: &[&str],
    ) -> Vec<RenderedFeature>;

    /// Deferred: answered by a `ClusterExpansionZoom` event
    fn request_cluster_expansion_zoom(&mut self, source_id: &str, cluster_id: u64) -> RequestId;

    fn camera(&self) -> ViewState;
    fn ease_to(&mut self, target: CameraTarget);
    fn set_cursor(&mut self, cursor: Cursor);

    fn open_popup(&mut self, overlay: &Overlay) -> PopupId;
    fn close_popup(&mut self, popup: PopupId);

    fn poll_events(&mut self) -> Vec<HostEvent>;

    /// Release the instance; idempotent
    fn remove(&mut self);
}

/// Constructs host instances bound to a container
pub trait HostFactory {
    type Host: MapHost;

    fn create(
        &mut self,
        container: &Container,
        style: &StyleConfig,
        view: &ViewState,
    ) -> Result<Self::Host, HostError>;
}
