//! Popup content for a selected facility and the single-open-popup rule.

use crate::data::{Category, Feature};
use crate::host::{MapHost, Overlay, OverlayLink, PopupId};
use tracing::debug;

pub const POPUP_MAX_WIDTH: u16 = 300;
pub const ROUTE_LABEL: &str = "Route hierher";

fn icon(category: Category) -> &'static str {
    match category {
        Category::Headquarters => "🏛️",
        Category::Station => "🚔",
    }
}

/// Overlay content for a feature
pub fn render(feature: &Feature) -> Overlay {
    let coordinate = feature.coordinate();
    let dial: String = feature
        .phone()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();

    Overlay {
        feature_id: feature.id().to_string(),
        anchor: coordinate,
        icon: icon(feature.category()).to_string(),
        heading: feature.name().to_string(),
        address: feature.address().to_string(),
        phone: OverlayLink {
            label: feature.phone().to_string(),
            href: format!("tel:{dial}"),
        },
        route: OverlayLink {
            label: ROUTE_LABEL.to_string(),
            href: format!(
                "https://www.openstreetmap.org/directions?to={},{}",
                coordinate.lat, coordinate.lon
            ),
        },
        close_button: true,
        close_on_click: true,
        max_width: POPUP_MAX_WIDTH,
    }
}

/// Tracks the one popup open on a host
#[derive(Debug, Default)]
pub struct PopupController {
    open: Option<(PopupId, Overlay)>,
}

impl PopupController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `overlay`, closing the previous popup first
    pub fn open<H: MapHost + ?Sized>(&mut self, host: &mut H, overlay: Overlay) {
        self.close(host);
        let id = host.open_popup(&overlay);
        debug!(feature = %overlay.feature_id, popup = id.0, "popup opened");
        self.open = Some((id, overlay));
    }

    pub fn close<H: MapHost + ?Sized>(&mut self, host: &mut H) {
        if let Some((id, overlay)) = self.open.take() {
            host.close_popup(id);
            debug!(feature = %overlay.feature_id, popup = id.0, "popup closed");
        }
    }

    /// The host closed `popup` on its own; true when it was ours
    pub fn on_closed(&mut self, popup: PopupId) -> bool {
        if self.open.as_ref().is_some_and(|(id, _)| *id == popup) {
            self.open = None;
            true
        } else {
            false
        }
    }

    /// Forget the popup without touching a host (host already released)
    pub fn forget(&mut self) {
        self.open = None;
    }

    pub fn overlay(&self) -> Option<&Overlay> {
        self.open.as_ref().map(|(_, overlay)| overlay)
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }
}
