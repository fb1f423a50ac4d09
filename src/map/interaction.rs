//! Pointer events on the registered layers, turned into messages.
//!
//! Listeners are only ever attached to the leaf and cluster layer ids of the
//! current registration. The router owns the selection but leaves cursor,
//! popup and camera changes to whoever consumes its messages.

use super::layers::LayerRegistration;
use crate::data::FeatureCollection;
use crate::host::{ListenerId, MapHost, PointerEventKind, RenderedFeature};
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum InteractionMessage {
    /// New selected feature id, `None` when cleared
    SelectionChanged(Option<String>),
    /// Pointer entered (true) or left (false) every interactive feature
    HoverChanged(bool),
    ExpandCluster(RenderedFeature),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Leaves,
    Clusters,
}

struct Binding {
    listener: ListenerId,
    kind: PointerEventKind,
    layer_id: String,
    target: Target,
}

const KINDS: [PointerEventKind; 3] = [
    PointerEventKind::Click,
    PointerEventKind::MouseEnter,
    PointerEventKind::MouseLeave,
];

#[derive(Default)]
pub struct InteractionRouter {
    bindings: Vec<Binding>,
    selection: Option<String>,
    hovered: HashSet<String>,
}

impl InteractionRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selection(&self) -> Option<&str> {
        self.selection.as_deref()
    }

    pub fn is_hovering(&self) -> bool {
        !self.hovered.is_empty()
    }

    /// Layer ids that currently have listeners
    pub fn bound_layers(&self) -> Vec<&str> {
        let mut layers: Vec<&str> = self.bindings.iter().map(|b| b.layer_id.as_str()).collect();
        layers.dedup();
        layers
    }

    pub fn listener(&self, layer_id: &str, kind: PointerEventKind) -> Option<ListenerId> {
        self.bindings
            .iter()
            .find(|b| b.kind == kind && b.layer_id == layer_id)
            .map(|b| b.listener)
    }

    /// Attach listeners to the registration's layers, replacing earlier ones.
    /// Returns the hover-leave message when a hover was dropped on the way.
    pub fn bind<H: MapHost + ?Sized>(
        &mut self,
        host: &mut H,
        registration: &LayerRegistration,
    ) -> Option<InteractionMessage> {
        let left = self.detach(host);

        let targets = registration
            .leaf_layer_id()
            .map(|id| (id, Target::Leaves))
            .into_iter()
            .chain(registration.cluster_layer_id().map(|id| (id, Target::Clusters)));
        for (layer_id, target) in targets {
            for kind in KINDS {
                self.bindings.push(Binding {
                    listener: host.on(kind, layer_id),
                    kind,
                    layer_id: layer_id.to_string(),
                    target,
                });
            }
        }
        debug!(layers = ?self.bound_layers(), "listeners bound");
        left
    }

    /// Remove every listener. The host will not report a leave for layers
    /// that are gone, so a dropped hover is reported here instead.
    pub fn detach<H: MapHost + ?Sized>(&mut self, host: &mut H) -> Option<InteractionMessage> {
        for binding in self.bindings.drain(..) {
            host.off(binding.listener);
        }
        if self.hovered.is_empty() {
            return None;
        }
        self.hovered.clear();
        Some(InteractionMessage::HoverChanged(false))
    }

    /// Forget listeners without touching a host (host already released)
    pub fn forget(&mut self) {
        self.bindings.clear();
        self.hovered.clear();
    }

    /// Route one pointer event. `features` are nearest first.
    pub fn handle(
        &mut self,
        listener: ListenerId,
        kind: PointerEventKind,
        features: &[RenderedFeature],
        collection: &FeatureCollection,
    ) -> Vec<InteractionMessage> {
        let Some(binding) = self.bindings.iter().find(|b| b.listener == listener) else {
            debug!(listener = listener.0, "event for detached listener");
            return Vec::new();
        };
        let (target, layer_id) = (binding.target, binding.layer_id.clone());

        match kind {
            PointerEventKind::Click => match target {
                Target::Leaves => {
                    let hit = features.iter().find_map(|f| {
                        f.feature_id().filter(|id| !f.is_cluster() && collection.contains(id))
                    });
                    match hit {
                        Some(id) => {
                            debug!(feature = id, "feature selected");
                            self.selection = Some(id.to_string());
                            vec![InteractionMessage::SelectionChanged(self.selection.clone())]
                        }
                        None => Vec::new(),
                    }
                }
                Target::Clusters => features
                    .iter()
                    .find(|f| f.is_cluster())
                    .map(|f| vec![InteractionMessage::ExpandCluster(f.clone())])
                    .unwrap_or_default(),
            },
            PointerEventKind::MouseEnter => {
                let was_hovering = self.is_hovering();
                self.hovered.insert(layer_id);
                if was_hovering {
                    Vec::new()
                } else {
                    vec![InteractionMessage::HoverChanged(true)]
                }
            }
            PointerEventKind::MouseLeave => {
                if self.hovered.remove(&layer_id) && self.hovered.is_empty() {
                    vec![InteractionMessage::HoverChanged(false)]
                } else {
                    Vec::new()
                }
            }
        }
    }

    pub fn clear_selection(&mut self) -> Option<InteractionMessage> {
        self.selection
            .take()
            .map(|_| InteractionMessage::SelectionChanged(None))
    }

    /// Clear the selection if its feature is not in `collection`
    pub fn retain_valid(&mut self, collection: &FeatureCollection) -> Option<InteractionMessage> {
        match &self.selection {
            Some(id) if !collection.contains(id) => {
                debug!(feature = %id, "selection no longer in data");
                self.clear_selection()
            }
            _ => None,
        }
    }
}
