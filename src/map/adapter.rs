//! Owns the one host instance bound to a container.

use crate::config::{StyleConfig, ViewState};
use crate::error::MapError;
use crate::host::{Container, Control, ControlId, ControlPosition, HostEvent, HostFactory, MapHost};
use tracing::{debug, info, warn};

/// Handle to an initialized host. Handles from before the latest
/// `initialize` are stale and every call made with them is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MapHandle {
    generation: u64,
}

impl MapHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

struct Active<H> {
    generation: u64,
    container_id: String,
    host: H,
    controls: Vec<ControlId>,
}

pub struct MapHostAdapter<F: HostFactory> {
    factory: F,
    generation: u64,
    active: Option<Active<F::Host>>,
}

impl<F: HostFactory> MapHostAdapter<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            generation: 0,
            active: None,
        }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Build a host on `container` and start loading its style.
    ///
    /// Returns immediately; readiness arrives as `HostEvent::StyleLoaded`.
    /// Any previous host is torn down first.
    pub fn initialize(
        &mut self,
        container: &Container,
        style: &StyleConfig,
        view: &ViewState,
    ) -> Result<MapHandle, MapError> {
        if let Some(previous) = self.current() {
            self.teardown(previous);
        }
        self.generation += 1;

        let mut host = self
            .factory
            .create(container, style, view)
            .map_err(|e| MapError::Initialization(e.to_string()))?;

        let controls = vec![
            host.add_control(Control::Navigation { visualize_pitch: true }, ControlPosition::TopRight),
            host.add_control(
                Control::Scale {
                    max_width: 200,
                    metric: true,
                },
                ControlPosition::BottomLeft,
            ),
            host.add_control(
                Control::Attribution {
                    compact: true,
                    text: style.attribution.clone(),
                },
                ControlPosition::BottomRight,
            ),
        ];

        info!(container = %container.id, generation = self.generation, "map host initialized");
        self.active = Some(Active {
            generation: self.generation,
            container_id: container.id.clone(),
            host,
            controls,
        });
        Ok(MapHandle {
            generation: self.generation,
        })
    }

    /// Handle of the live host, if any
    pub fn current(&self) -> Option<MapHandle> {
        self.active.as_ref().map(|a| MapHandle {
            generation: a.generation,
        })
    }

    pub fn is_current(&self, handle: MapHandle) -> bool {
        self.current() == Some(handle)
    }

    pub fn host(&self, handle: MapHandle) -> Option<&F::Host> {
        self.active
            .as_ref()
            .filter(|a| a.generation == handle.generation)
            .map(|a| &a.host)
    }

    pub fn host_mut(&mut self, handle: MapHandle) -> Option<&mut F::Host> {
        self.active
            .as_mut()
            .filter(|a| a.generation == handle.generation)
            .map(|a| &mut a.host)
    }

    /// Drain host events; stale handles get none
    pub fn poll_events(&mut self, handle: MapHandle) -> Vec<HostEvent> {
        self.host_mut(handle)
            .map(|host| host.poll_events())
            .unwrap_or_default()
    }

    /// Release everything still registered on the host and drop it.
    /// Stale handles and repeated calls are no-ops.
    pub fn teardown(&mut self, handle: MapHandle) {
        if !self.is_current(handle) {
            debug!(generation = handle.generation, "teardown of inactive handle ignored");
            return;
        }
        let Some(mut active) = self.active.take() else {
            return;
        };
        let host = &mut active.host;

        for layer in host.layer_ids().into_iter().rev() {
            if let Err(e) = host.remove_layer(&layer) {
                warn!(%layer, error = %e, "layer left on host at teardown");
            }
        }
        for source in host.source_ids() {
            if let Err(e) = host.remove_source(&source) {
                warn!(%source, error = %e, "source left on host at teardown");
            }
        }
        for control in active.controls.drain(..) {
            host.remove_control(control);
        }
        host.remove();
        info!(container = %active.container_id, generation = active.generation, "map host released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineFactory;

    fn adapter() -> MapHostAdapter<EngineFactory> {
        MapHostAdapter::new(EngineFactory)
    }

    #[test]
    fn test_initialize_adds_controls() {
        let mut adapter = adapter();
        let handle = adapter
            .initialize(&Container::new("map", 800, 600), &StyleConfig::default(), &ViewState::default())
            .unwrap();
        let host = adapter.host(handle).unwrap();
        assert_eq!(host.control_count(), 3);
        assert_eq!(host.attribution(), Some(StyleConfig::default().attribution.as_str()));
    }

    #[test]
    fn test_missing_container_is_initialization_error() {
        let mut adapter = adapter();
        let mut container = Container::new("map", 800, 600);
        container.detach();
        let err = adapter
            .initialize(&container, &StyleConfig::default(), &ViewState::default())
            .unwrap_err();
        assert!(matches!(err, MapError::Initialization(_)));
        assert!(adapter.current().is_none());
    }

    #[test]
    fn test_style_load_is_asynchronous() {
        let mut adapter = adapter();
        let handle = adapter
            .initialize(&Container::new("map", 800, 600), &StyleConfig::default(), &ViewState::default())
            .unwrap();
        assert!(!adapter.host(handle).unwrap().is_style_loaded());
        assert_eq!(adapter.poll_events(handle), vec![HostEvent::StyleLoaded]);
        assert!(adapter.host(handle).unwrap().is_style_loaded());
    }

    #[test]
    fn test_teardown_twice_is_noop() {
        let mut adapter = adapter();
        let handle = adapter
            .initialize(&Container::new("map", 800, 600), &StyleConfig::default(), &ViewState::default())
            .unwrap();
        adapter.teardown(handle);
        adapter.teardown(handle);
        assert!(adapter.host(handle).is_none());
        assert!(adapter.poll_events(handle).is_empty());
    }

    #[test]
    fn test_reinitialize_invalidates_old_handle() {
        let mut adapter = adapter();
        let container = Container::new("map", 800, 600);
        let first = adapter
            .initialize(&container, &StyleConfig::default(), &ViewState::default())
            .unwrap();
        let second = adapter
            .initialize(&container, &StyleConfig::default(), &ViewState::default())
            .unwrap();

        assert_ne!(first, second);
        assert!(adapter.host(first).is_none());
        adapter.teardown(first);
        assert!(adapter.is_current(second));
    }
}
