//! `MapView` ties the adapter, state machine, layer manager, clustering,
//! interaction and popups together on one cooperative event loop.
//!
//! Callers mount it on a container, then call [`MapView::pump`] once per
//! loop turn; host events are processed there and the resulting changes are
//! returned as [`ViewEvent`]s.

use super::adapter::{MapHandle, MapHostAdapter};
use super::clustering::ClusterController;
use super::interaction::{InteractionMessage, InteractionRouter};
use super::layers::{LayerManager, LayerRegistration, ReconcileOutcome};
use super::popup::{self, PopupController};
use super::state::{LoadState, LoadStateMachine};
use crate::config::{ClusterOptions, MapConfig};
use crate::data::{Feature, FeatureCollection};
use crate::error::MapError;
use crate::host::{CameraTarget, Container, Cursor, HostEvent, HostFactory, MapHost, Overlay};
use tracing::{debug, info, warn};

/// Observable changes produced while pumping
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    StateChanged(LoadState),
    SelectionChanged(Option<String>),
    CursorChanged(Cursor),
    CameraEased(CameraTarget),
    Reconciled(LayerRegistration),
}

pub struct MapView<F: HostFactory> {
    adapter: MapHostAdapter<F>,
    config: MapConfig,
    container: Option<Container>,
    handle: Option<MapHandle>,
    state: LoadStateMachine,
    layers: LayerManager,
    clustering: ClusterController,
    router: InteractionRouter,
    popups: PopupController,
    /// Desired data and options
    features: FeatureCollection,
    options: ClusterOptions,
    show_features: bool,
    /// Data backing the current registration
    applied: FeatureCollection,
    /// A reconcile waits for `Ready`
    queued: bool,
    outbox: Vec<ViewEvent>,
}

impl<F: HostFactory> MapView<F> {
    pub fn new(factory: F, config: MapConfig, features: FeatureCollection) -> Self {
        Self {
            adapter: MapHostAdapter::new(factory),
            options: config.clustering,
            show_features: config.data.show_features,
            config,
            container: None,
            handle: None,
            state: LoadStateMachine::new(),
            layers: LayerManager::default(),
            clustering: ClusterController::new(),
            router: InteractionRouter::new(),
            popups: PopupController::new(),
            features,
            applied: FeatureCollection::empty(),
            queued: false,
            outbox: Vec::new(),
        }
    }

    pub fn load_state(&self) -> &LoadState {
        self.state.state()
    }

    pub fn selection(&self) -> Option<&str> {
        self.router.selection()
    }

    pub fn selected_feature(&self) -> Option<&Feature> {
        self.selection().and_then(|id| self.applied.get(id))
    }

    pub fn overlay(&self) -> Option<&Overlay> {
        self.popups.overlay()
    }

    pub fn overlay_visible(&self) -> bool {
        self.popups.is_open()
    }

    pub fn features(&self) -> &FeatureCollection {
        &self.features
    }

    pub fn cluster_options(&self) -> &ClusterOptions {
        &self.options
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn registration(&self) -> Option<&LayerRegistration> {
        self.layers.registration()
    }

    pub fn handle(&self) -> Option<MapHandle> {
        self.handle
    }

    pub fn container(&self) -> Option<&Container> {
        self.container.as_ref()
    }

    pub fn factory(&self) -> &F {
        self.adapter.factory()
    }

    pub fn host(&self) -> Option<&F::Host> {
        self.handle.and_then(|h| self.adapter.host(h))
    }

    pub fn host_mut(&mut self) -> Option<&mut F::Host> {
        self.handle.and_then(|h| self.adapter.host_mut(h))
    }

    /// Create the host on `container`. Loading completes in a later `pump`.
    pub fn mount(&mut self, container: Container) -> Result<(), MapError> {
        if self.handle.is_some() || *self.load_state() != LoadState::Idle {
            self.unmount();
        }

        self.state.begin_loading();
        self.outbox.push(ViewEvent::StateChanged(LoadState::Loading));
        self.container = Some(container.clone());

        match self
            .adapter
            .initialize(&container, &self.config.style, &self.config.view)
        {
            Ok(handle) => {
                info!(container = %container.id, "map mounted");
                self.handle = Some(handle);
                self.queued = true;
                Ok(())
            }
            Err(e) => {
                self.enter_error(&e);
                Err(e)
            }
        }
    }

    /// Process pending host events
    pub fn pump(&mut self) -> Vec<ViewEvent> {
        if let Some(handle) = self.handle {
            for event in self.adapter.poll_events(handle) {
                self.on_host_event(event);
            }
            if self.queued && self.load_state().is_ready() {
                if let Err(e) = self.apply() {
                    debug!(error = %e, "queued reconcile failed");
                }
            }
        }
        std::mem::take(&mut self.outbox)
    }

    /// Replace the data set; applied now when ready, queued while loading
    pub fn set_features(&mut self, features: FeatureCollection) -> Result<(), MapError> {
        self.features = features;
        self.request_reconcile()
    }

    /// Invalid options are rejected and leave the current ones in place
    pub fn set_cluster_options(&mut self, options: ClusterOptions) -> Result<(), MapError> {
        options
            .validate()
            .map_err(|e| MapError::InvalidOptions(e.to_string()))?;
        self.options = options;
        self.request_reconcile()
    }

    /// Hide or show the feature layers
    pub fn set_show_features(&mut self, show: bool) -> Result<(), MapError> {
        self.show_features = show;
        self.request_reconcile()
    }

    fn request_reconcile(&mut self) -> Result<(), MapError> {
        let state = self.load_state().clone();
        match state {
            LoadState::Ready => self.apply(),
            LoadState::Idle | LoadState::Loading => {
                debug!(%state, "reconcile queued");
                self.queued = true;
                Ok(())
            }
            LoadState::Error(_) => Err(MapError::NotReady(state.to_string())),
        }
    }

    fn apply(&mut self) -> Result<(), MapError> {
        self.queued = false;
        let Some(host) = self.handle.and_then(|h| self.adapter.host_mut(h)) else {
            return Err(MapError::NotReady("no host".into()));
        };

        if !self.show_features {
            let left = self.router.detach(host);
            self.popups.close(host);
            self.layers.teardown(host);
            self.clustering.invalidate();
            self.applied = FeatureCollection::empty();
            let cleared = self.router.clear_selection();
            self.dispatch_all([left, cleared]);
            return Ok(());
        }

        match self.layers.reconcile(host, &self.features, &self.options) {
            Ok(ReconcileOutcome::Applied(registration)) => {
                self.clustering.invalidate();
                self.applied = self.features.clone();
                let left = self.router.bind(host, &registration);
                self.outbox.push(ViewEvent::Reconciled(registration));
                let invalid = self.router.retain_valid(&self.applied);
                self.dispatch_all([left, invalid]);
                Ok(())
            }
            Ok(ReconcileOutcome::Unchanged(_)) => Ok(()),
            Err(e) => {
                // Nothing is registered any more
                let left = self.router.detach(host);
                self.popups.close(host);
                self.clustering.invalidate();
                self.applied = FeatureCollection::empty();
                let cleared = self.router.clear_selection();
            self.dispatch_all([left, cleared]);
                self.enter_error(&e);
                Err(e)
            }
        }
    }

    fn dispatch_all<const N: usize>(&mut self, messages: [Option<InteractionMessage>; N]) {
        for message in messages.into_iter().flatten() {
            self.dispatch(message);
        }
    }

    fn enter_error(&mut self, error: &MapError) {
        if self.state.fail(error.to_string()) {
            self.outbox
                .push(ViewEvent::StateChanged(self.state.state().clone()));
        }
    }

    fn on_host_event(&mut self, event: HostEvent) {
        match event {
            HostEvent::StyleLoaded => {
                if self.state.mark_ready() {
                    info!("map ready");
                    self.outbox.push(ViewEvent::StateChanged(LoadState::Ready));
                } else {
                    debug!(state = %self.load_state(), "style load ignored");
                }
            }
            HostEvent::Error { message } => {
                if self.load_state().is_ready() {
                    warn!(%message, "host error after load");
                }
                self.enter_error(&MapError::StyleLoad(message));
            }
            HostEvent::Pointer {
                listener,
                kind,
                features,
            } => {
                let messages = self.router.handle(listener, kind, &features, &self.applied);
                for message in messages {
                    self.dispatch(message);
                }
            }
            HostEvent::ClusterExpansionZoom { request, result } => {
                let Some(host) = self.handle.and_then(|h| self.adapter.host_mut(h)) else {
                    return;
                };
                if let Some(target) = self.clustering.resolve(host, request, result) {
                    self.outbox.push(ViewEvent::CameraEased(target));
                }
            }
            HostEvent::PopupClosed { popup } => {
                if self.popups.on_closed(popup) {
                    if let Some(message) = self.router.clear_selection() {
                        self.dispatch(message);
                    }
                }
            }
        }
    }

    fn dispatch(&mut self, message: InteractionMessage) {
        let Some(host) = self.handle.and_then(|h| self.adapter.host_mut(h)) else {
            return;
        };

        match message {
            InteractionMessage::SelectionChanged(Some(id)) => {
                if let Some(feature) = self.applied.get(&id) {
                    self.popups.open(host, popup::render(feature));
                }
                self.outbox.push(ViewEvent::SelectionChanged(Some(id)));
            }
            InteractionMessage::SelectionChanged(None) => {
                self.popups.close(host);
                self.outbox.push(ViewEvent::SelectionChanged(None));
            }
            InteractionMessage::HoverChanged(hovering) => {
                let cursor = if hovering { Cursor::Pointer } else { Cursor::Default };
                host.set_cursor(cursor);
                self.outbox.push(ViewEvent::CursorChanged(cursor));
            }
            InteractionMessage::ExpandCluster(cluster) => {
                self.clustering.expand(host, self.layers.source_id(), &cluster);
            }
        }
    }

    /// Clear the selection and close its popup; layers stay as they are
    pub fn clear_selection(&mut self) {
        if let Some(message) = self.router.clear_selection() {
            self.dispatch(message);
        }
    }

    /// Tear the host down and start over on the same container
    pub fn reinit(&mut self) -> Result<(), MapError> {
        let container = self
            .container
            .clone()
            .ok_or_else(|| MapError::Initialization("map was never mounted".into()))?;
        info!(container = %container.id, "re-initializing map");
        self.unmount();
        self.mount(container)
    }

    /// Release the host. Safe to call repeatedly.
    pub fn unmount(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Some(host) = self.adapter.host_mut(handle) {
                let left = self.router.detach(host);
                self.popups.close(host);
                self.layers.teardown(host);
                host.set_cursor(Cursor::Default);
                if left.is_some() {
                    self.outbox.push(ViewEvent::CursorChanged(Cursor::Default));
                }
            }
            self.adapter.teardown(handle);
            info!("map unmounted");
        }

        self.router.forget();
        self.popups.forget();
        self.layers.forget();
        self.clustering.invalidate();
        if self.router.clear_selection().is_some() {
            self.outbox.push(ViewEvent::SelectionChanged(None));
        }
        self.applied = FeatureCollection::empty();
        self.queued = false;
        if *self.load_state() != LoadState::Idle {
            self.state.reset();
            self.outbox.push(ViewEvent::StateChanged(LoadState::Idle));
        }
    }
}

impl<F: HostFactory> Drop for MapView<F> {
    fn drop(&mut self) {
        self.unmount();
    }
}
