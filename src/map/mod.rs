//! Map layer lifecycle and interaction management.

pub mod adapter;
pub mod clustering;
pub mod interaction;
pub mod layers;
pub mod popup;
pub mod state;
pub mod view;

pub use adapter::{MapHandle, MapHostAdapter};
pub use clustering::{ClusterController, RenderMode};
pub use interaction::{InteractionMessage, InteractionRouter};
pub use layers::{LayerManager, LayerRegistration, ReconcileOutcome, DEFAULT_SOURCE_ID};
pub use popup::PopupController;
pub use state::{LoadState, LoadStateMachine};
pub use view::{MapView, ViewEvent};
