pub mod controller;
pub mod events;
pub mod glb;
pub mod loader;
pub mod readiness;
pub mod state;

pub use controller::{ArSessionController, ResourceReport, SessionDeps};
pub use events::{EventSink, NoopEvents, Viewport, SESSION_CHANGED_EVENT};
pub use glb::GlbFileLoader;
pub use loader::{LoadError, LoadedScene, ModelLoader};
pub use readiness::{await_model_ready, ReadyPolicy, ReadyReason};
pub use state::{ArSessionState, ArStage, OpenRequest, SessionSnapshot};
