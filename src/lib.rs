pub mod catalog;
pub mod error;
pub mod interaction;
pub mod media;
pub mod navigation;
pub mod placements;
pub mod pose;
pub mod scanner;
pub mod session;
pub mod settings;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
mod utils;

#[cfg(feature = "desktop")]
mod shell;

#[cfg(feature = "desktop")]
pub use shell::run;

pub use error::{ArError, ErrorReport};
pub use session::{ArSessionController, ArStage, SessionDeps, SessionSnapshot};
