pub mod artifacts;
pub mod launcher;
pub mod session;

pub use artifacts::{ArtifactError, ArtifactSink};
pub use launcher::{launch, DriverProcess, LaunchError};
pub use session::{capabilities, SessionError, WebDriverSession};
