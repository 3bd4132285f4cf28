mod abort;
mod error;
mod shutdown;

pub mod prelude {
    pub use crate::abort::ScenarioAbortError;
    pub use crate::error::HarnessError;
    pub use crate::shutdown::{DelegatedShutdownListener, ShutdownHandle, ShutdownSignalError};
}
