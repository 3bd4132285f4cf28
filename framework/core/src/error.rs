use std::path::PathBuf;
use std::time::Duration;

/// The ways an interaction with an external tool, the registry or the result store can fail.
///
/// Invocation failures ([HarnessError::LaunchFailure], [HarnessError::NonZeroExit],
/// [HarnessError::Timeout] and [HarnessError::Cancelled]) are normally carried on a job result
/// and only become an error when a caller asks for one, for example the sequencer's server step.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("Failed to launch `{program}`: {reason}")]
    LaunchFailure { program: String, reason: String },
    #[error("`{program}` exited with {}", describe_code(.code))]
    NonZeroExit { program: String, code: Option<i32> },
    #[error("`{program}` timed out after {after:?}")]
    Timeout { program: String, after: Duration },
    #[error("`{program}` was cancelled by a shutdown signal")]
    Cancelled { program: String },
    #[error("Unknown function name `{0}`")]
    LookupFailure(String),
    #[error("Failed to {action} result file {}: {source}", .path.display())]
    SerializationFailure {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

impl HarnessError {
    pub fn serialization(
        action: &'static str,
        path: impl Into<PathBuf>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        Self::SerializationFailure {
            action,
            path: path.into(),
            source: source.into(),
        }
    }

    /// Short, stable name for the kind of failure, used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            HarnessError::LaunchFailure { .. } => "launch_failure",
            HarnessError::NonZeroExit { .. } => "non_zero_exit",
            HarnessError::Timeout { .. } => "timeout",
            HarnessError::Cancelled { .. } => "cancelled",
            HarnessError::LookupFailure(_) => "lookup_failure",
            HarnessError::SerializationFailure { .. } => "serialization_failure",
        }
    }
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}
