/// Returned by the scenario sequencer when the step that establishes the server image fails.
///
/// Nothing after the server checkpoint is meaningful without it, so the remaining steps are not
/// attempted. Failures in any later step are recorded on the step instead and never produce this
/// error.
#[derive(derive_more::Error, derive_more::Display, Debug, Clone, PartialEq)]
#[display("Scenario aborted at step [{step}]: {reason}")]
pub struct ScenarioAbortError {
    step: String,
    reason: String,
}

impl ScenarioAbortError {
    pub fn new(step: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            reason: reason.into(),
        }
    }

    pub fn step(&self) -> &str {
        &self.step
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_step_and_reason() {
        let err = ScenarioAbortError::new("server-checkpoint", "exited with code 1");
        assert_eq!(
            err.to_string(),
            "Scenario aborted at step [server-checkpoint]: exited with code 1"
        );
        assert_eq!(err.step(), "server-checkpoint");
    }
}
