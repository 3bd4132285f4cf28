mod descriptor;
mod result;
mod store;

pub use descriptor::{EnvironmentConfig, ScenarioDescriptor};
pub use result::{ExitStatus, JobResult, Metric, MetricValue, ResultEntry, ResultSet};
pub use store::{load_result_set, store_result_set, ResultStore, FORMAT_VERSION};
