use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use ckpt_harness_core::prelude::HarnessError;
use serde::{Deserialize, Serialize};

use crate::ResultSet;

/// Version of the on-disk envelope. Bump when [ResultSet] changes incompatibly.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    format_version: u32,
    result_set: &'a ResultSet,
}

#[derive(Deserialize)]
struct Envelope {
    result_set: ResultSet,
}

#[derive(Deserialize)]
struct VersionProbe {
    format_version: u32,
}

/// Durable storage for a [ResultSet] at a fixed path.
///
/// Each store replaces whatever was at the path before. The file is written next to its final
/// location first and then moved into place, so an interrupted write never leaves a truncated
/// result file behind.
#[derive(Debug, Clone)]
pub struct ResultStore {
    path: PathBuf,
}

impl ResultStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn store(&self, result_set: &ResultSet) -> Result<(), HarnessError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)
            .map_err(|e| HarnessError::serialization("write", &self.path, e))?;

        let mut file = tempfile::NamedTempFile::new_in(&dir)
            .map_err(|e| HarnessError::serialization("write", &self.path, e))?;
        {
            let mut writer = BufWriter::new(file.as_file_mut());
            store_result_set(result_set, &mut writer)
                .map_err(|e| HarnessError::serialization("write", &self.path, e))?;
            writer
                .flush()
                .map_err(|e| HarnessError::serialization("write", &self.path, e))?;
        }
        file.persist(&self.path)
            .map_err(|e| HarnessError::serialization("write", &self.path, e.error))?;

        log::debug!(
            "Stored {} results to {}",
            result_set.len(),
            self.path.display()
        );
        Ok(())
    }

    pub fn load(&self) -> Result<ResultSet, HarnessError> {
        let file = std::fs::File::open(&self.path)
            .map_err(|e| HarnessError::serialization("read", &self.path, e))?;
        load_result_set(file).map_err(|e| HarnessError::serialization("read", &self.path, e))
    }
}

/// Serialize the result set, wrapped in the versioned envelope, to a writer.
pub fn store_result_set<W: Write>(
    result_set: &ResultSet,
    writer: &mut W,
) -> Result<(), serde_json::Error> {
    serde_json::to_writer(
        writer,
        &EnvelopeRef {
            format_version: FORMAT_VERSION,
            result_set,
        },
    )
}

/// Load a result set written by [store_result_set].
pub fn load_result_set<R: Read>(
    mut reader: R,
) -> Result<ResultSet, Box<dyn std::error::Error + Send + Sync + 'static>> {
    let mut content = String::new();
    reader.read_to_string(&mut content)?;

    let probe: VersionProbe = serde_json::from_str(&content)?;
    if probe.format_version != FORMAT_VERSION {
        return Err(format!(
            "unsupported result format version {}, expected {FORMAT_VERSION}",
            probe.format_version
        )
        .into());
    }

    let envelope: Envelope = serde_json::from_str(&content)?;
    Ok(envelope.result_set)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{ExitStatus, JobResult, Metric, MetricValue, ScenarioDescriptor};

    fn sample_result_set(entries: usize) -> ResultSet {
        let mut set = ResultSet::new(
            "V1StGXR8_Z5jdHi6B-myT".to_string(),
            "bench_nas".to_string(),
            1_700_000_000,
            "0.1.0".to_string(),
        );
        let statuses = [
            ExitStatus::Exited { code: Some(0) },
            ExitStatus::Exited { code: Some(139) },
            ExitStatus::Exited { code: None },
            ExitStatus::TimedOut { after_ms: 600_000 },
            ExitStatus::LaunchFailed {
                reason: "No such file or directory (os error 2)".to_string(),
            },
        ];
        for i in 0..entries {
            let descriptor = ScenarioDescriptor::new("./MVVM_checkpoint", format!("t{i}"))
                .with_variant(".aot")
                .with_environment(BTreeMap::from([("IDX".to_string(), i.to_string())]))
                .with_args(["-t".to_string(), format!("bench/t{i}.aot")]);
            let output = format!(
                "line one\n\tÜnïcödé ✓ \r\nExecution time: {i}.5s\n  trailing spaces  \n"
            );
            set.push(
                JobResult::new(
                    descriptor,
                    output.clone(),
                    statuses[i % statuses.len()].clone(),
                    Duration::from_millis(1234 + i as u64),
                ),
                vec![Metric {
                    name: "execution_time".to_string(),
                    marker: "Execution time:".to_string(),
                    value: MetricValue::Text(format!("Execution time: {i}.5s")),
                }],
            );
        }
        set
    }

    #[test]
    fn round_trip_preserves_every_field() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("results.json"));
        let original = sample_result_set(5);

        store.store(&original).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(original, loaded);
        assert_eq!(loaded.len(), 5);
    }

    #[test]
    fn store_overwrites_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("results.json"));

        store.store(&sample_result_set(5)).unwrap();
        store.store(&sample_result_set(2)).unwrap();

        assert_eq!(store.load().unwrap().len(), 2);
    }

    #[test]
    fn store_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("nested").join("results.json"));

        store.store(&sample_result_set(1)).unwrap();

        assert!(store.path().exists());
    }

    #[test]
    fn load_missing_file_is_serialization_failure() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("missing.json"));

        let err = store.load().unwrap_err();
        assert_eq!(err.kind(), "serialization_failure");
    }

    #[test]
    fn load_rejects_unknown_format_version() {
        let content = r#"{"format_version": 99, "result_set": {}}"#;
        let err = load_result_set(content.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("unsupported result format version 99"));
    }

    #[test]
    fn load_rejects_malformed_content() {
        assert!(load_result_set("not json".as_bytes()).is_err());
    }
}
