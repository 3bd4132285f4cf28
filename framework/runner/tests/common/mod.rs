use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use ckpt_harness_runner::prelude::HarnessCli;

/// Write an executable `/bin/sh` script standing in for one of the external tools.
pub fn write_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut permissions = std::fs::metadata(&path).unwrap().permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(&path, permissions).unwrap();
    path
}

pub fn write_registry(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("registry.toml");
    std::fs::write(&path, content).unwrap();
    path
}

pub fn harness_cli(registry: &Path, output: &Path) -> HarnessCli {
    HarnessCli {
        registry: Some(registry.to_path_buf()),
        output: Some(output.to_path_buf()),
        jobs: Some(2),
        timeout_s: 30,
        no_progress: true,
        run_id: Some("integration".to_string()),
    }
}
