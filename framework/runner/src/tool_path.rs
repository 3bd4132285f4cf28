use std::env;
use std::path::{Path, PathBuf};

use anyhow::bail;
use anyhow::Context;

use crate::registry::Tool;
use crate::types::HarnessResult;

/// Find the executable for a tool.
///
/// If the tool's environment variable (see [Tool::env_var]) is set, its value is used as the path.
/// Otherwise the configured value is used: a value containing a path separator must exist, while a
/// bare name is looked up in the user's `PATH`.
pub fn resolve_tool(tool: Tool, configured: &str) -> HarnessResult<PathBuf> {
    let env_var = tool.env_var();
    match env::var(env_var).ok().as_deref() {
        Some("") => {
            bail!("'{env_var}' set to empty string");
        }
        Some(path) => {
            let tool_path = PathBuf::from(path);
            if !tool_path.exists() {
                bail!(
                    "Path to {tool} overwritten with '{env_var}={path}' but that path doesn't exist",
                    path = tool_path.display()
                );
            }
            Ok(tool_path)
        }
        None => resolve_configured(tool, configured),
    }
}

fn resolve_configured(tool: Tool, configured: &str) -> HarnessResult<PathBuf> {
    if configured.is_empty() {
        bail!("No path configured for {tool}");
    }

    let path = Path::new(configured);
    if path.components().count() > 1 {
        if !path.exists() {
            bail!("Configured path for {tool} '{configured}' doesn't exist");
        }
        return Ok(path.to_path_buf());
    }

    log::debug!("'{configured}' is not a path so looking in user's 'PATH'");
    which::which(configured).with_context(|| {
        format!(
            "{tool} binary '{configured}' not found in PATH. Install it or set '{}' to the correct path.",
            tool.env_var()
        )
    })
}

#[cfg(test)]
mod tests {
    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_should_not_get_tool_path_if_env_path_does_not_exist() {
        env::set_var(Tool::Gateway.env_var(), "/non/existent/path/to/gateway");
        let result = resolve_tool(Tool::Gateway, "./gateway");
        assert!(result.is_err());
    }

    #[test]
    fn test_should_get_tool_path_from_env() {
        let temp = NamedTempFile::new().expect("failed to create temp file");
        let test_path = temp.path().to_str().expect("failed to get temp file path");
        env::set_var(Tool::Restore.env_var(), test_path);
        let result = resolve_tool(Tool::Restore, "./MVVM_restore").expect("failed to get path");
        assert_eq!(result, PathBuf::from(test_path));
    }

    #[test]
    fn test_should_get_configured_path_that_exists() {
        let temp = NamedTempFile::new().expect("failed to create temp file");
        let configured = temp.path().to_str().expect("failed to get temp file path");
        let result = resolve_configured(Tool::Checkpoint, configured).expect("failed to resolve");
        assert_eq!(result, PathBuf::from(configured));
    }

    #[test]
    fn test_should_not_get_configured_path_that_is_missing() {
        let result = resolve_configured(Tool::Checkpoint, "./definitely/not/MVVM_checkpoint");
        assert!(result.is_err());
    }

    #[test]
    fn test_should_not_find_unknown_bare_name() {
        let result = resolve_configured(Tool::Checkpoint, "definitely-not-an-installed-ckpt-tool");
        assert!(result.is_err());
    }
}
