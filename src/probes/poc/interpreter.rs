use std::path::{Path, PathBuf};
use crate::errors::EngineError;

const CANDIDATES: &[&str] = &["python3", "python"];

/// Resolves the executable that runs PoC scripts.
pub trait InterpreterLocator: Send + Sync {
    fn locate(&self, override_path: Option<&Path>) -> Result<PathBuf, EngineError>;
}

/// Per-job override, then the configured path, then `python3`/`python` on `PATH`.
#[derive(Debug, Clone, Default)]
pub struct SystemInterpreterLocator {
    configured: Option<PathBuf>,
}

impl SystemInterpreterLocator {
    pub fn new(configured: Option<PathBuf>) -> Self {
        Self { configured }
    }
}

impl InterpreterLocator for SystemInterpreterLocator {
    fn locate(&self, override_path: Option<&Path>) -> Result<PathBuf, EngineError> {
        if let Some(explicit) = override_path.or(self.configured.as_deref()) {
            return resolve_explicit(explicit);
        }
        CANDIDATES
            .iter()
            .find_map(|name| which::which(name).ok())
            .ok_or_else(|| EngineError::Execution("Python interpreter not found on PATH".into()))
    }
}

/// Bare names are searched on `PATH`; paths must point at an executable.
fn resolve_explicit(path: &Path) -> Result<PathBuf, EngineError> {
    which::which(path)
        .map_err(|e| EngineError::Execution(format!("Interpreter not found: {} ({})", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn script_file(dir: &Path, name: &str, mode: u32) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_override_wins() {
        let dir = tempfile::tempdir().unwrap();
        let interpreter = script_file(dir.path(), "python-custom", 0o755);
        let locator = SystemInterpreterLocator::new(Some(PathBuf::from("/nonexistent/python")));
        assert_eq!(locator.locate(Some(&interpreter)).unwrap(), interpreter);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_executable_override_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let plain = script_file(dir.path(), "python-plain", 0o644);
        let locator = SystemInterpreterLocator::default();
        assert!(matches!(locator.locate(Some(&plain)), Err(EngineError::Execution(_))));
    }

    #[test]
    fn test_missing_configured_interpreter() {
        let locator = SystemInterpreterLocator::new(Some(PathBuf::from("/nonexistent/python")));
        assert!(matches!(locator.locate(None), Err(EngineError::Execution(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_bare_name_searches_path() {
        let locator = SystemInterpreterLocator::default();
        let sh = locator.locate(Some(Path::new("sh"))).unwrap();
        assert!(sh.ends_with("sh"));
        assert!(sh.is_absolute());
    }
}
