use std::path::{Path, PathBuf};

use directories::ProjectDirs;

/// Platform directories of the tellus server.
///
/// Follows the XDG layout on Linux, `~/Library/Application Support` on macOS
/// and `%APPDATA%` on Windows.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    dirs: ProjectDirs,
}

impl ProjectPaths {
    /// `None` when no home directory can be determined.
    pub fn new(name: &str) -> Option<Self> {
        ProjectDirs::from("", "", name).map(|dirs| Self { dirs })
    }

    pub fn config_dir(&self) -> &Path {
        self.dirs.config_dir()
    }

    pub fn data_dir(&self) -> &Path {
        self.dirs.data_dir()
    }

    /// Where log files go.
    pub fn log_dir(&self) -> PathBuf {
        self.dirs.data_local_dir().join("logs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs_contain_name() {
        if let Some(paths) = ProjectPaths::new("tellus") {
            assert!(paths.config_dir().to_string_lossy().contains("tellus"));
            assert!(paths.data_dir().to_string_lossy().contains("tellus"));
            assert!(paths.log_dir().ends_with("logs"));
        }
    }
}
