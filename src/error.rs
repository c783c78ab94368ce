use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct BackendError {
    message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(windows)]
impl From<windows::core::Error> for BackendError {
    fn from(err: windows::core::Error) -> Self {
        Self::new(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum RotationError {
    #[error("No wallpaper path set. Open settings and set one.")]
    WallpaperPathUnset,
    #[error("Found no files in the given wallpaper path.")]
    EmptyDirectory,
    #[error("Unable to get file to set as wallpaper. No files found.")]
    NoFiles,
    #[error("Found 0 monitors.")]
    NoMonitors,
    #[error("Unable to find monitor at index {0}.")]
    InvalidMonitor(u32),
    #[error("Invalid file pattern {pattern:?}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("Unable to get files matching {pattern:?} from {}", .dir.display())]
    Enumerate {
        pattern: String,
        dir: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("Unable to set {:?} as wallpaper for monitor {monitor}", .path.display().to_string())]
    Apply {
        monitor: String,
        path: PathBuf,
        #[source]
        source: BackendError,
    },
    #[error("Wallpaper backend failed")]
    Backend(#[source] BackendError),
}
