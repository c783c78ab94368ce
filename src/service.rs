use std::{
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tracing::{info, warn};

use crate::{
    config::Settings, error::RotationError, index, notify::Notifier, picker::Playlist,
    wallpaper::DesktopWallpaper,
};

#[derive(Debug)]
struct Rotation {
    settings: Settings,
    playlist: Playlist,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub monitor_id: String,
    pub path: PathBuf,
}

pub struct WallpaperService {
    state: Mutex<Rotation>,
    desktop: Box<dyn DesktopWallpaper>,
    notifier: Arc<dyn Notifier>,
}

impl WallpaperService {
    pub fn new(
        settings: Settings,
        desktop: Box<dyn DesktopWallpaper>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            state: Mutex::new(Rotation {
                settings,
                playlist: Playlist::new(Vec::new()),
            }),
            desktop,
            notifier,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Rotation> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fail<T>(&self, err: RotationError) -> Result<T, RotationError> {
        self.notifier.error(&err.to_string());
        Err(err)
    }

    pub fn auto_change_interval(&self) -> Option<Duration> {
        self.lock().settings.auto_change_interval()
    }

    pub fn apply_settings(&self, settings: Settings) -> usize {
        let mut state = self.lock();
        state.settings = settings;
        self.reindex(&mut state)
    }

    pub fn files(&self) -> Vec<PathBuf> {
        self.lock().playlist.files().to_vec()
    }

    pub fn index_files(&self) -> usize {
        let mut state = self.lock();
        self.reindex(&mut state)
    }

    fn reindex(&self, state: &mut Rotation) -> usize {
        let files = index::build_index(&state.settings, &mut rand::thread_rng(), &*self.notifier);
        state.playlist.replace(files);
        state.playlist.len()
    }

    pub fn monitor_count(&self) -> Result<u32, RotationError> {
        match self.desktop.monitor_count() {
            Ok(0) => self.fail(RotationError::NoMonitors),
            Ok(count) => Ok(count),
            Err(err) => self.fail(RotationError::Backend(err)),
        }
    }

    pub fn monitor_id(&self, index: u32) -> Result<String, RotationError> {
        match self.desktop.monitor_id(index) {
            Ok(id) if !id.trim().is_empty() => Ok(id),
            Ok(_) => self.fail(RotationError::InvalidMonitor(index)),
            Err(err) => {
                warn!("monitor {index} lookup failed: {err}");
                self.fail(RotationError::InvalidMonitor(index))
            }
        }
    }

    pub fn monitors(&self) -> Result<Vec<String>, RotationError> {
        let count = self.monitor_count()?;
        Ok((0..count).filter_map(|i| self.monitor_id(i).ok()).collect())
    }

    /// The cursor is not rolled back when the OS call fails.
    pub fn set_wallpaper(&self, monitor_id: &str) -> Result<Applied, RotationError> {
        let selected = {
            let mut state = self.lock();
            let random = state.settings.random_wallpaper;
            state.playlist.select_next(random, &mut rand::thread_rng())
        };
        let path = match selected {
            Ok(path) => path,
            Err(err) => return self.fail(err),
        };

        if let Err(source) = self.desktop.set_wallpaper(monitor_id, &path) {
            return self.fail(RotationError::Apply {
                monitor: monitor_id.to_string(),
                path,
                source,
            });
        }

        info!("set {} on monitor {monitor_id}", path.display());
        Ok(Applied {
            monitor_id: monitor_id.to_string(),
            path,
        })
    }

    pub fn set_wallpapers(&self) -> Result<Vec<Applied>, RotationError> {
        {
            let mut state = self.lock();
            if state.settings.wallpaper_path.is_none() {
                drop(state);
                return self.fail(RotationError::WallpaperPathUnset);
            }
            if state.playlist.is_empty() {
                self.reindex(&mut state);
            }
            if state.playlist.is_empty() {
                drop(state);
                return self.fail(RotationError::EmptyDirectory);
            }
        }

        let count = self.monitor_count()?;
        let mut applied = Vec::with_capacity(count as usize);
        for index in 0..count {
            let Ok(id) = self.monitor_id(index) else {
                continue;
            };
            match self.set_wallpaper(&id) {
                Ok(done) => applied.push(done),
                // Every indexed file is gone; the other monitors have nothing to show either.
                Err(RotationError::NoFiles) => return Err(RotationError::NoFiles),
                Err(_) => {}
            }
        }

        Ok(applied)
    }
}
