use std::{path::Path, sync::Arc};

use crate::error::BackendError;

pub trait DesktopWallpaper: Send + Sync {
    fn monitor_count(&self) -> Result<u32, BackendError>;

    fn monitor_id(&self, index: u32) -> Result<String, BackendError>;

    fn set_wallpaper(&self, monitor_id: &str, path: &Path) -> Result<(), BackendError>;
}

impl<T: DesktopWallpaper + ?Sized> DesktopWallpaper for Arc<T> {
    fn monitor_count(&self) -> Result<u32, BackendError> {
        (**self).monitor_count()
    }

    fn monitor_id(&self, index: u32) -> Result<String, BackendError> {
        (**self).monitor_id(index)
    }

    fn set_wallpaper(&self, monitor_id: &str, path: &Path) -> Result<(), BackendError> {
        (**self).set_wallpaper(monitor_id, path)
    }
}

pub fn system() -> Box<dyn DesktopWallpaper> {
    #[cfg(windows)]
    {
        Box::new(windows_com::ComDesktopWallpaper)
    }
    #[cfg(not(windows))]
    {
        Box::new(Unsupported)
    }
}

#[cfg(not(windows))]
#[derive(Debug, Clone, Copy)]
pub struct Unsupported;

#[cfg(not(windows))]
impl Unsupported {
    fn error() -> BackendError {
        BackendError::new("setting wallpapers is only supported on Windows")
    }
}

#[cfg(not(windows))]
impl DesktopWallpaper for Unsupported {
    fn monitor_count(&self) -> Result<u32, BackendError> {
        Err(Self::error())
    }

    fn monitor_id(&self, _index: u32) -> Result<String, BackendError> {
        Err(Self::error())
    }

    fn set_wallpaper(&self, _monitor_id: &str, _path: &Path) -> Result<(), BackendError> {
        Err(Self::error())
    }
}

#[cfg(windows)]
mod windows_com {
    use std::{ffi::OsStr, os::windows::ffi::OsStrExt, path::Path};

    use tracing::debug;
    use windows::{
        core::PCWSTR,
        Win32::System::Com::{
            CoCreateInstance, CoInitializeEx, CoTaskMemFree, CoUninitialize, CLSCTX_LOCAL_SERVER,
            COINIT_APARTMENTTHREADED,
        },
        Win32::UI::Shell::{DesktopWallpaper, IDesktopWallpaper},
    };

    use super::DesktopWallpaper as Backend;
    use crate::error::BackendError;

    /// Creates the COM object per call so it can be shared across threads.
    #[derive(Debug, Clone, Copy)]
    pub struct ComDesktopWallpaper;

    struct ComScope {
        initialised: bool,
    }

    impl ComScope {
        fn enter() -> Self {
            let hr = unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED) };
            Self {
                initialised: hr.is_ok(),
            }
        }
    }

    impl Drop for ComScope {
        fn drop(&mut self) {
            if self.initialised {
                unsafe { CoUninitialize() };
            }
        }
    }

    fn with_desktop<T>(
        f: impl FnOnce(&IDesktopWallpaper) -> Result<T, BackendError>,
    ) -> Result<T, BackendError> {
        let _scope = ComScope::enter();
        let desktop: IDesktopWallpaper =
            unsafe { CoCreateInstance(&DesktopWallpaper, None, CLSCTX_LOCAL_SERVER)? };
        f(&desktop)
    }

    fn to_wide(s: impl AsRef<OsStr>) -> Vec<u16> {
        s.as_ref().encode_wide().chain(std::iter::once(0)).collect()
    }

    impl Backend for ComDesktopWallpaper {
        fn monitor_count(&self) -> Result<u32, BackendError> {
            with_desktop(|desktop| Ok(unsafe { desktop.GetMonitorDevicePathCount()? }))
        }

        fn monitor_id(&self, index: u32) -> Result<String, BackendError> {
            with_desktop(|desktop| {
                let raw = unsafe { desktop.GetMonitorDevicePathAt(index)? };
                let id = unsafe { raw.to_string() };
                unsafe { CoTaskMemFree(Some(raw.0 as *const _)) };
                id.map_err(|e| BackendError::new(format!("monitor id is not valid UTF-16: {e}")))
            })
        }

        fn set_wallpaper(&self, monitor_id: &str, path: &Path) -> Result<(), BackendError> {
            let monitor = to_wide(monitor_id);
            let wallpaper = to_wide(path);

            with_desktop(|desktop| {
                unsafe {
                    desktop.SetWallpaper(
                        PCWSTR::from_raw(monitor.as_ptr()),
                        PCWSTR::from_raw(wallpaper.as_ptr()),
                    )?
                };
                debug!("IDesktopWallpaper::SetWallpaper({monitor_id}, {})", path.display());
                Ok(())
            })
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use std::{ffi::OsString, os::windows::ffi::OsStringExt, path::PathBuf};

        #[test]
        fn wide_paths_keep_unpaired_surrogates() {
            let units = [u16::from(b'C'), u16::from(b':'), 0xD800, u16::from(b'x')];
            let path = PathBuf::from(OsString::from_wide(&units));
            assert!(path.to_str().is_none());

            let wide = to_wide(&path);
            assert_eq!(&wide[..units.len()], &units);
            assert_eq!(wide.last(), Some(&0));
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::DesktopWallpaper;
    use crate::error::BackendError;
    use std::{
        collections::HashSet,
        path::{Path, PathBuf},
        sync::Mutex,
    };

    #[derive(Debug, Default)]
    pub struct FakeDesktop {
        pub monitors: Vec<String>,
        pub failing: HashSet<String>,
        applied: Mutex<Vec<(String, PathBuf)>>,
    }

    impl FakeDesktop {
        pub fn with_monitors(ids: &[&str]) -> Self {
            Self {
                monitors: ids.iter().map(|s| s.to_string()).collect(),
                ..Self::default()
            }
        }

        pub fn applied(&self) -> Vec<(String, PathBuf)> {
            self.applied.lock().unwrap().clone()
        }
    }

    impl DesktopWallpaper for FakeDesktop {
        fn monitor_count(&self) -> Result<u32, BackendError> {
            Ok(self.monitors.len() as u32)
        }

        fn monitor_id(&self, index: u32) -> Result<String, BackendError> {
            self.monitors
                .get(index as usize)
                .cloned()
                .ok_or_else(|| BackendError::new("no such monitor"))
        }

        fn set_wallpaper(&self, monitor_id: &str, path: &Path) -> Result<(), BackendError> {
            if self.failing.contains(monitor_id) {
                return Err(BackendError::new("E_FAIL"));
            }
            self.applied
                .lock()
                .unwrap()
                .push((monitor_id.to_string(), path.to_path_buf()));
            Ok(())
        }
    }
}
