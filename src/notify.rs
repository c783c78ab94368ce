use std::sync::Arc;

use tracing::error;

pub trait Notifier: Send + Sync {
    fn error(&self, message: &str);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn error(&self, message: &str) {
        error!("{message}");
    }
}

#[cfg(windows)]
#[derive(Debug, Default, Clone, Copy)]
pub struct DialogNotifier;

#[cfg(windows)]
impl Notifier for DialogNotifier {
    fn error(&self, message: &str) {
        use windows::core::PCWSTR;
        use windows::Win32::Foundation::HWND;
        use windows::Win32::UI::WindowsAndMessaging::{MessageBoxW, MB_ICONERROR, MB_OK};

        error!("{message}");

        let text = to_wide(message);
        let caption = to_wide("Error");
        unsafe {
            MessageBoxW(
                HWND::default(),
                PCWSTR::from_raw(text.as_ptr()),
                PCWSTR::from_raw(caption.as_ptr()),
                MB_OK | MB_ICONERROR,
            );
        }
    }
}

#[cfg(windows)]
fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

pub fn for_process(detached: bool) -> Arc<dyn Notifier> {
    #[cfg(windows)]
    if detached {
        return Arc::new(DialogNotifier);
    }

    let _ = detached;
    Arc::new(LogNotifier)
}
