use anyhow::Result;
use tracing::warn;

#[cfg(windows)]
pub const ENTRY_NAME: &str = "Mural";

#[cfg(windows)]
const RUN_KEY: &str = "Software\\Microsoft\\Windows\\CurrentVersion\\Run";

#[cfg(windows)]
pub fn is_enabled() -> Result<bool> {
    use anyhow::Context;
    use winreg::{enums::HKEY_CURRENT_USER, RegKey};

    let hkcu = RegKey::predef(HKEY_CURRENT_USER);
    let key = hkcu
        .open_subkey(RUN_KEY)
        .context("unable to open the Run registry key")?;
    Ok(key.get_value::<String, _>(ENTRY_NAME).is_ok())
}

#[cfg(windows)]
pub fn set_enabled(enabled: bool) -> Result<()> {
    use anyhow::Context;
    use std::io::ErrorKind;
    use tracing::info;
    use winreg::{
        enums::{HKEY_CURRENT_USER, KEY_QUERY_VALUE, KEY_SET_VALUE},
        RegKey,
    };

    let hkcu = RegKey::predef(HKEY_CURRENT_USER);
    let key = hkcu
        .open_subkey_with_flags(RUN_KEY, KEY_SET_VALUE | KEY_QUERY_VALUE)
        .context("unable to open the Run registry key")?;

    if enabled {
        let exe = std::env::current_exe().context("unable to resolve the executable path")?;
        let exe = exe.to_string_lossy().to_string();
        key.set_value(ENTRY_NAME, &exe)
            .context("unable to write the autostart entry")?;
        info!("autostart enabled: {exe}");
    } else {
        match key.delete_value(ENTRY_NAME) {
            Ok(()) => info!("autostart disabled"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err).context("unable to remove the autostart entry"),
        }
    }

    Ok(())
}

#[cfg(not(windows))]
pub fn is_enabled() -> Result<bool> {
    Ok(false)
}

#[cfg(not(windows))]
pub fn set_enabled(enabled: bool) -> Result<()> {
    if enabled {
        anyhow::bail!("autostart is only supported on Windows");
    }
    Ok(())
}

pub fn effective(configured: bool) -> bool {
    configured
        && is_enabled().unwrap_or_else(|err| {
            warn!("unable to read autostart state: {err:#}");
            false
        })
}
