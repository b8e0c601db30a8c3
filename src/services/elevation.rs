//! Administrator elevation on Windows.
//!
//! Game folders under `Program Files` are not writable without elevation.
//! When the installer starts unprivileged it asks the shell to relaunch
//! itself with the `runas` verb and the current process exits either way.
//! Every other platform is treated as already privileged enough.

use anyhow::Result;

/// Result of the startup elevation check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElevationStatus {
    /// Running with the rights needed; continue startup
    Elevated,
    /// An elevated copy was requested; this process should exit
    Relaunched,
}

/// Quote each argument for a Windows command line
///
/// Embedded quotes are escaped with a backslash so the relaunched process
/// receives the same argument vector.
pub fn quote_args<I, S>(args: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter()
        .map(|arg| format!("\"{}\"", arg.as_ref().replace('"', "\\\"")))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(windows)]
pub fn is_elevated() -> bool {
    use windows_sys::Win32::UI::Shell::IsUserAnAdmin;

    // SAFETY: no arguments, reads the current process token only
    unsafe { IsUserAnAdmin() != 0 }
}

#[cfg(not(windows))]
pub fn is_elevated() -> bool {
    true
}

/// Ask the shell to start `exe` elevated with `params`
#[cfg(windows)]
pub fn relaunch_elevated(exe: &camino::Utf8Path, params: &str) -> Result<()> {
    use std::ffi::OsStr;
    use std::os::windows::ffi::OsStrExt;
    use windows_sys::Win32::UI::Shell::ShellExecuteW;
    use windows_sys::Win32::UI::WindowsAndMessaging::SW_SHOWNORMAL;

    fn wide(value: &str) -> Vec<u16> {
        OsStr::new(value)
            .encode_wide()
            .chain(std::iter::once(0))
            .collect()
    }

    let operation = wide("runas");
    let file = wide(exe.as_str());
    let parameters = wide(params);

    tracing::info!("Requesting elevated relaunch of {}", exe);

    // SAFETY: all strings are null-terminated and outlive the call
    let result = unsafe {
        ShellExecuteW(
            0,
            operation.as_ptr(),
            file.as_ptr(),
            parameters.as_ptr(),
            std::ptr::null(),
            SW_SHOWNORMAL,
        )
    };

    // Values above 32 indicate success
    if result > 32 {
        Ok(())
    } else {
        anyhow::bail!("ShellExecuteW failed with code {}", result)
    }
}

#[cfg(not(windows))]
pub fn relaunch_elevated(exe: &camino::Utf8Path, _params: &str) -> Result<()> {
    anyhow::bail!("Elevated relaunch of {} is only supported on Windows", exe)
}

/// Make sure the installer runs elevated.
///
/// Returns [`ElevationStatus::Relaunched`] once an elevated copy has been
/// requested; the caller should then exit with success.
///
/// # Errors
/// Fails when the current executable cannot be resolved or the shell
/// refuses the relaunch (for example, the operator declined the prompt).
pub fn ensure_elevated<I, S>(args: I) -> Result<ElevationStatus>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    if is_elevated() {
        return Ok(ElevationStatus::Elevated);
    }

    let exe = std::env::current_exe()?;
    let exe = camino::Utf8PathBuf::from_path_buf(exe)
        .map_err(|p| anyhow::anyhow!("Executable path is not valid UTF-8: {}", p.display()))?;

    relaunch_elevated(&exe, &quote_args(args))?;
    Ok(ElevationStatus::Relaunched)
}
