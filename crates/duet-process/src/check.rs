//! Process existence checking.

use std::io;

/// Check if a process with the given PID exists.
///
/// On Unix this sends signal 0 (`kill(pid, 0)`), which delivers nothing but
/// reports whether the target exists. On Windows it opens a query handle.
///
/// A process that exists but belongs to another user still counts as
/// existing.
///
/// # Examples
///
/// ```rust,no_run
/// use duet_process::process_exists;
///
/// if !process_exists(1234).unwrap() {
///     println!("Process 1234 is gone");
/// }
/// ```
pub fn process_exists(pid: u32) -> io::Result<bool> {
    #[cfg(unix)]
    {
        process_exists_unix(pid)
    }

    #[cfg(windows)]
    {
        process_exists_windows(pid)
    }
}

#[cfg(unix)]
fn process_exists_unix(pid: u32) -> io::Result<bool> {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let pid = i32::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, format!("PID out of range: {}", pid)))?;

    match kill(Pid::from_raw(pid), None) {
        Ok(()) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(Errno::EPERM) => Ok(true),
        Err(e) => Err(io::Error::from(e)),
    }
}

#[cfg(windows)]
fn process_exists_windows(pid: u32) -> io::Result<bool> {
    use windows::Win32::Foundation::CloseHandle;
    use windows::Win32::System::Threading::{OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION};

    // SAFETY: the handle is closed before returning and never escapes.
    unsafe {
        match OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid) {
            Ok(handle) => {
                let _ = CloseHandle(handle);
                Ok(true)
            }
            // ERROR_INVALID_PARAMETER: no such process.
            Err(e) if e.code().0 as u32 == 0x8007_0057 => Ok(false),
            Err(e) => Err(io::Error::new(io::ErrorKind::Other, e.to_string())),
        }
    }
}
