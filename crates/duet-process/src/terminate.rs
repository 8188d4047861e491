//! Process termination primitives.
//!
//! Graceful termination is SIGTERM on Unix and a Ctrl+Break console event on
//! Windows. The Windows event only reaches children spawned in their own
//! process group (see [`crate::execute::spawn_service`]).

use std::io;

/// Ask a process to shut down.
pub fn terminate_gracefully(pid: u32) -> io::Result<()> {
    #[cfg(unix)]
    {
        send_signal(pid, nix::sys::signal::Signal::SIGTERM)
    }

    #[cfg(windows)]
    {
        use windows::Win32::System::Console::{GenerateConsoleCtrlEvent, CTRL_BREAK_EVENT};

        // SAFETY: plain FFI call with no pointers.
        unsafe { GenerateConsoleCtrlEvent(CTRL_BREAK_EVENT, pid) }
            .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("Ctrl+Break to PID {} failed: {}", pid, e)))
    }
}

/// Force kill a process (SIGKILL on Unix, TerminateProcess on Windows).
pub fn force_kill(pid: u32) -> io::Result<()> {
    #[cfg(unix)]
    {
        send_signal(pid, nix::sys::signal::Signal::SIGKILL)
    }

    #[cfg(windows)]
    {
        use windows::Win32::Foundation::CloseHandle;
        use windows::Win32::System::Threading::{OpenProcess, TerminateProcess, PROCESS_TERMINATE};

        // SAFETY: the handle is closed before returning and never escapes.
        unsafe {
            let handle = OpenProcess(PROCESS_TERMINATE, false, pid)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("OpenProcess({}) failed: {}", pid, e)))?;
            let result = TerminateProcess(handle, 1);
            let _ = CloseHandle(handle);
            result.map_err(|e| io::Error::new(io::ErrorKind::Other, format!("TerminateProcess failed: {}", e)))
        }
    }
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: nix::sys::signal::Signal) -> io::Result<()> {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let raw = i32::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, format!("PID out of range: {}", pid)))?;
    kill(Pid::from_raw(raw), signal).map_err(io::Error::from)
}
