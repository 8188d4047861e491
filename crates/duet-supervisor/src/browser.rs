//! Best-effort browser launch once the frontend is up.

use crate::env::connect_host;
use std::io;
use std::time::Duration;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Address the user opens. A wildcard bind is opened as `localhost`.
pub fn browser_url(bind_host: &str, port: u16) -> String {
    match bind_host {
        "0.0.0.0" | "::" | "[::]" => format!("http://localhost:{}", port),
        host => format!("http://{}:{}", connect_host(host), port),
    }
}

/// The platform's "open this URL" command.
pub fn open_command(url: &str) -> Command {
    #[cfg(target_os = "macos")]
    {
        let mut cmd = Command::new("open");
        cmd.arg(url);
        cmd
    }

    #[cfg(windows)]
    {
        let mut cmd = Command::new("cmd");
        // The empty title keeps `start` from taking the URL as a window title.
        cmd.args(["/C", "start", ""]).arg(url);
        cmd
    }

    #[cfg(not(any(target_os = "macos", windows)))]
    {
        let mut cmd = Command::new("xdg-open");
        cmd.arg(url);
        cmd
    }
}

/// Open `url` in the default browser.
pub async fn open_url(url: &str) -> io::Result<()> {
    let status = open_command(url)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .await?;

    if status.success() {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::Other,
            format!("browser command exited with {}", status),
        ))
    }
}

/// Fire-and-forget: wait `delay`, then open `url`. Failures are logged only.
pub fn spawn_open(url: String, delay: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        match open_url(&url).await {
            Ok(()) => info!("Opened {} in the browser", url),
            Err(e) => warn!("Could not open browser at {}: {}", url, e),
        }
    })
}
