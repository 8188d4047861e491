//! duet wrapper for E2E testing

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use wait_timeout::ChildExt;

/// Wrapper for running the `duet` binary during tests
pub struct DuetWrapper {
    process: Option<Child>,
    config_path: PathBuf,
    log_output: Vec<String>,
    pub test_dir: PathBuf,
    log_file_path: Option<PathBuf>,
}

impl DuetWrapper {
    pub fn new(config_path: PathBuf, test_dir: PathBuf) -> Self {
        Self {
            process: None,
            config_path,
            log_output: Vec::new(),
            test_dir,
            log_file_path: None,
        }
    }

    /// Start duet with its output captured into `duet.log`
    pub fn start(&mut self, duet_path: &Path) -> Result<(), String> {
        if self.process.is_some() {
            return Err("duet is already running".to_string());
        }

        println!("Starting duet: {}", duet_path.display());
        println!("Config: {}", self.config_path.display());

        let log_file_path = self.test_dir.join("duet.log");
        let log_file = fs::File::create(&log_file_path)
            .map_err(|e| format!("Failed to create log file: {}", e))?;
        let log_file_clone = log_file
            .try_clone()
            .map_err(|e| format!("Failed to clone log file: {}", e))?;

        let mut cmd = Command::new(duet_path);
        cmd.env("DUET_CONFIG", &self.config_path)
            .env("RUST_LOG", "info")
            .env_remove("OLLAMA_HOST")
            .current_dir(&self.test_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log_file))
            .stderr(Stdio::from(log_file_clone));

        let child = cmd
            .spawn()
            .map_err(|e| format!("Failed to spawn duet: {}", e))?;

        println!("duet started with PID: {}", child.id());
        self.process = Some(child);
        self.log_file_path = Some(log_file_path);
        Ok(())
    }

    /// Wait until a log line contains `pattern`
    pub fn wait_for_log(&mut self, pattern: &str, timeout: Duration) -> Result<(), String> {
        let start = Instant::now();

        while start.elapsed() < timeout {
            self.collect_logs();
            if self.has_log_matching(pattern) {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(100));
        }

        Err(format!(
            "'{}' not logged within {} seconds. Logs:\n{:#?}",
            pattern,
            timeout.as_secs(),
            self.log_output
        ))
    }

    /// Send SIGTERM to duet
    #[cfg(unix)]
    pub fn interrupt(&mut self) -> Result<(), String> {
        let pid = self
            .get_pid()
            .ok_or_else(|| "duet is not running".to_string())?;

        println!("Sending SIGTERM to duet...");
        nix::sys::signal::kill(
            nix::unistd::Pid::from_raw(pid as i32),
            nix::sys::signal::Signal::SIGTERM,
        )
        .map_err(|e| format!("Failed to send SIGTERM: {}", e))
    }

    /// Wait for duet to exit on its own and return its exit status
    pub fn wait_exit(&mut self, timeout: Duration) -> Result<ExitStatus, String> {
        let mut child = self
            .process
            .take()
            .ok_or_else(|| "duet is not running".to_string())?;

        match child.wait_timeout(timeout) {
            Ok(Some(status)) => {
                self.collect_logs();
                println!("duet exited with status: {}", status);
                Ok(status)
            }
            Ok(None) => {
                child.kill().ok();
                child.wait().ok();
                self.collect_logs();
                Err(format!(
                    "duet did not exit within {} seconds. Logs:\n{:#?}",
                    timeout.as_secs(),
                    self.log_output
                ))
            }
            Err(e) => Err(format!("Error waiting for duet: {}", e)),
        }
    }

    /// Stop duet if it is still running
    pub fn shutdown(&mut self) -> Result<(), String> {
        if self.process.is_none() {
            return Ok(());
        }

        #[cfg(unix)]
        self.interrupt()?;

        #[cfg(windows)]
        if let Some(child) = self.process.as_mut() {
            child.kill().map_err(|e| format!("Failed to kill duet: {}", e))?;
        }

        self.wait_exit(Duration::from_secs(30)).map(|_| ())
    }

    fn collect_logs(&mut self) {
        if let Some(log_file_path) = &self.log_file_path {
            if let Ok(content) = fs::read_to_string(log_file_path) {
                let lines: Vec<String> = content.lines().map(|s| s.to_string()).collect();

                for line in lines.iter().skip(self.log_output.len()) {
                    println!("[DUET] {}", line);
                }
                self.log_output = lines;
            }
        }
    }

    pub fn get_logs(&self) -> &[String] {
        &self.log_output
    }

    pub fn has_log_matching(&self, pattern: &str) -> bool {
        self.log_output.iter().any(|line| line.contains(pattern))
    }

    pub fn get_pid(&self) -> Option<u32> {
        self.process.as_ref().map(|c| c.id())
    }
}

impl Drop for DuetWrapper {
    fn drop(&mut self) {
        if let Some(mut child) = self.process.take() {
            println!("Force killing duet in Drop");
            child.kill().ok();
            child.wait().ok();
        }
    }
}
