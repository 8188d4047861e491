//! Custom assertions for E2E tests

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

/// Contents of a fakesvc `--env-dump` file
#[derive(Debug, Default)]
pub struct EnvDump {
    pub vars: BTreeMap<String, String>,
    pub args: String,
    pub cwd: String,
}

impl EnvDump {
    pub fn parse(content: &str) -> Self {
        let mut dump = EnvDump::default();
        for line in content.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            match key {
                "ARGS" => dump.args = value.to_string(),
                "CWD" => dump.cwd = value.to_string(),
                _ => {
                    dump.vars.insert(key.to_string(), value.to_string());
                }
            }
        }
        dump
    }

    pub fn var(&self, key: &str) -> Result<&str, String> {
        self.vars
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| format!("{} missing from env dump: {:#?}", key, self.vars))
    }
}

/// Wait for `path` to appear and parse it as an env dump
pub fn read_env_dump(path: &Path, timeout: Duration) -> Result<EnvDump, String> {
    let start = Instant::now();
    loop {
        if let Ok(content) = fs::read_to_string(path) {
            if content.contains("CWD=") {
                return Ok(EnvDump::parse(&content));
            }
        }
        if start.elapsed() >= timeout {
            return Err(format!("Env dump {} was never written", path.display()));
        }
        thread::sleep(Duration::from_millis(50));
    }
}

/// Read the PID a fakesvc wrote with `--pid-file`
pub fn read_pid_file(path: &Path) -> Result<u32, String> {
    fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?
        .trim()
        .parse()
        .map_err(|e| format!("Bad PID in {}: {}", path.display(), e))
}

/// Assert that a fakesvc removed its PID file, which it does only after a
/// graceful stop
pub fn assert_stopped_gracefully(pid_file: &Path) -> Result<(), String> {
    if pid_file.exists() {
        Err(format!(
            "{} still exists, service was not stopped gracefully",
            pid_file.display()
        ))
    } else {
        Ok(())
    }
}

pub fn assert_not_started(env_dump: &Path) -> Result<(), String> {
    if env_dump.exists() {
        Err(format!("{} exists, service was started", env_dump.display()))
    } else {
        Ok(())
    }
}

pub fn assert_exit_code(status: std::process::ExitStatus, expected: i32) -> Result<(), String> {
    match status.code() {
        Some(code) if code == expected => Ok(()),
        other => Err(format!("Expected exit code {}, got {:?}", expected, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_dump_parse() {
        let dump = EnvDump::parse(
            "DATA_DIR=/tmp/data\nOPENWEBUI_PORT=3001\nARGS=serve --port 3001\nCWD=/tmp\n",
        );
        assert_eq!(dump.var("DATA_DIR").unwrap(), "/tmp/data");
        assert_eq!(dump.var("OPENWEBUI_PORT").unwrap(), "3001");
        assert_eq!(dump.args, "serve --port 3001");
        assert_eq!(dump.cwd, "/tmp");
        assert!(dump.var("OLLAMA_HOST").is_err());
    }
}
