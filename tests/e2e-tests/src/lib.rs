// E2E Test Framework for duet

pub mod assertions;
pub mod duet;
pub mod test_executor;

pub use config::{create_test_config, TestConfigOptions};
pub use duet::DuetWrapper;
pub use test_executor::TestExecutor;

use std::env;
use std::net::{Ipv4Addr, TcpListener};
use std::path::PathBuf;

/// Directory the workspace binaries are built into.
fn target_dir() -> PathBuf {
    let mut path = env::current_exe()
        .expect("Failed to get current exe path")
        .parent()
        .expect("Failed to get parent dir")
        .to_path_buf();

    // If we're in deps/, go up one level
    if path.ends_with("deps") {
        path.pop();
    }
    path
}

fn find_binary(stem: &str) -> PathBuf {
    let path = target_dir().join(format!("{}{}", stem, env::consts::EXE_SUFFIX));
    if !path.is_file() {
        panic!(
            "{} binary not found at: {} (build it with `cargo build -p {}`)",
            stem,
            path.display(),
            stem
        );
    }
    path
}

/// Path to the `duet` binary. Panics if it has not been built.
pub fn get_duet_path() -> PathBuf {
    find_binary("duet")
}

/// Path to the `fakesvc` binary. Panics if it has not been built.
pub fn get_fakesvc_path() -> PathBuf {
    find_binary("fakesvc")
}

/// A port nothing is listening on right now.
pub fn free_port() -> u16 {
    TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .and_then(|l| l.local_addr())
        .map(|a| a.port())
        .unwrap_or_else(|e| panic!("Failed to get a free port: {}", e))
}

/// Hold `count` consecutive loopback ports. Returns the listeners and the
/// first port.
pub fn occupy_consecutive_ports(count: u16) -> (Vec<TcpListener>, u16) {
    for _ in 0..50 {
        let Ok(first) = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)) else {
            continue;
        };
        let Ok(base) = first.local_addr().map(|a| a.port()) else {
            continue;
        };
        if base.checked_add(count).is_none() {
            continue;
        }

        let mut held = vec![first];
        for offset in 1..count {
            match TcpListener::bind((Ipv4Addr::LOCALHOST, base + offset)) {
                Ok(l) => held.push(l),
                Err(_) => break,
            }
        }
        if held.len() == count as usize {
            return (held, base);
        }
    }
    panic!("Could not reserve {} consecutive ports", count);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "binary not found")]
    fn test_missing_binary_fails_instead_of_skipping() {
        find_binary("duet-no-such-binary");
    }
}
