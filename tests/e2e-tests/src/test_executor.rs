//! Per-test setup and teardown

use crate::config::{create_test_config, TestConfigOptions};
use crate::duet::DuetWrapper;
use crate::{get_duet_path, get_fakesvc_path};
use std::fs;
use std::path::PathBuf;

/// Owns the test directory and the binaries a scenario needs
pub struct TestExecutor {
    pub test_name: String,
    pub test_dir: PathBuf,
    pub duet_path: PathBuf,
    pub fakesvc_path: PathBuf,
}

impl TestExecutor {
    /// Panics if `duet` or `fakesvc` has not been built.
    pub fn new(test_name: &str) -> Self {
        let duet_path = get_duet_path();
        let fakesvc_path = get_fakesvc_path();
        let test_dir = create_test_dir(test_name);

        println!("=== Test Executor Setup ===");
        println!("Test: {}", test_name);
        println!("Test dir: {}", test_dir.display());
        println!("DUET: {}", duet_path.display());
        println!("FAKESVC: {}", fakesvc_path.display());
        println!("===========================\n");

        Self {
            test_name: test_name.to_string(),
            test_dir,
            duet_path,
            fakesvc_path,
        }
    }

    /// Write the config and start duet against it
    pub fn start(&self, options: &TestConfigOptions) -> Result<DuetWrapper, String> {
        let config_path = create_test_config(&self.test_dir, &self.fakesvc_path, options)?;

        let mut duet = DuetWrapper::new(config_path, self.test_dir.clone());
        duet.start(&self.duet_path)?;
        Ok(duet)
    }

    /// Run a scenario, stopping duet afterwards if it is still up
    pub fn run_test<F>(&self, options: TestConfigOptions, test_fn: F) -> Result<(), String>
    where
        F: FnOnce(&mut DuetWrapper) -> Result<(), String>,
    {
        let mut duet = self.start(&options)?;
        let result = test_fn(&mut duet);
        duet.shutdown()?;
        result
    }
}

impl Drop for TestExecutor {
    fn drop(&mut self) {
        if std::thread::panicking() {
            println!(
                "Test panicked, keeping test directory for debugging: {}",
                self.test_dir.display()
            );
        } else {
            let _ = fs::remove_dir_all(&self.test_dir);
        }
    }
}

fn create_test_dir(test_name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "duet-e2e-{}-{}",
        test_name,
        std::process::id()
    ));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir)
        .unwrap_or_else(|e| panic!("Failed to create test dir {}: {}", dir.display(), e));
    dir
}
