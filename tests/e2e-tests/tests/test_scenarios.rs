//! Full runs of the duet binary with fakesvc standing in for both services.
#![cfg(unix)]

use e2e_tests::assertions::{
    assert_exit_code, assert_not_started, assert_stopped_gracefully, read_env_dump, read_pid_file,
};
use e2e_tests::config::{
    BACKEND_ENV_DUMP, BACKEND_PID_FILE, FRONTEND_ENV_DUMP, FRONTEND_PID_FILE,
};
use e2e_tests::{free_port, occupy_consecutive_ports, TestConfigOptions, TestExecutor};
use std::time::Duration;

const RUNNING: &str = "duet is running at";
const STARTUP_TIMEOUT: Duration = Duration::from_secs(30);
const EXIT_TIMEOUT: Duration = Duration::from_secs(30);
const DUMP_TIMEOUT: Duration = Duration::from_secs(5);

fn distinct_ports() -> (u16, u16) {
    let backend = free_port();
    loop {
        let frontend = free_port();
        if frontend.abs_diff(backend) > 10 {
            return (backend, frontend);
        }
    }
}

#[test]
fn test_frontend_exit_stops_everything() {
    let executor = TestExecutor::new("frontend_exit");
    println!("\n=== Frontend exit ===\n");

    let (backend_port, frontend_port) = distinct_ports();
    let options = TestConfigOptions {
        backend_port,
        frontend_port,
        ..Default::default()
    };
    let dir = executor.test_dir.clone();

    let mut duet = executor.start(&options).expect("Failed to start duet");
    duet.wait_for_log(RUNNING, STARTUP_TIMEOUT).unwrap();
    println!("✓ Both services ready");

    let backend = read_env_dump(&dir.join(BACKEND_ENV_DUMP), DUMP_TIMEOUT).unwrap();
    assert_eq!(
        backend.var("OLLAMA_HOST").unwrap(),
        format!("127.0.0.1:{}", backend_port)
    );
    assert!(backend.var("OLLAMA_MODELS").unwrap().ends_with("models"));
    assert!(backend.cwd.ends_with(".ollama"), "backend cwd: {}", backend.cwd);
    println!("✓ Backend environment correct");

    let frontend = read_env_dump(&dir.join(FRONTEND_ENV_DUMP), DUMP_TIMEOUT).unwrap();
    let base_url = format!("http://127.0.0.1:{}", backend_port);
    assert_eq!(frontend.var("OLLAMA_API_BASE").unwrap(), base_url);
    assert_eq!(frontend.var("OLLAMA_BASE_URL").unwrap(), base_url);
    assert_eq!(
        frontend.var("OPENWEBUI_PORT").unwrap(),
        frontend_port.to_string()
    );
    assert!(frontend.var("DATA_DIR").unwrap().ends_with("data"));
    assert!(frontend.var("DUET_CONFIG").unwrap().ends_with("duet.yaml"));
    assert!(
        frontend
            .args
            .ends_with(&format!("--port {} --host 127.0.0.1", frontend_port)),
        "frontend args: {}",
        frontend.args
    );
    println!("✓ Frontend environment correct");

    // The frontend runner execs the frontend, so the PID it wrote is the
    // process duet supervises.
    let frontend_pid = read_pid_file(&dir.join(FRONTEND_PID_FILE)).unwrap();
    nix::sys::signal::kill(
        nix::unistd::Pid::from_raw(frontend_pid as i32),
        nix::sys::signal::Signal::SIGTERM,
    )
    .unwrap();
    println!("✓ Sent SIGTERM to frontend (PID {})", frontend_pid);

    let status = duet.wait_exit(EXIT_TIMEOUT).unwrap();
    assert_exit_code(status, 0).unwrap();
    assert_stopped_gracefully(&dir.join(BACKEND_PID_FILE)).unwrap();
    assert!(duet.has_log_matching("Phase: stopped"));
    println!("✓ Backend stopped after frontend exit");
}

#[test]
fn test_interrupt_tears_down_both_services() {
    let executor = TestExecutor::new("interrupt");
    println!("\n=== Interrupt ===\n");

    let (backend_port, frontend_port) = distinct_ports();
    let options = TestConfigOptions {
        backend_port,
        frontend_port,
        ..Default::default()
    };
    let dir = executor.test_dir.clone();

    let mut duet = executor.start(&options).expect("Failed to start duet");
    duet.wait_for_log(RUNNING, STARTUP_TIMEOUT).unwrap();
    assert!(dir.join(BACKEND_PID_FILE).exists());
    assert!(dir.join(FRONTEND_PID_FILE).exists());
    println!("✓ Both services running");

    duet.interrupt().unwrap();
    let status = duet.wait_exit(EXIT_TIMEOUT).unwrap();

    assert_exit_code(status, 0).unwrap();
    assert_stopped_gracefully(&dir.join(FRONTEND_PID_FILE)).unwrap();
    assert_stopped_gracefully(&dir.join(BACKEND_PID_FILE)).unwrap();
    println!("✓ Both services stopped gracefully");
}

#[test]
fn test_busy_preferred_port_moves_to_next() {
    let executor = TestExecutor::new("port_conflict");
    println!("\n=== Port conflict ===\n");

    let (_held, busy) = occupy_consecutive_ports(1);
    let frontend_port = loop {
        let port = free_port();
        if port.abs_diff(busy) > 10 {
            break port;
        }
    };
    let options = TestConfigOptions {
        backend_port: busy,
        frontend_port,
        ..Default::default()
    };
    let dir = executor.test_dir.clone();

    executor
        .run_test(options, |duet| {
            duet.wait_for_log(RUNNING, STARTUP_TIMEOUT)?;

            let backend = read_env_dump(&dir.join(BACKEND_ENV_DUMP), DUMP_TIMEOUT)?;
            let expected = busy + 1;
            if backend.var("OLLAMA_HOST")? != format!("127.0.0.1:{}", expected) {
                return Err(format!("backend not moved to {}: {:?}", expected, backend));
            }

            let frontend = read_env_dump(&dir.join(FRONTEND_ENV_DUMP), DUMP_TIMEOUT)?;
            if frontend.var("OLLAMA_API_BASE")? != format!("http://127.0.0.1:{}", expected) {
                return Err(format!("frontend not linked to {}: {:?}", expected, frontend));
            }
            println!("✓ Backend moved from {} to {}", busy, expected);
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_backend_crash_during_startup() {
    let executor = TestExecutor::new("backend_crash");
    println!("\n=== Backend crash ===\n");

    let (backend_port, frontend_port) = distinct_ports();
    let options = TestConfigOptions {
        backend_port,
        frontend_port,
        backend_args: ["--startup-delay-ms", "5000", "--exit-after-ms", "300", "--exit-code", "1"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        ..Default::default()
    };
    let dir = executor.test_dir.clone();

    let mut duet = executor.start(&options).expect("Failed to start duet");
    let status = duet.wait_exit(EXIT_TIMEOUT).unwrap();

    assert_exit_code(status, 1).unwrap();
    assert!(
        duet.has_log_matching("exited during startup (exit code 1)"),
        "{:#?}",
        duet.get_logs()
    );
    assert_not_started(&dir.join(FRONTEND_ENV_DUMP)).unwrap();
    println!("✓ Frontend never started after backend crash");
}

#[test]
fn test_exhausted_port_range() {
    let executor = TestExecutor::new("port_exhausted");
    println!("\n=== Port range exhausted ===\n");

    let (_held, first) = occupy_consecutive_ports(3);
    let options = TestConfigOptions {
        backend_port: first,
        backend_port_range: 3,
        frontend_port: free_port(),
        ..Default::default()
    };
    let dir = executor.test_dir.clone();

    let mut duet = executor.start(&options).expect("Failed to start duet");
    let status = duet.wait_exit(EXIT_TIMEOUT).unwrap();

    assert_exit_code(status, 1).unwrap();
    assert!(duet.has_log_matching("No free port"), "{:#?}", duet.get_logs());
    assert_not_started(&dir.join(BACKEND_ENV_DUMP)).unwrap();
    println!("✓ Nothing launched when no port was free");
}
