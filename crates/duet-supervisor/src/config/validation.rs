use super::*;
use anyhow::{anyhow, Result};

/// Validate the complete configuration
pub fn validate_config(config: &LauncherConfig) -> Result<()> {
    if config.graceful_timeout.is_zero() {
        return Err(anyhow!("graceful_timeout must be greater than 0"));
    }

    if let Some(ref root) = config.data_root {
        if root.as_os_str().is_empty() {
            return Err(anyhow!("data_root cannot be empty"));
        }
    }

    validate_backend_config(&config.backend)?;
    validate_frontend_config(&config.frontend)?;

    Ok(())
}

fn validate_backend_config(backend: &BackendConfig) -> Result<()> {
    if let Some(ref executable) = backend.executable {
        if executable.as_os_str().is_empty() {
            return Err(anyhow!("backend.executable cannot be empty"));
        }
    }

    validate_endpoint(
        "backend",
        backend.preferred_port,
        backend.port_range,
        &backend.host,
        &backend.readiness_path,
    )?;
    validate_timing("backend", backend.readiness_timeout, backend.poll_interval)
}

fn validate_frontend_config(frontend: &FrontendConfig) -> Result<()> {
    match frontend.command.first() {
        None => return Err(anyhow!("frontend.command must name a program")),
        Some(program) if program.trim().is_empty() => {
            return Err(anyhow!("frontend.command program cannot be empty"))
        }
        Some(_) => {}
    }

    validate_endpoint(
        "frontend",
        frontend.preferred_port,
        frontend.port_range,
        &frontend.host,
        &frontend.readiness_path,
    )?;
    validate_timing("frontend", frontend.readiness_timeout, frontend.poll_interval)
}

fn validate_endpoint(
    section: &str,
    preferred_port: u16,
    port_range: u16,
    host: &str,
    readiness_path: &str,
) -> Result<()> {
    if preferred_port == 0 {
        return Err(anyhow!("{}.preferred_port must be between 1 and 65535", section));
    }

    if port_range == 0 {
        return Err(anyhow!("{}.port_range must be at least 1", section));
    }

    if host.trim().is_empty() {
        return Err(anyhow!("{}.host cannot be empty", section));
    }

    if !readiness_path.starts_with('/') {
        return Err(anyhow!(
            "{}.readiness_path must start with '/', got: {}",
            section,
            readiness_path
        ));
    }

    Ok(())
}

fn validate_timing(section: &str, readiness_timeout: Duration, poll_interval: Duration) -> Result<()> {
    if readiness_timeout.is_zero() {
        return Err(anyhow!("{}.readiness_timeout must be greater than 0", section));
    }

    if poll_interval.is_zero() {
        return Err(anyhow!("{}.poll_interval must be greater than 0", section));
    }

    if poll_interval > readiness_timeout {
        return Err(anyhow!(
            "{}.poll_interval ({:?}) exceeds readiness_timeout ({:?})",
            section,
            poll_interval,
            readiness_timeout
        ));
    }

    Ok(())
}
