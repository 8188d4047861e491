use anyhow::{Context, Result};
use std::ffi::OsString;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use duet_supervisor::{
    run_delegated, CommandEntry, FrontendEnv, LauncherConfig, ProcessLauncher, Role, RunOutcome,
    ServiceSpec, StateLayout, Supervisor, SupervisorOptions,
};

/// duet - run a local inference backend and its web frontend together
fn main() {
    // Role first: nothing may be initialised before the branch.
    let code = match Role::detect(std::env::args_os()) {
        Role::Supervisor => run_supervisor(),
        Role::DelegatedRunner { args } => run_frontend_runner(args),
    };

    std::process::exit(code);
}

fn run_supervisor() -> i32 {
    initialize_logging(true);
    info!("Starting duet {}", env!("CARGO_PKG_VERSION"));

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create runtime: {}", e);
            return 1;
        }
    };

    match runtime.block_on(supervise()) {
        Ok(()) => 0,
        Err(e) => {
            error!("{:#}", e);
            1
        }
    }
}

async fn supervise() -> Result<()> {
    let exe = std::env::current_exe().context("Failed to resolve own executable")?;
    let app_dir = exe
        .parent()
        .context("Executable has no parent directory")?
        .to_path_buf();

    let config_path = LauncherConfig::locate(&app_dir)
        .map(|path| std::fs::canonicalize(&path).unwrap_or(path));
    let config = LauncherConfig::load(config_path.as_deref())?;
    match config_path {
        Some(ref path) => info!("Config file: {}", path.display()),
        None => info!("No config file, using defaults"),
    }

    let layout = StateLayout::new(config.data_root(&app_dir));
    layout
        .ensure()
        .with_context(|| format!("Failed to create state directories under {}", layout.root().display()))?;

    let backend = ServiceSpec::backend(&config.backend, &layout, &app_dir);
    let frontend = ServiceSpec::frontend(&config.frontend, &layout, &exe, config_path.as_deref());

    let cancel = CancellationToken::new();
    tokio::spawn(setup_signal_handlers(cancel.clone()));

    let mut supervisor = Supervisor::new(
        ProcessLauncher,
        backend,
        frontend,
        SupervisorOptions::from_config(&config),
        cancel,
    );

    match supervisor.run().await? {
        RunOutcome::FrontendExited(code) => info!("Frontend exited (code {:?}), duet stopped", code),
        RunOutcome::Interrupted => info!("duet stopped"),
    }

    Ok(())
}

fn run_frontend_runner(args: Vec<OsString>) -> i32 {
    initialize_logging(false);

    match delegate(&args) {
        Ok(code) => code,
        Err(e) => {
            error!("Frontend runner failed: {:#}", e);
            1
        }
    }
}

fn delegate(args: &[OsString]) -> Result<i32> {
    let env = FrontendEnv::from_env()?;
    let config = LauncherConfig::load(env.config_path.as_deref())?;
    let entry = CommandEntry::from_config(&config.frontend);

    Ok(run_delegated(&entry, &env, args)?)
}

fn initialize_logging(supervisor: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false);

    if supervisor {
        builder.with_thread_ids(true).init();
    } else {
        builder.init();
    }
}

/// Cancel `cancel` on the first interrupt or termination signal.
async fn setup_signal_handlers(cancel: CancellationToken) {
    use tokio::signal;

    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) = match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(term), Ok(int)) => (term, int),
            (Err(e), _) | (_, Err(e)) => {
                error!("Failed to install signal handlers: {}", e);
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM signal");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT signal");
            }
        }
    }

    #[cfg(windows)]
    {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        info!("Received Ctrl+C signal");
    }

    cancel.cancel();
}
