use clap::Parser;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info};

/// Stand-in for the inference backend or the web frontend in duet tests.
///
/// Serves a fixed HTTP status on every path until it receives SIGTERM/SIGINT
/// (exit 0) or `--exit-after-ms` elapses (exit `--exit-code`).
#[derive(Parser, Debug)]
#[command(name = "fakesvc")]
#[command(about = "Fake service for duet testing", long_about = None)]
struct Args {
    /// Subcommand word, accepted and ignored (e.g. `serve`)
    command: Option<String>,

    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind. Defaults to the port in $OLLAMA_HOST.
    #[arg(long)]
    port: Option<u16>,

    /// HTTP status returned for every request
    #[arg(long, default_value = "200")]
    status: u16,

    /// Exit on its own after this many milliseconds
    #[arg(long)]
    exit_after_ms: Option<u64>,

    /// Exit code used with --exit-after-ms
    #[arg(long, default_value = "0")]
    exit_code: i32,

    /// Wait this long before binding
    #[arg(long, default_value = "0")]
    startup_delay_ms: u64,

    /// Write the process ID here
    #[arg(long)]
    pid_file: Option<PathBuf>,

    /// Write the relevant environment, arguments and working directory here
    #[arg(long)]
    env_dump: Option<PathBuf>,
}

/// Variables recorded by --env-dump.
const DUMPED_PREFIXES: &[&str] = &["OLLAMA_", "OPENWEBUI_", "DATA_DIR", "DUET_"];

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let args = Args::parse();
    info!("Starting fakesvc with args: {:?}", args);

    if let Some(path) = &args.pid_file {
        if let Err(e) = std::fs::write(path, std::process::id().to_string()) {
            error!("Failed to write PID file {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }

    if let Some(path) = &args.env_dump {
        if let Err(e) = write_env_dump(path) {
            error!("Failed to write env dump {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }

    let Some(port) = args.port.or_else(port_from_ollama_host) else {
        error!("No port given (--port or OLLAMA_HOST)");
        std::process::exit(2);
    };

    if let Some(after) = args.exit_after_ms {
        let code = args.exit_code;
        tokio::spawn(async move {
            sleep(Duration::from_millis(after)).await;
            info!("Exiting with code {} after {}ms as requested", code, after);
            std::process::exit(code);
        });
    }

    if args.startup_delay_ms > 0 {
        info!("Startup delay: {}ms", args.startup_delay_ms);
        sleep(Duration::from_millis(args.startup_delay_ms)).await;
    }

    let addr = format!("{}:{}", args.host, port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    info!("fakesvc listening on http://{} (status {})", addr, args.status);

    tokio::select! {
        _ = serve(listener, args.status) => {}
        _ = shutdown_signal() => {}
    }

    if let Some(path) = &args.pid_file {
        let _ = std::fs::remove_file(path);
    }
    info!("fakesvc stopped");
}

fn port_from_ollama_host() -> Option<u16> {
    let value = std::env::var("OLLAMA_HOST").ok()?;
    value.rsplit_once(':')?.1.parse().ok()
}

fn write_env_dump(path: &Path) -> std::io::Result<()> {
    let vars: BTreeMap<String, String> = std::env::vars()
        .filter(|(k, _)| DUMPED_PREFIXES.iter().any(|p| k.starts_with(p)))
        .collect();

    let mut out = String::new();
    for (key, value) in vars {
        out.push_str(&format!("{}={}\n", key, value));
    }
    let args: Vec<String> = std::env::args().skip(1).collect();
    out.push_str(&format!("ARGS={}\n", args.join(" ")));
    out.push_str(&format!("CWD={}\n", std::env::current_dir()?.display()));

    std::fs::write(path, out)
}

async fn serve(listener: tokio::net::TcpListener, status: u16) {
    use http_body_util::Full;
    use hyper::body::Bytes;
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::{Request, Response};
    use hyper_util::rt::TokioIo;

    loop {
        let (stream, _) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Failed to accept connection: {}", e);
                continue;
            }
        };

        tokio::spawn(async move {
            let service = service_fn(move |req: Request<hyper::body::Incoming>| async move {
                info!("{} {} -> {}", req.method(), req.uri(), status);
                Response::builder()
                    .status(status)
                    .body(Full::new(Bytes::from_static(b"fakesvc\n")))
            });

            if let Err(e) = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                error!("Error serving connection: {}", e);
            }
        });
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate()).expect("Failed to setup SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("Failed to setup SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
        }
    }

    #[cfg(windows)]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received Ctrl+C");
    }
}
