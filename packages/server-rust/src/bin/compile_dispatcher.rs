//! # compile-dispatcher
//!
//! Reads compile requests as newline-delimited JSON on stdin, loads each
//! submission from a directory of JSON documents, compiles the languages
//! that need it, and writes `{submission, type}` results to stdout.
//!
//! ```bash
//! compile-dispatcher --store-dir ./data --health-port 8081 < requests.jsonl
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use judge_dispatch_core::{Language, WireFormat};
use judge_dispatch_server::backend::ToolchainConfig;
use judge_dispatch_server::bus::{LinePublisher, LineSubscription};
use judge_dispatch_server::network::{serve_health, HealthAppState, ShutdownController};
use judge_dispatch_server::observability::{init_logging, install_metrics_exporter, LogFormat};
use judge_dispatch_server::service::{
    build_dispatch_pipeline, BackendRegistry, CompileFailurePolicy, ConsumeLoop,
    DispatchOrchestrator, DispatcherConfig,
};
use judge_dispatch_server::storage::FileSubmissionStore;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

// ============================================================================
// CLI Arguments
// ============================================================================

/// Compile dispatch worker.
#[derive(Debug, Parser)]
#[command(name = "compile-dispatcher")]
#[command(about = "Routes compile requests to language backends and publishes the results")]
#[command(version)]
struct Args {
    /// Directory holding `<collection>/<id>.json` submission documents.
    #[arg(long, env = "DISPATCH_STORE_DIR", default_value = "data")]
    store_dir: PathBuf,

    /// Root directory for compilation workspaces.
    #[arg(long, env = "DISPATCH_ARTIFACT_DIR")]
    artifact_dir: Option<PathBuf>,

    #[arg(long, env = "DISPATCH_COMPILE_TIMEOUT_SECS", default_value = "30")]
    compile_timeout_secs: u64,

    /// Languages compiled before publishing; the rest pass through.
    #[arg(
        long,
        env = "DISPATCH_COMPILED_LANGUAGES",
        value_delimiter = ',',
        default_value = "cpp"
    )]
    compiled_languages: Vec<Language>,

    /// Maximum requests processed concurrently.
    #[arg(long, env = "DISPATCH_MAX_IN_FLIGHT", default_value = "8")]
    max_in_flight: usize,

    /// What to do when a compilation backend fails: `publish` or `drop`.
    #[arg(long, env = "DISPATCH_COMPILE_FAILURE_POLICY", default_value = "publish")]
    compile_failure_policy: CompileFailurePolicy,

    /// Drop requests whose type is neither graded nor practice.
    #[arg(long, env = "DISPATCH_STRICT_REQUEST_TYPES")]
    strict_request_types: bool,

    /// Process requests for the same submission one at a time.
    #[arg(long, env = "DISPATCH_SERIALIZE_PER_SUBMISSION")]
    serialize_per_submission: bool,

    #[arg(long, env = "DISPATCH_DRAIN_TIMEOUT_SECS", default_value = "30")]
    drain_timeout_secs: u64,

    #[arg(long, env = "DISPATCH_INBOUND_QUEUE", default_value = "submission_requests")]
    inbound_queue: String,

    #[arg(long, env = "DISPATCH_OUTBOUND_QUEUE", default_value = "processed_submission")]
    outbound_queue: String,

    #[arg(long, env = "DISPATCH_GRADED_COLLECTION", default_value = "submissions")]
    graded_collection: String,

    #[arg(long, env = "DISPATCH_PRACTICE_COLLECTION", default_value = "playground_submissions")]
    practice_collection: String,

    /// Log output format: `pretty` or `json`.
    #[arg(long, env = "DISPATCH_LOG_FORMAT", default_value = "pretty")]
    log_format: LogFormat,

    /// Port for `/health` endpoints. Disabled when unset.
    #[arg(long, env = "DISPATCH_HEALTH_PORT")]
    health_port: Option<u16>,

    /// Port for the Prometheus `/metrics` exporter. Disabled when unset.
    #[arg(long, env = "DISPATCH_METRICS_PORT")]
    metrics_port: Option<u16>,
}

impl Args {
    fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            inbound_queue: self.inbound_queue.clone(),
            outbound_queue: self.outbound_queue.clone(),
            graded_collection: self.graded_collection.clone(),
            practice_collection: self.practice_collection.clone(),
            max_in_flight: self.max_in_flight,
            compile_failure_policy: self.compile_failure_policy,
            // Line transport carries text only.
            wire_format: WireFormat::Json,
            strict_request_types: self.strict_request_types,
            serialize_per_submission: self.serialize_per_submission,
            drain_timeout: Duration::from_secs(self.drain_timeout_secs),
        }
    }

    fn toolchain_config(&self) -> ToolchainConfig {
        let defaults = ToolchainConfig::default();
        ToolchainConfig {
            artifact_root: self.artifact_dir.clone().unwrap_or(defaults.artifact_root),
            compile_timeout: Duration::from_secs(self.compile_timeout_secs),
            max_diagnostic_bytes: defaults.max_diagnostic_bytes,
        }
    }
}

// ============================================================================
// Main
// ============================================================================

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_format);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run(args));
    // A pending stdin read would otherwise keep the runtime alive.
    runtime.shutdown_timeout(Duration::from_secs(1));
    result
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = args.dispatcher_config();
    let toolchains = args.toolchain_config();

    if let Some(port) = args.metrics_port {
        install_metrics_exporter(SocketAddr::from(([0, 0, 0, 0], port)))?;
    }

    let store = Arc::new(FileSubmissionStore::new(&args.store_dir));
    let registry = Arc::new(BackendRegistry::with_toolchains(&args.compiled_languages, &toolchains));
    tracing::info!(
        store_dir = %args.store_dir.display(),
        artifact_root = %toolchains.artifact_root.display(),
        compiled = ?registry.compiled_languages(),
        policy = %config.compile_failure_policy,
        "starting compile dispatcher"
    );

    let orchestrator = Arc::new(DispatchOrchestrator::new(
        &config,
        store,
        registry,
        Arc::new(LinePublisher::stdout()),
    ));
    let shutdown = Arc::new(ShutdownController::new());
    let consumer = ConsumeLoop::new(
        build_dispatch_pipeline(orchestrator),
        &config,
        Arc::clone(&shutdown),
    );

    let health = match args.health_port {
        Some(port) => {
            let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await?;
            let state = HealthAppState {
                shutdown: Arc::clone(&shutdown),
                counters: consumer.counters(),
                start_time: std::time::Instant::now(),
            };
            let (stop, stopped) = oneshot::channel::<()>();
            let server = tokio::spawn(serve_health(listener, state, async move {
                let _ = stopped.await;
            }));
            Some((stop, server))
        }
        None => None,
    };

    let signal_shutdown = Arc::clone(&shutdown);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
            signal_shutdown.trigger_shutdown();
        }
    });

    let stats = consumer
        .run(LineSubscription::stdin(config.inbound_queue.clone()))
        .await;

    if let Some((stop, server)) = health {
        let _ = stop.send(());
        match server.await {
            Ok(Err(e)) => tracing::error!(error = %e, "health server failed"),
            Err(e) => tracing::error!(error = %e, "health server task failed"),
            Ok(Ok(())) => {}
        }
    }

    tracing::info!(
        received = stats.received,
        published = stats.published,
        dropped = stats.dropped,
        failed = stats.failed,
        "compile dispatcher stopped"
    );
    Ok(())
}
