use anyhow::Context;
use clap::Parser;
use colorcell::burn::BurnPool;
use colorcell::color::{ColorPicker, Palette, SystemRandom};
use colorcell::config::{Args, CpuBurn, Overrides};
use colorcell::policy::PolicyEvaluator;
use colorcell::server::{
    build_router, shutdown_channel, spawn_server, AppState, DrainState, OsSignals, ShutdownConfig,
    ShutdownCoordinator,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Resolve `--cpu-burn` against the processing units of this machine
fn cpu_burn(args: &Args) -> anyhow::Result<CpuBurn> {
    CpuBurn::parse(&args.cpu_burn, num_cpus::get()).context("Invalid CPU burn configuration")
}

/// Capture the environment overrides, warning about values that will fail requests
fn load_overrides() -> Overrides {
    let overrides = Overrides::from_env();
    for problem in overrides.validate() {
        warn!(error = %problem, "Override is malformed; affected requests will fail");
    }
    info!(
        color = overrides.color().unwrap_or("random"),
        "Environment overrides loaded"
    );
    overrides
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    info!("Starting colorcell");

    // Misconfigured burn count must stop the process before it serves anything
    let burn = cpu_burn(&args)?;
    let overrides = load_overrides();

    // Register handlers before serving so an early SIGTERM is not lost
    let signals = OsSignals::register().context("Cannot register signal handlers")?;

    let (shutdown_controller, shutdown_signal) = shutdown_channel();
    let drain = DrainState::new();

    let picker = ColorPicker::new(
        Palette::default(),
        Arc::new(SystemRandom::seeded_from_clock()),
    );
    let evaluator = Arc::new(PolicyEvaluator::new(overrides, picker));
    let router = build_router(AppState::new(evaluator, drain.clone()), &args.static_dir);

    let listener = TcpListener::bind(args.bind_addr())
        .await
        .with_context(|| format!("Could not listen on {}", args.listen_addr))?;

    let burn_pool =
        BurnPool::start(&shutdown_signal, burn).context("Failed to start CPU burn workers")?;
    let server = spawn_server(listener, router).context("Failed to start HTTP server")?;

    let coordinator = ShutdownCoordinator::new(
        ShutdownConfig {
            grace_period: args.grace_period(),
            shutdown_timeout: args.shutdown_timeout(),
        },
        drain,
        shutdown_controller,
    );
    let coordinator = tokio::spawn(coordinator.run(signals, server));

    coordinator
        .await
        .context("Shutdown coordinator task failed")?
        .context("Could not gracefully shut down the server")?;

    shutdown_signal.wait().await;
    let stopped = tokio::task::spawn_blocking(move || burn_pool.join())
        .await
        .context("Failed to join CPU burn workers")?;
    if stopped > 0 {
        info!(workers = stopped, "CPU burn workers stopped");
    }

    info!("Server stopped");
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
