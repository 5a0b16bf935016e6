//! MQ Loadgen - Main Entry Point
//! Composition root: logging, configuration, AMQP adapter, scheduler, signals

mod config;
mod telemetry;

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use loadgen_core::application::worker::constants::GRACEFUL_SHUTDOWN_TIMEOUT;
use loadgen_core::application::{shutdown_channel, Scheduler, StatsReporter, ThroughputStats};
use loadgen_core::port::time_provider::SystemTimeProvider;
use loadgen_core::port::{CompositeObserver, TracingObserver};
use loadgen_infra_amqp::AmqpConnector;

use crate::config::Args;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_LOG_FILTER: &str = "mq_loadgen=info,loadgen_core=info,loadgen_infra_amqp=info";

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging
    let log_format = std::env::var("LOADGEN_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(DEFAULT_LOG_FILTER)?,
    };
    let (writer, _log_guard) = tracing_appender::non_blocking(std::io::stdout());

    let otlp_endpoint = telemetry::otlp_endpoint();
    #[cfg(feature = "telemetry")]
    let otel_layer = match otlp_endpoint.as_deref() {
        Some(endpoint) => Some(telemetry::layer::<tracing_subscriber::Registry>(endpoint)?),
        None => None,
    };
    #[cfg(not(feature = "telemetry"))]
    let otel_layer: Option<tracing_subscriber::layer::Identity> = None;

    match log_format.as_str() {
        "json" => {
            // Production: JSON structured logging
            tracing_subscriber::registry()
                .with(otel_layer)
                .with(env_filter)
                .with(fmt::layer().json().with_writer(writer))
                .init();
        }
        _ => {
            // Development: human readable
            tracing_subscriber::registry()
                .with(otel_layer)
                .with(env_filter)
                .with(fmt::layer().with_writer(writer))
                .init();
        }
    }

    info!("MQ Loadgen v{} starting...", VERSION);
    if let Some(endpoint) = &otlp_endpoint {
        if cfg!(feature = "telemetry") {
            info!(endpoint = %endpoint, "OpenTelemetry export enabled");
        } else {
            warn!("OpenTelemetry endpoint set but feature 'telemetry' not enabled");
        }
    }

    // 2. Load configuration
    let args = Args::parse();
    let stats_interval = args.stats_interval();
    let load_config = args.into_load_config()?;

    // 3. Setup dependencies (DI wiring)
    let stats = Arc::new(ThroughputStats::new());
    let observer = Arc::new(
        CompositeObserver::new()
            .with(Arc::new(TracingObserver))
            .with(stats.clone()),
    );
    let scheduler = Scheduler::new(
        load_config,
        Arc::new(AmqpConnector::new()),
        observer,
        Arc::new(SystemTimeProvider),
    )?;

    let (shutdown_tx, shutdown_rx) = shutdown_channel();

    // 4. Start throughput reporter
    let reporter_handle = stats_interval.map(|every| tokio::spawn(StatsReporter::new(stats, every).run(shutdown_rx)));

    // 5. Run workers until they fail or a shutdown signal arrives
    let run = scheduler.run(&shutdown_tx);
    tokio::pin!(run);

    let outcome = tokio::select! {
        result = &mut run => result,
        signal = shutdown_signal() => {
            if let Err(e) = signal {
                warn!(error = %e, "Signal handler failed, shutting down");
            }
            info!("Shutdown signal received. Stopping workers...");
            shutdown_tx.shutdown();
            match tokio::time::timeout(GRACEFUL_SHUTDOWN_TIMEOUT, &mut run).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        timeout_secs = GRACEFUL_SHUTDOWN_TIMEOUT.as_secs(),
                        "Workers did not stop in time, abandoning them"
                    );
                    Ok(Vec::new())
                }
            }
        }
    };

    // 6. Stop reporter
    shutdown_tx.shutdown();
    if let Some(handle) = reporter_handle {
        let _ = handle.await;
    }
    telemetry::shutdown();

    match outcome {
        Ok(summaries) => {
            for summary in &summaries {
                info!(
                    worker_id = summary.worker_id,
                    role = %summary.role,
                    iterations = summary.iterations,
                    operations = summary.operations,
                    "Worker summary"
                );
            }
            info!("Shutdown complete.");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Load generator stopped on failure");
            Err(e.into())
        }
    }
}

/// Resolves on Ctrl+C, or SIGTERM on unix
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    Ok(())
}
