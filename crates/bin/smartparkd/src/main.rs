//! # smartparkd — smartpark daemon
//!
//! Composition root that wires a car park, its displays and its sensors to
//! a pub/sub transport and runs them.
//!
//! ## Responsibilities
//! - Load configuration (TOML file, env vars)
//! - Initialise logging
//! - Open one transport session per device (MQTT, or the in-process broker)
//! - Construct application services, injecting sessions via the `Transport` port
//! - Handle graceful shutdown (Ctrl+C)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;
mod display;
mod roles;

use std::time::Duration;

use smartpark_app::broker::InProcessBroker;

use crate::config::{Config, TransportKind};
use crate::roles::{Deployment, Link};

/// How long roles get to stop after a quit before they are aborted.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_new(&config.logging.filter)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    init_tracing(&config);

    let car_park = config.selected_car_park()?;
    tracing::info!(
        car_park = %car_park.name,
        role = ?config.runtime.role,
        transport = ?config.runtime.transport,
        available = ?config.car_park_names(),
        "starting smartparkd"
    );

    let link = match config.runtime.transport {
        TransportKind::Mqtt => Link::Mqtt,
        TransportKind::Memory => Link::Memory(InProcessBroker::new()),
    };
    let mut deployment = match Deployment::start(&config, link).await {
        Ok(deployment) => deployment,
        Err(err) => {
            tracing::error!(error = %err, "startup failed");
            return Err(err.into());
        }
    };

    tracing::info!(
        roles = deployment.task_count(),
        display_topic = %config.display_topic(&car_park.name)?,
        "smartparkd running"
    );

    tokio::select! {
        () = deployment.finished() => {
            tracing::info!("every role stopped");
        }
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("interrupt received, shutting down");
            deployment.interrupt().await?;
            if tokio::time::timeout(SHUTDOWN_GRACE, deployment.finished()).await.is_err() {
                tracing::warn!("roles did not stop in time");
            }
        }
    }

    deployment.close(SHUTDOWN_GRACE).await;
    tracing::info!("smartparkd stopped");
    Ok(())
}
