//! # Maintenance Task
//!
//! Background timer that keeps a `CacheEngine` tidy. Each tick sweeps a
//! bounded batch of expired L1 entries, re-evaluates the circuit breaker
//! cooldown and publishes a [`MaintenanceReport`]. An optional
//! [`CacheWarmer`] is polled on its own, slower interval.
//!
//! ```rust,no_run
//! use tiercache_core::config::CacheEngineConfig;
//! use tiercache_core::engine::{CacheEngine, MaintenanceTask};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = CacheEngine::from_config(CacheEngineConfig::default()).await?;
//! let handle = MaintenanceTask::new(engine.clone()).spawn();
//!
//! // ... serve traffic ...
//!
//! handle.shutdown().await;
//! # Ok(())
//! # }
//! ```

use super::CacheEngine;
use crate::config::MaintenanceConfig;
use crate::local::{CacheValue, SweepReport};
use crate::stats::StatisticsSnapshot;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::CacheHealthStatus;

/// Outcome of one maintenance tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceReport {
    pub sweep: SweepReport,
    pub statistics: StatisticsSnapshot,
    pub health: CacheHealthStatus,
    pub completed_at: DateTime<Utc>,
}

/// Entries to pre-load into one namespace
#[derive(Debug, Clone)]
pub struct WarmingBatch {
    pub namespace: String,
    /// `(identifier, value)` pairs
    pub entries: Vec<(String, CacheValue)>,
}

impl WarmingBatch {
    pub fn new(namespace: impl Into<String>, entries: Vec<(String, CacheValue)>) -> Self {
        Self {
            namespace: namespace.into(),
            entries,
        }
    }
}

/// Source of data for scheduled cache warming
///
/// Implemented by the application; the engine only decides when to ask.
#[async_trait]
pub trait CacheWarmer: Send + Sync {
    async fn load(&self) -> anyhow::Result<Vec<WarmingBatch>>;

    fn name(&self) -> &str {
        "cache_warmer"
    }
}

/// Builder for the background maintenance loop
pub struct MaintenanceTask {
    engine: CacheEngine,
    config: MaintenanceConfig,
    warmer: Option<Arc<dyn CacheWarmer>>,
}

impl std::fmt::Debug for MaintenanceTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaintenanceTask")
            .field("engine_id", &self.engine.engine_id())
            .field("interval_seconds", &self.config.interval_seconds)
            .field("sweep_budget", &self.config.sweep_budget)
            .field("warmer", &self.warmer.as_ref().map(|w| w.name().to_string()))
            .finish()
    }
}

impl MaintenanceTask {
    /// Maintenance loop using the engine's configured cadence
    pub fn new(engine: CacheEngine) -> Self {
        let config = engine.config().maintenance.clone();
        Self::with_config(engine, config)
    }

    pub fn with_config(engine: CacheEngine, config: MaintenanceConfig) -> Self {
        Self {
            engine,
            config,
            warmer: None,
        }
    }

    pub fn with_warmer(mut self, warmer: Arc<dyn CacheWarmer>) -> Self {
        self.warmer = Some(warmer);
        self
    }

    /// Start the loop on the current runtime
    ///
    /// The first tick fires immediately, as does the first warming poll.
    pub fn spawn(self) -> MaintenanceHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let (report_tx, report_rx) = watch::channel::<Option<MaintenanceReport>>(None);

        info!(
            engine_id = %self.engine.engine_id(),
            interval_seconds = self.config.interval_seconds,
            sweep_budget = self.config.sweep_budget,
            warming = self.warmer.is_some(),
            "Starting cache maintenance task"
        );

        let join = tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.interval());
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut warming = tokio::time::interval(self.config.warming_interval());
            warming.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        info!(engine_id = %self.engine.engine_id(), "Cache maintenance task stopping");
                        break;
                    }
                    _ = interval.tick() => {
                        let report = self.engine.run_maintenance_with(self.config.sweep_budget);
                        report_tx.send_replace(Some(report));
                    }
                    _ = warming.tick(), if self.warmer.is_some() => {
                        if let Some(warmer) = &self.warmer {
                            self.run_warmer(warmer.as_ref()).await;
                        }
                    }
                }
            }
        });

        MaintenanceHandle {
            shutdown: Some(shutdown_tx),
            join,
            reports: report_rx,
        }
    }

    /// Poll the warmer once; failures are logged and never stop the loop
    async fn run_warmer(&self, warmer: &dyn CacheWarmer) {
        let batches = match warmer.load().await {
            Ok(batches) => batches,
            Err(e) => {
                warn!(warmer = warmer.name(), error = %e, "Cache warmer failed to load data");
                return;
            }
        };

        let mut warmed = 0usize;
        for batch in batches {
            match self.engine.warm(&batch.namespace, batch.entries).await {
                Ok(count) => warmed += count,
                Err(e) => {
                    error!(
                        warmer = warmer.name(),
                        namespace = %batch.namespace,
                        error = %e,
                        "Cache warming batch rejected"
                    );
                }
            }
        }
        debug!(warmer = warmer.name(), entries = warmed, "Cache warming cycle complete");
    }
}

/// Handle to a running maintenance loop
///
/// Dropping the handle closes the shutdown channel, which stops the loop
/// just like [`MaintenanceHandle::shutdown`] without waiting for it.
#[derive(Debug)]
pub struct MaintenanceHandle {
    shutdown: Option<oneshot::Sender<()>>,
    join: JoinHandle<()>,
    reports: watch::Receiver<Option<MaintenanceReport>>,
}

impl MaintenanceHandle {
    /// Stop after the current tick and wait for the loop to exit
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.join).await {
            if e.is_panic() {
                error!(error = %e, "Cache maintenance task panicked");
            }
        }
    }

    /// Cancel the loop immediately
    pub fn abort(&self) {
        self.join.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Receiver of the latest report; `None` until the first tick completes
    pub fn reports(&self) -> watch::Receiver<Option<MaintenanceReport>> {
        self.reports.clone()
    }

    pub fn latest_report(&self) -> Option<MaintenanceReport> {
        self.reports.borrow().clone()
    }
}
