use crate::domain::StatusClassifier;
use chrono::Utc;
use fleetwatch_common::domain::{ClassificationPolicy, VehicleStateRepository};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub struct StatusWorkerConfig {
    pub sweep_interval: Duration,
    pub policy: ClassificationPolicy,
}

/// Timer-driven process re-evaluating vehicle classifications.
///
/// Deliberately not event-triggered: it exists to catch vehicles that have
/// stopped reporting.
pub struct StatusWorker {
    classifier: StatusClassifier,
    sweep_interval: Duration,
}

impl StatusWorker {
    pub fn new(states: Arc<dyn VehicleStateRepository>, config: StatusWorkerConfig) -> Self {
        Self {
            classifier: StatusClassifier::new(states, config.policy),
            sweep_interval: config.sweep_interval,
        }
    }

    pub async fn run(&self, ctx: CancellationToken) -> anyhow::Result<()> {
        info!(
            interval_secs = self.sweep_interval.as_secs(),
            "Starting status classifier loop"
        );

        let mut ticker = tokio::time::interval(self.sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ctx.cancelled() => {
                    info!("Received shutdown signal, stopping status classifier");
                    break;
                }
                _ = ticker.tick() => {
                    // A failed sweep is retried on the next tick.
                    if let Err(e) = self.classifier.sweep(Utc::now()).await {
                        error!(error = %e, "Status sweep failed");
                    }
                }
            }
        }

        Ok(())
    }

    #[allow(clippy::type_complexity)]
    pub fn into_runner_process(
        self,
    ) -> Box<
        dyn FnOnce(
                CancellationToken,
            )
                -> std::pin::Pin<Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>>
            + Send,
    > {
        Box::new({
            let worker = self;
            move |ctx| Box::pin(async move { worker.run(ctx).await })
        })
    }
}
