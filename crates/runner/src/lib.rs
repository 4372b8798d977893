//! Supervises the service's long-running processes with graceful shutdown.
//!
//! Each consumption loop and timer is registered as a named process. All
//! processes run concurrently until a shutdown signal (SIGINT/SIGTERM)
//! arrives or any process fails, at which point every process is cancelled
//! via its token and the registered closers run under a timeout. Processes
//! are expected to finish in-flight work (acknowledgments, pending
//! publishes) when their token fires.

use futures::future::BoxFuture;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// A long-running process: receives a cancellation token and runs until
/// cancelled or failed.
pub type Process =
    Box<dyn FnOnce(CancellationToken) -> BoxFuture<'static, anyhow::Result<()>> + Send>;

/// A cleanup function executed after all processes have stopped.
pub type Closer = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send>;

pub struct Runner {
    processes: Vec<(String, Process)>,
    closers: Vec<Closer>,
    closer_timeout: Duration,
    cancellation_token: CancellationToken,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    pub fn new() -> Self {
        Self {
            processes: Vec::new(),
            closers: Vec::new(),
            closer_timeout: Duration::from_secs(10),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Register a named process. The name appears in logs and in failure
    /// reporting.
    pub fn with_named_process<N, F, Fut>(mut self, name: N, process: F) -> Self
    where
        N: Into<String>,
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.processes
            .push((name.into(), Box::new(|token| Box::pin(process(token)))));
        self
    }

    /// Register a boxed process, as produced by a worker's
    /// `into_runner_process`.
    pub fn with_boxed_process<N: Into<String>>(mut self, name: N, process: Process) -> Self {
        self.processes.push((name.into(), process));
        self
    }

    /// Register a cleanup function. Closers run after every process has
    /// stopped, whether by completion, error or cancellation.
    pub fn with_closer<F, Fut>(mut self, closer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.closers.push(Box::new(|| Box::pin(closer())));
        self
    }

    pub fn with_closer_timeout(mut self, timeout: Duration) -> Self {
        self.closer_timeout = timeout;
        self
    }

    /// Use an externally controlled cancellation token instead of the
    /// default signal-driven one.
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Run all processes to completion, then exit the application with the
    /// resulting code.
    pub async fn run(self) {
        let code = self.execute().await;
        std::process::exit(code);
    }

    /// Run all processes and closers, returning the process exit code:
    /// 0 on clean shutdown, 1 if any process failed or panicked.
    async fn execute(self) -> i32 {
        let token = self.cancellation_token;
        let closer_timeout = self.closer_timeout;
        let closers = self.closers;

        let mut join_set = JoinSet::new();
        for (name, process) in self.processes {
            let process_token = token.clone();
            join_set.spawn(async move {
                let result = process(process_token).await;
                (name, result)
            });
        }

        spawn_signal_handlers(token.clone());

        let mut failed = false;
        while let Some(result) = join_set.join_next().await {
            match result {
                Ok((name, Ok(()))) => {
                    debug!(process = %name, "Process completed");
                }
                Ok((name, Err(err))) => {
                    error!(process = %name, error = format!("{err:#}"), "Process failed");
                    failed = true;
                    token.cancel();
                }
                Err(err) => {
                    error!(error = %err, "Process panicked");
                    failed = true;
                    token.cancel();
                }
            }
        }

        if !closers.is_empty() {
            info!(timeout_secs = closer_timeout.as_secs(), "Running closers");
            if tokio::time::timeout(closer_timeout, run_closers(closers))
                .await
                .is_err()
            {
                error!("Closers timed out");
            }
        }

        if failed {
            1
        } else {
            info!("Shutdown complete");
            0
        }
    }
}

fn spawn_signal_handlers(token: CancellationToken) {
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received interrupt signal");
                ctrl_c_token.cancel();
            }
            Err(err) => error!(error = %err, "Error installing interrupt handler"),
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received SIGTERM");
                token.cancel();
            }
            Err(err) => error!(error = %err, "Error installing SIGTERM handler"),
        }
    });
}

async fn run_closers(closers: Vec<Closer>) {
    let mut closer_set = JoinSet::new();
    for closer in closers {
        closer_set.spawn(closer());
    }

    while let Some(result) = closer_set.join_next().await {
        match result {
            Ok(Ok(())) => debug!("Closer completed"),
            Ok(Err(err)) => error!(error = format!("{err:#}"), "Closer failed"),
            Err(err) => error!(error = %err, "Closer panicked"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_clean_shutdown_exits_zero_and_runs_closers() {
        let closed = Arc::new(AtomicBool::new(false));
        let closed_flag = closed.clone();

        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let code = Runner::new()
            .with_named_process("looper", |ctx: CancellationToken| async move {
                ctx.cancelled().await;
                Ok(())
            })
            .with_closer(move || {
                let flag = closed_flag.clone();
                async move {
                    flag.store(true, Ordering::SeqCst);
                    Ok(())
                }
            })
            .with_cancellation_token(token)
            .execute()
            .await;

        assert_eq!(code, 0);
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_failing_process_cancels_the_rest_and_exits_nonzero() {
        let code = Runner::new()
            .with_named_process("broken", |_ctx| async move {
                Err(anyhow::anyhow!("cannot connect to broker"))
            })
            .with_named_process("healthy", |ctx: CancellationToken| async move {
                ctx.cancelled().await;
                Ok(())
            })
            .execute()
            .await;

        assert_eq!(code, 1);
    }

    #[tokio::test]
    async fn test_closer_timeout_does_not_hang_shutdown() {
        let token = CancellationToken::new();
        token.cancel();

        let code = Runner::new()
            .with_named_process("looper", |ctx: CancellationToken| async move {
                ctx.cancelled().await;
                Ok(())
            })
            .with_closer(|| async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .with_closer_timeout(Duration::from_millis(50))
            .with_cancellation_token(token)
            .execute()
            .await;

        assert_eq!(code, 0);
    }
}
