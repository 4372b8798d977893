use crate::nats::supervisor::RetrySupervisor;
use crate::nats::traits::{JetStreamConsumer, PullConsumer};
use anyhow::Result;
use async_nats::jetstream;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Durable pull-consumer loop over one stream.
///
/// Messages in a fetched batch are processed strictly in order, one at a
/// time, through the retry/dead-letter supervisor. Subjects carry the
/// vehicle-id partition key, so sequential processing preserves per-vehicle
/// ordering. A batch in flight is finished (including acks) before shutdown
/// completes, avoiding reprocessing on restart.
pub struct NatsConsumer {
    consumer: Box<dyn PullConsumer>,
    batch_size: usize,
    max_wait: Duration,
    supervisor: RetrySupervisor,
}

impl NatsConsumer {
    pub async fn new(
        client: Arc<dyn JetStreamConsumer>,
        stream_name: &str,
        consumer_name: &str,
        subject_filter: &str,
        batch_size: usize,
        max_wait_secs: u64,
        supervisor: RetrySupervisor,
    ) -> Result<Self> {
        debug!(
            stream = stream_name,
            consumer = consumer_name,
            subject = subject_filter,
            "Creating JetStream consumer"
        );

        let consumer = client
            .create_consumer(
                jetstream::consumer::pull::Config {
                    name: Some(consumer_name.to_string()),
                    durable_name: Some(consumer_name.to_string()),
                    filter_subject: subject_filter.to_string(),
                    ack_policy: jetstream::consumer::AckPolicy::Explicit,
                    ..Default::default()
                },
                stream_name,
            )
            .await?;

        info!(
            stream = stream_name,
            consumer = consumer_name,
            "Consumer created successfully"
        );

        Ok(Self {
            consumer,
            batch_size,
            max_wait: Duration::from_secs(max_wait_secs),
            supervisor,
        })
    }

    pub async fn run(&self, ctx: CancellationToken) -> Result<()> {
        info!(stream = %self.supervisor.stream(), "Starting consumer loop");

        loop {
            // Only the fetch is cancellable: a batch already fetched is
            // processed and acknowledged in full before shutdown completes.
            let messages = tokio::select! {
                _ = ctx.cancelled() => {
                    info!(stream = %self.supervisor.stream(), "Received shutdown signal, stopping consumer");
                    break;
                }
                result = self.consumer.fetch_messages(self.batch_size, self.max_wait) => {
                    match result {
                        Ok(messages) => messages,
                        Err(e) => {
                            error!(error = %e, "Error fetching batch");
                            tokio::time::sleep(Duration::from_secs(1)).await;
                            continue;
                        }
                    }
                }
            };

            self.process_batch(messages).await;
        }

        info!(stream = %self.supervisor.stream(), "Consumer stopped gracefully");
        Ok(())
    }

    async fn process_batch(&self, messages: Vec<jetstream::Message>) {
        if messages.is_empty() {
            return;
        }

        debug!(message_count = messages.len(), "Received message batch");

        for msg in messages {
            let subject = msg.subject.to_string();
            match self.supervisor.process(&subject, &msg.payload).await {
                Ok(_) => {
                    if let Err(e) = msg.ack().await {
                        error!(error = %e, subject = %subject, "Failed to acknowledge message");
                    }
                }
                Err(e) => {
                    // Dead-letter redirection failed; nak so the broker
                    // redelivers and the message is not lost.
                    error!(error = %e, subject = %subject, "Rejecting message for redelivery");
                    if let Err(e) = msg.ack_with(jetstream::AckKind::Nak(None)).await {
                        error!(error = %e, subject = %subject, "Failed to reject message");
                    }
                }
            }
        }
    }
}

// Note: unit tests for the consumer loop would need real NATS Message
// objects, which cannot be constructed without a broker connection. The
// ack/retry decision logic lives in RetrySupervisor, which is fully covered
// by unit tests; the loop itself is exercised against a real broker.
