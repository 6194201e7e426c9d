use std::collections::VecDeque;
use std::time::Duration;

use spool_common::{BatchMaker, Record};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{MessageConsumer, RecordCreator};
use crate::error::{ConsumerError, StageError};

/// Collects transport messages into bounded batches.
///
/// A message can expand into more records than the batch has room for; the
/// surplus is held and emitted first in the next cycle.
pub struct TransportSource<C> {
    consumer: C,
    creator: Box<dyn RecordCreator>,
    max_batch_size: usize,
    max_wait: Duration,
    pending: VecDeque<Record>,
}

impl<C: MessageConsumer> TransportSource<C> {
    pub fn new(consumer: C, creator: Box<dyn RecordCreator>, max_batch_size: usize, max_wait: Duration) -> Self {
        Self {
            consumer,
            creator,
            max_batch_size,
            max_wait,
            pending: VecDeque::new(),
        }
    }

    /// Records held over for the next cycle
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Run one produce cycle. The offset is ignored and none is returned.
    pub async fn produce(
        &mut self,
        _last_offset: Option<&str>,
        max_batch_size: usize,
        batch: &mut BatchMaker,
    ) -> Result<Option<String>, StageError> {
        let limit = self.max_batch_size.min(max_batch_size).min(batch.remaining());
        let mut emitted = 0;

        while emitted < limit {
            let Some(record) = self.pending.pop_front() else {
                break;
            };
            batch.add(record);
            emitted += 1;
        }

        let deadline = Instant::now() + self.max_wait;
        while emitted < limit {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let message = match self.consumer.next_message(deadline - now).await {
                Ok(Some(message)) => message,
                Ok(None) => break,
                Err(ConsumerError::Interrupted) => {
                    debug!("Transport wait interrupted, ending cycle");
                    break;
                }
                Err(e) => return Err(e.into()),
            };

            match self.creator.create_records(&message) {
                Ok(records) => {
                    for record in records {
                        if emitted < limit {
                            batch.add(record);
                            emitted += 1;
                        } else {
                            self.pending.push_back(record);
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        topic = %e.topic,
                        partition = e.partition,
                        offset = e.offset,
                        reason = %e.reason,
                        "Skipping message that cannot be parsed"
                    );
                    batch.report_error(format!("{}::{}", e.topic, e.partition), e.offset, e.to_string());
                }
            }
        }

        debug!(records = emitted, held = self.pending.len(), "Transport cycle complete");
        Ok(None)
    }
}
