//! Buffered event capture.
//!
//! Request handlers must never block on analytics, so recording an event is
//! a single bounded-channel send. A dedicated flush task owns the buffer and
//! writes batches to the sink when the buffer reaches the batch size, when a
//! flush timer fires, or when a caller asks for an explicit flush.
//!
//! Capture is best effort by contract: when the channel is full or a batch
//! exhausts its retries, events are counted as dropped and traffic keeps
//! flowing.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::CaptureConfig;
use crate::error::{Error, Result};
use crate::types::RawEvent;

/// Where flushed batches land. Implemented by the anonymizer.
///
/// A batch may be submitted more than once when a write fails and is
/// retried, so implementations see at-least-once delivery.
pub trait BatchSink: Send + Sync {
    fn persist(&self, batch: &[RawEvent]) -> Result<usize>;
}

/// Counters for the capture pipeline
#[derive(Debug, Default, Clone)]
pub struct CaptureStats {
    /// Events handed to `record`
    pub received: usize,
    /// Events confirmed written by the sink
    pub recorded: usize,
    /// Events lost to a full channel or an abandoned batch
    pub dropped: usize,
    /// Batches flushed (threshold, timer, or explicit)
    pub flushes: usize,
    /// Retry attempts after failed batch writes
    pub retries: usize,
}

enum BatcherMessage {
    Record(RawEvent),
    Flush(oneshot::Sender<()>),
}

/// Handle to the capture channel and its flush task.
pub struct EventBatcher {
    tx: mpsc::Sender<BatcherMessage>,
    stats: Arc<Mutex<CaptureStats>>,
    worker: JoinHandle<()>,
}

impl EventBatcher {
    /// Start the flush task. Must be called from within a tokio runtime.
    pub fn spawn(sink: Arc<dyn BatchSink>, config: &CaptureConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let stats = Arc::new(Mutex::new(CaptureStats::default()));

        let worker = FlushWorker {
            rx,
            sink,
            buffer: Vec::with_capacity(config.batch_size),
            batch_size: config.batch_size,
            flush_interval: Duration::from_secs(config.flush_interval_secs),
            max_retries: config.max_retries,
            stats: stats.clone(),
        };

        Self {
            tx,
            stats,
            worker: tokio::spawn(worker.run()),
        }
    }

    /// Queue one event. Never blocks; a full channel drops the event.
    pub fn record(&self, event: RawEvent) {
        self.stats.lock().unwrap().received += 1;

        match self.tx.try_send(BatcherMessage::Record(event)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.stats.lock().unwrap().dropped += 1;
                tracing::warn!("Capture channel full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.stats.lock().unwrap().dropped += 1;
                tracing::warn!("Capture worker is gone, dropping event");
            }
        }
    }

    /// Wait until everything recorded before this call has been flushed.
    ///
    /// The channel is FIFO, so by the time the worker reaches the flush
    /// marker it has already buffered every earlier event.
    pub async fn flush(&self) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(BatcherMessage::Flush(ack))
            .await
            .map_err(|_| Error::Queue("capture worker is gone".to_string()))?;
        done.await
            .map_err(|_| Error::Queue("capture worker dropped the flush ack".to_string()))
    }

    /// Snapshot of the capture counters
    pub fn stats(&self) -> CaptureStats {
        self.stats.lock().unwrap().clone()
    }

    /// Drain the buffer, flush it, and stop the worker.
    pub async fn shutdown(self) -> Result<CaptureStats> {
        let EventBatcher { tx, stats, worker } = self;

        // Closing the channel tells the worker to run its final flush.
        drop(tx);
        worker
            .await
            .map_err(|e| Error::Queue(format!("capture worker panicked: {}", e)))?;

        let stats = stats.lock().unwrap().clone();
        Ok(stats)
    }
}

struct FlushWorker {
    rx: mpsc::Receiver<BatcherMessage>,
    sink: Arc<dyn BatchSink>,
    buffer: Vec<RawEvent>,
    batch_size: usize,
    flush_interval: Duration,
    max_retries: usize,
    stats: Arc<Mutex<CaptureStats>>,
}

impl FlushWorker {
    async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.flush_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                message = self.rx.recv() => match message {
                    Some(BatcherMessage::Record(event)) => {
                        self.buffer.push(event);
                        if self.buffer.len() >= self.batch_size {
                            self.flush_buffer().await;
                        }
                    }
                    Some(BatcherMessage::Flush(ack)) => {
                        self.flush_buffer().await;
                        // Receiver may have given up waiting; that's fine.
                        let _ = ack.send(());
                    }
                    None => {
                        // Channel closed: final flush, then stop.
                        self.flush_buffer().await;
                        break;
                    }
                },
                _ = ticker.tick() => {
                    self.flush_buffer().await;
                }
            }
        }

        tracing::debug!("Capture flush worker stopped");
    }

    async fn flush_buffer(&mut self) {
        if self.buffer.is_empty() {
            return;
        }

        // Swap the buffer out so new events accumulate into a fresh one.
        let batch = std::mem::take(&mut self.buffer);
        self.stats.lock().unwrap().flushes += 1;

        match self.persist_with_retry(&batch).await {
            Ok(written) => {
                self.stats.lock().unwrap().recorded += written;
                tracing::debug!("Flushed {} captured events", written);
            }
            Err(e) => {
                self.stats.lock().unwrap().dropped += batch.len();
                tracing::warn!("Dropping {} events after failed flush: {}", batch.len(), e);
            }
        }
    }

    async fn persist_with_retry(&self, batch: &[RawEvent]) -> Result<usize> {
        let mut last_error = None;
        let mut delay = Duration::from_millis(100);

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                self.stats.lock().unwrap().retries += 1;
                tracing::debug!(
                    "Retrying batch write (attempt {}/{}), waiting {:?}",
                    attempt + 1,
                    self.max_retries + 1,
                    delay
                );
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, Duration::from_secs(5));
            }

            match self.sink.persist(batch) {
                Ok(written) => return Ok(written),
                Err(e) => {
                    tracing::warn!("Batch write failed: {}", e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Queue("batch write failed".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    struct MemorySink {
        batches: Mutex<Vec<Vec<RawEvent>>>,
        failures_left: Mutex<usize>,
    }

    impl MemorySink {
        fn new() -> Arc<Self> {
            Self::failing(0)
        }

        /// Sink that fails the first `times` persist calls, then succeeds.
        fn failing(times: usize) -> Arc<Self> {
            Arc::new(Self {
                batches: Mutex::new(Vec::new()),
                failures_left: Mutex::new(times),
            })
        }

        fn batch_sizes(&self) -> Vec<usize> {
            self.batches.lock().unwrap().iter().map(|b| b.len()).collect()
        }

        fn total_events(&self) -> usize {
            self.batches.lock().unwrap().iter().map(|b| b.len()).sum()
        }
    }

    impl BatchSink for MemorySink {
        fn persist(&self, batch: &[RawEvent]) -> Result<usize> {
            let mut failures = self.failures_left.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(Error::Queue("injected failure".to_string()));
            }
            self.batches.lock().unwrap().push(batch.to_vec());
            Ok(batch.len())
        }
    }

    fn make_event(n: usize) -> RawEvent {
        RawEvent {
            client_address: format!("203.0.113.{}", n),
            user_agent: "Mozilla/5.0".to_string(),
            channel_token: "shop-a".to_string(),
            received_at: Utc::now(),
        }
    }

    fn make_config(batch_size: usize, max_retries: usize) -> CaptureConfig {
        CaptureConfig {
            batch_size,
            queue_capacity: 64,
            // Keep the timer out of the way unless a test wants it.
            flush_interval_secs: 3600,
            max_retries,
        }
    }

    async fn eventually(deadline: Duration, check: impl Fn() -> bool) -> bool {
        let start = tokio::time::Instant::now();
        while start.elapsed() < deadline {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        check()
    }

    #[tokio::test]
    async fn test_flushes_when_batch_size_reached() {
        let sink = MemorySink::new();
        let batcher = EventBatcher::spawn(sink.clone(), &make_config(3, 0));

        for n in 0..3 {
            batcher.record(make_event(n));
        }
        batcher.flush().await.unwrap();

        // The threshold flush fired before the explicit one, which then
        // found an empty buffer.
        assert_eq!(sink.batch_sizes(), vec![3]);

        let stats = batcher.shutdown().await.unwrap();
        assert_eq!(stats.received, 3);
        assert_eq!(stats.recorded, 3);
        assert_eq!(stats.flushes, 1);
        assert_eq!(stats.dropped, 0);
    }

    #[tokio::test]
    async fn test_explicit_flush_drains_partial_buffer() {
        let sink = MemorySink::new();
        let batcher = EventBatcher::spawn(sink.clone(), &make_config(10, 0));

        for n in 0..4 {
            batcher.record(make_event(n));
        }
        batcher.flush().await.unwrap();

        assert_eq!(sink.batch_sizes(), vec![4]);
        batcher.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_timer_flushes_incomplete_batch() {
        let sink = MemorySink::new();
        let config = CaptureConfig {
            batch_size: 100,
            queue_capacity: 64,
            flush_interval_secs: 1,
            max_retries: 0,
        };
        let batcher = EventBatcher::spawn(sink.clone(), &config);

        batcher.record(make_event(0));

        let flushed = eventually(Duration::from_secs(5), || sink.total_events() == 1).await;
        assert!(flushed, "timer never flushed the buffered event");

        batcher.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_write_is_retried() {
        let sink = MemorySink::failing(2);
        let batcher = EventBatcher::spawn(sink.clone(), &make_config(2, 2));

        batcher.record(make_event(0));
        batcher.record(make_event(1));
        batcher.flush().await.unwrap();

        assert_eq!(sink.total_events(), 2);

        let stats = batcher.shutdown().await.unwrap();
        assert_eq!(stats.recorded, 2);
        assert_eq!(stats.retries, 2);
        assert_eq!(stats.dropped, 0);
    }

    #[tokio::test]
    async fn test_batch_dropped_after_retries_exhausted() {
        let sink = MemorySink::failing(usize::MAX);
        let batcher = EventBatcher::spawn(sink.clone(), &make_config(2, 1));

        batcher.record(make_event(0));
        batcher.record(make_event(1));
        // The flush still acks: capture never wedges on a bad sink.
        batcher.flush().await.unwrap();

        assert_eq!(sink.total_events(), 0);

        let stats = batcher.shutdown().await.unwrap();
        assert_eq!(stats.recorded, 0);
        assert_eq!(stats.dropped, 2);
        assert_eq!(stats.retries, 1);
    }

    #[tokio::test]
    async fn test_shutdown_flushes_remaining_events() {
        let sink = MemorySink::new();
        let batcher = EventBatcher::spawn(sink.clone(), &make_config(100, 0));

        batcher.record(make_event(0));
        batcher.record(make_event(1));

        let stats = batcher.shutdown().await.unwrap();
        assert_eq!(stats.recorded, 2);
        assert_eq!(sink.batch_sizes(), vec![2]);
    }
}
