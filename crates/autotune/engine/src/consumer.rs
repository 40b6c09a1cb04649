use crate::config::StreamSettings;
use crate::error::EngineResult;
use crate::orchestrator::LearningOrchestrator;
use autotune_storage::{AutotuneStorage, StorageError};
use autotune_stream::{
    decode_batch, encode_event, EntryId, EventStream, StreamCursor, StreamEntry, StreamError,
};
use autotune_types::{EventStatus, LearningEvent, LearningEventType, LearningPattern};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Tag carried by events the engine publishes itself.
pub const DERIVED_TAG: &str = "derived";

/// Reads learning events from the stream in batches and feeds them to the
/// orchestrator.
///
/// Every consumed event is persisted and walked through
/// PENDING -> PROCESSING -> COMPLETED, or FAILED when its batch errors.
pub struct StreamConsumer {
    stream: Arc<dyn EventStream>,
    orchestrator: Arc<LearningOrchestrator>,
    settings: StreamSettings,
    cursor: Mutex<StreamCursor>,
    running: AtomicBool,
    cancel: Mutex<Option<CancellationToken>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl StreamConsumer {
    pub fn new(
        stream: Arc<dyn EventStream>,
        orchestrator: Arc<LearningOrchestrator>,
        settings: StreamSettings,
    ) -> Self {
        Self {
            stream,
            orchestrator,
            settings,
            cursor: Mutex::new(StreamCursor::New),
            running: AtomicBool::new(false),
            cancel: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    /// Start reading from `cursor` instead of only new entries.
    pub fn with_cursor(self, cursor: StreamCursor) -> Self {
        *lock(&self.cursor) = cursor;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn cursor(&self) -> StreamCursor {
        *lock(&self.cursor)
    }

    fn storage(&self) -> &Arc<dyn AutotuneStorage> {
        self.orchestrator.storage()
    }

    /// Spawn the consumer loop. Starting a running consumer only logs.
    pub fn start(self: &Arc<Self>) -> bool {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("stream consumer is already running");
            return false;
        }
        let token = CancellationToken::new();
        *lock(&self.cancel) = Some(token.clone());
        let consumer = Arc::clone(self);
        let handle = tokio::spawn(async move { consumer.run(token).await });
        *lock(&self.task) = Some(handle);
        tracing::info!(batch_size = self.settings.batch_size, "stream consumer started");
        true
    }

    /// Stop the loop, abandoning a blocked read. Stopping a consumer that is
    /// not running only logs.
    pub fn stop(&self) -> bool {
        if !self.running.swap(false, Ordering::SeqCst) {
            tracing::warn!("stream consumer is not running");
            return false;
        }
        if let Some(token) = lock(&self.cancel).take() {
            token.cancel();
        }
        tracing::info!("stream consumer stopped");
        true
    }

    /// Wait for the loop task to exit after [`stop`](Self::stop).
    pub async fn join(&self) {
        let handle = lock(&self.task).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "stream consumer task panicked");
            }
        }
    }

    async fn run(&self, cancel: CancellationToken) {
        while self.is_running() && !cancel.is_cancelled() {
            let entries = match self
                .stream
                .read(self.cursor(), self.settings.batch_size, &cancel)
                .await
            {
                Ok(entries) => entries,
                Err(StreamError::Cancelled) => break,
                Err(e) => {
                    tracing::error!(error = %e, "stream read failed");
                    if !self.back_off(&cancel).await {
                        break;
                    }
                    continue;
                }
            };

            if let Err(e) = self.handle_entries(&entries).await {
                tracing::error!(error = %e, entries = entries.len(), "event batch failed");
                if !self.back_off(&cancel).await {
                    break;
                }
            }
        }
        tracing::debug!("stream consumer loop exited");
    }

    /// Sleep the retry delay. False when cancelled first.
    async fn back_off(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(self.settings.retry_delay()) => true,
        }
    }

    /// Persist, process and settle one batch of raw entries.
    ///
    /// The cursor moves past the batch once every event in it is stored.
    /// When storing fails part way, events already claimed are failed and
    /// queued for retry, and the cursor stops just before the entry that
    /// could not be stored so the next read picks it up again.
    pub async fn handle_entries(&self, entries: &[StreamEntry]) -> EngineResult<()> {
        let batch = decode_batch(entries);
        if !batch.failures.is_empty() {
            for failure in &batch.failures {
                tracing::warn!(error = %failure, "skipping undecodable stream entry");
            }
            self.orchestrator
                .metrics()
                .record_failed_events(batch.failures.len());
        }

        let mut work = Vec::with_capacity(batch.events.len());
        for (entry_id, event) in batch.events {
            match self.admit(event).await {
                Ok(Some(event)) => work.push(event),
                Ok(None) => {}
                Err(e) => {
                    self.rewind_before(entries, entry_id);
                    if let Err(settle_err) = self.fail_batch(&work).await {
                        tracing::warn!(error = %settle_err, "claimed events not released");
                    }
                    return Err(e);
                }
            }
        }
        if let Some(last) = batch.last_id {
            *lock(&self.cursor) = StreamCursor::After(last);
        }
        if work.is_empty() {
            return Ok(());
        }

        match self.orchestrator.process_learning_batch(&work).await {
            Ok(outcome) => {
                self.settle(&work, EventStatus::Completed).await?;
                if self.settings.publish_derived_events {
                    self.publish_derived(&outcome.patterns).await;
                }
                Ok(())
            }
            Err(e) => {
                self.fail_batch(&work).await?;
                Err(e)
            }
        }
    }

    /// Point the cursor at the entry preceding `failed`. Left alone when
    /// `failed` opens the batch.
    fn rewind_before(&self, entries: &[StreamEntry], failed: EntryId) {
        let position = entries.iter().position(|entry| entry.id == failed);
        if let Some(previous) = position.and_then(|p| p.checked_sub(1)) {
            *lock(&self.cursor) = StreamCursor::After(entries[previous].id);
        }
    }

    async fn fail_batch(&self, work: &[LearningEvent]) -> EngineResult<()> {
        self.settle(work, EventStatus::Failed).await?;
        self.orchestrator.metrics().record_failed_events(work.len());
        self.schedule_retries(work).await;
        Ok(())
    }

    /// Store the event as PENDING and claim it. Derived events and events
    /// already past PENDING are not processed again.
    async fn admit(&self, mut event: LearningEvent) -> EngineResult<Option<LearningEvent>> {
        event.status = EventStatus::Pending;
        match self.storage().append_event(event.clone()).await {
            Ok(()) => {}
            Err(StorageError::Conflict(_)) => {
                let stored = self.storage().get_event(&event.id).await?;
                if stored.map(|e| e.status) != Some(EventStatus::Pending) {
                    tracing::debug!(event_id = %event.id, "event already stored");
                    return Ok(None);
                }
                // stored by an earlier attempt that never claimed it
            }
            Err(e) => return Err(e.into()),
        }

        if event.has_tag(DERIVED_TAG) {
            self.storage()
                .transition_event(&event.id, EventStatus::Pending, EventStatus::Ignored)
                .await?;
            return Ok(None);
        }

        self.storage()
            .transition_event(&event.id, EventStatus::Pending, EventStatus::Processing)
            .await?;
        event.status = EventStatus::Processing;
        Ok(Some(event))
    }

    async fn settle(&self, events: &[LearningEvent], to: EventStatus) -> EngineResult<()> {
        for event in events {
            self.storage()
                .transition_event(&event.id, EventStatus::Processing, to)
                .await?;
        }
        Ok(())
    }

    /// Re-publish a fresh copy of each failed event while it has attempts left.
    async fn schedule_retries(&self, events: &[LearningEvent]) {
        for event in events {
            if event.retry_count >= self.settings.max_retries {
                tracing::warn!(
                    event_id = %event.id,
                    attempts = event.retry_count + 1,
                    "event failed permanently"
                );
                continue;
            }
            let copy = event.retry_copy();
            let published = match encode_event(&copy) {
                Ok(fields) => self.stream.publish(fields).await.map(|_| ()),
                Err(e) => Err(e),
            };
            match published {
                Ok(()) => tracing::debug!(
                    event_id = %event.id,
                    retry_id = %copy.id,
                    retry_count = copy.retry_count,
                    "event queued for retry"
                ),
                Err(e) => tracing::warn!(event_id = %event.id, error = %e, "retry not queued"),
            }
        }
    }

    async fn publish_derived(&self, patterns: &[LearningPattern]) {
        for pattern in patterns {
            let event = LearningEvent::new(LearningEventType::SignalDetected)
                .with_tag(DERIVED_TAG)
                .with_metadata("patternId", pattern.id.as_str())
                .with_metadata("patternType", pattern.pattern_type.as_str())
                .with_metadata("confidence", pattern.confidence)
                .with_metadata("source", pattern.metadata.source.as_str());
            let published = match encode_event(&event) {
                Ok(fields) => self.stream.publish(fields).await.map(|_| ()),
                Err(e) => Err(e),
            };
            if let Err(e) = published {
                tracing::warn!(pattern_id = %pattern.id, error = %e, "derived event not published");
            }
        }
    }
}
