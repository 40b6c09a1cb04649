use crate::entry::{EntryId, StreamCursor, StreamEntry};
use crate::error::{StreamError, StreamResult};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Append-only event stream collaborator.
#[async_trait]
pub trait EventStream: Send + Sync {
    /// Return up to `count` entries after `cursor`, waiting until at least one
    /// exists. Fails with [`StreamError::Cancelled`] once `cancel` fires.
    async fn read(
        &self,
        cursor: StreamCursor,
        count: usize,
        cancel: &CancellationToken,
    ) -> StreamResult<Vec<StreamEntry>>;

    async fn publish(&self, fields: BTreeMap<String, String>) -> StreamResult<EntryId>;
}

/// Stream held in process memory; wakes blocked readers on publish.
#[derive(Default)]
pub struct InMemoryEventStream {
    entries: Mutex<Vec<StreamEntry>>,
    appended: Notify,
    failing_reads: AtomicUsize,
}

impl InMemoryEventStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` reads fail with a backend error.
    pub fn fail_next_reads(&self, n: usize) {
        self.failing_reads.store(n, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn entries(&self) -> Vec<StreamEntry> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<StreamEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn tail(&self) -> EntryId {
        self.lock().last().map_or(EntryId::ZERO, |e| e.id)
    }

    fn after(&self, from: EntryId, count: usize) -> Vec<StreamEntry> {
        let entries = self.lock();
        let start = entries.partition_point(|e| e.id <= from);
        let take = if count == 0 { usize::MAX } else { count };
        entries[start..].iter().take(take).cloned().collect()
    }

    fn take_failure(&self) -> bool {
        self.failing_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl EventStream for InMemoryEventStream {
    async fn read(
        &self,
        cursor: StreamCursor,
        count: usize,
        cancel: &CancellationToken,
    ) -> StreamResult<Vec<StreamEntry>> {
        if self.take_failure() {
            return Err(StreamError::Backend("injected read failure".to_string()));
        }
        let from = match cursor {
            StreamCursor::New => self.tail(),
            StreamCursor::After(id) => id,
        };
        loop {
            if cancel.is_cancelled() {
                return Err(StreamError::Cancelled);
            }
            let appended = self.appended.notified();
            tokio::pin!(appended);
            appended.as_mut().enable();

            let found = self.after(from, count);
            if !found.is_empty() {
                return Ok(found);
            }
            tokio::select! {
                _ = cancel.cancelled() => return Err(StreamError::Cancelled),
                _ = &mut appended => {}
            }
        }
    }

    async fn publish(&self, fields: BTreeMap<String, String>) -> StreamResult<EntryId> {
        let now_ms = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
        let id = {
            let mut entries = self.lock();
            let id = entries
                .last()
                .map_or(EntryId::new(now_ms, 0), |last| last.id.next_after(now_ms));
            entries.push(StreamEntry { id, fields });
            id
        };
        tracing::trace!(entry = %id, "entry appended");
        self.appended.notify_waiters();
        Ok(id)
    }
}
