//! Delayed message queue.
//!
//! The queue is the only controller structure shared across threads: any
//! number of [`MessageSender`]s may enqueue while the owner drains it from
//! `Controller::update`.

use super::{Message, MessagePolicy, MessageScope};
use crate::controller::{ControllerError, Result};
use crate::core::bits;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::{trace, warn};

/// A queued message with its routing.
#[derive(Debug)]
pub struct PendingMessage {
    pub message: Message,
    /// States the message may reach.
    pub states: u32,
    pub policy: MessagePolicy,
    pub scope: MessageScope,
}

/// Arrival-ordered queue of pending messages.
#[derive(Clone, Default)]
pub struct MessageQueue {
    entries: Arc<Mutex<VecDeque<PendingMessage>>>,
    closed: Arc<AtomicBool>,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<PendingMessage>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("message queue mutex was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Refuse further sends from every handle sharing this queue.
    pub fn close(&self) {
        let _entries = self.lock();
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn push(&self, pending: PendingMessage) {
        trace!(what = pending.message.what, "message queued");
        self.lock().push_back(pending);
    }

    /// Push unless the queue was closed; the check and the push share one lock.
    fn push_open(&self, pending: PendingMessage) -> bool {
        let mut entries = self.lock();
        if self.is_closed() {
            return false;
        }
        trace!(what = pending.message.what, "message queued");
        entries.push_back(pending);
        true
    }

    /// Remove and return every due entry, keeping arrival order.
    pub fn take_due(&self, now: Instant) -> Vec<PendingMessage> {
        let mut entries = self.lock();
        let mut due = Vec::new();
        let mut waiting = VecDeque::with_capacity(entries.len());
        while let Some(pending) = entries.pop_front() {
            if pending.message.is_due(now) {
                due.push(pending);
            } else {
                waiting.push_back(pending);
            }
        }
        *entries = waiting;
        due
    }

    pub fn has(&self, what: i32) -> bool {
        self.lock().iter().any(|p| p.message.what == what)
    }

    /// Remove every entry with `what`, returning the removed messages.
    pub fn remove(&self, what: i32) -> Vec<Message> {
        let mut entries = self.lock();
        let mut removed = Vec::new();
        entries.retain_mut(|pending| {
            if pending.message.what == what {
                removed.push(std::mem::take(&mut pending.message));
                false
            } else {
                true
            }
        });
        removed
    }

    /// Empty the queue, returning the removed messages.
    pub fn clear(&self) -> Vec<Message> {
        self.lock().drain(..).map(|p| p.message).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Thread-safe producer handle for a controller's message queue.
///
/// Messages sent through a sender are always queued; the owning controller
/// delivers them from its next `update` once they are due. Once the
/// controller is disposed every send fails with `Disposed`.
#[derive(Clone)]
pub struct MessageSender {
    queue: MessageQueue,
}

impl MessageSender {
    pub(crate) fn new(queue: MessageQueue) -> Self {
        Self { queue }
    }

    pub fn send(
        &self,
        mut message: Message,
        policy: MessagePolicy,
        scope: MessageScope,
    ) -> Result<()> {
        if self.queue.is_closed() {
            return Err(ControllerError::Disposed);
        }
        if message.is_in_use() {
            return Err(ControllerError::MessageInUse { what: message.what });
        }
        message.mark_in_use();
        let queued = self.queue.push_open(PendingMessage {
            message,
            states: bits::ALL_FLAGS,
            policy,
            scope,
        });
        if !queued {
            return Err(ControllerError::Disposed);
        }
        Ok(())
    }
}
