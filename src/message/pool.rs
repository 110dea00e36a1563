//! Free list of reusable messages.

use super::Message;
use crate::controller::{ControllerError, Result};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

/// Maximum number of messages kept on the free list.
pub const MAX_POOL_SIZE: usize = 20;

/// Free list of messages, owned by one controller and shared with its senders.
#[derive(Clone, Default)]
pub struct MessagePool {
    free: Arc<Mutex<Vec<Message>>>,
}

impl MessagePool {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Message>> {
        match self.free.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("message pool mutex was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Take a cleared message from the pool, or a fresh one.
    pub fn obtain(&self, what: i32) -> Message {
        let mut msg = self.lock().pop().unwrap_or_default();
        msg.what = what;
        msg
    }

    /// Return a message that is no longer in use.
    pub fn recycle(&self, msg: Message) -> Result<()> {
        if msg.is_in_use() {
            return Err(ControllerError::MessageInUse { what: msg.what });
        }
        self.release(msg);
        Ok(())
    }

    /// Return a message without checking whether it is in use.
    pub fn release(&self, mut msg: Message) {
        msg.reset();
        let mut free = self.lock();
        if free.len() < MAX_POOL_SIZE {
            free.push(msg);
        }
    }

    /// Messages currently available.
    pub fn available(&self) -> usize {
        self.lock().len()
    }
}
