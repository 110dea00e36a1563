//! Messages delivered to active states.
//!
//! A [`Message`] is a small poolable value with an optional due time. The
//! controller routes it to states selected by a [`MessageScope`] and stops or
//! continues according to a [`MessagePolicy`]. Messages with a due time in the
//! future wait in a [`MessageQueue`] until `Controller::update` drains them.

mod pool;
mod queue;

pub use pool::{MessagePool, MAX_POOL_SIZE};
pub use queue::{MessageQueue, MessageSender, PendingMessage};

use std::any::Any;
use std::fmt;
use std::ops::BitOr;
use std::time::{Duration, Instant};

/// How a dispatch treats the handlers it reaches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MessagePolicy {
    /// Deliver to every matching state; handled when any returns true.
    Broadcast,
    /// Stop at the first state whose handler returns true.
    #[default]
    Consume,
}

/// Which states a dispatch reaches.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageScope(u8);

impl MessageScope {
    pub const CURRENT: MessageScope = MessageScope(1);
    pub const CACHED: MessageScope = MessageScope(1 << 1);
    pub const GLOBAL: MessageScope = MessageScope(1 << 2);
    pub const ALL: MessageScope = MessageScope(0b111);

    pub fn contains(self, other: MessageScope) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }
}

impl Default for MessageScope {
    fn default() -> Self {
        MessageScope::CURRENT
    }
}

impl BitOr for MessageScope {
    type Output = MessageScope;

    fn bitor(self, rhs: MessageScope) -> MessageScope {
        MessageScope(self.0 | rhs.0)
    }
}

impl fmt::Debug for MessageScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.contains(Self::CURRENT) {
            names.push("CURRENT");
        }
        if self.contains(Self::CACHED) {
            names.push("CACHED");
        }
        if self.contains(Self::GLOBAL) {
            names.push("GLOBAL");
        }
        write!(f, "MessageScope({})", names.join(" | "))
    }
}

/// Receives a message back once it has been delivered.
///
/// The message is still flagged in-use when it arrives here.
pub trait MessageReplier: Send {
    fn reply(&self, msg: Message);
}

impl<F> MessageReplier for F
where
    F: Fn(Message) + Send,
{
    fn reply(&self, msg: Message) {
        self(msg)
    }
}

/// A message routed to active states.
///
/// # Example
///
/// ```rust
/// use flagstate::message::Message;
/// use std::time::Duration;
///
/// let msg = Message::new(3).with_args(1, 2).with_delay(Duration::from_millis(50));
/// assert_eq!(msg.what, 3);
/// assert!(msg.when().is_some());
/// assert!(!msg.is_in_use());
/// ```
#[derive(Default)]
pub struct Message {
    pub what: i32,
    pub arg1: i32,
    pub arg2: i32,
    pub obj: Option<Box<dyn Any + Send>>,
    when: Option<Instant>,
    replier: Option<Box<dyn MessageReplier>>,
    in_use: bool,
}

impl Message {
    pub fn new(what: i32) -> Self {
        Message {
            what,
            ..Default::default()
        }
    }

    pub fn with_args(mut self, arg1: i32, arg2: i32) -> Self {
        self.arg1 = arg1;
        self.arg2 = arg2;
        self
    }

    pub fn with_obj<T: Any + Send>(mut self, obj: T) -> Self {
        self.obj = Some(Box::new(obj));
        self
    }

    /// Deliver no earlier than `delay` from now.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.when = Some(Instant::now() + delay);
        self
    }

    /// Deliver no earlier than `when`.
    pub fn at(mut self, when: Instant) -> Self {
        self.when = Some(when);
        self
    }

    pub fn with_replier<R: MessageReplier + 'static>(mut self, replier: R) -> Self {
        self.replier = Some(Box::new(replier));
        self
    }

    /// Borrow the attached object as `T`.
    pub fn obj_ref<T: Any>(&self) -> Option<&T> {
        self.obj.as_ref().and_then(|obj| obj.downcast_ref::<T>())
    }

    pub fn when(&self) -> Option<Instant> {
        self.when
    }

    /// True when the message has no due time or its due time has passed.
    pub fn is_due(&self, now: Instant) -> bool {
        self.when.map_or(true, |when| when <= now)
    }

    pub fn is_in_use(&self) -> bool {
        self.in_use
    }

    pub(crate) fn mark_in_use(&mut self) {
        self.in_use = true;
    }

    /// Hand the message to its replier, if any. Returns the message otherwise.
    pub(crate) fn reply(mut self) -> Option<Message> {
        match self.replier.take() {
            Some(replier) => {
                replier.reply(self);
                None
            }
            None => Some(self),
        }
    }

    /// Clear every field so the message can be obtained again.
    pub(crate) fn reset(&mut self) {
        *self = Message::default();
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("what", &self.what)
            .field("arg1", &self.arg1)
            .field("arg2", &self.arg2)
            .field("has_obj", &self.obj.is_some())
            .field("when", &self.when)
            .field("has_replier", &self.replier.is_some())
            .field("in_use", &self.in_use)
            .finish()
    }
}
