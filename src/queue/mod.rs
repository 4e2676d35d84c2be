//! Unbounded FIFO task queue shared by pool threads.
//!
//! Producers push [`Message::Run`] items without ever blocking. Each pool
//! thread blocks on [`TaskQueue::pop`] and exits when it receives
//! [`Message::Terminate`], the poison sentinel pushed once per thread during
//! shutdown.

use crossbeam_channel::{self as channel, Receiver, Sender};

/// A unit of work handed to a pool thread
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// An item on the task queue
pub enum Message {
    /// Run the task
    Run(Task),
    /// Poison sentinel: the receiving thread exits
    Terminate,
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Message::Run(_) => f.write_str("Message::Run(<task>)"),
            Message::Terminate => f.write_str("Message::Terminate"),
        }
    }
}

/// Multi-producer, multi-consumer FIFO of [`Message`]s
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct TaskQueue {
    sender: Sender<Message>,
    receiver: Receiver<Message>,
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue").field("len", &self.len()).finish()
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl TaskQueue {
    /// Creates a new unbounded queue.
    pub fn unbounded() -> Self {
        let (sender, receiver) = channel::unbounded();
        Self { sender, receiver }
    }

    /// Enqueue a message. Never blocks.
    pub fn push(&self, message: Message) {
        // Both ends live in `self`, so the channel cannot be disconnected here.
        let _ = self.sender.send(message);
    }

    /// Block until a message is available.
    ///
    /// Returns `None` only if every sender is gone.
    pub fn pop(&self) -> Option<Message> {
        self.receiver.recv().ok()
    }

    /// Number of queued messages
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}
