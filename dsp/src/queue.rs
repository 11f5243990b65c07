use crossbeam::channel::{self, Receiver, Sender};

/// A bounded, blocking sample queue connecting two blocks. Backpressure is
/// the whole point: a slow downstream block (e.g. a transmission sink doing
/// synchronous file I/O) stalls its upstream sender rather than dropping or
/// buffering without limit.
pub struct QueueSender<T>(Sender<T>);

pub struct QueueReceiver<T>(Receiver<T>);

/// Creates a bounded queue with room for `capacity` in-flight items.
pub fn queue<T>(capacity: usize) -> (QueueSender<T>, QueueReceiver<T>) {
    let (tx, rx) = channel::bounded(capacity);
    (QueueSender(tx), QueueReceiver(rx))
}

impl<T> QueueSender<T> {
    /// Blocks until there's room, or returns `Err` once the receiver has
    /// been dropped (the downstream block has shut down).
    pub fn send(&self, item: T) -> Result<(), T> {
        self.0.send(item).map_err(|e| e.into_inner())
    }
}

impl<T> Clone for QueueSender<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> QueueReceiver<T> {
    /// Blocks until an item arrives, or returns `None` once every sender has
    /// been dropped.
    pub fn recv(&self) -> Option<T> {
        self.0.recv().ok()
    }
}
