use std::thread::{self, JoinHandle};

use crate::queue::QueueReceiver;

/// One node in the dataflow graph. `work` is called once per item pulled
/// off the block's input queue; returning `false` stops the block's thread
/// (mirrors the GNU Radio convention the teacher's capture/sender blocks
/// follow of a capture loop that runs "until capturing is stopped").
pub trait Block<Item>: Send {
    fn work(&mut self, item: Item) -> bool;
}

/// A running block's thread handle. Dropping it does not stop the thread —
/// the block keeps running until its input queue is closed (every
/// `QueueSender` dropped) or `work` returns `false`. Use [`BlockHandle::join`]
/// to wait for shutdown.
pub struct BlockHandle {
    name: String,
    handle: Option<JoinHandle<()>>,
}

/// Spawns `block` on its own thread, feeding it items from `rx` until the
/// queue closes or `work` signals it should stop.
pub fn spawn<Item, B>(name: impl Into<String>, rx: QueueReceiver<Item>, mut block: B) -> BlockHandle
where
    Item: Send + 'static,
    B: Block<Item> + 'static,
{
    let name = name.into();
    let thread_name = name.clone();
    let handle = thread::Builder::new()
        .name(thread_name.clone())
        .spawn(move || {
            log::info!("block '{thread_name}' started");
            while let Some(item) = rx.recv() {
                if !block.work(item) {
                    log::info!("block '{thread_name}' stopped itself");
                    break;
                }
            }
            log::info!("block '{thread_name}' exiting");
        })
        .expect("failed to spawn block thread");

    BlockHandle {
        name,
        handle: Some(handle),
    }
}

impl BlockHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Blocks until the block's thread has exited.
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("block '{}' thread panicked", self.name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::queue::queue;

    struct Counter(Arc<AtomicUsize>);

    impl Block<i32> for Counter {
        fn work(&mut self, item: i32) -> bool {
            self.0.fetch_add(item as usize, Ordering::SeqCst);
            true
        }
    }

    #[test]
    fn block_processes_items_until_queue_closes() {
        let total = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = queue::<i32>(4);
        let handle = spawn("counter", rx, Counter(total.clone()));

        tx.send(1).unwrap();
        tx.send(2).unwrap();
        tx.send(3).unwrap();
        drop(tx);

        handle.join();
        assert_eq!(total.load(Ordering::SeqCst), 6);
    }

    struct StopAfterOne;

    impl Block<i32> for StopAfterOne {
        fn work(&mut self, _item: i32) -> bool {
            false
        }
    }

    #[test]
    fn block_can_stop_itself() {
        let (tx, rx) = queue::<i32>(4);
        let handle = spawn("stopper", rx, StopAfterOne);
        tx.send(1).unwrap();
        // The thread should exit on its own even though tx is still alive.
        handle.join();
    }
}
