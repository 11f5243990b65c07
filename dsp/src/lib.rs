//! The per-block dataflow runtime described in spec section 5: each block
//! (slicer, frame assembler, transmission sink, source-side demodulators)
//! runs on its own thread and cooperates with its neighbors through bounded,
//! blocking queues. Block-internal state is protected by a per-block lock;
//! the dispatcher thread mutates recorder/call bindings only through
//! thread-safe setters, never by reaching into a block's private state.

mod block;
mod queue;

pub use block::{spawn, Block, BlockHandle};
pub use queue::{queue, QueueReceiver, QueueSender};
