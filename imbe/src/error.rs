#[derive(Debug, thiserror::Error)]
pub enum ImbeError {
    #[error("priority-rescan decode exhausted the bit stream with bit_thr > 0 (decoder-logic bug)")]
    PriorityRescanOverrun,
}
