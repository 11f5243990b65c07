/// A message from the control-channel parser (out of scope; we only
/// specify the shape it produces). One variant per message kind, each
/// carrying only the fields that kind actually has.
#[derive(Debug, Clone, PartialEq)]
pub enum TrunkMessage {
    Grant {
        talkgroup: u32,
        freq_hz: u64,
        source_unit_id: i64,
        slot: Option<u8>,
        encrypted: bool,
    },
    Update {
        talkgroup: u32,
        freq_hz: u64,
    },
    PatchAdd {
        supergroup: u32,
        talkgroup: u32,
    },
    PatchDelete {
        supergroup: u32,
        talkgroup: u32,
    },
    ControlChannel {
        freq_hz: u64,
    },
    SubscriberActivity {
        talkgroup: u32,
        source_unit_id: i64,
    },
}
