//! Trunking systems, the call table, unit-tag resolution and the
//! dispatcher that reacts to control-channel messages by allocating or
//! releasing recorders on a [`capture::Source`].

mod call;
mod dispatcher;
mod error;
mod ota;
mod system;
mod talkgroup;
mod unit_tag;
mod unit_tags;

pub use call::{Call, CallState, CallTable, GrantOutcome, MonitoringSubstate};
pub use dispatcher::Dispatcher;
pub use error::DispatcherError;
pub use ota::{decode_motorola_alias, decode_motorola_alias_p2, AliasBuffer, OtaAlias, OtaSource};
pub use system::{PATCH_TTL_SECONDS, System, SystemIdentity, SystemType};
pub use talkgroup::{Talkgroup, TalkgroupTable};
pub use unit_tag::UnitTag;
pub use unit_tags::{UnitTagMode, UnitTags};
