//! A trunked (or conventional) radio system: its control-channel list,
//! scrambling parameters, and the talkgroup-patch / subscriber-activity
//! state a dispatcher needs to track between control-channel messages.

use std::collections::HashMap;

/// How long a talkgroup patch is considered live without a refresh.
pub const PATCH_TTL_SECONDS: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemType {
    SmartNet,
    P25,
    Conventional,
    ConventionalP25,
    ConventionalDmr,
}

#[derive(Debug, Clone, Copy)]
pub struct SubscriberActivity {
    pub affiliated: bool,
    pub last_activity: i64,
}

/// Identity parameters used both for logging and for deriving the XOR
/// scrambling mask on P25 Phase 2 systems.
#[derive(Debug, Clone, Copy)]
pub struct SystemIdentity {
    pub nac: u16,
    pub sysid: u16,
    pub wacn: u32,
}

pub struct System {
    short_name: String,
    system_type: SystemType,
    identity: SystemIdentity,
    p25_phase2: bool,
    control_channels: Vec<u64>,
    control_channel_index: usize,
    /// supergroup -> talkgroup -> last-refreshed timestamp.
    talkgroup_patches: HashMap<u32, HashMap<u32, i64>>,
    /// talkgroup -> source unit id -> activity.
    active_subscribers: HashMap<u32, HashMap<i64, SubscriberActivity>>,
}

impl System {
    pub fn new(
        short_name: impl Into<String>,
        system_type: SystemType,
        identity: SystemIdentity,
        p25_phase2: bool,
        control_channels: Vec<u64>,
    ) -> Self {
        Self {
            short_name: short_name.into(),
            system_type,
            identity,
            p25_phase2,
            control_channels,
            control_channel_index: 0,
            talkgroup_patches: HashMap::new(),
            active_subscribers: HashMap::new(),
        }
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    pub fn system_type(&self) -> SystemType {
        self.system_type
    }

    pub fn identity(&self) -> SystemIdentity {
        self.identity
    }

    pub fn control_channel(&self) -> u64 {
        self.control_channels[self.control_channel_index]
    }

    /// Advances to the next control channel candidate, wrapping around.
    /// Used when the current control channel stops producing messages.
    pub fn rotate_control_channel(&mut self) -> u64 {
        self.control_channel_index = (self.control_channel_index + 1) % self.control_channels.len();
        self.control_channel()
    }

    /// Refreshes (or creates) a single talkgroup patch entry.
    ///
    /// `frame::TrunkMessage::PatchAdd` carries one `(supergroup, talkgroup)`
    /// pair per message rather than the up-to-three-talkgroup patch group
    /// the original control-channel frame can carry, so this operates on
    /// one element at a time; a single physical patch update that affects
    /// three talkgroups arrives here as three calls.
    pub fn update_active_talkgroup_patches(&mut self, supergroup: u32, talkgroup: u32, now: i64) {
        self.talkgroup_patches
            .entry(supergroup)
            .or_default()
            .insert(talkgroup, now);
    }

    /// Removes one talkgroup from a supergroup's patch set. If that was the
    /// last patched talkgroup under the supergroup, the supergroup entry
    /// itself is dropped too.
    pub fn delete_talkgroup_patch(&mut self, supergroup: u32, talkgroup: u32) {
        if let Some(patches) = self.talkgroup_patches.get_mut(&supergroup) {
            patches.remove(&talkgroup);
            if patches.is_empty() {
                self.talkgroup_patches.remove(&supergroup);
            }
        }
    }

    /// Sweeps out patches that haven't been refreshed within the TTL, and
    /// drops any supergroup left with no patches.
    pub fn clear_stale_talkgroup_patches(&mut self, now: i64) {
        self.talkgroup_patches.retain(|supergroup, patches| {
            patches.retain(|talkgroup, last_seen| {
                let alive = now - *last_seen <= PATCH_TTL_SECONDS;
                if !alive {
                    log::debug!(
                        "{}: patch {supergroup} -> {talkgroup} expired after {}s",
                        self.short_name,
                        now - *last_seen
                    );
                }
                alive
            });
            !patches.is_empty()
        });
    }

    /// Talkgroups currently patched into `supergroup`.
    pub fn get_talkgroup_patch(&self, supergroup: u32) -> Vec<u32> {
        self.talkgroup_patches
            .get(&supergroup)
            .map(|patches| patches.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn record_subscriber_activity(&mut self, talkgroup: u32, source_unit_id: i64, now: i64) {
        self.active_subscribers
            .entry(talkgroup)
            .or_default()
            .insert(
                source_unit_id,
                SubscriberActivity {
                    affiliated: true,
                    last_activity: now,
                },
            );
    }

    pub fn active_subscriber_count(&self, talkgroup: u32) -> usize {
        self.active_subscribers
            .get(&talkgroup)
            .map(|m| m.len())
            .unwrap_or(0)
    }

    /// Derives the XOR keystream mask P25 Phase 2 uses to scramble its
    /// control-channel payload, seeded from the system's NAC/SYSID/WACN.
    /// Gated to Phase 2 systems only; Phase 1 and non-P25 systems never
    /// scramble this way and get `None`.
    pub fn derive_xor_mask(&self) -> Option<u32> {
        if !matches!(self.system_type, SystemType::P25 | SystemType::ConventionalP25) || !self.p25_phase2
        {
            return None;
        }

        let mut lfsr: u32 = ((self.identity.wacn & 0xFFFFF) << 12)
            ^ ((self.identity.sysid as u32) << 4)
            ^ self.identity.nac as u32;
        if lfsr == 0 {
            lfsr = 1;
        }

        const TAPS: u32 = 0x8020_0003;
        for _ in 0..32 {
            let bit = (lfsr & 1) != 0;
            lfsr >>= 1;
            if bit {
                lfsr ^= TAPS;
            }
        }
        Some(lfsr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> SystemIdentity {
        SystemIdentity {
            nac: 0x123,
            sysid: 0x456,
            wacn: 0xBEE00,
        }
    }

    fn system(system_type: SystemType, p25_phase2: bool) -> System {
        System::new("test-sys", system_type, identity(), p25_phase2, vec![851_000_000])
    }

    #[test]
    fn patch_update_then_delete_clears_supergroup() {
        let mut sys = system(SystemType::P25, false);
        sys.update_active_talkgroup_patches(100, 200, 1000);
        sys.update_active_talkgroup_patches(100, 201, 1000);
        assert_eq!(sys.get_talkgroup_patch(100).len(), 2);

        sys.delete_talkgroup_patch(100, 200);
        assert_eq!(sys.get_talkgroup_patch(100), vec![201]);

        sys.delete_talkgroup_patch(100, 201);
        assert!(sys.get_talkgroup_patch(100).is_empty());
    }

    #[test]
    fn stale_patches_are_purged_after_ttl() {
        let mut sys = system(SystemType::P25, false);
        sys.update_active_talkgroup_patches(100, 200, 1000);
        sys.clear_stale_talkgroup_patches(1000 + PATCH_TTL_SECONDS + 1);
        assert!(sys.get_talkgroup_patch(100).is_empty());
    }

    #[test]
    fn fresh_patches_survive_a_sweep_within_ttl() {
        let mut sys = system(SystemType::P25, false);
        sys.update_active_talkgroup_patches(100, 200, 1000);
        sys.clear_stale_talkgroup_patches(1000 + PATCH_TTL_SECONDS - 1);
        assert_eq!(sys.get_talkgroup_patch(100), vec![200]);
    }

    #[test]
    fn xor_mask_only_derived_for_p25_phase2() {
        assert!(system(SystemType::P25, true).derive_xor_mask().is_some());
        assert!(system(SystemType::P25, false).derive_xor_mask().is_none());
        assert!(system(SystemType::SmartNet, true).derive_xor_mask().is_none());
    }

    #[test]
    fn xor_mask_is_deterministic_for_same_identity() {
        let a = system(SystemType::P25, true).derive_xor_mask();
        let b = system(SystemType::P25, true).derive_xor_mask();
        assert_eq!(a, b);
    }

    #[test]
    fn control_channel_rotation_wraps_around() {
        let mut sys = System::new(
            "rot",
            SystemType::P25,
            identity(),
            false,
            vec![851_000_000, 852_000_000],
        );
        assert_eq!(sys.control_channel(), 851_000_000);
        assert_eq!(sys.rotate_control_channel(), 852_000_000);
        assert_eq!(sys.rotate_control_channel(), 851_000_000);
    }
}
