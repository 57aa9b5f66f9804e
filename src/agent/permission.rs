//! Capability bitmask.

use serde::{Deserialize, Serialize};

/// A single capability flag; always exactly one bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Permission {
    bit: u64,
    name: &'static str,
}

impl Permission {
    pub const CAN_SWAP: Permission = Permission::flag(0, "can_swap");
    pub const CAN_TRANSFER: Permission = Permission::flag(1, "can_transfer");
    pub const CAN_VOTE: Permission = Permission::flag(2, "can_vote");
    pub const CAN_CREATE_INTENT: Permission = Permission::flag(3, "can_create_intent");
    pub const CAN_ACCEPT_INTENT: Permission = Permission::flag(4, "can_accept_intent");
    pub const CAN_STAKE: Permission = Permission::flag(5, "can_stake");
    pub const CAN_LEND: Permission = Permission::flag(6, "can_lend");

    /// Every defined flag, lowest bit first.
    pub const ALL: [Permission; 7] = [
        Permission::CAN_SWAP,
        Permission::CAN_TRANSFER,
        Permission::CAN_VOTE,
        Permission::CAN_CREATE_INTENT,
        Permission::CAN_ACCEPT_INTENT,
        Permission::CAN_STAKE,
        Permission::CAN_LEND,
    ];

    const fn flag(position: u32, name: &'static str) -> Self {
        Self {
            bit: 1 << position,
            name,
        }
    }

    pub const fn bits(&self) -> u64 {
        self.bit
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Look a flag up by its name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name == name)
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// An immutable permission mask.
///
/// `grant` and `revoke` return new values; a mask is never changed in place.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(u64);

impl PermissionSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn bits(&self) -> u64 {
        self.0
    }

    /// Build a mask from a list of flags.
    pub fn of(flags: &[Permission]) -> Self {
        flags.iter().fold(Self::empty(), |mask, flag| mask.grant(*flag))
    }

    pub const fn has(&self, flag: Permission) -> bool {
        self.0 & flag.bit != 0
    }

    #[must_use]
    pub const fn grant(self, flag: Permission) -> Self {
        Self(self.0 | flag.bit)
    }

    #[must_use]
    pub const fn revoke(self, flag: Permission) -> Self {
        Self(self.0 & !flag.bit)
    }

    /// Names of the defined flags present in this mask.
    pub fn names(&self) -> Vec<&'static str> {
        Permission::ALL
            .into_iter()
            .filter(|p| self.has(*p))
            .map(|p| p.name)
            .collect()
    }
}

impl From<u64> for PermissionSet {
    fn from(bits: u64) -> Self {
        Self(bits)
    }
}

impl std::ops::BitOr<Permission> for PermissionSet {
    type Output = PermissionSet;

    fn bitor(self, rhs: Permission) -> Self::Output {
        self.grant(rhs)
    }
}

impl std::ops::BitOr for Permission {
    type Output = PermissionSet;

    fn bitor(self, rhs: Permission) -> Self::Output {
        PermissionSet::empty().grant(self).grant(rhs)
    }
}

impl From<Permission> for PermissionSet {
    fn from(flag: Permission) -> Self {
        PermissionSet::empty().grant(flag)
    }
}

impl std::fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.names().join("|"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_positions_are_stable() {
        assert_eq!(Permission::CAN_SWAP.bits(), 1);
        assert_eq!(Permission::CAN_TRANSFER.bits(), 2);
        assert_eq!(Permission::CAN_VOTE.bits(), 4);
        assert_eq!(Permission::CAN_CREATE_INTENT.bits(), 8);
        assert_eq!(Permission::CAN_ACCEPT_INTENT.bits(), 16);
    }

    #[test]
    fn test_flags_do_not_overlap() {
        let mut seen = 0u64;
        for flag in Permission::ALL {
            assert_eq!(flag.bits().count_ones(), 1);
            assert_eq!(seen & flag.bits(), 0);
            seen |= flag.bits();
        }
    }

    #[test]
    fn test_grant_and_revoke_return_new_masks() {
        let base = PermissionSet::empty();
        let granted = base.grant(Permission::CAN_SWAP);
        assert!(!base.has(Permission::CAN_SWAP));
        assert!(granted.has(Permission::CAN_SWAP));

        let revoked = granted.revoke(Permission::CAN_SWAP);
        assert!(granted.has(Permission::CAN_SWAP));
        assert!(!revoked.has(Permission::CAN_SWAP));
    }

    #[test]
    fn test_bitor_and_names() {
        let mask = Permission::CAN_ACCEPT_INTENT | Permission::CAN_SWAP;
        assert_eq!(mask.bits(), 17);
        assert_eq!(mask.names(), vec!["can_swap", "can_accept_intent"]);
        assert_eq!(mask.to_string(), "[can_swap|can_accept_intent]");
    }

    #[test]
    fn test_unknown_bits_are_kept_but_unnamed() {
        let mask = PermissionSet::from_bits(1 << 40).grant(Permission::CAN_VOTE);
        assert_eq!(mask.names(), vec!["can_vote"]);
        assert_eq!(mask.bits(), (1 << 40) | 4);
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Permission::from_name("can_lend"), Some(Permission::CAN_LEND));
        assert_eq!(Permission::from_name("can_fly"), None);
    }
}
