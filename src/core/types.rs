//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a phase instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhaseId(pub Uuid);

impl PhaseId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PhaseId {
    fn default() -> Self {
        Self::new()
    }
}

/// Turn counter (advanced each time a turn-initialization phase is synthesized)
pub type Turn = u32;

/// Field slot of a battler
///
/// Player slots come first, enemy slots start at [`BattlerIndex::ENEMY`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BattlerIndex(pub u8);

impl BattlerIndex {
    pub const PLAYER: Self = Self(0);
    pub const PLAYER_2: Self = Self(1);
    pub const ENEMY: Self = Self(2);
    pub const ENEMY_2: Self = Self(3);

    pub fn is_enemy(&self) -> bool {
        self.0 >= Self::ENEMY.0
    }

    pub fn is_player(&self) -> bool {
        !self.is_enemy()
    }
}

impl std::fmt::Display for BattlerIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let side = if self.is_enemy() { "enemy" } else { "player" };
        let slot = if self.is_enemy() { self.0 - Self::ENEMY.0 } else { self.0 };
        write!(f, "{}#{}", side, slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_battler_sides() {
        assert!(BattlerIndex::PLAYER.is_player());
        assert!(BattlerIndex::PLAYER_2.is_player());
        assert!(BattlerIndex::ENEMY.is_enemy());
        assert!(BattlerIndex::ENEMY_2.is_enemy());
    }

    #[test]
    fn test_battler_display() {
        assert_eq!(BattlerIndex::PLAYER_2.to_string(), "player#1");
        assert_eq!(BattlerIndex::ENEMY.to_string(), "enemy#0");
    }

    #[test]
    fn test_phase_ids_are_unique() {
        assert_ne!(PhaseId::new(), PhaseId::new());
    }
}
