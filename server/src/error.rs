//! Error types for the world server.

use shared::{CharacterClass, EntityId, EquipSlot, ItemKind};
use thiserror::Error;

/// Reasons a session command is refused. Rejections are reported back to the
/// issuing session and never abort the tick.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("movement direction ({0}, {1}) must use -1, 0 or 1 per axis")]
    InvalidDirection(i8, i8),
    #[error("class {1:?} has no skill {0}")]
    UnknownSkill(u8, CharacterClass),
    #[error("skill {0} is on cooldown")]
    SkillOnCooldown(u8),
    #[error("item {0} is not in the inventory")]
    ItemNotInInventory(EntityId),
    #[error("item {0} is not equipped")]
    ItemNotEquipped(EntityId),
    #[error("item {0} cannot be equipped")]
    NotEquippable(EntityId),
    #[error("{kind:?} does not fit the {slot:?} slot")]
    InvalidSlot { kind: ItemKind, slot: EquipSlot },
    #[error("item {0} cannot be used")]
    NotUsable(EntityId),
    #[error("inventory is full")]
    InventoryFull,
    #[error("no exit with id {0}")]
    UnknownExit(u32),
    #[error("too far away from exit {0}")]
    TooFarFromExit(u32),
    #[error("player is dead")]
    PlayerDead,
}

/// Failures while loading a [`crate::config::WorldConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_messages() {
        assert_eq!(
            CommandError::InvalidDirection(2, 0).to_string(),
            "movement direction (2, 0) must use -1, 0 or 1 per axis"
        );
        assert_eq!(
            CommandError::InvalidSlot {
                kind: ItemKind::Ring,
                slot: EquipSlot::Head
            }
            .to_string(),
            "Ring does not fit the Head slot"
        );
    }

    #[test]
    fn test_config_error_from_json() {
        let err = serde_json::from_str::<u32>("not json").unwrap_err();
        let config_err: ConfigError = err.into();
        assert!(matches!(config_err, ConfigError::Parse(_)));
    }
}
