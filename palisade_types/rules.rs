use serde::{Deserialize, Serialize};

use crate::claim::BlockKind;

/// How claims behave in a world. Creative-mode worlds get the aggressive
/// protections (fluid sweeps, entity caps); survival worlds don't.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimsMode {
    Survival,
    Creative,
}

/// Per-world tuning of the claim engine. Built from the host configuration
/// once at world load and shared read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldRules {
    pub mode: ClaimsMode,
    /// Claim blocks every new player starts with.
    pub initial_blocks: i32,
    /// Claim blocks granted per accrual tick of play time.
    pub accrual_per_tick: i32,
    /// Ceiling on the accrued component of a player's balance.
    pub max_accrued_blocks: i32,
    /// Minimum side length for non-admin top-level claims.
    pub min_width: i64,
    /// Minimum footprint area for non-admin top-level claims.
    pub min_area: i64,
    /// Claims larger than this skip the entity cap and fluid sweeps.
    pub large_claim_area: i64,
    /// One entity allowed per this many blocks of claim area.
    pub blocks_per_entity: i64,
    /// How long after a PvP hit a player still counts as in combat.
    pub pvp_combat_timeout_secs: i64,
    /// Block types that may be broken inside a besieged claim.
    pub breakable_siege_blocks: Vec<BlockKind>,
}

impl Default for WorldRules {
    fn default() -> Self {
        Self {
            mode: ClaimsMode::Survival,
            initial_blocks: 100,
            accrual_per_tick: 100,
            max_accrued_blocks: 80_000,
            min_width: 5,
            min_area: 100,
            large_claim_area: 10_000,
            blocks_per_entity: 50,
            pvp_combat_timeout_secs: 15,
            breakable_siege_blocks: vec![
                BlockKind::new("minecraft:dirt"),
                BlockKind::new("minecraft:grass"),
                BlockKind::new("minecraft:sand"),
                BlockKind::new("minecraft:gravel"),
                BlockKind::new("minecraft:cobblestone"),
                BlockKind::new("minecraft:planks"),
                BlockKind::new("minecraft:glass"),
            ],
        }
    }
}
