use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use palisade_types::claim::{ClaimId, PlayerId, SiegeId};
use palisade_types::map::{Position, WorldId};
use palisade_types::rules::WorldRules;

use super::registry::ClaimRegistry;

/// Where a player stands in the two-click resize flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResizeFlow {
    Idle,
    /// First corner picked; the opposite corner of the original region is
    /// pinned and the next click completes the new rectangle.
    AwaitingSecondCorner {
        claim: ClaimId,
        fixed_corner: Position,
    },
}

/// Per-player, per-world transient claim data. Not the player account,
/// just what the claim engine needs to know about them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerClaimState {
    pub player_id: PlayerId,
    pub name: String,
    pub initial_blocks: i32,
    accrued_blocks: i32,
    pub bonus_blocks: i32,
    pub owned_claims: Vec<ClaimId>,
    /// Admin override: claims stop applying to this player entirely.
    pub ignore_claims: bool,
    /// Owner diagnostics mode: the player sees their own claims as a
    /// stranger would, so they can verify what they've shared.
    pub debug_claim_permissions: bool,
    pub siege: Option<SiegeId>,
    /// Cache of the claim the player was last seen in, used as a lookup
    /// hint. Purely an optimization; may be stale.
    pub last_claim: Option<ClaimId>,
    pub last_pvp_combat: Option<DateTime<Utc>>,
    pub resize: ResizeFlow,
}

impl PlayerClaimState {
    pub fn new(player_id: PlayerId, name: impl Into<String>, rules: &WorldRules) -> Self {
        Self {
            player_id,
            name: name.into(),
            initial_blocks: rules.initial_blocks,
            accrued_blocks: 0,
            bonus_blocks: 0,
            owned_claims: vec![],
            ignore_claims: false,
            debug_claim_permissions: false,
            siege: None,
            last_claim: None,
            last_pvp_combat: None,
            resize: ResizeFlow::Idle,
        }
    }

    pub fn accrued_blocks(&self) -> i32 {
        self.accrued_blocks
    }

    /// One accrual tick of play time. The accrued component saturates at
    /// the configured ceiling; initial and bonus blocks are unaffected.
    pub fn accrue(&mut self, rules: &WorldRules) {
        self.accrued_blocks =
            (self.accrued_blocks + rules.accrual_per_tick).min(rules.max_accrued_blocks);
    }

    /// Directly sets the accrued component, clamped to the ceiling. Used
    /// when reloading persisted balances or by admin adjustment.
    pub fn set_accrued_blocks(&mut self, blocks: i32, rules: &WorldRules) {
        self.accrued_blocks = blocks.min(rules.max_accrued_blocks);
    }

    pub fn total_blocks(&self) -> i64 {
        self.initial_blocks as i64 + self.accrued_blocks as i64 + self.bonus_blocks as i64
    }

    /// Blocks left to spend on new claim area. May be negative after an
    /// admin shrinks a player's caps; creation and growth paths refuse to
    /// drive it negative themselves.
    pub fn remaining_claim_blocks(&self, registry: &ClaimRegistry) -> i64 {
        let spent: i64 = self
            .owned_claims
            .iter()
            .filter_map(|id| registry.get(*id))
            .map(|claim| claim.area())
            .sum();

        self.total_blocks() - spent
    }

    pub fn tag_pvp_combat(&mut self, now: DateTime<Utc>) {
        self.last_pvp_combat = Some(now);
    }

    pub fn in_pvp_combat(&self, now: DateTime<Utc>, rules: &WorldRules) -> bool {
        match self.last_pvp_combat {
            Some(stamp) => (now - stamp).num_seconds() < rules.pvp_combat_timeout_secs,
            None => false,
        }
    }
}

/// All player claim states for one world, keyed by player id.
#[derive(Debug, Default)]
pub struct PlayerStates {
    world_id: WorldId,
    players: HashMap<PlayerId, PlayerClaimState>,
}

impl PlayerStates {
    pub fn new(world_id: WorldId) -> Self {
        Self {
            world_id,
            players: HashMap::new(),
        }
    }

    pub fn world_id(&self) -> WorldId {
        self.world_id
    }

    pub fn get(&self, player: PlayerId) -> Option<&PlayerClaimState> {
        self.players.get(&player)
    }

    pub fn get_mut(&mut self, player: PlayerId) -> Option<&mut PlayerClaimState> {
        self.players.get_mut(&player)
    }

    pub fn get_or_create(
        &mut self,
        player: PlayerId,
        name: &str,
        rules: &WorldRules,
    ) -> &mut PlayerClaimState {
        self.players
            .entry(player)
            .or_insert_with(|| PlayerClaimState::new(player, name, rules))
    }

    pub fn name_of(&self, player: PlayerId) -> Option<&str> {
        self.players.get(&player).map(|p| p.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlayerClaimState> {
        self.players.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PlayerClaimState> {
        self.players.values_mut()
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::test_utils::{ClaimFactoryOptions, RegionFactoryOptions, claim_factory, region_factory};

    #[test]
    fn test_accrue_saturates_at_cap() {
        let rules = WorldRules {
            accrual_per_tick: 100,
            max_accrued_blocks: 250,
            ..Default::default()
        };
        let mut state = PlayerClaimState::new(Uuid::new_v4(), "Ada", &rules);

        state.accrue(&rules);
        state.accrue(&rules);
        assert_eq!(state.accrued_blocks(), 200);

        state.accrue(&rules);
        assert_eq!(state.accrued_blocks(), 250); // capped, not 300
    }

    #[test]
    fn test_remaining_blocks_subtracts_owned_area() {
        let rules = WorldRules {
            initial_blocks: 500,
            ..Default::default()
        };
        let world = Uuid::new_v4();
        let mut registry = ClaimRegistry::new(world);
        let owner = Uuid::new_v4();
        let mut state = PlayerClaimState::new(owner, "Ada", &rules);

        let claim = claim_factory(ClaimFactoryOptions {
            region: Some(region_factory(RegionFactoryOptions {
                world_id: Some(world),
                bounds: Some((0, 0, 9, 9)), // 100 blocks
                ..Default::default()
            })),
            owner_id: Some(owner),
            ..Default::default()
        });
        let id = registry.insert(claim).unwrap();
        state.owned_claims.push(id);

        assert_eq!(state.remaining_claim_blocks(&registry), 400);
    }

    #[test]
    fn test_remaining_blocks_may_go_negative() {
        let rules = WorldRules {
            initial_blocks: 50,
            ..Default::default()
        };
        let world = Uuid::new_v4();
        let mut registry = ClaimRegistry::new(world);
        let owner = Uuid::new_v4();
        let mut state = PlayerClaimState::new(owner, "Ada", &rules);

        let id = registry
            .insert(claim_factory(ClaimFactoryOptions {
                region: Some(region_factory(RegionFactoryOptions {
                    world_id: Some(world),
                    bounds: Some((0, 0, 9, 9)),
                    ..Default::default()
                })),
                owner_id: Some(owner),
                ..Default::default()
            }))
            .unwrap();
        state.owned_claims.push(id);

        // An admin shrank the player's starting balance after the fact.
        state.initial_blocks = 10;
        assert_eq!(state.remaining_claim_blocks(&registry), -90);
    }

    #[test]
    fn test_pvp_combat_window() {
        let rules = WorldRules {
            pvp_combat_timeout_secs: 15,
            ..Default::default()
        };
        let mut state = PlayerClaimState::new(Uuid::new_v4(), "Ada", &rules);
        let now = Utc::now();

        assert!(!state.in_pvp_combat(now, &rules));

        state.tag_pvp_combat(now);
        assert!(state.in_pvp_combat(now + chrono::Duration::seconds(10), &rules));
        assert!(!state.in_pvp_combat(now + chrono::Duration::seconds(20), &rules));
    }
}
