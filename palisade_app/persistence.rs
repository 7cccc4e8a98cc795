//! The async persistence boundary. The engine never blocks on I/O: it
//! flips a dirty flag, and the store collaborator is handed an immutable
//! snapshot to write out whenever it gets around to it.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use palisade_game::models::claim::Claim;
use palisade_game::world::ClaimWorld;
use palisade_types::claim::{ClaimId, ClaimKind, PlayerId, TrustLists};
use palisade_types::errors::{ApplicationError, ClaimError};
use palisade_types::map::{Region, WorldId};
use palisade_types::rules::WorldRules;

/// One persisted claim. Ids and regions are the load-bearing fields: a
/// reload must reproduce identical containment and overlap behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub id: ClaimId,
    pub kind: ClaimKind,
    pub owner_id: Option<PlayerId>,
    pub region: Region,
    pub parent_id: Option<ClaimId>,
    pub trust: TrustLists,
    pub date_last_active: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub player_id: PlayerId,
    pub name: String,
    pub initial_blocks: i32,
    pub accrued_blocks: i32,
    pub bonus_blocks: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub world_id: WorldId,
    pub claims: Vec<ClaimRecord>,
    pub players: Vec<PlayerRecord>,
}

/// Write-behind store for claim data. Implementations own the file or
/// database format; they get called fire-and-forget with whole-world
/// snapshots and may batch however they like.
#[async_trait::async_trait]
pub trait ClaimStore: Send + Sync {
    async fn save_world(&self, snapshot: WorldSnapshot) -> Result<(), ApplicationError>;

    async fn load_world(&self, world_id: WorldId)
    -> Result<Option<WorldSnapshot>, ApplicationError>;
}

/// Keeps serialized snapshots in process memory. The default for tests and
/// for hosts that bring their own save hooks.
#[derive(Default)]
pub struct InMemoryClaimStore {
    worlds: Mutex<HashMap<WorldId, serde_json::Value>>,
}

#[async_trait::async_trait]
impl ClaimStore for InMemoryClaimStore {
    async fn save_world(&self, snapshot: WorldSnapshot) -> Result<(), ApplicationError> {
        let payload = serde_json::to_value(&snapshot)?;
        self.worlds
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(snapshot.world_id, payload);
        Ok(())
    }

    async fn load_world(
        &self,
        world_id: WorldId,
    ) -> Result<Option<WorldSnapshot>, ApplicationError> {
        let payload = self
            .worlds
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&world_id)
            .cloned();

        match payload {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }
}

fn claim_record(claim: &Claim) -> ClaimRecord {
    ClaimRecord {
        id: claim.id,
        kind: claim.kind,
        owner_id: claim.owner_id,
        region: claim.region,
        parent_id: claim.parent_id(),
        trust: claim.trust.clone(),
        date_last_active: claim.date_last_active,
    }
}

/// Serializes a world's durable state. Sieges, doors-open grace and player
/// caches are transient and deliberately left out.
pub fn snapshot_world(world: &ClaimWorld) -> WorldSnapshot {
    let mut claims = Vec::with_capacity(world.registry.len());
    for claim in world.registry.top_level() {
        claims.push(claim_record(claim));
        for child_id in claim.children() {
            if let Some(child) = world.registry.get(*child_id) {
                claims.push(claim_record(child));
            }
        }
    }

    let players = world
        .players
        .iter()
        .map(|p| PlayerRecord {
            player_id: p.player_id,
            name: p.name.clone(),
            initial_blocks: p.initial_blocks,
            accrued_blocks: p.accrued_blocks(),
            bonus_blocks: p.bonus_blocks,
        })
        .collect();

    WorldSnapshot {
        world_id: world.registry.world_id(),
        claims,
        players,
    }
}

/// Rebuilds a world from a snapshot. Malformed records (an ownerless basic
/// claim, a subdivision without its parent, overlapping regions) fail the
/// whole load.
pub fn restore_world(
    snapshot: &WorldSnapshot,
    rules: WorldRules,
) -> Result<ClaimWorld, ApplicationError> {
    let mut world = ClaimWorld::new(snapshot.world_id, rules);

    for record in &snapshot.players {
        let rules = world.rules.clone();
        let state = world
            .players
            .get_or_create(record.player_id, &record.name, &rules);
        state.initial_blocks = record.initial_blocks;
        state.bonus_blocks = record.bonus_blocks;
        state.set_accrued_blocks(record.accrued_blocks, &rules);
    }

    // Parents before children, so every subdivision finds its parent in
    // the registry when it arrives.
    let (roots, subdivisions): (Vec<_>, Vec<_>) = snapshot
        .claims
        .iter()
        .partition(|record| record.parent_id.is_none());

    for record in roots.into_iter().chain(subdivisions) {
        let mut claim = materialize(record)?;
        claim.trust = record.trust.clone();
        claim.date_last_active = record.date_last_active;
        world.restore_claim(claim)?;
    }

    Ok(world)
}

fn materialize(record: &ClaimRecord) -> Result<Claim, ApplicationError> {
    let claim = match (record.kind, record.parent_id) {
        (ClaimKind::Subdivision, Some(parent)) => {
            Claim::subdivision(Some(record.id), record.region, parent)
        }
        (ClaimKind::Subdivision, None) => {
            return Err(ClaimError::Invariant(format!(
                "subdivision {} has no parent on record",
                record.id
            ))
            .into());
        }
        (ClaimKind::Admin, _) => Claim::admin(Some(record.id), record.region),
        (ClaimKind::Basic, _) => {
            let owner = record.owner_id.ok_or_else(|| {
                ClaimError::Invariant(format!("basic claim {} has no owner on record", record.id))
            })?;
            Claim::basic(Some(record.id), record.region, owner)
        }
        (ClaimKind::Wilderness, _) => {
            return Err(ClaimError::Invariant(
                "the wilderness sentinel is never persisted".into(),
            )
            .into());
        }
    };
    Ok(claim)
}
