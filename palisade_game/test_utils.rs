use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use rand::Rng;
use uuid::Uuid;

use palisade_types::claim::{
    Actor, BlockKind, Capability, ClaimFlag, ClaimId, Decision, PlayerId,
};
use palisade_types::map::{Position, Region, WorldId};
use palisade_types::rules::WorldRules;

use crate::models::claim::Claim;
use crate::ports::{CapabilitySource, EntityRef, WorldPort};
use crate::world::ClaimWorld;

#[derive(Default, Clone)]
pub struct RegionFactoryOptions {
    pub world_id: Option<WorldId>,
    pub bounds: Option<(i32, i32, i32, i32)>,
    pub floor_y: Option<i32>,
}

pub fn region_factory(options: RegionFactoryOptions) -> Region {
    let (min_x, min_z, max_x, max_z) = options.bounds.unwrap_or_else(|| {
        let mut rng = rand::thread_rng();
        let min_x = rng.gen_range(-10_000..10_000);
        let min_z = rng.gen_range(-10_000..10_000);
        (min_x, min_z, min_x + 10, min_z + 10)
    });

    Region {
        world_id: options.world_id.unwrap_or_else(Uuid::new_v4),
        min_x,
        min_z,
        max_x,
        max_z,
        floor_y: options.floor_y.unwrap_or(60),
    }
}

#[derive(Default, Clone)]
pub struct ClaimFactoryOptions {
    pub id: Option<ClaimId>,
    pub region: Option<Region>,
    pub owner_id: Option<PlayerId>,
    pub admin: bool,
}

pub fn claim_factory(options: ClaimFactoryOptions) -> Claim {
    let region = options
        .region
        .unwrap_or_else(|| region_factory(Default::default()));

    if options.admin {
        Claim::admin(options.id, region)
    } else {
        Claim::basic(
            options.id,
            region,
            options.owner_id.unwrap_or_else(Uuid::new_v4),
        )
    }
}

#[derive(Default, Clone)]
pub struct WorldFactoryOptions {
    pub world_id: Option<WorldId>,
    pub rules: Option<WorldRules>,
}

pub fn world_factory(options: WorldFactoryOptions) -> ClaimWorld {
    ClaimWorld::new(
        options.world_id.unwrap_or_else(Uuid::new_v4),
        options.rules.unwrap_or_default(),
    )
}

/// A fresh actor with a registered player state in the world.
pub fn join_world(world: &mut ClaimWorld, name: &str) -> Actor {
    let actor = Actor::new(Uuid::new_v4(), name);
    let rules = world.rules.clone();
    world.players.get_or_create(actor.id, name, &rules);
    actor
}

/// Capability stub: grants exactly what it was told to, abstains on every
/// flag it wasn't.
#[derive(Default)]
pub struct StubCapabilities {
    grants: HashSet<(PlayerId, Capability)>,
    flags: Vec<(ClaimFlag, PlayerId, Decision)>,
}

impl StubCapabilities {
    pub fn grant(mut self, player: PlayerId, cap: Capability) -> Self {
        self.grants.insert((player, cap));
        self
    }

    pub fn flag(mut self, flag: ClaimFlag, player: PlayerId, decision: Decision) -> Self {
        self.flags.push((flag, player, decision));
        self
    }
}

impl CapabilitySource for StubCapabilities {
    fn capability(&self, player: PlayerId, cap: Capability) -> bool {
        self.grants.contains(&(player, cap))
    }

    fn claim_flag(
        &self,
        _claim: ClaimId,
        flag: ClaimFlag,
        player: PlayerId,
        _detail: Option<&str>,
    ) -> Decision {
        self.flags
            .iter()
            .find(|(f, p, _)| *f == flag && *p == player)
            .map(|(_, _, d)| *d)
            .unwrap_or(Decision::Abstain)
    }
}

/// In-memory world port: blocks and entities are whatever the test put
/// there, and every mutation is recorded for assertions.
#[derive(Default)]
pub struct StubWorld {
    blocks: Mutex<HashMap<(WorldId, Position), BlockKind>>,
    entities: Mutex<Vec<EntityRef>>,
    pub removed_entities: Mutex<Vec<Uuid>>,
    pub block_writes: Mutex<Vec<(Position, BlockKind)>>,
}

impl StubWorld {
    pub fn put_block(&self, world: WorldId, pos: Position, kind: BlockKind) {
        self.blocks.lock().unwrap().insert((world, pos), kind);
    }

    pub fn put_entity(&self, pos: Position) -> Uuid {
        let id = Uuid::new_v4();
        self.entities.lock().unwrap().push(EntityRef { id, pos });
        id
    }
}

impl WorldPort for StubWorld {
    fn block_at(&self, world: WorldId, pos: Position) -> BlockKind {
        self.blocks
            .lock()
            .unwrap()
            .get(&(world, pos))
            .cloned()
            .unwrap_or_else(|| BlockKind::new("minecraft:air"))
    }

    fn set_block(&self, world: WorldId, pos: Position, kind: BlockKind) {
        self.block_writes.lock().unwrap().push((pos, kind.clone()));
        self.blocks.lock().unwrap().insert((world, pos), kind);
    }

    fn entities_in(&self, region: &Region) -> Vec<EntityRef> {
        self.entities
            .lock()
            .unwrap()
            .iter()
            .filter(|e| region.contains(region.world_id, e.pos, true))
            .cloned()
            .collect()
    }

    fn remove_entity(&self, _world: WorldId, entity: Uuid) {
        self.removed_entities.lock().unwrap().push(entity);
    }

    fn sea_level(&self, _world: WorldId) -> i32 {
        63
    }

    fn build_height(&self, _world: WorldId) -> i32 {
        127
    }
}
