//! Boundary traits for the collaborators the claim engine consumes. The
//! host runtime implements these; the engine never talks to the server
//! directly.

use uuid::Uuid;

use palisade_types::claim::{BlockKind, Capability, ClaimFlag, ClaimId, PlayerId};
use palisade_types::map::{Position, Region, WorldId};

/// A non-player entity as the engine sees it: just enough to count it
/// against a claim's cap and ask for its removal.
#[derive(Debug, Clone)]
pub struct EntityRef {
    pub id: Uuid,
    pub pos: Position,
}

/// World block and entity access. Only entity-cap enforcement and fluid
/// sweeps go through here; the engine never mutates the registry from
/// these calls.
pub trait WorldPort: Send + Sync {
    fn block_at(&self, world: WorldId, pos: Position) -> BlockKind;

    fn set_block(&self, world: WorldId, pos: Position, kind: BlockKind);

    /// Non-player entities whose position falls inside the region's
    /// footprint (any height).
    fn entities_in(&self, region: &Region) -> Vec<EntityRef>;

    fn remove_entity(&self, world: WorldId, entity: Uuid);

    fn sea_level(&self, world: WorldId) -> i32;

    fn build_height(&self, world: WorldId) -> i32;
}

/// External permission-system lookups. Boolean capabilities are
/// server-wide grants; claim flags are three-valued so "no opinion" never
/// collapses into a denial.
pub trait CapabilitySource: Send + Sync {
    fn capability(&self, player: PlayerId, cap: Capability) -> bool;

    fn claim_flag(
        &self,
        claim: ClaimId,
        flag: ClaimFlag,
        player: PlayerId,
        detail: Option<&str>,
    ) -> palisade_types::claim::Decision;
}

/// A capability source that grants nothing and abstains from every flag.
/// Handy default for tests and for hosts without a permission plugin.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCapabilities;

impl CapabilitySource for NoCapabilities {
    fn capability(&self, _player: PlayerId, _cap: Capability) -> bool {
        false
    }

    fn claim_flag(
        &self,
        _claim: ClaimId,
        _flag: ClaimFlag,
        _player: PlayerId,
        _detail: Option<&str>,
    ) -> palisade_types::claim::Decision {
        palisade_types::claim::Decision::Abstain
    }
}
