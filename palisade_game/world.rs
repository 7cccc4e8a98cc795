//! The per-world claim context: registry, player states, sieges and rules
//! wired together. Every permission check and lifecycle operation goes
//! through `ClaimWorld`; there is no ambient global store.

use chrono::{DateTime, Utc};

use palisade_types::claim::{
    Actor, BlockKind, Capability, ClaimFlag, ClaimId, ClaimKind, Decision, Denial, DenyReason,
    PlayerId, SiegeId, TrustLevel,
};
use palisade_types::errors::ClaimError;
use palisade_types::map::{Position, Region, WorldId};
use palisade_types::rules::{ClaimsMode, WorldRules};

use crate::models::claim::Claim;
use crate::models::player_state::{PlayerStates, ResizeFlow};
use crate::models::registry::ClaimRegistry;
use crate::models::siege::{SiegeController, SiegeOutcome, SiegeState};
use crate::ports::{CapabilitySource, WorldPort};

const AIR: &str = "minecraft:air";

fn is_fluid(kind: &BlockKind) -> bool {
    matches!(
        kind.id(),
        "minecraft:water"
            | "minecraft:flowing_water"
            | "minecraft:lava"
            | "minecraft:flowing_lava"
    )
}

pub struct ClaimWorld {
    pub rules: WorldRules,
    pub registry: ClaimRegistry,
    pub players: PlayerStates,
    pub sieges: SiegeController,
    dirty: bool,
}

impl ClaimWorld {
    pub fn new(world_id: WorldId, rules: WorldRules) -> Self {
        Self {
            rules,
            registry: ClaimRegistry::new(world_id),
            players: PlayerStates::new(world_id),
            sieges: SiegeController::new(),
            dirty: false,
        }
    }

    pub fn world_id(&self) -> WorldId {
        self.registry.world_id()
    }

    /// Whether unsaved changes piled up since the flag was last taken. The
    /// persistence collaborator polls this to batch writes.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    // ---- spatial lookups ----------------------------------------------

    /// The most specific claim at a point, consulting and refreshing the
    /// player's last-known-claim cache when a player is given.
    pub fn find_claim_at(
        &mut self,
        pos: Position,
        ignore_height: bool,
        for_player: Option<PlayerId>,
    ) -> &Claim {
        let hint = for_player
            .and_then(|p| self.players.get(p))
            .and_then(|s| s.last_claim);
        let found = self.registry.find_at(pos, ignore_height, hint);
        let id = found.id;
        let is_wilderness = found.is_wilderness();

        if let Some(player) = for_player {
            if let Some(state) = self.players.get_mut(player) {
                state.last_claim = (!is_wilderness).then_some(id);
            }
        }

        match self.registry.get(id) {
            Some(claim) => claim,
            None => self.registry.wilderness(),
        }
    }

    // ---- permission checks --------------------------------------------
    //
    // Every check mirrors one decision ladder: each rule is a small named
    // step and the ladder evaluates them in a fixed order with early
    // returns, so the precedence per action stays auditable. `None` means
    // allowed. Unknown claim ids yield an internal-error denial: checks
    // are total, they never panic or throw.

    pub fn check_edit(
        &self,
        claim_id: ClaimId,
        actor: &Actor,
        caps: &dyn CapabilitySource,
    ) -> Option<Denial> {
        let Some(claim) = self.registry.get(claim_id) else {
            return Some(Denial::new(DenyReason::Internal));
        };
        self.edit_denial(claim, actor, caps)
    }

    fn edit_denial(
        &self,
        claim: &Claim,
        actor: &Actor,
        caps: &dyn CapabilitySource,
    ) -> Option<Denial> {
        // Admins in ignore-claims mode may edit anything.
        if self.ignores_claims(actor.id) {
            return None;
        }

        if self.registry.effective_kind(claim) == ClaimKind::Admin {
            if caps.capability(actor.id, Capability::AdminClaims) {
                return None;
            }
        } else if caps.capability(actor.id, Capability::DeleteClaims) {
            return None;
        }

        // Owners can do whatever, except while their claim is besieged.
        if claim.owner_id == Some(actor.id) && !self.debugs_permissions(actor.id) {
            if claim.siege.is_some() {
                return Some(Denial::new(DenyReason::NoModifyDuringSiege));
            }
            return None;
        }

        if claim.is_wilderness() && caps.capability(actor.id, Capability::WildernessAdmin) {
            return None;
        }

        if let Some(parent) = self.parent_of(claim) {
            return self.edit_denial(parent, actor, caps);
        }

        Some(Denial::new(DenyReason::OnlyOwnersModify(
            self.owner_display(claim),
        )))
    }

    pub fn check_build(
        &mut self,
        claim_id: ClaimId,
        actor: &Actor,
        caps: &dyn CapabilitySource,
        now: DateTime<Utc>,
    ) -> Option<Denial> {
        // A build attempt by a besieged player may drag this claim into
        // the fight before anything else is decided.
        self.try_extend_siege(actor.id, claim_id, caps);

        let Some(claim) = self.registry.get(claim_id) else {
            return Some(Denial::new(DenyReason::Internal));
        };
        self.build_denial(claim, actor, caps, now)
    }

    fn build_denial(
        &self,
        claim: &Claim,
        actor: &Actor,
        caps: &dyn CapabilitySource,
        now: DateTime<Utc>,
    ) -> Option<Denial> {
        if claim.is_wilderness() {
            return None;
        }

        if self.registry.effective_kind(claim) == ClaimKind::Admin
            && caps.capability(actor.id, Capability::AdminClaims)
        {
            return None;
        }

        if let Some(siege_id) = claim.siege {
            return Some(Denial::new(DenyReason::NoBuildUnderSiege(
                self.attacker_display(siege_id),
            )));
        }

        if self
            .players
            .get(actor.id)
            .is_some_and(|p| p.in_pvp_combat(now, &self.rules))
        {
            return Some(Denial::new(DenyReason::NoBuildPvp));
        }

        if self.has_full_access(claim, actor.id) {
            return None;
        }

        if caps.claim_flag(claim.id, ClaimFlag::BlockPlace, actor.id, None) == Decision::Allow {
            return None;
        }

        if claim.trusted(TrustLevel::Build, actor.id) {
            return None;
        }

        if let Some(parent) = self.parent_of(claim) {
            return self.build_denial(parent, actor, caps, now);
        }

        Some(
            Denial::new(DenyReason::NoBuildPermission(self.owner_display(claim)))
                .with_bypass_hint(caps.capability(actor.id, Capability::IgnoreClaims)),
        )
    }

    pub fn check_break(
        &self,
        claim_id: ClaimId,
        actor: &Actor,
        block: &BlockKind,
        caps: &dyn CapabilitySource,
    ) -> Option<Denial> {
        let Some(claim) = self.registry.get(claim_id) else {
            return Some(Denial::new(DenyReason::Internal));
        };

        if claim.is_wilderness() {
            return None;
        }

        // Siege rules replace the normal ladder entirely: only listed
        // materials break, and not by the defenders themselves.
        if claim.siege.is_some() || claim.doors_open {
            if !self.rules.breakable_siege_blocks.contains(block) {
                return Some(Denial::new(DenyReason::NonSiegeMaterial));
            }
            if self.has_full_access(claim, actor.id) {
                return Some(Denial::new(DenyReason::NoOwnerBuildUnderSiege));
            }
            return None;
        }

        if self.has_full_access(claim, actor.id) {
            return None;
        }

        if claim.trusted(TrustLevel::Build, actor.id) {
            return None;
        }

        if caps.claim_flag(claim.id, ClaimFlag::BlockBreak, actor.id, Some(block.id()))
            == Decision::Allow
        {
            return None;
        }

        // Unlike building, breaking deliberately has no parent fallback.
        Some(
            Denial::new(DenyReason::NoBuildPermission(self.owner_display(claim)))
                .with_bypass_hint(caps.capability(actor.id, Capability::IgnoreClaims)),
        )
    }

    pub fn check_access(
        &self,
        claim_id: ClaimId,
        actor: &Actor,
        caps: &dyn CapabilitySource,
    ) -> Option<Denial> {
        let Some(claim) = self.registry.get(claim_id) else {
            return Some(Denial::new(DenyReason::Internal));
        };
        self.access_denial(claim, actor, caps)
    }

    fn access_denial(
        &self,
        claim: &Claim,
        actor: &Actor,
        caps: &dyn CapabilitySource,
    ) -> Option<Denial> {
        if claim.is_wilderness() {
            return None;
        }

        if self.registry.effective_kind(claim) == ClaimKind::Admin
            && caps.capability(actor.id, Capability::AdminClaims)
        {
            return None;
        }

        // Post-siege grace period: everything stands open.
        if claim.doors_open {
            return None;
        }

        if self.has_full_access(claim, actor.id) {
            return None;
        }

        if claim.trusted(TrustLevel::Access, actor.id)
            || claim.trusted(TrustLevel::Build, actor.id)
            || claim.trusted(TrustLevel::Container, actor.id)
        {
            return None;
        }

        if let Some(item) = &actor.held_item {
            match caps.claim_flag(claim.id, ClaimFlag::ItemUse, actor.id, Some(item.id())) {
                Decision::Deny => {
                    return Some(Denial::new(DenyReason::ItemNotAuthorized(
                        item.id().to_string(),
                    )));
                }
                Decision::Allow => return None,
                Decision::Abstain => {}
            }
        }

        if let Some(parent) = self.parent_of(claim) {
            return self.access_denial(parent, actor, caps);
        }

        Some(
            Denial::new(DenyReason::NoAccessPermission(self.owner_display(claim)))
                .with_bypass_hint(caps.capability(actor.id, Capability::IgnoreClaims)),
        )
    }

    pub fn check_containers(
        &mut self,
        claim_id: ClaimId,
        actor: &Actor,
        caps: &dyn CapabilitySource,
    ) -> Option<Denial> {
        // Reaching for a chest can extend a siege just like building.
        self.try_extend_siege(actor.id, claim_id, caps);

        let Some(claim) = self.registry.get(claim_id) else {
            return Some(Denial::new(DenyReason::Internal));
        };
        self.containers_denial(claim, actor, caps)
    }

    fn containers_denial(
        &self,
        claim: &Claim,
        actor: &Actor,
        caps: &dyn CapabilitySource,
    ) -> Option<Denial> {
        if claim.is_wilderness() {
            return None;
        }

        // Nobody opens containers in a besieged claim, owners included, so
        // loot can't be spirited away mid-fight.
        if let Some(siege_id) = claim.siege {
            return Some(Denial::new(DenyReason::NoContainersSiege(
                self.attacker_display(siege_id),
            )));
        }

        if self.has_full_access(claim, actor.id) {
            return None;
        }

        if self.registry.effective_kind(claim) == ClaimKind::Admin
            && caps.capability(actor.id, Capability::AdminClaims)
        {
            return None;
        }

        if claim.trusted(TrustLevel::Build, actor.id)
            || claim.trusted(TrustLevel::Container, actor.id)
        {
            return None;
        }

        if let Some(parent) = self.parent_of(claim) {
            return self.containers_denial(parent, actor, caps);
        }

        Some(
            Denial::new(DenyReason::NoContainersPermission(self.owner_display(claim)))
                .with_bypass_hint(caps.capability(actor.id, Capability::IgnoreClaims)),
        )
    }

    pub fn check_grant(
        &self,
        claim_id: ClaimId,
        actor: &Actor,
        caps: &dyn CapabilitySource,
    ) -> Option<Denial> {
        let Some(claim) = self.registry.get(claim_id) else {
            return Some(Denial::new(DenyReason::Internal));
        };
        self.grant_denial(claim, actor, caps)
    }

    fn grant_denial(
        &self,
        claim: &Claim,
        actor: &Actor,
        caps: &dyn CapabilitySource,
    ) -> Option<Denial> {
        // Anyone who can edit the claim can grant permissions on it.
        if self.edit_denial(claim, actor, caps).is_none() {
            return None;
        }

        if claim.trusted(TrustLevel::Manage, actor.id) {
            return None;
        }

        if let Some(parent) = self.parent_of(claim) {
            return self.grant_denial(parent, actor, caps);
        }

        Some(
            Denial::new(DenyReason::NoPermissionTrust(self.owner_display(claim)))
                .with_bypass_hint(caps.capability(actor.id, Capability::IgnoreClaims)),
        )
    }

    /// The one permission check with a side effect beyond its verdict:
    /// entities over the cap are removed through the world port.
    pub fn check_more_entities(
        &self,
        claim_id: ClaimId,
        port: &dyn WorldPort,
    ) -> Option<Denial> {
        let Some(claim) = self.registry.get(claim_id) else {
            return Some(Denial::new(DenyReason::Internal));
        };
        self.entity_denial(claim, port)
    }

    fn entity_denial(&self, claim: &Claim, port: &dyn WorldPort) -> Option<Denial> {
        // Subdivisions share their parent's budget.
        if let Some(parent) = self.parent_of(claim) {
            return self.entity_denial(parent, port);
        }

        if self.rules.mode != ClaimsMode::Creative {
            return None;
        }
        if claim.kind == ClaimKind::Admin || claim.is_wilderness() {
            return None;
        }
        if claim.area() > self.rules.large_claim_area {
            return None;
        }

        let max_entities = claim.area() / self.rules.blocks_per_entity;
        if max_entities == 0 {
            return Some(Denial::new(DenyReason::ClaimTooSmallForEntities));
        }

        let mut total = 0i64;
        for entity in port.entities_in(&claim.region) {
            if self.registry.claim_contains(claim, entity.pos, false, false) {
                total += 1;
                if total > max_entities {
                    port.remove_entity(self.world_id(), entity.id);
                }
            }
        }

        if total > max_entities {
            return Some(Denial::new(DenyReason::TooManyEntitiesInClaim));
        }

        None
    }

    // ---- claim lifecycle ----------------------------------------------

    /// Stakes a new top-level claim between two corners. The block budget
    /// is checked before any geometry is validated against the registry:
    /// the cheap failure comes first.
    pub fn create_claim(
        &mut self,
        actor: &Actor,
        kind: ClaimKind,
        corner_a: Position,
        corner_b: Position,
        caps: &dyn CapabilitySource,
        port: &dyn WorldPort,
    ) -> Result<ClaimId, ClaimError> {
        let region = Region::from_corners(self.world_id(), corner_a, corner_b);

        let claim = match kind {
            ClaimKind::Admin => Claim::admin(None, region),
            ClaimKind::Basic => {
                if !caps.capability(actor.id, Capability::AdminClaims) {
                    self.enforce_minimum_dimensions(&region)?;
                    let state = self.players.get_or_create(actor.id, &actor.name, &self.rules);
                    let available = state.remaining_claim_blocks(&self.registry);
                    let required = region.area();
                    if available < required {
                        return Err(ClaimError::InsufficientBlocks {
                            required,
                            available,
                        });
                    }
                }
                Claim::basic(None, region, actor.id)
            }
            other => {
                return Err(ClaimError::Invariant(format!(
                    "claims are staked as basic or admin, not {other:?}"
                )));
            }
        };

        let id = self.registry.insert(claim)?;
        if kind == ClaimKind::Basic {
            self.players
                .get_or_create(actor.id, &actor.name, &self.rules)
                .owned_claims
                .push(id);
        }

        // New ground in a creative world gets its griefing fluids cleared.
        self.sweep_surface_fluids(region, None, kind, port);
        self.mark_dirty();
        Ok(id)
    }

    /// Carves a subdivision out of an existing claim. Subdivisions spend
    /// no claim blocks; their ground is already paid for by the parent.
    pub fn create_subdivision(
        &mut self,
        parent_id: ClaimId,
        corner_a: Position,
        corner_b: Position,
    ) -> Result<ClaimId, ClaimError> {
        let region = Region::from_corners(self.world_id(), corner_a, corner_b);
        let id = self
            .registry
            .insert(Claim::subdivision(None, region, parent_id))?;
        self.mark_dirty();
        Ok(id)
    }

    /// First click of the two-click resize: pins the corner opposite the
    /// one grabbed, so the second click completes the new rectangle.
    pub fn start_resize(
        &mut self,
        actor: &Actor,
        claim_id: ClaimId,
        corner: Position,
    ) -> Result<(), ClaimError> {
        let claim = self
            .registry
            .get(claim_id)
            .ok_or(ClaimError::UnknownClaim(claim_id))?;
        if claim.is_wilderness() {
            return Err(ClaimError::WildernessImmutable);
        }

        let r = claim.region;
        let on_x_edge = corner.x == r.min_x || corner.x == r.max_x;
        let on_z_edge = corner.z == r.min_z || corner.z == r.max_z;
        if !(on_x_edge && on_z_edge) {
            return Err(ClaimError::NotAClaimCorner);
        }

        let fixed_corner = Position::new(
            if corner.x == r.min_x { r.max_x } else { r.min_x },
            r.floor_y,
            if corner.z == r.min_z { r.max_z } else { r.min_z },
        );

        self.players
            .get_or_create(actor.id, &actor.name, &self.rules)
            .resize = ResizeFlow::AwaitingSecondCorner {
            claim: claim_id,
            fixed_corner,
        };
        Ok(())
    }

    /// Second click: builds the new region and commits it. On a conflict
    /// the original claim is untouched and the resize session stays open,
    /// so the player can pick a different corner.
    pub fn finish_resize(
        &mut self,
        actor: &Actor,
        second_corner: Position,
        caps: &dyn CapabilitySource,
        port: &dyn WorldPort,
    ) -> Result<ClaimId, ClaimError> {
        let flow = self
            .players
            .get(actor.id)
            .map(|s| s.resize)
            .unwrap_or(ResizeFlow::Idle);
        let ResizeFlow::AwaitingSecondCorner {
            claim,
            fixed_corner,
        } = flow
        else {
            return Err(ClaimError::NoResizeInProgress);
        };

        let new_region = Region::from_corners(self.world_id(), fixed_corner, second_corner);
        self.resize_claim(actor, claim, new_region, caps, port)?;

        if let Some(state) = self.players.get_mut(actor.id) {
            state.resize = ResizeFlow::Idle;
        }
        Ok(claim)
    }

    /// Validates and applies a new region for a claim. Growth is billed
    /// against the owner's block balance; a successful shrink in a
    /// creative world sweeps fluids out of the vacated strip.
    pub fn resize_claim(
        &mut self,
        actor: &Actor,
        claim_id: ClaimId,
        new_region: Region,
        caps: &dyn CapabilitySource,
        port: &dyn WorldPort,
    ) -> Result<Region, ClaimError> {
        let claim = self
            .registry
            .get(claim_id)
            .ok_or(ClaimError::UnknownClaim(claim_id))?;
        let kind = claim.kind;
        let owner = claim.owner_id;
        let old_area = claim.area();

        if kind == ClaimKind::Basic && !caps.capability(actor.id, Capability::AdminClaims) {
            self.enforce_minimum_dimensions(&new_region)?;

            let growth = new_region.area() - old_area;
            if growth > 0 {
                // The budget charged is the owner's, even when a staff
                // member does the dragging.
                let available = owner
                    .and_then(|o| self.players.get(o))
                    .map(|s| s.remaining_claim_blocks(&self.registry))
                    .unwrap_or(0);
                if available < growth {
                    return Err(ClaimError::InsufficientBlocks {
                        required: growth,
                        available,
                    });
                }
            }
        }

        let old_region = self.registry.resize(claim_id, new_region)?;

        if old_region.area() > new_region.area() {
            self.sweep_surface_fluids(old_region, Some(&new_region), kind, port);
        }
        self.mark_dirty();
        Ok(old_region)
    }

    /// Deletes a claim and its subdivisions. Any siege touching the claim
    /// is aborted rather than left dangling.
    pub fn delete_claim(&mut self, claim_id: ClaimId) -> Result<Vec<Claim>, ClaimError> {
        let siege = self.registry.get(claim_id).and_then(|c| c.siege);
        if let Some(siege_id) = siege {
            self.end_siege(siege_id, SiegeOutcome::Aborted);
        }

        let removed = self.registry.remove(claim_id);
        if removed.is_empty() {
            return Err(ClaimError::UnknownClaim(claim_id));
        }

        for claim in &removed {
            if let Some(owner) = claim.owner_id {
                if let Some(state) = self.players.get_mut(owner) {
                    state.owned_claims.retain(|c| *c != claim.id);
                }
            }
        }
        let removed_ids: Vec<ClaimId> = removed.iter().map(|c| c.id).collect();
        for state in self.players.iter_mut() {
            if state.last_claim.is_some_and(|c| removed_ids.contains(&c)) {
                state.last_claim = None;
            }
        }

        self.mark_dirty();
        Ok(removed)
    }

    /// Deletes every claim a player owns in this world, freeing their
    /// whole block balance. Returns how many top-level claims went.
    pub fn abandon_all(&mut self, player: PlayerId) -> usize {
        let owned = self.registry.owned_by(player);
        let count = owned.len();
        for id in owned {
            let _ = self.delete_claim(id);
        }
        count
    }

    // ---- trust management ---------------------------------------------

    pub fn add_trust(
        &mut self,
        claim_id: ClaimId,
        level: TrustLevel,
        target: PlayerId,
    ) -> Result<(), ClaimError> {
        let claim = self
            .registry
            .get_mut(claim_id)
            .ok_or(ClaimError::UnknownClaim(claim_id))?;
        claim.trust.list_mut(level).insert(target);
        self.mark_dirty();
        Ok(())
    }

    pub fn remove_trust(
        &mut self,
        claim_id: ClaimId,
        level: TrustLevel,
        target: PlayerId,
    ) -> Result<(), ClaimError> {
        let claim = self
            .registry
            .get_mut(claim_id)
            .ok_or(ClaimError::UnknownClaim(claim_id))?;
        claim.trust.list_mut(level).remove(&target);
        self.mark_dirty();
        Ok(())
    }

    /// Wipes every trust list on the claim and all its subdivisions.
    pub fn clear_trust(&mut self, claim_id: ClaimId) -> Result<(), ClaimError> {
        let children: Vec<ClaimId> = self
            .registry
            .get(claim_id)
            .ok_or(ClaimError::UnknownClaim(claim_id))?
            .children()
            .to_vec();

        if let Some(claim) = self.registry.get_mut(claim_id) {
            claim.trust.clear();
        }
        for child in children {
            if let Some(claim) = self.registry.get_mut(child) {
                claim.trust.clear();
            }
        }
        self.mark_dirty();
        Ok(())
    }

    // ---- player state -------------------------------------------------

    /// Login refresh: stamps activity on every claim the player owns.
    pub fn refresh_last_active(&mut self, player: PlayerId, now: DateTime<Utc>) {
        let owned = self.registry.owned_by(player);
        for id in owned {
            if let Some(claim) = self.registry.get_mut(id) {
                claim.touch(now);
            }
        }
        self.mark_dirty();
    }

    /// Periodic play-time accrual tick for one player.
    pub fn accrue_tick(&mut self, player: PlayerId) {
        if let Some(state) = self.players.get_mut(player) {
            state.accrue(&self.rules);
        }
    }

    /// Drops a claim's lower Y bound so the claim covers structures built
    /// beneath it. The footprint is untouched, so no overlap revalidation
    /// is needed; raising the floor is not supported here.
    pub fn lower_claim_floor(
        &mut self,
        claim_id: ClaimId,
        new_floor: i32,
    ) -> Result<(), ClaimError> {
        let claim = self
            .registry
            .get_mut(claim_id)
            .ok_or(ClaimError::UnknownClaim(claim_id))?;
        if new_floor < claim.region.floor_y {
            claim.region.floor_y = new_floor;
            self.mark_dirty();
        }
        Ok(())
    }

    /// Rebuilds a claim from persisted state. Skips budget checks and
    /// side effects; geometry is still validated so corrupt data can't
    /// smuggle an overlap in.
    pub fn restore_claim(&mut self, claim: Claim) -> Result<ClaimId, ClaimError> {
        let owner = claim.owner_id;
        let id = self.registry.insert(claim)?;
        if let Some(owner) = owner {
            let state = self.players.get_or_create(owner, "unknown", &self.rules);
            if !state.owned_claims.contains(&id) {
                state.owned_claims.push(id);
            }
        }
        Ok(id)
    }

    // ---- sieges -------------------------------------------------------

    /// A claim can be besieged when it isn't admin-ruled and the defender
    /// actually holds access in it.
    pub fn can_siege(
        &self,
        claim_id: ClaimId,
        defender: &Actor,
        caps: &dyn CapabilitySource,
    ) -> bool {
        let Some(claim) = self.registry.get(claim_id) else {
            return false;
        };
        let ancestor = self.registry.top_level_ancestor(claim);
        if ancestor.is_wilderness() {
            return false;
        }
        if self.registry.effective_kind(ancestor) == ClaimKind::Admin {
            return false;
        }
        self.access_denial(ancestor, defender, caps).is_none()
    }

    pub fn start_siege(
        &mut self,
        attacker: &Actor,
        defender: &Actor,
        claim_id: ClaimId,
        caps: &dyn CapabilitySource,
        now: DateTime<Utc>,
    ) -> Result<SiegeId, ClaimError> {
        let claim = self
            .registry
            .get(claim_id)
            .ok_or(ClaimError::UnknownClaim(claim_id))?;
        let ancestor = self.registry.top_level_ancestor(claim);
        let ancestor_id = ancestor.id;

        if ancestor.is_wilderness() {
            return Err(ClaimError::SiegeNotEligible);
        }
        if self.registry.effective_kind(ancestor) == ClaimKind::Admin {
            return Err(ClaimError::SiegeAdminClaim);
        }
        if ancestor.siege.is_some() {
            return Err(ClaimError::AlreadyBesieged(ancestor_id));
        }
        if self.sieges.find_involving(attacker.id).is_some()
            || self.sieges.find_involving(defender.id).is_some()
        {
            return Err(ClaimError::AlreadyInSiege);
        }
        if !self.can_siege(ancestor_id, defender, caps) {
            return Err(ClaimError::SiegeNotEligible);
        }

        let siege_id = self
            .sieges
            .begin(SiegeState::new(attacker.id, defender.id, ancestor_id, now));
        if let Some(claim) = self.registry.get_mut(ancestor_id) {
            claim.siege = Some(siege_id);
        }
        self.players
            .get_or_create(attacker.id, &attacker.name, &self.rules)
            .siege = Some(siege_id);
        self.players
            .get_or_create(defender.id, &defender.name, &self.rules)
            .siege = Some(siege_id);

        Ok(siege_id)
    }

    /// Pulls another claim into an active siege when a besieged player
    /// carries the fight across a border. Quietly does nothing unless all
    /// conditions line up.
    fn try_extend_siege(
        &mut self,
        actor_id: PlayerId,
        claim_id: ClaimId,
        caps: &dyn CapabilitySource,
    ) {
        let Some(siege_id) = self.players.get(actor_id).and_then(|p| p.siege) else {
            return;
        };
        let Some(claim) = self.registry.get(claim_id) else {
            return;
        };
        let ancestor = self.registry.top_level_ancestor(claim);
        let ancestor_id = ancestor.id;

        if ancestor.is_wilderness() || ancestor.siege.is_some() {
            return;
        }
        if self.registry.effective_kind(ancestor) == ClaimKind::Admin {
            return;
        }
        // The fleeing player must hold access in the claim for the siege
        // to follow them into it.
        let actor = Actor::new(
            actor_id,
            self.players.name_of(actor_id).unwrap_or("unknown"),
        );
        if self.access_denial(ancestor, &actor, caps).is_some() {
            return;
        }

        if let Some(claim) = self.registry.get_mut(ancestor_id) {
            claim.siege = Some(siege_id);
        }
        if let Some(siege) = self.sieges.get_mut(siege_id) {
            siege.claims.push(ancestor_id);
        }
    }

    /// Ends a siege with the given outcome. When the attacker wins, every
    /// besieged claim opens its doors for the grace period. Ending a siege
    /// that isn't running is a no-op.
    pub fn end_siege(&mut self, siege_id: SiegeId, outcome: SiegeOutcome) -> Option<SiegeState> {
        let siege = self.sieges.conclude(siege_id, outcome)?;

        for claim_id in &siege.claims {
            if let Some(claim) = self.registry.get_mut(*claim_id) {
                claim.siege = None;
                if outcome == SiegeOutcome::AttackerWin {
                    claim.doors_open = true;
                }
            }
        }
        for player in [siege.attacker, siege.defender] {
            if let Some(state) = self.players.get_mut(player) {
                state.siege = None;
            }
        }

        Some(siege)
    }

    /// A participant dropped out: the defender quitting hands the attacker
    /// the win, the attacker quitting concedes.
    pub fn forfeit_siege(&mut self, player: PlayerId) -> Option<SiegeState> {
        let siege = self.sieges.find_involving(player)?;
        let (id, outcome) = if siege.defender == player {
            (siege.id, SiegeOutcome::AttackerWin)
        } else {
            (siege.id, SiegeOutcome::DefenderWin)
        };
        self.end_siege(id, outcome)
    }

    /// Ends the post-siege grace on a claim. Driven by an external
    /// scheduler; the engine never expires it on its own.
    pub fn close_doors(&mut self, claim_id: ClaimId) {
        if let Some(claim) = self.registry.get_mut(claim_id) {
            claim.doors_open = false;
        }
    }

    // ---- shared rule steps --------------------------------------------

    fn parent_of(&self, claim: &Claim) -> Option<&Claim> {
        claim.parent_id().and_then(|id| self.registry.get(id))
    }

    fn ignores_claims(&self, player: PlayerId) -> bool {
        self.players.get(player).is_some_and(|p| p.ignore_claims)
    }

    fn debugs_permissions(&self, player: PlayerId) -> bool {
        self.players
            .get(player)
            .is_some_and(|p| p.debug_claim_permissions)
    }

    /// Full access: the owner (unless they turned on permission debugging)
    /// or an admin in ignore-claims mode; subdivisions defer to their
    /// parent's owner.
    fn has_full_access(&self, claim: &Claim, player: PlayerId) -> bool {
        if self.ignores_claims(player) {
            return true;
        }
        if claim.owner_id == Some(player) {
            return !self.debugs_permissions(player);
        }
        match self.parent_of(claim) {
            Some(parent) => self.has_full_access(parent, player),
            None => false,
        }
    }

    fn owner_display(&self, claim: &Claim) -> String {
        match self.registry.effective_kind(claim) {
            ClaimKind::Wilderness => "the wilderness".to_string(),
            ClaimKind::Admin => "an administrator".to_string(),
            _ => self
                .registry
                .effective_owner(claim)
                .and_then(|id| self.players.name_of(id))
                .unwrap_or("someone")
                .to_string(),
        }
    }

    fn attacker_display(&self, siege_id: SiegeId) -> String {
        self.sieges
            .get(siege_id)
            .and_then(|s| self.players.name_of(s.attacker))
            .unwrap_or("someone")
            .to_string()
    }

    fn enforce_minimum_dimensions(&self, region: &Region) -> Result<(), ClaimError> {
        if region.width() < self.rules.min_width || region.height() < self.rules.min_width {
            return Err(ClaimError::TooNarrow {
                width: region.width(),
                height: region.height(),
                min_width: self.rules.min_width,
            });
        }
        if region.area() < self.rules.min_area {
            return Err(ClaimError::BelowMinArea {
                area: region.area(),
                min_area: self.rules.min_area,
            });
        }
        Ok(())
    }

    /// Clears standing water and lava from a claim-sized area in creative
    /// worlds, skipping columns still covered by `exclude`. Admin claims
    /// and very large footprints are left alone.
    fn sweep_surface_fluids(
        &self,
        region: Region,
        exclude: Option<&Region>,
        kind: ClaimKind,
        port: &dyn WorldPort,
    ) {
        if self.rules.mode != ClaimsMode::Creative {
            return;
        }
        if kind == ClaimKind::Admin {
            return;
        }
        if region.area() > self.rules.large_claim_area {
            return;
        }

        let world = region.world_id;
        let top = port.build_height(world);
        let start_y = port.sea_level(world) - 1;

        for x in region.min_x..=region.max_x {
            for z in region.min_z..=region.max_z {
                let column = Position::new(x, 0, z);
                if exclude.is_some_and(|ex| ex.contains(world, column, true)) {
                    continue;
                }
                for y in start_y..=top {
                    let pos = Position::new(x, y, z);
                    if is_fluid(&port.block_at(world, pos)) {
                        port.set_block(world, pos, BlockKind::new(AIR));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use palisade_types::claim::{ItemKind, PUBLIC_ID};

    use super::*;
    use crate::ports::NoCapabilities;
    use crate::test_utils::{
        StubCapabilities, StubWorld, WorldFactoryOptions, join_world, world_factory,
    };

    fn test_rules() -> WorldRules {
        WorldRules {
            min_width: 2,
            min_area: 4,
            initial_blocks: 1_000,
            ..Default::default()
        }
    }

    fn creative_rules() -> WorldRules {
        WorldRules {
            mode: ClaimsMode::Creative,
            ..test_rules()
        }
    }

    fn test_world(rules: WorldRules) -> ClaimWorld {
        world_factory(WorldFactoryOptions {
            rules: Some(rules),
            ..Default::default()
        })
    }

    fn stake(
        world: &mut ClaimWorld,
        owner: &Actor,
        bounds: (i32, i32, i32, i32),
    ) -> ClaimId {
        let (ax, az, bx, bz) = bounds;
        world
            .create_claim(
                owner,
                ClaimKind::Basic,
                Position::new(ax, 60, az),
                Position::new(bx, 60, bz),
                &NoCapabilities,
                &StubWorld::default(),
            )
            .unwrap()
    }

    #[test]
    fn test_owner_builds_stranger_denied() {
        let mut world = test_world(test_rules());
        let owner = join_world(&mut world, "Berta");
        let stranger = join_world(&mut world, "Mallory");
        let claim = stake(&mut world, &owner, (0, 0, 10, 10));
        let now = Utc::now();

        assert!(world.check_build(claim, &owner, &NoCapabilities, now).is_none());

        let denial = world
            .check_build(claim, &stranger, &NoCapabilities, now)
            .unwrap();
        assert_eq!(
            denial.reason,
            DenyReason::NoBuildPermission("Berta".into())
        );
        assert!(!denial.bypass_hint);
    }

    #[test]
    fn test_public_builder_trust_opens_claim() {
        let mut world = test_world(test_rules());
        let owner = join_world(&mut world, "Berta");
        let stranger = join_world(&mut world, "Mallory");
        let claim = stake(&mut world, &owner, (0, 0, 10, 10));

        world.add_trust(claim, TrustLevel::Build, PUBLIC_ID).unwrap();
        assert!(
            world
                .check_build(claim, &stranger, &NoCapabilities, Utc::now())
                .is_none()
        );
    }

    #[test]
    fn test_subdivision_inherits_parent_builders() {
        let mut world = test_world(test_rules());
        let owner = join_world(&mut world, "Berta");
        let friend = join_world(&mut world, "Finn");
        let parent = stake(&mut world, &owner, (0, 0, 20, 20));
        let sub = world
            .create_subdivision(parent, Position::new(5, 60, 5), Position::new(10, 60, 10))
            .unwrap();

        world.add_trust(parent, TrustLevel::Build, friend.id).unwrap();

        // Not on the subdivision's own list, but the parent's rules fall
        // through.
        assert!(
            world
                .check_build(sub, &friend, &NoCapabilities, Utc::now())
                .is_none()
        );
        // Containers inherit the same way.
        assert!(world.check_containers(sub, &friend, &NoCapabilities).is_none());
    }

    #[test]
    fn test_ignore_claims_admin_has_full_access() {
        let mut world = test_world(test_rules());
        let owner = join_world(&mut world, "Berta");
        let admin = join_world(&mut world, "Root");
        let claim = stake(&mut world, &owner, (0, 0, 10, 10));

        world.players.get_mut(admin.id).unwrap().ignore_claims = true;

        assert!(world.check_build(claim, &admin, &NoCapabilities, Utc::now()).is_none());
        assert!(world.check_edit(claim, &admin, &NoCapabilities).is_none());
        assert!(world.check_access(claim, &admin, &NoCapabilities).is_none());
    }

    #[test]
    fn test_bypass_capability_advertises_but_still_denies() {
        let mut world = test_world(test_rules());
        let owner = join_world(&mut world, "Berta");
        let staff = join_world(&mut world, "Root");
        let claim = stake(&mut world, &owner, (0, 0, 10, 10));

        let caps = StubCapabilities::default().grant(staff.id, Capability::IgnoreClaims);
        let denial = world.check_build(claim, &staff, &caps, Utc::now()).unwrap();
        assert!(denial.bypass_hint);
    }

    #[test]
    fn test_explicit_place_flag_overrides_trust() {
        let mut world = test_world(test_rules());
        let owner = join_world(&mut world, "Berta");
        let stranger = join_world(&mut world, "Mallory");
        let claim = stake(&mut world, &owner, (0, 0, 10, 10));

        let caps =
            StubCapabilities::default().flag(ClaimFlag::BlockPlace, stranger.id, Decision::Allow);
        assert!(world.check_build(claim, &stranger, &caps, Utc::now()).is_none());
    }

    #[test]
    fn test_pvp_combat_blocks_even_the_owner() {
        let mut world = test_world(test_rules());
        let owner = join_world(&mut world, "Berta");
        let claim = stake(&mut world, &owner, (0, 0, 10, 10));
        let now = Utc::now();

        world.players.get_mut(owner.id).unwrap().tag_pvp_combat(now);

        let denial = world.check_build(claim, &owner, &NoCapabilities, now).unwrap();
        assert_eq!(denial.reason, DenyReason::NoBuildPvp);
    }

    #[test]
    fn test_create_claim_insufficient_blocks_cheap_failure() {
        let mut world = test_world(WorldRules {
            initial_blocks: 50,
            ..test_rules()
        });
        let player = join_world(&mut world, "Skint");

        // 10x10 = 100 blocks against a balance of 50.
        let err = world
            .create_claim(
                &player,
                ClaimKind::Basic,
                Position::new(0, 60, 0),
                Position::new(9, 60, 9),
                &NoCapabilities,
                &StubWorld::default(),
            )
            .unwrap_err();
        assert_eq!(
            err,
            ClaimError::InsufficientBlocks {
                required: 100,
                available: 50
            }
        );
        assert!(world.registry.is_empty());
    }

    #[test]
    fn test_admin_claim_edit_needs_admin_capability() {
        let mut world = test_world(test_rules());
        let staff = join_world(&mut world, "Root");
        let claim = world
            .create_claim(
                &staff,
                ClaimKind::Admin,
                Position::new(0, 60, 0),
                Position::new(20, 60, 20),
                &NoCapabilities,
                &StubWorld::default(),
            )
            .unwrap();

        // Delete-claims is not enough for admin claims.
        let caps = StubCapabilities::default().grant(staff.id, Capability::DeleteClaims);
        assert!(world.check_edit(claim, &staff, &caps).is_some());

        let caps = StubCapabilities::default().grant(staff.id, Capability::AdminClaims);
        assert!(world.check_edit(claim, &staff, &caps).is_none());
    }

    #[test]
    fn test_siege_locks_down_the_claim() {
        let mut world = test_world(test_rules());
        let defender = join_world(&mut world, "Berta");
        let attacker = join_world(&mut world, "Karl");
        let claim = stake(&mut world, &defender, (0, 0, 10, 10));
        let now = Utc::now();

        world
            .start_siege(&attacker, &defender, claim, &NoCapabilities, now)
            .unwrap();

        // Nobody builds, owner included.
        let denial = world
            .check_build(claim, &defender, &NoCapabilities, now)
            .unwrap();
        assert_eq!(denial.reason, DenyReason::NoBuildUnderSiege("Karl".into()));

        // Containers are locked for everyone.
        let denial = world.check_containers(claim, &defender, &NoCapabilities).unwrap();
        assert_eq!(
            denial.reason,
            DenyReason::NoContainersSiege("Karl".into())
        );

        // No resizing or deleting mid-fight.
        let denial = world.check_edit(claim, &defender, &NoCapabilities).unwrap();
        assert_eq!(denial.reason, DenyReason::NoModifyDuringSiege);
    }

    #[test]
    fn test_siege_break_rules() {
        let mut world = test_world(test_rules());
        let defender = join_world(&mut world, "Berta");
        let attacker = join_world(&mut world, "Karl");
        let claim = stake(&mut world, &defender, (0, 0, 10, 10));

        world
            .start_siege(&attacker, &defender, claim, &NoCapabilities, Utc::now())
            .unwrap();

        let dirt = BlockKind::new("minecraft:dirt");
        let obsidian = BlockKind::new("minecraft:obsidian");

        // Unlisted material never breaks, not even for the owner.
        let denial = world
            .check_break(claim, &defender, &obsidian, &NoCapabilities)
            .unwrap();
        assert_eq!(denial.reason, DenyReason::NonSiegeMaterial);

        // Listed material breaks for the attacker...
        assert!(world.check_break(claim, &attacker, &dirt, &NoCapabilities).is_none());

        // ...but the defenders can't tear down their own walls.
        let denial = world
            .check_break(claim, &defender, &dirt, &NoCapabilities)
            .unwrap();
        assert_eq!(denial.reason, DenyReason::NoOwnerBuildUnderSiege);
    }

    #[test]
    fn test_siege_extends_when_defender_builds_next_door() {
        let mut world = test_world(test_rules());
        let defender = join_world(&mut world, "Berta");
        let attacker = join_world(&mut world, "Karl");
        let home = stake(&mut world, &defender, (0, 0, 10, 10));
        let refuge = stake(&mut world, &defender, (12, 0, 22, 10));
        let now = Utc::now();

        let siege_id = world
            .start_siege(&attacker, &defender, home, &NoCapabilities, now)
            .unwrap();

        // Fleeing into the second claim and building pulls it in.
        let denial = world
            .check_build(refuge, &defender, &NoCapabilities, now)
            .unwrap();
        assert_eq!(denial.reason, DenyReason::NoBuildUnderSiege("Karl".into()));
        assert_eq!(world.registry.get(refuge).unwrap().siege, Some(siege_id));
        assert_eq!(world.sieges.get(siege_id).unwrap().claims.len(), 2);
    }

    #[test]
    fn test_attacker_win_opens_doors_until_closed() {
        let mut world = test_world(test_rules());
        let defender = join_world(&mut world, "Berta");
        let attacker = join_world(&mut world, "Karl");
        let stranger = join_world(&mut world, "Mallory");
        let claim = stake(&mut world, &defender, (0, 0, 10, 10));

        let siege_id = world
            .start_siege(&attacker, &defender, claim, &NoCapabilities, Utc::now())
            .unwrap();

        // Defender logs out: forfeit, attacker wins.
        let ended = world.forfeit_siege(defender.id).unwrap();
        assert_eq!(ended.outcome, Some(SiegeOutcome::AttackerWin));
        assert!(world.sieges.get(siege_id).is_none());

        // Grace period: the claim stands open to anyone.
        assert!(world.check_access(claim, &stranger, &NoCapabilities).is_none());

        world.close_doors(claim);
        assert!(world.check_access(claim, &stranger, &NoCapabilities).is_some());
    }

    #[test]
    fn test_ending_unknown_siege_is_noop() {
        let mut world = test_world(test_rules());
        assert!(world.end_siege(Uuid::new_v4(), SiegeOutcome::Aborted).is_none());
    }

    #[test]
    fn test_resize_two_click_flow() {
        let mut world = test_world(test_rules());
        let owner = join_world(&mut world, "Berta");
        let claim = stake(&mut world, &owner, (0, 0, 10, 10));
        let port = StubWorld::default();

        // Grab the far corner, drag it out.
        world
            .start_resize(&owner, claim, Position::new(10, 60, 10))
            .unwrap();
        let resized = world
            .finish_resize(&owner, Position::new(15, 60, 15), &NoCapabilities, &port)
            .unwrap();
        assert_eq!(resized, claim);

        let region = world.registry.get(claim).unwrap().region;
        assert_eq!((region.min_x, region.min_z, region.max_x, region.max_z), (0, 0, 15, 15));
    }

    #[test]
    fn test_resize_conflict_keeps_original_and_session() {
        let mut world = test_world(test_rules());
        let owner = join_world(&mut world, "Berta");
        let neighbour = join_world(&mut world, "Nils");
        let claim = stake(&mut world, &owner, (0, 0, 10, 10));
        let blocker = stake(&mut world, &neighbour, (14, 0, 24, 10));
        let port = StubWorld::default();

        world
            .start_resize(&owner, claim, Position::new(10, 60, 10))
            .unwrap();
        let err = world
            .finish_resize(&owner, Position::new(18, 60, 10), &NoCapabilities, &port)
            .unwrap_err();
        assert_eq!(err, ClaimError::Overlap { conflicting: blocker });

        // Original untouched, session still open for another try.
        assert_eq!(world.registry.get(claim).unwrap().region.max_x, 10);
        assert!(
            world
                .finish_resize(&owner, Position::new(12, 60, 12), &NoCapabilities, &port)
                .is_ok()
        );
    }

    #[test]
    fn test_resize_must_start_from_a_corner() {
        let mut world = test_world(test_rules());
        let owner = join_world(&mut world, "Berta");
        let claim = stake(&mut world, &owner, (0, 0, 10, 10));

        assert_eq!(
            world.start_resize(&owner, claim, Position::new(5, 60, 10)),
            Err(ClaimError::NotAClaimCorner)
        );
    }

    #[test]
    fn test_shrink_sweeps_fluids_from_vacated_strip() {
        let mut world = test_world(creative_rules());
        let owner = join_world(&mut world, "Berta");
        let claim = stake(&mut world, &owner, (0, 0, 10, 10));
        let world_id = world.world_id();

        let port = StubWorld::default();
        let lava_pos = Position::new(8, 64, 5);
        port.put_block(world_id, lava_pos, BlockKind::new("minecraft:lava"));
        let kept_pos = Position::new(2, 64, 5);
        port.put_block(world_id, kept_pos, BlockKind::new("minecraft:lava"));

        let new_region = Region {
            world_id,
            min_x: 0,
            min_z: 0,
            max_x: 5,
            max_z: 10,
            floor_y: 60,
        };
        world
            .resize_claim(&owner, claim, new_region, &NoCapabilities, &port)
            .unwrap();

        let writes = port.block_writes.lock().unwrap();
        assert!(writes.iter().any(|(pos, kind)| *pos == lava_pos && kind.id() == "minecraft:air"));
        // Columns still claimed keep their fluids.
        assert!(writes.iter().all(|(pos, _)| *pos != kept_pos));
    }

    #[test]
    fn test_entity_cap_denies_and_removes_overflow() {
        let mut world = test_world(creative_rules());
        let owner = join_world(&mut world, "Berta");
        // 10x10 = 100 blocks, one entity per 50: cap of 2.
        let claim = stake(&mut world, &owner, (0, 0, 9, 9));

        let port = StubWorld::default();
        port.put_entity(Position::new(1, 64, 1));
        port.put_entity(Position::new(2, 64, 2));
        let excess = port.put_entity(Position::new(3, 64, 3));

        let denial = world.check_more_entities(claim, &port).unwrap();
        assert_eq!(denial.reason, DenyReason::TooManyEntitiesInClaim);
        assert_eq!(*port.removed_entities.lock().unwrap(), vec![excess]);
    }

    #[test]
    fn test_tiny_claim_keeps_no_entities() {
        let mut world = test_world(creative_rules());
        let owner = join_world(&mut world, "Berta");
        // 5x5 = 25 blocks: cap rounds down to zero.
        let claim = stake(&mut world, &owner, (0, 0, 4, 4));

        let denial = world.check_more_entities(claim, &StubWorld::default()).unwrap();
        assert_eq!(denial.reason, DenyReason::ClaimTooSmallForEntities);
    }

    #[test]
    fn test_held_item_flag_short_circuits_access() {
        let mut world = test_world(test_rules());
        let owner = join_world(&mut world, "Berta");
        let claim = stake(&mut world, &owner, (0, 0, 10, 10));

        let visitor = join_world(&mut world, "Vera").holding(ItemKind::new("minecraft:ender_pearl"));
        let caps = StubCapabilities::default().flag(ClaimFlag::ItemUse, visitor.id, Decision::Deny);

        let denial = world.check_access(claim, &visitor, &caps).unwrap();
        assert_eq!(
            denial.reason,
            DenyReason::ItemNotAuthorized("minecraft:ender_pearl".into())
        );

        // An explicit allow also ends the chain, before the default deny.
        let caps = StubCapabilities::default().flag(ClaimFlag::ItemUse, visitor.id, Decision::Allow);
        assert!(world.check_access(claim, &visitor, &caps).is_none());
    }

    #[test]
    fn test_managers_may_grant_permissions() {
        let mut world = test_world(test_rules());
        let owner = join_world(&mut world, "Berta");
        let manager = join_world(&mut world, "Mira");
        let stranger = join_world(&mut world, "Mallory");
        let claim = stake(&mut world, &owner, (0, 0, 10, 10));

        world.add_trust(claim, TrustLevel::Manage, manager.id).unwrap();

        assert!(world.check_grant(claim, &owner, &NoCapabilities).is_none());
        assert!(world.check_grant(claim, &manager, &NoCapabilities).is_none());

        let denial = world.check_grant(claim, &stranger, &NoCapabilities).unwrap();
        assert_eq!(denial.reason, DenyReason::NoPermissionTrust("Berta".into()));
    }

    #[test]
    fn test_abandon_all_restores_balance() {
        let mut world = test_world(test_rules());
        let owner = join_world(&mut world, "Berta");
        stake(&mut world, &owner, (0, 0, 10, 10));
        stake(&mut world, &owner, (50, 50, 60, 60));

        let before = world
            .players
            .get(owner.id)
            .unwrap()
            .remaining_claim_blocks(&world.registry);
        assert_eq!(before, 1_000 - 2 * 121);

        assert_eq!(world.abandon_all(owner.id), 2);
        let after = world
            .players
            .get(owner.id)
            .unwrap()
            .remaining_claim_blocks(&world.registry);
        assert_eq!(after, 1_000);
        assert!(world.registry.is_empty());
    }

    #[test]
    fn test_wilderness_allows_building_but_not_editing() {
        let mut world = test_world(test_rules());
        let player = join_world(&mut world, "Ada");

        let wilds = world.find_claim_at(Position::new(999, 64, 999), true, Some(player.id)).id;
        assert!(world.check_build(wilds, &player, &NoCapabilities, Utc::now()).is_none());
        assert!(world.check_break(wilds, &player, &BlockKind::new("minecraft:stone"), &NoCapabilities).is_none());

        // Reshaping the wilderness itself takes the dedicated capability.
        let denial = world.check_edit(wilds, &player, &NoCapabilities).unwrap();
        assert_eq!(
            denial.reason,
            DenyReason::OnlyOwnersModify("the wilderness".into())
        );

        let caps = StubCapabilities::default().grant(player.id, Capability::WildernessAdmin);
        assert!(world.check_edit(wilds, &player, &caps).is_none());
    }

    #[test]
    fn test_last_claim_cache_tracks_player() {
        let mut world = test_world(test_rules());
        let owner = join_world(&mut world, "Berta");
        let claim = stake(&mut world, &owner, (0, 0, 10, 10));

        let found = world.find_claim_at(Position::new(5, 64, 5), true, Some(owner.id)).id;
        assert_eq!(found, claim);
        assert_eq!(world.players.get(owner.id).unwrap().last_claim, Some(claim));

        // Leaving claimed land clears the hint rather than caching the
        // wilderness sentinel.
        world.find_claim_at(Position::new(500, 64, 500), true, Some(owner.id));
        assert_eq!(world.players.get(owner.id).unwrap().last_claim, None);
    }
}
