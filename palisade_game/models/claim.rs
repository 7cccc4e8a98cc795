use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use palisade_types::claim::{ClaimId, ClaimKind, PlayerId, SiegeId, TrustLevel, TrustLists};
use palisade_types::errors::ClaimError;
use palisade_types::map::{Position, Region};

/// Fixes a claim's place in the hierarchy at construction time: only
/// top-level claims hold children, only subdivisions hold a parent, and a
/// subdivision can never grow children of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimShape {
    TopLevel { children: Vec<ClaimId> },
    Subdivision { parent: ClaimId },
}

/// A player claim. Creating an instance doesn't protect anything by itself:
/// only claims committed to a `ClaimRegistry` have any effect, and stale
/// instances floating around after deletion stay inert through
/// `in_registry`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub id: ClaimId,
    pub kind: ClaimKind,
    pub region: Region,
    /// Absent for admin and wilderness claims.
    pub owner_id: Option<PlayerId>,
    shape: ClaimShape,
    pub trust: TrustLists,
    /// The siege currently involving this claim, if any.
    pub siege: Option<SiegeId>,
    /// Post-siege grace: after the defender loses, the claim stays open to
    /// everyone until the host closes it again.
    pub doors_open: bool,
    pub in_registry: bool,
    pub date_last_active: DateTime<Utc>,
}

impl Claim {
    fn top_level(
        id: Option<ClaimId>,
        kind: ClaimKind,
        region: Region,
        owner_id: Option<PlayerId>,
    ) -> Self {
        Self {
            id: id.unwrap_or_else(Uuid::new_v4),
            kind,
            region,
            owner_id,
            shape: ClaimShape::TopLevel { children: vec![] },
            trust: TrustLists::default(),
            siege: None,
            doors_open: false,
            in_registry: false,
            date_last_active: Utc::now(),
        }
    }

    pub fn basic(id: Option<ClaimId>, region: Region, owner_id: PlayerId) -> Self {
        Self::top_level(id, ClaimKind::Basic, region, Some(owner_id))
    }

    pub fn admin(id: Option<ClaimId>, region: Region) -> Self {
        Self::top_level(id, ClaimKind::Admin, region, None)
    }

    pub fn wilderness(id: Option<ClaimId>, region: Region) -> Self {
        Self::top_level(id, ClaimKind::Wilderness, region, None)
    }

    pub fn subdivision(id: Option<ClaimId>, region: Region, parent: ClaimId) -> Self {
        Self {
            id: id.unwrap_or_else(Uuid::new_v4),
            kind: ClaimKind::Subdivision,
            region,
            owner_id: None,
            shape: ClaimShape::Subdivision { parent },
            trust: TrustLists::default(),
            siege: None,
            doors_open: false,
            in_registry: false,
            date_last_active: Utc::now(),
        }
    }

    pub fn is_subdivision(&self) -> bool {
        matches!(self.shape, ClaimShape::Subdivision { .. })
    }

    pub fn is_wilderness(&self) -> bool {
        self.kind == ClaimKind::Wilderness
    }

    pub fn parent_id(&self) -> Option<ClaimId> {
        match &self.shape {
            ClaimShape::Subdivision { parent } => Some(*parent),
            ClaimShape::TopLevel { .. } => None,
        }
    }

    pub fn children(&self) -> &[ClaimId] {
        match &self.shape {
            ClaimShape::TopLevel { children } => children,
            ClaimShape::Subdivision { .. } => &[],
        }
    }

    pub(crate) fn attach_child(&mut self, child: ClaimId) -> Result<(), ClaimError> {
        match &mut self.shape {
            ClaimShape::TopLevel { children } => {
                children.push(child);
                Ok(())
            }
            ClaimShape::Subdivision { .. } => Err(ClaimError::SubdivisionNesting),
        }
    }

    pub(crate) fn detach_child(&mut self, child: ClaimId) {
        if let ClaimShape::TopLevel { children } = &mut self.shape {
            children.retain(|c| *c != child);
        }
    }

    pub fn area(&self) -> i64 {
        self.region.area()
    }

    /// Membership in one of the claim's own trust lists, honoring the
    /// public sentinel. Parent inheritance is handled by the caller.
    pub fn trusted(&self, level: TrustLevel, player: PlayerId) -> bool {
        self.trust.grants(level, player)
    }

    /// Geometric containment against this claim's own region only. The
    /// hierarchy-aware variant lives on the registry, which can see the
    /// parent and children.
    pub fn region_contains(&self, pos: Position, ignore_height: bool) -> bool {
        self.region.contains(self.region.world_id, pos, ignore_height)
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.date_last_active = now;
    }
}
