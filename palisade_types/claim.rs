use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub type ClaimId = Uuid;
pub type PlayerId = Uuid;
pub type SiegeId = Uuid;

/// Sentinel player id meaning "all players" when present in a trust list.
pub const PUBLIC_ID: PlayerId = Uuid::nil();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimKind {
    Admin,
    Basic,
    Subdivision,
    Wilderness,
}

/// Access tiers a claim owner can grant. `Build` implies container and
/// access rights for the checks that accept lower tiers; each permission
/// check names the exact lists it consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrustLevel {
    Access,
    Container,
    Build,
    Manage,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustLists {
    pub accessors: HashSet<PlayerId>,
    pub containers: HashSet<PlayerId>,
    pub builders: HashSet<PlayerId>,
    pub managers: HashSet<PlayerId>,
}

impl TrustLists {
    pub fn list(&self, level: TrustLevel) -> &HashSet<PlayerId> {
        match level {
            TrustLevel::Access => &self.accessors,
            TrustLevel::Container => &self.containers,
            TrustLevel::Build => &self.builders,
            TrustLevel::Manage => &self.managers,
        }
    }

    pub fn list_mut(&mut self, level: TrustLevel) -> &mut HashSet<PlayerId> {
        match level {
            TrustLevel::Access => &mut self.accessors,
            TrustLevel::Container => &mut self.containers,
            TrustLevel::Build => &mut self.builders,
            TrustLevel::Manage => &mut self.managers,
        }
    }

    /// Membership check honoring the public sentinel.
    pub fn grants(&self, level: TrustLevel, player: PlayerId) -> bool {
        let list = self.list(level);
        list.contains(&PUBLIC_ID) || list.contains(&player)
    }

    pub fn clear(&mut self) {
        self.accessors.clear();
        self.containers.clear();
        self.builders.clear();
        self.managers.clear();
    }
}

/// Outcome of an external per-claim flag lookup. `Abstain` means the policy
/// source has no opinion and resolution continues down the chain; it must
/// never be collapsed into `Deny`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
    Abstain,
}

/// Server-wide capabilities resolved by the host permission system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    AdminClaims,
    DeleteClaims,
    IgnoreClaims,
    WildernessAdmin,
}

/// Per-claim flags the host policy source may grant or deny explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClaimFlag {
    BlockPlace,
    BlockBreak,
    ItemUse,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockKind(String);

impl BlockKind {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemKind(String);

impl ItemKind {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

/// The acting party of a permission check, as seen by the host event layer.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: PlayerId,
    pub name: String,
    pub held_item: Option<ItemKind>,
}

impl Actor {
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            held_item: None,
        }
    }

    pub fn holding(mut self, item: ItemKind) -> Self {
        self.held_item = Some(item);
        self
    }
}

/// Why a permission check failed. The display text is a default rendering;
/// hosts are free to map reasons to their own messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DenyReason {
    #[error("Only {0} may modify this claim")]
    OnlyOwnersModify(String),

    #[error("This claim can't be modified while under siege")]
    NoModifyDuringSiege,

    #[error("This claim is under siege by {0}; no building allowed")]
    NoBuildUnderSiege(String),

    #[error("You can't build while in PvP combat")]
    NoBuildPvp,

    #[error("You don't have {0}'s permission to build here")]
    NoBuildPermission(String),

    #[error("That material is too tough to break during a siege")]
    NonSiegeMaterial,

    #[error("You can't damage your own claim while it's under siege")]
    NoOwnerBuildUnderSiege,

    #[error("You don't have {0}'s permission to use that")]
    NoAccessPermission(String),

    #[error("You can't use {0} in this claim")]
    ItemNotAuthorized(String),

    #[error("This claim is under siege by {0}; containers are locked")]
    NoContainersSiege(String),

    #[error("You don't have {0}'s permission to use containers here")]
    NoContainersPermission(String),

    #[error("Only {0} or a manager may grant permissions here")]
    NoPermissionTrust(String),

    #[error("This claim is too small to keep entities")]
    ClaimTooSmallForEntities,

    #[error("This claim already holds as many entities as it can support")]
    TooManyEntitiesInClaim,

    #[error("An internal error prevented this action")]
    Internal,
}

/// A failed permission check. Not an error: checks return `Option<Denial>`,
/// `None` meaning allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    pub reason: DenyReason,
    /// Set when the actor holds the ignore-claims capability: the denial
    /// stands, but the host should mention that a bypass is available.
    pub bypass_hint: bool,
}

impl Denial {
    pub fn new(reason: DenyReason) -> Self {
        Self {
            reason,
            bypass_hint: false,
        }
    }

    pub fn with_bypass_hint(mut self, hint: bool) -> Self {
        self.bypass_hint = hint;
        self
    }
}
