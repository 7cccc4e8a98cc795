use thiserror::Error;

use crate::claim::ClaimId;
use crate::map::WorldId;

/// Errors for claim lifecycle and siege rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimError {
    #[error("Region overlaps claim {conflicting}")]
    Overlap { conflicting: ClaimId },

    #[error("Not enough claim blocks: need {required}, have {available}")]
    InsufficientBlocks { required: i64, available: i64 },

    #[error("Claim sides must be at least {min_width} blocks ({width}x{height} requested)")]
    TooNarrow {
        width: i64,
        height: i64,
        min_width: i64,
    },

    #[error("Claim area {area} is below the minimum of {min_area}")]
    BelowMinArea { area: i64, min_area: i64 },

    #[error("Subdivision must lie entirely within its parent claim")]
    OutsideParent,

    #[error("Claim {0} is not registered in this world")]
    UnknownClaim(ClaimId),

    #[error("Claim {0} is already registered")]
    DuplicateId(ClaimId),

    #[error("Region belongs to world {region} but the registry covers {registry}")]
    WorldMismatch { region: WorldId, registry: WorldId },

    #[error("Subdivisions cannot hold subdivisions of their own")]
    SubdivisionNesting,

    #[error("The wilderness cannot be reshaped")]
    WildernessImmutable,

    #[error("Claim {0} is already under siege")]
    AlreadyBesieged(ClaimId),

    #[error("Admin claims cannot be besieged")]
    SiegeAdminClaim,

    #[error("The defender holds no access in that claim")]
    SiegeNotEligible,

    #[error("Player is already involved in a siege")]
    AlreadyInSiege,

    #[error("No resize in progress for this player")]
    NoResizeInProgress,

    #[error("Resizing must start from one of the claim's corners")]
    NotAClaimCorner,

    #[error("Claim data invariant violated: {0}")]
    Invariant(String),
}
