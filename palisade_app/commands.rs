use std::sync::Arc;

use palisade_types::claim::{Actor, ClaimId, ClaimKind, Denial, PlayerId, TrustLevel};
use palisade_types::errors::ApplicationError;
use palisade_types::map::Position;

use crate::handle::WorldHandle;

/// A player-driven mutation either applies or comes back with the denial
/// that stopped it. Denials are results, not errors; errors are reserved
/// for conflicts, bad balances and genuine failures.
#[derive(Debug)]
pub enum CommandOutcome<T> {
    Applied(T),
    Denied(Denial),
}

impl<T> CommandOutcome<T> {
    pub fn applied(self) -> Option<T> {
        match self {
            CommandOutcome::Applied(value) => Some(value),
            CommandOutcome::Denied(_) => None,
        }
    }
}

#[async_trait::async_trait]
pub trait CommandHandler<C>: Send + Sync {
    type Output;

    async fn handle(
        &self,
        command: C,
        world: &Arc<WorldHandle>,
    ) -> Result<CommandOutcome<Self::Output>, ApplicationError>;
}

pub struct CreateClaim {
    pub actor: Actor,
    pub kind: ClaimKind,
    pub corner_a: Position,
    pub corner_b: Position,
}

pub struct ResizeClaim {
    pub actor: Actor,
    pub claim_id: ClaimId,
    /// The corner the player grabbed; its opposite stays fixed.
    pub grabbed_corner: Position,
    pub new_corner: Position,
}

pub struct AbandonClaim {
    pub actor: Actor,
    pub claim_id: ClaimId,
}

pub struct TrustPlayer {
    pub actor: Actor,
    pub claim_id: ClaimId,
    pub level: TrustLevel,
    pub target: PlayerId,
    pub revoke: bool,
}
