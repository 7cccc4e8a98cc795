use std::sync::Arc;

use tracing::{error, info};

use palisade_types::claim::ClaimId;
use palisade_types::errors::{ApplicationError, ClaimError};

use crate::commands::{CommandHandler, CommandOutcome, ResizeClaim};
use crate::handle::{WorldHandle, internal_denial};

pub struct ResizeClaimCommandHandler {}

impl ResizeClaimCommandHandler {
    pub fn new() -> Self {
        Self {}
    }
}

#[async_trait::async_trait]
impl CommandHandler<ResizeClaim> for ResizeClaimCommandHandler {
    type Output = ClaimId;

    async fn handle(
        &self,
        command: ResizeClaim,
        world: &Arc<WorldHandle>,
    ) -> Result<CommandOutcome<ClaimId>, ApplicationError> {
        // Only someone who may edit the claim gets to drag its corners.
        if let Some(denial) = world.allow_edit(&command.actor, command.claim_id) {
            return Ok(CommandOutcome::Denied(denial));
        }

        let caps = Arc::clone(world.capabilities());
        let port = Arc::clone(world.port());

        let resized = world.with_world(|w| {
            w.start_resize(&command.actor, command.claim_id, command.grabbed_corner)?;
            w.finish_resize(&command.actor, command.new_corner, caps.as_ref(), port.as_ref())
        });

        match resized {
            Ok(claim_id) => {
                info!(
                    claim_id = %claim_id,
                    actor = %command.actor.name,
                    "Claim resized."
                );
                world.spawn_flush();
                Ok(CommandOutcome::Applied(claim_id))
            }
            Err(ClaimError::Invariant(detail)) => {
                error!(%detail, "Claim resize hit an internal inconsistency.");
                Ok(CommandOutcome::Denied(internal_denial()))
            }
            Err(err) => Err(err.into()),
        }
    }
}
