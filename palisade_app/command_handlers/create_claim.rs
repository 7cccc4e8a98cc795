use std::sync::Arc;

use tracing::{error, info};

use palisade_types::claim::ClaimId;
use palisade_types::errors::{ApplicationError, ClaimError};

use crate::auto_extend::spawn_auto_extend;
use crate::commands::{CommandHandler, CommandOutcome, CreateClaim};
use crate::handle::{WorldHandle, internal_denial};

pub struct CreateClaimCommandHandler {}

impl CreateClaimCommandHandler {
    pub fn new() -> Self {
        Self {}
    }
}

#[async_trait::async_trait]
impl CommandHandler<CreateClaim> for CreateClaimCommandHandler {
    type Output = ClaimId;

    async fn handle(
        &self,
        command: CreateClaim,
        world: &Arc<WorldHandle>,
    ) -> Result<CommandOutcome<ClaimId>, ApplicationError> {
        let caps = Arc::clone(world.capabilities());
        let port = Arc::clone(world.port());

        let created = world.with_world(|w| {
            w.create_claim(
                &command.actor,
                command.kind,
                command.corner_a,
                command.corner_b,
                caps.as_ref(),
                port.as_ref(),
            )
        });

        match created {
            Ok(claim_id) => {
                info!(
                    claim_id = %claim_id,
                    owner = %command.actor.name,
                    kind = ?command.kind,
                    "Claim created."
                );
                // Cover whatever the player had already built beneath.
                spawn_auto_extend(Arc::clone(world), claim_id);
                world.spawn_flush();
                Ok(CommandOutcome::Applied(claim_id))
            }
            Err(ClaimError::Invariant(detail)) => {
                error!(%detail, "Claim creation hit an internal inconsistency.");
                Ok(CommandOutcome::Denied(internal_denial()))
            }
            Err(err) => Err(err.into()),
        }
    }
}
