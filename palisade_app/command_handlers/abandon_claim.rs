use std::sync::Arc;

use tracing::info;

use palisade_types::errors::ApplicationError;

use crate::commands::{AbandonClaim, CommandHandler, CommandOutcome};
use crate::handle::WorldHandle;

pub struct AbandonClaimCommandHandler {}

impl AbandonClaimCommandHandler {
    pub fn new() -> Self {
        Self {}
    }
}

#[async_trait::async_trait]
impl CommandHandler<AbandonClaim> for AbandonClaimCommandHandler {
    type Output = usize;

    async fn handle(
        &self,
        command: AbandonClaim,
        world: &Arc<WorldHandle>,
    ) -> Result<CommandOutcome<usize>, ApplicationError> {
        if let Some(denial) = world.allow_edit(&command.actor, command.claim_id) {
            return Ok(CommandOutcome::Denied(denial));
        }

        let removed = world.with_world(|w| w.delete_claim(command.claim_id))?;

        info!(
            claim_id = %command.claim_id,
            actor = %command.actor.name,
            subdivisions = removed.len() - 1,
            "Claim abandoned."
        );
        world.spawn_flush();
        Ok(CommandOutcome::Applied(removed.len()))
    }
}
