use std::sync::Arc;

use tracing::info;

use palisade_types::errors::ApplicationError;

use crate::commands::{CommandHandler, CommandOutcome, TrustPlayer};
use crate::handle::WorldHandle;

pub struct TrustPlayerCommandHandler {}

impl TrustPlayerCommandHandler {
    pub fn new() -> Self {
        Self {}
    }
}

#[async_trait::async_trait]
impl CommandHandler<TrustPlayer> for TrustPlayerCommandHandler {
    type Output = ();

    async fn handle(
        &self,
        command: TrustPlayer,
        world: &Arc<WorldHandle>,
    ) -> Result<CommandOutcome<()>, ApplicationError> {
        // Granting requires edit rights or a spot on the manager list.
        if let Some(denial) = world.allow_grant(&command.actor, command.claim_id) {
            return Ok(CommandOutcome::Denied(denial));
        }

        world.with_world(|w| {
            if command.revoke {
                w.remove_trust(command.claim_id, command.level, command.target)
            } else {
                w.add_trust(command.claim_id, command.level, command.target)
            }
        })?;

        info!(
            claim_id = %command.claim_id,
            actor = %command.actor.name,
            target = %command.target,
            level = ?command.level,
            revoke = command.revoke,
            "Trust list updated."
        );
        world.spawn_flush();
        Ok(CommandOutcome::Applied(()))
    }
}
