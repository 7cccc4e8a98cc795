mod abandon_claim;
mod create_claim;
mod resize_claim;
mod trust_player;

pub use abandon_claim::AbandonClaimCommandHandler;
pub use create_claim::CreateClaimCommandHandler;
pub use resize_claim::ResizeClaimCommandHandler;
pub use trust_player::TrustPlayerCommandHandler;

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use palisade_game::ports::NoCapabilities;
    use palisade_game::test_utils::StubWorld;
    use palisade_game::world::ClaimWorld;
    use palisade_types::rules::WorldRules;
    use uuid::Uuid;

    use crate::handle::WorldHandle;
    use crate::persistence::InMemoryClaimStore;

    pub fn handler_rules() -> WorldRules {
        WorldRules {
            min_width: 2,
            min_area: 4,
            initial_blocks: 10_000,
            ..Default::default()
        }
    }

    pub fn test_handle() -> Arc<WorldHandle> {
        Arc::new(WorldHandle::new(
            ClaimWorld::new(Uuid::new_v4(), handler_rules()),
            Arc::new(StubWorld::default()),
            Arc::new(NoCapabilities),
            Arc::new(InMemoryClaimStore::default()),
        ))
    }
}
