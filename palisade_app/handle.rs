use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tracing::{error, info};

use palisade_game::ports::{CapabilitySource, WorldPort};
use palisade_game::world::ClaimWorld;
use palisade_types::claim::{Actor, BlockKind, ClaimId, Denial, DenyReason, PlayerId};
use palisade_types::errors::ApplicationError;
use palisade_types::map::{Position, WorldId};

use crate::persistence::{ClaimStore, snapshot_world};

/// One loaded world and its collaborators. All engine state sits behind a
/// single mutex per world; checks and mutations are fast and synchronous.
/// This is the only surface the host event layer talks to, and it never
/// panics: anything unexpected comes back as an internal-error denial.
pub struct WorldHandle {
    world: Mutex<ClaimWorld>,
    port: Arc<dyn WorldPort>,
    caps: Arc<dyn CapabilitySource>,
    store: Arc<dyn ClaimStore>,
}

impl WorldHandle {
    pub fn new(
        world: ClaimWorld,
        port: Arc<dyn WorldPort>,
        caps: Arc<dyn CapabilitySource>,
        store: Arc<dyn ClaimStore>,
    ) -> Self {
        Self {
            world: Mutex::new(world),
            port,
            caps,
            store,
        }
    }

    pub fn world_id(&self) -> WorldId {
        self.with_world(|w| w.world_id())
    }

    pub fn port(&self) -> &Arc<dyn WorldPort> {
        &self.port
    }

    pub fn capabilities(&self) -> &Arc<dyn CapabilitySource> {
        &self.caps
    }

    /// Runs a closure against the locked world state.
    pub fn with_world<R>(&self, f: impl FnOnce(&mut ClaimWorld) -> R) -> R {
        f(&mut self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, ClaimWorld> {
        match self.world.lock() {
            Ok(guard) => guard,
            // A poisoned lock means a panic mid-mutation elsewhere; the
            // claim data is still the best copy there is, so keep serving.
            Err(poisoned) => {
                error!("claim world mutex poisoned; continuing with last state");
                poisoned.into_inner()
            }
        }
    }

    // ---- verdicts for the host event layer ----------------------------
    //
    // One call per mutating world action. Each resolves the claim at the
    // event position (using the actor's last-claim cache) and runs the
    // matching check.

    pub fn allow_build(&self, actor: &Actor, pos: Position) -> Option<Denial> {
        let mut world = self.lock();
        let claim = world.find_claim_at(pos, false, Some(actor.id)).id;
        world.check_build(claim, actor, self.caps.as_ref(), Utc::now())
    }

    pub fn allow_break(&self, actor: &Actor, pos: Position, block: &BlockKind) -> Option<Denial> {
        let mut world = self.lock();
        let claim = world.find_claim_at(pos, false, Some(actor.id)).id;
        world.check_break(claim, actor, block, self.caps.as_ref())
    }

    pub fn allow_access(&self, actor: &Actor, pos: Position) -> Option<Denial> {
        let mut world = self.lock();
        let claim = world.find_claim_at(pos, false, Some(actor.id)).id;
        world.check_access(claim, actor, self.caps.as_ref())
    }

    pub fn allow_containers(&self, actor: &Actor, pos: Position) -> Option<Denial> {
        let mut world = self.lock();
        let claim = world.find_claim_at(pos, false, Some(actor.id)).id;
        world.check_containers(claim, actor, self.caps.as_ref())
    }

    pub fn allow_edit(&self, actor: &Actor, claim_id: ClaimId) -> Option<Denial> {
        self.with_world(|w| w.check_edit(claim_id, actor, self.caps.as_ref()))
    }

    pub fn allow_grant(&self, actor: &Actor, claim_id: ClaimId) -> Option<Denial> {
        self.with_world(|w| w.check_grant(claim_id, actor, self.caps.as_ref()))
    }

    pub fn allow_more_entities(&self, pos: Position) -> Option<Denial> {
        let mut world = self.lock();
        let claim = world.find_claim_at(pos, true, None).id;
        world.check_more_entities(claim, self.port.as_ref())
    }

    // ---- session hooks ------------------------------------------------

    /// Login: make sure the player has a state record and stamp their
    /// claims as active.
    pub fn player_joined(&self, actor: &Actor) {
        self.with_world(|w| {
            let rules = w.rules.clone();
            w.players.get_or_create(actor.id, &actor.name, &rules);
            w.refresh_last_active(actor.id, Utc::now());
        });
    }

    /// Logout or death mid-siege forfeits it.
    pub fn player_left(&self, player: PlayerId) {
        let forfeited = self.with_world(|w| w.forfeit_siege(player));
        if let Some(siege) = forfeited {
            info!(
                siege_id = %siege.id,
                outcome = ?siege.outcome,
                "Siege forfeited on disconnect."
            );
        }
    }

    // ---- persistence --------------------------------------------------

    /// Writes a snapshot through the store when anything changed since the
    /// last flush. Returns whether a write happened.
    pub async fn flush_if_dirty(&self) -> Result<bool, ApplicationError> {
        let snapshot = {
            let mut world = self.lock();
            if !world.take_dirty() {
                return Ok(false);
            }
            snapshot_world(&world)
        };

        self.store.save_world(snapshot).await?;
        Ok(true)
    }

    /// Fire-and-forget flush; the engine never waits on I/O.
    pub fn spawn_flush(self: &Arc<Self>) {
        let handle = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = handle.flush_if_dirty().await {
                error!(error = %err, "Failed to persist claim data.");
            }
        });
    }

    /// Schedules the end of a post-siege grace period. The engine itself
    /// never expires doors on its own; this is the host-side scheduler.
    pub fn schedule_door_close(self: &Arc<Self>, claim_id: ClaimId, grace: std::time::Duration) {
        let handle = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            handle.with_world(|w| w.close_doors(claim_id));
        });
    }
}

/// Converts an unexpected internal failure into the denial handed to the
/// host: the action is refused, the process keeps running.
pub fn internal_denial() -> Denial {
    Denial::new(DenyReason::Internal)
}
