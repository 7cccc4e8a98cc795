use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use palisade_types::claim::{ClaimId, PlayerId, SiegeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SiegeOutcome {
    AttackerWin,
    DefenderWin,
    Aborted,
}

/// One adversarial siege between two players. Starts on a single claim and
/// may grow to cover neighbours as the defender is chased across borders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiegeState {
    pub id: SiegeId,
    pub attacker: PlayerId,
    pub defender: PlayerId,
    pub started_at: DateTime<Utc>,
    pub claims: Vec<ClaimId>,
    pub outcome: Option<SiegeOutcome>,
}

impl SiegeState {
    pub fn new(
        attacker: PlayerId,
        defender: PlayerId,
        claim: ClaimId,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            attacker,
            defender,
            started_at,
            claims: vec![claim],
            outcome: None,
        }
    }

    pub fn involves(&self, player: PlayerId) -> bool {
        self.attacker == player || self.defender == player
    }
}

/// Bookkeeping for the sieges of one world. The transitions themselves
/// (who may start one, what ending does to claims and players) live on
/// `ClaimWorld`, which can reach the registry and player states.
#[derive(Debug, Default)]
pub struct SiegeController {
    active: HashMap<SiegeId, SiegeState>,
    history: Vec<SiegeState>,
}

impl SiegeController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: SiegeId) -> Option<&SiegeState> {
        self.active.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: SiegeId) -> Option<&mut SiegeState> {
        self.active.get_mut(&id)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn find_involving(&self, player: PlayerId) -> Option<&SiegeState> {
        self.active.values().find(|s| s.involves(player))
    }

    pub(crate) fn begin(&mut self, siege: SiegeState) -> SiegeId {
        let id = siege.id;
        self.active.insert(id, siege);
        id
    }

    /// Pulls the siege out of the active set, stamps the outcome, and files
    /// it. Returns `None` when no such siege is running; ending a siege
    /// that doesn't exist is a no-op, never an error.
    pub(crate) fn conclude(&mut self, id: SiegeId, outcome: SiegeOutcome) -> Option<SiegeState> {
        let mut siege = self.active.remove(&id)?;
        siege.outcome = Some(outcome);
        self.history.push(siege.clone());
        Some(siege)
    }

    /// Concluded sieges, oldest first.
    pub fn history(&self) -> &[SiegeState] {
        &self.history
    }
}
