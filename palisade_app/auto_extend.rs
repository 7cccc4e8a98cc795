//! Downward auto-extension of freshly staked claims. A new claim's floor
//! sits where the player stood; anything they had already built beneath
//! (basements, mines) should be covered too. The block scan is read-only
//! and runs off the main path; the resulting floor change is applied back
//! through the synchronous world lock.

use std::sync::Arc;

use tracing::debug;

use palisade_game::ports::WorldPort;
use palisade_types::claim::ClaimId;
use palisade_types::map::{Position, Region, WorldId};

use crate::handle::WorldHandle;

pub fn spawn_auto_extend(
    handle: Arc<WorldHandle>,
    claim_id: ClaimId,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let Some(region) = handle.with_world(|w| w.registry.get(claim_id).map(|c| c.region))
        else {
            return;
        };

        let port = Arc::clone(handle.port());
        let world_id = region.world_id;
        let scan =
            tokio::task::spawn_blocking(move || lowest_built_floor(port.as_ref(), world_id, &region))
                .await;

        if let Ok(Some(new_floor)) = scan {
            handle.with_world(|w| {
                let _ = w.lower_claim_floor(claim_id, new_floor);
            });
            debug!(claim_id = %claim_id, new_floor, "Extended claim floor downward.");
        }
    })
}

/// Probes a handful of columns for solid blocks continuing below the
/// current floor and reports the lowest one found. Sampling corners and
/// center keeps the scan cheap even on large claims; the well-used parts
/// of a build hit those columns in practice.
fn lowest_built_floor(port: &dyn WorldPort, world: WorldId, region: &Region) -> Option<i32> {
    let mid_x = region.min_x + (region.max_x - region.min_x) / 2;
    let mid_z = region.min_z + (region.max_z - region.min_z) / 2;
    let columns = [
        (region.min_x, region.min_z),
        (region.min_x, region.max_z),
        (region.max_x, region.min_z),
        (region.max_x, region.max_z),
        (mid_x, mid_z),
    ];

    // Never chase a column below just-under-sea-level; natural caves go
    // deeper than any reasonable basement.
    let stop = port.sea_level(world) - 5;
    let mut lowest = region.floor_y;

    for (x, z) in columns {
        let mut y = region.floor_y - 1;
        while y >= stop && port.block_at(world, Position::new(x, y, z)).id() != "minecraft:air" {
            lowest = lowest.min(y);
            y -= 1;
        }
    }

    (lowest < region.floor_y).then_some(lowest)
}
