use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies a logical world (dimension). Claims never span worlds.
pub type WorldId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

/// Axis-aligned ground-plane rectangle with an unbounded vertical extent.
/// Claims always reach from `floor_y` up to the world ceiling, so only the
/// lower Y bound is stored. `max_x`/`max_z` are inclusive block coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub world_id: WorldId,
    pub min_x: i32,
    pub min_z: i32,
    pub max_x: i32,
    pub max_z: i32,
    pub floor_y: i32,
}

impl Region {
    /// Builds a region from two arbitrary opposite corners, sorting the
    /// bounds so the `min <= max` invariant holds. The floor is the lower
    /// of the two Y coordinates.
    pub fn from_corners(world_id: WorldId, a: Position, b: Position) -> Self {
        Self {
            world_id,
            min_x: a.x.min(b.x),
            min_z: a.z.min(b.z),
            max_x: a.x.max(b.x),
            max_z: a.z.max(b.z),
            floor_y: a.y.min(b.y),
        }
    }

    pub fn width(&self) -> i64 {
        self.max_x as i64 - self.min_x as i64 + 1
    }

    pub fn height(&self) -> i64 {
        self.max_z as i64 - self.min_z as i64 + 1
    }

    /// Area in blocks of the ground footprint.
    pub fn area(&self) -> i64 {
        self.width() * self.height()
    }

    /// Whether a point falls inside this region. With `ignore_height` the
    /// floor bound is skipped, so points below the region still count.
    pub fn contains(&self, world_id: WorldId, pos: Position, ignore_height: bool) -> bool {
        if world_id != self.world_id {
            return false;
        }

        (ignore_height || pos.y >= self.floor_y)
            && pos.x >= self.min_x
            && pos.x <= self.max_x
            && pos.z >= self.min_z
            && pos.z <= self.max_z
    }

    /// Whether two regions share at least one column. Height is ignored:
    /// claims overlap whenever their ground footprints do.
    pub fn overlaps(&self, other: &Region) -> bool {
        self.world_id == other.world_id
            && self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_z <= other.max_z
            && other.min_z <= self.max_z
    }

    /// Whether `other` lies entirely inside this region (footprint only).
    pub fn encloses(&self, other: &Region) -> bool {
        self.world_id == other.world_id
            && other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_z >= self.min_z
            && other.max_z <= self.max_z
    }

    /// The region grown by `radius` blocks on every side of the footprint.
    pub fn expanded(&self, radius: i32) -> Region {
        Region {
            world_id: self.world_id,
            min_x: self.min_x - radius,
            min_z: self.min_z - radius,
            max_x: self.max_x + radius,
            max_z: self.max_z + radius,
            floor_y: self.floor_y,
        }
    }

    /// Band distance check: true when `pos` is within `how_near` blocks of
    /// the region's footprint, at any height.
    pub fn is_near(&self, pos: Position, how_near: i32) -> bool {
        self.expanded(how_near).contains(self.world_id, pos, true)
    }

    /// Sort key used to keep a registry's backing index ordered. Not a
    /// semantic property of regions.
    pub fn order_key(&self) -> (i32, i32, WorldId) {
        (self.min_x, self.min_z, self.world_id)
    }
}
