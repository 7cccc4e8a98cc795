use dotenvy::dotenv;
use std::env;

use palisade_types::claim::BlockKind;
use palisade_types::rules::{ClaimsMode, WorldRules};

pub struct Config {
    pub claims_mode: ClaimsMode,
    pub initial_blocks: i32,
    pub accrual_per_tick: i32,
    pub max_accrued_blocks: i32,
    pub min_claim_width: i64,
    pub min_claim_area: i64,
    pub pvp_combat_timeout_secs: i64,
    /// How long a lost claim stays open after a siege before the host
    /// scheduler closes the doors again.
    pub doors_open_grace_secs: i64,
    pub breakable_siege_blocks: Vec<BlockKind>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let claims_mode = match env::var("PALISADE_CLAIMS_MODE") {
            Ok(val) if val.eq_ignore_ascii_case("creative") => ClaimsMode::Creative,
            _ => ClaimsMode::Survival,
        };

        let initial_blocks = env_i32("PALISADE_INITIAL_BLOCKS", 100).max(0);
        let accrual_per_tick = env_i32("PALISADE_ACCRUAL_PER_TICK", 100).max(0);
        let max_accrued_blocks = env_i32("PALISADE_MAX_ACCRUED_BLOCKS", 80_000).max(0);
        let min_claim_width = env_i64("PALISADE_MIN_CLAIM_WIDTH", 5).clamp(1, 100);
        let min_claim_area = env_i64("PALISADE_MIN_CLAIM_AREA", 100).max(1);
        let pvp_combat_timeout_secs = env_i64("PALISADE_PVP_COMBAT_TIMEOUT_SECS", 15).max(0);
        let doors_open_grace_secs = env_i64("PALISADE_DOORS_OPEN_GRACE_SECS", 300).max(0);

        let breakable_siege_blocks = match env::var("PALISADE_SIEGE_BLOCKS") {
            Ok(val) => val
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(BlockKind::new)
                .collect(),
            Err(_) => WorldRules::default().breakable_siege_blocks,
        };

        Self {
            claims_mode,
            initial_blocks,
            accrual_per_tick,
            max_accrued_blocks,
            min_claim_width,
            min_claim_area,
            pvp_combat_timeout_secs,
            doors_open_grace_secs,
            breakable_siege_blocks,
        }
    }

    /// The core-facing slice of this configuration.
    pub fn world_rules(&self) -> WorldRules {
        WorldRules {
            mode: self.claims_mode,
            initial_blocks: self.initial_blocks,
            accrual_per_tick: self.accrual_per_tick,
            max_accrued_blocks: self.max_accrued_blocks,
            min_width: self.min_claim_width,
            min_area: self.min_claim_area,
            pvp_combat_timeout_secs: self.pvp_combat_timeout_secs,
            breakable_siege_blocks: self.breakable_siege_blocks.clone(),
            ..WorldRules::default()
        }
    }
}

fn env_i32(key: &str, default: i32) -> i32 {
    match env::var(key) {
        Ok(val) => val.parse::<i32>().unwrap_or(default),
        Err(_) => default,
    }
}

fn env_i64(key: &str, default: i64) -> i64 {
    match env::var(key) {
        Ok(val) => val.parse::<i64>().unwrap_or(default),
        Err(_) => default,
    }
}
