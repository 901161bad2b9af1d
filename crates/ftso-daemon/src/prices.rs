//! Price providers.
//!
//! Real exchange connectors live outside this workspace. The daemon ships a
//! fixed provider and a noisy one for devnets, both keyed by feed name.

use std::collections::HashMap;

use ftso_types::{Feed, TOTAL_BIPS};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{FeedsConfig, ProviderKind};

/// Source of the prices a voter commits to.
#[derive(Debug)]
pub enum PriceProvider {
    /// Reports the configured base price unchanged.
    Fixed {
        prices: HashMap<String, f64>,
    },
    /// Reports the base price moved by up to `spread_bips` either way.
    Random {
        prices: HashMap<String, f64>,
        spread_bips: u64,
        rng: Mutex<StdRng>,
    },
}

impl PriceProvider {
    /// Build the configured provider. `seed` feeds the random variant.
    pub fn from_config(config: &FeedsConfig, seed: u64) -> Self {
        let prices = config
            .feeds
            .iter()
            .map(|f| (f.name.clone(), f.base_price))
            .collect();
        match config.provider {
            ProviderKind::Fixed => PriceProvider::Fixed { prices },
            ProviderKind::Random => PriceProvider::Random {
                prices,
                spread_bips: config.spread_bips.min(TOTAL_BIPS),
                rng: Mutex::new(StdRng::seed_from_u64(seed)),
            },
        }
    }

    /// Prices for `feeds` in order; `None` for feeds this provider does not
    /// know.
    pub fn prices(&self, feeds: &[Feed]) -> Vec<Option<f64>> {
        match self {
            PriceProvider::Fixed { prices } => feeds
                .iter()
                .map(|f| prices.get(&f.id.name()).copied())
                .collect(),
            PriceProvider::Random {
                prices,
                spread_bips,
                rng,
            } => {
                let mut rng = rng.lock();
                let spread = *spread_bips as i64;
                feeds
                    .iter()
                    .map(|f| {
                        let base = prices.get(&f.id.name()).copied()?;
                        let offset = if spread == 0 {
                            0
                        } else {
                            rng.gen_range(-spread..=spread)
                        };
                        Some(base * (1.0 + offset as f64 / TOTAL_BIPS as f64))
                    })
                    .collect()
            }
        }
    }
}
