//! Reveal pacing strategies

use crate::config::TypewriterConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Decides how much text each tick reveals and how long to wait between ticks
pub trait Pacing: Send {
    /// Characters revealed by the next tick; at least one is always revealed
    fn chunk_size(&mut self) -> usize;

    fn delay(&mut self) -> Duration;
}

/// Uniformly random chunk sizes and delays within configured bounds
#[derive(Debug, Clone)]
pub struct RandomPacing {
    config: TypewriterConfig,
    rng: StdRng,
}

impl RandomPacing {
    pub fn new(config: TypewriterConfig) -> Self {
        Self {
            config,
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic sequence, for reproducible output
    pub fn seeded(config: TypewriterConfig, seed: u64) -> Self {
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Pacing for RandomPacing {
    fn chunk_size(&mut self) -> usize {
        let min = self.config.min_chunk.max(1);
        let max = self.config.max_chunk.max(min);
        self.rng.gen_range(min..=max)
    }

    fn delay(&mut self) -> Duration {
        let min = self.config.min_delay_ms;
        let max = self.config.max_delay_ms.max(min);
        Duration::from_millis(self.rng.gen_range(min..=max))
    }
}

/// Same chunk and delay every tick
#[derive(Debug, Clone, Copy)]
pub struct FixedPacing {
    pub chunk: usize,
    pub delay: Duration,
}

impl Pacing for FixedPacing {
    fn chunk_size(&mut self) -> usize {
        self.chunk
    }

    fn delay(&mut self) -> Duration {
        self.delay
    }
}

/// Reveal everything on the first tick
#[derive(Debug, Clone, Copy, Default)]
pub struct InstantPacing;

impl Pacing for InstantPacing {
    fn chunk_size(&mut self) -> usize {
        usize::MAX
    }

    fn delay(&mut self) -> Duration {
        Duration::ZERO
    }
}
