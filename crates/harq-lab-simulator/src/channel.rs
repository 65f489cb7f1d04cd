use std::collections::HashMap;

use harq_lab_abstract::{DataFrame, MacNodeId, SimConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Decoder verdict handed to the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOutcome {
    Decoded,
    /// Random block error.
    Corrupted,
    /// Deterministic fault registered by a scenario.
    ForcedCorruption,
}

impl ChannelOutcome {
    pub fn decoded(&self) -> bool {
        matches!(self, ChannelOutcome::Decoded)
    }
}

/// Bernoulli block-error channel with per-direction error rates.
/// Feedback travels on a reliable control channel and never goes through it.
pub struct Channel {
    rng: StdRng,
    config: SimConfig,
    /// (sender, receiver) -> data frames still to corrupt.
    corrupt_next: HashMap<(MacNodeId, MacNodeId), u32>,
}

impl Channel {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            config: config.clone(),
            corrupt_next: HashMap::new(),
        }
    }

    /// Corrupt the next `count` data frames from `from` to `to`. `to` may be
    /// a multicast group, in which case every member's copy counts.
    pub fn add_corrupt_next(&mut self, from: MacNodeId, to: MacNodeId, count: u32) {
        *self.corrupt_next.entry((from, to)).or_insert(0) += count;
    }

    fn take_fault(&mut self, key: (MacNodeId, MacNodeId)) -> bool {
        match self.corrupt_next.get_mut(&key) {
            Some(left) if *left > 0 => {
                *left -= 1;
                true
            }
            _ => false,
        }
    }

    /// Decide the fate of one copy of `frame` arriving at `receiver` and
    /// stamp the verdict on it.
    pub fn transmit(&mut self, frame: &mut DataFrame, receiver: MacNodeId) -> ChannelOutcome {
        let from = frame.source();
        let outcome = if self.take_fault((from, receiver))
            || (frame.dest() != receiver && self.take_fault((from, frame.dest())))
        {
            ChannelOutcome::ForcedCorruption
        } else if self.rng.random::<f64>() < self.config.bler(frame.direction()) {
            ChannelOutcome::Corrupted
        } else {
            ChannelOutcome::Decoded
        };
        if !outcome.decoded() {
            debug!(
                "channel: pdu {} {} -> {} corrupted ({:?})",
                frame.pdu.id, from, receiver, outcome
            );
        }
        frame.decoded = outcome.decoded();
        outcome
    }
}
