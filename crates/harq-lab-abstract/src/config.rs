use serde::{Deserialize, Serialize};

use crate::ids::{Direction, Tick};

/// Parameters of the H-ARQ engine shared by every buffer of a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarqConfig {
    /// Processes per H-ARQ buffer.
    pub processes: u8,
    /// Retransmissions allowed after the first attempt.
    pub max_harq_rtx: u8,
    /// Ticks between reception of a PDU and its ACK/NACK.
    pub fb_evaluation_interval: Tick,
}

impl Default for HarqConfig {
    fn default() -> Self {
        Self {
            processes: 8,
            max_harq_rtx: 3,
            fb_evaluation_interval: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub harq: HarqConfig,
    /// Block error rate per link direction.
    pub bler_dl: f64,
    pub bler_ul: f64,
    pub bler_d2d: f64,
    /// Ticks a frame spends between transmitter and receiver.
    pub propagation_delay: Tick,
    /// H-ARQ units a node may schedule per tick.
    pub grants_per_tick: usize,
    /// Byte budget of a single grant.
    pub grant_bytes: usize,
    /// Hard stop for the run.
    pub max_ticks: Tick,
    pub seed: u64,
}

impl SimConfig {
    pub fn bler(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Dl => self.bler_dl,
            Direction::Ul => self.bler_ul,
            Direction::D2d | Direction::D2dMulti => self.bler_d2d,
        }
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            harq: HarqConfig::default(),
            bler_dl: 0.0,
            bler_ul: 0.0,
            bler_d2d: 0.0,
            propagation_delay: 1,
            grants_per_tick: 2,
            grant_bytes: 1500,
            max_ticks: 10_000,
            seed: 0,
        }
    }
}
