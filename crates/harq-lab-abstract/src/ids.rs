use serde::{Deserialize, Serialize};
use std::fmt;

/// Simulation time, counted in TTIs.
pub type Tick = u64;

/// H-ARQ process identifier (acid).
pub type ProcessId = u8;

/// Codeword index inside one process.
pub type Codeword = u8;

/// Codewords carried by a single transmission (spatial multiplexing).
pub const MAX_CODEWORDS: usize = 2;

/// MAC-level node identifier, as handed out by the node directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MacNodeId(pub u16);

impl fmt::Display for MacNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Enb,
    Ue,
}

/// Link direction of a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Dl,
    Ul,
    D2d,
    D2dMulti,
}

impl Direction {
    /// Suffix used in statistic names (`macDelayDl`, `harqErrorRateD2D`, ...).
    pub fn label(&self) -> &'static str {
        match self {
            Direction::Dl => "Dl",
            Direction::Ul => "Ul",
            Direction::D2d => "D2D",
            Direction::D2dMulti => "D2DMulti",
        }
    }
}

/// Address of one H-ARQ unit: process plus codeword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitId {
    pub acid: ProcessId,
    pub codeword: Codeword,
}

impl UnitId {
    pub fn new(acid: ProcessId, codeword: Codeword) -> Self {
        Self { acid, codeword }
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "acid={} cw={}", self.acid, self.codeword)
    }
}
