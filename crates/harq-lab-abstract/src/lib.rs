pub mod config;
pub mod error;
pub mod ids;
pub mod interface;
pub mod packet;
pub mod scenario;

pub use config::{HarqConfig, SimConfig};
pub use error::{HarqError, HarqResult, Violation};
pub use ids::{Codeword, Direction, MAX_CODEWORDS, MacNodeId, NodeKind, ProcessId, Tick, UnitId};
pub use interface::{Metric, MetricKind, NodeDirectory, StatSample, StaticDirectory, StatsSink};
pub use packet::{DataFrame, FeedbackMirror, FrameType, HarqFeedback, LowerFrame, MacPdu, PduId};

pub use scenario::{GroupSpec, NodeSpec, SimConfigOverride, TestAction, TestAssertion, TestScenario};
