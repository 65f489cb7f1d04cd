pub mod channel;
pub mod engine;
pub mod metrics;
pub mod scenario_runner;
pub mod sched;
pub mod trace;

pub use channel::{Channel, ChannelOutcome};
pub use engine::{DeliveredPdu, LinkEventSummary, Simulator};
pub use metrics::{MetricPoint, MetricStore, MetricSummary};
pub use sched::{Grant, GrantKind, RoundRobinScheduler, Scheduler};
pub use trace::SimulationReport;
