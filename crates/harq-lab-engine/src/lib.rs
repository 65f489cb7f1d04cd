//! H-ARQ retransmission engine: per-peer transmit and receive buffers, the
//! D2D multicast/mirror specialisation and the per-node container that
//! demultiplexes frames coming from the physical layer.

pub mod entity;
pub mod mirror;
pub mod policy;
pub mod rx;
pub mod tx;

#[cfg(test)]
pub(crate) mod testutil;

pub use entity::{HarqEntity, TickOutput};
pub use mirror::{D2dMirrorTable, HarqBufferMirror, MirrorSlot};
pub use policy::FlowKind;
pub use rx::{HarqBufferRx, HarqProcessRx, RxBufferStatus, RxStatus, RxTickOutput, RxUnitStatus};
pub use tx::{FeedbackOutcome, HarqBufferTx, HarqProcessTx, HarqUnitTx, ReadyUnits, TxStatus};
