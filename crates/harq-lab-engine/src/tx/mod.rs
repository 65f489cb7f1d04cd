mod buffer;
mod process;
mod unit;

pub use buffer::{HarqBufferTx, ReadyUnits};
pub use process::HarqProcessTx;
pub use unit::{FeedbackOutcome, HarqUnitTx, TxStatus};
