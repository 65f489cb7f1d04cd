mod buffer;
mod process;

pub use buffer::{HarqBufferRx, RxBufferStatus, RxTickOutput, RxUnitStatus};
pub use process::{HarqProcessRx, RxStatus};
