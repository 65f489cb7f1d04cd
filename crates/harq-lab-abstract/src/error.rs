use thiserror::Error;

use crate::ids::{MacNodeId, UnitId};

/// Kinds of H-ARQ protocol violations. All of them point at a programming
/// or configuration defect, never at a link condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("insert into a busy tx unit")]
    InsertBusy,
    #[error("selection of a tx unit that is not buffered")]
    SelectNotBuffered,
    #[error("extraction from a tx unit that is not selected")]
    ExtractNotSelected,
    #[error("feedback for a tx unit that is not waiting for it")]
    FeedbackNotWaiting,
    #[error("self NACK on a unit still waiting for a real feedback")]
    SelfNackWhileWaiting,
    #[error("self NACK on an empty tx unit")]
    SelfNackEmpty,
    #[error("drop of a pdu that is not buffered")]
    DropNotBuffered,
    #[error("new data arriving in a busy rx codeword")]
    NewDataBusy,
    #[error("retransmission into an rx codeword that is not corrupted")]
    RetransmissionNotCorrupted,
    #[error("feedback requested before the evaluation interval elapsed")]
    NotEvaluated,
    #[error("extraction from an rx codeword that is not correct")]
    ExtractNotCorrect,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HarqError {
    #[error("H-ARQ protocol violation at {unit} (peer {peer}): {violation}")]
    ProtocolViolation {
        peer: MacNodeId,
        unit: UnitId,
        violation: Violation,
    },
    #[error("no H-ARQ unit at {0}")]
    UnknownUnit(UnitId),
    #[error("no H-ARQ buffer for peer {0}")]
    UnknownPeer(MacNodeId),
    #[error("node {0} is not registered in the directory")]
    UnregisteredNode(MacNodeId),
}

impl HarqError {
    pub fn violation(peer: MacNodeId, unit: UnitId, violation: Violation) -> Self {
        HarqError::ProtocolViolation {
            peer,
            unit,
            violation,
        }
    }

    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, HarqError::ProtocolViolation { .. })
    }
}

pub type HarqResult<T> = Result<T, HarqError>;
