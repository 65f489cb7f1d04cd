use bytes::Bytes;
use serde::Serialize;

use crate::ids::{Codeword, Direction, MacNodeId, ProcessId, Tick, UnitId};

/// Unique MAC PDU identifier. Stays the same across retransmissions.
pub type PduId = u64;

/// The data unit carried by one H-ARQ transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacPdu {
    pub id: PduId,
    pub source: MacNodeId,
    /// Receiving node, or the multicast group for `Direction::D2dMulti`.
    pub dest: MacNodeId,
    pub direction: Direction,
    /// Tick at which the PDU was built; delay samples are measured from here.
    pub created_at: Tick,
    pub payload: Bytes,
}

impl MacPdu {
    pub fn new(
        id: PduId,
        source: MacNodeId,
        dest: MacNodeId,
        direction: Direction,
        created_at: Tick,
        payload: Bytes,
    ) -> Self {
        Self {
            id,
            source,
            dest,
            direction,
            created_at,
            payload,
        }
    }

    pub fn byte_len(&self) -> usize {
        self.payload.len()
    }
}

/// One transmission attempt on the air.
#[derive(Debug, Clone)]
pub struct DataFrame {
    pub pdu: MacPdu,
    pub acid: ProcessId,
    pub codeword: Codeword,
    /// True on the first attempt for the contained PDU.
    pub new_data: bool,
    /// Attempt number, starting at 1.
    pub tx_number: u8,
    /// Decoder verdict injected by the channel model.
    pub decoded: bool,
}

impl DataFrame {
    pub fn unit(&self) -> UnitId {
        UnitId::new(self.acid, self.codeword)
    }

    pub fn source(&self) -> MacNodeId {
        self.pdu.source
    }

    pub fn dest(&self) -> MacNodeId {
        self.pdu.dest
    }

    pub fn direction(&self) -> Direction {
        self.pdu.direction
    }
}

/// H-ARQ ACK/NACK for one codeword of one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HarqFeedback {
    pub acid: ProcessId,
    pub codeword: Codeword,
    pub ack: bool,
    /// PDU the feedback refers to; used to discard stale feedback.
    pub pdu_id: PduId,
    pub source: MacNodeId,
    pub dest: MacNodeId,
}

impl HarqFeedback {
    pub fn unit(&self) -> UnitId {
        UnitId::new(self.acid, self.codeword)
    }
}

/// Copy of a D2D feedback sent to the serving eNB so it can track the
/// receiver's process status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeedbackMirror {
    pub feedback: HarqFeedback,
    pub d2d_tx_peer: MacNodeId,
    pub d2d_rx_peer: MacNodeId,
    pub pdu_len: usize,
    /// The eNB this copy is addressed to.
    pub cell: MacNodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FrameType {
    Data,
    HarqFeedback,
    HarqFeedbackMirror,
}

/// Frame handed up by the physical layer.
#[derive(Debug, Clone)]
pub enum LowerFrame {
    Data(DataFrame),
    Feedback(HarqFeedback),
    FeedbackMirror(FeedbackMirror),
}

impl LowerFrame {
    pub fn frame_type(&self) -> FrameType {
        match self {
            LowerFrame::Data(_) => FrameType::Data,
            LowerFrame::Feedback(_) => FrameType::HarqFeedback,
            LowerFrame::FeedbackMirror(_) => FrameType::HarqFeedbackMirror,
        }
    }

    pub fn source(&self) -> MacNodeId {
        match self {
            LowerFrame::Data(frame) => frame.source(),
            LowerFrame::Feedback(fb) => fb.source,
            LowerFrame::FeedbackMirror(mirror) => mirror.d2d_rx_peer,
        }
    }

    pub fn dest(&self) -> MacNodeId {
        match self {
            LowerFrame::Data(frame) => frame.dest(),
            LowerFrame::Feedback(fb) => fb.dest,
            LowerFrame::FeedbackMirror(mirror) => mirror.cell,
        }
    }
}
