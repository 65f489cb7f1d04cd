use std::collections::BTreeMap;

use harq_lab_abstract::{
    Codeword, FeedbackMirror, MAX_CODEWORDS, MacNodeId, ProcessId, UnitId,
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::rx::{RxBufferStatus, RxStatus};

/// What the eNB believes about one codeword of a D2D receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MirrorSlot {
    pub status: RxStatus,
    pub pdu_len: usize,
    pub transmissions: u8,
}

impl MirrorSlot {
    const EMPTY: MirrorSlot = MirrorSlot {
        status: RxStatus::Empty,
        pdu_len: 0,
        transmissions: 0,
    };
}

/// Status-only shadow of a D2D receive buffer. Holds no data.
#[derive(Debug, Clone)]
pub struct HarqBufferMirror {
    max_harq_rtx: u8,
    slots: Vec<[MirrorSlot; MAX_CODEWORDS]>,
}

impl HarqBufferMirror {
    pub fn new(processes: u8, max_harq_rtx: u8) -> Self {
        Self {
            max_harq_rtx,
            slots: vec![[MirrorSlot::EMPTY; MAX_CODEWORDS]; processes as usize],
        }
    }

    /// Rebuild from a receiver's exported status.
    pub fn from_snapshot(snapshot: &RxBufferStatus, processes: u8, max_harq_rtx: u8) -> Self {
        let mut mirror = Self::new(processes, max_harq_rtx);
        for unit in snapshot {
            if let Some(slot) = mirror.slot_mut(unit.unit) {
                *slot = MirrorSlot {
                    status: unit.status,
                    pdu_len: unit.pdu_len,
                    transmissions: unit.transmissions,
                };
            }
        }
        mirror
    }

    fn slot_mut(&mut self, unit: UnitId) -> Option<&mut MirrorSlot> {
        self.slots
            .get_mut(unit.acid as usize)
            .and_then(|p| p.get_mut(unit.codeword as usize))
    }

    pub fn status(&self, acid: ProcessId, cw: Codeword) -> Option<MirrorSlot> {
        self.slots
            .get(acid as usize)
            .and_then(|p| p.get(cw as usize))
            .copied()
    }

    /// The eNB granted an attempt on this unit.
    pub fn note_transmission(&mut self, unit: UnitId, pdu_len: usize, new_data: bool) {
        let Some(slot) = self.slot_mut(unit) else {
            warn!("H-ARQ MIRROR: transmission on unknown unit {unit}");
            return;
        };
        slot.transmissions = if new_data {
            1
        } else {
            slot.transmissions.saturating_add(1)
        };
        slot.pdu_len = pdu_len;
        slot.status = RxStatus::Evaluating;
    }

    /// ACK empties the slot; NACK marks it corrupted until the budget runs out.
    pub fn apply_feedback(&mut self, unit: UnitId, ack: bool, pdu_len: usize) {
        let max_transmissions = self.max_harq_rtx.saturating_add(1);
        let Some(slot) = self.slot_mut(unit) else {
            warn!("H-ARQ MIRROR: feedback for unknown unit {unit}");
            return;
        };
        if ack {
            *slot = MirrorSlot::EMPTY;
        } else if slot.transmissions >= max_transmissions {
            *slot = MirrorSlot::EMPTY;
        } else {
            slot.status = RxStatus::Corrupted;
            slot.pdu_len = pdu_len;
        }
    }

    /// Units the receiver expects a retransmission on.
    pub fn corrupted_units(&self) -> Vec<UnitId> {
        let mut units = Vec::new();
        for (acid, process) in self.slots.iter().enumerate() {
            for (cw, slot) in process.iter().enumerate() {
                if slot.status == RxStatus::Corrupted {
                    units.push(UnitId::new(acid as ProcessId, cw as Codeword));
                }
            }
        }
        units
    }
}

/// eNB-side mirrors, one per (D2D sender, D2D receiver) pair.
#[derive(Debug, Default)]
pub struct D2dMirrorTable {
    processes: u8,
    max_harq_rtx: u8,
    mirrors: BTreeMap<(MacNodeId, MacNodeId), HarqBufferMirror>,
}

impl D2dMirrorTable {
    pub fn new(processes: u8, max_harq_rtx: u8) -> Self {
        Self {
            processes,
            max_harq_rtx,
            mirrors: BTreeMap::new(),
        }
    }

    fn entry(&mut self, sender: MacNodeId, receiver: MacNodeId) -> &mut HarqBufferMirror {
        let (processes, max_harq_rtx) = (self.processes, self.max_harq_rtx);
        self.mirrors
            .entry((sender, receiver))
            .or_insert_with(|| HarqBufferMirror::new(processes, max_harq_rtx))
    }

    pub fn apply_feedback(&mut self, mirror: &FeedbackMirror) {
        let fb = &mirror.feedback;
        debug!(
            "H-ARQ MIRROR: {} -> {} acid={} cw={}: {}",
            mirror.d2d_tx_peer,
            mirror.d2d_rx_peer,
            fb.acid,
            fb.codeword,
            if fb.ack { "ACK" } else { "NACK" }
        );
        self.entry(mirror.d2d_tx_peer, mirror.d2d_rx_peer)
            .apply_feedback(fb.unit(), fb.ack, mirror.pdu_len);
    }

    pub fn note_transmission(
        &mut self,
        sender: MacNodeId,
        receiver: MacNodeId,
        unit: UnitId,
        pdu_len: usize,
        new_data: bool,
    ) {
        self.entry(sender, receiver)
            .note_transmission(unit, pdu_len, new_data);
    }

    /// Replace the mirror with a fresh snapshot of the receiver.
    pub fn store_snapshot(&mut self, sender: MacNodeId, receiver: MacNodeId, snapshot: &RxBufferStatus) {
        let mirror = HarqBufferMirror::from_snapshot(snapshot, self.processes, self.max_harq_rtx);
        self.mirrors.insert((sender, receiver), mirror);
    }

    pub fn mirror(&self, sender: MacNodeId, receiver: MacNodeId) -> Option<&HarqBufferMirror> {
        self.mirrors.get(&(sender, receiver))
    }

    /// Forget every mirror involving `node`.
    pub fn remove_peer(&mut self, node: MacNodeId) -> usize {
        let before = self.mirrors.len();
        self.mirrors.retain(|(tx, rx), _| *tx != node && *rx != node);
        before - self.mirrors.len()
    }

    pub fn remove_pair(&mut self, sender: MacNodeId, receiver: MacNodeId) -> bool {
        self.mirrors.remove(&(sender, receiver)).is_some()
    }

    pub fn corrupted_units(&self, sender: MacNodeId, receiver: MacNodeId) -> Vec<UnitId> {
        self.mirror(sender, receiver)
            .map(HarqBufferMirror::corrupted_units)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.mirrors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mirrors.is_empty()
    }
}
