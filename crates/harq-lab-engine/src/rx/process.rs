use harq_lab_abstract::{
    Codeword, DataFrame, HarqError, HarqFeedback, HarqResult, MAX_CODEWORDS, MacNodeId, MacPdu,
    ProcessId, Tick, UnitId, Violation,
};
use serde::Serialize;
use tracing::debug;

use crate::policy::FlowKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RxStatus {
    Empty,
    /// Received, decoder verdict not yet fed back.
    Evaluating,
    /// ACKed, waiting for extraction.
    Correct,
    /// NACKed, waiting for a retransmission.
    Corrupted,
}

#[derive(Debug, Clone)]
struct RxSlot {
    status: RxStatus,
    frame: Option<DataFrame>,
    rx_time: Tick,
    transmissions: u8,
}

impl RxSlot {
    fn empty() -> Self {
        Self {
            status: RxStatus::Empty,
            frame: None,
            rx_time: 0,
            transmissions: 0,
        }
    }
}

/// Receive process: one slot per codeword, fed by a single sender.
#[derive(Debug)]
pub struct HarqProcessRx {
    acid: ProcessId,
    sender: MacNodeId,
    kind: FlowKind,
    max_harq_rtx: u8,
    fb_evaluation_interval: Tick,
    slots: [RxSlot; MAX_CODEWORDS],
}

impl HarqProcessRx {
    pub(crate) fn new(
        acid: ProcessId,
        sender: MacNodeId,
        kind: FlowKind,
        max_harq_rtx: u8,
        fb_evaluation_interval: Tick,
    ) -> Self {
        Self {
            acid,
            sender,
            kind,
            max_harq_rtx,
            fb_evaluation_interval,
            slots: std::array::from_fn(|_| RxSlot::empty()),
        }
    }

    pub fn acid(&self) -> ProcessId {
        self.acid
    }

    fn slot(&self, cw: Codeword) -> HarqResult<&RxSlot> {
        self.slots
            .get(cw as usize)
            .ok_or(HarqError::UnknownUnit(UnitId::new(self.acid, cw)))
    }

    fn slot_mut(&mut self, cw: Codeword) -> HarqResult<&mut RxSlot> {
        let acid = self.acid;
        self.slots
            .get_mut(cw as usize)
            .ok_or(HarqError::UnknownUnit(UnitId::new(acid, cw)))
    }

    fn violation(&self, cw: Codeword, violation: Violation) -> HarqError {
        HarqError::violation(self.sender, UnitId::new(self.acid, cw), violation)
    }

    pub fn status(&self, cw: Codeword) -> HarqResult<RxStatus> {
        Ok(self.slot(cw)?.status)
    }

    pub fn transmissions(&self, cw: Codeword) -> HarqResult<u8> {
        Ok(self.slot(cw)?.transmissions)
    }

    /// Store a received attempt. New data needs an empty codeword; a
    /// retransmission needs a corrupted one.
    pub fn insert(&mut self, frame: DataFrame, now: Tick) -> HarqResult<()> {
        let cw = frame.codeword;
        let status = self.status(cw)?;
        if frame.new_data && status != RxStatus::Empty {
            return Err(self.violation(cw, Violation::NewDataBusy));
        }
        if !frame.new_data && status != RxStatus::Corrupted {
            return Err(self.violation(cw, Violation::RetransmissionNotCorrupted));
        }

        debug!(
            "H-ARQ RX acid={} cw={} from {}: pdu {} tx={} decoded={}",
            self.acid, cw, self.sender, frame.pdu.id, frame.tx_number, frame.decoded
        );

        let slot = self.slot_mut(cw)?;
        slot.transmissions = if frame.new_data {
            1
        } else {
            slot.transmissions.saturating_add(1)
        };
        // supersedes the corrupted copy, if any
        slot.frame = Some(frame);
        slot.rx_time = now;
        slot.status = RxStatus::Evaluating;
        Ok(())
    }

    pub fn is_evaluated(&self, cw: Codeword, now: Tick) -> bool {
        self.slot(cw).is_ok_and(|s| {
            s.status == RxStatus::Evaluating
                && now.saturating_sub(s.rx_time) >= self.fb_evaluation_interval
        })
    }

    /// Turn the decoder verdict into an ACK/NACK. Flows without a return
    /// channel update the state but produce no message.
    pub fn create_feedback(&mut self, cw: Codeword, now: Tick) -> HarqResult<Option<HarqFeedback>> {
        if !self.is_evaluated(cw, now) {
            return Err(self.violation(cw, Violation::NotEvaluated));
        }
        let acid = self.acid;
        let sender = self.sender;
        let max_transmissions = self.max_harq_rtx.saturating_add(1);
        let kind = self.kind;
        let slot = self.slot_mut(cw)?;

        let Some(frame) = slot.frame.as_ref() else {
            return Err(HarqError::violation(
                sender,
                UnitId::new(acid, cw),
                Violation::NotEvaluated,
            ));
        };
        let ack = frame.decoded;
        let feedback = HarqFeedback {
            acid,
            codeword: cw,
            ack,
            pdu_id: frame.pdu.id,
            source: frame.pdu.dest,
            dest: frame.pdu.source,
        };

        if ack {
            slot.status = RxStatus::Correct;
        } else if !kind.retains_corrupted() {
            debug!("H-ARQ RX acid={acid} cw={cw}: corrupted multicast pdu dropped");
            *slot = RxSlot::empty();
        } else if slot.transmissions >= max_transmissions {
            debug!(
                "H-ARQ RX acid={acid} cw={cw}: max number of tx reached, resetting codeword"
            );
            *slot = RxSlot::empty();
        } else {
            slot.status = RxStatus::Corrupted;
        }

        Ok(kind.sends_feedback().then_some(feedback))
    }

    pub fn is_correct(&self, cw: Codeword) -> bool {
        self.slot(cw).is_ok_and(|s| s.status == RxStatus::Correct)
    }

    /// Hand a decoded PDU to the upper layer.
    pub fn extract(&mut self, cw: Codeword) -> HarqResult<MacPdu> {
        if !self.is_correct(cw) {
            return Err(self.violation(cw, Violation::ExtractNotCorrect));
        }
        let slot = self.slot_mut(cw)?;
        let frame = slot.frame.take();
        *slot = RxSlot::empty();
        match frame {
            Some(frame) => Ok(frame.pdu),
            None => Err(self.violation(cw, Violation::ExtractNotCorrect)),
        }
    }

    /// Clear every CORRUPTED codeword. Returns how many were cleared.
    pub fn purge_corrupted(&mut self) -> usize {
        let mut purged = 0;
        for slot in &mut self.slots {
            if slot.status == RxStatus::Corrupted {
                *slot = RxSlot::empty();
                purged += 1;
            }
        }
        purged
    }

    pub fn reset(&mut self) {
        self.slots = std::array::from_fn(|_| RxSlot::empty());
    }

    /// (codeword, status) pairs.
    pub fn process_status(&self) -> Vec<(Codeword, RxStatus)> {
        self.slots
            .iter()
            .enumerate()
            .map(|(cw, s)| (cw as Codeword, s.status))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| s.status == RxStatus::Empty)
    }

    pub fn byte_len(&self, cw: Codeword) -> usize {
        self.slot(cw)
            .ok()
            .and_then(|s| s.frame.as_ref())
            .map_or(0, |f| f.pdu.byte_len())
    }

    pub fn buffered_pdus(&self) -> usize {
        self.slots.iter().filter(|s| s.frame.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{ENB, GROUP, UE_A, pdu};
    use harq_lab_abstract::Direction;

    fn frame(id: u64, cw: Codeword, new_data: bool, decoded: bool) -> DataFrame {
        DataFrame {
            pdu: pdu(id, ENB, UE_A, Direction::Dl, 0, 64),
            acid: 0,
            codeword: cw,
            new_data,
            tx_number: if new_data { 1 } else { 2 },
            decoded,
        }
    }

    fn process(kind: FlowKind) -> HarqProcessRx {
        HarqProcessRx::new(0, ENB, kind, 3, 3)
    }

    #[test]
    fn correct_pdu_is_acked_and_extracted() {
        let mut p = process(FlowKind::Cellular);
        p.insert(frame(1, 0, true, true), 10).unwrap();
        assert_eq!(p.status(0), Ok(RxStatus::Evaluating));
        assert!(!p.is_evaluated(0, 12));
        assert!(p.is_evaluated(0, 13));

        let fb = p.create_feedback(0, 13).unwrap().unwrap();
        assert!(fb.ack);
        assert_eq!(fb.pdu_id, 1);
        assert_eq!((fb.source, fb.dest), (UE_A, ENB));
        assert_eq!(p.status(0), Ok(RxStatus::Correct));

        let pdu = p.extract(0).unwrap();
        assert_eq!(pdu.id, 1);
        assert_eq!(p.status(0), Ok(RxStatus::Empty));
        assert!(p.is_empty());
    }

    #[test]
    fn new_data_into_evaluating_codeword_is_rejected() {
        let mut p = process(FlowKind::Cellular);
        p.insert(frame(1, 1, true, true), 0).unwrap();
        let err = p.insert(frame(2, 1, true, true), 1).unwrap_err();
        assert_eq!(
            err,
            HarqError::violation(ENB, UnitId::new(0, 1), Violation::NewDataBusy)
        );
        assert_eq!(p.byte_len(1), 64);
    }

    #[test]
    fn early_feedback_is_a_violation() {
        let mut p = process(FlowKind::Cellular);
        p.insert(frame(1, 0, true, true), 5).unwrap();
        assert!(p.create_feedback(0, 6).unwrap_err().is_protocol_violation());
        assert!(p.create_feedback(1, 9).is_err());
        assert!(p.extract(0).is_err());
    }

    #[test]
    fn retransmission_replaces_corrupted_copy() {
        let mut p = process(FlowKind::Cellular);
        assert!(p.insert(frame(1, 0, false, true), 0).is_err());

        p.insert(frame(1, 0, true, false), 0).unwrap();
        let fb = p.create_feedback(0, 3).unwrap().unwrap();
        assert!(!fb.ack);
        assert_eq!(p.status(0), Ok(RxStatus::Corrupted));

        p.insert(frame(1, 0, false, true), 4).unwrap();
        assert_eq!(p.transmissions(0), Ok(2));
        assert_eq!(p.buffered_pdus(), 1);
        assert!(p.create_feedback(0, 7).unwrap().unwrap().ack);
    }

    #[test]
    fn exhausted_budget_resets_codeword() {
        let mut p = process(FlowKind::Cellular);
        let mut now = 0;
        p.insert(frame(1, 0, true, false), now).unwrap();
        for attempt in 1..=4 {
            now += 3;
            p.create_feedback(0, now).unwrap();
            if attempt < 4 {
                assert_eq!(p.status(0), Ok(RxStatus::Corrupted));
                p.insert(frame(1, 0, false, false), now).unwrap();
            }
        }
        assert_eq!(p.status(0), Ok(RxStatus::Empty));
        assert_eq!(p.transmissions(0), Ok(0));
        p.insert(frame(2, 0, true, true), now).unwrap();
    }

    #[test]
    fn multicast_nack_resets_without_feedback() {
        let mut p = HarqProcessRx::new(0, GROUP, FlowKind::D2dMulticast, 3, 3);
        p.insert(frame(1, 0, true, false), 0).unwrap();
        assert_eq!(p.create_feedback(0, 3), Ok(None));
        assert_eq!(p.status(0), Ok(RxStatus::Empty));

        p.insert(frame(2, 0, true, true), 4).unwrap();
        assert_eq!(p.create_feedback(0, 7), Ok(None));
        assert_eq!(p.status(0), Ok(RxStatus::Correct));
    }

    #[test]
    fn purge_is_idempotent() {
        let mut p = process(FlowKind::Cellular);
        assert_eq!(p.purge_corrupted(), 0);
        assert!(p.is_empty());

        p.insert(frame(1, 0, true, false), 0).unwrap();
        p.insert(frame(2, 1, true, true), 0).unwrap();
        p.create_feedback(0, 3).unwrap();
        assert_eq!(p.purge_corrupted(), 1);
        assert_eq!(p.purge_corrupted(), 0);
        assert_eq!(
            p.process_status(),
            vec![(0, RxStatus::Empty), (1, RxStatus::Evaluating)]
        );
    }
}
