use harq_lab_abstract::{
    DataFrame, Direction, HarqError, HarqResult, MacNodeId, MacPdu, Metric, MetricKind, PduId,
    StatSample, StatsSink, Tick, UnitId, Violation,
};
use serde::Serialize;
use tracing::debug;

use crate::policy::StatsTags;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TxStatus {
    /// No PDU in the unit.
    Empty,
    /// PDU chosen for transmission in the current tick.
    Selected,
    /// PDU on the air, feedback pending.
    Waiting,
    /// PDU NACKed and ready for retransmission.
    Buffered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackOutcome {
    /// ACK received, unit released.
    Released,
    /// NACK within budget, PDU kept for retransmission.
    Retransmit,
    /// Budget exhausted (or self NACK), PDU dropped.
    Discarded,
}

impl FeedbackOutcome {
    pub fn resets_unit(&self) -> bool {
        !matches!(self, FeedbackOutcome::Retransmit)
    }
}

/// One codeword of one transmit process.
#[derive(Debug)]
pub struct HarqUnitTx {
    unit: UnitId,
    peer: MacNodeId,
    direction: Direction,
    status: TxStatus,
    pdu: Option<MacPdu>,
    /// Attempts made for the current PDU (1-based once extracted).
    transmissions: u8,
    tx_time: Option<Tick>,
    max_harq_rtx: u8,
    tags: StatsTags,
}

impl HarqUnitTx {
    pub(crate) fn new(
        unit: UnitId,
        peer: MacNodeId,
        direction: Direction,
        max_harq_rtx: u8,
        tags: StatsTags,
    ) -> Self {
        Self {
            unit,
            peer,
            direction,
            status: TxStatus::Empty,
            pdu: None,
            transmissions: 0,
            tx_time: None,
            max_harq_rtx,
            tags,
        }
    }

    pub fn id(&self) -> UnitId {
        self.unit
    }

    pub fn status(&self) -> TxStatus {
        self.status
    }

    pub fn is_empty(&self) -> bool {
        self.status == TxStatus::Empty
    }

    /// NACKed and eligible for retransmission.
    pub fn is_ready(&self) -> bool {
        self.status == TxStatus::Buffered
    }

    pub fn transmissions(&self) -> u8 {
        self.transmissions
    }

    pub fn tx_time(&self) -> Option<Tick> {
        self.tx_time
    }

    pub fn pdu(&self) -> Option<&MacPdu> {
        self.pdu.as_ref()
    }

    pub fn pdu_id(&self) -> Option<PduId> {
        self.pdu.as_ref().map(|p| p.id)
    }

    pub fn pdu_len(&self) -> usize {
        self.pdu.as_ref().map_or(0, MacPdu::byte_len)
    }

    fn max_transmissions(&self) -> u8 {
        self.max_harq_rtx.saturating_add(1)
    }

    fn violation(&self, violation: Violation) -> HarqError {
        HarqError::violation(self.peer, self.unit, violation)
    }

    /// Store a new PDU; the unit goes straight to SELECTED.
    pub fn insert(&mut self, pdu: MacPdu) -> HarqResult<()> {
        if self.status != TxStatus::Empty {
            return Err(self.violation(Violation::InsertBusy));
        }
        debug!(
            "H-ARQ TX {} peer {}: inserted pdu {} ({} bytes)",
            self.unit,
            self.peer,
            pdu.id,
            pdu.byte_len()
        );
        self.pdu = Some(pdu);
        self.transmissions = 0;
        self.status = TxStatus::Selected;
        Ok(())
    }

    pub fn mark_selected(&mut self) -> HarqResult<()> {
        if self.status != TxStatus::Buffered {
            return Err(self.violation(Violation::SelectNotBuffered));
        }
        debug!(
            "H-ARQ TX {} peer {}: selected for retransmission",
            self.unit, self.peer
        );
        self.status = TxStatus::Selected;
        Ok(())
    }

    /// Hand a copy of the PDU to the link layer. The unit keeps the PDU
    /// until feedback releases it.
    pub fn extract(&mut self, now: Tick) -> HarqResult<DataFrame> {
        if self.status != TxStatus::Selected {
            return Err(self.violation(Violation::ExtractNotSelected));
        }
        let pdu = match &self.pdu {
            Some(pdu) => pdu.clone(),
            None => return Err(self.violation(Violation::ExtractNotSelected)),
        };

        self.transmissions = self.transmissions.saturating_add(1);
        self.tx_time = Some(now);
        self.status = TxStatus::Waiting;

        let new_data = self.transmissions == 1;
        debug!(
            "H-ARQ TX {} peer {}: extracted pdu {} tx={} ndi={}",
            self.unit, self.peer, pdu.id, self.transmissions, new_data
        );
        Ok(DataFrame {
            pdu,
            acid: self.unit.acid,
            codeword: self.unit.codeword,
            new_data,
            tx_number: self.transmissions,
            decoded: true,
        })
    }

    pub fn on_feedback(
        &mut self,
        ack: bool,
        stats: &mut dyn StatsSink,
    ) -> HarqResult<FeedbackOutcome> {
        if self.status != TxStatus::Waiting {
            return Err(self.violation(Violation::FeedbackNotWaiting));
        }

        let ntx = self.transmissions;
        let outcome = if ack {
            FeedbackOutcome::Released
        } else if ntx >= self.max_transmissions() {
            debug!(
                "H-ARQ TX {} peer {}: pdu {:?} discarded (max retransmissions {} reached)",
                self.unit,
                self.peer,
                self.pdu_id(),
                self.max_harq_rtx
            );
            FeedbackOutcome::Discarded
        } else {
            FeedbackOutcome::Retransmit
        };

        self.emit_feedback_stats(ntx, ack, outcome, stats);

        if outcome.resets_unit() {
            self.reset();
        } else {
            debug!(
                "H-ARQ TX {} peer {}: pdu {:?} set for retransmission",
                self.unit,
                self.peer,
                self.pdu_id()
            );
            self.status = TxStatus::Buffered;
        }
        Ok(outcome)
    }

    /// Count a failed attempt locally and drop the PDU, e.g. when a D2D
    /// mode switch interrupts the process. Not allowed while WAITING,
    /// because a real feedback may still arrive.
    pub fn self_nack(
        &mut self,
        now: Tick,
        stats: &mut dyn StatsSink,
    ) -> HarqResult<FeedbackOutcome> {
        match self.status {
            TxStatus::Waiting => Err(self.violation(Violation::SelfNackWhileWaiting)),
            TxStatus::Empty => Err(self.violation(Violation::SelfNackEmpty)),
            TxStatus::Selected | TxStatus::Buffered => {
                self.transmissions = self.transmissions.saturating_add(1);
                self.tx_time = Some(now);
                let ntx = self.transmissions;
                self.emit_feedback_stats(ntx, false, FeedbackOutcome::Discarded, stats);
                self.reset();
                Ok(FeedbackOutcome::Discarded)
            }
        }
    }

    /// Drop a BUFFERED PDU without further transmissions or statistics.
    pub fn drop_pdu(&mut self) -> HarqResult<()> {
        if self.status != TxStatus::Buffered {
            return Err(self.violation(Violation::DropNotBuffered));
        }
        self.reset();
        Ok(())
    }

    /// Release whatever the unit holds, regardless of state. Used on peer
    /// departure and for flows without a return channel.
    pub fn force_release(&mut self) -> Option<MacPdu> {
        let pdu = self.pdu.take();
        if let Some(pdu) = &pdu {
            debug!(
                "H-ARQ TX {} peer {}: force released pdu {} in state {:?}",
                self.unit, self.peer, pdu.id, self.status
            );
        }
        self.reset();
        pdu
    }

    fn reset(&mut self) {
        self.pdu = None;
        self.transmissions = 0;
        self.tx_time = None;
        self.status = TxStatus::Empty;
    }

    fn emit_feedback_stats(
        &self,
        ntx: u8,
        ack: bool,
        outcome: FeedbackOutcome,
        stats: &mut dyn StatsSink,
    ) {
        let sample = if ack { 0.0 } else { 1.0 };
        let dir = self.direction;
        stats.record(StatSample {
            metric: Metric::new(MetricKind::HarqErrorRateAttempt(ntx), dir),
            node: self.tags.ue,
            value: sample,
        });
        stats.record(StatSample {
            metric: Metric::new(MetricKind::HarqErrorRate, dir),
            node: self.tags.ue,
            value: sample,
        });
        if outcome.resets_unit() {
            stats.record(StatSample {
                metric: Metric::new(MetricKind::MacPacketLoss, dir),
                node: self.tags.ue,
                value: sample,
            });
            stats.record(StatSample {
                metric: Metric::new(MetricKind::MacCellPacketLoss, dir),
                node: self.tags.cell,
                value: sample,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{ENB, UE_A, pdu};
    use harq_lab_abstract::StatSample;

    fn unit(max_harq_rtx: u8) -> HarqUnitTx {
        HarqUnitTx::new(
            UnitId::new(0, 0),
            UE_A,
            Direction::Dl,
            max_harq_rtx,
            StatsTags { ue: UE_A, cell: ENB },
        )
    }

    fn discards(stats: &[StatSample]) -> usize {
        stats
            .iter()
            .filter(|s| s.metric.is_packet_loss() && s.value == 1.0)
            .count()
    }

    #[test]
    fn retry_after_nack_clears_new_data_flag() {
        let mut stats = Vec::new();
        let mut u = unit(3);
        u.insert(pdu(7, ENB, UE_A, Direction::Dl, 0, 100)).unwrap();
        assert_eq!(u.status(), TxStatus::Selected);

        let first = u.extract(1).unwrap();
        assert_eq!(first.tx_number, 1);
        assert!(first.new_data);
        assert_eq!(first.pdu.byte_len(), 100);

        assert_eq!(u.on_feedback(false, &mut stats), Ok(FeedbackOutcome::Retransmit));
        assert_eq!(u.status(), TxStatus::Buffered);
        assert_eq!(u.transmissions(), 1);
        assert_eq!(u.pdu_id(), Some(7));

        u.mark_selected().unwrap();
        let second = u.extract(9).unwrap();
        assert_eq!(second.tx_number, 2);
        assert!(!second.new_data);
        assert_eq!(u.tx_time(), Some(9));
    }

    #[test]
    fn ack_returns_unit_to_empty() {
        let mut stats = Vec::new();
        let mut u = unit(3);
        u.insert(pdu(1, ENB, UE_A, Direction::Dl, 0, 10)).unwrap();
        u.extract(0).unwrap();
        assert_eq!(u.on_feedback(true, &mut stats), Ok(FeedbackOutcome::Released));
        assert_eq!(u.status(), TxStatus::Empty);
        assert_eq!(u.transmissions(), 0);
        assert!(u.pdu().is_none());
        assert_eq!(discards(&stats), 0);
        // zero-loss sample on release
        assert!(
            stats
                .iter()
                .any(|s| s.metric.is_packet_loss() && s.value == 0.0 && s.node == UE_A)
        );
    }

    #[test]
    fn budget_of_three_allows_four_attempts() {
        let mut stats = Vec::new();
        let mut u = unit(3);
        u.insert(pdu(1, ENB, UE_A, Direction::Dl, 0, 10)).unwrap();

        let mut attempts = 0;
        loop {
            let frame = u.extract(attempts).unwrap();
            attempts += 1;
            assert_eq!(frame.new_data, attempts == 1);
            match u.on_feedback(false, &mut stats).unwrap() {
                FeedbackOutcome::Retransmit => {
                    assert_eq!(discards(&stats), 0);
                    u.mark_selected().unwrap();
                }
                FeedbackOutcome::Discarded => break,
                FeedbackOutcome::Released => unreachable!(),
            }
        }
        assert_eq!(attempts, 4);
        assert_eq!(discards(&stats), 1);
        assert_eq!(u.status(), TxStatus::Empty);
        assert_eq!(u.transmissions(), 0);

        let cell_losses = stats
            .iter()
            .filter(|s| s.metric.kind == MetricKind::MacCellPacketLoss)
            .count();
        assert_eq!(cell_losses, 1);
        let fourth = stats
            .iter()
            .filter(|s| s.metric.kind == MetricKind::HarqErrorRateAttempt(4))
            .count();
        assert_eq!(fourth, 1);
    }

    #[test]
    fn feedback_without_transmission_is_a_violation() {
        let mut stats = Vec::new();
        let mut u = unit(3);
        let err = u.on_feedback(true, &mut stats).unwrap_err();
        assert_eq!(
            err,
            HarqError::violation(UE_A, UnitId::new(0, 0), Violation::FeedbackNotWaiting)
        );

        u.insert(pdu(1, ENB, UE_A, Direction::Dl, 0, 10)).unwrap();
        // still SELECTED, not on the air yet
        assert!(u.on_feedback(false, &mut stats).unwrap_err().is_protocol_violation());
        assert!(stats.is_empty());
    }

    #[test]
    fn busy_insert_and_bad_selection_are_rejected() {
        let mut u = unit(3);
        assert!(u.mark_selected().is_err());
        u.insert(pdu(1, ENB, UE_A, Direction::Dl, 0, 10)).unwrap();
        assert!(u.insert(pdu(2, ENB, UE_A, Direction::Dl, 0, 10)).is_err());
        assert!(u.mark_selected().is_err());
        u.extract(0).unwrap();
        assert!(u.mark_selected().is_err());
        assert!(u.extract(1).is_err());
        assert_eq!(u.pdu_id(), Some(1));
    }

    #[test]
    fn empty_unit_never_goes_straight_to_waiting() {
        let mut u = unit(3);
        let err = u.extract(0).unwrap_err();
        assert_eq!(
            err,
            HarqError::violation(UE_A, UnitId::new(0, 0), Violation::ExtractNotSelected)
        );
        assert_eq!(u.status(), TxStatus::Empty);
        assert_eq!(u.transmissions(), 0);
        assert_eq!(u.tx_time(), None);
    }

    #[test]
    fn self_nack_refuses_waiting_units() {
        let mut stats = Vec::new();
        let mut u = unit(3);
        assert!(u.self_nack(0, &mut stats).is_err());

        u.insert(pdu(1, ENB, UE_A, Direction::Dl, 0, 10)).unwrap();
        u.extract(0).unwrap();
        let err = u.self_nack(1, &mut stats).unwrap_err();
        assert_eq!(
            err,
            HarqError::violation(UE_A, UnitId::new(0, 0), Violation::SelfNackWhileWaiting)
        );

        u.on_feedback(false, &mut stats).unwrap();
        assert_eq!(u.self_nack(2, &mut stats), Ok(FeedbackOutcome::Discarded));
        assert_eq!(u.status(), TxStatus::Empty);
        assert_eq!(discards(&stats), 1);
    }

    #[test]
    fn force_release_works_from_any_state() {
        let mut u = unit(3);
        assert!(u.force_release().is_none());
        u.insert(pdu(5, ENB, UE_A, Direction::Dl, 0, 10)).unwrap();
        u.extract(0).unwrap();
        let released = u.force_release().unwrap();
        assert_eq!(released.id, 5);
        assert_eq!(u.status(), TxStatus::Empty);
        assert_eq!(u.transmissions(), 0);
    }

    #[test]
    fn drop_requires_buffered_pdu() {
        let mut stats = Vec::new();
        let mut u = unit(1);
        u.insert(pdu(5, ENB, UE_A, Direction::Dl, 0, 10)).unwrap();
        assert!(u.drop_pdu().is_err());
        u.extract(0).unwrap();
        u.on_feedback(false, &mut stats).unwrap();
        u.drop_pdu().unwrap();
        assert!(u.is_empty());
    }
}
