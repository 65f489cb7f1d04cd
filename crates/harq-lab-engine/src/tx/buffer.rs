use harq_lab_abstract::{
    Codeword, DataFrame, Direction, HarqConfig, HarqError, HarqFeedback, HarqResult,
    MAX_CODEWORDS, MacNodeId, MacPdu, NodeDirectory, ProcessId, StatsSink, Tick, UnitId,
};
use tracing::{debug, warn};

use crate::policy::{FlowKind, StatsTags, resolve_direction};
use crate::tx::process::HarqProcessTx;
use crate::tx::unit::{FeedbackOutcome, HarqUnitTx, TxStatus};

/// Units the scheduler may grant this tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadyUnits {
    /// NACKed units, retransmission candidates.
    pub retransmit: Vec<UnitId>,
    /// Free units, candidates for new data.
    pub empty: Vec<UnitId>,
}

/// Transmit side of the H-ARQ entity towards a single peer.
#[derive(Debug)]
pub struct HarqBufferTx {
    owner: MacNodeId,
    peer: MacNodeId,
    direction: Direction,
    kind: FlowKind,
    processes: Vec<HarqProcessTx>,
    fb_evaluation_interval: Tick,
}

impl HarqBufferTx {
    pub fn new(
        owner: MacNodeId,
        peer: MacNodeId,
        cfg: &HarqConfig,
        directory: &dyn NodeDirectory,
    ) -> HarqResult<Self> {
        let direction = resolve_direction(directory, owner, peer)?;
        let tags = StatsTags::resolve(directory, owner, peer)?;
        let processes = (0..cfg.processes)
            .map(|acid| HarqProcessTx::new(acid, peer, direction, cfg.max_harq_rtx, tags))
            .collect();
        debug!(
            "H-ARQ TX buffer {} -> {} created ({:?}, {} processes)",
            owner, peer, direction, cfg.processes
        );
        Ok(Self {
            owner,
            peer,
            direction,
            kind: FlowKind::from_direction(direction),
            processes,
            fb_evaluation_interval: cfg.fb_evaluation_interval,
        })
    }

    pub fn owner(&self) -> MacNodeId {
        self.owner
    }

    pub fn peer(&self) -> MacNodeId {
        self.peer
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn flow_kind(&self) -> FlowKind {
        self.kind
    }

    pub fn processes(&self) -> &[HarqProcessTx] {
        &self.processes
    }

    pub fn process(&self, acid: ProcessId) -> HarqResult<&HarqProcessTx> {
        self.processes
            .get(acid as usize)
            .ok_or(HarqError::UnknownUnit(UnitId::new(acid, 0)))
    }

    fn process_mut(&mut self, acid: ProcessId) -> HarqResult<&mut HarqProcessTx> {
        self.processes
            .get_mut(acid as usize)
            .ok_or(HarqError::UnknownUnit(UnitId::new(acid, 0)))
    }

    pub fn unit(&self, unit: UnitId) -> HarqResult<&HarqUnitTx> {
        self.processes
            .get(unit.acid as usize)
            .and_then(|p| p.unit(unit.codeword).ok())
            .ok_or(HarqError::UnknownUnit(unit))
    }

    fn unit_mut(&mut self, unit: UnitId) -> HarqResult<&mut HarqUnitTx> {
        self.processes
            .get_mut(unit.acid as usize)
            .and_then(|p| p.unit_mut(unit.codeword).ok())
            .ok_or(HarqError::UnknownUnit(unit))
    }

    pub fn ready_units(&self) -> ReadyUnits {
        let mut ready = ReadyUnits::default();
        for p in &self.processes {
            for u in p.units() {
                match u.status() {
                    TxStatus::Buffered => ready.retransmit.push(u.id()),
                    TxStatus::Empty => ready.empty.push(u.id()),
                    TxStatus::Selected | TxStatus::Waiting => {}
                }
            }
        }
        ready
    }

    /// Process holding the NACKed PDU that has waited longest.
    pub fn first_ready_for_rtx(&self) -> Option<ProcessId> {
        self.processes
            .iter()
            .flat_map(|p| p.units().iter())
            .filter(|u| u.is_ready())
            .min_by_key(|u| (u.tx_time(), u.id()))
            .map(|u| u.id().acid)
    }

    /// First process with every codeword free.
    pub fn first_available(&self) -> Option<ProcessId> {
        self.processes
            .iter()
            .find(|p| p.is_empty())
            .map(HarqProcessTx::acid)
    }

    pub fn selected_units(&self) -> Vec<UnitId> {
        self.processes
            .iter()
            .flat_map(|p| {
                p.selected_units()
                    .into_iter()
                    .map(move |cw| UnitId::new(p.acid(), cw))
            })
            .collect()
    }

    pub fn insert_pdu(&mut self, unit: UnitId, pdu: MacPdu) -> HarqResult<()> {
        self.unit_mut(unit)?.insert(pdu)
    }

    pub fn mark_selected(&mut self, unit: UnitId) -> HarqResult<()> {
        self.unit_mut(unit)?.mark_selected()
    }

    /// Put one SELECTED unit on the air.
    pub fn extract(&mut self, unit: UnitId, now: Tick) -> HarqResult<DataFrame> {
        self.unit_mut(unit)?.extract(now)
    }

    /// Release the units of a flow without return channel once every
    /// receiver is done evaluating them. Until then the receivers' codeword
    /// is busy and new data on the same unit would collide.
    pub fn release_expired(&mut self, now: Tick) -> Vec<MacPdu> {
        if self.kind.awaits_feedback() {
            return Vec::new();
        }
        let interval = self.fb_evaluation_interval;
        let mut released = Vec::new();
        for p in &mut self.processes {
            for cw in 0..MAX_CODEWORDS as Codeword {
                let Ok(u) = p.unit_mut(cw) else {
                    continue;
                };
                if u.status() == TxStatus::Waiting
                    && u.tx_time().is_some_and(|t| now > t + interval)
                {
                    released.extend(u.force_release());
                }
            }
        }
        released
    }

    /// Extract every SELECTED unit, in process order.
    pub fn extract_selected(&mut self, now: Tick) -> HarqResult<Vec<DataFrame>> {
        self.selected_units()
            .into_iter()
            .map(|unit| self.extract(unit, now))
            .collect()
    }

    /// Route an ACK/NACK to the addressed unit. Feedback for a PDU the
    /// unit no longer holds is stale and ignored (`Ok(None)`).
    pub fn receive_feedback(
        &mut self,
        fb: &HarqFeedback,
        stats: &mut dyn StatsSink,
    ) -> HarqResult<Option<FeedbackOutcome>> {
        let peer = self.peer;
        let unit = self.unit_mut(fb.unit())?;
        if unit.pdu_id() != Some(fb.pdu_id) {
            warn!(
                "H-ARQ TX {} peer {}: stale feedback for pdu {} (unit holds {:?}), ignored",
                fb.unit(),
                peer,
                fb.pdu_id,
                unit.pdu_id()
            );
            return Ok(None);
        }
        debug!(
            "H-ARQ TX {} peer {}: {} for pdu {}",
            fb.unit(),
            peer,
            if fb.ack { "ACK" } else { "NACK" },
            fb.pdu_id
        );
        unit.on_feedback(fb.ack, stats).map(Some)
    }

    /// Abort one process, e.g. on a D2D mode switch.
    pub fn force_drop_process(&mut self, acid: ProcessId) -> HarqResult<Vec<MacPdu>> {
        Ok(self.process_mut(acid)?.force_drop())
    }

    pub fn force_drop_all(&mut self) -> Vec<MacPdu> {
        let dropped: Vec<MacPdu> = self
            .processes
            .iter_mut()
            .flat_map(HarqProcessTx::force_drop)
            .collect();
        if !dropped.is_empty() {
            debug!(
                "H-ARQ TX buffer {} -> {}: force dropped {} pdus",
                self.owner,
                self.peer,
                dropped.len()
            );
        }
        dropped
    }

    /// Self NACK every unit that is not waiting for a real feedback.
    /// Returns the units that were discarded.
    pub fn self_nack_all(&mut self, now: Tick, stats: &mut dyn StatsSink) -> Vec<UnitId> {
        let mut discarded = Vec::new();
        for p in &mut self.processes {
            for cw in p.ready_units().into_iter().chain(p.selected_units()) {
                if let Ok(u) = p.unit_mut(cw) {
                    if u.self_nack(now, stats).is_ok() {
                        discarded.push(u.id());
                    }
                }
            }
        }
        discarded
    }

    pub fn buffer_status(&self) -> Vec<(UnitId, TxStatus)> {
        self.processes
            .iter()
            .flat_map(|p| p.units().iter().map(|u| (u.id(), u.status())))
            .collect()
    }

    pub fn pending_pdus(&self) -> usize {
        self.processes.iter().map(HarqProcessTx::buffered_pdus).sum()
    }

    pub fn is_idle(&self) -> bool {
        self.pending_pdus() == 0
    }
}
