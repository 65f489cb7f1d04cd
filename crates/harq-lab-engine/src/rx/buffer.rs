use harq_lab_abstract::{
    DataFrame, Direction, FeedbackMirror, HarqConfig, HarqError, HarqResult, LowerFrame,
    MacNodeId, MacPdu, Metric, MetricKind, NodeDirectory, ProcessId, StatSample, StatsSink, Tick,
    UnitId,
};
use serde::Serialize;
use tracing::debug;

use crate::policy::{FlowKind, StatsTags};
use crate::rx::process::{HarqProcessRx, RxStatus};

/// Snapshot of one receive codeword, as exported to the eNB mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RxUnitStatus {
    pub unit: UnitId,
    pub status: RxStatus,
    pub pdu_len: usize,
    pub transmissions: u8,
}

pub type RxBufferStatus = Vec<RxUnitStatus>;

/// What a receive buffer produced in one tick.
#[derive(Debug, Default)]
pub struct RxTickOutput {
    /// Feedback (and mirror copies) for the lower layer.
    pub feedback: Vec<LowerFrame>,
    /// PDUs for the upper layer.
    pub delivered: Vec<MacPdu>,
}

/// Receive side of the H-ARQ entity for a single sender.
#[derive(Debug)]
pub struct HarqBufferRx {
    owner: MacNodeId,
    sender: MacNodeId,
    direction: Direction,
    kind: FlowKind,
    tags: StatsTags,
    processes: Vec<HarqProcessRx>,
    /// Tick of the last abort; inserts in that same tick are dropped.
    reset_at: Option<Tick>,
}

impl HarqBufferRx {
    pub fn new(
        owner: MacNodeId,
        sender: MacNodeId,
        direction: Direction,
        cfg: &HarqConfig,
        directory: &dyn NodeDirectory,
    ) -> HarqResult<Self> {
        let kind = FlowKind::from_direction(direction);
        let tags = StatsTags::resolve(directory, owner, sender)?;
        let processes = (0..cfg.processes)
            .map(|acid| {
                HarqProcessRx::new(
                    acid,
                    sender,
                    kind,
                    cfg.max_harq_rtx,
                    cfg.fb_evaluation_interval,
                )
            })
            .collect();
        debug!(
            "H-ARQ RX buffer {} <- {} created ({:?}, {} processes)",
            owner, sender, direction, cfg.processes
        );
        Ok(Self {
            owner,
            sender,
            direction,
            kind,
            tags,
            processes,
            reset_at: None,
        })
    }

    pub fn owner(&self) -> MacNodeId {
        self.owner
    }

    pub fn sender(&self) -> MacNodeId {
        self.sender
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn process(&self, acid: ProcessId) -> HarqResult<&HarqProcessRx> {
        self.processes
            .get(acid as usize)
            .ok_or(HarqError::UnknownUnit(UnitId::new(acid, 0)))
    }

    /// Store an incoming attempt. Returns `false` when the frame was
    /// dropped because the buffer was aborted in this very tick.
    pub fn insert_pdu(&mut self, frame: DataFrame, now: Tick) -> HarqResult<bool> {
        if self.reset_at == Some(now) {
            debug!(
                "H-ARQ RX buffer {} <- {}: pdu {} dropped, buffer reset this tick",
                self.owner, self.sender, frame.pdu.id
            );
            return Ok(false);
        }
        let unit = frame.unit();
        let process = self
            .processes
            .get_mut(unit.acid as usize)
            .ok_or(HarqError::UnknownUnit(unit))?;
        process.insert(frame, now)?;
        Ok(true)
    }

    /// Build ACK/NACK for every codeword whose evaluation interval has
    /// elapsed. D2D unicast receivers add a mirror copy for their cell.
    pub fn send_feedback(&mut self, now: Tick) -> HarqResult<Vec<LowerFrame>> {
        let mut out = Vec::new();
        for process in &mut self.processes {
            for (cw, _) in process.process_status() {
                if !process.is_evaluated(cw, now) {
                    continue;
                }
                let pdu_len = process.byte_len(cw);
                let Some(fb) = process.create_feedback(cw, now)? else {
                    continue;
                };
                debug!(
                    "H-ARQ RX: feedback to {} acid={} cw={}: {}",
                    fb.dest,
                    fb.acid,
                    cw,
                    if fb.ack { "ACK" } else { "NACK" }
                );
                out.push(LowerFrame::Feedback(fb));
                if self.kind.mirrors_feedback() {
                    out.push(LowerFrame::FeedbackMirror(FeedbackMirror {
                        feedback: fb,
                        d2d_tx_peer: self.sender,
                        d2d_rx_peer: self.owner,
                        pdu_len,
                        cell: self.tags.cell,
                    }));
                }
            }
        }
        Ok(out)
    }

    /// Hand every CORRECT codeword to the upper layer, emitting delay and
    /// throughput samples.
    pub fn extract_correct(
        &mut self,
        now: Tick,
        stats: &mut dyn StatsSink,
    ) -> HarqResult<Vec<MacPdu>> {
        let mut delivered = Vec::new();
        for process in &mut self.processes {
            for (cw, status) in process.process_status() {
                if status != RxStatus::Correct {
                    continue;
                }
                let pdu = process.extract(cw)?;
                let size = pdu.byte_len() as f64;
                stats.record(StatSample {
                    metric: Metric::new(MetricKind::MacDelay, self.direction),
                    node: self.tags.ue,
                    value: now.saturating_sub(pdu.created_at) as f64,
                });
                stats.record(StatSample {
                    metric: Metric::new(MetricKind::MacThroughput, self.direction),
                    node: self.tags.ue,
                    value: size,
                });
                stats.record(StatSample {
                    metric: Metric::new(MetricKind::MacCellThroughput, self.direction),
                    node: self.tags.cell,
                    value: size,
                });
                debug!(
                    "H-ARQ RX: pdu {} extracted from acid={} cw={}",
                    pdu.id,
                    process.acid(),
                    cw
                );
                delivered.push(pdu);
            }
        }
        Ok(delivered)
    }

    /// Feedback first, then extraction, so a PDU decoded this tick is both
    /// acknowledged and delivered.
    pub fn process_tick(
        &mut self,
        now: Tick,
        stats: &mut dyn StatsSink,
    ) -> HarqResult<RxTickOutput> {
        let feedback = self.send_feedback(now)?;
        let delivered = self.extract_correct(now, stats)?;
        Ok(RxTickOutput {
            feedback,
            delivered,
        })
    }

    pub fn purge_corrupted(&mut self) -> usize {
        self.processes
            .iter_mut()
            .map(HarqProcessRx::purge_corrupted)
            .sum()
    }

    /// Drop everything held for this sender (D2D mode switch).
    pub fn abort(&mut self, now: Tick) {
        debug!(
            "H-ARQ RX buffer {} <- {}: aborted at tick {}",
            self.owner, self.sender, now
        );
        self.processes.iter_mut().for_each(HarqProcessRx::reset);
        self.reset_at = Some(now);
    }

    pub fn buffer_status(&self) -> RxBufferStatus {
        let mut status = Vec::new();
        for process in &self.processes {
            for (cw, st) in process.process_status() {
                status.push(RxUnitStatus {
                    unit: UnitId::new(process.acid(), cw),
                    status: st,
                    pdu_len: process.byte_len(cw),
                    transmissions: process.transmissions(cw).unwrap_or(0),
                });
            }
        }
        status
    }

    pub fn first_available(&self) -> Option<ProcessId> {
        self.processes
            .iter()
            .find(|p| p.is_empty())
            .map(HarqProcessRx::acid)
    }

    pub fn is_idle(&self) -> bool {
        self.processes.iter().all(HarqProcessRx::is_empty)
    }
}
