use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashSet};

use harq_lab_abstract::{
    DataFrame, Direction, HarqConfig, HarqError, HarqResult, LowerFrame, MacNodeId, MacPdu,
    NodeDirectory, NodeKind, StatsSink, Tick,
};
use tracing::{debug, info, warn};

use crate::mirror::D2dMirrorTable;
use crate::rx::{HarqBufferRx, RxBufferStatus};
use crate::tx::HarqBufferTx;

/// Frames and PDUs produced by one receive sweep of an entity.
#[derive(Debug, Default)]
pub struct TickOutput {
    pub frames: Vec<LowerFrame>,
    pub delivered: Vec<MacPdu>,
}

/// All H-ARQ state of one MAC node: a transmit buffer per destination, a
/// receive buffer per sender and flow direction and, on an eNB, the D2D
/// mirror table.
#[derive(Debug)]
pub struct HarqEntity {
    node: MacNodeId,
    kind: NodeKind,
    cfg: HarqConfig,
    tx_buffers: BTreeMap<MacNodeId, HarqBufferTx>,
    rx_buffers: BTreeMap<(MacNodeId, Direction), HarqBufferRx>,
    mirrors: Option<D2dMirrorTable>,
    departed: HashSet<MacNodeId>,
}

impl HarqEntity {
    pub fn new(
        node: MacNodeId,
        cfg: HarqConfig,
        directory: &dyn NodeDirectory,
    ) -> HarqResult<Self> {
        let kind = directory
            .node_kind(node)
            .ok_or(HarqError::UnregisteredNode(node))?;
        let mirrors = match kind {
            NodeKind::Enb => Some(D2dMirrorTable::new(cfg.processes, cfg.max_harq_rtx)),
            NodeKind::Ue => None,
        };
        Ok(Self {
            node,
            kind,
            cfg,
            tx_buffers: BTreeMap::new(),
            rx_buffers: BTreeMap::new(),
            mirrors,
            departed: HashSet::new(),
        })
    }

    pub fn node(&self) -> MacNodeId {
        self.node
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn config(&self) -> &HarqConfig {
        &self.cfg
    }

    /// Demultiplex a frame coming up from the physical layer.
    pub fn from_phy(
        &mut self,
        frame: LowerFrame,
        now: Tick,
        directory: &dyn NodeDirectory,
        stats: &mut dyn StatsSink,
    ) -> HarqResult<()> {
        let src = frame.source();
        debug!(
            "node {} received {:?} from {} at tick {}",
            self.node,
            frame.frame_type(),
            src,
            now
        );
        match frame {
            LowerFrame::Data(data) => {
                if self.departed.contains(&src) {
                    if directory.node_kind(src).is_none() {
                        debug!("node {}: data from departed node {} dropped", self.node, src);
                        return Ok(());
                    }
                    self.departed.remove(&src);
                    info!("node {}: peer {} is back", self.node, src);
                }
                let buffer = match self.rx_buffers.entry((src, data.direction())) {
                    Entry::Occupied(e) => e.into_mut(),
                    Entry::Vacant(e) => {
                        let buffer = HarqBufferRx::new(
                            self.node,
                            src,
                            data.direction(),
                            &self.cfg,
                            directory,
                        )?;
                        self.departed.remove(&src);
                        e.insert(buffer)
                    }
                };
                buffer.insert_pdu(data, now)?;
            }
            LowerFrame::Feedback(fb) => match self.tx_buffers.get_mut(&src) {
                Some(buffer) => {
                    buffer.receive_feedback(&fb, stats)?;
                }
                None if self.departed.contains(&src) => {
                    debug!(
                        "node {}: feedback from departed node {} ignored",
                        self.node, src
                    );
                }
                None => return Err(HarqError::UnknownPeer(src)),
            },
            LowerFrame::FeedbackMirror(mirror) => match self.mirrors.as_mut() {
                Some(table) => table.apply_feedback(&mirror),
                None => warn!("node {}: mirror feedback on a UE ignored", self.node),
            },
        }
        Ok(())
    }

    /// Run feedback then extraction on every receive buffer.
    pub fn process_rx(&mut self, now: Tick, stats: &mut dyn StatsSink) -> HarqResult<TickOutput> {
        let mut out = TickOutput::default();
        for buffer in self.rx_buffers.values_mut() {
            let tick = buffer.process_tick(now, stats)?;
            out.frames.extend(tick.feedback);
            out.delivered.extend(tick.delivered);
        }
        Ok(out)
    }

    /// Transmit buffer towards `peer`, created on first use.
    pub fn tx_buffer_mut(
        &mut self,
        peer: MacNodeId,
        directory: &dyn NodeDirectory,
    ) -> HarqResult<&mut HarqBufferTx> {
        match self.tx_buffers.entry(peer) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(e) => {
                let buffer = HarqBufferTx::new(self.node, peer, &self.cfg, directory)?;
                self.departed.remove(&peer);
                Ok(e.insert(buffer))
            }
        }
    }

    pub fn tx_buffer(&self, peer: MacNodeId) -> Option<&HarqBufferTx> {
        self.tx_buffers.get(&peer)
    }

    pub fn tx_buffers(&self) -> impl Iterator<Item = &HarqBufferTx> {
        self.tx_buffers.values()
    }

    pub fn rx_buffer(&self, sender: MacNodeId, direction: Direction) -> Option<&HarqBufferRx> {
        self.rx_buffers.get(&(sender, direction))
    }

    /// Free multicast units whose receivers are done with them. Runs
    /// before scheduling so the freed units can take new data this tick.
    pub fn release_expired(&mut self, now: Tick) -> usize {
        self.tx_buffers
            .values_mut()
            .map(|b| b.release_expired(now).len())
            .sum()
    }

    /// Extract every unit the scheduler selected this tick.
    pub fn transmit_selected(&mut self, now: Tick) -> HarqResult<Vec<DataFrame>> {
        let mut frames = Vec::new();
        for buffer in self.tx_buffers.values_mut() {
            frames.extend(buffer.extract_selected(now)?);
        }
        Ok(frames)
    }

    /// Release everything held for a node that left the system.
    pub fn detach_peer(&mut self, peer: MacNodeId) -> Vec<MacPdu> {
        let mut released = Vec::new();
        if let Some(mut buffer) = self.tx_buffers.remove(&peer) {
            released.extend(buffer.force_drop_all());
        }
        self.rx_buffers.retain(|(sender, _), buffer| {
            if *sender == peer {
                buffer.purge_corrupted();
            }
            *sender != peer
        });
        if let Some(table) = self.mirrors.as_mut() {
            table.remove_peer(peer);
        }
        self.departed.insert(peer);
        info!(
            "node {}: peer {} detached, {} pdus released",
            self.node,
            peer,
            released.len()
        );
        released
    }

    /// Transmitter side of a D2D mode switch: discard everything queued
    /// for `peer`. Units not waiting for feedback count as lost attempts.
    pub fn mode_switch_tx(
        &mut self,
        peer: MacNodeId,
        now: Tick,
        stats: &mut dyn StatsSink,
    ) -> usize {
        let Some(buffer) = self.tx_buffers.get_mut(&peer) else {
            return 0;
        };
        let nacked = buffer.self_nack_all(now, stats).len();
        let dropped = buffer.force_drop_all().len();
        info!(
            "node {}: mode switch towards {}, {} units aborted",
            self.node,
            peer,
            nacked + dropped
        );
        nacked + dropped
    }

    /// Receiver side of a D2D mode switch.
    pub fn mode_switch_rx(&mut self, sender: MacNodeId, now: Tick) {
        if let Some(buffer) = self.rx_buffers.get_mut(&(sender, Direction::D2d)) {
            buffer.abort(now);
        }
    }

    pub fn mirror_table(&self) -> Option<&D2dMirrorTable> {
        self.mirrors.as_ref()
    }

    pub fn mirror_table_mut(&mut self) -> Option<&mut D2dMirrorTable> {
        self.mirrors.as_mut()
    }

    /// Status of every D2D unicast receive buffer, keyed by sender.
    pub fn d2d_snapshots(&self) -> Vec<(MacNodeId, RxBufferStatus)> {
        self.rx_buffers
            .values()
            .filter(|b| b.direction() == Direction::D2d)
            .map(|b| (b.sender(), b.buffer_status()))
            .collect()
    }

    /// PDUs still held by transmit buffers.
    pub fn pending_pdus(&self) -> usize {
        self.tx_buffers.values().map(HarqBufferTx::pending_pdus).sum()
    }

    pub fn is_idle(&self) -> bool {
        self.pending_pdus() == 0 && self.rx_buffers.values().all(HarqBufferRx::is_idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{ENB, GROUP, UE_A, UE_B, config, directory, pdu};
    use harq_lab_abstract::{FeedbackMirror, HarqFeedback, StatSample, UnitId};

    fn feedback(source: MacNodeId, dest: MacNodeId, ack: bool) -> HarqFeedback {
        HarqFeedback {
            acid: 0,
            codeword: 0,
            ack,
            pdu_id: 1,
            source,
            dest,
        }
    }

    #[test]
    fn downlink_round_trip_between_entities() {
        let dir = directory();
        let mut stats: Vec<StatSample> = Vec::new();
        let mut enb = HarqEntity::new(ENB, config(), &dir).unwrap();
        let mut ue = HarqEntity::new(UE_A, config(), &dir).unwrap();

        let unit = UnitId::new(0, 0);
        enb.tx_buffer_mut(UE_A, &dir)
            .unwrap()
            .insert_pdu(unit, pdu(1, ENB, UE_A, Direction::Dl, 0, 300))
            .unwrap();
        let frames = enb.transmit_selected(0).unwrap();
        assert_eq!(frames.len(), 1);

        for f in frames {
            ue.from_phy(LowerFrame::Data(f), 1, &dir, &mut stats).unwrap();
        }
        assert!(ue.rx_buffer(ENB, Direction::Dl).is_some());
        assert!(ue.rx_buffer(ENB, Direction::Ul).is_none());
        assert!(ue.process_rx(3, &mut stats).unwrap().frames.is_empty());

        let out = ue.process_rx(4, &mut stats).unwrap();
        assert_eq!(out.delivered.len(), 1);
        assert_eq!(out.delivered[0].byte_len(), 300);
        for f in out.frames {
            enb.from_phy(f, 5, &dir, &mut stats).unwrap();
        }
        assert!(enb.is_idle());
        assert!(ue.is_idle());
    }

    #[test]
    fn feedback_without_buffer_depends_on_departure() {
        let dir = directory();
        let mut stats: Vec<StatSample> = Vec::new();
        let mut enb = HarqEntity::new(ENB, config(), &dir).unwrap();
        let err = enb
            .from_phy(
                LowerFrame::Feedback(feedback(UE_B, ENB, true)),
                0,
                &dir,
                &mut stats,
            )
            .unwrap_err();
        assert_eq!(err, HarqError::UnknownPeer(UE_B));

        enb.tx_buffer_mut(UE_B, &dir)
            .unwrap()
            .insert_pdu(UnitId::new(0, 0), pdu(1, ENB, UE_B, Direction::Dl, 0, 10))
            .unwrap();
        enb.transmit_selected(0).unwrap();
        let released = enb.detach_peer(UE_B);
        assert_eq!(released.len(), 1);
        assert!(enb.tx_buffer(UE_B).is_none());

        enb.from_phy(
            LowerFrame::Feedback(feedback(UE_B, ENB, true)),
            2,
            &dir,
            &mut stats,
        )
        .unwrap();
        assert!(stats.is_empty());
    }

    #[test]
    fn reattached_peer_is_heard_again() {
        let mut dir = directory();
        let mut stats: Vec<StatSample> = Vec::new();
        let mut enb = HarqEntity::new(ENB, config(), &dir).unwrap();
        let mut ue = HarqEntity::new(UE_B, config(), &dir).unwrap();
        ue.tx_buffer_mut(ENB, &dir)
            .unwrap()
            .insert_pdu(UnitId::new(0, 0), pdu(1, UE_B, ENB, Direction::Ul, 0, 10))
            .unwrap();
        let frame = ue.transmit_selected(0).unwrap().remove(0);

        enb.detach_peer(UE_B);
        dir.remove(UE_B);
        enb.from_phy(LowerFrame::Data(frame.clone()), 1, &dir, &mut stats)
            .unwrap();
        assert!(enb.rx_buffer(UE_B, Direction::Ul).is_none());

        dir.register_ue(UE_B, ENB);
        enb.from_phy(LowerFrame::Data(frame), 2, &dir, &mut stats)
            .unwrap();
        assert!(enb.rx_buffer(UE_B, Direction::Ul).is_some());

        // no longer a late answer from a departed peer
        let err = enb
            .from_phy(
                LowerFrame::Feedback(feedback(UE_B, ENB, true)),
                3,
                &dir,
                &mut stats,
            )
            .unwrap_err();
        assert_eq!(err, HarqError::UnknownPeer(UE_B));
    }

    #[test]
    fn multicast_units_free_up_after_the_window() {
        let dir = directory();
        let mut ue = HarqEntity::new(UE_A, config(), &dir).unwrap();
        ue.tx_buffer_mut(GROUP, &dir)
            .unwrap()
            .insert_pdu(UnitId::new(0, 0), pdu(1, UE_A, GROUP, Direction::D2dMulti, 0, 10))
            .unwrap();
        assert_eq!(ue.transmit_selected(0).unwrap().len(), 1);
        assert_eq!(ue.release_expired(3), 0);
        assert!(!ue.is_idle());
        assert_eq!(ue.release_expired(4), 1);
        assert!(ue.is_idle());
    }

    #[test]
    fn mirror_feedback_reaches_only_the_enb_table() {
        let dir = directory();
        let mut stats: Vec<StatSample> = Vec::new();
        let mirror = FeedbackMirror {
            feedback: feedback(UE_B, UE_A, false),
            d2d_tx_peer: UE_A,
            d2d_rx_peer: UE_B,
            pdu_len: 10,
            cell: ENB,
        };

        let mut ue = HarqEntity::new(UE_A, config(), &dir).unwrap();
        ue.from_phy(LowerFrame::FeedbackMirror(mirror), 0, &dir, &mut stats)
            .unwrap();
        assert!(ue.mirror_table().is_none());

        let mut enb = HarqEntity::new(ENB, config(), &dir).unwrap();
        enb.from_phy(LowerFrame::FeedbackMirror(mirror), 0, &dir, &mut stats)
            .unwrap();
        let table = enb.mirror_table().unwrap();
        assert_eq!(table.corrupted_units(UE_A, UE_B), vec![UnitId::new(0, 0)]);
    }

    #[test]
    fn mode_switch_aborts_both_sides() {
        let dir = directory();
        let mut stats: Vec<StatSample> = Vec::new();
        let mut tx = HarqEntity::new(UE_A, config(), &dir).unwrap();
        let mut rx = HarqEntity::new(UE_B, config(), &dir).unwrap();

        let buffer = tx.tx_buffer_mut(UE_B, &dir).unwrap();
        buffer
            .insert_pdu(UnitId::new(0, 0), pdu(1, UE_A, UE_B, Direction::D2d, 0, 10))
            .unwrap();
        buffer
            .insert_pdu(UnitId::new(1, 0), pdu(2, UE_A, UE_B, Direction::D2d, 0, 10))
            .unwrap();
        let frames = tx.transmit_selected(0).unwrap();
        assert_eq!(frames.len(), 2);
        rx.from_phy(LowerFrame::Data(frames[0].clone()), 1, &dir, &mut stats)
            .unwrap();
        assert_eq!(rx.d2d_snapshots().len(), 1);

        assert_eq!(tx.mode_switch_tx(UE_B, 2, &mut stats), 2);
        assert!(tx.is_idle());

        rx.mode_switch_rx(UE_A, 2);
        assert!(rx.is_idle());
        rx.from_phy(LowerFrame::Data(frames[1].clone()), 2, &dir, &mut stats)
            .unwrap();
        assert!(rx.is_idle());
    }
}
