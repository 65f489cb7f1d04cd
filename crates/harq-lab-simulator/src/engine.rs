use crate::channel::{Channel, ChannelOutcome};
use crate::metrics::MetricStore;
use crate::sched::{Grant, GrantKind, RoundRobinScheduler, Scheduler};
use crate::trace::SimulationReport;
use anyhow::{Context, Result, bail, ensure};
use bytes::Bytes;
use harq_lab_abstract::{
    DataFrame, Direction, HarqResult, LowerFrame, MacNodeId, MacPdu, NodeDirectory, NodeKind,
    PduId, SimConfig, StaticDirectory, Tick,
};
use harq_lab_engine::HarqEntity;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, VecDeque};
use tracing::{debug, info, warn};

#[derive(Debug)]
pub enum EventType {
    FrameArrival { to: MacNodeId, frame: LowerFrame },
    AppSend {
        from: MacNodeId,
        to: MacNodeId,
        bytes: usize,
    },
    Detach { node: MacNodeId },
    ModeSwitch { tx: MacNodeId, rx: MacNodeId },
}

#[derive(Debug)]
struct Event {
    time: Tick,
    event_type: EventType,
    id: u64, // keeps insertion order among events of the same tick
}

// Custom Ord for Min-Heap (smallest time pops first)
impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.id == other.id
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// A compact textual summary of important link-layer events.
#[derive(Debug, Clone, Serialize)]
pub struct LinkEventSummary {
    pub time: Tick,
    pub description: String,
}

/// A PDU handed to the upper layer of `node`.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveredPdu {
    pub tick: Tick,
    pub node: MacNodeId,
    pub source: MacNodeId,
    pub pdu_id: PduId,
    pub bytes: usize,
    pub direction: Direction,
}

/// MAC node: its H-ARQ entity plus the application bytes waiting for a grant.
struct SimNode {
    entity: HarqEntity,
    queues: BTreeMap<MacNodeId, VecDeque<Bytes>>,
}

impl SimNode {
    fn backlog(&self) -> BTreeMap<MacNodeId, usize> {
        self.queues
            .iter()
            .map(|(peer, q)| (*peer, q.iter().map(Bytes::len).sum::<usize>()))
            .filter(|(_, bytes)| *bytes > 0)
            .collect()
    }

    /// Next SDU for `peer`, segmented to the grant size.
    fn take_payload(&mut self, peer: MacNodeId, budget: usize) -> Option<Bytes> {
        let queue = self.queues.get_mut(&peer)?;
        let mut chunk = queue.pop_front()?;
        if chunk.len() > budget {
            let head = chunk.split_to(budget);
            queue.push_front(chunk);
            Some(head)
        } else {
            Some(chunk)
        }
    }

    fn is_idle(&self) -> bool {
        self.entity.is_idle() && self.queues.values().all(VecDeque::is_empty)
    }
}

pub struct Simulator {
    time: Tick,
    event_queue: BinaryHeap<Event>,
    event_id_counter: u64,

    config: SimConfig,
    directory: StaticDirectory,
    nodes: BTreeMap<MacNodeId, SimNode>,
    scheduler: Box<dyn Scheduler>,
    channel: Channel,
    pdu_counter: PduId,

    /// Engine statistics, keyed by metric name.
    pub metrics: MetricStore,
    pub delivered: Vec<DeliveredPdu>,
    /// Data frames put on the air (one per transmission, not per receiver).
    pub transmissions: usize,
    pub retransmissions: usize,
    pub link_events: Vec<LinkEventSummary>,
}

impl Simulator {
    pub fn new(config: SimConfig) -> Result<Self> {
        ensure!(config.grant_bytes > 0, "grant_bytes must be at least 1");
        ensure!(config.grants_per_tick > 0, "grants_per_tick must be at least 1");
        ensure!(
            config.harq.processes > 0,
            "at least one HARQ process is needed per buffer"
        );
        let channel = Channel::new(&config);
        Ok(Self {
            time: 0,
            event_queue: BinaryHeap::new(),
            event_id_counter: 0,
            config,
            directory: StaticDirectory::new(),
            nodes: BTreeMap::new(),
            scheduler: Box::new(RoundRobinScheduler::new()),
            channel,
            pdu_counter: 0,
            metrics: MetricStore::new(),
            delivered: Vec::new(),
            transmissions: 0,
            retransmissions: 0,
            link_events: Vec::new(),
        })
    }

    pub fn with_scheduler(mut self, scheduler: Box<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn add_enb(&mut self, id: MacNodeId) -> Result<()> {
        self.directory.register_enb(id);
        self.spawn(id)
    }

    pub fn add_ue(&mut self, id: MacNodeId, cell: MacNodeId) -> Result<()> {
        if self.directory.node_kind(cell) != Some(NodeKind::Enb) {
            bail!("UE {id} is attached to {cell}, which is not a registered eNB");
        }
        self.directory.register_ue(id, cell);
        self.spawn(id)
    }

    pub fn add_group(&mut self, id: MacNodeId, members: Vec<MacNodeId>) {
        self.directory.register_group(id, members);
    }

    fn spawn(&mut self, id: MacNodeId) -> Result<()> {
        let entity = HarqEntity::new(id, self.config.harq.clone(), &self.directory)
            .with_context(|| format!("Failed to create H-ARQ entity for node {id}"))?;
        self.nodes.insert(
            id,
            SimNode {
                entity,
                queues: BTreeMap::new(),
            },
        );
        Ok(())
    }

    /// Register a deterministic fault: corrupt the next `count` data frames from `from` to `to`.
    pub fn add_corrupt_next(&mut self, from: MacNodeId, to: MacNodeId, count: u32) {
        self.channel.add_corrupt_next(from, to, count);
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn directory(&self) -> &StaticDirectory {
        &self.directory
    }

    pub fn entity(&self, id: MacNodeId) -> Option<&HarqEntity> {
        self.nodes.get(&id).map(|n| &n.entity)
    }

    pub fn current_time(&self) -> Tick {
        self.time
    }

    pub fn remaining_events(&self) -> usize {
        self.event_queue.len()
    }

    pub fn discarded(&self) -> usize {
        self.metrics.discarded()
    }

    pub fn delivered_bytes(&self, to: Option<MacNodeId>) -> usize {
        self.delivered
            .iter()
            .filter(|d| to.is_none_or(|to| d.node == to))
            .map(|d| d.bytes)
            .sum()
    }

    fn push_event(&mut self, time: Tick, event_type: EventType) {
        self.event_queue.push(Event {
            time,
            event_type,
            id: self.event_id_counter,
        });
        self.event_id_counter += 1;
    }

    pub fn schedule_app_send(&mut self, tick: Tick, from: MacNodeId, to: MacNodeId, bytes: usize) {
        self.push_event(tick, EventType::AppSend { from, to, bytes });
    }

    pub fn schedule_detach(&mut self, tick: Tick, node: MacNodeId) {
        self.push_event(tick, EventType::Detach { node });
    }

    pub fn schedule_mode_switch(&mut self, tick: Tick, tx: MacNodeId, rx: MacNodeId) {
        self.push_event(tick, EventType::ModeSwitch { tx, rx });
    }

    /// No pending events, no queued bytes and no H-ARQ state left anywhere.
    pub fn is_finished(&self) -> bool {
        self.event_queue.is_empty() && self.nodes.values().all(SimNode::is_idle)
    }

    /// Advance one tick. Returns false once there is nothing left to do.
    pub fn step(&mut self) -> Result<bool> {
        if self.is_finished() {
            return Ok(false);
        }
        let now = self.time;
        self.metrics.set_time(now);

        self.handle_events(now)?;
        self.receive_phase(now)?;
        self.transmit_phase(now)?;
        self.refresh_mirrors();

        self.time += 1;
        Ok(true)
    }

    pub fn run_until_complete(&mut self) -> Result<()> {
        while self.time < self.config.max_ticks && self.step()? {}
        if self.is_finished() {
            info!("Simulation drained at tick {}", self.time);
        } else {
            warn!(
                "Simulation stopped at tick {} with work still pending",
                self.time
            );
        }
        Ok(())
    }

    /// Produce a serializable snapshot of the current simulation state.
    pub fn export_report(&self) -> SimulationReport {
        SimulationReport {
            config: self.config.clone(),
            duration_ticks: self.time,
            delivered: self.delivered.clone(),
            delivered_bytes: self.delivered_bytes(None),
            transmissions: self.transmissions,
            retransmissions: self.retransmissions,
            discarded: self.discarded(),
            metrics: self.metrics.summaries(),
            link_events: self.link_events.clone(),
        }
    }

    fn log_event(&mut self, description: String) {
        self.link_events.push(LinkEventSummary {
            time: self.time,
            description,
        });
    }

    fn handle_events(&mut self, now: Tick) -> Result<()> {
        while self.event_queue.peek().is_some_and(|e| e.time <= now) {
            let Some(event) = self.event_queue.pop() else {
                break;
            };
            debug!("Processing event at {}: {:?}", now, event.event_type);
            match event.event_type {
                EventType::FrameArrival { to, frame } => self.deliver_frame(to, frame, now)?,
                EventType::AppSend { from, to, bytes } => self.app_send(from, to, bytes)?,
                EventType::Detach { node } => self.detach(node),
                EventType::ModeSwitch { tx, rx } => self.mode_switch(tx, rx, now),
            }
        }
        Ok(())
    }

    fn deliver_frame(&mut self, to: MacNodeId, frame: LowerFrame, now: Tick) -> Result<()> {
        let Some(node) = self.nodes.get_mut(&to) else {
            self.log_event(format!(
                "[{}->{}] DROP {:?} (receiver gone)",
                frame.source(),
                to,
                frame.frame_type()
            ));
            return Ok(());
        };
        node.entity
            .from_phy(frame, now, &self.directory, &mut self.metrics)
            .with_context(|| format!("Node {to} failed to handle a frame at tick {now}"))
    }

    fn app_send(&mut self, from: MacNodeId, to: MacNodeId, bytes: usize) -> Result<()> {
        let reachable = self.directory.contains(to) || self.directory.is_multicast_group(to);
        let Some(node) = self.nodes.get_mut(&from).filter(|_| reachable) else {
            warn!("App data {from} -> {to} dropped: endpoint not attached");
            self.log_event(format!("[{from}->{to}] APP DROP {bytes} bytes"));
            return Ok(());
        };
        node.entity
            .tx_buffer_mut(to, &self.directory)
            .with_context(|| format!("Node {from} cannot open an H-ARQ buffer towards {to}"))?;
        let payload = Bytes::from(vec![from.0 as u8; bytes]);
        node.queues.entry(to).or_default().push_back(payload);
        info!("[{}] APP DATA: {} bytes for {}", from, bytes, to);
        Ok(())
    }

    fn detach(&mut self, node: MacNodeId) {
        if self.nodes.remove(&node).is_none() {
            return;
        }
        let mut released = 0;
        for other in self.nodes.values_mut() {
            released += other.entity.detach_peer(node).len();
            other.queues.remove(&node);
        }
        self.directory.remove(node);
        info!("Node {} detached, {} pdus released by peers", node, released);
        self.log_event(format!("[{node}] DETACH ({released} pdus released)"));
    }

    fn mode_switch(&mut self, tx: MacNodeId, rx: MacNodeId, now: Tick) {
        // frames already on the air between the pair belong to the old link
        self.event_queue.retain(|e| {
            !matches!(&e.event_type, EventType::FrameArrival { to, frame }
                if (*to == rx && frame.source() == tx) || (*to == tx && frame.source() == rx))
        });

        let mut aborted = 0;
        if let Some(node) = self.nodes.get_mut(&tx) {
            aborted = node.entity.mode_switch_tx(rx, now, &mut self.metrics);
        }
        if let Some(node) = self.nodes.get_mut(&rx) {
            node.entity.mode_switch_rx(tx, now);
        }
        if let Some(cell) = self.directory.serving_cell(tx)
            && let Some(table) = self
                .nodes
                .get_mut(&cell)
                .and_then(|n| n.entity.mirror_table_mut())
        {
            table.remove_pair(tx, rx);
        }
        self.log_event(format!(
            "[{tx}->{rx}] MODE SWITCH ({aborted} units aborted)"
        ));
    }

    /// Feedback sweep then extraction on every node; feedback goes back
    /// over a lossless control channel.
    fn receive_phase(&mut self, now: Tick) -> Result<()> {
        let mut outgoing = Vec::new();
        for (id, node) in self.nodes.iter_mut() {
            let out = node
                .entity
                .process_rx(now, &mut self.metrics)
                .with_context(|| format!("Node {id} failed its receive sweep at tick {now}"))?;
            for pdu in out.delivered {
                info!(
                    "[{}] DELIVERED pdu {} ({} bytes) from {}",
                    id,
                    pdu.id,
                    pdu.byte_len(),
                    pdu.source
                );
                self.link_events.push(LinkEventSummary {
                    time: now,
                    description: format!(
                        "[{}] DELIVERED pdu={} {} bytes to upper layer",
                        id,
                        pdu.id,
                        pdu.byte_len()
                    ),
                });
                self.delivered.push(DeliveredPdu {
                    tick: now,
                    node: *id,
                    source: pdu.source,
                    pdu_id: pdu.id,
                    bytes: pdu.byte_len(),
                    direction: pdu.direction,
                });
            }
            outgoing.extend(out.frames);
        }

        let arrival = now + self.config.propagation_delay;
        for frame in outgoing {
            if let LowerFrame::Feedback(fb) = &frame {
                self.log_event(format!(
                    "[{}->{}] {} pdu={} acid={} cw={}",
                    fb.source,
                    fb.dest,
                    if fb.ack { "ACK" } else { "NACK" },
                    fb.pdu_id,
                    fb.acid,
                    fb.codeword
                ));
            }
            let to = frame.dest();
            self.push_event(arrival, EventType::FrameArrival { to, frame });
        }
        Ok(())
    }

    fn transmit_phase(&mut self, now: Tick) -> Result<()> {
        let mut on_air = Vec::new();
        for (id, node) in self.nodes.iter_mut() {
            let expired = node.entity.release_expired(now);
            if expired > 0 {
                debug!("Node {id}: {expired} multicast units released at tick {now}");
            }
            let backlog = node.backlog();
            let grants = self.scheduler.schedule(&node.entity, &backlog, &self.config);
            for grant in grants {
                apply_grant(node, *id, &grant, now, &self.directory, &mut self.pdu_counter)
                    .with_context(|| {
                        format!("Node {id} could not apply {grant:?} at tick {now}")
                    })?;
            }
            let frames = node
                .entity
                .transmit_selected(now)
                .with_context(|| format!("Node {id} failed to transmit at tick {now}"))?;
            on_air.extend(frames);
        }
        for frame in on_air {
            self.put_on_air(frame, now);
        }
        Ok(())
    }

    fn put_on_air(&mut self, frame: DataFrame, now: Tick) {
        self.transmissions += 1;
        if !frame.new_data {
            self.retransmissions += 1;
        }
        let source = frame.source();

        if frame.direction() == Direction::D2d
            && let Some(cell) = self.directory.serving_cell(source)
            && let Some(table) = self
                .nodes
                .get_mut(&cell)
                .and_then(|n| n.entity.mirror_table_mut())
        {
            table.note_transmission(
                source,
                frame.dest(),
                frame.unit(),
                frame.pdu.byte_len(),
                frame.new_data,
            );
        }

        let receivers: Vec<MacNodeId> = if frame.direction() == Direction::D2dMulti {
            self.directory
                .multicast_members(frame.dest())
                .into_iter()
                .filter(|m| *m != source)
                .collect()
        } else {
            vec![frame.dest()]
        };

        let arrival = now + self.config.propagation_delay;
        for receiver in receivers {
            let mut copy = frame.clone();
            let outcome = self.channel.transmit(&mut copy, receiver);
            let verdict = match outcome {
                ChannelOutcome::Decoded => "",
                ChannelOutcome::Corrupted => " CORRUPT",
                ChannelOutcome::ForcedCorruption => " CORRUPT (deterministic)",
            };
            self.link_events.push(LinkEventSummary {
                time: now,
                description: format!(
                    "[{}->{}] {} pdu={} acid={} cw={} tx={}{}",
                    source,
                    receiver,
                    if copy.new_data { "SEND" } else { "RETX" },
                    copy.pdu.id,
                    copy.acid,
                    copy.codeword,
                    copy.tx_number,
                    verdict
                ),
            });
            self.push_event(
                arrival,
                EventType::FrameArrival {
                    to: receiver,
                    frame: LowerFrame::Data(copy),
                },
            );
        }
    }

    /// Copy every D2D receiver's status into its serving eNB's mirror table.
    fn refresh_mirrors(&mut self) {
        let mut snapshots = Vec::new();
        for (id, node) in &self.nodes {
            let Some(cell) = self.directory.serving_cell(*id) else {
                continue;
            };
            for (sender, status) in node.entity.d2d_snapshots() {
                snapshots.push((cell, sender, *id, status));
            }
        }
        for (cell, sender, receiver, status) in snapshots {
            if let Some(table) = self
                .nodes
                .get_mut(&cell)
                .and_then(|n| n.entity.mirror_table_mut())
            {
                table.store_snapshot(sender, receiver, &status);
            }
        }
    }
}

fn apply_grant(
    node: &mut SimNode,
    id: MacNodeId,
    grant: &Grant,
    now: Tick,
    directory: &StaticDirectory,
    pdu_counter: &mut PduId,
) -> HarqResult<()> {
    match grant.kind {
        GrantKind::Retransmission => node
            .entity
            .tx_buffer_mut(grant.peer, directory)?
            .mark_selected(grant.unit),
        GrantKind::NewData => {
            let Some(payload) = node.take_payload(grant.peer, grant.bytes) else {
                return Ok(());
            };
            *pdu_counter += 1;
            let buffer = node.entity.tx_buffer_mut(grant.peer, directory)?;
            let pdu = MacPdu::new(
                *pdu_counter,
                id,
                grant.peer,
                buffer.direction(),
                now,
                payload,
            );
            buffer.insert_pdu(grant.unit, pdu)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Simulator;
    use crate::sched::{Grant, Scheduler};
    use harq_lab_abstract::{Direction, MacNodeId, SimConfig};
    use harq_lab_engine::HarqEntity;
    use std::collections::BTreeMap;

    struct Idle;

    impl Scheduler for Idle {
        fn schedule(
            &mut self,
            _entity: &HarqEntity,
            _backlog: &BTreeMap<MacNodeId, usize>,
            _config: &SimConfig,
        ) -> Vec<Grant> {
            Vec::new()
        }
    }

    const ENB: MacNodeId = MacNodeId(1);
    const UE_A: MacNodeId = MacNodeId(2);
    const UE_B: MacNodeId = MacNodeId(3);

    fn cell(config: SimConfig) -> Simulator {
        let mut sim = Simulator::new(config).unwrap();
        sim.add_enb(ENB).unwrap();
        sim.add_ue(UE_A, ENB).unwrap();
        sim.add_ue(UE_B, ENB).unwrap();
        sim
    }

    #[test]
    fn clean_channel_delivers_everything_once() {
        let mut sim = cell(SimConfig::default());
        sim.schedule_app_send(0, ENB, UE_A, 3000);
        sim.schedule_app_send(0, UE_B, ENB, 800);
        sim.run_until_complete().unwrap();

        assert!(sim.is_finished());
        assert_eq!(sim.delivered_bytes(Some(UE_A)), 3000);
        assert_eq!(sim.delivered_bytes(Some(ENB)), 800);
        assert_eq!(sim.retransmissions, 0);
        assert_eq!(sim.transmissions, 3);
        assert_eq!(sim.discarded(), 0);
        assert_eq!(sim.metrics.mean("harqErrorRateDl"), Some(0.0));
    }

    #[test]
    fn corrupted_frame_is_retransmitted() {
        let mut sim = cell(SimConfig::default());
        sim.add_corrupt_next(ENB, UE_A, 1);
        sim.schedule_app_send(0, ENB, UE_A, 100);
        sim.run_until_complete().unwrap();

        assert_eq!(sim.transmissions, 2);
        assert_eq!(sim.retransmissions, 1);
        assert_eq!(sim.delivered.len(), 1);
        assert_eq!(sim.metrics.mean("harqErrorRate_1st_Dl"), Some(1.0));
        assert_eq!(sim.metrics.mean("harqErrorRate_2nd_Dl"), Some(0.0));
    }

    #[test]
    fn exhausted_budget_discards_the_pdu() {
        let mut sim = cell(SimConfig::default());
        sim.add_corrupt_next(UE_A, ENB, 4);
        sim.schedule_app_send(0, UE_A, ENB, 100);
        sim.run_until_complete().unwrap();

        assert!(sim.is_finished());
        assert_eq!(sim.transmissions, 4);
        assert_eq!(sim.discarded(), 1);
        assert!(sim.delivered.is_empty());
        assert_eq!(sim.metrics.count("macPacketLossUl"), 1);
    }

    #[test]
    fn multicast_reaches_every_member_without_feedback() {
        let mut sim = cell(SimConfig::default());
        let group = MacNodeId(100);
        sim.add_ue(MacNodeId(4), ENB).unwrap();
        sim.add_group(group, vec![UE_A, UE_B, MacNodeId(4)]);
        sim.add_corrupt_next(UE_A, MacNodeId(4), 1);
        sim.schedule_app_send(0, UE_A, group, 200);
        sim.run_until_complete().unwrap();

        assert_eq!(sim.transmissions, 1);
        assert_eq!(sim.delivered.len(), 1);
        assert_eq!(sim.delivered[0].node, UE_B);
        assert_eq!(sim.delivered[0].direction, Direction::D2dMulti);
        assert!(
            !sim.link_events
                .iter()
                .any(|e| e.description.contains("ACK"))
        );
    }

    #[test]
    fn long_multicast_burst_reuses_units_safely() {
        let mut sim = cell(SimConfig::default());
        let group = MacNodeId(100);
        sim.add_group(group, vec![UE_A, UE_B]);
        sim.schedule_app_send(0, UE_A, group, 30_000);
        sim.run_until_complete().unwrap();

        assert!(sim.is_finished());
        assert_eq!(sim.delivered_bytes(Some(UE_B)), 30_000);
        assert_eq!(sim.transmissions, 20);
        assert_eq!(sim.retransmissions, 0);
        assert_eq!(sim.discarded(), 0);
    }

    #[test]
    fn degenerate_configs_are_rejected() {
        let zero_grant = SimConfig {
            grant_bytes: 0,
            ..Default::default()
        };
        assert!(Simulator::new(zero_grant).is_err());

        let mut no_processes = SimConfig::default();
        no_processes.harq.processes = 0;
        assert!(Simulator::new(no_processes).is_err());

        let no_grants = SimConfig {
            grants_per_tick: 0,
            ..Default::default()
        };
        assert!(Simulator::new(no_grants).is_err());
    }

    #[test]
    fn detach_releases_pending_state() {
        let mut sim = cell(SimConfig {
            bler_dl: 1.0,
            ..Default::default()
        });
        sim.schedule_app_send(0, ENB, UE_A, 100);
        sim.schedule_detach(2, UE_A);
        sim.run_until_complete().unwrap();

        assert!(sim.is_finished());
        assert!(sim.delivered.is_empty());
        assert!(sim.entity(UE_A).is_none());
        assert!(sim.current_time() < 10);
    }

    #[test]
    fn d2d_mirror_tracks_the_receiver() {
        let mut sim = cell(SimConfig::default());
        sim.add_corrupt_next(UE_A, UE_B, 1);
        sim.schedule_app_send(0, UE_A, UE_B, 100);
        for _ in 0..5 {
            sim.step().unwrap();
        }
        // NACK has been generated at the receiver, retransmission pending
        let table = sim.entity(ENB).unwrap().mirror_table().unwrap();
        assert_eq!(table.corrupted_units(UE_A, UE_B).len(), 1);

        sim.run_until_complete().unwrap();
        assert_eq!(sim.delivered_bytes(Some(UE_B)), 100);
        let table = sim.entity(ENB).unwrap().mirror_table().unwrap();
        assert!(table.corrupted_units(UE_A, UE_B).is_empty());
    }

    #[test]
    fn no_grants_means_nothing_on_the_air() {
        let mut sim = cell(SimConfig {
            max_ticks: 20,
            ..Default::default()
        })
        .with_scheduler(Box::new(Idle));
        sim.schedule_app_send(3, ENB, UE_B, 100);
        assert_eq!(sim.remaining_events(), 1);
        sim.run_until_complete().unwrap();

        assert_eq!(sim.remaining_events(), 0);
        assert_eq!(sim.transmissions, 0);
        assert!(!sim.is_finished());
        assert_eq!(sim.current_time(), 20);
    }
}
