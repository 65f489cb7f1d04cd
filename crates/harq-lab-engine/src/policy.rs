use harq_lab_abstract::{Direction, HarqError, HarqResult, MacNodeId, NodeDirectory, NodeKind};

/// Behavioural variant of an H-ARQ flow. Unicast cellular and D2D flows
/// share the state machines; they differ only in the hooks below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    Cellular,
    D2dUnicast,
    /// No return channel: no feedback, no retransmissions.
    D2dMulticast,
}

impl FlowKind {
    pub fn from_direction(direction: Direction) -> Self {
        match direction {
            Direction::Dl | Direction::Ul => FlowKind::Cellular,
            Direction::D2d => FlowKind::D2dUnicast,
            Direction::D2dMulti => FlowKind::D2dMulticast,
        }
    }

    /// Receiver emits ACK/NACK for this flow.
    pub fn sends_feedback(&self) -> bool {
        !matches!(self, FlowKind::D2dMulticast)
    }

    /// Receiver duplicates its feedback towards the serving eNB.
    pub fn mirrors_feedback(&self) -> bool {
        matches!(self, FlowKind::D2dUnicast)
    }

    /// A NACKed codeword stays CORRUPTED waiting for a retransmission.
    pub fn retains_corrupted(&self) -> bool {
        self.sends_feedback()
    }

    /// Transmitter keeps the PDU after extraction until feedback arrives.
    pub fn awaits_feedback(&self) -> bool {
        self.sends_feedback()
    }
}

/// Direction of the flow from `owner` towards `peer`.
pub fn resolve_direction(
    directory: &dyn NodeDirectory,
    owner: MacNodeId,
    peer: MacNodeId,
) -> HarqResult<Direction> {
    let owner_kind = directory
        .node_kind(owner)
        .ok_or(HarqError::UnregisteredNode(owner))?;

    if directory.is_multicast_group(peer) {
        return Ok(Direction::D2dMulti);
    }

    let peer_kind = directory
        .node_kind(peer)
        .ok_or(HarqError::UnregisteredNode(peer))?;

    Ok(match (owner_kind, peer_kind) {
        (NodeKind::Enb, _) => Direction::Dl,
        (NodeKind::Ue, NodeKind::Enb) => Direction::Ul,
        (NodeKind::Ue, NodeKind::Ue) => Direction::D2d,
    })
}

/// Nodes that receive statistics for a link: the UE side of the link and
/// the eNB serving it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StatsTags {
    pub ue: MacNodeId,
    pub cell: MacNodeId,
}

impl StatsTags {
    /// `owner` sends or receives on a link with `peer`.
    pub fn resolve(
        directory: &dyn NodeDirectory,
        owner: MacNodeId,
        peer: MacNodeId,
    ) -> HarqResult<Self> {
        let owner_kind = directory
            .node_kind(owner)
            .ok_or(HarqError::UnregisteredNode(owner))?;
        match owner_kind {
            NodeKind::Enb => Ok(Self {
                ue: peer,
                cell: owner,
            }),
            NodeKind::Ue => Ok(Self {
                ue: owner,
                cell: directory
                    .serving_cell(owner)
                    .ok_or(HarqError::UnregisteredNode(owner))?,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::directory;

    #[test]
    fn directions_follow_node_roles() {
        let dir = directory();
        let enb = MacNodeId(1);
        let ue_a = MacNodeId(2);
        let ue_b = MacNodeId(3);
        let group = MacNodeId(100);

        assert_eq!(resolve_direction(&dir, enb, ue_a), Ok(Direction::Dl));
        assert_eq!(resolve_direction(&dir, ue_a, enb), Ok(Direction::Ul));
        assert_eq!(resolve_direction(&dir, ue_a, ue_b), Ok(Direction::D2d));
        assert_eq!(resolve_direction(&dir, ue_a, group), Ok(Direction::D2dMulti));
        assert_eq!(
            resolve_direction(&dir, ue_a, MacNodeId(42)),
            Err(HarqError::UnregisteredNode(MacNodeId(42)))
        );
    }

    #[test]
    fn multicast_suppresses_feedback_and_mirroring() {
        let kind = FlowKind::from_direction(Direction::D2dMulti);
        assert!(!kind.sends_feedback());
        assert!(!kind.mirrors_feedback());
        assert!(!kind.retains_corrupted());

        let kind = FlowKind::from_direction(Direction::D2d);
        assert!(kind.sends_feedback());
        assert!(kind.mirrors_feedback());

        assert!(!FlowKind::from_direction(Direction::Ul).mirrors_feedback());
    }

    #[test]
    fn stats_go_to_the_ue_side_and_its_cell() {
        let dir = directory();
        let tags = StatsTags::resolve(&dir, MacNodeId(1), MacNodeId(2)).unwrap();
        assert_eq!(tags, StatsTags { ue: MacNodeId(2), cell: MacNodeId(1) });
        let tags = StatsTags::resolve(&dir, MacNodeId(3), MacNodeId(2)).unwrap();
        assert_eq!(tags, StatsTags { ue: MacNodeId(3), cell: MacNodeId(1) });
    }
}
