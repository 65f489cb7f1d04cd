use bytes::Bytes;
use harq_lab_abstract::{Direction, HarqConfig, MacNodeId, MacPdu, PduId, StaticDirectory, Tick};

pub const ENB: MacNodeId = MacNodeId(1);
pub const UE_A: MacNodeId = MacNodeId(2);
pub const UE_B: MacNodeId = MacNodeId(3);
pub const GROUP: MacNodeId = MacNodeId(100);

/// One cell with two UEs and a multicast group containing both.
pub fn directory() -> StaticDirectory {
    let mut dir = StaticDirectory::new();
    dir.register_enb(ENB);
    dir.register_ue(UE_A, ENB);
    dir.register_ue(UE_B, ENB);
    dir.register_group(GROUP, vec![UE_A, UE_B]);
    dir
}

pub fn config() -> HarqConfig {
    HarqConfig {
        processes: 4,
        max_harq_rtx: 3,
        fb_evaluation_interval: 3,
    }
}

pub fn pdu(
    id: PduId,
    source: MacNodeId,
    dest: MacNodeId,
    direction: Direction,
    created_at: Tick,
    len: usize,
) -> MacPdu {
    MacPdu::new(
        id,
        source,
        dest,
        direction,
        created_at,
        Bytes::from(vec![id as u8; len]),
    )
}
