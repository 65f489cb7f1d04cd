use harq_lab_abstract::{
    Codeword, Direction, HarqError, HarqResult, MAX_CODEWORDS, MacNodeId, MacPdu, ProcessId,
    UnitId,
};

use crate::policy::StatsTags;
use crate::tx::unit::{HarqUnitTx, TxStatus};

/// One transmit process: a unit per codeword, all sharing the acid.
#[derive(Debug)]
pub struct HarqProcessTx {
    acid: ProcessId,
    units: [HarqUnitTx; MAX_CODEWORDS],
}

impl HarqProcessTx {
    pub(crate) fn new(
        acid: ProcessId,
        peer: MacNodeId,
        direction: Direction,
        max_harq_rtx: u8,
        tags: StatsTags,
    ) -> Self {
        let units = std::array::from_fn(|cw| {
            HarqUnitTx::new(
                UnitId::new(acid, cw as Codeword),
                peer,
                direction,
                max_harq_rtx,
                tags,
            )
        });
        Self { acid, units }
    }

    pub fn acid(&self) -> ProcessId {
        self.acid
    }

    pub fn units(&self) -> &[HarqUnitTx] {
        &self.units
    }

    pub fn unit(&self, codeword: Codeword) -> HarqResult<&HarqUnitTx> {
        self.units
            .get(codeword as usize)
            .ok_or(HarqError::UnknownUnit(UnitId::new(self.acid, codeword)))
    }

    pub fn unit_mut(&mut self, codeword: Codeword) -> HarqResult<&mut HarqUnitTx> {
        let acid = self.acid;
        self.units
            .get_mut(codeword as usize)
            .ok_or(HarqError::UnknownUnit(UnitId::new(acid, codeword)))
    }

    /// Codewords NACKed and waiting for a retransmission grant.
    pub fn ready_units(&self) -> Vec<Codeword> {
        self.codewords_in(TxStatus::Buffered)
    }

    pub fn empty_units(&self) -> Vec<Codeword> {
        self.codewords_in(TxStatus::Empty)
    }

    pub fn selected_units(&self) -> Vec<Codeword> {
        self.codewords_in(TxStatus::Selected)
    }

    fn codewords_in(&self, status: TxStatus) -> Vec<Codeword> {
        self.units
            .iter()
            .filter(|u| u.status() == status)
            .map(|u| u.id().codeword)
            .collect()
    }

    pub fn has_ready_units(&self) -> bool {
        self.units.iter().any(HarqUnitTx::is_ready)
    }

    /// The process can take new data only when every codeword is free.
    pub fn is_empty(&self) -> bool {
        self.units.iter().all(HarqUnitTx::is_empty)
    }

    pub fn is_waiting(&self) -> bool {
        self.units.iter().any(|u| u.status() == TxStatus::Waiting)
    }

    /// PDUs currently held by the process.
    pub fn buffered_pdus(&self) -> usize {
        self.units.iter().filter(|u| u.pdu().is_some()).count()
    }

    /// Release every codeword, returning the PDUs that were held.
    pub fn force_drop(&mut self) -> Vec<MacPdu> {
        self.units
            .iter_mut()
            .filter_map(HarqUnitTx::force_release)
            .collect()
    }

    pub fn status(&self) -> [TxStatus; MAX_CODEWORDS] {
        std::array::from_fn(|cw| self.units[cw].status())
    }
}
