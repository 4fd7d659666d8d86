use crate::paging::{Ppn, Vpn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlbEntry {
    pub vpn: Vpn,
    pub ppn: Ppn,
}

/// Fully associative cache of VPN to PPN mappings. `None` slots hold nothing.
pub struct Tlb {
    pub entries: Vec<Option<TlbEntry>>,
}

impl Tlb {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: vec![None; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    pub fn lookup(&self, vpn: Vpn) -> Option<(usize, TlbEntry)> {
        self.entries
            .iter()
            .enumerate()
            .find_map(|(slot, entry)| entry.filter(|e| e.vpn == vpn).map(|e| (slot, e)))
    }

    pub fn free_slot(&self) -> Option<usize> {
        let slot = self.entries.iter().position(Option::is_none);
        log::trace!("tlb scan: first free slot {:?}", slot);
        slot
    }

    /// Writes a mapping into `slot`, returning what was there.
    pub fn install(&mut self, slot: usize, vpn: Vpn, ppn: Ppn) -> Option<TlbEntry> {
        self.entries[slot].replace(TlbEntry { vpn, ppn })
    }

    pub fn purge(&mut self, vpn: Vpn) -> Vec<usize> {
        let mut purged = Vec::new();
        for (slot, entry) in self.entries.iter_mut().enumerate() {
            if entry.is_some_and(|e| e.vpn == vpn) {
                *entry = None;
                purged.push(slot);
            }
        }
        purged
    }

    pub fn clear(&mut self) {
        self.entries.iter_mut().for_each(|entry| *entry = None);
    }
}
