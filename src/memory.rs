use crate::paging::{Ppn, Vpn};

pub struct FrameTable {
    pub entries: Vec<FrameTableEntry>,
}
impl FrameTable {
    pub fn new(frame_count: usize) -> Self {
        let mut entries = Vec::with_capacity(frame_count);
        for idx in 0..frame_count {
            entries.insert(idx, FrameTableEntry::new(Ppn(idx)));
        }
        Self { entries }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get_unassigned(&self) -> Option<Ppn> {
        let pfn = self.entries.iter().position(|frame| frame.is_free());
        log::trace!("frame table scan: first free frame {:?}", pfn);
        pfn.map(Ppn)
    }

    pub fn entry(&self, ppn: Ppn) -> &FrameTableEntry {
        &self.entries[ppn.0]
    }

    /// Binds `ppn` to `vpn` and returns the page it held before, if any.
    pub fn assign(&mut self, ppn: Ppn, vpn: Vpn) -> Option<Vpn> {
        self.entries[ppn.0].assign(vpn)
    }

    pub fn clear(&mut self) {
        self.entries.iter_mut().for_each(FrameTableEntry::clear);
    }
}

pub struct FrameTableEntry {
    pub ppn: Ppn,
    pub owner: Option<Vpn>,
}
impl FrameTableEntry {
    pub fn new(ppn: Ppn) -> Self {
        FrameTableEntry { ppn, owner: None }
    }

    pub fn is_free(&self) -> bool {
        self.owner.is_none()
    }

    pub fn clear(&mut self) {
        self.owner = None;
    }

    pub fn assign(&mut self, vpn: Vpn) -> Option<Vpn> {
        self.owner.replace(vpn)
    }
}
