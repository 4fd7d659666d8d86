use crate::{
    config::Config,
    paging::{PageTable, PhysicalAddress, Ppn, VirtualAddress, Vpn},
};

pub struct Mmu {
    config: Config,
}

impl Mmu {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn decompose(&self, address: usize) -> VirtualAddress {
        VirtualAddress::decompose(address, &self.config)
    }

    pub fn translate(&self, page_table: &PageTable, vpn: Vpn) -> TranslationResult {
        let pte = page_table.entry(vpn);

        if !pte.present {
            return TranslationResult::PageFault;
        }

        let ppn = pte
            .ppn
            .expect("present page table entry must record a physical page");
        TranslationResult::Success(ppn)
    }

    pub fn physical_address(&self, ppn: Ppn, offset: usize) -> PhysicalAddress {
        PhysicalAddress {
            ppn,
            offset,
            page_size: self.config.page_size,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationResult {
    Success(Ppn),
    PageFault,
}
