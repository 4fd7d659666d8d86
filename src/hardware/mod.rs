pub mod mmu;
pub mod tlb;
