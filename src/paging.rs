use std::fmt;

use rand::{Rng, SeedableRng, rngs::StdRng, rngs::ThreadRng};

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Vpn(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ppn(pub usize);

impl fmt::Display for Vpn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Ppn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualAddress {
    pub address: usize,
    pub vpn: Vpn,
    pub vpo: usize,
    vpn_bits: u32,
    offset_bits: u32,
}

impl VirtualAddress {
    /// Callers must have checked `address < config.max_address_space`.
    pub fn decompose(address: usize, config: &Config) -> Self {
        let vpn = (address >> config.offset_bits()) % config.page_table_size();
        let vpo = address & config.offset_mask();
        Self {
            address,
            vpn: Vpn(vpn),
            vpo,
            vpn_bits: config.vpn_bits(),
            offset_bits: config.offset_bits(),
        }
    }

    pub fn vpn_bits_string(&self) -> String {
        format!("{:0width$b}", self.vpn.0, width = self.vpn_bits as usize)
    }

    pub fn vpo_bits_string(&self) -> String {
        format!("{:0width$b}", self.vpo, width = self.offset_bits as usize)
    }
}

impl fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "VA {} = VPN {} | VPO {} ({} {})",
            self.address,
            self.vpn,
            self.vpo,
            self.vpn_bits_string(),
            self.vpo_bits_string()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysicalAddress {
    pub ppn: Ppn,
    pub offset: usize,
    pub page_size: usize,
}

impl PhysicalAddress {
    pub fn value(&self) -> usize {
        self.ppn.0 * self.page_size + self.offset
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PA {} = PPN {} | offset {}", self.value(), self.ppn, self.offset)
    }
}

pub struct PageTable {
    pub entries: Vec<PageTableEntry>,
}
impl PageTable {
    pub fn new(page_count: usize) -> Self {
        let mut entries = Vec::with_capacity(page_count);
        for _ in 0..page_count {
            entries.push(PageTableEntry::new());
        }
        Self { entries }
    }

    pub fn entry(&self, vpn: Vpn) -> &PageTableEntry {
        &self.entries[vpn.0]
    }

    pub fn map(&mut self, vpn: Vpn, ppn: Ppn) {
        let pte = &mut self.entries[vpn.0];
        pte.ppn = Some(ppn);
        pte.present = true;
    }

    pub fn unmap(&mut self, vpn: Vpn) {
        let pte = &mut self.entries[vpn.0];
        pte.ppn = None;
        pte.present = false;
    }

    /// Virtual pages currently backed by `ppn`.
    pub fn present_for(&self, ppn: Ppn) -> impl Iterator<Item = Vpn> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(move |(_, pte)| pte.present && pte.ppn == Some(ppn))
            .map(|(vpn, _)| Vpn(vpn))
    }

    pub fn clear(&mut self) {
        self.entries.iter_mut().for_each(|pte| *pte = PageTableEntry::new());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageTableEntry {
    pub ppn: Option<Ppn>,
    pub present: bool,
}
impl PageTableEntry {
    pub fn new() -> Self {
        Self {
            ppn: None,
            present: false,
        }
    }
}

impl Default for PageTableEntry {
    fn default() -> Self {
        Self::new()
    }
}

pub trait ReplacementPolicy {
    fn pick_victim(&mut self, slots: usize) -> usize;
}

pub struct Random<R: Rng = ThreadRng> {
    rng: R,
}

impl Random<ThreadRng> {
    pub fn new() -> Self {
        Self { rng: rand::rng() }
    }
}

impl Default for Random<ThreadRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl Random<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl<R: Rng> ReplacementPolicy for Random<R> {
    fn pick_victim(&mut self, slots: usize) -> usize {
        assert!(slots > 0, "cannot pick a victim among zero slots");
        self.rng.random_range(0..slots)
    }
}
