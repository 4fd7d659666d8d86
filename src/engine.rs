use std::fmt;

use crate::{
    config::Config,
    error::{Error, Result},
    hardware::{
        mmu::{Mmu, TranslationResult},
        tlb::Tlb,
    },
    memory::FrameTable,
    paging::{PageTable, PhysicalAddress, Ppn, Random, ReplacementPolicy, VirtualAddress},
    snapshot::{Highlights, Snapshot},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VmState {
    SearchTlb,
    TlbHit,
    TlbMiss,
    LookupPageTable,
    PageTableEntryPresent,
    PageFault,
    AllocatePhysicalPage,
    EvictPhysicalPage,
    EvictTlbEntry,
    Done,
}

impl fmt::Display for VmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VmState::SearchTlb => "SEARCH_TLB",
            VmState::TlbHit => "TLB_HIT",
            VmState::TlbMiss => "TLB_MISS",
            VmState::LookupPageTable => "LOOKUP_PAGE_TABLE",
            VmState::PageTableEntryPresent => "PAGE_TABLE_ENTRY_PRESENT",
            VmState::PageFault => "PAGE_FAULT",
            VmState::AllocatePhysicalPage => "ALLOCATE_PHYSICAL_PAGE",
            VmState::EvictPhysicalPage => "EVICT_PHYSICAL_PAGE",
            VmState::EvictTlbEntry => "EVICT_TLB_ENTRY",
            VmState::Done => "DONE",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub from: VmState,
    pub to: VmState,
    pub message: String,
    /// Set only on the `DONE -> SEARCH_TLB` transition.
    pub done: bool,
    pub physical_address: Option<PhysicalAddress>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslationRecord {
    pub virtual_address: VirtualAddress,
    pub physical_address: PhysicalAddress,
    pub tlb_hit: bool,
    pub page_fault: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub translations: u64,
    pub tlb_hits: u64,
    pub tlb_misses: u64,
    pub page_faults: u64,
    pub frame_evictions: u64,
    pub tlb_evictions: u64,
}

impl Stats {
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.tlb_hits + self.tlb_misses;
        if lookups == 0 {
            0.0
        } else {
            (self.tlb_hits as f64 / lookups as f64) * 100.0
        }
    }

    pub fn miss_rate(&self) -> f64 {
        if self.tlb_hits + self.tlb_misses == 0 {
            0.0
        } else {
            100.0 - self.hit_rate()
        }
    }
}

// Scratch state for the translation in flight.
struct Translation {
    va: VirtualAddress,
    ppn: Option<Ppn>,
    free_page: Option<Ppn>,
    tlb_hit: bool,
    page_fault: bool,
}

type CompletionCallback = Box<dyn FnMut(&TranslationRecord)>;

pub struct Engine<P: ReplacementPolicy = Random> {
    config: Config,
    mmu: Mmu,
    tlb: Tlb,
    page_table: PageTable,
    frames: FrameTable,
    highlights: Highlights,
    policy: P,
    state: VmState,
    current: Option<Translation>,
    last: Option<PhysicalAddress>,
    stats: Stats,
    on_complete: Option<CompletionCallback>,
}

impl Engine<Random> {
    pub fn configure(config: Config) -> Result<Self> {
        Self::with_policy(config, Random::new())
    }
}

impl<P: ReplacementPolicy> Engine<P> {
    pub fn with_policy(config: Config, policy: P) -> Result<Self> {
        config.validate()?;
        log::debug!(
            "configuring engine: {} addresses, {} pages of {}, {} TLB slots, {} frames",
            config.max_address_space,
            config.page_table_size(),
            config.page_size,
            config.tlb_capacity,
            config.physical_page_count
        );
        Ok(Self {
            config,
            mmu: Mmu::new(config),
            tlb: Tlb::new(config.tlb_capacity),
            page_table: PageTable::new(config.page_table_size()),
            frames: FrameTable::new(config.physical_page_count),
            highlights: Highlights::new(
                config.tlb_capacity,
                config.page_table_size(),
                config.physical_page_count,
            ),
            policy,
            state: VmState::SearchTlb,
            current: None,
            last: None,
            stats: Stats::default(),
            on_complete: None,
        })
    }

    pub fn on_complete(&mut self, callback: impl FnMut(&TranslationRecord) + 'static) {
        self.on_complete = Some(Box::new(callback));
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> VmState {
        self.state
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn is_idle(&self) -> bool {
        self.current.is_none()
    }

    pub fn current_address(&self) -> Option<VirtualAddress> {
        self.current.as_ref().map(|t| t.va)
    }

    /// Result of the last completed translation; cleared by the next
    /// `begin_translation`.
    pub fn current_physical_address(&self) -> Option<PhysicalAddress> {
        self.last
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.tlb, &self.page_table, &self.frames, &self.highlights)
    }

    /// Starts translating `address`. Rejected addresses leave the engine untouched.
    pub fn begin_translation(&mut self, address: i64) -> Result<VirtualAddress> {
        if self.current.is_some() {
            return Err(Error::TranslationInProgress);
        }
        let max = self.config.max_address_space;
        let address = usize::try_from(address)
            .ok()
            .filter(|&a| a < max)
            .ok_or(Error::AddressOutOfRange { address, max })?;

        let va = self.mmu.decompose(address);
        log::debug!("begin translation of {}", va);
        self.last = None;
        self.highlights.clear();
        self.state = VmState::SearchTlb;
        self.current = Some(Translation {
            va,
            ppn: None,
            free_page: None,
            tlb_hit: false,
            page_fault: false,
        });
        Ok(va)
    }

    pub fn translate(&mut self, address: i64) -> Result<Vec<Step>> {
        self.begin_translation(address)?;
        let mut steps = Vec::new();
        loop {
            let step = self.step()?;
            let done = step.done;
            steps.push(step);
            if done {
                return Ok(steps);
            }
        }
    }

    pub fn reset(&mut self) {
        log::debug!("resetting simulation");
        self.tlb.clear();
        self.page_table.clear();
        self.frames.clear();
        self.highlights.clear();
        self.state = VmState::SearchTlb;
        self.current = None;
        self.last = None;
        self.stats = Stats::default();
    }

    pub fn step(&mut self) -> Result<Step> {
        let mut t = self.current.take().ok_or(Error::Idle)?;
        let from = self.state;
        let vpn = t.va.vpn;

        let (to, message) = match from {
            VmState::SearchTlb => match self.tlb.lookup(vpn) {
                Some(_) => (
                    VmState::TlbHit,
                    format!("Searching the TLB for VPN {}: entry found", vpn),
                ),
                None => (
                    VmState::TlbMiss,
                    format!("Searching the TLB for VPN {}: no entry", vpn),
                ),
            },
            VmState::TlbHit => {
                let (slot, entry) = self
                    .tlb
                    .lookup(vpn)
                    .expect("TLB entry found by the search must still be cached");
                self.highlights.focus_tlb(slot);
                t.ppn = Some(entry.ppn);
                t.tlb_hit = true;
                self.stats.tlb_hits += 1;
                (
                    VmState::Done,
                    format!(
                        "TLB hit: slot {} maps VPN {} to PPN {}",
                        slot, vpn, entry.ppn
                    ),
                )
            }
            VmState::TlbMiss => {
                self.stats.tlb_misses += 1;
                (
                    VmState::LookupPageTable,
                    format!("TLB miss: VPN {} is not cached, consulting the page table", vpn),
                )
            }
            VmState::LookupPageTable => {
                self.highlights.focus_page(vpn);
                match self.mmu.translate(&self.page_table, vpn) {
                    TranslationResult::Success(ppn) => {
                        t.ppn = Some(ppn);
                        (
                            VmState::PageTableEntryPresent,
                            format!("Page table entry {} is present: PPN {}", vpn, ppn),
                        )
                    }
                    TranslationResult::PageFault => {
                        t.page_fault = true;
                        self.stats.page_faults += 1;
                        (
                            VmState::PageFault,
                            format!("Page table entry {} is not present: page fault", vpn),
                        )
                    }
                }
            }
            VmState::PageTableEntryPresent => {
                let ppn = t
                    .ppn
                    .expect("a present page table entry must have resolved a PPN");
                match self.tlb.free_slot() {
                    Some(slot) => {
                        self.tlb.install(slot, vpn, ppn);
                        self.highlights.focus_tlb(slot);
                        (
                            VmState::Done,
                            format!(
                                "Caching VPN {} -> PPN {} in free TLB slot {}",
                                vpn, ppn, slot
                            ),
                        )
                    }
                    None => (
                        VmState::EvictTlbEntry,
                        "TLB is full: an entry must be evicted".to_string(),
                    ),
                }
            }
            VmState::PageFault => match self.frames.get_unassigned() {
                Some(ppn) => {
                    t.free_page = Some(ppn);
                    (
                        VmState::AllocatePhysicalPage,
                        format!("Physical page {} is free", ppn),
                    )
                }
                None => (
                    VmState::EvictPhysicalPage,
                    "Physical memory is full: a page must be evicted".to_string(),
                ),
            },
            VmState::AllocatePhysicalPage => {
                let ppn = t
                    .free_page
                    .take()
                    .expect("allocation requires a free or freshly evicted frame");
                self.frames.assign(ppn, vpn);
                self.page_table.map(vpn, ppn);
                debug_assert_eq!(
                    self.page_table.present_for(ppn).collect::<Vec<_>>(),
                    vec![vpn],
                    "physical page {} must back exactly one present page",
                    ppn
                );
                self.highlights.focus_frame(ppn);
                self.highlights.focus_page(vpn);
                t.ppn = Some(ppn);
                (
                    VmState::PageTableEntryPresent,
                    format!(
                        "Loading VPN {} into physical page {} and marking it present",
                        vpn, ppn
                    ),
                )
            }
            VmState::EvictPhysicalPage => {
                let victim = Ppn(self.policy.pick_victim(self.frames.len()));
                let evicted = self
                    .frames
                    .assign(victim, vpn)
                    .expect("eviction victim must hold a page when memory is full");
                self.page_table.unmap(evicted);
                let purged = self.tlb.purge(evicted);
                self.highlights.focus_frame(victim);
                self.highlights.focus_page(evicted);
                t.free_page = Some(victim);
                self.stats.frame_evictions += 1;
                log::info!(
                    "evicted VPN {} from physical page {}, purged TLB slots {:?}",
                    evicted,
                    victim,
                    purged
                );

                let mut message = format!(
                    "Evicting VPN {} from physical page {} and clearing its present bit",
                    evicted, victim
                );
                if !purged.is_empty() {
                    let slots: Vec<String> = purged.iter().map(usize::to_string).collect();
                    message.push_str(&format!(
                        "; dropping its TLB entry in slot {}",
                        slots.join(", ")
                    ));
                }
                (VmState::AllocatePhysicalPage, message)
            }
            VmState::EvictTlbEntry => {
                let ppn = t
                    .ppn
                    .expect("TLB eviction happens only after the PPN is resolved");
                let slot = self.policy.pick_victim(self.tlb.capacity());
                let old = self
                    .tlb
                    .install(slot, vpn, ppn)
                    .expect("TLB eviction requires a full TLB");
                self.highlights.focus_tlb(slot);
                self.stats.tlb_evictions += 1;
                log::info!("evicted TLB slot {} (VPN {})", slot, old.vpn);
                (
                    VmState::Done,
                    format!(
                        "Evicting TLB slot {} (VPN {}) to cache VPN {} -> PPN {}",
                        slot, old.vpn, vpn, ppn
                    ),
                )
            }
            VmState::Done => {
                let ppn = t.ppn.expect("a finished translation must have a PPN");
                let pa = self.mmu.physical_address(ppn, t.va.vpo);
                self.highlights.clear();
                self.last = Some(pa);
                self.state = VmState::SearchTlb;
                self.stats.translations += 1;
                log::info!("translated {} to {}", t.va, pa);

                let record = TranslationRecord {
                    virtual_address: t.va,
                    physical_address: pa,
                    tlb_hit: t.tlb_hit,
                    page_fault: t.page_fault,
                };
                if let Some(callback) = self.on_complete.as_mut() {
                    callback(&record);
                }
                return Ok(Step {
                    from,
                    to: VmState::SearchTlb,
                    message: String::new(),
                    done: true,
                    physical_address: Some(pa),
                });
            }
        };

        log::debug!("{} -> {}: {}", from, to, message);
        self.state = to;
        self.current = Some(t);
        Ok(Step {
            from,
            to,
            message,
            done: false,
            physical_address: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paging::Vpn;

    struct Fixed(usize);

    impl ReplacementPolicy for Fixed {
        fn pick_victim(&mut self, slots: usize) -> usize {
            self.0 % slots
        }
    }

    fn engine() -> Engine<Fixed> {
        Engine::with_policy(Config::default(), Fixed(0)).unwrap()
    }

    fn path(steps: &[Step]) -> Vec<VmState> {
        steps.iter().map(|s| s.to).collect()
    }

    #[test]
    fn cold_translation_allocates_first_frame() {
        let mut engine = engine();
        let steps = engine.translate(0b01_0011).unwrap();

        assert_eq!(
            path(&steps),
            vec![
                VmState::TlbMiss,
                VmState::LookupPageTable,
                VmState::PageFault,
                VmState::AllocatePhysicalPage,
                VmState::PageTableEntryPresent,
                VmState::Done,
                VmState::SearchTlb,
            ]
        );
        let pa = engine.current_physical_address().unwrap();
        assert_eq!(pa.ppn, Ppn(0));
        assert_eq!(pa.offset, 3);
        assert_eq!(pa.value(), 3);

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.tlb[0].vpn, Some(Vpn(1)));
        assert_eq!(snapshot.page_table[1].ppn, Some(Ppn(0)));
        assert_eq!(snapshot.physical_memory[0].owner, Some(Vpn(1)));
    }

    #[test]
    fn second_translation_hits() {
        let mut engine = engine();
        engine.translate(20).unwrap();
        let steps = engine.translate(21).unwrap();
        assert_eq!(
            path(&steps),
            vec![VmState::TlbHit, VmState::Done, VmState::SearchTlb]
        );
        assert_eq!(engine.stats().tlb_hits, 1);
        assert_eq!(engine.stats().tlb_misses, 1);
        assert_eq!(engine.current_physical_address().unwrap().value(), 5);
    }

    #[test]
    fn every_step_but_the_last_has_a_message() {
        let mut engine = engine();
        let steps = engine.translate(5).unwrap();
        let (last, rest) = steps.split_last().unwrap();
        assert!(rest.iter().all(|s| !s.message.is_empty() && !s.done));
        assert!(last.done);
        assert!(last.message.is_empty());
        assert_eq!(last.from, VmState::Done);
    }

    #[test]
    fn focus_follows_the_walk_and_clears_when_done() {
        let mut engine = engine();
        engine.begin_translation(40).unwrap();
        engine.step().unwrap(); // SEARCH_TLB
        engine.step().unwrap(); // TLB_MISS
        engine.step().unwrap(); // LOOKUP_PAGE_TABLE
        assert_eq!(engine.snapshot().focused_pages(), vec![Vpn(2)]);

        engine.step().unwrap(); // PAGE_FAULT
        engine.step().unwrap(); // ALLOCATE_PHYSICAL_PAGE
        assert_eq!(engine.snapshot().focused_frames(), vec![Ppn(0)]);

        engine.step().unwrap(); // PAGE_TABLE_ENTRY_PRESENT
        assert_eq!(engine.snapshot().focused_tlb_slots(), vec![0]);

        let last = engine.step().unwrap();
        assert!(last.done);
        let snapshot = engine.snapshot();
        assert!(snapshot.focused_tlb_slots().is_empty());
        assert!(snapshot.focused_pages().is_empty());
        assert!(snapshot.focused_frames().is_empty());
    }

    #[test]
    fn rejected_address_leaves_state_untouched() {
        let mut engine = engine();
        engine.translate(10).unwrap();
        let before = engine.snapshot();

        assert_eq!(
            engine.begin_translation(64),
            Err(Error::AddressOutOfRange {
                address: 64,
                max: 64
            })
        );
        assert!(matches!(
            engine.begin_translation(-1),
            Err(Error::AddressOutOfRange { .. })
        ));
        assert_eq!(engine.snapshot(), before);
        assert!(engine.current_physical_address().is_some());
        assert!(engine.is_idle());
    }

    #[test]
    fn step_while_idle_is_an_error() {
        let mut engine = engine();
        assert_eq!(engine.step(), Err(Error::Idle));

        engine.translate(0).unwrap();
        assert_eq!(engine.step(), Err(Error::Idle));
        assert_eq!(engine.state(), VmState::SearchTlb);
    }

    #[test]
    fn begin_during_translation_is_rejected() {
        let mut engine = engine();
        engine.begin_translation(1).unwrap();
        engine.step().unwrap();
        assert_eq!(
            engine.begin_translation(2),
            Err(Error::TranslationInProgress)
        );
        assert_eq!(engine.current_address().unwrap().address, 1);
        assert_eq!(engine.state(), VmState::TlbMiss);
    }

    #[test]
    fn begin_clears_previous_result() {
        let mut engine = engine();
        engine.translate(1).unwrap();
        assert!(engine.current_physical_address().is_some());
        engine.begin_translation(2).unwrap();
        assert!(engine.current_physical_address().is_none());
    }

    #[test]
    fn completion_callback_sees_every_translation() {
        use std::{cell::RefCell, rc::Rc};

        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut engine = engine();
        let sink = Rc::clone(&seen);
        engine.on_complete(move |record| sink.borrow_mut().push(*record));

        engine.translate(17).unwrap();
        engine.translate(18).unwrap();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].page_fault && !seen[0].tlb_hit);
        assert!(seen[1].tlb_hit && !seen[1].page_fault);
        assert_eq!(seen[1].physical_address.value(), 2);
    }

    #[test]
    fn reset_empties_everything() {
        let mut engine = engine();
        engine.translate(1).unwrap();
        engine.begin_translation(33).unwrap();
        engine.step().unwrap();

        engine.reset();
        assert!(engine.is_idle());
        assert_eq!(engine.state(), VmState::SearchTlb);
        assert_eq!(engine.stats(), &Stats::default());
        assert!(engine.current_physical_address().is_none());
        let snapshot = engine.snapshot();
        assert!(snapshot.tlb.iter().all(|row| row.vpn.is_none()));
        assert!(snapshot.page_table.iter().all(|row| !row.present));
        assert!(snapshot.physical_memory.iter().all(|row| row.owner.is_none()));
    }

    #[test]
    fn invalid_config_is_rejected() {
        for config in [
            Config::new(64, 0, 3),
            Config::new(64, usize::MAX, 3),
            Config::new(usize::MAX, 2, 3),
            Config::new(64, 2, usize::MAX),
        ] {
            assert!(matches!(
                Engine::with_policy(config, Fixed(0)),
                Err(Error::InvalidConfig(_))
            ));
        }
        assert!(matches!(
            Engine::with_policy(Config::new(64, 2, 3), Random::seeded(1)),
            Ok(_)
        ));
    }

    #[test]
    fn stats_rates() {
        let stats = Stats {
            tlb_hits: 3,
            tlb_misses: 1,
            ..Stats::default()
        };
        assert_eq!(stats.hit_rate(), 75.0);
        assert_eq!(stats.miss_rate(), 25.0);
        assert_eq!(Stats::default().miss_rate(), 0.0);
    }
}
