use std::fmt;

use crate::{
    hardware::tlb::Tlb,
    memory::FrameTable,
    paging::{PageTable, Ppn, Vpn},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Highlights {
    pub tlb: Vec<bool>,
    pub page_table: Vec<bool>,
    pub frames: Vec<bool>,
}

impl Highlights {
    pub fn new(tlb_capacity: usize, page_table_size: usize, frame_count: usize) -> Self {
        Self {
            tlb: vec![false; tlb_capacity],
            page_table: vec![false; page_table_size],
            frames: vec![false; frame_count],
        }
    }

    pub fn focus_tlb(&mut self, slot: usize) {
        self.tlb[slot] = true;
    }

    pub fn focus_page(&mut self, vpn: Vpn) {
        self.page_table[vpn.0] = true;
    }

    pub fn focus_frame(&mut self, ppn: Ppn) {
        self.frames[ppn.0] = true;
    }

    pub fn clear(&mut self) {
        for flag in self
            .tlb
            .iter_mut()
            .chain(self.page_table.iter_mut())
            .chain(self.frames.iter_mut())
        {
            *flag = false;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlbRow {
    pub vpn: Option<Vpn>,
    pub ppn: Option<Ppn>,
    pub focused: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageTableRow {
    pub ppn: Option<Ppn>,
    pub present: bool,
    pub focused: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRow {
    pub ppn: Ppn,
    pub owner: Option<Vpn>,
    pub focused: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub tlb: Vec<TlbRow>,
    pub page_table: Vec<PageTableRow>,
    pub physical_memory: Vec<FrameRow>,
}

impl Snapshot {
    pub(crate) fn capture(
        tlb: &Tlb,
        page_table: &PageTable,
        frames: &FrameTable,
        highlights: &Highlights,
    ) -> Self {
        let tlb = tlb
            .entries
            .iter()
            .zip(&highlights.tlb)
            .map(|(entry, &focused)| TlbRow {
                vpn: entry.map(|e| e.vpn),
                ppn: entry.map(|e| e.ppn),
                focused,
            })
            .collect();

        let page_table = page_table
            .entries
            .iter()
            .zip(&highlights.page_table)
            .map(|(pte, &focused)| PageTableRow {
                ppn: pte.ppn,
                present: pte.present,
                focused,
            })
            .collect();

        let physical_memory = frames
            .entries
            .iter()
            .zip(&highlights.frames)
            .map(|(frame, &focused)| FrameRow {
                ppn: frame.ppn,
                owner: frame.owner,
                focused,
            })
            .collect();

        Self {
            tlb,
            page_table,
            physical_memory,
        }
    }

    pub fn focused_tlb_slots(&self) -> Vec<usize> {
        focused_indices(self.tlb.iter().map(|row| row.focused))
    }

    pub fn focused_pages(&self) -> Vec<Vpn> {
        focused_indices(self.page_table.iter().map(|row| row.focused))
            .into_iter()
            .map(Vpn)
            .collect()
    }

    pub fn focused_frames(&self) -> Vec<Ppn> {
        focused_indices(self.physical_memory.iter().map(|row| row.focused))
            .into_iter()
            .map(Ppn)
            .collect()
    }
}

fn focused_indices(flags: impl Iterator<Item = bool>) -> Vec<usize> {
    flags
        .enumerate()
        .filter(|(_, focused)| *focused)
        .map(|(idx, _)| idx)
        .collect()
}

fn cell<T: fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn marker(focused: bool) -> &'static str {
    if focused { "*" } else { " " }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "TLB")?;
        writeln!(f, "|   | {:<4} | {:<6} | {:<6} |", "#", "VPN", "PPN")?;
        writeln!(f, "| - | {:-<4} | {:-<6} | {:-<6} |", "-", "-", "-")?;
        for (slot, row) in self.tlb.iter().enumerate() {
            writeln!(
                f,
                "| {} | {:<4} | {:<6} | {:<6} |",
                marker(row.focused),
                slot,
                cell(row.vpn),
                cell(row.ppn)
            )?;
        }
        writeln!(f)?;

        writeln!(f, "Page Table")?;
        writeln!(f, "|   | {:<4} | {:<7} | {:<6} |", "VPN", "Present", "PPN")?;
        writeln!(f, "| - | {:-<4} | {:-<7} | {:-<6} |", "-", "-", "-")?;
        for (vpn, row) in self.page_table.iter().enumerate() {
            writeln!(
                f,
                "| {} | {:<4} | {:<7} | {:<6} |",
                marker(row.focused),
                vpn,
                u8::from(row.present),
                cell(row.ppn)
            )?;
        }
        writeln!(f)?;

        writeln!(f, "Physical Memory")?;
        writeln!(f, "|   | {:<4} | {:<6} |", "PPN", "VPN")?;
        writeln!(f, "| - | {:-<4} | {:-<6} |", "-", "-")?;
        for row in &self.physical_memory {
            writeln!(
                f,
                "| {} | {:<4} | {:<6} |",
                marker(row.focused),
                row.ppn,
                cell(row.owner)
            )?;
        }
        Ok(())
    }
}
