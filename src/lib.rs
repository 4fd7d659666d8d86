pub mod config;
pub mod engine;
pub mod error;
pub mod hardware;
pub mod memory;
pub mod paging;
pub mod snapshot;
pub mod workload;

pub use config::Config;
pub use engine::{Engine, Stats, Step, TranslationRecord, VmState};
pub use error::{Error, Result};
pub use paging::{PhysicalAddress, Ppn, Random, ReplacementPolicy, VirtualAddress, Vpn};
pub use snapshot::Snapshot;
