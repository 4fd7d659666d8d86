use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("virtual address {address} is outside the address space 0..{max}")]
    AddressOutOfRange { address: i64, max: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A new address was supplied before the current translation reached `DONE`
    #[error("a translation is already in progress")]
    TranslationInProgress,

    #[error("no translation in progress; supply a virtual address first")]
    Idle,
}
