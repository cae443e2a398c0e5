//! Contracts and their lifecycle states.

pub mod machine;
pub mod types;

pub use machine::{ContractMachine, ContractTransition};
pub use types::{
    Contract, ContractStatus, CreateContractInput, FinancingType, LotStatus, MAX_TERM_MONTHS,
};
