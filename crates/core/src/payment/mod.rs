//! Payments and their lifecycle states.

pub mod machine;
pub mod types;

pub use machine::{PaymentMachine, PaymentTransition};
pub use types::{Payment, PaymentStatus, PaymentType};
