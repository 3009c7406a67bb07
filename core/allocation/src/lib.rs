//! # Allocation Core
//!
//! Pure domain logic shared by the grant allocation portal. Nothing in
//! this crate performs I/O; the portal backend owns persistence and
//! calls into these helpers before every status write or budget check.
//!
//! | Concern              | Module       |
//! |----------------------|--------------|
//! | Lifecycle enums      | [`types`]    |
//! | Transition validity  | [`fsm`]      |
//! | Grant serials        | [`serial`]   |
//! | Budget arithmetic    | [`split`]    |

pub mod fsm;
pub mod serial;
pub mod split;
pub mod types;

#[cfg(test)]
mod invariants;
#[cfg(test)]
mod test_fsm;
#[cfg(test)]
mod test_serial;
#[cfg(test)]
mod test_split;

pub use serial::GrantSerial;
pub use types::{FundingStatus, GrantCallStatus, TrancheStatus, WorkplanStatus};
