//! Grant allocation portal core.
//!
//! Budget flows strictly downward, from grant call through cycle pool,
//! tranche, and state allocation to workplan ledger entries. Every
//! committed or pending figure flows back up as a live sum over the
//! append-only commitment ledger. No manager mutates a higher-level
//! entity's budget field; spend exists only as ledger rows summed on
//! read.

pub mod allocations;
pub mod api;
pub mod config;
pub mod db;
pub mod errors;
pub mod grants;
pub mod ledger;
pub mod models;
pub mod mou;
pub mod serials;
pub mod tranches;
pub mod workplans;
