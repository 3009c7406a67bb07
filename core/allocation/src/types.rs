//! Lifecycle enums for every entity the portal tracks.
//!
//! Each enum round-trips through the short identifier string stored in
//! the database (`as_str` / `parse`). `parse` returns `None` for
//! unrecognised values so callers can surface a typed error instead of
//! panicking on corrupt rows.

use serde::{Deserialize, Serialize};

/// Lifecycle of a donor grant call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantCallStatus {
    /// Accepting inclusions into funding cycles.
    Open,
    /// Donor funding period ended; no new inclusions.
    Closed,
}

impl GrantCallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

/// Lifecycle of a tranche within a funding cycle.
///
/// Forward-only: `planned → open → closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrancheStatus {
    Planned,
    Open,
    Closed,
}

impl TrancheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "planned" => Some(Self::Planned),
            "open" => Some(Self::Open),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

/// Content/approval status of a workplan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkplanStatus {
    /// Submitted or sent back for revision.
    Pending,
    /// Approved by the review board.
    Approved,
    /// Terminal rejection.
    Declined,
}

impl WorkplanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Declined => "declined",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "declined" => Some(Self::Declined),
            _ => None,
        }
    }
}

/// Funding status of a workplan, the budget-consuming side channel.
///
/// `unassigned → allocated → committed`; a committed workplan only
/// leaves that state through a full ledger reversal on deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundingStatus {
    Unassigned,
    Allocated,
    Committed,
}

impl FundingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unassigned => "unassigned",
            Self::Allocated => "allocated",
            Self::Committed => "committed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unassigned" => Some(Self::Unassigned),
            "allocated" => Some(Self::Allocated),
            "committed" => Some(Self::Committed),
            _ => None,
        }
    }
}
