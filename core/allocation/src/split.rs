//! Integer budget arithmetic.
//!
//! All amounts are i64 minor units; nothing here rounds or loses cents.

/// Divide `total` into `parts` slices: floor division with the residual
/// assigned to the last slice, so the slices always sum to `total`.
pub fn equal_split(total: i64, parts: u32) -> Vec<i64> {
    if parts == 0 {
        return Vec::new();
    }
    let parts = parts as i64;
    let each = total / parts;
    let mut out = vec![each; parts as usize];
    // Residual correction lands on the last tranche.
    out[parts as usize - 1] = total - each * (parts - 1);
    out
}

/// Effective cap of tranche N under the carryover rule:
/// the cumulative planned cap of tranches 1..=N minus everything already
/// allocated against tranches 1..N-1. Carryover is computed from
/// *allocated* amounts, so allocated-but-uncommitted money in a closed
/// tranche does not roll forward.
pub fn carryover_cap(planned_through: i64, allocated_prior: i64) -> i64 {
    planned_through - allocated_prior
}
