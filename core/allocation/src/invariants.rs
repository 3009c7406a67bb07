#![allow(dead_code)]

//! Invariant assertions used by the test modules. Each takes plain
//! numbers or slices so tests can check a snapshot without touching
//! storage.

/// INV-1: the sum of inclusions drawn from a grant call never exceeds
/// its total amount.
pub fn assert_inclusions_within_call(call_amount: i64, inclusions: &[i64]) {
    let drawn: i64 = inclusions.iter().sum();
    assert!(
        drawn <= call_amount,
        "INV-1 violated: {drawn} drawn from a call of {call_amount}"
    );
}

/// INV-2: state allocations within a tranche never exceed its
/// effective cap.
pub fn assert_allocations_within_cap(effective_cap: i64, allocations: &[i64]) {
    let allocated: i64 = allocations.iter().sum();
    assert!(
        allocated <= effective_cap,
        "INV-2 violated: {allocated} allocated against an effective cap of {effective_cap}"
    );
}

/// INV-3: committed never exceeds the allocation amount.
pub fn assert_committed_within_amount(amount: i64, committed: i64) {
    assert!(
        committed <= amount,
        "INV-3 violated: committed {committed} exceeds allocation {amount}"
    );
}

/// INV-4: an equal split always sums back to the original total.
pub fn assert_split_lossless(total: i64, slices: &[i64]) {
    let sum: i64 = slices.iter().sum();
    assert_eq!(
        sum, total,
        "INV-4 violated: split of {total} sums to {sum}"
    );
}
