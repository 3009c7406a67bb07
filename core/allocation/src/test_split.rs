use crate::invariants;
use crate::split::{carryover_cap, equal_split};

#[test]
fn test_equal_split_divides_evenly() {
    assert_eq!(equal_split(9_000, 3), vec![3_000, 3_000, 3_000]);
}

#[test]
fn test_equal_split_residual_goes_to_last() {
    assert_eq!(equal_split(10_000, 3), vec![3_333, 3_333, 3_334]);
    assert_eq!(equal_split(7, 4), vec![1, 1, 1, 4]);
}

#[test]
fn test_equal_split_never_loses_cents() {
    for total in [0i64, 1, 99, 10_000, 1_234_567] {
        for parts in 1..=7u32 {
            invariants::assert_split_lossless(total, &equal_split(total, parts));
        }
    }
}

#[test]
fn test_equal_split_zero_parts_is_empty() {
    assert!(equal_split(10_000, 0).is_empty());
}

#[test]
fn test_equal_split_single_part_takes_all() {
    assert_eq!(equal_split(10_000, 1), vec![10_000]);
}

#[test]
fn test_carryover_cap_rolls_forward_unallocated_balance() {
    // Tranche 1 planned 10,000 but only 6,000 allocated before closing;
    // tranche 2 planned 5,000 → effective cap 9,000.
    assert_eq!(carryover_cap(10_000 + 5_000, 6_000), 9_000);
}

#[test]
fn test_carryover_cap_first_tranche_has_no_carryover() {
    assert_eq!(carryover_cap(10_000, 0), 10_000);
}

#[test]
fn test_carryover_cap_fully_allocated_prior_adds_nothing() {
    assert_eq!(carryover_cap(10_000 + 5_000, 10_000), 5_000);
}
