use crate::serial::{GrantSerial, SerialError};

#[test]
fn test_format_base_only() {
    let s = GrantSerial::base("LCC-ABC-KA-0125-0001");
    assert_eq!(s.to_string(), "LCC-ABC-KA-0125-0001");
}

#[test]
fn test_format_with_suffix_pads_to_three_digits() {
    let s = GrantSerial::with_suffix("LCC-ABC-KA-0125-0001", 7).unwrap();
    assert_eq!(s.to_string(), "LCC-ABC-KA-0125-0001-007");
}

#[test]
fn test_suffix_out_of_range_rejected() {
    assert_eq!(
        GrantSerial::with_suffix("LCC-ABC-KA-0125-0001", 1_000),
        Err(SerialError::SuffixOutOfRange(1_000))
    );
    assert_eq!(
        GrantSerial::with_suffix("LCC-ABC-KA-0125-0001", 0),
        Err(SerialError::SuffixOutOfRange(0))
    );
}

#[test]
fn test_parse_strips_three_digit_workplan_suffix() {
    let s = GrantSerial::parse("LCC-ABC-KA-0125-0001-003").unwrap();
    assert_eq!(s.base, "LCC-ABC-KA-0125-0001");
    assert_eq!(s.suffix, Some(3));
}

#[test]
fn test_parse_preserves_four_digit_base_sequence() {
    // The trailing 4-digit segment is the base serial's own sequence,
    // not a workplan suffix.
    let s = GrantSerial::parse("LCC-ABC-KA-0125-0001").unwrap();
    assert_eq!(s.base, "LCC-ABC-KA-0125-0001");
    assert_eq!(s.suffix, None);
}

#[test]
fn test_parse_round_trips_through_display() {
    for raw in ["LCC-ABC-KA-0125-0001", "LCC-ABC-KA-0125-0001-042"] {
        let s = GrantSerial::parse(raw).unwrap();
        assert_eq!(s.to_string(), raw);
    }
}

#[test]
fn test_parse_rejects_empty() {
    assert_eq!(GrantSerial::parse("  "), Err(SerialError::Empty));
}

#[test]
fn test_parse_never_minted_zero_suffix_stays_in_base() {
    let s = GrantSerial::parse("LCC-ABC-KA-0125-000").unwrap();
    assert_eq!(s.base, "LCC-ABC-KA-0125-000");
    assert_eq!(s.suffix, None);
}
