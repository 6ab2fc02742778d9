// src/services/address.rs

//! Address normalization and range expansion.
//!
//! Upstream addresses are free text. One drawing may document several
//! buildings, written either as `"Fossháls 13-15 - Dragháls 14-16"` or
//! `"Thorvaldsenstræti 2-6/Aðalstræti 11"`, and a numeric range covers
//! one side of the street, so `"Ljósaland 1-25"` means every odd number
//! from 1 to 25.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::AddressKey;

/// Ranges expanding to more keys than this are kept verbatim.
pub const MAX_RANGE_EXPANSION: u32 = 1000;

static RANGE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<street>.*) (?P<start>[0-9]+)-(?P<end>[0-9]+)")
        .expect("range pattern is a valid regex")
});

/// Parse a raw address into the set of individual address keys it covers.
///
/// Never fails: input that matches no rule comes back trimmed and
/// whitespace-collapsed as a single key.
pub fn parse_address(address: &str) -> BTreeSet<AddressKey> {
    let parts: Vec<&str> = if address.contains(" - ") {
        address.split(" - ").collect()
    } else if address.contains('/') {
        address.split('/').collect()
    } else {
        vec![address]
    };

    let mut keys = BTreeSet::new();
    for part in parts {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        match expand_range(part) {
            Some(expanded) => keys.extend(expanded),
            None => {
                keys.insert(single_space(part));
            }
        }
    }
    keys
}

/// Expand `"<street> <start>-<end>"` into same-parity house numbers.
///
/// Returns `None` when the sub-address is not a range and should be
/// emitted unchanged.
fn expand_range(part: &str) -> Option<Vec<AddressKey>> {
    let caps = RANGE_PATTERN.captures(part)?;
    let street = single_space(&caps["street"]);
    let start: u32 = caps["start"].parse().ok()?;
    let end: u32 = caps["end"].parse().ok()?;

    if end >= start && (end - start) / 2 >= MAX_RANGE_EXPANSION {
        log::warn!("Range too wide to expand, keeping verbatim: `{part}`");
        return None;
    }

    warn_on_spaced_street(&street, part);

    let expanded = (start..=end)
        .step_by(2)
        .map(|n| format!("{street} {n}"))
        .collect();
    Some(expanded)
}

/// Warn when a range's street name holds a space; such ranges often
/// swallow a second address. Returns whether it warned.
fn warn_on_spaced_street(street: &str, part: &str) -> bool {
    let spaced = street.contains(' ');
    if spaced {
        log::warn!("Space found in street name: `{street}` (from `{part}`)");
    }
    spaced
}

/// Collapse runs of whitespace into single spaces and trim the ends.
pub fn single_space(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_odd_range() {
        let expected: BTreeSet<String> =
            (1..=25).step_by(2).map(|n| format!("Ljósaland {n}")).collect();
        assert_eq!(parse_address("Ljósaland 1-25"), expected);
    }

    #[test]
    fn test_even_range() {
        assert_eq!(
            parse_address("Dragháls 18-26"),
            keys(&[
                "Dragháls 18",
                "Dragháls 20",
                "Dragháls 22",
                "Dragháls 24",
                "Dragháls 26"
            ])
        );
    }

    #[test]
    fn test_spaced_street_range_still_expands() {
        assert!(warn_on_spaced_street("Efri Brú", "Efri Brú 1-3"));
        assert!(!warn_on_spaced_street("Ljósaland", "Ljósaland 1-25"));
        assert_eq!(
            parse_address("Efri  Brú 1-3"),
            keys(&["Efri Brú 1", "Efri Brú 3"])
        );
    }

    #[test]
    fn test_single_address() {
        assert_eq!(parse_address("Klapparstígur 1"), keys(&["Klapparstígur 1"]));
    }

    #[test]
    fn test_dash_separated_halves_are_parsed_independently() {
        assert_eq!(
            parse_address("A 1-2 - B 3-4"),
            keys(&["A 1", "B 3"])
        );
        assert_eq!(
            parse_address("Fossháls 13-15 - Dragháls 14-16"),
            keys(&["Dragháls 14", "Dragháls 16", "Fossháls 13", "Fossháls 15"])
        );
    }

    #[test]
    fn test_slash_separated() {
        assert_eq!(
            parse_address("Thorvaldsenstræti 2-6/Aðalstræti 11"),
            keys(&[
                "Aðalstræti 11",
                "Thorvaldsenstræti 2",
                "Thorvaldsenstræti 4",
                "Thorvaldsenstræti 6"
            ])
        );
    }

    #[test]
    fn test_whitespace_variants_share_a_key() {
        assert_eq!(parse_address("A  1"), keys(&["A 1"]));
        assert_eq!(parse_address(" A 1 "), keys(&["A 1"]));
        assert_eq!(parse_address("Lauga  vegur 1-3"), keys(&["Lauga vegur 1", "Lauga vegur 3"]));
    }

    #[test]
    fn test_descending_range_is_empty() {
        assert!(parse_address("Gata 7-3").is_empty());
    }

    #[test]
    fn test_trailing_text_after_range_is_dropped() {
        // The match is anchored at the start only.
        assert_eq!(
            parse_address("Básbryggja 19-21 Naustabryggja 24"),
            keys(&["Básbryggja 19", "Básbryggja 21"])
        );
    }

    #[test]
    fn test_malformed_input_is_kept_verbatim() {
        assert_eq!(parse_address("Gullengi 11*"), keys(&["Gullengi 11*"]));
        assert_eq!(parse_address("Klapparstígur 1- 7"), keys(&["Klapparstígur 1- 7"]));
        assert_eq!(parse_address("Hæðargarður 27 A"), keys(&["Hæðargarður 27 A"]));
    }

    #[test]
    fn test_case_is_preserved() {
        assert_eq!(
            parse_address("Laugavegur 60A/Laugavegur 60a"),
            keys(&["Laugavegur 60A", "Laugavegur 60a"])
        );
    }

    #[test]
    fn test_huge_range_is_not_expanded() {
        assert_eq!(parse_address("Gata 1-99999"), keys(&["Gata 1-99999"]));
    }

    #[test]
    fn test_empty_parts_are_dropped() {
        assert!(parse_address("   ").is_empty());
        assert_eq!(parse_address("Gata 1/"), keys(&["Gata 1"]));
    }
}
