//! Mapping from internal set identifiers to the external catalogue dialect
//!
//! The catalogue service uses its own set naming. Most sets follow a
//! mechanical rule, but a handful diverge; those live in one exception table
//! checked before the rule.

/// Sets whose external identifier does not follow the general rule.
/// Checked before the rule; every entry has a test.
pub const EXTERNAL_SET_EXCEPTIONS: &[(&str, &str)] = &[
    // megaevolution era
    ("me01", "mev1"),
    ("me02", "mev2"),
    // promo and energy sets
    ("svp", "svpromo"),
    ("sve", "svenergy"),
    // anniversary collection
    ("cel25", "cel25c"),
    // base era, collides with the zero-stripping rule
    ("base01", "bs1"),
];

/// Convert an internal set id to the external catalogue's identifier.
///
/// Rule: a `.` marks an era sub-release; split on it, strip leading zeros
/// from the numeric tail of the prefix, and rejoin with "pt"
/// ("sv03.5" -> "sv3pt5"). Otherwise strip leading zeros from the trailing
/// numeric run ("sv01" -> "sv1").
pub fn to_external_set_id(internal: &str) -> String {
    for (known, external) in EXTERNAL_SET_EXCEPTIONS {
        if internal.eq_ignore_ascii_case(known) {
            return external.to_string();
        }
    }

    match internal.split_once('.') {
        Some((prefix, suffix)) => {
            format!("{}pt{}", strip_trailing_run_zeros(prefix), suffix)
        }
        None => strip_trailing_run_zeros(internal),
    }
}

/// Strip leading zeros from the trailing digit run of an id, keeping at
/// least one digit ("sv01" -> "sv1", "sv00" -> "sv0", "svp" unchanged).
fn strip_trailing_run_zeros(id: &str) -> String {
    let digit_count = id.chars().rev().take_while(|c| c.is_ascii_digit()).count();
    if digit_count == 0 {
        return id.to_string();
    }
    let (head, digits) = id.split_at(id.len() - digit_count);
    let stripped = digits.trim_start_matches('0');
    let digits = if stripped.is_empty() { "0" } else { stripped };
    format!("{}{}", head, digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_release_maps_to_pt_form() {
        assert_eq!(to_external_set_id("sv03.5"), "sv3pt5");
        assert_eq!(to_external_set_id("sv08.5"), "sv8pt5");
        assert_eq!(to_external_set_id("swsh12.5"), "swsh12pt5");
    }

    #[test]
    fn plain_ids_strip_leading_zeros() {
        assert_eq!(to_external_set_id("sv01"), "sv1");
        assert_eq!(to_external_set_id("sv10"), "sv10");
        assert_eq!(to_external_set_id("swsh09"), "swsh9");
    }

    #[test]
    fn id_without_digits_is_unchanged() {
        assert_eq!(to_external_set_id("pgo"), "pgo");
    }

    // one case per exception-table entry; exceptions always win over the rule

    #[test]
    fn exception_megaevolution_sets() {
        assert_eq!(to_external_set_id("me01"), "mev1");
        assert_eq!(to_external_set_id("me02"), "mev2");
    }

    #[test]
    fn exception_promo_set() {
        assert_eq!(to_external_set_id("svp"), "svpromo");
    }

    #[test]
    fn exception_energy_set() {
        assert_eq!(to_external_set_id("sve"), "svenergy");
    }

    #[test]
    fn exception_anniversary_set() {
        assert_eq!(to_external_set_id("cel25"), "cel25c");
    }

    #[test]
    fn exception_base_era_set() {
        // the rule would give "base1"
        assert_eq!(to_external_set_id("base01"), "bs1");
    }

    #[test]
    fn exception_lookup_is_case_insensitive() {
        assert_eq!(to_external_set_id("SVP"), "svpromo");
    }
}
