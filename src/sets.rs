//! Printed set abbreviation resolution
//!
//! Customers type the abbreviation printed on the card ("SVI", "PAF"); the
//! index keys sets by internal ids ("sv01", "sv04.5"). Resolution order:
//! static exception table, exact id match, then a substring match against
//! set display names. A miss is not an error - the caller retries the token
//! as a card-number prefix, because the grammar cannot tell "set code +
//! number" from "prefixed number" on its own.

use rusqlite::Connection;

use crate::index::{self, DbResult};

/// Printed abbreviation -> internal set id, covering era-specific and
/// irregular naming the direct matches below cannot reach.
pub const SET_CODE_EXCEPTIONS: &[(&str, &str)] = &[
    ("SVI", "sv01"),
    ("PAL", "sv02"),
    ("OBF", "sv03"),
    ("MEW", "sv03.5"),
    ("PAR", "sv04"),
    ("PAF", "sv04.5"),
    ("TEF", "sv05"),
    ("TWM", "sv06"),
    ("SFA", "sv06.5"),
    ("SCR", "sv07"),
    ("SSP", "sv08"),
    ("PRE", "sv08.5"),
    ("JTG", "sv09"),
    ("DRI", "sv10"),
    ("MEG", "me01"),
    ("SVP", "svp"),
    ("SVE", "sve"),
    ("CEL", "cel25"),
    ("BS", "base01"),
];

/// Resolve a printed set code to an internal set id. `None` means the token
/// is not a known set and should be reinterpreted as a number prefix.
pub fn resolve_set_code(conn: &Connection, code: &str) -> DbResult<Option<String>> {
    for (abbr, set_id) in SET_CODE_EXCEPTIONS {
        if abbr.eq_ignore_ascii_case(code) {
            return Ok(Some(set_id.to_string()));
        }
    }

    let sets = index::distinct_sets(conn)?;

    for set in &sets {
        if set.set_id.eq_ignore_ascii_case(code) {
            return Ok(Some(set.set_id.clone()));
        }
    }

    let needle = code.to_lowercase();
    for set in &sets {
        if set.set_name.to_lowercase().contains(&needle) {
            return Ok(Some(set.set_id.clone()));
        }
    }

    Ok(None)
}
