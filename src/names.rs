//! XML name checks for schema data
//!
//! Tag names coming from a schema catalog must be NCNames.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static NCNAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z_a-z\u{C0}-\u{D6}\u{D8}-\u{F6}\u{F8}-\u{2FF}][A-Z_a-z\u{C0}-\u{D6}\u{D8}-\u{F6}\u{F8}-\u{2FF}\-\.0-9\u{B7}]*$")
        .unwrap()
});

/// Check if a string is a valid NCName (non-colonized name)
pub fn is_valid_ncname(name: &str) -> bool {
    !name.is_empty() && NCNAME.is_match(name)
}

/// Validate an NCName and return an error if invalid
pub fn validate_ncname(name: &str) -> Result<()> {
    if is_valid_ncname(name) {
        Ok(())
    } else {
        Err(Error::Name(format!("Invalid NCName: '{}'", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ncnames() {
        assert!(is_valid_ncname("document"));
        assert!(is_valid_ncname("_x"));
        assert!(is_valid_ncname("tbl-grid.2"));
        assert!(!is_valid_ncname(""));
        assert!(!is_valid_ncname("2x"));
        assert!(!is_valid_ncname("w:p"));
        assert!(!is_valid_ncname("a b"));
    }

    #[test]
    fn test_validate_ncname() {
        assert!(validate_ncname("bookmarkStart").is_ok());
        let err = validate_ncname("w:p").unwrap_err();
        assert!(err.to_string().contains("w:p"));
    }
}
