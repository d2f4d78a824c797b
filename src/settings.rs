//! Validator configuration
//!
//! Settings are plain values: build one, adjust it with the `with_*` methods,
//! and hand it to [`OpenXmlValidator`](crate::validators::OpenXmlValidator).

use crate::error::{Error, Result};
use crate::versions::FileFormatVersion;

/// Default bound on collected diagnostics
pub const DEFAULT_MAX_ERRORS: usize = 1000;

/// Configuration of a validator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationSettings {
    /// Target file format version
    pub file_format: FileFormatVersion,

    /// Maximum number of diagnostics returned by one call (0 = unlimited)
    pub max_errors: usize,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            file_format: FileFormatVersion::Office2007,
            max_errors: DEFAULT_MAX_ERRORS,
        }
    }
}

impl ValidationSettings {
    /// Create settings with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings that never stop collecting diagnostics
    pub fn unlimited() -> Self {
        Self {
            max_errors: 0,
            ..Self::default()
        }
    }

    /// Set the target version
    pub fn with_file_format(mut self, file_format: FileFormatVersion) -> Self {
        self.file_format = file_format;
        self
    }

    /// Set the diagnostics bound
    pub fn with_max_errors(mut self, max_errors: usize) -> Self {
        self.max_errors = max_errors;
        self
    }

    /// Convert a signed bound supplied by a caller
    pub fn check_max_errors(value: i64) -> Result<usize> {
        usize::try_from(value).map_err(|_| {
            Error::out_of_range(
                "max_errors",
                format!("{} is negative; use 0 for unlimited", value),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_default_settings() {
        let settings = ValidationSettings::default();
        assert_eq!(settings.file_format, FileFormatVersion::Office2007);
        assert_eq!(settings.max_errors, 1000);
        assert_eq!(ValidationSettings::unlimited().max_errors, 0);
    }

    #[test]
    fn test_builders() {
        let settings = ValidationSettings::new()
            .with_file_format(FileFormatVersion::Office2016)
            .with_max_errors(10);
        assert_eq!(settings.file_format, FileFormatVersion::Office2016);
        assert_eq!(settings.max_errors, 10);
    }

    #[test]
    fn test_check_max_errors() {
        assert_eq!(ValidationSettings::check_max_errors(0).unwrap(), 0);
        assert_eq!(ValidationSettings::check_max_errors(25).unwrap(), 25);
        let err = ValidationSettings::check_max_errors(-1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentOutOfRange);
    }
}
