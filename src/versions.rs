//! Office file format versions
//!
//! Each version is a generation of the OOXML schemas. Element kinds, attributes
//! and particles carry the first version they appear in; a target version
//! accepts everything introduced at or before it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A named generation of the OOXML schemas
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub enum FileFormatVersion {
    /// Office 2007 (ECMA-376 1st edition)
    #[default]
    Office2007,
    /// Office 2010
    Office2010,
    /// Office 2013
    Office2013,
    /// Office 2016
    Office2016,
    /// Office 2019
    Office2019,
    /// Office 2021
    Office2021,
    /// Microsoft 365
    Microsoft365,
}

impl FileFormatVersion {
    /// Number of supported versions
    pub const COUNT: usize = 7;

    /// Every supported version, oldest first
    pub const ALL: [FileFormatVersion; Self::COUNT] = [
        FileFormatVersion::Office2007,
        FileFormatVersion::Office2010,
        FileFormatVersion::Office2013,
        FileFormatVersion::Office2016,
        FileFormatVersion::Office2019,
        FileFormatVersion::Office2021,
        FileFormatVersion::Microsoft365,
    ];

    /// Position of this version in [`FileFormatVersion::ALL`]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Get the canonical name
    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormatVersion::Office2007 => "Office2007",
            FileFormatVersion::Office2010 => "Office2010",
            FileFormatVersion::Office2013 => "Office2013",
            FileFormatVersion::Office2016 => "Office2016",
            FileFormatVersion::Office2019 => "Office2019",
            FileFormatVersion::Office2021 => "Office2021",
            FileFormatVersion::Microsoft365 => "Microsoft365",
        }
    }

    /// Check whether something introduced in `since` exists in this version
    pub fn includes(self, since: FileFormatVersion) -> bool {
        since <= self
    }
}

impl fmt::Display for FileFormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FileFormatVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        let digits = normalized.strip_prefix("office").unwrap_or(&normalized);

        match digits {
            "2007" => Ok(FileFormatVersion::Office2007),
            "2010" => Ok(FileFormatVersion::Office2010),
            "2013" => Ok(FileFormatVersion::Office2013),
            "2016" => Ok(FileFormatVersion::Office2016),
            "2019" => Ok(FileFormatVersion::Office2019),
            "2021" => Ok(FileFormatVersion::Office2021),
            "microsoft365" | "m365" | "365" => Ok(FileFormatVersion::Microsoft365),
            _ => Err(Error::out_of_range(
                "file_format",
                format!("'{}' is not a supported file format version", s),
            )),
        }
    }
}

impl TryFrom<String> for FileFormatVersion {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<FileFormatVersion> for String {
    fn from(value: FileFormatVersion) -> Self {
        value.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_office2007() {
        assert_eq!(FileFormatVersion::default(), FileFormatVersion::Office2007);
    }

    #[test]
    fn test_parse_versions() {
        assert_eq!("2010".parse::<FileFormatVersion>().unwrap(), FileFormatVersion::Office2010);
        assert_eq!(
            "Office2016".parse::<FileFormatVersion>().unwrap(),
            FileFormatVersion::Office2016
        );
        assert_eq!(
            "microsoft365".parse::<FileFormatVersion>().unwrap(),
            FileFormatVersion::Microsoft365
        );
        assert!("2003".parse::<FileFormatVersion>().is_err());
    }

    #[test]
    fn test_includes() {
        let v = FileFormatVersion::Office2013;
        assert!(v.includes(FileFormatVersion::Office2007));
        assert!(v.includes(FileFormatVersion::Office2013));
        assert!(!v.includes(FileFormatVersion::Office2016));
    }

    #[test]
    fn test_display_roundtrip() {
        for v in FileFormatVersion::ALL {
            assert_eq!(v.to_string().parse::<FileFormatVersion>().unwrap(), v);
            assert_eq!(FileFormatVersion::ALL[v.index()], v);
        }
    }

    #[test]
    fn test_serde_string_form() {
        let json = serde_json::to_string(&FileFormatVersion::Office2019).unwrap();
        assert_eq!(json, "\"Office2019\"");
        let v: FileFormatVersion = serde_json::from_str("\"2010\"").unwrap();
        assert_eq!(v, FileFormatVersion::Office2010);
    }
}
