use std::fmt;
use std::str::FromStr;

/// The two field-name spelling conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Notation {
    /// Underscore-delimited: `_diffrn_ambient_temperature`.
    Legacy,
    /// Dot-delimited: `_diffrn.ambient_temperature`.
    Modern,
}

impl Notation {
    /// Classify a field name by its spelling.
    pub fn of(name: &str) -> Notation {
        if name.contains('.') {
            Notation::Modern
        } else {
            Notation::Legacy
        }
    }
}

impl fmt::Display for Notation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notation::Legacy => write!(f, "legacy"),
            Notation::Modern => write!(f, "modern"),
        }
    }
}

impl FromStr for Notation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "legacy" | "cif1" => Ok(Notation::Legacy),
            "modern" | "cif2" => Ok(Notation::Modern),
            other => Err(format!("unknown notation '{}' (expected legacy or modern)", other)),
        }
    }
}

/// The notation makeup of a whole document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Legacy,
    Modern,
    Mixed,
    /// No field names at all.
    Unknown,
}

/// The version declared by a leading `#\#CIF_x.y` marker comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Cif1,
    Cif2,
}

impl Version {
    pub const CIF1_MARKER: &'static str = "#\\#CIF_1.1";
    pub const CIF2_MARKER: &'static str = "#\\#CIF_2.0";

    pub fn from_marker(comment: &str) -> Option<Version> {
        let comment = comment.trim_end();
        if comment.starts_with(Self::CIF2_MARKER) {
            Some(Version::Cif2)
        } else if comment.starts_with("#\\#CIF_1") {
            Some(Version::Cif1)
        } else {
            None
        }
    }

    pub fn marker(self) -> &'static str {
        match self {
            Version::Cif1 => Self::CIF1_MARKER,
            Version::Cif2 => Self::CIF2_MARKER,
        }
    }
}
