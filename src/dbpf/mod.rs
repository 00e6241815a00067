//! DBPF container entry metadata
//!
//! The binary format itself is parsed by an external codec; this module only
//! defines the entry identifiers, classification, and the codec seam the
//! resolver consumes.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Exemplar resource type
pub const TYPE_EXEMPLAR: u32 = 0x6534_284A;
/// Cohort resource type
pub const TYPE_COHORT: u32 = 0x0534_2861;
/// PNG image resource type
pub const TYPE_PNG: u32 = 0x856D_DBAC;
/// FSH texture resource type
pub const TYPE_FSH: u32 = 0x7AB5_0E44;
/// S3D model resource type
pub const TYPE_S3D: u32 = 0x5AD0_E817;
/// LTEXT string resource type
pub const TYPE_LTEXT: u32 = 0x2026_960B;
/// Directory resource type (container bookkeeping for compressed entries)
pub const TYPE_DIR: u32 = 0xE86B_1EEF;

/// Type-group-instance triple identifying one container entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tgi {
    pub type_id: u32,
    pub group_id: u32,
    pub instance_id: u32,
}

impl Tgi {
    pub fn new(type_id: u32, group_id: u32, instance_id: u32) -> Self {
        Self {
            type_id,
            group_id,
            instance_id,
        }
    }
}

impl fmt::Display for Tgi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0x{:08X}-0x{:08X}-0x{:08X}",
            self.type_id, self.group_id, self.instance_id
        )
    }
}

impl FromStr for Tgi {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut ids = s.split('-').map(|part| {
            let digits = part
                .trim()
                .strip_prefix("0x")
                .or_else(|| part.trim().strip_prefix("0X"))
                .unwrap_or(part.trim());
            u32::from_str_radix(digits, 16)
        });

        match (ids.next(), ids.next(), ids.next(), ids.next()) {
            (Some(Ok(t)), Some(Ok(g)), Some(Ok(i)), None) => Ok(Tgi::new(t, g, i)),
            _ => Err(format!("invalid TGI '{}' (expected 0xT-0xG-0xI)", s)),
        }
    }
}

impl Serialize for Tgi {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Tgi {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

/// Content category of an entry, derived from its type ID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Exemplar,
    Cohort,
    Image,
    Texture,
    Model,
    Text,
    /// Container bookkeeping; exempt from override computation
    Dir,
    Other,
}

impl EntryKind {
    pub fn of(tgi: Tgi) -> Self {
        match tgi.type_id {
            TYPE_EXEMPLAR => EntryKind::Exemplar,
            TYPE_COHORT => EntryKind::Cohort,
            TYPE_PNG => EntryKind::Image,
            TYPE_FSH => EntryKind::Texture,
            TYPE_S3D => EntryKind::Model,
            TYPE_LTEXT => EntryKind::Text,
            TYPE_DIR => EntryKind::Dir,
            _ => EntryKind::Other,
        }
    }
}

/// Metadata of one container entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryInfo {
    pub tgi: Tgi,
    /// Stored size in bytes
    pub size: u32,
    /// Decompressed size, present only for compressed entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uncompressed: Option<u32>,
}

/// Codec failures, scoped per file or per entry
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to open container {path}: {reason}")]
    Open { path: PathBuf, reason: String },
    #[error("container {path} is malformed: {reason}")]
    Malformed { path: PathBuf, reason: String },
    #[error("entry {tgi} not found in {path}")]
    MissingEntry { path: PathBuf, tgi: Tgi },
}

/// External collaborator reading container entry metadata.
///
/// Entries are read lazily per file; a failure on one file must not prevent
/// callers from reading others.
pub trait DbpfCodec: Send + Sync {
    /// List entry metadata for one container file
    fn entries(&self, path: &Path) -> Result<Vec<EntryInfo>, CodecError>;

    /// Read one entry's metadata
    fn entry(&self, path: &Path, tgi: Tgi) -> Result<EntryInfo, CodecError> {
        self.entries(path)?
            .into_iter()
            .find(|e| e.tgi == tgi)
            .ok_or(CodecError::MissingEntry {
                path: path.to_path_buf(),
                tgi,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tgi_display_and_parse_roundtrip() {
        let tgi = Tgi::new(TYPE_EXEMPLAR, 0xA8FB_D372, 0x0000_0001);
        let text = tgi.to_string();
        assert_eq!(text, "0x6534284A-0xA8FBD372-0x00000001");
        assert_eq!(text.parse::<Tgi>().unwrap(), tgi);
    }

    #[test]
    fn tgi_parse_accepts_bare_hex() {
        let tgi: Tgi = "6534284a-a8fbd372-1".parse().unwrap();
        assert_eq!(tgi.type_id, TYPE_EXEMPLAR);
        assert_eq!(tgi.instance_id, 1);
    }

    #[test]
    fn tgi_parse_rejects_garbage() {
        assert!("not-a-tgi".parse::<Tgi>().is_err());
        assert!("0x1-0x2".parse::<Tgi>().is_err());
        assert!("0x1-0x2-0x3-0x4".parse::<Tgi>().is_err());
    }

    #[test]
    fn entry_kind_classification() {
        assert_eq!(EntryKind::of(Tgi::new(TYPE_EXEMPLAR, 0, 0)), EntryKind::Exemplar);
        assert_eq!(EntryKind::of(Tgi::new(TYPE_FSH, 0, 0)), EntryKind::Texture);
        assert_eq!(EntryKind::of(Tgi::new(TYPE_DIR, 0, 0)), EntryKind::Dir);
        assert_eq!(EntryKind::of(Tgi::new(0xDEAD_BEEF, 0, 0)), EntryKind::Other);
    }

    #[test]
    fn tgi_serde_as_string() {
        let tgi = Tgi::new(1, 2, 3);
        let json = serde_json::to_string(&tgi).unwrap();
        assert_eq!(json, "\"0x00000001-0x00000002-0x00000003\"");
        assert_eq!(serde_json::from_str::<Tgi>(&json).unwrap(), tgi);
    }
}
