// sqldatabasetool/src/archive/generation.rs
use chrono::{NaiveDateTime, Timelike};
use std::fmt;

pub const BUNDLE_PREFIX: &str = "Backup_";
pub const BUNDLE_EXTENSION: &str = ".zip";
const STAMP_FORMAT: &str = "%Y%m%d%H%M";
const STAMP_LEN: usize = 12;

/// Identity of one archive bundle: the minute it was taken.
///
/// Rendered as `Backup_yyyyMMddHHmm.zip`. Only names that parse back into a
/// generation take part in lookup and retention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation {
    stamp: NaiveDateTime,
}

impl Generation {
    /// Truncates `timestamp` to the minute.
    pub fn from_timestamp(timestamp: NaiveDateTime) -> Self {
        let stamp = timestamp
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(timestamp);
        Generation { stamp }
    }

    pub fn file_name(&self) -> String {
        format!(
            "{}{}{}",
            BUNDLE_PREFIX,
            self.stamp.format(STAMP_FORMAT),
            BUNDLE_EXTENSION
        )
    }

    pub fn parse(file_name: &str) -> Option<Self> {
        let digits = file_name
            .strip_prefix(BUNDLE_PREFIX)?
            .strip_suffix(BUNDLE_EXTENSION)?;
        if digits.len() != STAMP_LEN || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        NaiveDateTime::parse_from_str(digits, STAMP_FORMAT)
            .ok()
            .map(|stamp| Generation { stamp })
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.stamp.format("%Y-%m-%d %H:%M"))
    }
}
