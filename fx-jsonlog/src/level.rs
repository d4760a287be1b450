use crate::{Error, Result};
use derive_more::Display;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::str::FromStr;

/// The severity of a log record.
///
/// Levels are ordered by their rank, where [LogLevel::Error] is the most severe.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    #[display("TRACE")]
    Trace,
    #[display("DEBUG")]
    Debug,
    #[display("INFO")]
    Info,
    #[display("WARNING")]
    Warning,
    #[display("ERROR")]
    Error,
}

impl LogLevel {
    /// All known levels, from least to most severe.
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Trace,
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warning,
        LogLevel::Error,
    ];

    /// Returns the fixed numeric rank of the level, used for filtering.
    pub const fn rank(&self) -> u8 {
        match self {
            LogLevel::Trace => 1,
            LogLevel::Debug => 2,
            LogLevel::Info => 3,
            LogLevel::Warning => 4,
            LogLevel::Error => 5,
        }
    }

    /// Returns the name of the level as written in a record.
    pub const fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }

    /// Verify if a record of this level passes the given minimum level.
    /// An absent minimum never filters.
    pub fn is_enabled(&self, minimum: Option<LogLevel>) -> bool {
        minimum
            .map(|minimum| self.rank() >= minimum.rank())
            .unwrap_or(true)
    }
}

impl PartialOrd for LogLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LogLevel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        LogLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == value)
            .ok_or_else(|| Error::InvalidLevel(value.to_string()))
    }
}

impl Serialize for LogLevel {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_order() {
        assert!(LogLevel::Trace < LogLevel::Debug);
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
        assert_eq!(4, LogLevel::Warning.rank());
        assert_eq!(5, LogLevel::Error.rank());
    }

    #[test]
    fn test_is_enabled() {
        let minimum = Some(LogLevel::Warning);

        assert!(!LogLevel::Info.is_enabled(minimum));
        assert!(LogLevel::Warning.is_enabled(minimum));
        assert!(LogLevel::Error.is_enabled(minimum));
        assert!(LogLevel::Trace.is_enabled(None));
    }

    #[test]
    fn test_from_str() {
        for level in LogLevel::ALL {
            assert_eq!(level, LogLevel::from_str(level.as_str()).unwrap());
        }

        let result = LogLevel::from_str("warning");
        assert_eq!(Err(Error::InvalidLevel("warning".to_string())), result);
    }

    #[test]
    fn test_display() {
        assert_eq!("WARNING", LogLevel::Warning.to_string());
        assert_eq!("TRACE", LogLevel::Trace.to_string());
    }

    #[test]
    fn test_serialize() {
        let result = serde_json::to_string(&LogLevel::Debug).unwrap();

        assert_eq!("\"DEBUG\"", result);
    }
}
