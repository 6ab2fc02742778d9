//! Persisted crawl progress.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AppError;

/// Phase of the crawl cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Restart,
    FetchDescending,
    FetchAscending,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Restart => "restart",
            Phase::FetchDescending => "fetch-descending",
            Phase::FetchAscending => "fetch-ascending",
        }
    }

    /// The fixed cycle RESTART → DESCENDING → ASCENDING → RESTART.
    pub fn next(self) -> Self {
        match self {
            Phase::Restart => Phase::FetchDescending,
            Phase::FetchDescending => Phase::FetchAscending,
            Phase::FetchAscending => Phase::Restart,
        }
    }

    pub fn is_fetch(self) -> bool {
        !matches!(self, Phase::Restart)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "restart" => Ok(Phase::Restart),
            "fetch-descending" => Ok(Phase::FetchDescending),
            "fetch-ascending" => Ok(Phase::FetchAscending),
            other => Err(AppError::invariant(format!("unknown crawl phase '{other}'"))),
        }
    }
}

impl Serialize for Phase {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Phase {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Contents of the status file, rewritten after every iteration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlState {
    /// Identifier of the scrape directory being filled
    pub scrape_id: Option<String>,

    pub phase: Phase,

    /// Resume cursor for the current fetch phase
    pub next_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_cycle() {
        assert_eq!(Phase::Restart.next(), Phase::FetchDescending);
        assert_eq!(Phase::FetchDescending.next(), Phase::FetchAscending);
        assert_eq!(Phase::FetchAscending.next(), Phase::Restart);
    }

    #[test]
    fn test_state_json_shape() {
        let state = CrawlState {
            scrape_id: Some("2026-10-15-08-00-00".into()),
            phase: Phase::FetchAscending,
            next_url: Some("https://example.com/;o=+".into()),
        };
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(
            json,
            r#"{"scrapeId":"2026-10-15-08-00-00","phase":"fetch-ascending","nextUrl":"https://example.com/;o=+"}"#
        );

        let back: CrawlState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn test_unknown_phase_is_rejected() {
        let result: Result<CrawlState, _> =
            serde_json::from_str(r#"{"scrapeId":null,"phase":"sideways","nextUrl":null}"#);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown crawl phase"));
    }
}
