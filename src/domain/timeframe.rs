//! Bar intervals and their confluence weights.

use crate::domain::error::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
    #[serde(rename = "1w")]
    W1,
}

pub const DEFAULT_TIMEFRAMES: [Timeframe; 3] = [Timeframe::H1, Timeframe::H4, Timeframe::D1];

impl Timeframe {
    /// Confluence weight: coarser intervals count for more.
    pub fn weight(self) -> u32 {
        match self {
            Timeframe::M15 => 1,
            Timeframe::H1 => 2,
            Timeframe::H4 => 3,
            Timeframe::D1 => 4,
            Timeframe::W1 => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
            Timeframe::W1 => "1w",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "15m" | "15min" => Ok(Timeframe::M15),
            "1h" | "60m" => Ok(Timeframe::H1),
            "4h" => Ok(Timeframe::H4),
            "1d" | "d" | "daily" => Ok(Timeframe::D1),
            "1w" | "w" | "weekly" => Ok(Timeframe::W1),
            other => Err(EngineError::UnknownTimeframe(other.to_string())),
        }
    }
}

/// Parse a comma separated list such as `"1h, 4h,1d"`.
pub fn parse_timeframes(input: &str) -> Result<Vec<Timeframe>, EngineError> {
    let mut out = Vec::new();
    for token in input.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let tf: Timeframe = token.parse()?;
        if !out.contains(&tf) {
            out.push(tf);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_increase_with_duration() {
        let all = [
            Timeframe::M15,
            Timeframe::H1,
            Timeframe::H4,
            Timeframe::D1,
            Timeframe::W1,
        ];
        let weights: Vec<u32> = all.iter().map(|t| t.weight()).collect();
        assert_eq!(weights, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn parse_round_trips_display() {
        for tf in [Timeframe::M15, Timeframe::H1, Timeframe::H4, Timeframe::D1, Timeframe::W1] {
            assert_eq!(tf.to_string().parse::<Timeframe>().unwrap(), tf);
        }
    }

    #[test]
    fn parse_unknown_is_error() {
        assert!(matches!(
            "3h".parse::<Timeframe>(),
            Err(EngineError::UnknownTimeframe(_))
        ));
    }

    #[test]
    fn parse_list_dedups() {
        let tfs = parse_timeframes("1h, 4h,1h, 1d").unwrap();
        assert_eq!(tfs, vec![Timeframe::H1, Timeframe::H4, Timeframe::D1]);
    }
}
