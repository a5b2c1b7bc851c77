//! RTTM speaker turn parsing
//!
//! RTTM is a line-oriented, space-delimited format; for each turn record the
//! fourth field is the start in seconds, the fifth the duration, and the
//! eighth the speaker label. Lines with fewer than eight fields are skipped.

use std::path::Path;

use avdiar_types::RttmTurn;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RttmError {
    #[error("invalid {field} on line {line}: {value:?}")]
    InvalidField {
        field: &'static str,
        line: usize,
        value: String,
    },

    #[error("failed to read RTTM file: {0}")]
    Io(#[from] std::io::Error),
}

/// Parse RTTM text into speaker turns, in input order.
pub fn parse_rttm(input: &str) -> Result<Vec<RttmTurn>, RttmError> {
    let mut turns = Vec::new();

    for (lineno, line) in input.lines().enumerate() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 8 {
            continue;
        }

        let start: f64 = parts[3].parse().map_err(|_| RttmError::InvalidField {
            field: "start",
            line: lineno + 1,
            value: parts[3].to_string(),
        })?;
        let duration: f64 = parts[4].parse().map_err(|_| RttmError::InvalidField {
            field: "duration",
            line: lineno + 1,
            value: parts[4].to_string(),
        })?;

        turns.push(RttmTurn {
            start,
            end: start + duration,
            label: parts[7].to_string(),
        });
    }

    Ok(turns)
}

/// Load and parse an RTTM file.
pub fn load_rttm(path: &Path) -> Result<Vec<RttmTurn>, RttmError> {
    let content = std::fs::read_to_string(path)?;
    let turns = parse_rttm(&content)?;
    tracing::debug!("loaded {} turns from {:?}", turns.len(), path);
    Ok(turns)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
SPEAKER meeting 1 0.50 4.20 <NA> <NA> spk00 <NA> <NA>
SPEAKER meeting 1 4.90 1.10 <NA> <NA> spk01 <NA> <NA>
";

    #[test]
    fn test_parses_turn_records() {
        let turns = parse_rttm(SAMPLE).unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].start, 0.5);
        assert!((turns[0].end - 4.7).abs() < 1e-9);
        assert_eq!(turns[0].label, "spk00");
        assert_eq!(turns[1].label, "spk01");
    }

    #[test]
    fn test_short_lines_skipped() {
        let turns = parse_rttm("SPEAKER meeting 1 0.50\n\n").unwrap();
        assert!(turns.is_empty());
    }

    #[test]
    fn test_bad_number_is_error() {
        let err = parse_rttm("SPEAKER m 1 abc 4.2 <NA> <NA> spk00").unwrap_err();
        match err {
            RttmError::InvalidField { field, line, .. } => {
                assert_eq!(field, "start");
                assert_eq!(line, 1);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_preserves_input_order() {
        let turns = parse_rttm(SAMPLE).unwrap();
        assert!(turns[0].start < turns[1].start);
    }
}
