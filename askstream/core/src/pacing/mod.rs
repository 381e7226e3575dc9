//! Pacing Policies
//!
//! A pacing policy decides when accumulated answer text becomes visible.
//! Text is never dropped or reordered by pacing; it is only held back.
//!
//! | Policy | Commits on | Completion |
//! |---|---|---|
//! | `Immediate` | every fragment | final commit |
//! | `ChunkThreshold(n)` | every n-th fragment | final commit |
//! | `Interval(ms)` | each tick with pending text | timer stops, final commit |
//! | `CharRate(chars, tick_ms)` | each tick, at most `chars` more chars | keeps ticking until drained |
//!
//! The policy is plain configuration ([`PacingPolicy`]); the per-session
//! state lives in a [`Pacer`].

mod pacer;

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use pacer::{Completion, Pacer};

/// Strategy for exposing accumulated text
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PacingPolicy {
    /// Commit everything on every fragment
    #[default]
    Immediate,
    /// Commit everything once `n` fragments arrived since the last commit
    ChunkThreshold {
        /// Fragments per commit
        n: u32,
    },
    /// Commit everything on a fixed timer
    Interval {
        /// Timer period in milliseconds
        ms: u64,
    },
    /// Reveal at most `chars` characters per timer tick
    CharRate {
        /// Characters revealed per tick
        chars: u32,
        /// Timer period in milliseconds
        tick_ms: u64,
    },
}

impl PacingPolicy {
    /// Timer period, for policies that tick
    #[must_use]
    pub fn tick_period(&self) -> Option<Duration> {
        match self {
            Self::Immediate | Self::ChunkThreshold { .. } => None,
            Self::Interval { ms } => Some(Duration::from_millis(*ms)),
            Self::CharRate { tick_ms, .. } => Some(Duration::from_millis(*tick_ms)),
        }
    }

    /// Check parameters are usable
    ///
    /// # Errors
    ///
    /// Returns a description of the first zero-valued parameter.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Immediate => Ok(()),
            Self::ChunkThreshold { n: 0 } => Err("chunk threshold must be at least 1".into()),
            Self::Interval { ms: 0 } => Err("interval must be at least 1ms".into()),
            Self::CharRate { chars: 0, .. } => Err("char rate must reveal at least 1 char".into()),
            Self::CharRate { tick_ms: 0, .. } => Err("char rate tick must be at least 1ms".into()),
            _ => Ok(()),
        }
    }
}

impl std::fmt::Display for PacingPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Immediate => write!(f, "immediate"),
            Self::ChunkThreshold { n } => write!(f, "chunk:{n}"),
            Self::Interval { ms } => write!(f, "interval:{ms}"),
            Self::CharRate { chars, tick_ms } => write!(f, "char-rate:{chars}/{tick_ms}"),
        }
    }
}

impl FromStr for PacingPolicy {
    type Err = String;

    /// Parse `immediate`, `chunk:<n>`, `interval:<ms>` or `char-rate:<chars>/<ms>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        let (name, args) = s.split_once(':').unwrap_or((s.as_str(), ""));
        let number = |v: &str| -> Result<u64, String> {
            v.trim()
                .parse::<u64>()
                .map_err(|e| format!("invalid number '{v}' in pacing policy: {e}"))
        };

        let policy = match name {
            "immediate" => Self::Immediate,
            "chunk" | "chunk-threshold" | "chunk_threshold" => Self::ChunkThreshold {
                n: u32::try_from(number(args)?).map_err(|e| e.to_string())?,
            },
            "interval" => Self::Interval { ms: number(args)? },
            "char-rate" | "char_rate" | "charrate" => {
                let (chars, tick) = args
                    .split_once('/')
                    .ok_or_else(|| "char-rate expects <chars>/<tick_ms>".to_string())?;
                Self::CharRate {
                    chars: u32::try_from(number(chars)?).map_err(|e| e.to_string())?,
                    tick_ms: number(tick)?,
                }
            }
            other => return Err(format!("unknown pacing policy '{other}'")),
        };
        policy.validate()?;
        Ok(policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_policies() {
        assert_eq!("immediate".parse(), Ok(PacingPolicy::Immediate));
        assert_eq!("chunk:3".parse(), Ok(PacingPolicy::ChunkThreshold { n: 3 }));
        assert_eq!("Interval:100".parse(), Ok(PacingPolicy::Interval { ms: 100 }));
        assert_eq!(
            "char-rate:3/50".parse(),
            Ok(PacingPolicy::CharRate {
                chars: 3,
                tick_ms: 50
            })
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!("chunk:0".parse::<PacingPolicy>().is_err());
        assert!("interval:abc".parse::<PacingPolicy>().is_err());
        assert!("char-rate:3".parse::<PacingPolicy>().is_err());
        assert!("turbo".parse::<PacingPolicy>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        let policy = PacingPolicy::CharRate {
            chars: 5,
            tick_ms: 20,
        };
        assert_eq!(policy.to_string().parse(), Ok(policy));
    }

    #[test]
    fn test_tick_period() {
        assert_eq!(PacingPolicy::Immediate.tick_period(), None);
        assert_eq!(PacingPolicy::ChunkThreshold { n: 2 }.tick_period(), None);
        assert_eq!(
            PacingPolicy::Interval { ms: 40 }.tick_period(),
            Some(Duration::from_millis(40))
        );
    }

    #[test]
    fn test_serde_tagged_form() {
        let policy: PacingPolicy =
            serde_json::from_str(r#"{"kind":"char_rate","chars":3,"tick_ms":50}"#).unwrap();
        assert_eq!(
            policy,
            PacingPolicy::CharRate {
                chars: 3,
                tick_ms: 50
            }
        );
    }
}
