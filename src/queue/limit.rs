use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroUsize;

use super::errors::{QueueError, QueueResult};

/// How many tasks a queue may execute at once
///
/// Deserializes from a positive integer or one of the keywords `"serial"`
/// and `"unbounded"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawLimit", into = "RawLimit")]
pub enum ConcurrencyLimit {
    /// At most one task at a time
    Serial,
    /// At most `n` tasks at a time
    Bounded(NonZeroUsize),
    /// No limit beyond what the machine can spawn
    #[default]
    Unbounded,
}

impl ConcurrencyLimit {
    /// Limit of `n` concurrent tasks; `1` is equivalent to [`ConcurrencyLimit::Serial`]
    pub fn bounded(n: usize) -> QueueResult<Self> {
        match NonZeroUsize::new(n) {
            Some(limit) if limit.get() == 1 => Ok(Self::Serial),
            Some(limit) => Ok(Self::Bounded(limit)),
            None => Err(QueueError::InvalidConcurrency { value: n }),
        }
    }

    /// Maximum executing tasks, `None` when unbounded
    pub fn max(&self) -> Option<usize> {
        match self {
            Self::Serial => Some(1),
            Self::Bounded(limit) => Some(limit.get()),
            Self::Unbounded => None,
        }
    }

    pub fn is_serial(&self) -> bool {
        self.max() == Some(1)
    }

    /// Whether `executing` tasks leave room for one more
    pub fn admits(&self, executing: usize) -> bool {
        self.max().map_or(true, |max| executing < max)
    }
}

impl fmt::Display for ConcurrencyLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial => write!(f, "serial"),
            Self::Bounded(limit) => write!(f, "{limit}"),
            Self::Unbounded => write!(f, "unbounded"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawLimit {
    Count(usize),
    Keyword(String),
}

impl TryFrom<RawLimit> for ConcurrencyLimit {
    type Error = String;

    fn try_from(raw: RawLimit) -> Result<Self, Self::Error> {
        match raw {
            RawLimit::Count(n) => Self::bounded(n).map_err(|e| e.to_string()),
            RawLimit::Keyword(word) => match word.as_str() {
                "serial" => Ok(Self::Serial),
                "unbounded" => Ok(Self::Unbounded),
                other => other
                    .parse::<usize>()
                    .map_err(|_| format!("Invalid concurrency limit: {other}"))
                    .and_then(|n| Self::bounded(n).map_err(|e| e.to_string())),
            },
        }
    }
}

impl From<ConcurrencyLimit> for RawLimit {
    fn from(limit: ConcurrencyLimit) -> Self {
        match limit {
            ConcurrencyLimit::Serial => RawLimit::Keyword("serial".to_string()),
            ConcurrencyLimit::Bounded(n) => RawLimit::Count(n.get()),
            ConcurrencyLimit::Unbounded => RawLimit::Keyword("unbounded".to_string()),
        }
    }
}
