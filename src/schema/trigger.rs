use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::metrics::Metric;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PredicateError {
    #[error("empty trigger identifier")]
    Empty,
    #[error("unknown trigger family '{0}'")]
    UnknownFamily(String),
    #[error("unknown metric '{0}'")]
    UnknownMetric(String),
    #[error("invalid threshold '{0}': expected a positive integer")]
    InvalidThreshold(String),
    #[error("malformed trigger '{0}'")]
    Malformed(String),
}

/// A declarative trigger condition bound to one narrative event.
///
/// Identifier syntax:
/// - `first:<metric>` → `ExactCount`
/// - `reach:<metric>:<N>` → `Threshold`
/// - `group_complete:<group>` → `GroupComplete`
/// - `flag:<name>` → `Flag`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerPredicate {
    /// "First X": the metric is exactly one.
    ExactCount { metric: Metric },
    /// Milestone: the metric has reached `at`.
    Threshold { metric: Metric, at: u32 },
    /// Every item in the named group is complete.
    GroupComplete { group: String },
    /// An external one-off flag, read directly with no transition semantics.
    Flag { name: String },
}

impl TriggerPredicate {
    pub fn parse(input: &str) -> Result<TriggerPredicate, PredicateError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(PredicateError::Empty);
        }

        let (family, rest) = input
            .split_once(':')
            .ok_or_else(|| PredicateError::Malformed(input.to_string()))?;
        if rest.is_empty() {
            return Err(PredicateError::Malformed(input.to_string()));
        }

        match family {
            "first" => Ok(Self::ExactCount {
                metric: parse_metric(rest)?,
            }),
            "reach" => {
                let (metric, at) = rest
                    .split_once(':')
                    .ok_or_else(|| PredicateError::Malformed(input.to_string()))?;
                let at: u32 = at
                    .parse()
                    .map_err(|_| PredicateError::InvalidThreshold(at.to_string()))?;
                if at == 0 {
                    return Err(PredicateError::InvalidThreshold(at.to_string()));
                }
                Ok(Self::Threshold {
                    metric: parse_metric(metric)?,
                    at,
                })
            }
            "group_complete" => Ok(Self::GroupComplete {
                group: rest.to_string(),
            }),
            "flag" => Ok(Self::Flag {
                name: rest.to_string(),
            }),
            other => Err(PredicateError::UnknownFamily(other.to_string())),
        }
    }
}

fn parse_metric(name: &str) -> Result<Metric, PredicateError> {
    Metric::from_name(name).ok_or_else(|| PredicateError::UnknownMetric(name.to_string()))
}

impl fmt::Display for TriggerPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExactCount { metric } => write!(f, "first:{}", metric.name()),
            Self::Threshold { metric, at } => write!(f, "reach:{}:{}", metric.name(), at),
            Self::GroupComplete { group } => write!(f, "group_complete:{}", group),
            Self::Flag { name } => write!(f, "flag:{}", name),
        }
    }
}
