use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Recipient identifier of the external chat collaborator.
pub type ChatId = i64;

/// One sensor measurement stream: where it is measured plus what is measured.
///
/// The wire form is `<position>/<measurement>`. Positions may themselves
/// contain slashes (`house/livingroom`), so parsing splits on the *last*
/// slash.
///
/// # Examples
///
/// ```
/// use homemon_common::types::Topic;
///
/// let topic: Topic = "livingroom/temp".parse().unwrap();
/// assert_eq!(topic.position, "livingroom");
/// assert_eq!(topic.measurement, "temp");
/// assert_eq!(topic.to_string(), "livingroom/temp");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Topic {
    pub position: String,
    pub measurement: String,
}

impl Topic {
    pub fn new(position: impl Into<String>, measurement: impl Into<String>) -> Self {
        Self {
            position: position.into(),
            measurement: measurement.into(),
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.position, self.measurement)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("topic must look like <position>/<measurement>, got {0:?}")]
pub struct ParseTopicError(pub String);

impl std::str::FromStr for Topic {
    type Err = ParseTopicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (position, measurement) = s
            .rsplit_once('/')
            .ok_or_else(|| ParseTopicError(s.to_string()))?;
        if position.is_empty() || measurement.is_empty() {
            return Err(ParseTopicError(s.to_string()));
        }
        Ok(Self::new(position, measurement))
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> Self {
        topic.to_string()
    }
}

impl TryFrom<String> for Topic {
    type Error = ParseTopicError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// The most recent reading of a topic as held by the last-value cache.
///
/// `time` is `None` exactly when the reading was a retained snapshot
/// re-delivered by the transport. Retained datapoints update the cache but
/// are never appended to the history log or evaluated against rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Datapoint {
    pub time: Option<DateTime<Utc>>,
    pub value: f64,
}

/// One durable line of the history log: whole Unix seconds plus the value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LogEntry {
    pub timestamp: i64,
    pub value: f64,
}

/// An inbound reading event handed over by the transport collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub topic: Topic,
    pub value: f64,
    /// `false` when the transport re-delivered a retained/stale snapshot.
    pub fresh: bool,
}

/// The kind of value change an alert rule watches for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Rising,
    Falling,
    Unequal,
}

impl ChangeKind {
    /// Whether this change kind is currently active for the given pair.
    pub fn is_active(self, value: f64, compare_to: f64) -> bool {
        match self {
            Self::Rising => value > compare_to,
            Self::Falling => value < compare_to,
            Self::Unequal => value != compare_to,
        }
    }

    /// Symbol used in chat messages and rule listings.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Rising => "📈",
            Self::Falling => "📉",
            Self::Unequal => "≠",
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rising => write!(f, "rising"),
            Self::Falling => write!(f, "falling"),
            Self::Unequal => write!(f, "unequal"),
        }
    }
}

impl std::str::FromStr for ChangeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rising" => Ok(Self::Rising),
            "falling" => Ok(Self::Falling),
            "unequal" => Ok(Self::Unequal),
            _ => Err(format!("unknown change kind: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_parses_on_last_slash() {
        let topic: Topic = "house/livingroom/temp".parse().unwrap();
        assert_eq!(topic.position, "house/livingroom");
        assert_eq!(topic.measurement, "temp");
    }

    #[test]
    fn topic_rejects_missing_parts() {
        assert!("temp".parse::<Topic>().is_err());
        assert!("/temp".parse::<Topic>().is_err());
        assert!("livingroom/".parse::<Topic>().is_err());
    }

    #[test]
    fn topic_serializes_as_string() {
        let topic = Topic::new("livingroom", "temp");
        let json = serde_json::to_string(&topic).unwrap();
        assert_eq!(json, "\"livingroom/temp\"");
        let back: Topic = serde_json::from_str(&json).unwrap();
        assert_eq!(back, topic);
    }

    #[test]
    fn rising_is_strictly_greater() {
        assert!(!ChangeKind::Rising.is_active(1.0, 2.0));
        assert!(!ChangeKind::Rising.is_active(2.0, 2.0));
        assert!(ChangeKind::Rising.is_active(3.0, 2.0));
    }

    #[test]
    fn falling_is_strictly_less() {
        assert!(!ChangeKind::Falling.is_active(3.0, 2.0));
        assert!(!ChangeKind::Falling.is_active(2.0, 2.0));
        assert!(ChangeKind::Falling.is_active(1.0, 2.0));
    }

    #[test]
    fn unequal_is_any_difference() {
        assert!(!ChangeKind::Unequal.is_active(2.0, 2.0));
        assert!(ChangeKind::Unequal.is_active(1.0, 2.0));
        assert!(ChangeKind::Unequal.is_active(2.0, 1.0));
    }
}
