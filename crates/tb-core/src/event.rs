//! Coded behavioral events as produced by observation coding.

use serde::{Deserialize, Serialize};

use crate::types::BehaviorCode;

/// Separator used when joining an event's modifiers into its pairing key.
pub const MODIFIER_SEPARATOR: &str = "|";

/// A single coded occurrence of a behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// When the event was coded, in milliseconds from the observation start.
    #[serde(rename = "time", with = "seconds")]
    pub time_ms: i64,
    /// Subject the event was coded for. Empty means no focal subject.
    #[serde(default)]
    pub subject: String,
    /// The coded behavior.
    pub behavior: BehaviorCode,
    /// Modifiers attached to the event, in coding order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modifiers: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

impl Event {
    /// Creates an event without modifiers or comment.
    pub fn new(time_ms: i64, subject: impl Into<String>, behavior: BehaviorCode) -> Self {
        Self {
            time_ms,
            subject: subject.into(),
            behavior,
            modifiers: Vec::new(),
            comment: String::new(),
        }
    }

    #[must_use]
    pub fn with_modifiers<I, S>(mut self, modifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.modifiers = modifiers.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Joined modifier string; the modifier half of the pairing key.
    pub fn modifier_string(&self) -> String {
        self.modifiers.join(MODIFIER_SEPARATOR)
    }

    /// The (subject, behavior, modifiers) key that state pairing runs on.
    pub fn pairing_key(&self) -> PairingKey {
        PairingKey {
            subject: self.subject.clone(),
            behavior: self.behavior.clone(),
            modifiers: self.modifier_string(),
        }
    }
}

/// Identity of an independent START/STOP stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairingKey {
    pub subject: String,
    pub behavior: BehaviorCode,
    pub modifiers: String,
}

/// Serde adapter for millisecond times written as decimal seconds.
///
/// Serializes as a string (`"12.345"`) so no precision is lost; accepts either
/// a string or a JSON number when reading.
pub mod seconds {
    use serde::{Deserialize, Deserializer, Serializer, de};

    use crate::types::{format_seconds, parse_seconds};

    pub fn serialize<S>(time_ms: &i64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_seconds(*time_ms))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Number(f64),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Text(text) => parse_seconds(&text).map_err(de::Error::custom),
            Repr::Number(value) if value.is_finite() => {
                #[allow(clippy::cast_possible_truncation)]
                let ms = (value * 1000.0).round() as i64;
                Ok(ms)
            }
            Repr::Number(value) => Err(de::Error::custom(format!(
                "invalid time value: {value}"
            ))),
        }
    }

    /// Same as the parent module, for optional times.
    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S>(time_ms: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match time_ms {
                Some(ms) => super::serialize(ms, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
        where
            D: Deserializer<'de>,
        {
            #[derive(Deserialize)]
            struct Wrapper(#[serde(with = "super")] i64);

            Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|Wrapper(ms)| ms))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> BehaviorCode {
        BehaviorCode::new(s).unwrap()
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = Event::new(12_345, "mouse", code("run"))
            .with_modifiers(["fast", "left"])
            .with_comment("near wall");

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""time":"12.345""#), "{json}");
        let parsed: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn event_accepts_numeric_time_and_defaults() {
        let json = r#"{"time": 1.5, "behavior": "groom"}"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert_eq!(event.time_ms, 1_500);
        assert_eq!(event.subject, "");
        assert!(event.modifiers.is_empty());
    }

    #[test]
    fn event_rejects_empty_behavior() {
        let json = r#"{"time": "0.0", "behavior": ""}"#;
        let result: Result<Event, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn pairing_key_joins_modifiers() {
        let event = Event::new(0, "", code("run")).with_modifiers(["fast", "left"]);
        let key = event.pairing_key();
        assert_eq!(key.modifiers, "fast|left");
        assert_eq!(key.behavior.as_str(), "run");
    }
}
