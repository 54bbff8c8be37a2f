use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Manifest identifier of a stimulus.
///
/// Manifests may write ids as JSON strings or numbers; both normalize to text.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StimulusId(#[serde(deserialize_with = "text_or_number")] String);

impl StimulusId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A forced-choice response value, also used for a stimulus' expected answer.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Answer(#[serde(deserialize_with = "text_or_number")] String);

impl Answer {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Stable handle of a trial: `trial<index>-src<stimulus id>`.
///
/// Derived from the trial's position and stimulus, never stored on its own.
/// The index prefix keeps handles unique when sampling with replacement puts
/// the same stimulus in the sequence twice.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PresentationId {
    index: usize,
    stimulus_id: StimulusId,
}

impl PresentationId {
    #[must_use]
    pub fn new(index: usize, stimulus_id: StimulusId) -> Self {
        Self { index, stimulus_id }
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn stimulus_id(&self) -> &StimulusId {
        &self.stimulus_id
    }
}

fn text_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Integer(i64),
        Float(f64),
    }

    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Text(text) => text,
        Scalar::Integer(n) => n.to_string(),
        Scalar::Float(f) => f.to_string(),
    })
}

impl fmt::Debug for StimulusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StimulusId({})", self.0)
    }
}

impl fmt::Debug for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Answer({})", self.0)
    }
}

impl fmt::Debug for PresentationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PresentationId({self})")
    }
}

// ─── Display Implementations ───────────────────────────────────────────────────

impl fmt::Display for StimulusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for PresentationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trial{}-src{}", self.index, self.stimulus_id)
    }
}

// ─── FromStr Implementations ───────────────────────────────────────────────────

/// Error type for parsing a presentation id from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    input: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse presentation id from {:?}", self.input)
    }
}

impl std::error::Error for ParseIdError {}

impl FromStr for PresentationId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseIdError {
            input: s.to_string(),
        };
        let rest = s.strip_prefix("trial").ok_or_else(err)?;
        let (index, stimulus) = rest.split_once("-src").ok_or_else(err)?;
        if stimulus.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        let index = index.parse::<usize>().map_err(|_| err())?;
        Ok(Self::new(index, StimulusId::new(stimulus)))
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presentation_id_display() {
        let id = PresentationId::new(2, StimulusId::new("7"));
        assert_eq!(id.to_string(), "trial2-src7");
    }

    #[test]
    fn presentation_id_regenerates_from_parts() {
        let id: PresentationId = "trial10-srcantiphase-3".parse().unwrap();
        assert_eq!(id.index(), 10);
        assert_eq!(id.stimulus_id().as_str(), "antiphase-3");
        assert_eq!(
            PresentationId::new(id.index(), id.stimulus_id().clone()).to_string(),
            "trial10-srcantiphase-3"
        );
    }

    #[test]
    fn presentation_id_from_str_invalid() {
        assert!("trial-src1".parse::<PresentationId>().is_err());
        assert!("trial1-src".parse::<PresentationId>().is_err());
        assert!("trial+1-src4".parse::<PresentationId>().is_err());
        assert!("stim1-src4".parse::<PresentationId>().is_err());
    }

    #[test]
    fn ids_accept_numbers_and_strings() {
        let ids: Vec<StimulusId> = serde_json::from_str(r#"[1, "b", 2.5]"#).unwrap();
        assert_eq!(ids[0].as_str(), "1");
        assert_eq!(ids[1].as_str(), "b");
        assert_eq!(ids[2].as_str(), "2.5");

        let answer: Answer = serde_json::from_str("3").unwrap();
        assert_eq!(answer, Answer::new("3"));
    }

    #[test]
    fn ids_serialize_as_text() {
        let json = serde_json::to_string(&StimulusId::new("12")).unwrap();
        assert_eq!(json, r#""12""#);
    }
}
