/*!
BIO labels and the continuity rules used when a single label must be spread over several tokens.

A label is either `O` (outside any entity), `B-<TYPE>` (first token of an entity) or `I-<TYPE>`
(continuation token of an entity). Predicted sequences frequently break the rule that an `I` tag
follows a `B` or `I` tag of the same type; nothing in this crate relies on that rule holding.
*/
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;
use thiserror::Error;

/// Separator between the prefix and the type of an entity label.
pub const TYPE_DELIMITER: char = '-';

/// A tag of the BIO scheme.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Label {
    /// `O`: the token is not part of an entity.
    #[default]
    Outside,
    /// `B-<TYPE>`: first token of an entity.
    Begin(String),
    /// `I-<TYPE>`: continuation token of an entity.
    Inside(String),
}

impl Label {
    pub fn begin<S: Into<String>>(entity_type: S) -> Self {
        Self::Begin(entity_type.into())
    }

    pub fn inside<S: Into<String>>(entity_type: S) -> Self {
        Self::Inside(entity_type.into())
    }

    /// The entity type (`PER`, `LOC`, ...) of the label, `None` for `O`.
    pub fn entity_type(&self) -> Option<&str> {
        match self {
            Self::Outside => None,
            Self::Begin(t) | Self::Inside(t) => Some(t.as_str()),
        }
    }

    pub fn is_outside(&self) -> bool {
        matches!(self, Self::Outside)
    }

    pub fn is_begin(&self) -> bool {
        matches!(self, Self::Begin(_))
    }

    pub fn is_inside(&self) -> bool {
        matches!(self, Self::Inside(_))
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Outside => write!(f, "O"),
            Self::Begin(t) => write!(f, "B{}{}", TYPE_DELIMITER, t),
            Self::Inside(t) => write!(f, "I{}{}", TYPE_DELIMITER, t),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabelError {
    #[error("Received an empty label")]
    Empty,
    #[error("Could not parse the following string into a BIO label: {0}")]
    Invalid(String),
}

impl FromStr for Label {
    type Err = LabelError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(LabelError::Empty);
        }
        if s == "O" {
            return Ok(Self::Outside);
        }
        let mut chars = s.chars();
        let prefix = chars.next();
        let delimiter = chars.next();
        let entity_type = chars.as_str();
        match (prefix, delimiter) {
            (Some('B'), Some(TYPE_DELIMITER)) if !entity_type.is_empty() => {
                Ok(Self::begin(entity_type))
            }
            (Some('I'), Some(TYPE_DELIMITER)) if !entity_type.is_empty() => {
                Ok(Self::inside(entity_type))
            }
            _ => Err(LabelError::Invalid(String::from(s))),
        }
    }
}

impl TryFrom<String> for Label {
    type Error = LabelError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Label> for String {
    fn from(value: Label) -> Self {
        value.to_string()
    }
}

/// A token text paired with its label. Gold and predicted sequences are both vectors of
/// `TaggedToken`s.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaggedToken {
    pub text: String,
    pub label: Label,
}

impl TaggedToken {
    pub fn new<S: Into<String>>(text: S, label: Label) -> Self {
        Self {
            text: text.into(),
            label,
        }
    }
}

impl<S: Into<String>> From<(S, Label)> for TaggedToken {
    fn from(value: (S, Label)) -> Self {
        Self::new(value.0, value.1)
    }
}

/// Returns the label that continues the entity started or continued by `label`: `B-T` becomes
/// `I-T`, every other label is returned unchanged.
pub fn continuation_of(label: &Label) -> Label {
    match label {
        Label::Begin(t) => Label::Inside(t.clone()),
        other => other.clone(),
    }
}

/// Checks that a run of labels does not start a new entity after `previous`.
///
/// The expected continuation of `previous` is stripped from the front of `labels` (for `O` the
/// expected continuation is `O` itself); the run is accepted when everything left is `O`.
pub fn run_is_continuation_or_empty(labels: &[Label], previous: &Label) -> bool {
    let expected = continuation_of(previous);
    labels
        .iter()
        .skip_while(|l| **l == expected)
        .all(Label::is_outside)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use enum_iterator::{all, Sequence};
    use rstest::rstest;

    pub(crate) fn labels(raw: &[&str]) -> Vec<Label> {
        raw.iter().map(|s| s.parse().unwrap()).collect()
    }

    #[rstest]
    #[case("O", Label::Outside)]
    #[case("B-PER", Label::begin("PER"))]
    #[case("I-LOC", Label::inside("LOC"))]
    #[case("B-WORK_OF_ART", Label::begin("WORK_OF_ART"))]
    #[case("I-A-B", Label::inside("A-B"))]
    fn test_parse_label(#[case] raw: &str, #[case] expected: Label) {
        let actual: Label = raw.parse().unwrap();
        assert_eq!(actual, expected);
        assert_eq!(actual.to_string(), raw);
    }

    #[rstest]
    #[case("", LabelError::Empty)]
    #[case("B-", LabelError::Invalid(String::from("B-")))]
    #[case("X-PER", LabelError::Invalid(String::from("X-PER")))]
    #[case("BPER", LabelError::Invalid(String::from("BPER")))]
    #[case("o", LabelError::Invalid(String::from("o")))]
    fn test_parse_invalid_label(#[case] raw: &str, #[case] expected: LabelError) {
        assert_eq!(raw.parse::<Label>(), Err(expected));
    }

    #[rstest]
    #[case("B-PER", "I-PER")]
    #[case("I-PER", "I-PER")]
    #[case("O", "O")]
    fn test_continuation_of(#[case] label: &str, #[case] expected: &str) {
        let actual = continuation_of(&label.parse().unwrap());
        assert_eq!(actual.to_string(), expected);
    }

    #[rstest]
    #[case(&[], "B-PER", true)]
    #[case(&["I-PER", "I-PER"], "B-PER", true)]
    #[case(&["I-PER", "O", "O"], "I-PER", true)]
    #[case(&["O", "O"], "B-PER", true)]
    #[case(&["I-PER", "B-PER"], "B-PER", false)]
    #[case(&["O", "I-PER"], "B-PER", false)]
    #[case(&["I-LOC"], "B-PER", false)]
    #[case(&["O", "O"], "O", true)]
    #[case(&["O", "B-LOC"], "O", false)]
    fn test_run_is_continuation_or_empty(
        #[case] run: &[&str],
        #[case] previous: &str,
        #[case] expected: bool,
    ) {
        let run = labels(run);
        let previous: Label = previous.parse().unwrap();
        assert_eq!(run_is_continuation_or_empty(&run, &previous), expected);
    }

    #[derive(Debug, PartialEq, Hash, Clone, Sequence, Eq)]
    pub(crate) enum LabelsToTest {
        BPER,
        IPER,
        BLOC,
        ILOC,
        O,
    }

    impl From<LabelsToTest> for Label {
        fn from(value: LabelsToTest) -> Self {
            match value {
                LabelsToTest::BPER => Label::begin("PER"),
                LabelsToTest::IPER => Label::inside("PER"),
                LabelsToTest::BLOC => Label::begin("LOC"),
                LabelsToTest::ILOC => Label::inside("LOC"),
                LabelsToTest::O => Label::Outside,
            }
        }
    }

    impl quickcheck::Arbitrary for LabelsToTest {
        fn arbitrary(g: &mut quickcheck::Gen) -> Self {
            let choices: Vec<LabelsToTest> = all::<LabelsToTest>().collect();
            g.choose(&choices).unwrap().clone()
        }
    }

    #[test]
    fn test_propertie_continuation_accepts_own_run() {
        fn own_run_is_continuation(previous: LabelsToTest, run_length: u8) -> bool {
            let previous: Label = previous.into();
            let continuation = continuation_of(&previous);
            let run = vec![continuation.clone(); run_length as usize];
            !continuation.is_begin()
                && continuation.entity_type() == previous.entity_type()
                && run_is_continuation_or_empty(&run, &previous)
        }
        quickcheck::QuickCheck::new()
            .tests(500)
            .quickcheck(own_run_is_continuation as fn(LabelsToTest, u8) -> bool)
    }

    #[test]
    fn test_label_serde_as_string() {
        let token = TaggedToken::new("Helsinki", Label::begin("GPE"));
        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(json, r#"{"text":"Helsinki","label":"B-GPE"}"#);
        let back: TaggedToken = serde_json::from_str(&json).unwrap();
        assert_eq!(back, token);
    }
}
