/*!
Token-level error analysis of aligned rows: which tokens of an interesting entity type were missed
(false negatives) or wrongly predicted (false positives), and what they were confused with.
*/
use crate::align::AlignedToken;
use crate::label::Label;
use ahash::HashMap as AHashMap;
use serde::Serialize;
use std::fmt::{self, Display};

pub const DEFAULT_INTERESTING_TYPES: [&str; 6] = ["PERSON", "LOC", "GPE", "ORG", "EVENT", "PRODUCT"];

/// How many times a token was confused with another type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Confusion {
    pub text: String,
    /// The predicted type for a false negative, the gold type for a false positive. `O` stands
    /// for no entity.
    pub other: String,
    pub count: usize,
}

type ConfusionCounts = AHashMap<(String, String), usize>;

#[derive(Debug, Clone, Default)]
struct TypeErrors {
    false_negatives: ConfusionCounts,
    false_positives: ConfusionCounts,
}

fn type_name(label: &Label) -> &str {
    label.entity_type().unwrap_or("O")
}

fn sorted(counts: Option<&ConfusionCounts>) -> Vec<Confusion> {
    let mut confusions: Vec<Confusion> = counts
        .into_iter()
        .flatten()
        .map(|((text, other), count)| Confusion {
            text: text.clone(),
            other: other.clone(),
            count: *count,
        })
        .collect();
    confusions.sort_by(|a, b| {
        a.count
            .cmp(&b.count)
            .then_with(|| a.text.cmp(&b.text))
            .then_with(|| a.other.cmp(&b.other))
    });
    confusions
}

/// Collects the confusions of a list of interesting types over any number of documents.
#[derive(Debug, Clone)]
pub struct ErrorAnalysis {
    interesting: Vec<String>,
    errors: AHashMap<String, TypeErrors>,
}

impl Default for ErrorAnalysis {
    fn default() -> Self {
        Self::new(DEFAULT_INTERESTING_TYPES)
    }
}

impl ErrorAnalysis {
    pub fn new<I, S>(interesting: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            interesting: interesting.into_iter().map(Into::into).collect(),
            errors: AHashMap::default(),
        }
    }

    /// Records every row whose gold type differs from its predicted type.
    pub fn record(&mut self, rows: &[AlignedToken]) {
        for row in rows {
            let (gold, predicted) = (type_name(&row.gold), type_name(&row.predicted));
            if gold == predicted {
                continue;
            }
            if self.interesting.iter().any(|t| t == gold) {
                *self
                    .errors
                    .entry(String::from(gold))
                    .or_default()
                    .false_negatives
                    .entry((row.text.clone(), String::from(predicted)))
                    .or_default() += 1;
            }
            if self.interesting.iter().any(|t| t == predicted) {
                *self
                    .errors
                    .entry(String::from(predicted))
                    .or_default()
                    .false_positives
                    .entry((row.text.clone(), String::from(gold)))
                    .or_default() += 1;
            }
        }
    }

    /// Tokens whose gold type is `entity_type` but were predicted as something else, least
    /// frequent first.
    pub fn false_negatives(&self, entity_type: &str) -> Vec<Confusion> {
        sorted(self.errors.get(entity_type).map(|e| &e.false_negatives))
    }

    /// Tokens predicted as `entity_type` whose gold type is something else, least frequent first.
    pub fn false_positives(&self, entity_type: &str) -> Vec<Confusion> {
        sorted(self.errors.get(entity_type).map(|e| &e.false_positives))
    }

    pub fn interesting_types(&self) -> impl Iterator<Item = &str> {
        self.interesting.iter().map(String::as_str)
    }
}

impl Display for ErrorAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for t in self.interesting_types() {
            writeln!(f, "----- {} -----\n", t)?;
            writeln!(f, "Correct type is {} but was predicted as something else:", t)?;
            for c in self.false_negatives(t) {
                writeln!(f, "{:<3} {} {}", c.count, c.text, c.other)?;
            }
            writeln!(f)?;
            writeln!(f, "Predicted {} but should have been something else:", t)?;
            for c in self.false_positives(t) {
                writeln!(f, "{:<3} {} {}", c.count, c.text, c.other)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(text: &str, gold: &str, predicted: &str) -> AlignedToken {
        AlignedToken::new(text, gold.parse().unwrap(), predicted.parse().unwrap())
    }

    fn rows() -> Vec<AlignedToken> {
        vec![
            row("Nokia", "B-ORG", "B-PRODUCT"),
            row("Nokia", "B-ORG", "B-PRODUCT"),
            row("Kone", "B-ORG", "O"),
            row("Oulu", "B-GPE", "B-GPE"),
            row("Matti", "O", "B-PERSON"),
            row("Kekkonen", "I-PERSON", "B-PERSON"),
        ]
    }

    #[test]
    fn test_false_negatives_ascending() {
        let mut analysis = ErrorAnalysis::default();
        analysis.record(&rows());
        let fns = analysis.false_negatives("ORG");
        assert_eq!(
            fns,
            vec![
                Confusion {
                    text: String::from("Kone"),
                    other: String::from("O"),
                    count: 1
                },
                Confusion {
                    text: String::from("Nokia"),
                    other: String::from("PRODUCT"),
                    count: 2
                },
            ]
        );
        assert_eq!(analysis.false_positives("PRODUCT")[0].other, "ORG");
        assert!(analysis.false_negatives("GPE").is_empty());
    }

    #[test]
    fn test_same_type_different_prefix_is_not_an_error() {
        let mut analysis = ErrorAnalysis::default();
        analysis.record(&rows());
        assert_eq!(analysis.false_positives("PERSON").len(), 1);
        assert_eq!(analysis.false_positives("PERSON")[0].text, "Matti");
    }

    #[test]
    fn test_uninteresting_types_are_skipped() {
        let mut analysis = ErrorAnalysis::new(["GPE"]);
        analysis.record(&rows());
        assert!(analysis.false_negatives("ORG").is_empty());
        assert_eq!(
            analysis.to_string(),
            "----- GPE -----

Correct type is GPE but was predicted as something else:

Predicted GPE but should have been something else:

"
        );
    }

    #[test]
    fn test_display_rows() {
        let mut analysis = ErrorAnalysis::new(["ORG"]);
        analysis.record(&rows());
        let text = analysis.to_string();
        assert!(text.contains("1   Kone O\n2   Nokia PRODUCT\n"));
    }
}
