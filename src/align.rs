/*!
Alignment of a predicted token sequence onto the gold tokenization.

Taggers rarely tokenize text the way the gold corpus does: a predicted token may cover several
gold tokens (`"New York"` against `"New"`, `"York"`) or a gold token may be cut into several
predicted tokens. The aligner walks both sequences with two cursors and resynchronizes them by
comparing token texts, producing exactly one predicted label per gold token.

This is a greedy heuristic with a bounded lookahead, not an optimal sequence alignment. Every
fallback it takes is logged and recorded as an [`AlignWarning`], and it gives up with
[`AlignError::NoResync`] when no resynchronization point exists inside the lookahead window.
*/
use crate::label::{continuation_of, run_is_continuation_or_empty, Label, TaggedToken};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use thiserror::Error;

pub const DEFAULT_MAX_LOOKAHEAD: usize = 9;

/// A gold token with its gold label and the predicted label aligned onto it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlignedToken {
    pub text: String,
    pub gold: Label,
    pub predicted: Label,
}

impl AlignedToken {
    pub fn new<S: Into<String>>(text: S, gold: Label, predicted: Label) -> Self {
        Self {
            text: text.into(),
            gold,
            predicted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlignError {
    #[error(
        "No resynchronization point found on document {doc_id} for gold token {gold_index} \
         and predicted token {predicted_index} ({text:?})"
    )]
    NoResync {
        doc_id: String,
        gold_index: usize,
        predicted_index: usize,
        text: String,
    },
    #[error("Aligned sequence of document {doc_id} has length {aligned}, gold has length {gold}")]
    LengthMismatch {
        doc_id: String,
        gold: usize,
        aligned: usize,
    },
    #[error(
        "Aligned token {position} of document {doc_id} is {aligned:?}, gold token is {gold:?}"
    )]
    TextMismatch {
        doc_id: String,
        position: usize,
        gold: String,
        aligned: String,
    },
}

/// A recoverable event met during alignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlignWarning {
    /// The predicted sequence ran out before the gold one; the last `remaining` gold tokens
    /// received the continuation of the last predicted label.
    PredictedExhausted { remaining: usize },
    /// Predicted labels swallowed while merging predicted tokens into one gold token started a
    /// new entity; they were dropped.
    DiscardedLabels {
        gold_index: usize,
        labels: Vec<Label>,
    },
}

impl Display for AlignWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PredictedExhausted { remaining } => write!(
                f,
                "possible alignment heuristic mismatch for the last {} tokens",
                remaining
            ),
            Self::DiscardedLabels { gold_index, labels } => {
                write!(f, "discarding predicted entity labels at gold token {}: [", gold_index)?;
                for (n, label) in labels.iter().enumerate() {
                    if n > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", label)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Result of [`align`]: one token per gold token, plus the warnings that were logged.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Alignment {
    pub tokens: Vec<TaggedToken>,
    pub warnings: Vec<AlignWarning>,
}

/// How one iteration of the alignment loop advances the cursors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Same text on both sides: one gold token, one predicted token.
    Matched,
    /// One predicted token covers `count` gold tokens.
    GoldSplit { count: usize },
    /// One gold token covers `count` predicted tokens.
    PredictedSplit { count: usize },
    /// No predicted token left for the last `count` gold tokens.
    Exhausted { count: usize },
}

struct Aligner<'a> {
    doc_id: &'a str,
    gold: &'a [TaggedToken],
    predicted: &'a [TaggedToken],
    max_lookahead: usize,
}

impl<'a> Aligner<'a> {
    fn no_resync(&self, gold_index: usize, predicted_index: usize) -> AlignError {
        AlignError::NoResync {
            doc_id: String::from(self.doc_id),
            gold_index,
            predicted_index,
            text: self
                .predicted
                .get(predicted_index)
                .map(|t| t.text.clone())
                .unwrap_or_default(),
        }
    }

    fn step(&self, i: usize, j: usize) -> Result<Step, AlignError> {
        let Some(predicted) = self.predicted.get(j) else {
            return Ok(Step::Exhausted {
                count: self.gold.len() - i,
            });
        };
        let gold = &self.gold[i];
        if gold.text == predicted.text {
            Ok(Step::Matched)
        } else if predicted.text.starts_with(gold.text.as_str()) {
            self.gold_run_length(i, j).map(|count| Step::GoldSplit { count })
        } else {
            self.predicted_run_length(i, j)
                .map(|count| Step::PredictedSplit { count })
        }
    }

    /// Number of gold tokens covered by the predicted token `j`.
    fn gold_run_length(&self, i: usize, j: usize) -> Result<usize, AlignError> {
        let remaining = self.gold[i..].iter().map(|t| t.text.as_str());
        if let Some(count) = consume_matches(&self.predicted[j].text, remaining).filter(|&c| c > 0) {
            return Ok(count);
        }
        let Some(next) = self.predicted.get(j + 1) else {
            return Ok(self.gold.len() - i);
        };
        lookahead(self.gold, i + 2, self.max_lookahead, &next.text)
            .ok_or_else(|| self.no_resync(i, j))
    }

    /// Number of predicted tokens covered by the gold token `i`.
    fn predicted_run_length(&self, i: usize, j: usize) -> Result<usize, AlignError> {
        let Some(next) = self.gold.get(i + 1) else {
            return Ok(self.predicted.len() - j);
        };
        lookahead(self.predicted, j + 2, self.max_lookahead, &next.text)
            .ok_or_else(|| self.no_resync(i, j))
    }

    fn run(self) -> Result<Alignment, AlignError> {
        log::debug!("Aligning predicted with ground truth on document {}", self.doc_id);
        let mut aligned = Vec::with_capacity(self.gold.len());
        let mut warnings = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < self.gold.len() {
            match self.step(i, j)? {
                Step::Matched => {
                    log::debug!("{} - {}", self.gold[i].text, self.predicted[j].text);
                    aligned.push(TaggedToken::new(
                        self.gold[i].text.clone(),
                        self.predicted[j].label.clone(),
                    ));
                    i += 1;
                    j += 1;
                }
                Step::GoldSplit { count } => {
                    let label = &self.predicted[j].label;
                    let continuation = continuation_of(label);
                    log::debug!(
                        "{:?} - {}",
                        texts(&self.gold[i..i + count]),
                        self.predicted[j].text
                    );
                    for (n, gold) in self.gold[i..i + count].iter().enumerate() {
                        let label = if n == 0 { label } else { &continuation };
                        aligned.push(TaggedToken::new(gold.text.clone(), label.clone()));
                    }
                    i += count;
                    j += 1;
                }
                Step::PredictedSplit { count } => {
                    let label = &self.predicted[j].label;
                    log::debug!(
                        "{} - {:?}",
                        self.gold[i].text,
                        texts(&self.predicted[j..j + count])
                    );
                    aligned.push(TaggedToken::new(self.gold[i].text.clone(), label.clone()));
                    let skipped: Vec<Label> = self.predicted[j + 1..j + count]
                        .iter()
                        .map(|t| t.label.clone())
                        .collect();
                    if !run_is_continuation_or_empty(&skipped, label) {
                        let warning = AlignWarning::DiscardedLabels {
                            gold_index: i,
                            labels: skipped,
                        };
                        log::warn!("{} on document {}", warning, self.doc_id);
                        warnings.push(warning);
                    }
                    i += 1;
                    j += count;
                }
                Step::Exhausted { count } => {
                    let continuation = self
                        .predicted
                        .last()
                        .map(|t| continuation_of(&t.label))
                        .unwrap_or_default();
                    let warning = AlignWarning::PredictedExhausted { remaining: count };
                    log::warn!("{} on document {}", warning, self.doc_id);
                    log::debug!("{:?} - <none>", texts(&self.gold[i..]));
                    warnings.push(warning);
                    aligned.extend(
                        self.gold[i..]
                            .iter()
                            .map(|gold| TaggedToken::new(gold.text.clone(), continuation.clone())),
                    );
                    i += count;
                }
            }
        }
        Ok(Alignment {
            tokens: aligned,
            warnings,
        })
    }
}

fn texts(tokens: &[TaggedToken]) -> Vec<&str> {
    tokens.iter().map(|t| t.text.as_str()).collect()
}

/// Searches `tokens[from..max(from, window_end))` (with `window_end = from - 2 + max_lookahead`)
/// for the first token whose text is a prefix of `key`. Returns its position in the window plus
/// 2, i.e. the number of tokens from the current one up to, but excluding, the match.
fn lookahead(tokens: &[TaggedToken], from: usize, max_lookahead: usize, key: &str) -> Option<usize> {
    let window_end = from
        .saturating_add(max_lookahead)
        .saturating_sub(2)
        .min(tokens.len());
    tokens
        .get(from..window_end)?
        .iter()
        .position(|t| key.starts_with(t.text.as_str()))
        .map(|position| position + 2)
}

/// Counts how many consecutive `pieces`, concatenated without separator, rebuild `text`.
///
/// The match is accepted once at most one trailing char of `text` is left unconsumed. This
/// tolerance comes from the corpus the heuristic was tuned on (trailing punctuation glued to the
/// last token) and is not a general alignment rule.
fn consume_matches<'b, I>(text: &str, pieces: I) -> Option<usize>
where
    I: IntoIterator<Item = &'b str>,
{
    let mut rest = text;
    let mut count = 0;
    for piece in pieces {
        if rest.is_empty() || !rest.starts_with(piece) {
            break;
        }
        rest = &rest[piece.len()..];
        count += 1;
    }
    (rest.chars().count() <= 1).then_some(count)
}

/// Aligns `predicted` onto the tokenization of `gold`, returning one predicted label per gold
/// token. `doc_id` only names the document in log messages and errors.
pub fn align(
    doc_id: &str,
    gold: &[TaggedToken],
    predicted: &[TaggedToken],
    max_lookahead: usize,
) -> Result<Alignment, AlignError> {
    Aligner {
        doc_id,
        gold,
        predicted,
        max_lookahead,
    }
    .run()
}

/// A document whose predictions have been aligned with the gold tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedDocument {
    pub id: String,
    pub tokens: Vec<AlignedToken>,
    pub warnings: Vec<AlignWarning>,
}

impl MergedDocument {
    pub fn gold_labels(&self) -> impl Iterator<Item = &Label> {
        self.tokens.iter().map(|t| &t.gold)
    }

    pub fn predicted_labels(&self) -> impl Iterator<Item = &Label> {
        self.tokens.iter().map(|t| &t.predicted)
    }
}

/// Aligns `predicted` onto `gold` and merges both into `(token, gold label, predicted label)`
/// rows.
///
/// The aligned sequence must have the length of the gold sequence and the same text at every
/// position; a violation means the heuristic broke for this document and is reported as an error
/// instead of producing unreliable rows.
pub fn merge_ground_truth(
    doc_id: &str,
    predicted: &[TaggedToken],
    gold: &[TaggedToken],
    max_lookahead: usize,
) -> Result<MergedDocument, AlignError> {
    let alignment = align(doc_id, gold, predicted, max_lookahead)?;
    if alignment.tokens.len() != gold.len() {
        return Err(AlignError::LengthMismatch {
            doc_id: String::from(doc_id),
            gold: gold.len(),
            aligned: alignment.tokens.len(),
        });
    }
    let mut tokens = Vec::with_capacity(gold.len());
    for (position, (aligned, gold)) in alignment.tokens.into_iter().zip(gold).enumerate() {
        if aligned.text != gold.text {
            return Err(AlignError::TextMismatch {
                doc_id: String::from(doc_id),
                position,
                gold: gold.text.clone(),
                aligned: aligned.text,
            });
        }
        tokens.push(AlignedToken::new(aligned.text, gold.label.clone(), aligned.label));
    }
    Ok(MergedDocument {
        id: String::from(doc_id),
        tokens,
        warnings: alignment.warnings,
    })
}

/// Replaces every `"..."` token by three `"."` tokens carrying the same label, the way most gold
/// corpora tokenize ellipses.
pub fn expand_ellipses(tokens: Vec<TaggedToken>) -> Vec<TaggedToken> {
    let mut expanded = Vec::with_capacity(tokens.len());
    for token in tokens {
        if token.text == "..." {
            expanded.extend(std::iter::repeat(TaggedToken::new(".", token.label)).take(3));
        } else {
            expanded.push(token);
        }
    }
    expanded
}
