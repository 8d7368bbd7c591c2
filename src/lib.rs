/*!
This library compares the output of a named entity tagger with a gold corpus whose tokenization
differs from the tagger's, and scores the predictions per entity type.

Taggers rarely split text the way the gold corpus does: `"New York"` may come back as a single
token, a gold token may be cut in several pieces, and span taggers only return character offsets.
The library first brings every prediction onto the gold tokenization, then extracts entities from
both label sequences and counts exact matches.

# Pipeline
* Span taggers answer with `(offset, length, category)` entities. They are projected onto the
    document tokens with [`project_entities`], after splitting long texts with
    [`split_long_document`] and merging the responses with [`merge_response_parts`].
* Markup taggers print `<Name>` chunk tags. They are converted with [`markup_to_bio`].
* Provider categories are mapped onto the gold entity types with a [`CategoryMap`].
* [`merge_ground_truth`] aligns the predicted tokens with the gold tokens and checks that the
    result has the gold length and text.
* [`EntityEvaluator`] counts true positives, false positives and false negatives per type, and
    builds a [`Reporter`] with the precision, recall and F1 of every type and the micro, macro and
    weighted averages.

The [`Runner`] drives the whole pipeline over many documents, optionally in parallel. A document
whose alignment fails is logged, left out of the metrics and listed in the [`RunOutcome`];
[`RunOutcome::check_failures`] turns such failures into an error.

# Terminology
* A label is `O` (outside any entity), `B-TYPE` (first token of an entity) or `I-TYPE`
    (continuation of an entity). Labels follow the IOB2 scheme.
* An entity is a maximal run of tokens sharing a type, starting at a `B-` label. An `I-` label
    following `O` or another type starts an entity too.
* An entity is correctly predicted when the predicted entity has the same type and exactly the
    same token boundaries as a gold entity.
*/

mod align;
mod categories;
mod config;
mod confusion;
mod corpus;
mod entity;
mod label;
mod markup;
mod metrics;
mod pipeline;
mod reporter;
mod span;

// The public api starts here
pub use label::{Label, LabelError, TaggedToken};

pub use categories::{CategoryError, CategoryMap, Resolved};

pub use span::{
    find_matching_tokens, merge_response_parts, project_entities, split_long_document,
    ResponsePart, SpanEntity, SpanError, SubDocument, Token,
};

pub use markup::{markup_to_bio, read_markup_lines, ChunkTag};

pub use align::{
    align, expand_ellipses, merge_ground_truth, AlignError, AlignWarning, AlignedToken, Alignment,
    MergedDocument, DEFAULT_MAX_LOOKAHEAD,
};

pub use entity::{extract_entities, Entity};

pub use metrics::{
    precision_recall_fscore_support, ComputationError, DivByZeroStrat, EntityEvaluator,
    ParsingDivisionByZeroStrategyError, PrecisionRecallFScoreTrueSum, TypeCounts,
};

pub use reporter::{Average, ClassMetrics, Reporter};

pub use corpus::{
    load_aligned, load_gold, write_aligned, write_tagged, CorpusError, DocumentReader,
    RawDocument, Record,
};

pub use confusion::{Confusion, ErrorAnalysis, DEFAULT_INTERESTING_TYPES};

pub use pipeline::{
    evaluate_aligned, DocumentError, DocumentFailure, DocumentInput, Prediction, RunError,
    RunOutcome, Runner, SpanPrediction,
};

pub use config::{ConfigError, EvalConfig, EvalConfigBuilder};

/// Main entrypoint of the library. This function aligns every predicted document with the gold
/// document at the same position, then computes the precision, recall, fscore and support of
/// every entity type. If any document cannot be aligned, no metrics are returned and the error
/// lists every failed document; use a [`Runner`] to score the remaining documents anyway.
///
/// * `gold`: Gold documents
/// * `predicted`: Predicted documents, in the same order
/// * `config`: Parameters of the alignment and of the metrics.
///
/// # Example
/// ```rust
/// use nercomp::{evaluate_documents, EvalConfig, Label, TaggedToken};
///
/// let gold = vec![vec![
///     TaggedToken::new("Matti", Label::begin("PERSON")),
///     TaggedToken::new("Virtanen", Label::inside("PERSON")),
///     TaggedToken::new("asuu", Label::Outside),
///     TaggedToken::new("Oulussa", Label::begin("GPE")),
/// ]];
/// let predicted = vec![vec![
///     TaggedToken::new("Matti Virtanen", Label::begin("PERSON")),
///     TaggedToken::new("asuu", Label::Outside),
///     TaggedToken::new("Oulussa", Label::begin("LOC")),
/// ]];
///
/// let reporter = evaluate_documents(gold, predicted, &EvalConfig::default()).unwrap();
/// let person = reporter.get("PERSON").unwrap();
/// assert_eq!((person.precision, person.recall, person.support), (1.0, 1.0, 1));
/// let micro = reporter.get("Overall_Micro").unwrap();
/// assert_eq!((micro.precision, micro.recall, micro.support), (0.5, 0.5, 2));
/// ```
pub fn evaluate_documents(
    gold: Vec<Vec<TaggedToken>>,
    predicted: Vec<Vec<TaggedToken>>,
    config: &EvalConfig,
) -> Result<Reporter, RunError> {
    let inputs = pipeline::pair_tagged(gold, predicted)?;
    let runner = Runner::new(config.clone(), CategoryMap::default());
    Ok(runner.run(&inputs).check_failures()?.report(config)?)
}
