/*!
The run driver: aligns every document of a run with its gold sequence, checks the alignment and
accumulates the entity counts.

Each document is processed independently. A document whose alignment fails is recorded as a
[`DocumentFailure`] and left out of the metrics; the rest of the run goes on.
*/
use crate::align::{expand_ellipses, merge_ground_truth, AlignError, MergedDocument};
use crate::categories::CategoryMap;
use crate::config::EvalConfig;
use crate::confusion::ErrorAnalysis;
use crate::corpus::{load_gold, write_aligned, CorpusError, DocumentReader};
use crate::label::TaggedToken;
use crate::metrics::{ComputationError, EntityEvaluator};
use crate::reporter::Reporter;
use crate::span::{
    merge_response_parts, project_entities, split_long_document, ResponsePart, SpanError,
    SubDocument, Token,
};
use either::Either;
use rayon::prelude::*;
use std::io::{self, BufRead, Write};
use thiserror::Error;

/// Output of a span tagger for one document, before its projection onto tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanPrediction {
    /// Tokens of the document text, with char offsets.
    pub tokens: Vec<Token>,
    /// The sub-documents the text was split into, in order.
    pub sub_documents: Vec<SubDocument>,
    /// One response per sub-document, in the same order.
    pub responses: Vec<ResponsePart>,
}

impl SpanPrediction {
    /// Splits `text` into the sub-documents to send to the tagger. Responses are attached
    /// afterwards with [`SpanPrediction::with_responses`].
    pub fn for_text(doc_id: &str, text: &str, tokens: Vec<Token>, config: &EvalConfig) -> Self {
        Self {
            tokens,
            sub_documents: split_long_document(doc_id, text, config.max_sub_document_len()),
            responses: Vec::new(),
        }
    }

    pub fn with_responses(mut self, responses: Vec<ResponsePart>) -> Self {
        self.responses = responses;
        self
    }

    /// Labels the tokens from the tagger responses.
    pub fn project(
        &self,
        doc_id: &str,
        categories: &CategoryMap,
        threshold: f32,
    ) -> Result<Vec<TaggedToken>, SpanError> {
        let entities = merge_response_parts(&self.responses, &self.sub_documents)?;
        Ok(project_entities(
            doc_id,
            &self.tokens,
            &entities,
            categories,
            threshold,
        ))
    }
}

/// A prediction is either a labelled token sequence or span entities to project on tokens.
pub type Prediction = Either<Vec<TaggedToken>, SpanPrediction>;

/// One document of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentInput {
    pub id: String,
    pub gold: Vec<TaggedToken>,
    pub prediction: Prediction,
}

impl DocumentInput {
    pub fn new<S: Into<String>>(id: S, gold: Vec<TaggedToken>, prediction: Prediction) -> Self {
        Self {
            id: id.into(),
            gold,
            prediction,
        }
    }

    pub fn tagged<S: Into<String>>(
        id: S,
        gold: Vec<TaggedToken>,
        predicted: Vec<TaggedToken>,
    ) -> Self {
        Self::new(id, gold, Either::Left(predicted))
    }
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error(transparent)]
    Span(#[from] SpanError),
    #[error(transparent)]
    Align(#[from] AlignError),
    #[error(transparent)]
    Metrics(#[from] ComputationError),
}

/// A document left out of the metrics.
#[derive(Debug)]
pub struct DocumentFailure {
    pub id: String,
    pub error: DocumentError,
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Corpus(#[from] CorpusError),
    #[error(transparent)]
    Metrics(#[from] ComputationError),
    #[error("The gold source has {gold} documents, the predicted source has {predicted}")]
    DocumentCountMismatch { gold: usize, predicted: usize },
    #[error("{}", describe_failures(.0))]
    DocumentFailures(Vec<DocumentFailure>),
}

fn describe_failures(failures: &[DocumentFailure]) -> String {
    let ids: Vec<&str> = failures.iter().map(|f| f.id.as_str()).collect();
    format!("{} document(s) could not be aligned: {}", ids.len(), ids.join(", "))
}

/// Result of a run, documents in input order.
#[derive(Debug, Default)]
pub struct RunOutcome {
    pub evaluator: EntityEvaluator,
    pub documents: Vec<MergedDocument>,
    pub failures: Vec<DocumentFailure>,
}

impl RunOutcome {
    pub fn report(&self, config: &EvalConfig) -> Result<Reporter, ComputationError> {
        self.evaluator.report(config.zero_division())
    }

    /// Writes every aligned document as `(token, gold, predicted)` records.
    pub fn write_aligned<W: Write>(&self, writer: &mut W, config: &EvalConfig) -> io::Result<()> {
        for document in self.documents.iter() {
            write_aligned(writer, &document.tokens, config)?;
        }
        Ok(())
    }

    /// Fails with every document left out of the metrics, if any.
    pub fn check_failures(self) -> Result<Self, RunError> {
        match self.failures.is_empty() {
            true => Ok(self),
            false => Err(RunError::DocumentFailures(self.failures)),
        }
    }

    pub fn error_analysis(&self, mut analysis: ErrorAnalysis) -> ErrorAnalysis {
        for document in self.documents.iter() {
            analysis.record(&document.tokens);
        }
        analysis
    }
}

/// Aligns and evaluates documents with a fixed configuration and category table.
#[derive(Debug, Clone, Default)]
pub struct Runner {
    config: EvalConfig,
    categories: CategoryMap,
}

impl Runner {
    pub fn new(config: EvalConfig, categories: CategoryMap) -> Self {
        Self { config, categories }
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    pub fn categories(&self) -> &CategoryMap {
        &self.categories
    }

    fn predicted_tokens(&self, input: &DocumentInput) -> Result<Vec<TaggedToken>, SpanError> {
        let predicted = match &input.prediction {
            Either::Left(tokens) => tokens.clone(),
            Either::Right(spans) => spans.project(
                &input.id,
                &self.categories,
                self.config.confidence_threshold(),
            )?,
        };
        Ok(match self.config.expand_ellipses() {
            true => expand_ellipses(predicted),
            false => predicted,
        })
    }

    /// Aligns a single document and returns its rows with its own counters.
    pub fn process_document(
        &self,
        input: &DocumentInput,
    ) -> Result<(MergedDocument, EntityEvaluator), DocumentError> {
        let predicted = self.predicted_tokens(input)?;
        let merged = merge_ground_truth(
            &input.id,
            &predicted,
            &input.gold,
            self.config.max_lookahead(),
        )?;
        let mut evaluator = EntityEvaluator::new();
        evaluator.evaluate_aligned(&merged.tokens)?;
        Ok((merged, evaluator))
    }

    /// Processes every document, on the rayon thread pool when the configuration asks for it.
    pub fn run(&self, inputs: &[DocumentInput]) -> RunOutcome {
        let results: Vec<_> = if self.config.parallel() {
            inputs
                .par_iter()
                .map(|input| self.process_document(input))
                .collect()
        } else {
            inputs
                .iter()
                .map(|input| self.process_document(input))
                .collect()
        };
        let mut outcome = RunOutcome::default();
        for (input, result) in inputs.iter().zip(results) {
            match result {
                Ok((merged, evaluator)) => {
                    outcome.evaluator += evaluator;
                    outcome.documents.push(merged);
                }
                Err(error) => {
                    log::warn!("Skipping document {}: {}", input.id, error);
                    outcome.failures.push(DocumentFailure {
                        id: input.id.clone(),
                        error,
                    });
                }
            }
        }
        log::info!(
            "Evaluated {} documents, {} left out",
            outcome.documents.len(),
            outcome.failures.len()
        );
        outcome
    }

    /// Pairs the documents of a gold source and of a predicted source, both `(token, label)`
    /// records, by position and runs them. Documents are named by their position.
    pub fn run_tagged_sources<G: BufRead, P: BufRead>(
        &self,
        gold: G,
        predicted: P,
    ) -> Result<RunOutcome, RunError> {
        let gold = load_gold(gold, &self.config)?;
        let predicted = load_gold(predicted, &self.config)?;
        let inputs = pair_tagged(gold, predicted)?;
        Ok(self.run(&inputs))
    }
}

/// Pairs gold and predicted documents by position, naming them by their position.
pub(crate) fn pair_tagged(
    gold: Vec<Vec<TaggedToken>>,
    predicted: Vec<Vec<TaggedToken>>,
) -> Result<Vec<DocumentInput>, RunError> {
    if gold.len() != predicted.len() {
        return Err(RunError::DocumentCountMismatch {
            gold: gold.len(),
            predicted: predicted.len(),
        });
    }
    Ok(gold
        .into_iter()
        .zip(predicted)
        .enumerate()
        .map(|(index, (gold, predicted))| DocumentInput::tagged(index.to_string(), gold, predicted))
        .collect())
}

/// Evaluates an already aligned `(token, gold, predicted)` source, document by document.
pub fn evaluate_aligned<R: BufRead>(
    reader: R,
    config: &EvalConfig,
) -> Result<EntityEvaluator, RunError> {
    let mut evaluator = EntityEvaluator::new();
    for document in DocumentReader::with_config(reader, config) {
        evaluator.evaluate_aligned(&document?.to_aligned()?)?;
    }
    log::info!("Evaluated {} aligned documents", evaluator.documents());
    Ok(evaluator)
}
