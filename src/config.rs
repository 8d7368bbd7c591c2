/*
 * This modules contains the `EvalConfig` struct, which implements the default trait, and its
 * builder. The config is passed to the `Runner` and to the corpus readers to simplify their
 * arguments.
*/
use crate::align::DEFAULT_MAX_LOOKAHEAD;
use crate::corpus::DEFAULT_DOCUMENT_BOUNDARY;
use crate::metrics::{DivByZeroStrat, ParsingDivisionByZeroStrategyError};
use crate::span::{DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_MAX_SUB_DOCUMENT_LEN};
use either::Either as LeftOrRight;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display};
use std::io::Read;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("The lookahead window must span at least one token, got a maximum lookahead of {0}")]
    LookaheadTooShort(usize),
    #[error("The confidence threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f32),
    #[error("The document boundary token cannot be empty")]
    EmptyBoundary,
    #[error("The maximum length of a sub-document cannot be 0")]
    EmptySubDocument,
    #[error(transparent)]
    DivisionByZero(#[from] ParsingDivisionByZeroStrategyError),
    #[error("Could not parse the configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Config struct used to simplify the inputs of parameters of an evaluation run. It implements
/// the default trait and can be deserialized from JSON, missing fields taking their default value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Bound of the lookahead window used by the aligner to resynchronize the sequences.
    max_lookahead: usize,
    /// Span entities are kept only when their confidence score is strictly above this threshold.
    confidence_threshold: f32,
    /// First column of the record starting a new document in tab-separated files.
    document_boundary: String,
    /// Column separator of the tab-separated files.
    delimiter: char,
    /// This parameter describe what to do when we encounter a division by zero when computing
    /// precision and recall. The most common solution is to replace the results by 0.
    zero_division: DivByZeroStrat,
    /// Are documents aligned on the rayon thread pool? The counters are identical either way.
    parallel: bool,
    /// Longest text, in chars, sent to a span tagger in a single request.
    max_sub_document_len: usize,
    /// Are `"..."` predicted tokens split into three `"."` tokens before alignment?
    expand_ellipses: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            max_lookahead: DEFAULT_MAX_LOOKAHEAD,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            document_boundary: String::from(DEFAULT_DOCUMENT_BOUNDARY),
            delimiter: '\t',
            zero_division: DivByZeroStrat::ReplaceBy0,
            parallel: false,
            max_sub_document_len: DEFAULT_MAX_SUB_DOCUMENT_LEN,
            expand_ellipses: false,
        }
    }
}

impl EvalConfig {
    pub fn max_lookahead(&self) -> usize {
        self.max_lookahead
    }
    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }
    pub fn document_boundary(&self) -> &str {
        &self.document_boundary
    }
    pub fn delimiter(&self) -> char {
        self.delimiter
    }
    pub fn zero_division(&self) -> DivByZeroStrat {
        self.zero_division
    }
    pub fn parallel(&self) -> bool {
        self.parallel
    }
    pub fn max_sub_document_len(&self) -> usize {
        self.max_sub_document_len
    }
    pub fn expand_ellipses(&self) -> bool {
        self.expand_ellipses
    }

    /// Reads a JSON configuration and checks its values.
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self, ConfigError> {
        let config: EvalConfig = serde_json::from_reader(reader)?;
        config.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.max_lookahead < 3 {
            return Err(ConfigError::LookaheadTooShort(self.max_lookahead));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::InvalidThreshold(self.confidence_threshold));
        }
        if self.document_boundary.is_empty() {
            return Err(ConfigError::EmptyBoundary);
        }
        if self.max_sub_document_len == 0 {
            return Err(ConfigError::EmptySubDocument);
        }
        Ok(self)
    }
}

impl Display for EvalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Maximum lookahead: {}\n Confidence threshold: {}\n Document boundary: {}\n Column delimiter: {:?}\n Strategy when encountering a division by zero: {:?}\n Using parallel alignment: {}\n Maximum sub-document length: {}\n Expanding ellipses: {}", self.max_lookahead, self.confidence_threshold, self.document_boundary, self.delimiter, self.zero_division, self.parallel, self.max_sub_document_len, self.expand_ellipses)
    }
}

/// This builder can be used to build and customize an `EvalConfig` stucture.
#[derive(Clone, Debug)]
pub struct EvalConfigBuilder {
    config: EvalConfig,
    /// Either a strategy name still to be parsed, or the strategy itself.
    zero_division: LeftOrRight<String, DivByZeroStrat>,
}

impl Default for EvalConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EvalConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: EvalConfig::default(),
            zero_division: LeftOrRight::Right(DivByZeroStrat::ReplaceBy0),
        }
    }
    pub fn max_lookahead(mut self, max_lookahead: usize) -> Self {
        self.config.max_lookahead = max_lookahead;
        self
    }
    pub fn confidence_threshold(mut self, confidence_threshold: f32) -> Self {
        self.config.confidence_threshold = confidence_threshold;
        self
    }
    pub fn document_boundary<S: Into<String>>(mut self, document_boundary: S) -> Self {
        self.config.document_boundary = document_boundary.into();
        self
    }
    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.config.delimiter = delimiter;
        self
    }
    pub fn division_by_zero(mut self, division_by_zero: DivByZeroStrat) -> Self {
        self.zero_division = LeftOrRight::Right(division_by_zero);
        self
    }
    /// Same as `division_by_zero`, from a name such as `"replaceby1"`. The name is parsed by
    /// `build`.
    pub fn division_by_zero_name<S: Into<String>>(mut self, name: S) -> Self {
        self.zero_division = LeftOrRight::Left(name.into());
        self
    }
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }
    pub fn max_sub_document_len(mut self, max_sub_document_len: usize) -> Self {
        self.config.max_sub_document_len = max_sub_document_len;
        self
    }
    pub fn expand_ellipses(mut self, expand_ellipses: bool) -> Self {
        self.config.expand_ellipses = expand_ellipses;
        self
    }
    pub fn build(self) -> Result<EvalConfig, ConfigError> {
        let zero_division = match self.zero_division {
            LeftOrRight::Left(name) => name.parse()?,
            LeftOrRight::Right(strat) => strat,
        };
        EvalConfig {
            zero_division,
            ..self.config
        }
        .validate()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(DivByZeroStrat::ReplaceBy1)]
    #[case(DivByZeroStrat::ReplaceBy0)]
    #[case(DivByZeroStrat::ReturnError)]
    fn test_builder_setters_division_by_zero(#[case] strat: DivByZeroStrat) {
        let builder = EvalConfigBuilder::default();
        let config = builder.division_by_zero(strat).build().unwrap();
        assert_eq!(config.zero_division(), strat)
    }

    #[rstest]
    #[case("replaceby1", DivByZeroStrat::ReplaceBy1)]
    #[case("ReturnError", DivByZeroStrat::ReturnError)]
    fn test_builder_setters_division_by_zero_name(
        #[case] name: &str,
        #[case] expected: DivByZeroStrat,
    ) {
        let config = EvalConfigBuilder::default()
            .division_by_zero_name(name)
            .build()
            .unwrap();
        assert_eq!(config.zero_division(), expected)
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn test_builder_setters_parallel(#[case] parallel: bool) {
        let builder = EvalConfigBuilder::default();
        let config = builder.parallel(parallel).build().unwrap();
        assert_eq!(config.parallel(), parallel)
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn test_builder_setters_expand_ellipses(#[case] expand: bool) {
        let builder = EvalConfigBuilder::default();
        let config = builder.expand_ellipses(expand).build().unwrap();
        assert_eq!(config.expand_ellipses(), expand)
    }

    #[test]
    fn test_builder_setters_corpus() {
        let config = EvalConfigBuilder::default()
            .document_boundary("###")
            .delimiter(' ')
            .max_lookahead(20)
            .confidence_threshold(0.8)
            .max_sub_document_len(1000)
            .build()
            .unwrap();
        assert_eq!(config.document_boundary(), "###");
        assert_eq!(config.delimiter(), ' ');
        assert_eq!(config.max_lookahead(), 20);
        assert_eq!(config.confidence_threshold(), 0.8);
        assert_eq!(config.max_sub_document_len(), 1000);
    }

    #[test]
    fn test_builder_rejects_invalid_values() {
        let invalid = [
            EvalConfigBuilder::default().max_lookahead(2).build(),
            EvalConfigBuilder::default().confidence_threshold(1.5).build(),
            EvalConfigBuilder::default().document_boundary("").build(),
            EvalConfigBuilder::default().max_sub_document_len(0).build(),
            EvalConfigBuilder::default().division_by_zero_name("nan").build(),
        ];
        assert!(matches!(invalid[0], Err(ConfigError::LookaheadTooShort(2))));
        assert!(matches!(invalid[1], Err(ConfigError::InvalidThreshold(_))));
        assert!(matches!(invalid[2], Err(ConfigError::EmptyBoundary)));
        assert!(matches!(invalid[3], Err(ConfigError::EmptySubDocument)));
        assert!(matches!(invalid[4], Err(ConfigError::DivisionByZero(_))));
    }

    #[test]
    fn test_defaults() {
        let config = EvalConfig::default();
        assert_eq!(config.max_lookahead(), 9);
        assert_eq!(config.confidence_threshold(), 0.5);
        assert_eq!(config.document_boundary(), "-DOCSTART-");
        assert_eq!(config.delimiter(), '\t');
        assert_eq!(config.zero_division(), DivByZeroStrat::ReplaceBy0);
        assert_eq!(config.max_sub_document_len(), 5120);
        assert!(!config.parallel());
        assert_eq!(EvalConfigBuilder::new().build().unwrap(), config);
    }

    #[test]
    fn test_from_json_reader() {
        let json = r#"{"max_lookahead": 12, "parallel": true, "zero_division": "ReplaceBy1"}"#;
        let config = EvalConfig::from_json_reader(json.as_bytes()).unwrap();
        assert_eq!(config.max_lookahead(), 12);
        assert!(config.parallel());
        assert_eq!(config.zero_division(), DivByZeroStrat::ReplaceBy1);
        assert_eq!(config.document_boundary(), "-DOCSTART-");
        assert!(matches!(
            EvalConfig::from_json_reader(r#"{"max_lookahead": 1}"#.as_bytes()),
            Err(ConfigError::LookaheadTooShort(1))
        ));
        assert!(matches!(
            EvalConfig::from_json_reader("{".as_bytes()),
            Err(ConfigError::Json(_))
        ));
    }
}
