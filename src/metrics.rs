/**
This module computes the entity-level metrics (precision, recall, f-score, support) of gold and
predicted label sequences. Counts are accumulated document by document in an [`EntityEvaluator`]
and only turned into ratios when a [`Reporter`] is requested.
*/
use crate::align::AlignedToken;
use crate::entity::{extract_entities, Entity};
use crate::label::Label;
use crate::reporter::{Average, ClassMetricsInner, OverallAverage, Reporter};
use ahash::{random_state::RandomState, HashMap as AHashMap, HashSet as AHashSet};
use enum_iterator::all;
use itertools::multizip;
use ndarray::{array, Array, Array1, ArcArray, ArrayBase, Data, Dimension, Ix1, Zip};
use ndarray_stats::{errors::MultiInputError, SummaryStatisticsExt};
use num::Num;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;
use thiserror::Error;

/// How do we handle cases with a division by zero? Do we return 1, return an error, or return 0?
/// `ReplaceBy0` is the default. `ReturnError` stops the computation at the first zero
/// denominator; it can be useful if you believe there should be no 0 in the denominator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DivByZeroStrat {
    /// Returns 1 when the denominator is 0
    ReplaceBy1,
    /// Returns an error
    ReturnError,
    /// Returns 0 when the denominator is 0
    #[default]
    ReplaceBy0,
}

impl DivByZeroStrat {
    /// Value used in place of a ratio whose denominator is 0, `None` when it is an error.
    fn fallback(self) -> Option<f32> {
        match self {
            Self::ReplaceBy0 => Some(0.0),
            Self::ReplaceBy1 => Some(1.0),
            Self::ReturnError => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Could not parse the {0} into a `DivByZeroStrat`")]
pub struct ParsingDivisionByZeroStrategyError(String);

impl FromStr for DivByZeroStrat {
    type Err = ParsingDivisionByZeroStrategyError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_ref() {
            "replaceby0" | "replacebyzero" | "zero" => Ok(DivByZeroStrat::ReplaceBy0),
            "replaceby1" | "replacebyone" | "one" => Ok(DivByZeroStrat::ReplaceBy1),
            "returnerror" | "error" => Ok(DivByZeroStrat::ReturnError),
            _ => Err(ParsingDivisionByZeroStrategyError(String::from(s))),
        }
    }
}

/// Enum error encompassing the failures that could happen when computing the precision, recall,
/// f-score and the support.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ComputationError {
    #[error(
        "Inconsistent length between two sequences. `gold` is length {0}, `predicted` is length {1}"
    )]
    InconsistentLength(usize, usize),
    #[error("Encountered division by zero")]
    DivisionByZero,
    #[error("This array contains more than one element or is empty. It has length: {0}")]
    EmptyOrNotUnique(usize),
    #[error(transparent)]
    InputError(#[from] MultiInputError),
}

trait ItemArrayExt<Output> {
    /// Returns the element out of the Array. Can return an error if the array is empty of if the
    /// array has a length superior to 1.
    fn item(&self) -> Result<Output, ComputationError>;
}

impl<F: Clone, T: Data<Elem = F>> ItemArrayExt<F> for ArrayBase<T, Ix1> {
    fn item(&self) -> Result<F, ComputationError> {
        match (self.len(), self.first()) {
            (1, Some(value)) => Ok(value.clone()),
            (n, _) => Err(ComputationError::EmptyOrNotUnique(n)),
        }
    }
}

/// True positive, false positive and false negative counts of a single entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TypeCounts {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

impl TypeCounts {
    pub fn new(true_positives: usize, false_positives: usize, false_negatives: usize) -> Self {
        Self {
            true_positives,
            false_positives,
            false_negatives,
        }
    }

    /// Number of predicted entities.
    pub fn predicted(&self) -> usize {
        self.true_positives + self.false_positives
    }

    /// Number of gold entities.
    pub fn support(&self) -> usize {
        self.true_positives + self.false_negatives
    }

    /// `tp / (tp + fp)`, 0 without any predicted entity.
    pub fn precision(&self) -> f32 {
        ratio(self.true_positives, self.predicted())
    }

    /// `tp / (tp + fn)`, 0 without any gold entity.
    pub fn recall(&self) -> f32 {
        ratio(self.true_positives, self.support())
    }

    /// Harmonic mean of the precision and the recall, 0 when both are 0.
    pub fn f1(&self) -> f32 {
        let (precision, recall) = (self.precision(), self.recall());
        if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        }
    }
}

fn ratio(numerator: usize, denominator: usize) -> f32 {
    match denominator {
        0 => 0.0,
        d => numerator as f32 / d as f32,
    }
}

impl Add for TypeCounts {
    type Output = TypeCounts;
    fn add(self, rhs: Self) -> Self::Output {
        TypeCounts {
            true_positives: self.true_positives + rhs.true_positives,
            false_positives: self.false_positives + rhs.false_positives,
            false_negatives: self.false_negatives + rhs.false_negatives,
        }
    }
}

impl AddAssign for TypeCounts {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for TypeCounts {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(TypeCounts::default(), Add::add)
    }
}

type SpansByType<'a> = AHashMap<&'a str, AHashSet<(usize, usize)>>;

fn spans_by_type<'a>(entities: &'a [Entity<'a>]) -> SpansByType<'a> {
    let mut spans: SpansByType<'a> =
        AHashMap::with_capacity_and_hasher(entities.len(), RandomState::new());
    for e in entities.iter() {
        spans
            .entry(e.tag.as_ref())
            .or_default()
            .insert((e.start, e.end));
    }
    spans
}

/// Accumulates per entity type counts over many documents.
///
/// Entities are extracted from each document separately, so an entity never crosses a document
/// boundary. Evaluators can be combined with `+=` or summed, which is how parallel runs merge
/// their per-document results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityEvaluator {
    counts: BTreeMap<String, TypeCounts>,
    documents: usize,
}

impl EntityEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the entity counts of a single document.
    pub fn evaluate_document(
        &mut self,
        gold: &[Label],
        predicted: &[Label],
    ) -> Result<(), ComputationError> {
        if gold.len() != predicted.len() {
            return Err(ComputationError::InconsistentLength(
                gold.len(),
                predicted.len(),
            ));
        }
        let gold_entities = extract_entities(gold);
        let predicted_entities = extract_entities(predicted);
        let gold_spans = spans_by_type(&gold_entities);
        let predicted_spans = spans_by_type(&predicted_entities);
        let empty = AHashSet::default();
        let target_names: BTreeSet<&str> = gold_spans
            .keys()
            .chain(predicted_spans.keys())
            .copied()
            .collect();
        for type_name in target_names {
            let gold_set = gold_spans.get(type_name).unwrap_or(&empty);
            let predicted_set = predicted_spans.get(type_name).unwrap_or(&empty);
            let true_positives = gold_set.intersection(predicted_set).count();
            let counts = TypeCounts::new(
                true_positives,
                predicted_set.len() - true_positives,
                gold_set.len() - true_positives,
            );
            *self.counts.entry(String::from(type_name)).or_default() += counts;
        }
        self.documents += 1;
        Ok(())
    }

    /// Same as [`EntityEvaluator::evaluate_document`] on aligned `(token, gold, predicted)` rows.
    pub fn evaluate_aligned(&mut self, rows: &[AlignedToken]) -> Result<(), ComputationError> {
        let (gold, predicted): (Vec<Label>, Vec<Label>) = rows
            .iter()
            .map(|row| (row.gold.clone(), row.predicted.clone()))
            .unzip();
        self.evaluate_document(&gold, &predicted)
    }

    /// Counts of a single type; all zeros for a type never seen.
    pub fn counts(&self, entity_type: &str) -> TypeCounts {
        self.counts.get(entity_type).copied().unwrap_or_default()
    }

    /// Counts summed over every type.
    pub fn overall(&self) -> TypeCounts {
        self.counts.values().copied().sum()
    }

    /// Every type seen in a gold or a predicted sequence, in ascending order.
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.counts.keys().map(String::as_str)
    }

    /// Number of documents evaluated.
    pub fn documents(&self) -> usize {
        self.documents
    }

    /// Computes the per type metrics and the micro, macro and weighted averages.
    pub fn report(&self, zero_division: DivByZeroStrat) -> Result<Reporter, ComputationError> {
        let counts: Vec<TypeCounts> = self.counts.values().copied().collect();
        let (p, r, f1, s) = precision_recall_fscore_support(&counts, Average::None, zero_division)?;
        let mut reporter = Reporter::default();
        for (name, precision, recall, fscore, support) in multizip((
            self.counts.keys(),
            p.into_iter(),
            r.into_iter(),
            f1.into_iter(),
            s.into_iter(),
        )) {
            reporter.insert(ClassMetricsInner {
                class: name.clone(),
                precision,
                recall,
                fscore,
                support,
                average: Average::None,
            });
        }
        for avg in all::<OverallAverage>() {
            let (p, r, f1, s) = precision_recall_fscore_support(&counts, avg.into(), zero_division)?;
            reporter.insert(ClassMetricsInner::new_overall(
                avg,
                p.item()?,
                r.item()?,
                f1.item()?,
                s.item()?,
            ));
        }
        log::debug!(
            "Computed metrics of {} types over {} documents",
            counts.len(),
            self.documents
        );
        Ok(reporter)
    }
}

impl AddAssign for EntityEvaluator {
    fn add_assign(&mut self, rhs: Self) {
        for (type_name, counts) in rhs.counts {
            *self.counts.entry(type_name).or_default() += counts;
        }
        self.documents += rhs.documents;
    }
}

impl Sum for EntityEvaluator {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(EntityEvaluator::default(), |mut acc, e| {
            acc += e;
            acc
        })
    }
}

fn prf_divide<I: Debug + Num + Clone, D: Dimension>(
    numerator: ArcArray<I, D>,
    mut denominator: Array<I, D>,
    zero_division: DivByZeroStrat,
) -> Result<ArcArray<I, D>, ComputationError> {
    let zero_mask =
        Zip::from(&denominator).map_collect(|d| if *d == I::zero() { I::zero() } else { I::one() });
    let has_zero = zero_mask.iter().any(|m| *m == I::zero());
    denominator.mapv_inplace(|v| if v == I::zero() { I::one() } else { v });
    let mut result = numerator / denominator;
    match zero_division {
        DivByZeroStrat::ReturnError if has_zero => Err(ComputationError::DivisionByZero),
        DivByZeroStrat::ReturnError => Ok(result),
        DivByZeroStrat::ReplaceBy1 => {
            Zip::from(&mut result).and(&zero_mask).for_each(|r, m| {
                if *m == I::zero() {
                    *r = I::one()
                }
            });
            Ok(result)
        }
        DivByZeroStrat::ReplaceBy0 => Ok(result * zero_mask),
    }
}

/// Type alias for representing the output of the `precision_recall_fscore_support`. The first
/// array contains the precision, the second the recall, the third the f-score and the last one
/// the support.
pub type PrecisionRecallFScoreTrueSum = (Array1<f32>, Array1<f32>, Array1<f32>, Array1<usize>);

/// Computes the precision, recall, f1 and support of each entry of `counts` (`Average::None`) or
/// their average (arrays of length 1).
///
/// * `counts`: One entry per entity type
/// * `average`: What type of average to use.
/// * `zero_division`: What to do in case of division by zero.
pub fn precision_recall_fscore_support(
    counts: &[TypeCounts],
    average: Average,
    zero_division: DivByZeroStrat,
) -> Result<PrecisionRecallFScoreTrueSum, ComputationError> {
    let mut tp_sum: Array1<usize> = counts.iter().map(|c| c.true_positives).collect();
    let mut pred_sum: Array1<usize> = counts.iter().map(TypeCounts::predicted).collect();
    let mut true_sum: Array1<usize> = counts.iter().map(TypeCounts::support).collect();
    if matches!(average, Average::Micro) {
        tp_sum = array![tp_sum.sum()];
        pred_sum = array![pred_sum.sum()];
        true_sum = array![true_sum.sum()];
    };
    let arc_tp_sum = tp_sum.mapv(|x| x as f32).into_shared();
    let precision = prf_divide(
        arc_tp_sum.clone(),
        pred_sum.mapv(|x| x as f32),
        zero_division,
    )?;
    let recall = prf_divide(arc_tp_sum, true_sum.mapv(|x| x as f32), zero_division)?;
    let mut denom = &precision + &recall;
    denom.mapv_inplace(|v| if v == 0.0 { 1.0 } else { v });
    let f_score = ((&precision * &recall) * 2.0 / denom).into_shared();
    let support = true_sum.sum();
    match average {
        Average::None | Average::Micro => Ok((
            precision.into_owned(),
            recall.into_owned(),
            f_score.into_owned(),
            true_sum,
        )),
        Average::Macro => {
            let (p, r, f) = match (precision.mean(), recall.mean(), f_score.mean()) {
                (Some(p), Some(r), Some(f)) => (p, r, f),
                _ => {
                    let v = zero_division
                        .fallback()
                        .ok_or(ComputationError::DivisionByZero)?;
                    (v, v, v)
                }
            };
            Ok((array![p], array![r], array![f], array![support]))
        }
        Average::Weighted => {
            if support == 0 {
                let v = zero_division
                    .fallback()
                    .ok_or(ComputationError::DivisionByZero)?;
                return Ok((array![v], array![v], array![v], array![0]));
            }
            let weights = true_sum.mapv(|x| x as f32).into_shared();
            Ok((
                array![precision.weighted_mean(&weights)?],
                array![recall.weighted_mean(&weights)?],
                array![f_score.weighted_mean(&weights)?],
                array![support],
            ))
        }
    }
}
