/**
This modules gives a few tools to prettyprint the metrics of every entity type and the overall
metrics.
*/
use enum_iterator::Sequence;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use std::fmt::Display;
use std::hash::Hash;
use std::str::FromStr;
use thiserror::Error;

/// The reporter holds the metrics of every entity type and the overall metrics. It can be used to
/// display the results (i.e. prettyprint them) as if they were collected into a dataframe and can
/// be consumed to obtain a `HashSet` containing the metrics. The reporter is built by
/// `EntityEvaluator::report`.
///
/// # Example
///
/// ```rust
/// use nercomp::{DivByZeroStrat, EntityEvaluator, Label};
///
/// let gold = vec![Label::begin("PER"), Label::Outside, Label::begin("LOC")];
/// let predicted = vec![Label::begin("PER"), Label::Outside, Label::Outside];
///
/// let mut evaluator = EntityEvaluator::new();
/// evaluator.evaluate_document(&gold, &predicted).unwrap();
/// let reporter = evaluator.report(DivByZeroStrat::ReplaceBy0).unwrap();
///
/// let expected_report =
/// "Class, Precision, Recall, Fscore, Support
/// LOC, 0, 0, 0, 1
/// PER, 1, 1, 1, 1
/// Overall_Micro, 1, 0.5, 0.6666667, 2
/// Overall_Macro, 0.5, 0.5, 0.5, 2
/// Overall_Weighted, 0.5, 0.5, 0.5, 2\n";
///
/// assert_eq!(expected_report, reporter.to_string());
/// ```
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Reporter {
    pub(crate) classes: BTreeSet<ClassMetricsInner>,
}

/// By converting the reporter into a `HashSet` of `ClassMetrics`, you lose the ordering
/// implemented for the reporter. If you mean to consume the data without prettypriting it, this is
/// not a problem.
impl From<Reporter> for HashSet<ClassMetrics> {
    fn from(value: Reporter) -> Self {
        value.classes.into_iter().map(ClassMetrics::from).collect()
    }
}

impl Reporter {
    pub(crate) fn insert(&mut self, metrics: ClassMetricsInner) -> bool {
        self.classes.insert(metrics)
    }

    /// Metrics of an entity type, or of an overall row such as `Overall_Micro`.
    pub fn get(&self, class: &str) -> Option<ClassMetrics> {
        self.classes
            .iter()
            .find(|c| c.class == class)
            .cloned()
            .map(ClassMetrics::from)
    }

    /// Rows in display order: entity types first, then the overall averages.
    pub fn iter(&self) -> impl Iterator<Item = ClassMetrics> + '_ {
        self.classes.iter().cloned().map(ClassMetrics::from)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// The Reporter struct acts as a dataframe when displayed.
impl Display for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Class, Precision, Recall, Fscore, Support")?;
        for v in self.classes.iter() {
            writeln!(f, "{}", v)?
        }
        Ok(())
    }
}

/// Datastructure holding metrics about a given class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassMetrics {
    /// The class, such as "PER", "GPE", "Overall_Micro", etc.
    pub class: String,
    /// The average used to compute this class' metrics
    pub average: Average,
    /// Precision metric
    pub precision: f32,
    /// Recall metric
    pub recall: f32,
    /// Fscore metric
    pub fscore: f32,
    /// Support metric
    pub support: usize,
}

impl Hash for ClassMetrics {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.class.hash(state);
        self.average.hash(state)
    }
}

impl PartialEq for ClassMetrics {
    fn eq(&self, other: &Self) -> bool {
        self.class == other.class && self.average == other.average
    }
}
impl Eq for ClassMetrics {}

impl From<ClassMetricsInner> for ClassMetrics {
    fn from(value: ClassMetricsInner) -> Self {
        Self {
            class: value.class,
            average: value.average,
            precision: value.precision,
            recall: value.recall,
            fscore: value.fscore,
            support: value.support,
        }
    }
}

/// ClassMetricsInner hold the metrics for a single class. They can't be constructed outside of the
/// crate and they implement a special version of the `Display` trait, allowing them to be treated
/// as the line of a dataframe. Equality and ordering only look at the average and the class.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub(crate) struct ClassMetricsInner {
    /// The class, such as "PER", "GPE", "Overall_Micro", etc.
    pub(crate) class: String,
    /// The average used to compute this class' metrics
    pub(crate) average: Average,
    /// Precision metric
    pub(crate) precision: f32,
    /// Recall metric
    pub(crate) recall: f32,
    /// Fscore metric
    pub(crate) fscore: f32,
    /// Support metric
    pub(crate) support: usize,
}

impl PartialEq for ClassMetricsInner {
    fn eq(&self, other: &Self) -> bool {
        self.class == other.class && self.average == other.average
    }
}
impl Eq for ClassMetricsInner {}

impl PartialOrd for ClassMetricsInner {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ClassMetricsInner {
    fn cmp(&self, other: &Self) -> Ordering {
        self.average
            .cmp(&other.average)
            .then_with(|| self.class.cmp(&other.class))
    }
}

impl ClassMetricsInner {
    pub(crate) fn new_overall(
        average: OverallAverage,
        precision: f32,
        recall: f32,
        fscore: f32,
        support: usize,
    ) -> Self {
        let class = average.to_string();
        ClassMetricsInner {
            class,
            average: average.into(),
            precision,
            recall,
            fscore,
            support,
        }
    }
}

/// The ClassMetricsInner struct acts as a line in a dataframe when displayed.
impl Display for ClassMetricsInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}, {}, {}, {}, {}",
            self.class, self.precision, self.recall, self.fscore, self.support
        )
    }
}

/// Enumeration of the different types of averaging supported by this crate. &str can be parsed to
/// create an `Average`. Rows computed without averaging (`None`) sort before the averaged ones.
#[derive(
    Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Default, Serialize, Deserialize,
)]
pub enum Average {
    #[default]
    None,
    Micro,
    Macro,
    Weighted,
}

impl Display for Average {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl FromStr for Average {
    type Err = AverageParsingError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Average::None),
            "micro" => Ok(Average::Micro),
            "macro" => Ok(Average::Macro),
            "weighted" => Ok(Average::Weighted),
            _ => Err(AverageParsingError(String::from(s))),
        }
    }
}

#[derive(Debug, PartialEq, PartialOrd, Eq, Ord, Clone, Error)]
#[error("Impossible to parse the string ({0}) into an Average")]
pub struct AverageParsingError(String);

/// The averages reported on the `Overall_*` rows.
#[derive(Debug, Hash, PartialEq, Eq, Copy, Clone, Serialize, Deserialize, Sequence)]
pub enum OverallAverage {
    Micro,
    Macro,
    Weighted,
}

impl Display for OverallAverage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let str_content = match self {
            Self::Micro => "Overall_Micro",
            Self::Macro => "Overall_Macro",
            Self::Weighted => "Overall_Weighted",
        };
        write!(f, "{}", str_content)
    }
}

impl From<OverallAverage> for Average {
    fn from(value: OverallAverage) -> Self {
        match value {
            OverallAverage::Micro => Average::Micro,
            OverallAverage::Macro => Average::Macro,
            OverallAverage::Weighted => Average::Weighted,
        }
    }
}
