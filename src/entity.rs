use crate::label::Label;
use std::borrow::Cow;
use std::fmt::Display;
use std::slice::Iter;

/// An entity represent a named objet in named entity recognition (NER). It contains a start and an
/// end (i.e. at what index of the sequence it starts, and the index right after its last token)
/// and a tag, which is the associated entity type (such as `LOC`, `PER`, etc.).
#[derive(Debug, Hash, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Entity<'a> {
    pub start: usize,
    pub end: usize,
    pub tag: Cow<'a, str>,
}

impl<'a> Entity<'a> {
    pub fn new<T: Into<Cow<'a, str>>>(start: usize, end: usize, tag: T) -> Self {
        Entity {
            start,
            end,
            tag: tag.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl<'a> Display for Entity<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.tag, self.start, self.end)
    }
}

static OUTSIDE: Label = Label::Outside;

/// This wrapper around the label iterator appends a single `O` at the end of its inner iterator,
/// which closes the last open entity.
struct SentinelIter<'a> {
    content: Iter<'a, Label>,
    is_at_end: bool,
}

impl<'a> Iterator for SentinelIter<'a> {
    type Item = &'a Label;
    fn next(&mut self) -> Option<Self::Item> {
        match self.content.next() {
            Some(label) => Some(label),
            None if self.is_at_end => None,
            None => {
                self.is_at_end = true;
                Some(&OUTSIDE)
            }
        }
    }
}

/// Iterates over the entities of a *single* label sequence.
///
/// Extraction is lenient: an `I-T` label following `O` or a label of another type starts a new
/// entity, exactly like a `B-T` would.
pub struct EntityIter<'a> {
    inner: SentinelIter<'a>,
    /// The previous label (e.g. `B-PER`)
    prev: &'a Label,
    begin_offset: usize,
    index: usize,
}

impl<'a> EntityIter<'a> {
    pub fn new(labels: &'a [Label]) -> Self {
        EntityIter {
            inner: SentinelIter {
                content: labels.iter(),
                is_at_end: false,
            },
            prev: &OUTSIDE,
            begin_offset: 0,
            index: 0,
        }
    }

    /// Checks if an entity ended between the previous and current label.
    fn end_of_chunk(&self, current: &Label) -> bool {
        match (self.prev, current) {
            (Label::Outside, _) => false,
            (_, Label::Outside | Label::Begin(_)) => true,
            (prev, current) => prev.entity_type() != current.entity_type(),
        }
    }

    /// Checks if an entity started between the previous and current label.
    fn start_of_chunk(&self, current: &Label) -> bool {
        match (self.prev, current) {
            (_, Label::Outside) => false,
            (_, Label::Begin(_)) => true,
            (Label::Outside, Label::Inside(_)) => true,
            (prev, current) => prev.entity_type() != current.entity_type(),
        }
    }
}

impl<'a> Iterator for EntityIter<'a> {
    type Item = Entity<'a>;
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let current = self.inner.next()?; // no more labels. We are done
            let ended = match self.end_of_chunk(current) {
                true => self
                    .prev
                    .entity_type()
                    .map(|tag| Entity::new(self.begin_offset, self.index, tag)),
                false => None,
            };
            if self.start_of_chunk(current) {
                self.begin_offset = self.index;
            }
            self.prev = current;
            self.index += 1;
            if ended.is_some() {
                return ended;
            }
        }
    }
}

/// Extracts the entities of a single document, in order of appearance.
pub fn extract_entities(labels: &[Label]) -> Vec<Entity<'_>> {
    EntityIter::new(labels).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::tests::{labels, LabelsToTest};
    use quickcheck::QuickCheck;
    use rstest::rstest;

    fn entities(raw: &[(usize, usize, &'static str)]) -> Vec<Entity<'static>> {
        raw.iter()
            .map(|(start, end, tag)| Entity::new(*start, *end, *tag))
            .collect()
    }

    #[rstest]
    #[case(&["B-PER"], &[(0, 1, "PER")])]
    #[case(&["B-PER", "I-PER", "O", "B-LOC"], &[(0, 2, "PER"), (3, 4, "LOC")])]
    #[case(&["B-PER", "B-PER"], &[(0, 1, "PER"), (1, 2, "PER")])]
    #[case(&["O", "I-PER", "I-PER"], &[(1, 3, "PER")])]
    #[case(&["B-PER", "I-LOC", "I-LOC"], &[(0, 1, "PER"), (1, 3, "LOC")])]
    #[case(&["I-MISC", "O", "I-MISC"], &[(0, 1, "MISC"), (2, 3, "MISC")])]
    #[case(&["O", "O"], &[])]
    #[case(&[], &[])]
    fn test_extract_entities(
        #[case] raw: &[&str],
        #[case] expected: &[(usize, usize, &'static str)],
    ) {
        let labels = labels(raw);
        assert_eq!(extract_entities(&labels), entities(expected));
    }

    #[test]
    fn test_entity_display() {
        let entity = Entity::new(3, 5, "GPE");
        assert_eq!(entity.to_string(), "(GPE, 3, 5)");
        assert_eq!(entity.len(), 2);
    }

    #[test]
    fn test_propertie_entities_are_ordered_and_disjoint() {
        fn ordered_and_disjoint(raw: Vec<LabelsToTest>) -> bool {
            let labels: Vec<Label> = raw.into_iter().map(Label::from).collect();
            let entities = extract_entities(&labels);
            let non_empty = entities.iter().all(|e| !e.is_empty() && e.end <= labels.len());
            let disjoint = entities.windows(2).all(|w| w[0].end <= w[1].start);
            let begins_start = labels
                .iter()
                .enumerate()
                .filter(|(_, l)| l.is_begin())
                .all(|(i, _)| entities.iter().any(|e| e.start == i));
            non_empty && disjoint && begins_start
        }
        QuickCheck::new()
            .tests(1000)
            .quickcheck(ordered_and_disjoint as fn(Vec<LabelsToTest>) -> bool)
    }
}
