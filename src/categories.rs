/*!
Lookup tables normalizing provider-specific entity categories into the shared entity types used by
the gold corpus. Tables are plain JSON documents:

```json
{
  "name": "span-tagger",
  "mappings": { "Person": "PERSON", "Location": "LOC", "Location/GPE": "GPE" },
  "ignored": ["PersonType"]
}
```

A `Category/Subcategory` key takes precedence over the bare `Category` key. Categories listed in
`ignored` are known and deliberately dropped; any other unmapped category is unknown. Both end up
as `O`, but unknown categories are logged.
*/
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use thiserror::Error;

const SPAN_TAGGER_TABLE: &str = include_str!("../data/categories/span_tagger.json");
const MARKUP_TAGGER_TABLE: &str = include_str!("../data/categories/markup_tagger.json");

#[derive(Debug, Error)]
pub enum CategoryError {
    #[error("Could not read the category table: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not parse the category table: {0}")]
    Json(#[from] serde_json::Error),
}

/// Outcome of a category lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved<'a> {
    /// The category maps to this shared entity type.
    Type(&'a str),
    /// The category is known and deliberately not evaluated.
    Ignored,
    /// The category is not present in the table.
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryMap {
    #[serde(default)]
    name: String,
    mappings: BTreeMap<String, String>,
    #[serde(default)]
    ignored: BTreeSet<String>,
}

impl CategoryMap {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_mapping<S: Into<String>, T: Into<String>>(mut self, category: S, to: T) -> Self {
        self.mappings.insert(category.into(), to.into());
        self
    }

    pub fn with_ignored<S: Into<String>>(mut self, category: S) -> Self {
        self.ignored.insert(category.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self, CategoryError> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn from_json_str(content: &str) -> Result<Self, CategoryError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, CategoryError> {
        let file = File::open(path)?;
        Self::from_json_reader(BufReader::new(file))
    }

    /// Built-in table for taggers returning `{category, subcategory}` character spans.
    pub fn span_tagger() -> Result<Self, CategoryError> {
        Self::from_json_str(SPAN_TAGGER_TABLE)
    }

    /// Built-in table for taggers emitting chunk markup such as `<EnamexPrsHum>`.
    pub fn markup_tagger() -> Result<Self, CategoryError> {
        Self::from_json_str(MARKUP_TAGGER_TABLE)
    }

    /// Looks a category up without logging anything.
    pub fn resolve(&self, category: &str, subcategory: Option<&str>) -> Resolved<'_> {
        let specific = subcategory.and_then(|sub| {
            self.mappings
                .get(&format!("{}/{}", category, sub))
                .map(String::as_str)
        });
        match specific.or_else(|| self.mappings.get(category).map(String::as_str)) {
            Some(entity_type) => Resolved::Type(entity_type),
            None if category.is_empty() || self.ignored.contains(category) => Resolved::Ignored,
            None => Resolved::Unknown,
        }
    }

    /// Returns the shared entity type of `category`, or `None` when it must be treated as `O`.
    /// Unknown categories are logged.
    pub fn entity_type(&self, category: &str, subcategory: Option<&str>) -> Option<&str> {
        match self.resolve(category, subcategory) {
            Resolved::Type(t) => Some(t),
            Resolved::Ignored => None,
            Resolved::Unknown => {
                log::warn!("Unknown category {} in table {}", category, self.name);
                None
            }
        }
    }
}
