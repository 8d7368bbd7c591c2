/*!
Conversion of character-span predictions into token labels.

Some taggers do not label tokens; they return entities as `(offset, length, category)` spans over
the raw document text. This module maps such spans onto the tokens of the document, and handles
documents that had to be split into several sub-documents before being sent to the tagger.

All offsets and lengths are counted in chars (Unicode scalar values), not bytes.
*/
use crate::categories::CategoryMap;
use crate::label::{Label, TaggedToken};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest sub-document, in chars, accepted by span taggers.
pub const DEFAULT_MAX_SUB_DOCUMENT_LEN: usize = 5120;
/// Entities at or below this confidence are treated as "no entity".
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;

/// A token of the source document together with its position in the text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    #[serde(rename = "token")]
    pub text: String,
    pub offset: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
}

impl Token {
    pub fn new<S: Into<String>>(text: S, offset: usize) -> Self {
        Self {
            text: text.into(),
            offset,
            length: None,
        }
    }

    /// Length in chars: the explicit length when known, the length of the text otherwise.
    pub fn char_len(&self) -> usize {
        self.length.unwrap_or_else(|| self.text.chars().count())
    }

    /// One past the last char of the token.
    pub fn end(&self) -> usize {
        self.offset.saturating_add(self.char_len())
    }
}

/// An entity returned by a span tagger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanEntity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub offset: usize,
    pub length: usize,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    #[serde(default, alias = "confidence", skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f32>,
}

impl SpanEntity {
    pub fn new<S: Into<String>>(offset: usize, length: usize, category: S, confidence: f32) -> Self {
        Self {
            text: None,
            offset,
            length,
            category: category.into(),
            subcategory: None,
            confidence_score: Some(confidence),
        }
    }

    pub fn with_subcategory<S: Into<String>>(mut self, subcategory: S) -> Self {
        self.subcategory = Some(subcategory.into());
        self
    }

    pub fn end(&self) -> usize {
        self.offset.saturating_add(self.length)
    }
}

/// The tagger response for one sub-document. Entity offsets are relative to the sub-document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsePart {
    pub id: String,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub entities: Vec<SpanEntity>,
}

/// A slice of a document small enough to be sent to a span tagger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubDocument {
    pub id: String,
    pub text: String,
}

impl SubDocument {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpanError {
    #[error("The tagger returned an error response for sub-document {0}")]
    ErrorResponse(String),
    #[error("Received {responses} response parts for {sub_documents} sub-documents")]
    PartCountMismatch {
        responses: usize,
        sub_documents: usize,
    },
}

/// Returns the ordered indices of the tokens overlapped by the entity.
///
/// A token matches when the entity starts inside it, or when the entity starts before it and
/// reaches at least its end. An entity overlapping nothing yields an empty vector.
pub fn find_matching_tokens(tokens: &[Token], entity_offset: usize, entity_length: usize) -> Vec<usize> {
    let entity_end = entity_offset.saturating_add(entity_length);
    tokens
        .iter()
        .enumerate()
        .filter(|(_, token)| {
            let starts_inside = entity_offset >= token.offset && entity_offset < token.end();
            let covers = entity_offset < token.offset && entity_end >= token.end();
            starts_inside || covers
        })
        .map(|(i, _)| i)
        .collect()
}

/// Splits `text` into sub-documents of at most `max_len` chars. Each cut is placed right after
/// the last newline of the window, or exactly at `max_len` when the window has no newline. A text
/// that already fits is returned as a single sub-document keeping the original id.
pub fn split_long_document(id: &str, text: &str, max_len: usize) -> Vec<SubDocument> {
    let max_len = max_len.max(1);
    let mut parts = Vec::new();
    let mut rest = text;
    while let Some((window_end, _)) = rest.char_indices().nth(max_len) {
        let window = &rest[..window_end];
        let cut = window.rfind('\n').map(|i| i + 1).unwrap_or(window_end);
        parts.push(SubDocument {
            id: format!("{}.{}", id, parts.len() + 1),
            text: String::from(&rest[..cut]),
        });
        rest = &rest[cut..];
    }
    if parts.is_empty() {
        return vec![SubDocument {
            id: String::from(id),
            text: String::from(text),
        }];
    }
    parts.push(SubDocument {
        id: format!("{}.{}", id, parts.len() + 1),
        text: String::from(rest),
    });
    parts
}

/// Merges the responses of all sub-documents into one entity list whose offsets are relative to
/// the whole document: every offset is shifted by the total length of the preceding
/// sub-documents.
pub fn merge_response_parts(
    responses: &[ResponsePart],
    sub_documents: &[SubDocument],
) -> Result<Vec<SpanEntity>, SpanError> {
    if responses.len() != sub_documents.len() {
        return Err(SpanError::PartCountMismatch {
            responses: responses.len(),
            sub_documents: sub_documents.len(),
        });
    }
    let mut merged = Vec::new();
    let mut part_offset = 0;
    for (response, sub_document) in responses.iter().zip(sub_documents) {
        if response.is_error {
            return Err(SpanError::ErrorResponse(response.id.clone()));
        }
        merged.extend(response.entities.iter().map(|entity| SpanEntity {
            offset: entity.offset + part_offset,
            ..entity.clone()
        }));
        part_offset += sub_document.char_len();
    }
    Ok(merged)
}

/// Labels every token of a document from a list of span entities.
///
/// Only entities whose confidence is strictly above `threshold` are kept. The first token of an
/// entity gets `B-<TYPE>` and the following ones `I-<TYPE>`; untouched tokens are `O`. Later
/// entities overwrite earlier ones on shared tokens.
pub fn project_entities(
    doc_id: &str,
    tokens: &[Token],
    entities: &[SpanEntity],
    categories: &CategoryMap,
    threshold: f32,
) -> Vec<TaggedToken> {
    let mut labels = vec![Label::Outside; tokens.len()];
    for entity in entities {
        let confidence = match entity.confidence_score {
            Some(c) => c,
            None => {
                log::warn!(
                    "confidence_score missing on entity {:?}, document {}",
                    entity.text.as_deref().unwrap_or_default(),
                    doc_id
                );
                0.0
            }
        };
        if confidence <= threshold {
            continue;
        }
        let Some(entity_type) = categories.entity_type(&entity.category, entity.subcategory.as_deref())
        else {
            continue;
        };
        for (n, i) in find_matching_tokens(tokens, entity.offset, entity.length)
            .into_iter()
            .enumerate()
        {
            let label = if n == 0 {
                Label::begin(entity_type)
            } else {
                Label::inside(entity_type)
            };
            if !labels[i].is_outside() && labels[i] != label {
                log::warn!(
                    "Duplicate entity for token {:?} at offset {} of document {}, previous = {}, new = {}",
                    tokens[i].text,
                    entity.offset,
                    doc_id,
                    labels[i],
                    label
                );
            }
            labels[i] = label;
        }
    }
    tokens
        .iter()
        .zip(labels)
        .map(|(token, label)| TaggedToken::new(token.text.clone(), label))
        .collect()
}
