/*!
Conversion of chunk-markup tagger output into BIO labels.

Markup taggers print one token per line followed by an optional chunk tag: `<Name>` opens a chunk,
`</Name>` closes it on the current token and `<Name/>` is a chunk made of a single token. Tokens
inside an open chunk carry no tag.
*/
use crate::categories::CategoryMap;
use crate::label::{Label, TaggedToken};

/// A parsed chunk tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkTag<'a> {
    /// No chunk boundary on this token.
    Plain,
    /// `<Name>`
    Start(&'a str),
    /// `</Name>`
    End(&'a str),
    /// `<Name/>`
    Single(&'a str),
}

impl<'a> ChunkTag<'a> {
    pub fn parse(tag: &'a str) -> Self {
        if let Some(body) = tag.strip_suffix("/>") {
            return Self::Single(body.strip_prefix('<').unwrap_or(body));
        }
        if let Some(body) = tag.strip_prefix("</") {
            return Self::End(body.strip_suffix('>').unwrap_or(body));
        }
        match tag.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
            Some(name) if !name.is_empty() => Self::Start(name),
            _ => Self::Plain,
        }
    }
}

/// Splits raw tagger output into `(token, tag)` pairs. Blank lines are skipped and a line without
/// delimiter is a token without tag.
pub fn read_markup_lines(output: &str, delimiter: char) -> Vec<(&str, &str)> {
    output
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| line.split_once(delimiter).unwrap_or((line, "")))
        .collect()
}

fn to_label(categories: &CategoryMap, name: &str, begin: bool) -> Label {
    match categories.entity_type(name, None) {
        Some(t) if begin => Label::begin(t),
        Some(t) => Label::inside(t),
        None => Label::Outside,
    }
}

/// Converts `(token, tag)` pairs into a predicted sequence, mapping chunk names through
/// `categories`.
///
/// Malformed markup is logged and recovered from: a chunk opening while another one is open
/// closes the previous one, and a closing tag without open chunk is read as a single-token chunk.
pub fn markup_to_bio<'a, I, S>(doc_id: &str, pairs: I, categories: &CategoryMap) -> Vec<TaggedToken>
where
    I: IntoIterator<Item = (S, &'a str)>,
    S: Into<String>,
{
    let mut active: Option<&str> = None;
    let mut tagged = Vec::new();
    for (text, tag) in pairs {
        let label = match ChunkTag::parse(tag) {
            ChunkTag::Single(name) => {
                if let Some(open) = active.take() {
                    log::warn!(
                        "Chunk {} still open at single-token chunk {} on document {}",
                        open,
                        name,
                        doc_id
                    );
                }
                to_label(categories, name, true)
            }
            ChunkTag::Start(name) => {
                if let Some(open) = active.replace(name) {
                    log::warn!(
                        "Chunk {} still open when chunk {} starts on document {}",
                        open,
                        name,
                        doc_id
                    );
                }
                to_label(categories, name, true)
            }
            ChunkTag::End(name) => match active.take() {
                Some(open) => to_label(categories, open, false),
                None => {
                    log::warn!(
                        "Closing tag {} without open chunk on document {}",
                        name,
                        doc_id
                    );
                    to_label(categories, name, true)
                }
            },
            ChunkTag::Plain => match active {
                Some(open) => to_label(categories, open, false),
                None => Label::Outside,
            },
        };
        tagged.push(TaggedToken::new(text, label));
    }
    tagged
}
