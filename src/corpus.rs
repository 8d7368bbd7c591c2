/*!
Reading and writing documents as delimiter-separated records, one token per line.

```text
-DOCSTART-	O
Matti	B-PERSON
asuu	O
```

A record whose first column is the document boundary token starts a new document and is not a
token itself. Blank lines are skipped, and documents without any record are never emitted. Gold
files carry `(token, label)` records, aligned files `(token, gold label, predicted label)`.
*/
use crate::align::AlignedToken;
use crate::config::EvalConfig;
use crate::label::{Label, LabelError, TaggedToken};
use std::io::{self, BufRead, Lines, Write};
use std::mem::take;
use thiserror::Error;

pub const DEFAULT_DOCUMENT_BOUNDARY: &str = "-DOCSTART-";

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("Could not read the corpus: {0}")]
    Io(#[from] io::Error),
    #[error("Line {line} has {found} columns, expected at least {expected}")]
    MissingColumns {
        line: usize,
        found: usize,
        expected: usize,
    },
    #[error("Invalid label on line {line}: {source}")]
    Label {
        line: usize,
        #[source]
        source: LabelError,
    },
}

/// A single non-blank line, split into columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// 1-based line number in the source.
    pub line: usize,
    pub columns: Vec<String>,
}

impl Record {
    fn column(&self, index: usize, expected: usize) -> Result<&str, CorpusError> {
        self.columns
            .get(index)
            .map(String::as_str)
            .ok_or(CorpusError::MissingColumns {
                line: self.line,
                found: self.columns.len(),
                expected,
            })
    }

    fn label(&self, index: usize, expected: usize) -> Result<Label, CorpusError> {
        self.column(index, expected)?
            .parse()
            .map_err(|source| CorpusError::Label {
                line: self.line,
                source,
            })
    }
}

/// The records of one document, before any interpretation of the columns.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawDocument {
    /// 0-based position of the document in the source.
    pub index: usize,
    pub records: Vec<Record>,
}

impl RawDocument {
    /// Reads the records as `(token, label)`; extra columns are ignored.
    pub fn to_tagged(&self) -> Result<Vec<TaggedToken>, CorpusError> {
        self.records
            .iter()
            .map(|r| -> Result<TaggedToken, CorpusError> {
                Ok(TaggedToken::new(r.column(0, 2)?, r.label(1, 2)?))
            })
            .collect()
    }

    /// Reads the records as `(token, gold label, predicted label)`.
    pub fn to_aligned(&self) -> Result<Vec<AlignedToken>, CorpusError> {
        self.records
            .iter()
            .map(|r| -> Result<AlignedToken, CorpusError> {
                Ok(AlignedToken::new(
                    r.column(0, 3)?,
                    r.label(1, 3)?,
                    r.label(2, 3)?,
                ))
            })
            .collect()
    }
}

/// Iterates over the documents of a delimiter-separated source.
pub struct DocumentReader<R: BufRead> {
    lines: Lines<R>,
    boundary: String,
    delimiter: char,
    line: usize,
    index: usize,
    current: Vec<Record>,
}

impl<R: BufRead> DocumentReader<R> {
    pub fn new<S: Into<String>>(reader: R, boundary: S, delimiter: char) -> Self {
        Self {
            lines: reader.lines(),
            boundary: boundary.into(),
            delimiter,
            line: 0,
            index: 0,
            current: Vec::new(),
        }
    }

    pub fn with_config(reader: R, config: &EvalConfig) -> Self {
        Self::new(reader, config.document_boundary(), config.delimiter())
    }

    fn emit(&mut self) -> RawDocument {
        let document = RawDocument {
            index: self.index,
            records: take(&mut self.current),
        };
        self.index += 1;
        document
    }
}

impl<R: BufRead> Iterator for DocumentReader<R> {
    type Item = Result<RawDocument, CorpusError>;
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next() {
                Some(Ok(line)) => line,
                Some(Err(e)) => return Some(Err(e.into())),
                None if self.current.is_empty() => return None,
                None => return Some(Ok(self.emit())),
            };
            self.line += 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let columns: Vec<String> = line.split(self.delimiter).map(String::from).collect();
            if columns[0] == self.boundary {
                if !self.current.is_empty() {
                    return Some(Ok(self.emit()));
                }
                continue;
            }
            self.current.push(Record {
                line: self.line,
                columns,
            });
        }
    }
}

/// Loads every document of a gold file.
pub fn load_gold<R: BufRead>(
    reader: R,
    config: &EvalConfig,
) -> Result<Vec<Vec<TaggedToken>>, CorpusError> {
    DocumentReader::with_config(reader, config)
        .map(|document| document?.to_tagged())
        .collect()
}

/// Loads every document of an aligned file.
pub fn load_aligned<R: BufRead>(
    reader: R,
    config: &EvalConfig,
) -> Result<Vec<Vec<AlignedToken>>, CorpusError> {
    DocumentReader::with_config(reader, config)
        .map(|document| document?.to_aligned())
        .collect()
}

/// Writes one document as `(token, label)` records, preceded by its boundary record.
pub fn write_tagged<W: Write>(
    writer: &mut W,
    tokens: &[TaggedToken],
    config: &EvalConfig,
) -> io::Result<()> {
    let d = config.delimiter();
    writeln!(writer, "{}{}{}", config.document_boundary(), d, Label::Outside)?;
    for token in tokens {
        writeln!(writer, "{}{}{}", token.text, d, token.label)?;
    }
    Ok(())
}

/// Writes one document as `(token, gold label, predicted label)` records, preceded by its
/// boundary record.
pub fn write_aligned<W: Write>(
    writer: &mut W,
    tokens: &[AlignedToken],
    config: &EvalConfig,
) -> io::Result<()> {
    let d = config.delimiter();
    let o = Label::Outside;
    writeln!(writer, "{}{}{}{}{}", config.document_boundary(), d, o, d, o)?;
    for token in tokens {
        writeln!(
            writer,
            "{}{}{}{}{}",
            token.text, d, token.gold, d, token.predicted
        )?;
    }
    Ok(())
}
