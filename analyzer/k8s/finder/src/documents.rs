//! Splits multi-document YAML files.
//!
//! `serde_yaml` can iterate over the documents of a stream, but it doesn't report where each one
//! starts, and a syntax error poisons the whole stream. The splitter therefore cuts the file on
//! document markers itself and decodes each chunk separately, so that errors point at the
//! offending document.

use crate::error::ProcessingError;
use serde_yaml::Value;
use std::{borrow::Cow, path::PathBuf, vec};

/// A document that decoded to a mapping.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    /// 0-based position among all the documents of the file, including dropped ones.
    pub index: usize,

    /// 1-based line on which the document starts.
    pub line: usize,

    pub value: Value,
}

/// Iterates over the mapping documents of a file, decoding them one at a time.
///
/// Non-mapping documents are skipped. The first malformed document is reported as an error and
/// ends the iteration.
#[derive(Debug)]
pub struct Documents<'s> {
    path: PathBuf,
    chunks: vec::IntoIter<Chunk<'s>>,
    index: usize,
    done: bool,
}

#[derive(Debug)]
struct Chunk<'s> {
    line: usize,
    text: Cow<'s, str>,
}

/// Splits `src`, read from `path`, into documents.
pub fn split(path: impl Into<PathBuf>, src: &str) -> Documents<'_> {
    Documents {
        path: path.into(),
        chunks: chunks(src).into_iter(),
        index: 0,
        done: false,
    }
}

// === impl Documents ===

impl Iterator for Documents<'_> {
    type Item = Result<Document, ProcessingError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        for Chunk { line, text } in self.chunks.by_ref() {
            let index = self.index;
            self.index += 1;

            if !has_content(&text) {
                continue;
            }
            let value = match serde_yaml::from_str::<Value>(&text) {
                Ok(value) => value,
                Err(error) => {
                    self.done = true;
                    return Some(Err(ProcessingError::malformed_yaml(
                        self.path.clone(),
                        line,
                        index,
                        error,
                    )));
                }
            };
            if value.is_mapping() {
                return Some(Ok(Document { index, line, value }));
            }
        }

        self.done = true;
        None
    }
}

/// Cuts `src` on document markers.
///
/// Every document opened by a `---` marker is kept, even when empty. Content that isn't preceded
/// by a marker (at the start of the stream, or after a `...` end marker) is only kept when it
/// holds something other than blank lines, comments and directives.
fn chunks(src: &str) -> Vec<Chunk<'_>> {
    struct Open<'s> {
        line: usize,
        head: Option<&'s str>,
        start: usize,
        explicit: bool,
    }

    fn close<'s>(chunks: &mut Vec<Chunk<'s>>, open: Open<'s>, body: &'s str) {
        let text = match open.head {
            Some(head) => Cow::Owned(format!("{}\n{}", head, body)),
            None => Cow::Borrowed(body),
        };
        if open.explicit || has_content(&text) {
            chunks.push(Chunk {
                line: open.line,
                text,
            });
        }
    }

    let mut chunks = Vec::new();
    let mut open = Open {
        line: 1,
        head: None,
        start: 0,
        explicit: false,
    };
    let mut offset = 0;

    for (i, raw) in src.split_inclusive('\n').enumerate() {
        let end = offset + raw.len();
        let line = raw.trim_end_matches(|c: char| c == '\n' || c == '\r');

        if let Some(head) = document_start(line) {
            let body = &src[open.start..offset];
            close(&mut chunks, open, body);
            open = Open {
                line: i + 1,
                head: Some(head).filter(|h| !h.trim().is_empty()),
                start: end,
                explicit: true,
            };
        } else if is_document_end(line) {
            let body = &src[open.start..offset];
            close(&mut chunks, open, body);
            open = Open {
                line: i + 2,
                head: None,
                start: end,
                explicit: false,
            };
        }
        offset = end;
    }
    let body = &src[open.start..];
    close(&mut chunks, open, body);

    chunks
}

/// Returns the content following a `---` marker, if `line` is one.
fn document_start(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("---")?;
    if rest.is_empty() || rest.starts_with(' ') || rest.starts_with('\t') {
        return Some(rest);
    }
    None
}

fn is_document_end(line: &str) -> bool {
    match line.strip_prefix("...") {
        Some(rest) => rest.trim().is_empty() || rest.trim_start().starts_with('#'),
        None => false,
    }
}

/// Returns true if `text` holds anything but blank lines, comments and directives.
fn has_content(text: &str) -> bool {
    text.lines().any(|line| {
        let line = line.trim();
        !(line.is_empty() || line.starts_with('#') || line.starts_with('%'))
    })
}
