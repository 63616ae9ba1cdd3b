//! Lay a search result out as file sections, snippet blocks and numbered
//! rows, and format that as plain text for the terminal.

use std::fmt::Write;

use crate::annotations::{resolve_line, AnnotationStore};
use crate::models::{LineRange, QaPair, SearchResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedRow<'a> {
    /// 1-based position inside the block
    pub visual_row: u32,
    /// Absolute line, or `None` when the code runs past the range end
    pub line: Option<u32>,
    pub text: &'a str,
    pub thread: &'a [QaPair],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedBlock<'a> {
    pub token: &'a str,
    pub range: LineRange,
    pub rows: Vec<RenderedRow<'a>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFile<'a> {
    pub path: &'a str,
    /// Every range entry of every snippet, flattened in display order
    pub blocks: Vec<RenderedBlock<'a>>,
}

pub fn render<'a>(result: &'a SearchResult, annotations: &'a AnnotationStore) -> Vec<RenderedFile<'a>> {
    result
        .files
        .iter()
        .map(|file| {
            let blocks = file
                .snippets
                .iter()
                .flat_map(|snippet| snippet.entries.iter())
                .map(|entry| {
                    let rows = entry
                        .code
                        .lines()
                        .zip(1u32..)
                        .map(|(text, visual_row)| {
                            let line = resolve_line(entry.range.start, visual_row)
                                .filter(|line| entry.range.contains(*line));
                            RenderedRow {
                                visual_row,
                                line,
                                text,
                                thread: line
                                    .map(|line| annotations.thread(&file.path, line))
                                    .unwrap_or_default(),
                            }
                        })
                        .collect();
                    RenderedBlock {
                        token: &entry.token,
                        range: entry.range,
                        rows,
                    }
                })
                .collect();
            RenderedFile {
                path: &file.path,
                blocks,
            }
        })
        .collect()
}

/// Plain-text listing: block headers are numbered so a row can be picked as
/// `<file> <block> <row>`.
pub fn format_result(files: &[RenderedFile<'_>]) -> String {
    if files.is_empty() {
        return "No matching code found.\n".to_string();
    }

    let mut out = String::new();
    for file in files {
        writeln!(out, "== {}", file.path).unwrap();
        for (i, block) in file.blocks.iter().enumerate() {
            writeln!(out, "  [{}] Lines {}:", i + 1, block.token).unwrap();
            let width = block.range.end.to_string().len();
            for row in &block.rows {
                let marker = if row.thread.is_empty() { ' ' } else { '*' };
                match row.line {
                    Some(line) => {
                        writeln!(out, "  {marker}{line:>width$} | {}", row.text).unwrap();
                    }
                    None => {
                        writeln!(out, "  {marker}{:>width$} | {}", "", row.text).unwrap();
                    }
                }
                for qa in row.thread {
                    writeln!(out, "  {:>width$}   Q: {}", "", qa.question).unwrap();
                    writeln!(out, "  {:>width$}   A: {}", "", qa.answer).unwrap();
                }
            }
        }
    }
    out
}
