use anyhow::{bail, Context, Result};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Inclusive line span of a snippet range entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineRange {
    pub start: u32,
    pub end: u32,
}

impl LineRange {
    pub fn contains(&self, line: u32) -> bool {
        (self.start..=self.end).contains(&line)
    }
}

impl Default for LineRange {
    fn default() -> Self {
        Self { start: 1, end: 1 }
    }
}

/// Parse a `"<start>:<end>"` token.
///
/// Malformed tokens (non-numeric, missing or extra parts, start past end)
/// fall back to `1:1` rather than failing the whole result.
pub fn parse_line_range(token: &str) -> LineRange {
    let mut parts = token.split(':');
    let (Some(start), Some(end), None) = (parts.next(), parts.next(), parts.next()) else {
        return LineRange::default();
    };
    match (start.trim().parse::<u32>(), end.trim().parse::<u32>()) {
        (Ok(start), Ok(end)) if start <= end => LineRange { start, end },
        _ => LineRange::default(),
    }
}

/// One `"<start>:<end>" -> code` entry of a snippet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeEntry {
    /// Token exactly as the backend sent it
    pub token: String,
    pub range: LineRange,
    pub code: String,
}

/// A block of source for one file. Usually one range entry, sometimes more.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snippet {
    pub entries: Vec<RangeEntry>,
}

/// All snippets returned for one file path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSnippets {
    pub path: String,
    pub snippets: Vec<Snippet>,
}

/// Search response: file path -> snippets, in the order the backend sent them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResult {
    pub files: Vec<FileSnippets>,
}

impl SearchResult {
    /// Build a result from a decoded JSON body, checking every level of the
    /// shape instead of trusting the backend.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(files) = value else {
            bail!("search response is not an object");
        };

        let mut result = SearchResult::default();
        for (path, snippets) in files {
            let Value::Array(snippets) = snippets else {
                bail!("snippets for '{path}' are not an array");
            };
            let mut parsed = Vec::with_capacity(snippets.len());
            for (i, snippet) in snippets.into_iter().enumerate() {
                let Value::Object(ranges) = snippet else {
                    bail!("snippet {i} for '{path}' is not an object");
                };
                let mut entries = Vec::with_capacity(ranges.len());
                for (token, code) in ranges {
                    let Value::String(code) = code else {
                        bail!("code for '{path}' range '{token}' is not a string");
                    };
                    entries.push(RangeEntry {
                        range: parse_line_range(&token),
                        token,
                        code,
                    });
                }
                parsed.push(Snippet { entries });
            }
            result.files.push(FileSnippets {
                path,
                snippets: parsed,
            });
        }
        Ok(result)
    }

    pub fn from_json(body: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(body).context("search response is not JSON")?;
        Self::from_value(value)
    }

    pub fn file(&self, path: &str) -> Option<&FileSnippets> {
        self.files.iter().find(|f| f.path == path)
    }

    /// Range entries of `path`, flattened across its snippets.
    pub fn ranges<'a>(&'a self, path: &str) -> impl Iterator<Item = LineRange> + 'a {
        self.file(path)
            .into_iter()
            .flat_map(|f| f.snippets.iter())
            .flat_map(|s| s.entries.iter())
            .map(|e| e.range)
    }

    /// Whether `line` of `path` lies inside one of the returned snippets.
    pub fn covers_line(&self, path: &str, line: u32) -> bool {
        self.ranges(path).any(|range| range.contains(line))
    }

    /// Whether `range` is one of the ranges returned for `path`.
    pub fn has_range(&self, path: &str, range: LineRange) -> bool {
        self.ranges(path).any(|r| r == range)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

// Serializes back to the wire shape, so a result can be echoed as
// `current_context` on a comment request.
impl Serialize for SearchResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.files.len()))?;
        for file in &self.files {
            map.serialize_entry(&file.path, &SnippetList(&file.snippets))?;
        }
        map.end()
    }
}

struct SnippetList<'a>(&'a [Snippet]);

impl Serialize for SnippetList<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for snippet in self.0 {
            seq.serialize_element(snippet)?;
        }
        seq.end()
    }
}

impl Serialize for Snippet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.token, &entry.code)?;
        }
        map.end()
    }
}

/// One question/answer pair in a line's thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

/// Search request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchRequest {
    pub github_url: String,
    pub query: String,
}

/// Follow-up question about one line of the current result
#[derive(Debug, Clone, Serialize)]
pub struct CommentRequest {
    pub query: String,
    pub current_context: Option<SearchResult>,
    pub current_file: Option<String>,
    pub current_line: Option<u32>,
}

/// Pull the answer text out of a `{"response": "..."}` body.
pub fn parse_comment_response(value: &Value) -> Result<String> {
    value
        .get("response")
        .and_then(Value::as_str)
        .map(str::to_string)
        .context("comment response has no string 'response' field")
}
