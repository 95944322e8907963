/*!
 * Structure-aware chunking of chapter markup.
 *
 * Body content is cut only right after a closing `</p>`, `</div>` or
 * `</h1>`..`</h6>` tag that is followed by whitespace, so a cut never lands
 * inside a tag or a word. Consecutive segments are packed greedily into
 * chunks of at most `max_chunk_size` characters, joined by a single space.
 * A segment that alone exceeds the limit becomes its own oversized chunk.
 */

use once_cell::sync::Lazy;
use regex::Regex;

use super::reassembly::Skeleton;

/// Closing block tag followed by whitespace; group 1 is the tag itself
static SPLIT_POINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(</(?:p|div|h[1-6])\s*>)\s+").expect("Invalid split point regex"));

/// One translation unit of a chapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Chapter path inside the archive
    pub chapter_path: String,
    /// 0-based position within the chapter
    pub index: usize,
    /// Source markup
    pub text: String,
}

/// Result of chunking one chapter
#[derive(Debug, Clone)]
pub struct ChunkedChapter {
    /// Chunk texts in document order
    pub chunks: Vec<String>,
    /// Document shell; `None` when the chapter has no body element and the
    /// whole file content is one opaque chunk
    pub skeleton: Option<Skeleton>,
}

impl ChunkedChapter {
    pub fn has_structural_skeleton(&self) -> bool {
        self.skeleton.is_some()
    }

    /// Attach chunk identities for a chapter
    pub fn into_chunks(self, chapter_path: &str) -> (Vec<Chunk>, Option<Skeleton>) {
        let chunks = self
            .chunks
            .into_iter()
            .enumerate()
            .map(|(index, text)| Chunk {
                chapter_path: chapter_path.to_string(),
                index,
                text,
            })
            .collect();
        (chunks, self.skeleton)
    }
}

/// Splits chapter markup into size-bounded chunks
#[derive(Debug, Clone, Copy)]
pub struct MarkupChunker {
    max_chunk_size: usize,
}

impl MarkupChunker {
    /// Create a chunker; sizes are counted in characters
    pub fn new(max_chunk_size: usize) -> Self {
        Self {
            max_chunk_size: max_chunk_size.max(1),
        }
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    /// Split a whole chapter file
    pub fn split(&self, markup: &str) -> ChunkedChapter {
        match Skeleton::parse(markup) {
            Some((skeleton, body)) => ChunkedChapter {
                chunks: self.split_body(body),
                skeleton: Some(skeleton),
            },
            None => ChunkedChapter {
                chunks: if markup.trim().is_empty() {
                    Vec::new()
                } else {
                    vec![markup.to_string()]
                },
                skeleton: None,
            },
        }
    }

    /// Split body content into packed chunks
    pub fn split_body(&self, body: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut buffer = String::new();
        let mut buffer_len = 0usize;

        for segment in split_segments(body) {
            let segment_len = segment.chars().count();
            let separator = usize::from(!buffer.is_empty());

            if !buffer.is_empty() && buffer_len + separator + segment_len > self.max_chunk_size {
                chunks.push(std::mem::take(&mut buffer));
                buffer_len = 0;
            }

            if !buffer.is_empty() {
                buffer.push(' ');
                buffer_len += 1;
            }
            buffer.push_str(segment);
            buffer_len += segment_len;
        }

        if !buffer.trim().is_empty() {
            chunks.push(buffer);
        }
        chunks
    }
}

/// Cut body content after every closing block tag followed by whitespace.
/// The whitespace itself is dropped; blank segments are skipped.
pub fn split_segments(body: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;

    for captures in SPLIT_POINT.captures_iter(body) {
        let (Some(whole), Some(tag)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let segment = &body[start..tag.end()];
        if !segment.trim().is_empty() {
            segments.push(segment);
        }
        start = whole.end();
    }

    let rest = &body[start..];
    if !rest.trim().is_empty() {
        segments.push(rest);
    }
    segments
}
