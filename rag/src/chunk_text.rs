//! Recursive character splitting.
//!
//! Text is cut at the coarsest natural break that keeps pieces within
//! `chunk_size` (paragraphs, then lines, then sentences, then words, then a
//! hard character cut). Pieces are then packed greedily into chunks, and the
//! trailing pieces of each chunk that fit in `chunk_overlap` are repeated at
//! the start of the next one.
//!
//! Every chunk is an exact span of the input, and consecutive spans overlap or
//! touch, so the original text can always be stitched back together.

use std::collections::VecDeque;

use crate::config::Config;
use crate::load_documents::Document;

const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// A contiguous span of one page of a document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub source_document: String,
    pub page: Option<usize>,
    /// Position within the whole document, counting across pages.
    pub chunk_index: usize,
    /// Byte offset of `text` inside the page text.
    pub start: usize,
}

#[derive(Clone, Copy, Debug)]
struct Piece {
    start: usize,
    end: usize,
    chars: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    /// Sizes are in characters. An overlap that is not smaller than the size
    /// is reduced to a quarter of the size.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        let chunk_overlap = if chunk_overlap >= chunk_size { chunk_size / 4 } else { chunk_overlap };
        Self { chunk_size, chunk_overlap }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.chunk_size(), cfg.chunk_overlap())
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Byte ranges of the chunks of `text`, in order.
    pub fn split_spans(&self, text: &str) -> Vec<(usize, usize)> {
        let mut pieces = Vec::new();
        split_pieces(text, 0, self.chunk_size, &SEPARATORS, &mut pieces);
        merge_pieces(&pieces, self.chunk_size, self.chunk_overlap)
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_spans(text)
            .into_iter()
            .map(|(start, end)| text[start..end].to_string())
            .collect()
    }
}

/// Split every page of `document`, numbering chunks across the document.
pub fn chunk_document(document: &Document, splitter: &TextSplitter) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for page in &document.pages {
        for (start, end) in splitter.split_spans(&page.text) {
            chunks.push(Chunk {
                text: page.text[start..end].to_string(),
                source_document: document.source.clone(),
                page: page.number,
                chunk_index: chunks.len(),
                start,
            });
        }
    }
    chunks
}

fn split_pieces(text: &str, offset: usize, size: usize, separators: &[&str], out: &mut Vec<Piece>) {
    if text.is_empty() {
        return;
    }
    let chars = text.chars().count();
    if chars <= size {
        out.push(Piece { start: offset, end: offset + text.len(), chars });
        return;
    }

    let Some((separator, rest)) = separators.split_first() else {
        hard_cut(text, offset, size, out);
        return;
    };

    let segments = split_keeping_separator(text, separator);
    if segments.len() == 1 {
        split_pieces(text, offset, size, rest, out);
        return;
    }
    for (start, end) in segments {
        split_pieces(&text[start..end], offset + start, size, rest, out);
    }
}

/// Split at `separator`, keeping it attached to the preceding segment.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<(usize, usize)> {
    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push((start, end));
        start = end;
    }

    if start < text.len() {
        result.push((start, text.len()));
    }

    result
}

fn hard_cut(text: &str, offset: usize, size: usize, out: &mut Vec<Piece>) {
    let mut start = 0;
    let mut chars = 0;
    for (idx, _) in text.char_indices() {
        if chars == size {
            out.push(Piece { start: offset + start, end: offset + idx, chars });
            start = idx;
            chars = 0;
        }
        chars += 1;
    }
    if chars > 0 {
        out.push(Piece { start: offset + start, end: offset + text.len(), chars });
    }
}

fn merge_pieces(pieces: &[Piece], size: usize, overlap: usize) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut window: VecDeque<Piece> = VecDeque::new();
    let mut total = 0usize;

    for piece in pieces {
        if total + piece.chars > size {
            if let (Some(first), Some(last)) = (window.front(), window.back()) {
                spans.push((first.start, last.end));
            }
            while total > overlap || (total > 0 && total + piece.chars > size) {
                match window.pop_front() {
                    Some(dropped) => total -= dropped.chars,
                    None => break,
                }
            }
        }
        window.push_back(*piece);
        total += piece.chars;
    }

    if let (Some(first), Some(last)) = (window.front(), window.back()) {
        spans.push((first.start, last.end));
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_a_single_chunk() {
        let splitter = TextSplitter::new(100, 10);
        assert_eq!(splitter.split("hello world"), vec!["hello world".to_string()]);
        assert!(splitter.split("").is_empty());
    }

    #[test]
    fn prefers_paragraph_breaks() {
        let text = format!("{}\n\n{}", "a".repeat(40), "b".repeat(40));
        let chunks = TextSplitter::new(50, 5).split(&text);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].starts_with('a') && chunks[0].ends_with("\n\n"));
        assert_eq!(chunks[1], "b".repeat(40));
    }

    #[test]
    fn hard_cut_respects_char_boundaries() {
        let text = "é".repeat(25);
        let chunks = TextSplitter::new(10, 2).split(&text);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn overlap_is_clamped_below_size() {
        let splitter = TextSplitter::new(8, 8);
        assert_eq!(splitter.chunk_overlap(), 2);
    }
}
