//! Text chunking with page and position tracking

use std::collections::BTreeSet;

use unicode_segmentation::UnicodeSegmentation;
use uuid::Uuid;

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};
use crate::types::Chunk;

use super::parser::PageSpan;

/// Splits text into overlapping windows of bounded size
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Maximum chunk size in characters
    chunk_size: usize,
    /// Overlap between consecutive chunks in characters
    overlap: usize,
}

impl TextChunker {
    /// Create a new chunker; `overlap` must be smaller than `chunk_size`
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        ChunkingConfig {
            chunk_size,
            chunk_overlap: overlap,
        }
        .validate()?;

        Ok(Self { chunk_size, overlap })
    }

    /// Create from config
    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split a document's text into chunks tagged with provenance.
    ///
    /// Windows ending before the end of the text break at a sentence
    /// boundary, then a word boundary, within the second half of the window.
    /// Each chunk records how many leading bytes it shares with its
    /// predecessor, so dropping them and concatenating restores `text`.
    pub fn split(&self, text: &str, document: &str, pages: &[PageSpan]) -> Vec<Chunk> {
        if text.trim().is_empty() {
            tracing::debug!("'{}' has no text, producing no chunks", document);
            return Vec::new();
        }

        // Byte offset of every char, plus the end of text
        let offsets: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let total_chars = offsets.len() - 1;

        let sentence_breaks: BTreeSet<usize> = text
            .split_sentence_bound_indices()
            .map(|(i, _)| i)
            .collect();
        let word_breaks: BTreeSet<usize> = text
            .split_word_bound_indices()
            .filter(|(_, w)| w.chars().all(char::is_whitespace))
            .map(|(i, w)| i + w.len())
            .collect();

        let mut chunks = Vec::new();
        let mut start = 0usize;
        let mut prev_end = 0usize;

        loop {
            let hard_end = (start + self.chunk_size).min(total_chars);
            let end = if hard_end == total_chars {
                hard_end
            } else {
                // Every window must reach past the previous one
                let floor = offsets[(start + self.chunk_size / 2).max(prev_end)];
                let ceiling = offsets[hard_end];
                last_break(&sentence_breaks, floor, ceiling)
                    .or_else(|| last_break(&word_breaks, floor, ceiling))
                    .and_then(|byte| offsets.binary_search(&byte).ok())
                    .unwrap_or(hard_end)
            };

            let start_byte = offsets[start];
            let end_byte = offsets[end];
            let chunk_text = &text[start_byte..end_byte];
            let lead = chunk_text.len() - chunk_text.trim_start().len();

            chunks.push(Chunk {
                id: Uuid::new_v4(),
                document: document.to_string(),
                page: page_at(pages, start_byte + lead),
                index: chunks.len() as u32,
                text: chunk_text.to_string(),
                char_start: start_byte,
                char_end: end_byte,
                overlap: offsets[prev_end].saturating_sub(start_byte),
            });

            if end == total_chars {
                break;
            }

            prev_end = end;
            start = end.saturating_sub(self.overlap).max(start + 1);
        }

        tracing::debug!("Split '{}' into {} chunks", document, chunks.len());
        chunks
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        let config = ChunkingConfig::default();
        Self {
            chunk_size: config.chunk_size,
            overlap: config.chunk_overlap,
        }
    }
}

/// Largest break position in `(floor, ceiling]`
fn last_break(breaks: &BTreeSet<usize>, floor: usize, ceiling: usize) -> Option<usize> {
    if floor >= ceiling {
        return None;
    }
    breaks
        .range((std::ops::Bound::Excluded(floor), std::ops::Bound::Included(ceiling)))
        .next_back()
        .copied()
}

/// Page whose span covers `offset`; the first page when `offset` precedes all spans
fn page_at(pages: &[PageSpan], offset: usize) -> Option<u32> {
    pages
        .iter()
        .take_while(|p| p.char_offset <= offset)
        .last()
        .or_else(|| pages.first())
        .map(|p| p.page_number)
}

/// Rebuild a document's text from its chunks (ordered by index)
pub fn reconstruct(chunks: &[Chunk]) -> String {
    let mut ordered: Vec<&Chunk> = chunks.iter().collect();
    ordered.sort_by_key(|c| c.index);
    ordered.iter().map(|c| c.fresh_text()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_overlap_must_be_smaller() {
        assert!(matches!(TextChunker::new(100, 100), Err(Error::Config(_))));
        assert!(matches!(TextChunker::new(0, 0), Err(Error::Config(_))));
        assert!(TextChunker::new(100, 99).is_ok());
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        let chunker = TextChunker::new(100, 10).unwrap();
        assert!(chunker.split("", "a.txt", &[]).is_empty());
        assert!(chunker.split("  \n\t ", "a.txt", &[]).is_empty());
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunker = TextChunker::new(1000, 200).unwrap();
        let text = "The sky is blue. Grass is green.";
        let chunks = chunker.split(text, "sky.txt", &[]);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
        assert_eq!(chunks[0].document, "sky.txt");
        assert_eq!(chunks[0].page, None);
        assert_eq!(chunks[0].overlap, 0);
    }

    #[test]
    fn test_windows_are_bounded_and_overlap() {
        let chunker = TextChunker::new(40, 10).unwrap();
        let text = "Alpha beta gamma delta. Epsilon zeta eta theta. Iota kappa lambda mu. \
                    Nu xi omicron pi. Rho sigma tau upsilon. Phi chi psi omega.";
        let chunks = chunker.split(text, "greek.txt", &[]);

        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert!(!chunk.text.is_empty());
            assert!(chunk.text.chars().count() <= 40);
            assert_eq!(chunk.index as usize, i);
            if i > 0 {
                assert!(chunk.overlap > 0);
                assert!(chunk.char_start < chunks[i - 1].char_end);
            }
        }
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn test_prefers_sentence_boundaries() {
        let chunker = TextChunker::new(30, 5).unwrap();
        let text = "One short sentence. Another sentence follows here.";
        let chunks = chunker.split(text, "s.txt", &[]);
        assert_eq!(chunks[0].text, "One short sentence. ");
    }

    #[test]
    fn test_page_tagging() {
        let chunker = TextChunker::new(20, 0).unwrap();
        let text = "page one text here.\n\npage two text here.";
        let pages = [
            PageSpan { page_number: 1, char_offset: 0 },
            PageSpan { page_number: 2, char_offset: 21 },
        ];
        let chunks = chunker.split(text, "doc.pdf", &pages);

        assert_eq!(chunks.first().unwrap().page, Some(1));
        assert_eq!(chunks.last().unwrap().page, Some(2));
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn test_multibyte_text() {
        let chunker = TextChunker::new(7, 3).unwrap();
        let text = "héllo wörld ünïcode ストリング テスト";
        let chunks = chunker.split(text, "u.txt", &[]);
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 7);
        }
        assert_eq!(reconstruct(&chunks), text);
    }

    proptest! {
        #[test]
        fn prop_reconstructs_text(
            text in "[a-zA-Z .,!?\n\u{e9}\u{4e2d}]{1,400}",
            size in 1usize..80,
            overlap_frac in 0.0f64..1.0,
        ) {
            let overlap = ((size as f64) * overlap_frac) as usize;
            let overlap = overlap.min(size - 1);
            let chunker = TextChunker::new(size, overlap).unwrap();
            let chunks = chunker.split(&text, "p.txt", &[]);

            if text.trim().is_empty() {
                prop_assert!(chunks.is_empty());
            } else {
                prop_assert_eq!(reconstruct(&chunks), text.clone());
                for chunk in &chunks {
                    prop_assert!(!chunk.text.is_empty());
                    prop_assert!(chunk.text.chars().count() <= size);
                    prop_assert_eq!(&text[chunk.char_start..chunk.char_end], chunk.text.as_str());
                }
            }
        }
    }
}
