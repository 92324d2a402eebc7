//! Citations derived from the chunks that went into the prompt

use crate::types::{Citation, ScoredChunk};

/// Snippet length used for API citations
pub const SNIPPET_LEN: usize = 200;

/// One citation per (document, page), in first-appearance order.
///
/// `included` is best-first, so each citation carries the best score of the
/// chunks it stands for.
pub fn build_citations(included: &[ScoredChunk]) -> Vec<Citation> {
    let mut citations: Vec<Citation> = Vec::new();

    for scored in included {
        let seen = citations
            .iter()
            .any(|c| c.filename == scored.chunk.document && c.page == scored.chunk.page);
        if !seen {
            citations.push(Citation::from_scored(scored, SNIPPET_LEN));
        }
    }

    citations
}

/// Append one `[Source: file, Page: n]` line per citation
pub fn format_answer_with_sources(answer: &str, citations: &[Citation]) -> String {
    let mut formatted = answer.trim_end().to_string();
    if citations.is_empty() {
        return formatted;
    }

    formatted.push_str("\n\nSources:");
    for citation in citations {
        formatted.push('\n');
        formatted.push_str(&citation.format_inline());
    }
    formatted
}

/// Truncate snippet to a maximum length while preserving word boundaries
pub fn truncate_snippet(snippet: &str, max_len: usize) -> String {
    if snippet.len() <= max_len {
        return snippet.to_string();
    }

    let mut end = max_len;
    while end > 0 && !snippet.is_char_boundary(end) {
        end -= 1;
    }

    // Try to end at a word boundary
    if let Some(pos) = snippet[..end].rfind(' ') {
        return format!("{}...", &snippet[..pos]);
    }

    format!("{}...", &snippet[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Chunk;
    use uuid::Uuid;

    fn scored(document: &str, page: Option<u32>, score: f32) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                id: Uuid::new_v4(),
                document: document.to_string(),
                page,
                index: 0,
                text: format!("text from {}", document),
                char_start: 0,
                char_end: 0,
                overlap: 0,
            },
            score,
        }
    }

    #[test]
    fn test_citations_dedup_in_order() {
        let included = vec![
            scored("b.pdf", Some(2), 0.9),
            scored("a.txt", None, 0.8),
            scored("b.pdf", Some(2), 0.7),
            scored("b.pdf", Some(5), 0.6),
        ];
        let citations = build_citations(&included);

        let keys: Vec<(&str, Option<u32>)> = citations
            .iter()
            .map(|c| (c.filename.as_str(), c.page))
            .collect();
        assert_eq!(keys, vec![("b.pdf", Some(2)), ("a.txt", None), ("b.pdf", Some(5))]);
        assert_eq!(citations[0].score, 0.9);
    }

    #[test]
    fn test_format_answer_with_sources() {
        let citations = build_citations(&[scored("book.pdf", Some(4), 0.9), scored("sky.txt", None, 0.5)]);
        let answer = format_answer_with_sources("The sky is blue.\n", &citations);
        assert_eq!(
            answer,
            "The sky is blue.\n\nSources:\n[Source: book.pdf, Page: 4]\n[Source: sky.txt]"
        );
        assert_eq!(format_answer_with_sources("plain", &[]), "plain");
    }

    #[test]
    fn test_truncate_snippet() {
        let snippet = "This is a very long snippet that needs to be truncated.";
        let truncated = truncate_snippet(snippet, 20);

        assert!(truncated.len() <= 23);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncate_snippet("short", 20), "short");
        assert_eq!(truncate_snippet("ééééé", 3), "é...");
    }
}
