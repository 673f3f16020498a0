//! Overlapping, sentence-aware text chunking.
//!
//! Splits extracted document text into windows of at most `size`
//! characters, preferring to cut just after the last sentence-terminating
//! period inside the window. Consecutive chunks overlap by `overlap`
//! characters so retrieval never loses context at a boundary.
//!
//! Operates on character indices, not bytes, so multi-byte text (e.g.
//! Arabic) can never be split inside a UTF-8 sequence.

/// Split `text` into trimmed, non-empty, overlapping segments.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let size = size.max(1);
    // Clamped so the window always advances; validated at config load too.
    let overlap = overlap.min(size - 1);

    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();

    if total <= size {
        let trimmed = text.trim();
        return if trimmed.is_empty() {
            Vec::new()
        } else {
            vec![trimmed.to_string()]
        };
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < total {
        let window_end = (start + size).min(total);
        let mut end = window_end;

        if window_end < total {
            // Prefer the last sentence boundary in the window, but only a
            // cut past the overlap keeps the next window moving forward.
            if let Some(rel) = chars[start..window_end].iter().rposition(|&c| c == '.') {
                if rel + 1 > overlap {
                    end = start + rel + 1;
                }
            }
        }

        let segment: String = chars[start..end].iter().collect();
        let segment = segment.trim();
        if !segment.is_empty() {
            chunks.push(segment.to_string());
        }

        if end >= total {
            break;
        }
        start = end - overlap;
    }

    chunks
}
