//! Splits the raw index stream into owned chunks at document boundaries.
//!
//! A document begins at a `---` marker line; the producer usually puts the
//! tag on the same line (`--- !Symbol`). Content before the first marker
//! counts as a document of its own. Chunks never split a document, so each
//! worker can parse its chunk independently.

/// One slice of the index stream, owned so workers never touch the file.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub text: String,
    /// Index of the first document in this chunk (0-based, whole stream).
    pub first_doc: usize,
    pub doc_count: usize,
}

/// Byte offsets at which documents start.
fn document_starts(content: &str) -> Vec<usize> {
    let mut starts = Vec::new();
    let mut leading: Option<usize> = None;
    let mut pos = 0;
    for line in content.split_inclusive('\n') {
        let trimmed = line.trim_end();
        // "---" alone or "--- !Symbol" with the tag inline; "----" and
        // longer runs are scalar content.
        if trimmed == "---" || trimmed.starts_with("--- ") {
            starts.push(pos);
        } else if starts.is_empty() && leading.is_none() && !trimmed.is_empty() {
            leading = Some(pos);
        }
        pos += line.len();
    }
    if let Some(offset) = leading {
        starts.insert(0, offset);
    }
    starts
}

/// Slice the stream into at most `target_chunks` chunks of whole documents.
///
/// An empty or whitespace-only stream yields no chunks.
pub fn split_documents(content: &str, target_chunks: usize) -> Vec<Chunk> {
    let starts = document_starts(content);
    let total = starts.len();
    if total == 0 {
        return Vec::new();
    }

    let target = target_chunks.max(1);
    let docs_per_chunk = total.div_ceil(target);

    let mut chunks = Vec::with_capacity(total.div_ceil(docs_per_chunk));
    let mut doc = 0;
    while doc < total {
        let last = (doc + docs_per_chunk).min(total);
        let begin = starts[doc];
        let end = if last < total {
            starts[last]
        } else {
            content.len()
        };
        chunks.push(Chunk {
            text: content[begin..end].to_string(),
            first_doc: doc,
            doc_count: last - doc,
        });
        doc = last;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(docs: usize) -> String {
        let mut s = String::new();
        for i in 0..docs {
            s.push_str("---\n");
            s.push_str(&format!("ID: '{:016X}'\n", i + 1));
        }
        s
    }

    #[test]
    fn test_empty_input_yields_no_chunks() {
        assert!(split_documents("", 4).is_empty());
        assert!(split_documents("\n\n  \n", 4).is_empty());
    }

    #[test]
    fn test_single_chunk_when_target_is_one() {
        let content = stream(10);
        let chunks = split_documents(&content, 1);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].doc_count, 10);
        assert_eq!(chunks[0].text, content);
    }

    #[test]
    fn test_documents_never_split_across_chunks() {
        let content = stream(11);
        let chunks = split_documents(&content, 4);
        assert!(chunks.len() <= 4);

        let total_docs: usize = chunks.iter().map(|c| c.doc_count).sum();
        assert_eq!(total_docs, 11);

        for chunk in &chunks {
            let markers = chunk
                .text
                .lines()
                .filter(|line| line.trim_end() == "---")
                .count();
            assert_eq!(markers, chunk.doc_count);
        }

        let rejoined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(rejoined, content);
    }

    #[test]
    fn test_leading_content_without_marker_is_a_document() {
        let content = "ID: 'AA'\nName: first\n---\nID: 'BB'\n";
        let chunks = split_documents(content, 1);
        assert_eq!(chunks[0].doc_count, 2);
        assert!(chunks[0].text.starts_with("ID: 'AA'"));
    }

    #[test]
    fn test_marker_with_inline_tag_starts_a_document() {
        let content = "--- !Symbol\nID: 'AA'\n--- !Refs\nID: 'BB'\n---- not a marker\n";
        let chunks = split_documents(content, 2);
        let total_docs: usize = chunks.iter().map(|c| c.doc_count).sum();
        assert_eq!(total_docs, 2);
        // The dashed scalar line stays inside the second document.
        assert!(chunks.last().unwrap().text.contains("---- not a marker"));
    }

    #[test]
    fn test_first_doc_indices_are_contiguous() {
        let content = stream(9);
        let chunks = split_documents(&content, 3);
        let mut expected = 0;
        for chunk in &chunks {
            assert_eq!(chunk.first_doc, expected);
            expected += chunk.doc_count;
        }
    }
}
