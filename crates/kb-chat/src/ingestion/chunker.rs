//! Sentence-aware text chunking with position and section tracking

use unicode_segmentation::UnicodeSegmentation;

use crate::types::{Chunk, ChunkSource, Document, FileType};

/// Text chunker with configurable size and overlap
pub struct TextChunker {
    /// Target chunk size in characters
    chunk_size: usize,
    /// Overlap between chunks
    overlap: usize,
    /// Chunks are not cut before reaching this size
    min_size: usize,
}

/// Contiguous part of a document under one heading
struct Section<'a> {
    title: Option<String>,
    text: &'a str,
    offset: usize,
}

impl TextChunker {
    /// Create a new chunker
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            overlap: overlap.min(chunk_size.saturating_sub(1)),
            min_size: 50.min(chunk_size),
        }
    }

    /// Chunk a document's text; markdown is split at headings first
    pub fn chunk_document(&self, doc: &Document, content: &str) -> Vec<Chunk> {
        let sections = if doc.file_type == FileType::Markdown {
            split_markdown_sections(content)
        } else {
            vec![Section {
                title: None,
                text: content,
                offset: 0,
            }]
        };

        let mut chunks = Vec::new();
        for section in sections {
            let next_index = chunks.len() as u32;
            chunks.extend(self.chunk_section(doc, &section, next_index));
        }
        chunks
    }

    fn chunk_section(&self, doc: &Document, section: &Section<'_>, start_index: u32) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut current_chunk = String::new();
        let mut current_start = 0usize;
        let mut chunk_index = start_index;
        let mut char_pos = 0usize;

        for sentence in section.text.split_sentence_bounds() {
            if current_chunk.len() >= self.min_size
                && current_chunk.len() + sentence.len() > self.chunk_size
            {
                self.push_chunk(
                    &mut chunks,
                    doc,
                    section,
                    &current_chunk,
                    current_start,
                    char_pos,
                    &mut chunk_index,
                );

                let overlap_text = self.get_overlap_text(&current_chunk);
                current_start = char_pos.saturating_sub(overlap_text.len());
                current_chunk = overlap_text;
                if !current_chunk.is_empty() {
                    current_chunk.push(' ');
                }
            }

            current_chunk.push_str(sentence);
            char_pos += sentence.len();
        }

        self.push_chunk(
            &mut chunks,
            doc,
            section,
            &current_chunk,
            current_start,
            char_pos,
            &mut chunk_index,
        );
        chunks
    }

    #[allow(clippy::too_many_arguments)]
    fn push_chunk(
        &self,
        chunks: &mut Vec<Chunk>,
        doc: &Document,
        section: &Section<'_>,
        text: &str,
        start: usize,
        end: usize,
        chunk_index: &mut u32,
    ) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        let mut source = ChunkSource::new(doc.filename.clone(), doc.file_type.clone());
        source.section_title = section.title.clone();

        chunks.push(Chunk::new(
            doc.id,
            text.to_string(),
            source,
            section.offset + start,
            section.offset + end,
            *chunk_index,
        ));
        *chunk_index += 1;
    }

    /// Get overlap text from the end of a chunk
    fn get_overlap_text(&self, text: &str) -> String {
        if self.overlap == 0 {
            return String::new();
        }
        let text = text.trim_end();
        if text.len() <= self.overlap {
            return text.to_string();
        }

        let mut start = text.len().saturating_sub(self.overlap);
        while start > 0 && !text.is_char_boundary(start) {
            start -= 1;
        }

        let overlap_text = &text[start..];

        // Prefer starting at a sentence, then a word boundary
        if let Some(pos) = overlap_text.find(". ") {
            return overlap_text[pos + 2..].to_string();
        }
        if let Some(pos) = overlap_text.find(' ') {
            return overlap_text[pos + 1..].to_string();
        }

        overlap_text.to_string()
    }
}

/// Split markdown at ATX headings (`#` .. `######`)
fn split_markdown_sections(content: &str) -> Vec<Section<'_>> {
    let mut sections = Vec::new();
    let mut title: Option<String> = None;
    let mut section_start = 0usize;
    let mut offset = 0usize;

    for line in content.split_inclusive('\n') {
        if let Some(heading) = heading_text(line) {
            if offset > section_start {
                sections.push(Section {
                    title: title.clone(),
                    text: &content[section_start..offset],
                    offset: section_start,
                });
            }
            title = Some(heading);
            section_start = offset;
        }
        offset += line.len();
    }

    if offset > section_start {
        sections.push(Section {
            title,
            text: &content[section_start..offset],
            offset: section_start,
        });
    }
    sections
}

fn heading_text(line: &str) -> Option<String> {
    let trimmed = line.trim_end();
    let hashes = trimmed.chars().take_while(|c| *c == '#').count();
    if !(1..=6).contains(&hashes) {
        return None;
    }
    let rest = &trimmed[hashes..];
    if !rest.starts_with(' ') {
        return None;
    }
    let title = rest.trim().trim_end_matches('#').trim();
    (!title.is_empty()).then(|| title.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(file_type: FileType) -> Document {
        Document::new("notes".into(), file_type, "hash".into(), 0)
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunker = TextChunker::new(512, 50);
        let chunks = chunker.chunk_document(&doc(FileType::Txt), "Just one short sentence.");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Just one short sentence.");
        assert_eq!(chunks[0].chunk_index, 0);
    }

    #[test]
    fn test_long_text_splits_on_sentences_with_overlap() {
        let text = (0..40)
            .map(|i| format!("Sentence number {} talks about topic {}.", i, i % 7))
            .collect::<Vec<_>>()
            .join(" ");
        let chunker = TextChunker::new(200, 40);
        let chunks = chunker.chunk_document(&doc(FileType::Txt), &text);

        assert!(chunks.len() > 5);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index as usize, i);
            assert!(chunk.content.len() <= 200 + 60, "chunk too large: {}", chunk.content.len());
            assert!(chunk.content.trim_end().ends_with('.'));
        }
        // Consecutive chunks share text
        let tail: String = chunks[0].content.chars().rev().take(10).collect::<String>();
        let tail: String = tail.chars().rev().collect();
        assert!(chunks[1].content.contains(&tail));
    }

    #[test]
    fn test_markdown_sections_carry_titles() {
        let text = "Intro paragraph.\n\n# Install\nRun the installer.\n\n## Configure ##\nSet the key.\n";
        let chunks = TextChunker::new(512, 50).chunk_document(&doc(FileType::Markdown), text);

        let titles: Vec<Option<&str>> = chunks
            .iter()
            .map(|c| c.source.section_title.as_deref())
            .collect();
        assert_eq!(titles, vec![None, Some("Install"), Some("Configure")]);
        assert!(chunks[1].content.contains("Run the installer."));
        assert_eq!(&text[chunks[2].char_start..chunks[2].char_start + 2], "##");
    }

    #[test]
    fn test_heading_text() {
        assert_eq!(heading_text("### Title\n"), Some("Title".into()));
        assert_eq!(heading_text("#hashtag"), None);
        assert_eq!(heading_text("####### too deep"), None);
        assert_eq!(heading_text("# \n"), None);
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        assert!(TextChunker::new(512, 50)
            .chunk_document(&doc(FileType::Txt), "  \n ")
            .is_empty());
    }
}
