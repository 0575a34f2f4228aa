
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{LoreError, Result};

/// A bounded segment of extracted text ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Zero-based position of this chunk within its document
    pub index: usize,
    pub text: String,
    /// Approximate character offsets into the extracted text.
    /// `None` for chunks cut by the sliding window.
    pub start: Option<usize>,
    pub end: Option<usize>,
}

/// Configuration for text chunking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    pub max_chars: usize,
    /// Characters shared between consecutive chunks
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            max_chars: 1200,
            overlap: 150,
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub fn validate(&self) -> Result<()> {
        if self.max_chars == 0 {
            return Err(LoreError::Chunking(
                "max_chars must be greater than zero".to_string(),
            ));
        }
        if self.overlap >= self.max_chars {
            return Err(LoreError::Chunking(format!(
                "overlap ({}) must be smaller than max_chars ({})",
                self.overlap, self.max_chars
            )));
        }
        Ok(())
    }

    /// How far the sliding window moves per step, never less than one character
    #[inline]
    pub fn window_step(&self) -> usize {
        self.max_chars.saturating_sub(self.overlap).max(1)
    }
}

/// Split text into paragraph-aligned chunks of at most `max_chars` characters.
///
/// Paragraphs (blank-line separated) are packed greedily. A paragraph that
/// alone exceeds the limit is cut with a sliding window instead, and those
/// pieces carry no offsets.
#[inline]
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Result<Vec<TextChunk>> {
    config.validate()?;

    let normalized = text.replace("\r\n", "\n");
    let paragraphs: Vec<&str> = normalized
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    let mut builder = ChunkBuilder::new(config);
    for paragraph in paragraphs {
        builder.push_paragraph(paragraph);
    }
    let chunks = builder.finish();

    debug!(
        "Chunked {} chars into {} chunks (max {} chars, overlap {})",
        normalized.chars().count(),
        chunks.len(),
        config.max_chars,
        config.overlap
    );

    Ok(chunks)
}

struct ChunkBuilder<'a> {
    config: &'a ChunkingConfig,
    chunks: Vec<TextChunk>,
    buffer: String,
    buffer_chars: usize,
    cursor: usize,
}

impl<'a> ChunkBuilder<'a> {
    fn new(config: &'a ChunkingConfig) -> Self {
        Self {
            config,
            chunks: Vec::new(),
            buffer: String::new(),
            buffer_chars: 0,
            cursor: 0,
        }
    }

    fn push_paragraph(&mut self, paragraph: &str) {
        let paragraph_chars = paragraph.chars().count();
        let candidate_chars = if self.buffer.is_empty() {
            paragraph_chars
        } else {
            self.buffer_chars + 2 + paragraph_chars
        };

        if candidate_chars <= self.config.max_chars {
            if !self.buffer.is_empty() {
                self.buffer.push_str("\n\n");
            }
            self.buffer.push_str(paragraph);
            self.buffer_chars = candidate_chars;
            return;
        }

        self.flush();

        if paragraph_chars <= self.config.max_chars {
            self.buffer.push_str(paragraph);
            self.buffer_chars = paragraph_chars;
        } else {
            self.push_windows(paragraph, paragraph_chars);
        }
    }

    fn push_windows(&mut self, paragraph: &str, paragraph_chars: usize) {
        let chars: Vec<char> = paragraph.chars().collect();
        let step = self.config.window_step();
        let mut start = 0;

        while start < paragraph_chars {
            let end = (start + self.config.max_chars).min(paragraph_chars);
            self.chunks.push(TextChunk {
                index: self.chunks.len(),
                text: chars[start..end].iter().collect(),
                start: None,
                end: None,
            });
            start += step;
        }
    }

    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }

        let start = self.cursor;
        let end = start + self.buffer_chars;
        self.chunks.push(TextChunk {
            index: self.chunks.len(),
            text: std::mem::take(&mut self.buffer),
            start: Some(start),
            end: Some(end),
        });
        self.buffer_chars = 0;
        self.cursor = end.saturating_sub(self.config.overlap);
    }

    fn finish(mut self) -> Vec<TextChunk> {
        self.flush();
        self.chunks
    }
}
