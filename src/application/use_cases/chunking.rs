use crate::domain::error::{AppError, Result};
use crate::shared::token_counter::TokenCounter;

pub const DEFAULT_CHUNK_SIZE: usize = 100;
pub const DEFAULT_CHUNK_OVERLAP: usize = 20;

/// Splits text into chunks of bounded token count with overlap between
/// neighbours.
///
/// Text is first split on `separator`, then on each backup separator for
/// pieces still over budget, and finally into fixed character windows. The
/// pieces are merged greedily; every new chunk starts with the tail of the
/// previous one, up to `chunk_overlap` tokens.
#[derive(Debug, Clone)]
pub struct TokenTextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separator: String,
    backup_separators: Vec<String>,
}

impl TokenTextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(AppError::ConfigError(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if chunk_overlap > chunk_size {
            return Err(AppError::ConfigError(format!(
                "chunk_overlap ({}) is larger than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separator: " ".to_string(),
            backup_separators: vec!["\n".to_string()],
        })
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let separators: Vec<&str> = std::iter::once(self.separator.as_str())
            .chain(self.backup_separators.iter().map(|s| s.as_str()))
            .collect();

        let mut pieces = Vec::new();
        self.split_recursive(text, &separators, &mut pieces);
        self.merge(pieces)
    }

    fn split_recursive(&self, text: &str, separators: &[&str], out: &mut Vec<(String, usize)>) {
        let tokens = TokenCounter::estimate_tokens(text);
        if tokens <= self.chunk_size {
            out.push((text.to_string(), tokens));
            return;
        }

        let Some((separator, rest)) = separators.split_first() else {
            self.split_by_chars(text, out);
            return;
        };

        let parts: Vec<&str> = text.split_inclusive(*separator).collect();
        if parts.len() <= 1 {
            self.split_recursive(text, rest, out);
            return;
        }

        for part in parts {
            self.split_recursive(part, rest, out);
        }
    }

    fn split_by_chars(&self, text: &str, out: &mut Vec<(String, usize)>) {
        let window = self.chunk_size * 4;
        let chars: Vec<char> = text.chars().collect();
        for slice in chars.chunks(window) {
            let piece: String = slice.iter().collect();
            let tokens = TokenCounter::estimate_tokens(&piece);
            out.push((piece, tokens));
        }
    }

    fn merge(&self, pieces: Vec<(String, usize)>) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current: Vec<(String, usize)> = Vec::new();
        let mut current_tokens = 0;

        for (piece, tokens) in pieces {
            if current_tokens + tokens > self.chunk_size && !current.is_empty() {
                push_chunk(&mut chunks, &current);

                let mut kept: Vec<(String, usize)> = Vec::new();
                let mut kept_tokens = 0;
                while let Some(last) = current.pop() {
                    if kept_tokens + last.1 > self.chunk_overlap {
                        break;
                    }
                    kept_tokens += last.1;
                    kept.push(last);
                }
                kept.reverse();
                current = kept;
                current_tokens = kept_tokens;

                while current_tokens + tokens > self.chunk_size && !current.is_empty() {
                    let dropped = current.remove(0);
                    current_tokens -= dropped.1;
                }
            }
            current_tokens += tokens;
            current.push((piece, tokens));
        }

        push_chunk(&mut chunks, &current);
        chunks
    }
}

fn push_chunk(chunks: &mut Vec<String>, pieces: &[(String, usize)]) {
    let text: String = pieces.iter().map(|(p, _)| p.as_str()).collect();
    let text = text.trim();
    if !text.is_empty() {
        chunks.push(text.to_string());
    }
}

impl Default for TokenTextSplitter {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            separator: " ".to_string(),
            backup_separators: vec!["\n".to_string()],
        }
    }
}
