//! Class index <-> character mapping
//!
//! EMNIST ships `emnist-<split>-mapping.txt` with one `<label> <ascii code>`
//! pair per line.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::utils::error::{RecognizerError, Result};

/// Space glyph appended for line datasets
pub const SPACE_TOKEN: char = ' ';

/// Right-padding token appended for line datasets
pub const PAD_TOKEN: char = '_';

/// Ordered list of characters; the position is the class id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterMapping {
    chars: Vec<char>,
}

impl CharacterMapping {
    pub fn new(chars: Vec<char>) -> Self {
        Self { chars }
    }

    /// The 62-class `byclass` layout: digits, upper case, lower case
    pub fn byclass() -> Self {
        let chars = ('0'..='9').chain('A'..='Z').chain('a'..='z').collect();
        Self { chars }
    }

    /// Parse the contents of an EMNIST mapping file
    pub fn parse(content: &str) -> Result<Self> {
        let mut pairs = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut fields = line.split_whitespace();
            let (Some(label), Some(code)) = (fields.next(), fields.next()) else {
                return Err(RecognizerError::Dataset(format!(
                    "Mapping line {} is malformed: {:?}",
                    line_no + 1,
                    line
                )));
            };
            let label: usize = label.parse().map_err(|_| {
                RecognizerError::Dataset(format!("Bad label on mapping line {}", line_no + 1))
            })?;
            let ch = code
                .parse::<u32>()
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| {
                    RecognizerError::Dataset(format!(
                        "Bad character code on mapping line {}",
                        line_no + 1
                    ))
                })?;
            pairs.push((label, ch));
        }

        pairs.sort_by_key(|&(label, _)| label);
        for (expected, &(label, _)) in pairs.iter().enumerate() {
            if label != expected {
                return Err(RecognizerError::Dataset(format!(
                    "Mapping labels are not contiguous: expected {expected}, found {label}"
                )));
            }
        }

        Ok(Self {
            chars: pairs.into_iter().map(|(_, ch)| ch).collect(),
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Extend with the space and padding tokens used by text lines
    pub fn with_line_tokens(mut self) -> Self {
        for token in [SPACE_TOKEN, PAD_TOKEN] {
            if !self.chars.contains(&token) {
                self.chars.push(token);
            }
        }
        self
    }

    pub fn char_of(&self, index: usize) -> Option<char> {
        self.chars.get(index).copied()
    }

    pub fn index_of(&self, ch: char) -> Option<usize> {
        self.chars.iter().position(|&c| c == ch)
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn chars(&self) -> &[char] {
        &self.chars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byclass_layout() {
        let mapping = CharacterMapping::byclass();
        assert_eq!(mapping.len(), 62);
        assert_eq!(mapping.char_of(0), Some('0'));
        assert_eq!(mapping.char_of(10), Some('A'));
        assert_eq!(mapping.char_of(61), Some('z'));
        assert_eq!(mapping.index_of('a'), Some(36));
    }

    #[test]
    fn test_parse_mapping_file() {
        let mapping = CharacterMapping::parse("1 66\n0 65\n\n2 67\n").unwrap();
        assert_eq!(mapping.chars(), &['A', 'B', 'C']);
    }

    #[test]
    fn test_parse_rejects_gaps() {
        assert!(CharacterMapping::parse("0 65\n2 67\n").is_err());
        assert!(CharacterMapping::parse("0\n").is_err());
    }

    #[test]
    fn test_line_tokens_appended_once() {
        let mapping = CharacterMapping::byclass().with_line_tokens().with_line_tokens();
        assert_eq!(mapping.len(), 64);
        assert_eq!(mapping.index_of(PAD_TOKEN), Some(63));
    }
}
