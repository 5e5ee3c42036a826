//! Program images.
//!
//! A [`Program`] is the immutable integer image an engine is built from. It
//! is cheap to clone and every engine copies it into its own memory, so any
//! number of engines can share one loaded program.
//!
//! The text form is comma-separated decimal integers. Whitespace around
//! tokens and trailing newlines are ignored.
//!
//! # Example
//!
//! ```
//! use intcode_vm::program::Program;
//!
//! let program = Program::parse("1,0,0,0,99\n").unwrap();
//! assert_eq!(program.len(), 5);
//! assert_eq!(program[4], 99);
//! ```

use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

/// Errors loading a program image.
#[derive(Debug, Error)]
pub enum ProgramError {
    /// The text contained no integers.
    #[error("program is empty")]
    Empty,

    /// A token is not a decimal `i64`.
    #[error("invalid token {token:?} at position {index}")]
    InvalidToken {
        /// Zero-based position of the token.
        index: usize,
        /// The token as written, trimmed.
        token: String,
    },

    /// The program file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        /// File being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// An immutable, shareable program image. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    image: Arc<[i64]>,
}

impl Program {
    /// Wrap an image. Fails on an empty image.
    pub fn new(image: impl Into<Vec<i64>>) -> Result<Self, ProgramError> {
        let image: Vec<i64> = image.into();
        if image.is_empty() {
            return Err(ProgramError::Empty);
        }
        Ok(Self { image: image.into() })
    }

    /// Parse comma-separated decimal text.
    pub fn parse(text: &str) -> Result<Self, ProgramError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ProgramError::Empty);
        }

        let image = trimmed
            .split(',')
            .enumerate()
            .map(|(index, raw)| {
                let token = raw.trim();
                token.parse::<i64>().map_err(|_| ProgramError::InvalidToken {
                    index,
                    token: token.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(image)
    }

    /// Read and parse a program file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProgramError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ProgramError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let program = Self::parse(&text)?;
        log::debug!("Loaded {} cells from {}", program.len(), path.display());
        Ok(program)
    }

    /// The image as a slice.
    pub fn as_slice(&self) -> &[i64] {
        &self.image
    }
}

impl FromStr for Program {
    type Err = ProgramError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Deref for Program {
    type Target = [i64];

    fn deref(&self) -> &[i64] {
        &self.image
    }
}

impl AsRef<[i64]> for Program {
    fn as_ref(&self) -> &[i64] {
        &self.image
    }
}
