//! Content fingerprints for downloaded artifacts
//!
//! A fingerprint is the md5 digest of a file's bytes rendered as lowercase
//! hex. It is only used to recognise unchanged data between runs, never for
//! integrity against tampering.

use crate::error::{OaError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// 128-bit content hash rendered as 32 lowercase hex digits
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hash an in-memory buffer
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(format!("{:x}", md5::compute(data)))
    }

    /// Hash everything a reader yields, a buffer at a time
    pub fn from_reader<R: Read>(reader: &mut R) -> Result<Self> {
        let mut context = md5::Context::new();
        let mut buffer = vec![0u8; READ_BUFFER_SIZE];

        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            context.consume(&buffer[..bytes_read]);
        }

        Ok(Self(format!("{:x}", context.compute())))
    }

    /// Hash a file on disk without loading it into memory
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut file = std::fs::File::open(path)?;
        Self::from_reader(&mut file)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison against a recorded hex digest
    pub fn matches(&self, recorded: &str) -> bool {
        self.0.eq_ignore_ascii_case(recorded.trim())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = OaError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.len() != 32 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(OaError::Parse(format!("not an md5 fingerprint: '{}'", s)));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = OaError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Fingerprint> for String {
    fn from(value: Fingerprint) -> Self {
        value.0
    }
}
