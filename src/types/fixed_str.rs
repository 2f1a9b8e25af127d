//! Fixed-width string keys

use super::codec::{check_len, FixedCodec};
use crate::{Result, StorageError};
use std::fmt;
use std::str::FromStr;

/// UTF-8 string stored in exactly `N` bytes, zero padded.
///
/// Ordering is byte-wise over the content, which matches `strcmp` on the
/// NUL-terminated form: a prefix sorts before any longer string.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FixedStr<const N: usize> {
    bytes: [u8; N],
}

impl<const N: usize> FixedStr<N> {
    /// Build from text of at most `N` bytes without interior NULs.
    pub fn new(s: &str) -> Result<Self> {
        if s.len() > N {
            return Err(StorageError::InvalidArgument(format!(
                "string of {} bytes does not fit in FixedStr<{}>",
                s.len(),
                N
            )));
        }
        if s.as_bytes().contains(&0) {
            return Err(StorageError::InvalidArgument(
                "FixedStr content must not contain NUL bytes".into(),
            ));
        }
        let mut bytes = [0u8; N];
        bytes[..s.len()].copy_from_slice(s.as_bytes());
        Ok(Self { bytes })
    }

    pub fn len(&self) -> usize {
        self.bytes.iter().position(|&b| b == 0).unwrap_or(N)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len()]
    }

    pub fn as_str(&self) -> &str {
        // content is validated UTF-8 on every construction path
        std::str::from_utf8(self.as_bytes()).unwrap_or_default()
    }
}

impl<const N: usize> Default for FixedStr<N> {
    fn default() -> Self {
        Self { bytes: [0u8; N] }
    }
}

impl<const N: usize> fmt::Debug for FixedStr<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl<const N: usize> fmt::Display for FixedStr<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<const N: usize> FromStr for FixedStr<N> {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl<const N: usize> TryFrom<&str> for FixedStr<N> {
    type Error = StorageError;

    fn try_from(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl<const N: usize> FixedCodec for FixedStr<N> {
    fn encoded_len() -> usize {
        N
    }

    fn encode_into(&self, buf: &mut [u8]) {
        buf[..N].copy_from_slice(&self.bytes);
    }

    fn decode_from(buf: &[u8]) -> Result<Self> {
        check_len(buf, N, "fixed string")?;
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(&buf[..N]);
        let value = Self { bytes };
        if value.bytes[value.len()..].iter().any(|&b| b != 0) {
            return Err(StorageError::InvalidData(
                "fixed string has bytes after its terminator".into(),
            ));
        }
        std::str::from_utf8(value.as_bytes())
            .map_err(|e| StorageError::InvalidData(format!("fixed string is not UTF-8: {}", e)))?;
        Ok(value)
    }
}
