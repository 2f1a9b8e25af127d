//! Slot addresses

use super::codec::{check_len, FixedCodec};
use crate::Result;
use std::fmt;

/// Byte offset of a slot in a table's record file.
///
/// Offset 0 always falls inside the file prelude, so it doubles as the
/// "absent" marker: no child, no next leaf, empty tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(u64);

impl Address {
    pub const NULL: Address = Address(0);

    pub const fn new(offset: u64) -> Self {
        Self(offset)
    }

    pub const fn offset(self) -> u64 {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "@null")
        } else {
            write!(f, "@{}", self.0)
        }
    }
}

impl FixedCodec for Address {
    fn encoded_len() -> usize {
        8
    }

    fn encode_into(&self, buf: &mut [u8]) {
        buf[..8].copy_from_slice(&self.0.to_le_bytes());
    }

    fn decode_from(buf: &[u8]) -> Result<Self> {
        check_len(buf, 8, "address")?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(&buf[..8]);
        Ok(Self(u64::from_le_bytes(arr)))
    }
}
