//! Fixed-width binary encoding for everything stored inside a slot
//!
//! Every key, value and address occupies the same number of bytes no matter
//! its content, so a node always serializes to exactly one slot.

use crate::{Result, StorageError};
use std::fmt::Debug;

/// Fixed-size little-endian codec
pub trait FixedCodec: Sized {
    /// Encoded size in bytes (constant per type)
    fn encoded_len() -> usize;

    /// Write exactly `encoded_len()` bytes into the front of `buf`
    fn encode_into(&self, buf: &mut [u8]);

    /// Read a value from the first `encoded_len()` bytes of `buf`
    fn decode_from(buf: &[u8]) -> Result<Self>;
}

/// Trait for B+ tree keys
pub trait BTreeKey: FixedCodec + Ord + Clone + Debug {}

impl<T: FixedCodec + Ord + Clone + Debug> BTreeKey for T {}

/// Trait for B+ tree values
///
/// Values are ordered because the multi-value tree sorts by (key, value).
pub trait BTreeValue: FixedCodec + Ord + Clone + Debug {}

impl<T: FixedCodec + Ord + Clone + Debug> BTreeValue for T {}

pub(crate) fn check_len(buf: &[u8], need: usize, what: &str) -> Result<()> {
    if buf.len() < need {
        return Err(StorageError::InvalidData(format!(
            "{} too short: need {} bytes, got {}",
            what,
            need,
            buf.len()
        )));
    }
    Ok(())
}

macro_rules! impl_int_codec {
    ($($ty:ty),*) => {
        $(
            impl FixedCodec for $ty {
                fn encoded_len() -> usize {
                    std::mem::size_of::<$ty>()
                }

                fn encode_into(&self, buf: &mut [u8]) {
                    buf[..std::mem::size_of::<$ty>()].copy_from_slice(&self.to_le_bytes());
                }

                fn decode_from(buf: &[u8]) -> Result<Self> {
                    const LEN: usize = std::mem::size_of::<$ty>();
                    check_len(buf, LEN, stringify!($ty))?;
                    let mut arr = [0u8; LEN];
                    arr.copy_from_slice(&buf[..LEN]);
                    Ok(<$ty>::from_le_bytes(arr))
                }
            }
        )*
    };
}

impl_int_codec!(u8, u16, u32, u64, i32, i64);

impl FixedCodec for bool {
    fn encoded_len() -> usize {
        1
    }

    fn encode_into(&self, buf: &mut [u8]) {
        buf[0] = u8::from(*self);
    }

    fn decode_from(buf: &[u8]) -> Result<Self> {
        check_len(buf, 1, "bool")?;
        match buf[0] {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(StorageError::InvalidData(format!(
                "invalid bool byte: {}",
                other
            ))),
        }
    }
}

impl<const N: usize> FixedCodec for [u8; N] {
    fn encoded_len() -> usize {
        N
    }

    fn encode_into(&self, buf: &mut [u8]) {
        buf[..N].copy_from_slice(self);
    }

    fn decode_from(buf: &[u8]) -> Result<Self> {
        check_len(buf, N, "byte array")?;
        let mut arr = [0u8; N];
        arr.copy_from_slice(&buf[..N]);
        Ok(arr)
    }
}

/// Composite keys, e.g. (train id, date)
impl<A: FixedCodec, B: FixedCodec> FixedCodec for (A, B) {
    fn encoded_len() -> usize {
        A::encoded_len() + B::encoded_len()
    }

    fn encode_into(&self, buf: &mut [u8]) {
        let split = A::encoded_len();
        self.0.encode_into(&mut buf[..split]);
        self.1.encode_into(&mut buf[split..]);
    }

    fn decode_from(buf: &[u8]) -> Result<Self> {
        check_len(buf, Self::encoded_len(), "tuple")?;
        let split = A::encoded_len();
        Ok((A::decode_from(&buf[..split])?, B::decode_from(&buf[split..])?))
    }
}
