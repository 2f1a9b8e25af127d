//! Key, value and address types stored in table slots

mod address;
mod codec;
mod fixed_str;

pub use address::Address;
pub use codec::{BTreeKey, BTreeValue, FixedCodec};
pub use fixed_str::FixedStr;
