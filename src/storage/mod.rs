//! Storage layer
//!
//! Fixed-size slot files with a persisted free-slot pool

pub mod paged_file;

pub use paged_file::{table_paths, PagedFile, TableHeader, HEADER_PAYLOAD_SIZE, PRELUDE_SIZE};
