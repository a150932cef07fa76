//! Page sources shipped with the crate
//!
//! Production deployments usually implement [`PageSource`](super::PageSource)
//! against their own store. These two cover embedding, tooling and tests.

pub mod jsonl;
pub mod memory;

pub use jsonl::JsonLinesSource;
pub use memory::MemorySource;
