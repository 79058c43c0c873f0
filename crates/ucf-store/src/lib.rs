pub mod client;
pub mod error;
pub mod memory;

pub use client::{DeleteSpec, Pending, StoreBatch, StoreClient};
pub use error::{Result, StoreError};
pub use memory::MemoryBackend;
