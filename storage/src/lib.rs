// storage/src/lib.rs

pub mod document_store;
pub mod memory_store;
pub mod sled_store;
pub mod storage_utils;

pub use document_store::{open_store, DocumentStore, StorageKind, StoreConfig};
pub use memory_store::MemoryStore;
pub use sled_store::SledStore;
