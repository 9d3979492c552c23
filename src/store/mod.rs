// Keyvault — Store Module
//
// The Secure Blob Store seam plus three implementations: an in-memory map,
// a SQLCipher-encrypted database, and a wrapper that serializes access to
// any of them.

mod backend;
mod db;
mod error;
mod memory;
mod serial;
mod sqlite;

pub use backend::SecureBlobStore;
pub use db::Database;
pub use error::StoreError;
pub use memory::MemoryBlobStore;
pub use serial::SerialStore;
pub use sqlite::SqliteBlobStore;
