//! Persistence layer — account documents and role record collections.

pub mod libsql;
pub mod memory;
pub mod migrations;
pub mod traits;

pub use libsql::LibSqlStore;
pub use memory::MemoryStore;
pub use traits::Store;
