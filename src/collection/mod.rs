//! Collection gateways for persisted session documents

mod memory;
mod traits;

pub use memory::MemoryCollection;
pub use traits::{SessionCollection, SessionDocument, TtlIndex, MODIFIED_FIELD};

#[cfg(feature = "mongodb-store")]
mod mongo;

#[cfg(feature = "mongodb-store")]
pub use mongo::{MongoCollection, DEFAULT_COLLECTION};
