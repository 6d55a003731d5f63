//! Record Storage Module
//!
//! The local record set that the `local` search source scans.
//!
//! ## Core Concepts
//! - **Read capability**: search code only depends on [`RecordStore`], a snapshot/lookup interface.
//! - **Backing store**: `MemoryRecordStore` keeps records in a concurrent map and serves CRUD
//!   and bulk import for the HTTP layer.
//! - **Consistency**: a search works on a snapshot; concurrent writes become visible to later searches.

pub mod handlers;
pub mod memory;
pub mod protocol;
pub mod types;

use types::Record;

/// Read-only view over stored records.
pub trait RecordStore: Send + Sync {
    /// All records, most recently updated first.
    fn snapshot(&self) -> Vec<Record>;

    fn get(&self, id: &str) -> Option<Record>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests;
