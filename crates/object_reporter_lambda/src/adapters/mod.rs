pub mod dynamodb;
#[cfg(feature = "test-helpers")]
pub mod in_memory;
pub mod metadata_table;
pub mod retry;
