// sqldatabasetool/src/archive/mod.rs
pub mod bundle;
pub mod generation;
pub mod store;

pub use store::ArchiveFileStore;
