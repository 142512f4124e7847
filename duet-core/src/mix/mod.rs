pub mod incremental;
pub mod offline;
