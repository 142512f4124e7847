pub mod context;
pub mod synthetic;
