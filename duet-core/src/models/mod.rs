pub mod artifact;
pub mod config;
pub mod error;
pub mod pcm;
pub mod source;
pub mod state;
