pub mod archive;
pub mod cancel;
pub mod config;
pub mod crawl;
pub mod download;
mod error;
pub mod extract;
pub mod fetch;
pub mod grab;
pub mod http;
pub mod journal;
pub mod media;
pub mod paths;
pub mod reference;

pub use error::{GrabError, Result};
