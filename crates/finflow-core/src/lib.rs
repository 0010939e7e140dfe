pub mod config;
pub mod conversation;
pub mod decode;
pub mod defaults;
pub mod error;
pub mod extract;
pub mod generator;
pub mod intent;
pub mod io;
pub mod paths;
pub mod pipeline;
pub mod project;
pub mod recorder;
pub mod render;
pub mod store;
pub mod template;
pub mod types;

#[cfg(test)]
mod testutil;

pub use error::{FinflowError, Result};
