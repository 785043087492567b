pub mod config;
pub mod error;
pub mod export;
pub mod features;
pub mod feed;
pub mod model;
pub mod pipeline;
pub mod schema;
pub mod server;
pub mod team;
pub mod timeline;
pub mod training;

pub use error::{PredictError, Result};
