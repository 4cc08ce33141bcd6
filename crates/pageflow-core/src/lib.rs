pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::AppConfig;
pub use error::{PageflowError, Result};
pub use traits::{Capability, Embedder, Refiner, Retriever};
pub use types::*;
