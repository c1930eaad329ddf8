pub mod codec;
mod error;
mod repository;

pub use error::*;
pub use repository::*;
