pub mod analytics;
pub mod cancellation;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod service;
pub mod status_machine;

pub use analytics::*;
pub use cancellation::*;
pub use error::*;
pub use models::*;
pub use repository::*;
pub use service::*;
pub use status_machine::*;
