pub mod error;
pub mod handlers;
pub mod library;
pub mod media;
pub mod middleware;
pub mod routes;
pub mod stream;
pub mod transcode;

pub use error::ApiError;
pub use routes::create_router;
