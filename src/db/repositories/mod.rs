pub mod response_repository;
pub mod tasting_repository;
pub mod user_repository;

pub use response_repository::*;
pub use tasting_repository::*;
pub use user_repository::*;
