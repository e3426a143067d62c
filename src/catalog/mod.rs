//! Product and service catalog with seller ratings

pub mod handlers;
pub mod models;
pub mod rating;
pub mod service;

pub use rating::RatingService;
pub use service::CatalogService;
