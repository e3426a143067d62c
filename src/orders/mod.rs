//! Orders: placement with stock decrement, admin reporting, status changes

pub mod handlers;
pub mod models;
pub mod period;
pub mod service;

pub use service::OrderService;
