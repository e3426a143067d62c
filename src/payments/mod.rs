//! M-Pesa payments: STK push initiation and callback recording

pub mod callback;
pub mod gateway;
pub mod handlers;
pub mod models;
pub mod service;

pub use gateway::{MockGateway, MpesaClient, PaymentGateway};
pub use service::PaymentService;
