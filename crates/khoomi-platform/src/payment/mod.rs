//! Seller payout accounts

pub mod api;
pub mod entity;
pub mod repository;

pub use api::{payments_router, PaymentsState};
pub use entity::{PaymentInformation, PaymentInput, MAX_PAYMENT_ACCOUNTS_PER_USER};
pub use repository::PaymentRepository;
