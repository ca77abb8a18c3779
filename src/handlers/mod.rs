pub mod checkout_handlers;
pub mod health_handlers;
pub mod listing_handlers;
