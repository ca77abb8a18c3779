pub mod checkout_service;
pub mod metadata_encoder;
pub mod provider;
