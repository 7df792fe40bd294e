// src/services/mod.rs
pub mod cache_store;
pub mod calculations;
pub mod defaults;
pub mod price_history;
pub mod resolver;
pub mod scheduler;
pub mod yahoo;
