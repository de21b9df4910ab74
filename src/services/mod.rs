// src/services/mod.rs
pub mod completion;
pub mod rate_limiter;
