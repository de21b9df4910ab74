//! AI receptionist: a floating chat widget and the relay that forwards its
//! messages to a chat completion API.
//!
//! The relay modules are native only; on `wasm32` the crate builds just the
//! widget and its DOM renderer.

pub mod message;
pub mod widget;

#[cfg(not(target_arch = "wasm32"))]
pub mod config;
#[cfg(not(target_arch = "wasm32"))]
pub mod error;
#[cfg(not(target_arch = "wasm32"))]
pub mod routes;
#[cfg(not(target_arch = "wasm32"))]
pub mod services;
#[cfg(not(target_arch = "wasm32"))]
pub mod state;

#[cfg(target_arch = "wasm32")]
pub mod web;
