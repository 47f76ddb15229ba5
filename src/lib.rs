//! Dual-role game controller over a short-range radio link
//!
//! One board reads real buttons and a stick and broadcasts them, the other
//! receives that state and serves it through the same query API. Which board
//! is which is decided at startup from the stick inputs.

pub mod config;
pub mod controller;
pub mod hardware;
pub mod radio;
