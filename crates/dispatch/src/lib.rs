//! Outbound WhatsApp Cloud API text delivery.
//!
//! Expected failure modes (provider rejection, unreachable provider) are
//! reported inside [`Delivery`] rather than as errors; `Err` is reserved for
//! programmer misuse.

pub mod client;

pub use client::{Delivery, DispatchClient, DispatchConfig, Error};
