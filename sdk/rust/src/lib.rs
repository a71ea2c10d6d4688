//! Client SDK for the gateway's unix-socket HTTP interface.

mod client;

pub use client::{ApiResponse, GatewayClient};
