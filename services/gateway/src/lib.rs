//! Market-data distribution gateway
//!
//! Authenticates WebSocket clients with bearer tokens, authorizes per-symbol
//! topic subscriptions and fans the synthetic feed's quotes and bars out
//! through an in-process topic broker.

pub mod auth;
pub mod broker;
pub mod config;
pub mod distribution;
pub mod error;
pub mod handlers;
pub mod protocol;
pub mod router;
pub mod state;

pub use config::GatewayConfig;
pub use distribution::{Connection, DistributionGateway};
pub use error::{GatewayError, TransientBroadcastError};
