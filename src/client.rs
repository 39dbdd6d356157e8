//! Connection facade
//!
//! [`MqttClient`] owns the transport sessions, queues operations while
//! disconnected and feeds inbound messages to the dispatch chain.

pub mod async_client;
pub mod config;
pub mod error;
pub mod event;
pub mod message;
pub mod payload;
mod pending;

pub use async_client::{Grant, MqttClient, PublishOutcome};
pub use config::ClientSettings;
pub use error::ClientError;
pub use event::{ClientEvent, ConnectionState};
pub use message::Message;
pub use payload::Payload;
pub use pending::PendingSummary;
