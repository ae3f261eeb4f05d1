//! # Protocol Layer
//!
//! Typed messaging over a connector.
//!
//! ## Components
//! - **Synchronizer**: decode, route and answer incoming messages
//! - **Dispatcher**: message-type name to handler mapping
//! - **Auth**: per-peer authentication state machine
//! - **Keepalive**: ping/pong correlation by key
//! - **Messages**: built-in message data with reserved names

pub mod auth;
pub mod dispatcher;
pub mod keepalive;
pub mod messages;
pub mod synchronizer;
