//! # Core
//!
//! Pure data handling shared by connectors and synchronizers. Nothing here
//! performs I/O.
//!
//! - **Identity**: `PeerId`, `UserId` and `ConnectorId`
//! - **Frame**: length-prefixed framing and per-peer reassembly
//! - **Envelope**: message-type name plus encoded payload
//! - **Serialization**: JSON, bincode and MessagePack payload formats
//!
//! ## Frame layout
//! ```text
//! [Length(4, big-endian)] [Payload(N)]
//! ```

pub mod envelope;
pub mod frame;
pub mod identity;
pub mod serialization;
