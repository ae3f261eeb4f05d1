//! # Identities
//!
//! Strongly typed identifiers for peers, users and connectors.
//!
//! [`PeerId`] and [`UserId`] both wrap a 128-bit GUID but are distinct types:
//! a peer identity is assigned by a connector when a connection appears, a
//! user identity is assigned by the authentication layer when a peer proves
//! who it is. Neither can be built from the all-zero GUID.

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Reject the all-zero GUID.
pub fn validate_guid(guid: Uuid) -> Result<Uuid> {
    if guid.is_nil() {
        Err(ProtocolError::InvalidIdentity)
    } else {
        Ok(guid)
    }
}

macro_rules! guid_identity {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "Uuid", into = "Uuid")]
        pub struct $name(Uuid);

        impl $name {
            /// Wrap a GUID, failing on the all-zero value
            pub fn new(guid: Uuid) -> Result<Self> {
                validate_guid(guid).map(Self)
            }

            /// Mint a fresh random identity
            pub fn random() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl TryFrom<Uuid> for $name {
            type Error = ProtocolError;

            fn try_from(guid: Uuid) -> Result<Self> {
                Self::new(guid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Uuid {
                id.0
            }
        }

        impl FromStr for $name {
            type Err = ProtocolError;

            fn from_str(s: &str) -> Result<Self> {
                let guid = Uuid::parse_str(s)
                    .map_err(|e| ProtocolError::DeserializeError(e.to_string()))?;
                Self::new(guid)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

guid_identity!(
    /// Identity of one end of a connection, assigned by its connector
    PeerId
);

guid_identity!(
    /// Identity of an authenticated user, assigned by the synchronizer
    UserId
);

static NEXT_CONNECTOR_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a connector.
///
/// Peers keep it as a non-owning reference to the connector that owns them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectorId(u64);

impl ConnectorId {
    pub(crate) fn next() -> Self {
        Self(NEXT_CONNECTOR_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connector-{}", self.0)
    }
}
