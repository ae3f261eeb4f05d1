use crate::core::envelope::{Envelope, MessageData};
use crate::core::serialization::SerializationFormat;
use crate::error::{ErrorType, ProtocolError, Result};
use crate::protocol::messages;
use crate::protocol::synchronizer::{Context, Origin};
use std::borrow::Cow;
use std::collections::HashMap;

type HandlerFn =
    dyn Fn(&mut Context<'_>, Origin, &Envelope, SerializationFormat) -> Result<()> + Send + Sync + 'static;

struct Handler {
    requires_auth: bool,
    call: Box<HandlerFn>,
}

/// Routes decoded envelopes to typed handlers by message-type name.
///
/// Names are unique; the built-in names from [`messages`] are reserved.
/// Only ever touched from the consumer thread, so it needs no lock.
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<Cow<'static, str>, Handler>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `T::message_type()`.
    ///
    /// # Errors
    /// - `ProtocolError::ReservedMessageType` for a built-in name
    /// - `ProtocolError::DuplicateHandler` if the name is taken
    pub fn register<T, F>(&mut self, requires_auth: bool, handler: F) -> Result<()>
    where
        T: MessageData,
        F: Fn(&mut Context<'_>, Origin, T) -> Result<()> + Send + Sync + 'static,
    {
        let name = T::message_type();
        if messages::is_reserved(&name) {
            return Err(ProtocolError::ReservedMessageType(name.into_owned()));
        }
        if self.handlers.contains_key(&name) {
            return Err(ProtocolError::DuplicateHandler(name.into_owned()));
        }

        let call: Box<HandlerFn> = Box::new(move |ctx, origin, envelope, format| {
            let data = envelope.open::<T>(format)?;
            handler(ctx, origin, data)
        });
        self.handlers.insert(
            name,
            Handler {
                requires_auth,
                call,
            },
        );
        Ok(())
    }

    pub fn unregister(&mut self, message_type: &str) -> bool {
        self.handlers.remove(message_type).is_some()
    }

    pub fn contains(&self, message_type: &str) -> bool {
        self.handlers.contains_key(message_type)
    }

    /// Registered names, in no particular order
    pub fn message_types(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(|name| name.as_ref())
    }

    /// Decode the envelope's payload and run its handler.
    ///
    /// # Errors
    /// - `Message(UnknownMessage)` when nothing is registered for the name
    /// - `Message(InvalidMessageContext)` when the handler needs an
    ///   authenticated sender and `origin` is not one
    /// - `DeserializeError` when the payload does not decode as the
    ///   registered type
    /// - whatever the handler returns
    pub fn dispatch(
        &self,
        ctx: &mut Context<'_>,
        origin: Origin,
        envelope: &Envelope,
        format: SerializationFormat,
    ) -> Result<()> {
        let handler = self
            .handlers
            .get(envelope.message_type.as_str())
            .ok_or(ProtocolError::Message(ErrorType::UnknownMessage))?;

        if handler.requires_auth && origin.user().is_none() {
            return Err(ProtocolError::Message(ErrorType::InvalidMessageContext));
        }

        (handler.call)(ctx, origin, envelope, format)
    }
}
