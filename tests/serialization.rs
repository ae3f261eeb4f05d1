//! Integration tests for the envelope encoding across serialization formats
//!
//! JSON (default, human-readable), bincode (fast) and MessagePack (compact)
//! must all carry the same envelope, and each side must agree on the format.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use netsync::core::envelope::{Envelope, MessageData};
use netsync::core::serialization::{MultiFormat, SerializationFormat};
use netsync::protocol::messages::{ErrorMessageData, PingMessageData};
use netsync::ErrorType;
use serde::{Deserialize, Serialize};

const FORMATS: [SerializationFormat; 3] = [
    SerializationFormat::Json,
    SerializationFormat::Bincode,
    SerializationFormat::MessagePack,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SpawnMessageData {
    entity: u64,
    position: (f32, f32),
    tags: Vec<String>,
    owner: Option<String>,
}

impl MessageData for SpawnMessageData {}

fn spawn() -> SpawnMessageData {
    SpawnMessageData {
        entity: 77,
        position: (1.5, -3.25),
        tags: vec!["npc".to_string(), "merchant".to_string()],
        owner: None,
    }
}

#[test]
fn test_envelope_carries_typed_data_in_every_format() {
    for format in FORMATS {
        let envelope = Envelope::wrap(&spawn(), format).unwrap();
        assert_eq!(envelope.message_type, "Spawn");

        let bytes = envelope
            .serialize_format(format)
            .unwrap_or_else(|e| panic!("{} failed to encode: {e}", format.name()));
        let decoded = Envelope::deserialize_format(&bytes, format).unwrap();

        assert_eq!(decoded, envelope);
        assert_eq!(decoded.open::<SpawnMessageData>(format).unwrap(), spawn());
    }
}

#[test]
fn test_json_envelope_is_readable() {
    let envelope = Envelope::wrap(&PingMessageData { key: 12 }, SerializationFormat::Json).unwrap();
    let bytes = envelope.serialize_format(SerializationFormat::Json).unwrap();
    let text = std::str::from_utf8(&bytes).unwrap();

    assert!(text.contains(r#""type":"Ping""#), "got {text}");
}

#[test]
fn test_binary_formats_are_smaller_than_json() {
    let envelope = Envelope::wrap(&spawn(), SerializationFormat::Json).unwrap();
    let json = envelope.serialize_format(SerializationFormat::Json).unwrap();
    let msgpack = Envelope::wrap(&spawn(), SerializationFormat::MessagePack)
        .unwrap()
        .serialize_format(SerializationFormat::MessagePack)
        .unwrap();

    assert!(msgpack.len() < json.len());
}

#[test]
fn test_wrong_payload_type_fails_to_open() {
    let envelope = Envelope::wrap(&PingMessageData { key: 1 }, SerializationFormat::Json).unwrap();
    let result = envelope.open::<SpawnMessageData>(SerializationFormat::Json);

    let error = result.unwrap_err();
    assert_eq!(error.error_type(), ErrorType::MalformedMessage);
}

#[test]
fn test_garbage_fails_in_every_format() {
    let garbage = [0xc1u8, 0xff, 0x00, 0x13, 0x37];
    for format in FORMATS {
        assert!(
            Envelope::deserialize_format(&garbage, format).is_err(),
            "{} accepted garbage",
            format.name()
        );
    }
}

#[test]
fn test_error_message_data_keeps_its_fields() {
    for format in FORMATS {
        let notice = ErrorMessageData {
            error: ErrorType::UnknownMessage,
            message_type: Some("Spawn".to_string()),
        };
        let bytes = format.encode(&notice).unwrap();
        let back: ErrorMessageData = format.decode(&bytes).unwrap();
        assert_eq!(back.error, ErrorType::UnknownMessage);
        assert_eq!(back.message_type.as_deref(), Some("Spawn"));
    }
}

#[test]
fn test_format_names_and_serde() {
    assert_eq!(SerializationFormat::Bincode.name(), "Bincode");
    assert_eq!(
        serde_json::to_string(&SerializationFormat::MessagePack).unwrap(),
        r#""messagepack""#
    );
    assert_eq!(
        serde_json::from_str::<SerializationFormat>(r#""json""#).unwrap(),
        SerializationFormat::Json
    );
}
