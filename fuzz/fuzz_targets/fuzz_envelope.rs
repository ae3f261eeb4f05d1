#![no_main]

use libfuzzer_sys::fuzz_target;
use netsync::core::envelope::Envelope;
use netsync::core::serialization::{MultiFormat, SerializationFormat};

fuzz_target!(|data: &[u8]| {
    for format in [
        SerializationFormat::Json,
        SerializationFormat::Bincode,
        SerializationFormat::MessagePack,
    ] {
        let _ = Envelope::deserialize_format(data, format);
    }
});
