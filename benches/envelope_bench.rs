#![allow(clippy::unwrap_used)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use netsync::core::envelope::{Envelope, MessageData};
use netsync::core::serialization::{MultiFormat, SerializationFormat};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StateMessageData {
    tick: u64,
    positions: Vec<(u32, f32, f32)>,
    chat: Option<String>,
}

impl MessageData for StateMessageData {}

fn state() -> StateMessageData {
    StateMessageData {
        tick: 90_210,
        positions: (0..32).map(|i| (i, i as f32 * 1.5, -(i as f32))).collect(),
        chat: Some("gg".to_string()),
    }
}

fn bench_envelope(c: &mut Criterion) {
    let mut group = c.benchmark_group("envelope");
    let data = state();

    for format in [
        SerializationFormat::Json,
        SerializationFormat::Bincode,
        SerializationFormat::MessagePack,
    ] {
        let name = format.name();

        group.bench_function(format!("{name}_encode"), |b| {
            b.iter(|| {
                let envelope = Envelope::wrap(black_box(&data), format).unwrap();
                envelope.serialize_format(format).unwrap()
            })
        });

        let bytes = Envelope::wrap(&data, format)
            .unwrap()
            .serialize_format(format)
            .unwrap();
        group.bench_function(format!("{name}_decode"), |b| {
            b.iter(|| {
                let envelope = Envelope::deserialize_format(black_box(&bytes), format).unwrap();
                envelope.open::<StateMessageData>(format).unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_envelope);
criterion_main!(benches);
