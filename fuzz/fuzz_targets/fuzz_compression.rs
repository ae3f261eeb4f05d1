#![no_main]

use libfuzzer_sys::fuzz_target;
use netsync::utils::compression::{compress, decompress, CompressionKind};

fuzz_target!(|data: &[u8]| {
    for kind in [CompressionKind::Lz4, CompressionKind::Zstd] {
        if let Ok(compressed) = compress(data, &kind) {
            let restored = decompress(&compressed, &kind);
            assert_eq!(restored.ok().as_deref(), Some(data));
        }

        // Malformed input must fail cleanly within the size limit
        let _ = decompress(data, &kind);
    }
});
