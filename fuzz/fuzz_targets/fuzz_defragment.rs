#![no_main]

use libfuzzer_sys::fuzz_target;
use netsync::core::frame::Defragmenter;

fuzz_target!(|data: &[u8]| {
    // First byte picks the chunk size, the rest is the stream
    let Some((&step, stream)) = data.split_first() else {
        return;
    };
    let step = usize::from(step.max(1));

    let mut defrag = Defragmenter::new(64 * 1024);
    let mut out = Vec::new();
    for chunk in stream.chunks(step) {
        if defrag.push(chunk, &mut out).is_err() {
            break;
        }
    }

    // Whatever came out must fit under the cap
    assert!(out.iter().all(|m| m.len() <= 64 * 1024));
});
