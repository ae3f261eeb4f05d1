//! Integration tests for zero-copy framing
//!
//! Completed messages are slices of the reassembly buffer, and the stream
//! adapters used by the TCP transport carry frames unchanged.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use netsync::core::frame::{fragment, fragment_into, Defragmenter, FRAME_HEADER_LEN};
use tokio_util::codec::{BytesCodec, FramedRead, FramedWrite};

#[test]
fn test_messages_share_one_allocation() {
    let mut stream = BytesMut::new();
    fragment_into(b"alpha", &mut stream).unwrap();
    fragment_into(b"beta", &mut stream).unwrap();

    let mut defrag = Defragmenter::default();
    let mut out = Vec::new();
    defrag.push(&stream, &mut out).unwrap();

    assert_eq!(out.len(), 2);
    // The second message starts right after the first one and its prefix
    let expected = out[0].as_ptr() as usize + out[0].len() + FRAME_HEADER_LEN;
    assert_eq!(out[1].as_ptr() as usize, expected);
}

#[test]
fn test_completed_message_is_independent_of_later_input() {
    let mut defrag = Defragmenter::default();
    let mut out = Vec::new();
    defrag.push(&fragment(b"keep me").unwrap(), &mut out).unwrap();
    let first = out.pop().unwrap();

    defrag.push(&fragment(&[0u8; 4096]).unwrap(), &mut out).unwrap();
    assert_eq!(&first[..], b"keep me");
    assert_eq!(out[0].len(), 4096);
}

#[test]
fn test_bytes_clone_is_reference_counted() {
    let frame = fragment(&vec![9u8; 1024]).unwrap();
    let clone = frame.clone();
    assert_eq!(frame.as_ptr(), clone.as_ptr());

    let payload = frame.slice(FRAME_HEADER_LEN..);
    assert_eq!(payload.as_ptr() as usize, frame.as_ptr() as usize + FRAME_HEADER_LEN);
}

#[test]
fn test_fragment_into_appends() {
    let mut buffer = BytesMut::with_capacity(64);
    fragment_into(b"one", &mut buffer).unwrap();
    let first_len = buffer.len();
    fragment_into(b"two", &mut buffer).unwrap();

    assert_eq!(first_len, FRAME_HEADER_LEN + 3);
    assert_eq!(buffer.len(), 2 * (FRAME_HEADER_LEN + 3));
    assert_eq!(&buffer[first_len + FRAME_HEADER_LEN..], b"two");
}

#[test]
fn test_large_payload_round_trip() {
    let payload: Vec<u8> = (0..1_000_000u32).map(|i| (i % 251) as u8).collect();
    let frame = fragment(&payload).unwrap();

    let mut defrag = Defragmenter::default();
    let mut out = Vec::new();
    for chunk in frame.chunks(64 * 1024) {
        defrag.push(chunk, &mut out).unwrap();
    }

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].as_ref(), payload.as_slice());
}

#[tokio::test]
async fn test_framed_write_then_read_through_defragmenter() {
    let mut wire = Vec::new();
    {
        let mut writer = FramedWrite::new(&mut wire, BytesCodec::new());
        for text in ["first", "second", "third"] {
            writer.send(fragment(text.as_bytes()).unwrap()).await.unwrap();
        }
    }

    let mut reader = FramedRead::new(&wire[..], BytesCodec::new());
    let mut defrag = Defragmenter::default();
    let mut out: Vec<Bytes> = Vec::new();
    while let Some(chunk) = reader.next().await {
        defrag.push(&chunk.unwrap(), &mut out).unwrap();
    }

    let texts: Vec<&[u8]> = out.iter().map(|b| b.as_ref()).collect();
    assert_eq!(texts, vec![&b"first"[..], &b"second"[..], &b"third"[..]]);
}
