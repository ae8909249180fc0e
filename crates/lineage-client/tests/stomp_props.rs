//! Property tests for the STOMP codec under arbitrary TCP chunking.

use lineage_client::stomp::{decode_frame, Frame};
use proptest::prelude::*;

fn header_value() -> impl Strategy<Value = String> {
    // Includes the characters STOMP 1.2 requires escaping.
    "[a-z0-9:\\\\\n/_ -]{0,12}"
}

fn message() -> impl Strategy<Value = Frame> {
    (
        prop::collection::vec(("[a-z][a-z-]{0,8}", header_value()), 0..4),
        prop::option::of(prop::collection::vec(any::<u8>(), 0..64)),
    )
        .prop_map(|(headers, body)| {
            let mut frame = Frame::new("MESSAGE");
            for (k, v) in headers {
                frame = frame.header(k, v);
            }
            match body {
                Some(b) => frame.body(b),
                None => frame,
            }
        })
}

proptest! {
    /// A frame is only produced once its last byte arrived.
    #[test]
    fn partial_input_never_yields_a_frame(frame in message()) {
        let bytes = frame.encode();
        for cut in 0..bytes.len() {
            prop_assert!(decode_frame(&bytes[..cut]).unwrap().is_none());
        }
        let (decoded, used) = decode_frame(&bytes).unwrap().unwrap();
        prop_assert_eq!(used, bytes.len());
        prop_assert_eq!(&decoded.body, &frame.body);
        for (k, _) in &frame.headers {
            prop_assert_eq!(decoded.get(k), frame.get(k));
        }
    }

    /// Back-to-back frames split anywhere decode to the same sequence.
    #[test]
    fn stream_of_frames_survives_any_split(
        frames in prop::collection::vec(message(), 1..4),
        split in any::<prop::sample::Index>(),
    ) {
        let wire: Vec<u8> = frames.iter().flat_map(|f| f.encode()).collect();
        let split = split.index(wire.len() + 1);

        let mut buf = Vec::new();
        let mut out = Vec::new();
        for chunk in [&wire[..split], &wire[split..]] {
            buf.extend_from_slice(chunk);
            while let Some((frame, used)) = decode_frame(&buf).unwrap() {
                buf.drain(..used);
                out.push(frame);
            }
        }
        prop_assert!(buf.is_empty());
        prop_assert_eq!(out.len(), frames.len());
        for (got, want) in out.iter().zip(&frames) {
            prop_assert_eq!(&got.body, &want.body);
        }
    }
}
