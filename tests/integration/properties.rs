use proptest::prelude::*;

use airgap_core::Chunks;

use crate::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Any payload, any chunk size, any delivery order: the receiver ends
    /// up with the original bytes.
    #[test]
    fn any_order_reassembles(
        data in prop::collection::vec(any::<u8>(), 0..4096),
        chunk_size in 7usize..512,
        seed in any::<u64>(),
    ) {
        let frames = Chunks::from_data(&data, chunk_size).unwrap().serialize();
        let received = receive(&shuffled(&frames, seed)).unwrap();
        prop_assert!(received.is_complete());
        prop_assert_eq!(received.data().unwrap(), data);
    }

    /// Re-delivering frames never changes what is reassembled.
    #[test]
    fn duplicates_are_harmless(
        data in prop::collection::vec(any::<u8>(), 1..2048),
        chunk_size in 7usize..128,
        repeats in 1usize..4,
    ) {
        let frames = Chunks::from_data(&data, chunk_size).unwrap().serialize();
        let chunks = Chunks::new();
        for _ in 0..repeats {
            for frame in &frames {
                chunks.read_chunk(frame).unwrap();
            }
        }
        prop_assert_eq!(chunks.received(), frames.len());
        prop_assert_eq!(chunks.data().unwrap(), data);
    }

    /// Operations come back in the order they were added.
    #[test]
    fn operations_keep_order(
        ops in prop::collection::vec(
            (any::<u16>(), prop::collection::vec(any::<u8>(), 0..64)),
            0..16,
        ),
        chunk_size in 16usize..256,
    ) {
        let ctx = airgap(chunk_size);
        let message = ops
            .iter()
            .fold(ctx.create_message(), |msg, (op, data)| msg.add_operation(*op, data.clone()));

        let frames = message.marshal_chunks().unwrap();
        let received = ctx.unmarshal_chunks(&receive(&frames).unwrap()).unwrap();

        prop_assert_eq!(received.operations().len(), ops.len());
        for (got, (op, data)) in received.operations().iter().zip(&ops) {
            prop_assert_eq!(got.op_code(), *op);
            prop_assert_eq!(got.data().as_ref(), data.as_slice());
        }
    }

    /// Arbitrary text lines never panic the receiver, and a rejected line
    /// leaves it untouched.
    #[test]
    fn garbage_lines_never_panic(line in "\\PC{0,80}") {
        let chunks = Chunks::new();
        if chunks.read_chunk(&line).is_err() {
            prop_assert_eq!(chunks.count(), 0);
            prop_assert_eq!(chunks.received(), 0);
        }
    }
}
