// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Property tests driving a `ChainBuf` against a flat `Vec<u8>` model.
//!
//! The buffer under test uses a 64-byte block size so that random operation
//! sequences constantly cross block boundaries. After every operation the
//! suite checks the buffer's self-diagnostics, its length, and its full
//! content against the model, plus the equivalence of the scatter/gather
//! export with a flat read.

use std::io::IoSlice;

use chainbuf::{ChainBuf, Error, FailingAlloc, Mempool, PoolAlloc};
use proptest::prelude::*;

const DATA_SIZE: usize = 64;

type TestBuf = ChainBuf<Mempool<64>>;

fn new_buf() -> TestBuf {
    ChainBuf::with_allocator(Mempool::<64>::new()).expect("test pool never fails")
}

fn buf_len<A: PoolAlloc>(buf: &ChainBuf<A>) -> usize {
    &buf.end() - &buf.begin()
}

fn buf_content<A: PoolAlloc>(buf: &ChainBuf<A>) -> Vec<u8> {
    let mut out = vec![0u8; buf_len(buf)];
    buf.get(&buf.begin(), &mut out);
    out
}

fn iov_content(buf: &TestBuf) -> Vec<u8> {
    let start = buf.begin();
    let end = buf.end();
    let mut vecs = [IoSlice::new(&[]); 256];
    let count = buf.get_iov(&start, &end, &mut vecs);
    vecs[..count].iter().flat_map(|v| v.iter().copied()).collect()
}

#[derive(Clone, Debug)]
enum Op {
    AddBack(Vec<u8>),
    Insert { at: usize, data: Vec<u8> },
    Release { at: usize, len: usize },
    Set { at: usize, data: Vec<u8> },
    DropFront(usize),
    DropBack(usize),
    Flush,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => prop::collection::vec(any::<u8>(), 1..150).prop_map(Op::AddBack),
        2 => (any::<usize>(), prop::collection::vec(any::<u8>(), 1..DATA_SIZE))
            .prop_map(|(at, data)| Op::Insert { at, data }),
        2 => (any::<usize>(), 1..200usize).prop_map(|(at, len)| Op::Release { at, len }),
        2 => (any::<usize>(), prop::collection::vec(any::<u8>(), 1..100))
            .prop_map(|(at, data)| Op::Set { at, data }),
        1 => (1..300usize).prop_map(Op::DropFront),
        1 => (1..300usize).prop_map(Op::DropBack),
        1 => Just(Op::Flush),
    ]
}

/// Applies one operation to both the buffer and the model, clamping the
/// randomly drawn coordinates to the current state.
fn apply(buf: &mut TestBuf, model: &mut Vec<u8>, op: &Op) {
    match op {
        Op::AddBack(data) => {
            buf.add_back(data).expect("test pool never fails");
            model.extend_from_slice(data);
        }
        Op::Insert { at, data } => {
            let at = *at % (model.len() + 1);
            let cursor = &buf.begin() + at;
            buf.insert(&cursor, data.len()).expect("test pool never fails");
            buf.set(&cursor, data);
            model.splice(at..at, data.iter().copied());
        }
        Op::Release { at, len } => {
            if model.is_empty() {
                return;
            }
            let at = *at % model.len();
            let len = 1 + (*len - 1) % (model.len() - at);
            let cursor = &buf.begin() + at;
            buf.release(&cursor, len);
            model.drain(at..at + len);
        }
        Op::Set { at, data } => {
            if model.is_empty() {
                return;
            }
            let at = *at % model.len();
            let len = data.len().min(model.len() - at);
            let cursor = &buf.begin() + at;
            buf.set(&cursor, &data[..len]);
            model[at..at + len].copy_from_slice(&data[..len]);
        }
        Op::DropFront(len) => {
            if model.is_empty() {
                return;
            }
            let len = 1 + (*len - 1) % model.len();
            buf.drop_front(len);
            model.drain(..len);
        }
        Op::DropBack(len) => {
            if model.is_empty() {
                return;
            }
            let len = 1 + (*len - 1) % model.len();
            buf.drop_back(len);
            model.truncate(model.len() - len);
        }
        Op::Flush => {
            // No cursor is live between operations, so flush clears all.
            buf.flush();
            model.clear();
        }
    }
}

proptest! {
    /// Random operation sequences keep the buffer healthy and equal to the
    /// flat model, both through point reads and the scatter/gather export.
    #[test]
    fn buffer_matches_flat_model(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let mut buf = new_buf();
        let mut model = Vec::new();

        for op in &ops {
            apply(&mut buf, &mut model, op);

            prop_assert_eq!(buf.debug_self_check(), 0);
            prop_assert_eq!(buf_len(&buf), model.len());
            // Emptiness is positional equality of begin and end; a begin
            // resting at a block's data end with end at offset 0 of the
            // next block holds zero bytes yet compares non-empty, so only
            // the forward implication is universal.
            if buf.is_empty() {
                prop_assert!(model.is_empty());
            }
            prop_assert_eq!(buf_content(&buf), model.clone());
            prop_assert_eq!(iov_content(&buf), model.clone());
        }
    }

    /// Cursor distance equals the number of single-byte advances between
    /// two positions.
    #[test]
    fn distance_counts_single_steps(len in 1..400usize, a in any::<usize>(), b in any::<usize>()) {
        let mut buf = new_buf();
        buf.add_back(&vec![0xA5; len]).expect("test pool never fails");

        let (a, b) = {
            let a = a % (len + 1);
            let b = b % (len + 1);
            (a.min(b), a.max(b))
        };

        let near = &buf.begin() + a;
        let far = &buf.begin() + b;
        prop_assert_eq!(&far - &near, b - a);

        let mut walked = near.clone();
        let mut steps = 0;
        while walked != far {
            walked.advance(1);
            steps += 1;
        }
        prop_assert_eq!(steps, b - a);
    }

    /// Inserting and then releasing the same size at the same cursor leaves
    /// both the content and every cursor position unchanged.
    #[test]
    fn insert_release_round_trip(
        payload in prop::collection::vec(any::<u8>(), 1..300),
        at in any::<usize>(),
        size in 1..DATA_SIZE,
        witness_off in any::<usize>(),
    ) {
        let mut buf = new_buf();
        buf.add_back(&payload).expect("test pool never fails");

        let at = at % (payload.len() + 1);
        let witness_off = witness_off % (payload.len() + 1);

        let cursor = &buf.begin() + at;
        let witness = &buf.begin() + witness_off;

        buf.insert(&cursor, size).expect("test pool never fails");
        buf.release(&cursor, size);

        prop_assert_eq!(buf_content(&buf), payload);
        prop_assert_eq!(&witness - &buf.begin(), witness_off);
        prop_assert_eq!(buf.debug_self_check(), 0);
    }

    /// Dropping the front shortens the distance from `begin()` to a cursor
    /// past the dropped range by exactly the dropped amount.
    #[test]
    fn drop_front_preserves_cursor_distances(
        len in 2..400usize,
        k in any::<usize>(),
        off in any::<usize>(),
    ) {
        let mut buf = new_buf();
        buf.add_back(&vec![0x5A; len]).expect("test pool never fails");

        let k = 1 + k % (len - 1);
        let off = k + off % (len - k + 1);

        let cursor = &buf.begin() + off;
        buf.drop_front(k);

        prop_assert_eq!(&cursor - &buf.begin(), off - k);
        prop_assert_eq!(buf_len(&buf), len - k);
        prop_assert_eq!(buf.debug_self_check(), 0);
    }

    /// A failed multi-block append leaves the buffer observably unchanged.
    #[test]
    fn failed_append_is_atomic(
        prefix in prop::collection::vec(any::<u8>(), 1..64),
        budget in 1..3usize,
        attempt_len in 200..500usize,
    ) {
        // Construction consumes one block from the budget.
        let alloc = FailingAlloc::new(Mempool::<64>::new(), budget);
        let mut buf = ChainBuf::with_allocator(alloc).expect("budget covers construction");

        if buf.add_back(&prefix).is_err() {
            // The prefix itself exhausted the budget; nothing to verify.
            return Ok(());
        }
        let before = buf_content(&buf);

        // The attempt needs more blocks than the remaining budget allows.
        let result = buf.add_back(&vec![0xFF; attempt_len]);
        prop_assert!(matches!(result, Err(Error::OutOfMemory)));

        prop_assert_eq!(buf_content(&buf), before);
        prop_assert_eq!(buf.debug_self_check(), 0);
    }
}
