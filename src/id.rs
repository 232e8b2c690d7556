//! Unique identifier generation for reviews, replies, and appeals.
//!
//! Identifiers are 63-bit positive integers laid out Snowflake-style:
//! 41 bits of milliseconds since a service epoch, 10 bits of node id, and a
//! 12-bit per-millisecond sequence. This keeps ids unique across concurrent
//! requests and across instances with distinct node ids, while staying
//! roughly time-ordered.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Service epoch: 2020-01-01T00:00:00Z. Offsetting the timestamp keeps the
/// 41-bit field good for ~69 years of ids.
const EPOCH_MILLIS: i64 = 1_577_836_800_000;

const NODE_BITS: u8 = 10;
const SEQUENCE_BITS: u8 = 12;
const MAX_SEQUENCE: i64 = (1 << SEQUENCE_BITS) - 1;

/// Strictly-unique id source.
///
/// Interior mutability via a `Mutex`: contention is bounded by the id rate,
/// and the critical section is a few arithmetic operations.
pub struct IdGenerator {
    node: i64,
    state: Mutex<Allocation>,
}

struct Allocation {
    millis: i64,
    sequence: i64,
}

impl IdGenerator {
    /// Create a generator for the given node. Node ids above the 10-bit
    /// range are masked; `Config` rejects them before they get here.
    pub fn new(node: u16) -> Self {
        Self {
            node: i64::from(node) & ((1 << NODE_BITS) - 1),
            state: Mutex::new(Allocation {
                millis: 0,
                sequence: 0,
            }),
        }
    }

    /// Allocate the next id. Never returns the same value twice for one
    /// generator, even if the wall clock steps backwards.
    pub fn next(&self) -> i64 {
        let mut state = self.state.lock().expect("mutex poisoned");

        let mut now = now_millis();
        // A backwards clock step must not re-issue old timestamps; keep
        // allocating against the last observed millisecond instead.
        if now < state.millis {
            now = state.millis;
        }

        if now == state.millis {
            state.sequence += 1;
            if state.sequence > MAX_SEQUENCE {
                // Sequence exhausted for this millisecond; wait out the tick.
                while now <= state.millis {
                    now = now_millis();
                }
                state.millis = now;
                state.sequence = 0;
            }
        } else {
            state.millis = now;
            state.sequence = 0;
        }

        ((state.millis - EPOCH_MILLIS) << (NODE_BITS + SEQUENCE_BITS))
            | (self.node << SEQUENCE_BITS)
            | state.sequence
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
