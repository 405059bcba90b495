//! Numeric Identifier Generation
//!
//! Time-sorted 64-bit identifiers for newly persisted entities.

use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static COUNTER: AtomicU16 = AtomicU16::new(0);

/// Generate a time-sorted identifier. Never returns 0: a zero ID marks an
/// unsaved entity throughout the directory.
///
/// Structure (64 bits):
/// - 42 bits: timestamp (milliseconds since epoch)
/// - 10 bits: random component
/// - 12 bits: counter (4096 unique IDs per millisecond)
pub fn next_id() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis() as u64;

    let counter = COUNTER.fetch_add(1, Ordering::SeqCst) as u64;
    let random = rand_bits() & 0x3FF;

    let id = ((now & 0x3FF_FFFF_FFFF) << 22) | (random << 12) | (counter & 0xFFF);
    if id == 0 {
        1
    } else {
        id
    }
}

/// Simple random bits using system time and counter
fn rand_bits() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_nanos() as u64;
    let counter = COUNTER.load(Ordering::Relaxed) as u64;
    now ^ counter.wrapping_mul(0x5851_F42D_4C95_7F2D)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonzero() {
        for _ in 0..100 {
            assert_ne!(next_id(), 0);
        }
    }

    #[test]
    fn test_uniqueness() {
        let mut ids = std::collections::HashSet::new();
        for _ in 0..1000 {
            assert!(ids.insert(next_id()), "duplicate ID generated");
        }
    }

    #[test]
    fn test_time_sorted() {
        let first = next_id();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = next_id();
        assert!(first < second);
    }
}
