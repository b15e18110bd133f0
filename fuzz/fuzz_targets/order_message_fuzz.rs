//! Fuzz test for inbound order message parsing
//!
//! Arbitrary payloads must either parse into an order that passes the
//! semantic checks or be rejected with an error. Never a panic.
//!
//! Run with: cargo +nightly fuzz run order_message_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use orderline_core::{parse_order, validate_order, MAX_ORDER_UID_LEN};

fuzz_target!(|data: &[u8]| {
    match parse_order(data) {
        Ok(order) => {
            assert!(!order.order_uid.is_empty());
            assert!(order.order_uid.len() <= MAX_ORDER_UID_LEN);
            assert!(!order.items.is_empty(), "accepted order must carry items");
            assert!(validate_order(&order).is_ok());

            // Re-encoding an accepted order must parse back to the same order.
            if let Ok(encoded) = serde_json::to_vec(&order) {
                assert_eq!(parse_order(&encoded).ok(), Some(order));
            }
        }
        Err(err) => {
            assert!(!err.to_string().is_empty(), "rejection must explain itself");
        }
    }
});
