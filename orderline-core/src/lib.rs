//! ORDERLINE Core - Order Types
//!
//! Pure data structures plus inbound message validation. All other crates
//! depend on this one; it has no I/O.

pub mod error;
pub mod order;
pub mod validation;

pub use error::{CacheError, OrderlineError, OrderlineResult, StorageError, ValidationError};
pub use order::{Delivery, Item, Order, OrderUid, Payment};
pub use validation::{
    parse_order, validate_order, validate_order_uid, MAX_ORDER_UID_LEN, MIN_ORDER_UID_LEN,
};
