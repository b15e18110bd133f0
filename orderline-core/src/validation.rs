//! Inbound message parsing and identifier validation.

use serde_json::error::Category;

use crate::error::ValidationError;
use crate::order::Order;

/// Minimum length of an identifier accepted by the read path.
pub const MIN_ORDER_UID_LEN: usize = 5;

/// Maximum length of an identifier (read path and store column width).
pub const MAX_ORDER_UID_LEN: usize = 50;

/// Parse and validate one inbound message.
///
/// Rejects, in order: payloads that are not well-formed JSON, fields outside
/// the schema, absent required fields, an empty or oversized `order_uid`,
/// an empty item list and a `date_created` the store cannot keep exactly.
pub fn parse_order(payload: &[u8]) -> Result<Order, ValidationError> {
    let order: Order = serde_json::from_slice(payload).map_err(classify_decode_error)?;
    validate_order(&order)?;
    Ok(order)
}

/// Semantic checks on an already decoded order.
pub fn validate_order(order: &Order) -> Result<(), ValidationError> {
    if order.order_uid.is_empty() {
        return Err(ValidationError::EmptyOrderUid);
    }
    if order.order_uid.len() > MAX_ORDER_UID_LEN {
        return Err(ValidationError::OrderUidTooLong {
            len: order.order_uid.len(),
            max: MAX_ORDER_UID_LEN,
        });
    }
    if order.items.is_empty() {
        return Err(ValidationError::NoItems {
            order_uid: order.order_uid.clone(),
        });
    }
    // TIMESTAMPTZ keeps microseconds.
    if order.date_created.timestamp_subsec_nanos() % 1_000 != 0 {
        return Err(ValidationError::SubMicrosecondTimestamp {
            value: order.date_created.to_rfc3339(),
        });
    }
    Ok(())
}

/// Shape check for an identifier requested over HTTP.
pub fn validate_order_uid(order_uid: &str) -> Result<(), ValidationError> {
    if order_uid.is_empty() {
        return Err(ValidationError::EmptyOrderUid);
    }
    let len = order_uid.len();
    if !(MIN_ORDER_UID_LEN..=MAX_ORDER_UID_LEN).contains(&len) {
        return Err(ValidationError::InvalidOrderUidLength {
            len,
            min: MIN_ORDER_UID_LEN,
            max: MAX_ORDER_UID_LEN,
        });
    }
    Ok(())
}

fn classify_decode_error(err: serde_json::Error) -> ValidationError {
    match err.classify() {
        Category::Syntax | Category::Eof | Category::Io => ValidationError::MalformedPayload {
            reason: err.to_string(),
        },
        Category::Data => {
            let message = err.to_string();
            if message.starts_with("unknown field") {
                ValidationError::UnknownField {
                    field: backticked(&message).unwrap_or_default(),
                }
            } else if message.starts_with("missing field") {
                ValidationError::MissingField {
                    field: backticked(&message).unwrap_or_default(),
                }
            } else {
                ValidationError::InvalidValue { reason: message }
            }
        }
    }
}

/// First `name` quoted as `` `name` `` in a serde error message.
fn backticked(message: &str) -> Option<String> {
    let start = message.find('`')? + 1;
    let len = message[start..].find('`')?;
    Some(message[start..start + len].to_string())
}
