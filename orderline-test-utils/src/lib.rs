//! ORDERLINE Test Utilities
//!
//! Shared fixtures and proptest generators for the orderline workspace.
//! The in-memory store lives in `orderline-storage` and is re-exported here
//! so integration tests only need one dev-dependency.

pub use orderline_core::{Delivery, Item, Order, Payment};
pub use orderline_storage::{MockStore, OrderStore, SaveMode};

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built orders and wire messages.

    use chrono::{TimeZone, Utc};
    use orderline_core::{Delivery, Item, Order, Payment};

    /// A complete, valid order with the given identifier.
    pub fn sample_order(order_uid: &str) -> Order {
        Order {
            order_uid: order_uid.to_string(),
            track_number: "WBILMTESTTRACK".to_string(),
            entry: "WBIL".to_string(),
            delivery: Delivery {
                name: "Test Testov".to_string(),
                phone: "+9720000000".to_string(),
                zip: "2639809".to_string(),
                city: "Kiryat Mozkin".to_string(),
                address: "Ploshad Mira 15".to_string(),
                region: "Kraiot".to_string(),
                email: "test@gmail.com".to_string(),
            },
            payment: Payment {
                transaction: order_uid.to_string(),
                request_id: String::new(),
                currency: "USD".to_string(),
                provider: "wbpay".to_string(),
                amount: 1817,
                payment_dt: 1637907727,
                bank: "alpha".to_string(),
                delivery_cost: 1500,
                goods_total: 317,
                custom_fee: 0,
            },
            items: vec![sample_item()],
            locale: "en".to_string(),
            internal_signature: String::new(),
            customer_id: "test".to_string(),
            delivery_service: "meest".to_string(),
            shardkey: "9".to_string(),
            sm_id: 99,
            date_created: Utc
                .with_ymd_and_hms(2021, 11, 26, 6, 22, 19)
                .single()
                .unwrap_or_default(),
            oof_shard: "1".to_string(),
        }
    }

    /// A single line item.
    pub fn sample_item() -> Item {
        Item {
            chrt_id: 9934930,
            track_number: "WBILMTESTTRACK".to_string(),
            price: 453,
            rid: "ab4219087a764ae0btest".to_string(),
            name: "Mascaras".to_string(),
            sale: 30,
            size: "0".to_string(),
            total_price: 317,
            nm_id: 2389212,
            brand: "Vivienne Sabo".to_string(),
            status: 202,
        }
    }

    /// An order carrying `count` distinct items.
    pub fn order_with_items(order_uid: &str, count: usize) -> Order {
        let mut order = sample_order(order_uid);
        order.items = (0..count)
            .map(|i| {
                let mut item = sample_item();
                item.chrt_id += i as i64;
                item.rid = format!("rid-{}", i);
                item
            })
            .collect();
        order
    }

    /// The sample order as a JSON value, for tests that need to tamper with
    /// the document before sending it.
    pub fn order_json(order_uid: &str) -> serde_json::Value {
        serde_json::to_value(sample_order(order_uid)).unwrap_or(serde_json::Value::Null)
    }

    /// The sample order encoded as a stream message payload.
    pub fn order_message(order_uid: &str) -> Vec<u8> {
        serde_json::to_vec(&sample_order(order_uid)).unwrap_or_default()
    }

    /// Encode an arbitrary JSON document as a message payload.
    pub fn message_from_json(value: &serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(value).unwrap_or_default()
    }
}

// ============================================================================
// GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for order data.

    use chrono::{DateTime, Utc};
    use orderline_core::{Delivery, Item, Order, Payment};
    use proptest::prelude::*;

    /// Generate an order identifier accepted by the read path.
    pub fn arb_order_uid() -> impl Strategy<Value = String> {
        "[a-z0-9]{5,50}"
    }

    /// Generate short free text.
    pub fn arb_text() -> impl Strategy<Value = String> {
        "[A-Za-z0-9 ]{0,24}"
    }

    /// Generate a timestamp with microsecond precision (2020-2030).
    pub fn arb_timestamp() -> impl Strategy<Value = DateTime<Utc>> {
        (1577836800i64..1893456000i64, 0u32..1_000_000).prop_map(|(secs, micros)| {
            DateTime::from_timestamp(secs, micros * 1_000).unwrap_or_default()
        })
    }

    /// Generate a delivery record.
    pub fn arb_delivery() -> impl Strategy<Value = Delivery> {
        (
            arb_text(),
            arb_text(),
            arb_text(),
            arb_text(),
            arb_text(),
            arb_text(),
            arb_text(),
        )
            .prop_map(|(name, phone, zip, city, address, region, email)| Delivery {
                name,
                phone,
                zip,
                city,
                address,
                region,
                email,
            })
    }

    /// Generate a payment record.
    pub fn arb_payment() -> impl Strategy<Value = Payment> {
        (
            (arb_text(), arb_text(), "[A-Z]{3}", arb_text(), arb_text()),
            (0i64..10_000_000, 0i64..2_000_000_000, 0i64..100_000, 0i64..10_000_000, 0i64..10_000),
        )
            .prop_map(
                |(
                    (transaction, request_id, currency, provider, bank),
                    (amount, payment_dt, delivery_cost, goods_total, custom_fee),
                )| Payment {
                    transaction,
                    request_id,
                    currency,
                    provider,
                    amount,
                    payment_dt,
                    bank,
                    delivery_cost,
                    goods_total,
                    custom_fee,
                },
            )
    }

    /// Generate a line item.
    pub fn arb_item() -> impl Strategy<Value = Item> {
        (
            (0i64..100_000_000, arb_text(), 0i64..1_000_000, arb_text(), arb_text()),
            (0i32..100, arb_text(), 0i64..1_000_000, 0i64..100_000_000, arb_text(), 0i32..1000),
        )
            .prop_map(
                |(
                    (chrt_id, track_number, price, rid, name),
                    (sale, size, total_price, nm_id, brand, status),
                )| Item {
                    chrt_id,
                    track_number,
                    price,
                    rid,
                    name,
                    sale,
                    size,
                    total_price,
                    nm_id,
                    brand,
                    status,
                },
            )
    }

    /// Generate a valid order with one to eight items.
    pub fn arb_order() -> impl Strategy<Value = Order> {
        (
            (arb_order_uid(), arb_text(), arb_text(), arb_delivery(), arb_payment()),
            prop::collection::vec(arb_item(), 1..8),
            (arb_text(), arb_text(), arb_text(), arb_text(), arb_text()),
            (any::<i32>(), arb_timestamp(), arb_text()),
        )
            .prop_map(
                |(
                    (order_uid, track_number, entry, delivery, payment),
                    items,
                    (locale, internal_signature, customer_id, delivery_service, shardkey),
                    (sm_id, date_created, oof_shard),
                )| Order {
                    order_uid,
                    track_number,
                    entry,
                    delivery,
                    payment,
                    items,
                    locale,
                    internal_signature,
                    customer_id,
                    delivery_service,
                    shardkey,
                    sm_id,
                    date_created,
                    oof_shard,
                },
            )
    }
}
