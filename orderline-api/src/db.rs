//! Database Connection Pool Module
//!
//! PostgreSQL persistence for orders using deadpool-postgres. [`DbClient`]
//! implements [`OrderStore`]: an order is written across `orders`,
//! `deliveries`, `payments` and `items` inside one transaction, and read
//! back from a single repeatable-read snapshot.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use deadpool_postgres::{
    Config, ManagerConfig, Pool, PoolConfig, PoolError, RecyclingMethod, Runtime,
};
use orderline_core::{
    Delivery, Item, Order, OrderlineError, OrderlineResult, Payment, StorageError,
};
use orderline_storage::{OrderStore, SaveMode};
use tokio_postgres::error::SqlState;
use tokio_postgres::types::FromSql;
use tokio_postgres::{IsolationLevel, NoTls, Row};

use crate::config::{parse_flag, parse_var};
use crate::constants::{
    DEFAULT_DB_HOST, DEFAULT_DB_NAME, DEFAULT_DB_POOL_SIZE, DEFAULT_DB_PORT,
    DEFAULT_DB_TIMEOUT_SECS, DEFAULT_DB_USER,
};
use crate::error::{ApiError, ApiResult};
use crate::telemetry::metrics;

/// Schema applied by [`DbClient::ensure_schema`].
pub const SCHEMA_SQL: &str = include_str!("../sql/schema.sql");

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Connection timeout
    pub timeout: Duration,
    /// Apply `sql/schema.sql` at boot
    pub apply_schema: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DB_HOST.to_string(),
            port: DEFAULT_DB_PORT,
            dbname: DEFAULT_DB_NAME.to_string(),
            user: DEFAULT_DB_USER.to_string(),
            password: String::new(),
            max_size: DEFAULT_DB_POOL_SIZE,
            timeout: Duration::from_secs(DEFAULT_DB_TIMEOUT_SECS),
            apply_schema: true,
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> ApiResult<Self> {
        Self::from_lookup(&|key: &str| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    ///
    /// Reads `ORDERLINE_DB_HOST`, `_PORT`, `_NAME`, `_USER`, `_PASSWORD`,
    /// `_POOL_SIZE`, `_TIMEOUT` (seconds) and `ORDERLINE_DB_APPLY_SCHEMA`.
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> ApiResult<Self> {
        Ok(Self {
            host: lookup("ORDERLINE_DB_HOST").unwrap_or_else(|| DEFAULT_DB_HOST.to_string()),
            port: parse_var(lookup, "ORDERLINE_DB_PORT", DEFAULT_DB_PORT)?,
            dbname: lookup("ORDERLINE_DB_NAME").unwrap_or_else(|| DEFAULT_DB_NAME.to_string()),
            user: lookup("ORDERLINE_DB_USER").unwrap_or_else(|| DEFAULT_DB_USER.to_string()),
            password: lookup("ORDERLINE_DB_PASSWORD").unwrap_or_default(),
            max_size: parse_var(lookup, "ORDERLINE_DB_POOL_SIZE", DEFAULT_DB_POOL_SIZE)?,
            timeout: Duration::from_secs(parse_var(
                lookup,
                "ORDERLINE_DB_TIMEOUT",
                DEFAULT_DB_TIMEOUT_SECS,
            )?),
            apply_schema: parse_flag(lookup, "ORDERLINE_DB_APPLY_SCHEMA", true)?,
        })
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());
        cfg.connect_timeout = Some(self.timeout);

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool_config = PoolConfig::new(self.max_size);
        pool_config.timeouts.wait = Some(self.timeout);
        pool_config.timeouts.create = Some(self.timeout);
        pool_config.timeouts.recycle = Some(self.timeout);
        cfg.pool = Some(pool_config);

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))?;

        Ok(pool)
    }
}

// ============================================================================
// DATABASE CLIENT WRAPPER
// ============================================================================

/// PostgreSQL order store backed by a connection pool.
#[derive(Clone)]
pub struct DbClient {
    pool: Pool,
    save_mode: SaveMode,
}

impl DbClient {
    /// Create a new database client with the given pool.
    pub fn new(pool: Pool, save_mode: SaveMode) -> Self {
        Self { pool, save_mode }
    }

    /// Create a new database client from configuration.
    pub fn from_config(config: &DbConfig, save_mode: SaveMode) -> ApiResult<Self> {
        let pool = config.create_pool()?;
        Ok(Self::new(pool, save_mode))
    }

    /// How duplicate identifiers are treated by `save_order`.
    pub fn save_mode(&self) -> SaveMode {
        self.save_mode
    }

    /// Get the current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    /// Apply the bundled schema. Safe to run on every boot.
    pub async fn ensure_schema(&self) -> ApiResult<()> {
        let conn = self.pool.get().await?;
        conn.batch_execute(SCHEMA_SQL).await?;
        tracing::info!("Database schema ensured");
        Ok(())
    }

    async fn get_conn(&self) -> Result<deadpool_postgres::Object, StorageError> {
        self.pool.get().await.map_err(pool_error)
    }

    async fn write_order(&self, order: &Order) -> Result<(), StorageError> {
        let uid = order.order_uid.as_str();
        let mut conn = self.get_conn().await?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| transaction_error(uid, e))?;

        if self.save_mode == SaveMode::Upsert {
            // Child rows go with the header through ON DELETE CASCADE.
            tx.execute("DELETE FROM orders WHERE order_uid = $1", &[&order.order_uid])
                .await
                .map_err(|e| statement_error(uid, e))?;
        }

        tx.execute(
            "INSERT INTO orders (
                order_uid, track_number, entry, locale, internal_signature,
                customer_id, delivery_service, shardkey, sm_id, date_created, oof_shard
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            &[
                &order.order_uid,
                &order.track_number,
                &order.entry,
                &order.locale,
                &order.internal_signature,
                &order.customer_id,
                &order.delivery_service,
                &order.shardkey,
                &order.sm_id,
                &order.date_created,
                &order.oof_shard,
            ],
        )
        .await
        .map_err(|e| statement_error(uid, e))?;

        let d = &order.delivery;
        tx.execute(
            "INSERT INTO deliveries (order_uid, name, phone, zip, city, address, region, email)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            &[
                &order.order_uid,
                &d.name,
                &d.phone,
                &d.zip,
                &d.city,
                &d.address,
                &d.region,
                &d.email,
            ],
        )
        .await
        .map_err(|e| statement_error(uid, e))?;

        let p = &order.payment;
        tx.execute(
            "INSERT INTO payments (
                order_uid, transaction, request_id, currency, provider, amount,
                payment_dt, bank, delivery_cost, goods_total, custom_fee
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            &[
                &order.order_uid,
                &p.transaction,
                &p.request_id,
                &p.currency,
                &p.provider,
                &p.amount,
                &p.payment_dt,
                &p.bank,
                &p.delivery_cost,
                &p.goods_total,
                &p.custom_fee,
            ],
        )
        .await
        .map_err(|e| statement_error(uid, e))?;

        let insert_item = tx
            .prepare(
                "INSERT INTO items (
                    order_uid, position, chrt_id, track_number, price, rid, name,
                    sale, size, total_price, nm_id, brand, status
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
            )
            .await
            .map_err(|e| statement_error(uid, e))?;

        for (position, item) in order.items.iter().enumerate() {
            let position = i32::try_from(position).map_err(|_| StorageError::ConstraintViolation {
                order_uid: order.order_uid.clone(),
                reason: "too many items".to_string(),
            })?;
            tx.execute(
                &insert_item,
                &[
                    &order.order_uid,
                    &position,
                    &item.chrt_id,
                    &item.track_number,
                    &item.price,
                    &item.rid,
                    &item.name,
                    &item.sale,
                    &item.size,
                    &item.total_price,
                    &item.nm_id,
                    &item.brand,
                    &item.status,
                ],
            )
            .await
            .map_err(|e| statement_error(uid, e))?;
        }

        tx.commit().await.map_err(|e| transaction_error(uid, e))
    }

    async fn read_order(&self, order_uid: &str) -> Result<Order, StorageError> {
        let mut conn = self.get_conn().await?;
        let tx = conn
            .build_transaction()
            .isolation_level(IsolationLevel::RepeatableRead)
            .read_only(true)
            .start()
            .await
            .map_err(|e| transaction_error(order_uid, e))?;

        let header = tx
            .query_opt(
                "SELECT order_uid, track_number, entry, locale, internal_signature,
                        customer_id, delivery_service, shardkey, sm_id, date_created, oof_shard
                 FROM orders WHERE order_uid = $1",
                &[&order_uid],
            )
            .await
            .map_err(|e| statement_error(order_uid, e))?
            .ok_or_else(|| StorageError::NotFound {
                order_uid: order_uid.to_string(),
            })?;

        let delivery_row = tx
            .query_opt(
                "SELECT name, phone, zip, city, address, region, email
                 FROM deliveries WHERE order_uid = $1",
                &[&order_uid],
            )
            .await
            .map_err(|e| statement_error(order_uid, e))?
            .ok_or_else(|| missing_part(order_uid, "delivery"))?;

        let payment_row = tx
            .query_opt(
                "SELECT transaction, request_id, currency, provider, amount, payment_dt,
                        bank, delivery_cost, goods_total, custom_fee
                 FROM payments WHERE order_uid = $1",
                &[&order_uid],
            )
            .await
            .map_err(|e| statement_error(order_uid, e))?
            .ok_or_else(|| missing_part(order_uid, "payment"))?;

        let item_rows = tx
            .query(
                "SELECT chrt_id, track_number, price, rid, name, sale, size,
                        total_price, nm_id, brand, status
                 FROM items WHERE order_uid = $1 ORDER BY position",
                &[&order_uid],
            )
            .await
            .map_err(|e| statement_error(order_uid, e))?;

        tx.commit()
            .await
            .map_err(|e| transaction_error(order_uid, e))?;

        let items = item_rows
            .iter()
            .map(|row| decode_item(row, order_uid))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Order {
            order_uid: col(&header, "order_uid", order_uid)?,
            track_number: col(&header, "track_number", order_uid)?,
            entry: col(&header, "entry", order_uid)?,
            delivery: decode_delivery(&delivery_row, order_uid)?,
            payment: decode_payment(&payment_row, order_uid)?,
            items,
            locale: col(&header, "locale", order_uid)?,
            internal_signature: col(&header, "internal_signature", order_uid)?,
            customer_id: col(&header, "customer_id", order_uid)?,
            delivery_service: col(&header, "delivery_service", order_uid)?,
            shardkey: col(&header, "shardkey", order_uid)?,
            sm_id: col(&header, "sm_id", order_uid)?,
            date_created: col(&header, "date_created", order_uid)?,
            oof_shard: col(&header, "oof_shard", order_uid)?,
        })
    }
}

#[async_trait]
impl OrderStore for DbClient {
    async fn save_order(&self, order: &Order) -> OrderlineResult<()> {
        let start = Instant::now();
        let result = self.write_order(order).await;
        record("save_order", result.is_ok(), start);
        result.map_err(OrderlineError::from)
    }

    async fn get_order_by_uid(&self, order_uid: &str) -> OrderlineResult<Order> {
        let start = Instant::now();
        let result = self.read_order(order_uid).await;
        let ok = matches!(result, Ok(_) | Err(StorageError::NotFound { .. }));
        record("get_order_by_uid", ok, start);
        result.map_err(OrderlineError::from)
    }

    async fn ping(&self) -> OrderlineResult<()> {
        let conn = self.get_conn().await?;
        conn.query_one("SELECT 1", &[])
            .await
            .map_err(|e| StorageError::Connection {
                reason: e.to_string(),
            })?;
        Ok(())
    }
}

// ============================================================================
// ROW DECODING
// ============================================================================

fn col<'a, T: FromSql<'a>>(row: &'a Row, name: &str, order_uid: &str) -> Result<T, StorageError> {
    row.try_get(name).map_err(|e| StorageError::Decode {
        order_uid: order_uid.to_string(),
        reason: format!("column {}: {}", name, e),
    })
}

fn decode_delivery(row: &Row, order_uid: &str) -> Result<Delivery, StorageError> {
    Ok(Delivery {
        name: col(row, "name", order_uid)?,
        phone: col(row, "phone", order_uid)?,
        zip: col(row, "zip", order_uid)?,
        city: col(row, "city", order_uid)?,
        address: col(row, "address", order_uid)?,
        region: col(row, "region", order_uid)?,
        email: col(row, "email", order_uid)?,
    })
}

fn decode_payment(row: &Row, order_uid: &str) -> Result<Payment, StorageError> {
    Ok(Payment {
        transaction: col(row, "transaction", order_uid)?,
        request_id: col(row, "request_id", order_uid)?,
        currency: col(row, "currency", order_uid)?,
        provider: col(row, "provider", order_uid)?,
        amount: col(row, "amount", order_uid)?,
        payment_dt: col(row, "payment_dt", order_uid)?,
        bank: col(row, "bank", order_uid)?,
        delivery_cost: col(row, "delivery_cost", order_uid)?,
        goods_total: col(row, "goods_total", order_uid)?,
        custom_fee: col(row, "custom_fee", order_uid)?,
    })
}

fn decode_item(row: &Row, order_uid: &str) -> Result<Item, StorageError> {
    Ok(Item {
        chrt_id: col(row, "chrt_id", order_uid)?,
        track_number: col(row, "track_number", order_uid)?,
        price: col(row, "price", order_uid)?,
        rid: col(row, "rid", order_uid)?,
        name: col(row, "name", order_uid)?,
        sale: col(row, "sale", order_uid)?,
        size: col(row, "size", order_uid)?,
        total_price: col(row, "total_price", order_uid)?,
        nm_id: col(row, "nm_id", order_uid)?,
        brand: col(row, "brand", order_uid)?,
        status: col(row, "status", order_uid)?,
    })
}

// ============================================================================
// ERROR MAPPING
// ============================================================================

fn missing_part(order_uid: &str, part: &str) -> StorageError {
    StorageError::Decode {
        order_uid: order_uid.to_string(),
        reason: format!("order has no {} row", part),
    }
}

fn pool_error(err: PoolError) -> StorageError {
    StorageError::Connection {
        reason: err.to_string(),
    }
}

fn transaction_error(order_uid: &str, err: tokio_postgres::Error) -> StorageError {
    if err.is_closed() {
        return StorageError::Connection {
            reason: err.to_string(),
        };
    }
    StorageError::TransactionFailed {
        reason: format!("order {}: {}", order_uid, err),
    }
}

fn statement_error(order_uid: &str, err: tokio_postgres::Error) -> StorageError {
    match err.code() {
        Some(code)
            if *code == SqlState::UNIQUE_VIOLATION
                || *code == SqlState::FOREIGN_KEY_VIOLATION
                || *code == SqlState::STRING_DATA_RIGHT_TRUNCATION =>
        {
            StorageError::ConstraintViolation {
                order_uid: order_uid.to_string(),
                reason: err
                    .as_db_error()
                    .map(|db| db.message().to_string())
                    .unwrap_or_else(|| err.to_string()),
            }
        }
        _ if err.is_closed() => StorageError::Connection {
            reason: err.to_string(),
        },
        _ => StorageError::Query {
            reason: format!("order {}: {}", order_uid, err),
        },
    }
}

fn record(operation: &str, success: bool, start: Instant) {
    if let Some(metrics) = metrics() {
        metrics.record_store_operation(operation, success, start.elapsed().as_secs_f64());
    }
}
