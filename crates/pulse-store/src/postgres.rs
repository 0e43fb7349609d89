//! Postgres 저장 계층 (1차 계층).
//!
//! `connect_lazy` 풀을 사용하므로 기동 시 DB가 내려가 있어도 생성은
//! 성공하며, 이후 호출마다 재연결을 시도합니다. 1차 계층이 복구되면
//! 캐스케이드가 자동으로 되돌아옵니다.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::{info, warn};

use pulse_core::{AlertRecord, Credential, OrderResult, Symbol, Ticker};

use crate::error::StoreError;
use crate::tier::StorageTier;

/// Postgres 저장 계층.
pub struct PostgresTier {
    pool: PgPool,
}

impl PostgresTier {
    /// 지연 연결 풀로 계층 생성. 실제 연결은 첫 쿼리에서 맺습니다.
    pub fn connect_lazy(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy(url)
            .map_err(StoreError::from_sqlx)?;
        Ok(Self { pool })
    }

    /// 스키마 생성 (없으면). 기동 시 한 번 호출하며, DB가 내려가 있으면
    /// 경고만 남기고 계속 진행합니다.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        const STATEMENTS: &[&str] = &[
            r#"
            CREATE TABLE IF NOT EXISTS orders (
                id BIGSERIAL PRIMARY KEY,
                user_id TEXT NOT NULL,
                venue TEXT NOT NULL,
                venue_order_id TEXT NOT NULL,
                base TEXT NOT NULL,
                quote TEXT NOT NULL,
                side TEXT NOT NULL,
                order_type TEXT NOT NULL,
                quantity NUMERIC NOT NULL,
                price NUMERIC,
                filled_quantity NUMERIC NOT NULL,
                status TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                UNIQUE (venue, venue_order_id)
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_orders_user ON orders (user_id, created_at DESC)",
            r#"
            CREATE TABLE IF NOT EXISTS alerts (
                id UUID PRIMARY KEY,
                user_id TEXT NOT NULL,
                venue TEXT NOT NULL,
                kind TEXT NOT NULL,
                message TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS tickers (
                id BIGSERIAL PRIMARY KEY,
                venue TEXT NOT NULL,
                base TEXT NOT NULL,
                quote TEXT NOT NULL,
                last NUMERIC NOT NULL,
                bid NUMERIC NOT NULL,
                ask NUMERIC NOT NULL,
                change_24h_percent NUMERIC NOT NULL,
                volume_24h NUMERIC NOT NULL,
                high_24h NUMERIC NOT NULL,
                low_24h NUMERIC NOT NULL,
                ts TIMESTAMPTZ NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_tickers_symbol ON tickers (venue, base, quote, ts DESC)",
            r#"
            CREATE TABLE IF NOT EXISTS credentials (
                id UUID PRIMARY KEY,
                user_id TEXT NOT NULL,
                venue TEXT NOT NULL,
                envelope TEXT NOT NULL,
                active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMPTZ NOT NULL,
                UNIQUE (user_id, venue)
            )
            "#,
        ];

        for statement in STATEMENTS {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(StoreError::from_sqlx)?;
        }

        info!("Postgres schema ready");
        Ok(())
    }

    /// 기동 시 베스트에포트 스키마 초기화.
    pub async fn ensure_schema_best_effort(&self) {
        if let Err(e) = self.ensure_schema().await {
            warn!("Schema initialization deferred (database unreachable): {}", e);
        }
    }
}

/// serde 표현을 그대로 TEXT 컬럼에 쓰기 위한 인코딩.
fn enum_to_str<T: Serialize>(value: &T) -> Result<String, StoreError> {
    match serde_json::to_value(value)? {
        serde_json::Value::String(s) => Ok(s),
        other => Err(StoreError::Corrupt(format!(
            "unexpected enum encoding: {}",
            other
        ))),
    }
}

fn enum_from_str<T: DeserializeOwned>(s: &str) -> Result<T, StoreError> {
    serde_json::from_value(serde_json::Value::String(s.to_string())).map_err(Into::into)
}

fn row_to_order(row: &sqlx::postgres::PgRow) -> Result<OrderResult, StoreError> {
    let side: String = row.try_get("side").map_err(StoreError::from_sqlx)?;
    let order_type: String = row.try_get("order_type").map_err(StoreError::from_sqlx)?;
    let status: String = row.try_get("status").map_err(StoreError::from_sqlx)?;

    Ok(OrderResult {
        venue: row.try_get("venue").map_err(StoreError::from_sqlx)?,
        venue_order_id: row
            .try_get("venue_order_id")
            .map_err(StoreError::from_sqlx)?,
        symbol: Symbol::new(
            row.try_get::<String, _>("base")
                .map_err(StoreError::from_sqlx)?,
            row.try_get::<String, _>("quote")
                .map_err(StoreError::from_sqlx)?,
        ),
        side: enum_from_str(&side)?,
        order_type: enum_from_str(&order_type)?,
        quantity: row.try_get("quantity").map_err(StoreError::from_sqlx)?,
        price: row.try_get("price").map_err(StoreError::from_sqlx)?,
        filled_quantity: row
            .try_get("filled_quantity")
            .map_err(StoreError::from_sqlx)?,
        status: enum_from_str(&status)?,
        created_at: row.try_get("created_at").map_err(StoreError::from_sqlx)?,
        updated_at: row.try_get("updated_at").map_err(StoreError::from_sqlx)?,
    })
}

#[async_trait]
impl StorageTier for PostgresTier {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn insert_order(&self, user_id: &str, order: &OrderResult) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO orders
                (user_id, venue, venue_order_id, base, quote, side, order_type,
                 quantity, price, filled_quantity, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (venue, venue_order_id) DO UPDATE SET
                filled_quantity = EXCLUDED.filled_quantity,
                status = EXCLUDED.status,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(user_id)
        .bind(&order.venue)
        .bind(&order.venue_order_id)
        .bind(&order.symbol.base)
        .bind(&order.symbol.quote)
        .bind(enum_to_str(&order.side)?)
        .bind(enum_to_str(&order.order_type)?)
        .bind(order.quantity)
        .bind(order.price)
        .bind(order.filled_quantity)
        .bind(enum_to_str(&order.status)?)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(())
    }

    async fn insert_alert(&self, alert: &AlertRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO alerts (id, user_id, venue, kind, message, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(alert.id)
        .bind(&alert.user_id)
        .bind(&alert.venue)
        .bind(enum_to_str(&alert.kind)?)
        .bind(&alert.message)
        .bind(alert.created_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(())
    }

    async fn insert_tickers(&self, tickers: &[Ticker]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from_sqlx)?;

        for ticker in tickers {
            sqlx::query(
                r#"
                INSERT INTO tickers
                    (venue, base, quote, last, bid, ask, change_24h_percent,
                     volume_24h, high_24h, low_24h, ts)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(&ticker.venue)
            .bind(&ticker.symbol.base)
            .bind(&ticker.symbol.quote)
            .bind(ticker.last)
            .bind(ticker.bid)
            .bind(ticker.ask)
            .bind(ticker.change_24h_percent)
            .bind(ticker.volume_24h)
            .bind(ticker.high_24h)
            .bind(ticker.low_24h)
            .bind(ticker.timestamp)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from_sqlx)?;
        }

        tx.commit().await.map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    async fn recent_orders(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<OrderResult>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT venue, venue_order_id, base, quote, side, order_type,
                   quantity, price, filled_quantity, status, created_at, updated_at
            FROM orders
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        rows.iter().map(row_to_order).collect()
    }

    async fn fetch_credential(
        &self,
        user_id: &str,
        venue: &str,
    ) -> Result<Option<Credential>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, venue, envelope, active, created_at
            FROM credentials
            WHERE user_id = $1 AND venue = $2 AND active = TRUE
            "#,
        )
        .bind(user_id)
        .bind(venue)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        row.map(|row| {
            Ok(Credential {
                id: row.try_get("id").map_err(StoreError::from_sqlx)?,
                user_id: row.try_get("user_id").map_err(StoreError::from_sqlx)?,
                venue: row.try_get("venue").map_err(StoreError::from_sqlx)?,
                envelope: row.try_get("envelope").map_err(StoreError::from_sqlx)?,
                active: row.try_get("active").map_err(StoreError::from_sqlx)?,
                created_at: row.try_get("created_at").map_err(StoreError::from_sqlx)?,
            })
        })
        .transpose()
    }

    async fn upsert_credential(&self, credential: &Credential) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO credentials (id, user_id, venue, envelope, active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, venue) DO UPDATE SET
                envelope = EXCLUDED.envelope,
                active = EXCLUDED.active
            "#,
        )
        .bind(credential.id)
        .bind(&credential.user_id)
        .bind(&credential.venue)
        .bind(&credential.envelope)
        .bind(credential.active)
        .bind(credential.created_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::{OrderStatusType, OrderType, Side};

    #[test]
    fn test_enum_codec_round_trip() {
        assert_eq!(enum_to_str(&Side::Buy).unwrap(), "buy");
        assert_eq!(enum_to_str(&OrderType::Market).unwrap(), "market");
        assert_eq!(
            enum_to_str(&OrderStatusType::PartiallyFilled).unwrap(),
            "partially_filled"
        );

        let side: Side = enum_from_str("sell").unwrap();
        assert_eq!(side, Side::Sell);

        let status: OrderStatusType = enum_from_str("filled").unwrap();
        assert_eq!(status, OrderStatusType::Filled);

        assert!(enum_from_str::<Side>("sideways").is_err());
    }
}
