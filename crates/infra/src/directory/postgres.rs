//! `buyers` テーブルを参照するディレクトリ実装

use async_trait::async_trait;
use rifa_domain::raffle::OwnerId;
use sqlx::PgPool;

use super::{BuyerDirectory, BuyerProfile};
use crate::error::InfraError;

#[derive(sqlx::FromRow)]
struct BuyerRow {
    display_name: String,
    phone:        Option<String>,
}

/// PostgreSQL 実装の BuyerDirectory
#[derive(Debug, Clone)]
pub struct PostgresBuyerDirectory {
    pool: PgPool,
}

impl PostgresBuyerDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BuyerDirectory for PostgresBuyerDirectory {
    #[tracing::instrument(skip_all, level = "debug", fields(%owner_id))]
    async fn lookup_buyer(&self, owner_id: &OwnerId) -> Result<Option<BuyerProfile>, InfraError> {
        let row = sqlx::query_as::<_, BuyerRow>(
            "SELECT display_name, phone FROM buyers WHERE id = $1",
        )
        .bind(owner_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| BuyerProfile {
            display_name: row.display_name,
            phone:        row.phone.unwrap_or_default(),
        }))
    }
}
