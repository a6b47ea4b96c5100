//! # TicketRepository
//!
//! チケットの永続化を担当するリポジトリ。
//!
//! ## 設計方針
//!
//! - **番号プール全体のロック**: 予約は `ticket_pool_lock` の単一行を
//!   `FOR UPDATE` でロックしてから使用中番号を読む。READ COMMITTED でも
//!   ロック取得後に発行したクエリは先行トランザクションのコミットを観測する
//! - **部分一意インデックス**: `tickets_active_number_key`（`status = 'active'`
//!   の行に限った `number` の一意制約）を二重の防御とする
//! - **取消は行ロックのみ**: 対象番号の行だけを `FOR UPDATE` でロックする

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use rifa_domain::raffle::{
    BuyerName,
    OwnerId,
    PaymentReference,
    PhoneSuffix,
    Ticket,
    TicketId,
    TicketNumber,
    TicketRecord,
    TicketStatus,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{db::TxContext, error::InfraError};

/// 有効なチケットの番号一意制約名
pub const ACTIVE_NUMBER_CONSTRAINT: &str = "tickets_active_number_key";

/// チケットリポジトリトレイト
///
/// 読み取り系はプールから直接、ロック・書き込み系は [`TxContext`] 経由で実行する。
#[async_trait]
pub trait TicketRepository: Send + Sync {
    /// 全チケットを番号の昇順で取得する
    ///
    /// `include_cancelled` が `false` なら有効なチケットのみ。
    /// 同じ番号の履歴行は割り当て時刻の昇順に並ぶ。
    async fn find_all(&self, include_cancelled: bool) -> Result<Vec<Ticket>, InfraError>;

    /// 番号でチケットを検索する
    ///
    /// 有効な行を優先し、`include_cancelled` の場合は最後に取消された行にフォールバックする。
    async fn find_by_number(
        &self,
        number: TicketNumber,
        include_cancelled: bool,
    ) -> Result<Option<Ticket>, InfraError>;

    /// 番号プール全体をロックし、使用中の番号を返す
    ///
    /// ロックはトランザクション終了まで保持される。
    async fn lock_active_numbers(
        &self,
        tx: &mut TxContext,
    ) -> Result<BTreeSet<TicketNumber>, InfraError>;

    /// チケットを一括で挿入する
    ///
    /// # Errors
    ///
    /// 有効な番号が重複した場合は `InfraErrorKind::Conflict`
    async fn insert_many(&self, tx: &mut TxContext, tickets: &[Ticket]) -> Result<(), InfraError>;

    /// 指定番号の全行（履歴を含む）を行ロックして取得する
    async fn lock_by_numbers(
        &self,
        tx: &mut TxContext,
        numbers: &[TicketNumber],
    ) -> Result<Vec<Ticket>, InfraError>;

    /// 状態を一括で遷移させ、実際に変化した番号を昇順で返す
    ///
    /// - `Cancelled`: 有効な行を取消済みにする
    /// - `Active`: 有効な行がない番号について、最後に取消された行を有効に戻す
    ///
    /// すでに目的の状態にある番号は戻り値に含まれない。
    async fn set_status(
        &self,
        tx: &mut TxContext,
        numbers: &[TicketNumber],
        status: TicketStatus,
        now: DateTime<Utc>,
    ) -> Result<Vec<TicketNumber>, InfraError>;

    /// 有効な行を物理削除し、削除した番号を昇順で返す
    async fn delete_active(
        &self,
        tx: &mut TxContext,
        numbers: &[TicketNumber],
    ) -> Result<Vec<TicketNumber>, InfraError>;
}

/// DB の tickets テーブルの行
#[derive(sqlx::FromRow)]
struct TicketRow {
    id:                 Uuid,
    number:             i32,
    owner_id:           String,
    buyer_display_name: String,
    buyer_phone_suffix: String,
    payment_reference:  String,
    status:             String,
    allocated_at:       DateTime<Utc>,
    cancelled_at:       Option<DateTime<Utc>>,
}

impl TryFrom<TicketRow> for Ticket {
    type Error = InfraError;

    fn try_from(row: TicketRow) -> Result<Self, Self::Error> {
        let unexpected = |e: rifa_domain::DomainError| InfraError::unexpected(e.to_string());

        Ok(Ticket::from_db(TicketRecord {
            id:                TicketId::from_uuid(row.id),
            number:            TicketNumber::new(row.number).map_err(unexpected)?,
            owner_id:          OwnerId::new(row.owner_id).map_err(unexpected)?,
            buyer_name:        BuyerName::new(row.buyer_display_name).map_err(unexpected)?,
            phone_suffix:      PhoneSuffix::from_stored(row.buyer_phone_suffix)
                .map_err(unexpected)?,
            payment_reference: PaymentReference::new(row.payment_reference)
                .map_err(unexpected)?,
            status:            row.status.parse::<TicketStatus>().map_err(unexpected)?,
            allocated_at:      row.allocated_at,
            cancelled_at:      row.cancelled_at,
        }))
    }
}

/// DB から返った番号列を昇順の `TicketNumber` に変換する
fn into_sorted_numbers(values: Vec<i32>) -> Result<Vec<TicketNumber>, InfraError> {
    values
        .into_iter()
        .sorted_unstable()
        .dedup()
        .map(|v| TicketNumber::new(v).map_err(|e| InfraError::unexpected(e.to_string())))
        .collect()
}

fn as_i32s(numbers: &[TicketNumber]) -> Vec<i32> {
    numbers.iter().map(TicketNumber::as_i32).collect()
}

/// 挿入時のエラーを変換する
///
/// 有効番号の一意制約違反のみ Conflict にし、それ以外はそのまま Database とする。
fn map_insert_error(err: sqlx::Error, numbers: &[i32]) -> InfraError {
    let is_active_number_violation = err
        .as_database_error()
        .and_then(|db_err| db_err.constraint())
        .is_some_and(|constraint| constraint == ACTIVE_NUMBER_CONSTRAINT);

    if is_active_number_violation {
        InfraError::conflict("Ticket", numbers.iter().join(","))
    } else {
        err.into()
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT
        id,
        number,
        owner_id,
        buyer_display_name,
        buyer_phone_suffix,
        payment_reference,
        status,
        allocated_at,
        cancelled_at
    FROM tickets
"#;

/// PostgreSQL 実装の TicketRepository
#[derive(Debug, Clone)]
pub struct PostgresTicketRepository {
    pool: PgPool,
}

impl PostgresTicketRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TicketRepository for PostgresTicketRepository {
    #[tracing::instrument(skip_all, level = "debug", fields(include_cancelled = include_cancelled))]
    async fn find_all(&self, include_cancelled: bool) -> Result<Vec<Ticket>, InfraError> {
        let sql = format!(
            "{SELECT_COLUMNS} WHERE ($1 OR status = 'active') ORDER BY number ASC, allocated_at ASC"
        );
        let rows = sqlx::query_as::<_, TicketRow>(&sql)
            .bind(include_cancelled)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Ticket::try_from).collect()
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%number, include_cancelled = include_cancelled))]
    async fn find_by_number(
        &self,
        number: TicketNumber,
        include_cancelled: bool,
    ) -> Result<Option<Ticket>, InfraError> {
        let sql = format!(
            r#"{SELECT_COLUMNS}
            WHERE number = $1 AND ($2 OR status = 'active')
            ORDER BY (status = 'active') DESC, cancelled_at DESC NULLS LAST, allocated_at DESC
            LIMIT 1"#
        );
        let row = sqlx::query_as::<_, TicketRow>(&sql)
            .bind(number.as_i32())
            .bind(include_cancelled)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Ticket::try_from).transpose()
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn lock_active_numbers(
        &self,
        tx: &mut TxContext,
    ) -> Result<BTreeSet<TicketNumber>, InfraError> {
        let conn = tx.conn()?;

        let locked: Option<i32> =
            sqlx::query_scalar("SELECT id FROM ticket_pool_lock WHERE id = 1 FOR UPDATE")
                .fetch_optional(&mut *conn)
                .await?;
        if locked.is_none() {
            return Err(InfraError::unexpected(
                "ticket_pool_lock の行が存在しません（マイグレーション未適用の可能性）",
            ));
        }

        // ロック取得後に読むため、先行する予約のコミット結果が見える
        let numbers: Vec<i32> =
            sqlx::query_scalar("SELECT number FROM tickets WHERE status = 'active'")
                .fetch_all(&mut *conn)
                .await?;

        Ok(into_sorted_numbers(numbers)?.into_iter().collect())
    }

    #[tracing::instrument(skip_all, level = "debug", fields(count = tickets.len()))]
    async fn insert_many(&self, tx: &mut TxContext, tickets: &[Ticket]) -> Result<(), InfraError> {
        if tickets.is_empty() {
            return Ok(());
        }

        let ids: Vec<Uuid> = tickets.iter().map(|t| *t.id().as_uuid()).collect();
        let numbers: Vec<i32> = tickets.iter().map(|t| t.number().as_i32()).collect();
        let owner_ids: Vec<String> = tickets
            .iter()
            .map(|t| t.buyer().owner_id().as_str().to_string())
            .collect();
        let names: Vec<String> = tickets
            .iter()
            .map(|t| t.buyer().name().as_str().to_string())
            .collect();
        let phone_suffixes: Vec<String> = tickets
            .iter()
            .map(|t| t.buyer().phone_suffix().as_str().to_string())
            .collect();
        let payment_references: Vec<String> = tickets
            .iter()
            .map(|t| t.payment_reference().as_str().to_string())
            .collect();
        let statuses: Vec<String> = tickets.iter().map(|t| t.status().to_string()).collect();
        let allocated_ats: Vec<DateTime<Utc>> = tickets.iter().map(Ticket::allocated_at).collect();

        sqlx::query(
            r#"
            INSERT INTO tickets (
                id, number, owner_id, buyer_display_name, buyer_phone_suffix,
                payment_reference, status, allocated_at
            )
            SELECT * FROM UNNEST(
                $1::uuid[], $2::int4[], $3::text[], $4::text[], $5::text[],
                $6::text[], $7::text[], $8::timestamptz[]
            )
            "#,
        )
        .bind(ids)
        .bind(&numbers)
        .bind(owner_ids)
        .bind(names)
        .bind(phone_suffixes)
        .bind(payment_references)
        .bind(statuses)
        .bind(allocated_ats)
        .execute(tx.conn()?)
        .await
        .map_err(|e| map_insert_error(e, &numbers))?;

        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug", fields(count = numbers.len()))]
    async fn lock_by_numbers(
        &self,
        tx: &mut TxContext,
        numbers: &[TicketNumber],
    ) -> Result<Vec<Ticket>, InfraError> {
        let sql = format!(
            "{SELECT_COLUMNS} WHERE number = ANY($1) ORDER BY number ASC, allocated_at ASC FOR UPDATE"
        );
        let rows = sqlx::query_as::<_, TicketRow>(&sql)
            .bind(as_i32s(numbers))
            .fetch_all(tx.conn()?)
            .await?;

        rows.into_iter().map(Ticket::try_from).collect()
    }

    #[tracing::instrument(skip_all, level = "debug", fields(count = numbers.len(), %status))]
    async fn set_status(
        &self,
        tx: &mut TxContext,
        numbers: &[TicketNumber],
        status: TicketStatus,
        now: DateTime<Utc>,
    ) -> Result<Vec<TicketNumber>, InfraError> {
        let values = as_i32s(numbers);

        let changed: Vec<i32> = match status {
            TicketStatus::Cancelled => {
                sqlx::query_scalar(
                    r#"
                    UPDATE tickets
                    SET status = 'cancelled', cancelled_at = $2
                    WHERE number = ANY($1) AND status = 'active'
                    RETURNING number
                    "#,
                )
                .bind(&values)
                .bind(now)
                .fetch_all(tx.conn()?)
                .await?
            }
            TicketStatus::Active => {
                sqlx::query_scalar(
                    r#"
                    UPDATE tickets t
                    SET status = 'active', cancelled_at = NULL
                    FROM (
                        SELECT DISTINCT ON (c.number) c.id
                        FROM tickets c
                        WHERE c.number = ANY($1)
                          AND c.status = 'cancelled'
                          AND NOT EXISTS (
                              SELECT 1 FROM tickets a
                              WHERE a.number = c.number AND a.status = 'active'
                          )
                        ORDER BY c.number, c.cancelled_at DESC NULLS LAST, c.allocated_at DESC
                    ) latest
                    WHERE t.id = latest.id
                    RETURNING t.number
                    "#,
                )
                .bind(&values)
                .fetch_all(tx.conn()?)
                .await
                .map_err(|e| map_insert_error(e, &values))?
            }
        };

        into_sorted_numbers(changed)
    }

    #[tracing::instrument(skip_all, level = "debug", fields(count = numbers.len()))]
    async fn delete_active(
        &self,
        tx: &mut TxContext,
        numbers: &[TicketNumber],
    ) -> Result<Vec<TicketNumber>, InfraError> {
        let deleted: Vec<i32> = sqlx::query_scalar(
            "DELETE FROM tickets WHERE number = ANY($1) AND status = 'active' RETURNING number",
        )
        .bind(as_i32s(numbers))
        .fetch_all(tx.conn()?)
        .await?;

        into_sorted_numbers(deleted)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_postgres_ticket_repositoryはsendとsyncを実装している() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PostgresTicketRepository>();
    }

    #[test]
    fn test_番号列は重複を除いて昇順に並ぶ() {
        let numbers = into_sorted_numbers(vec![5, 2, 5, 9]).unwrap();

        assert_eq!(
            numbers.iter().map(TicketNumber::as_i32).collect::<Vec<_>>(),
            vec![2, 5, 9]
        );
    }

    #[test]
    fn test_不正な番号はunexpectedになる() {
        assert!(into_sorted_numbers(vec![0]).is_err());
    }

    #[test]
    fn test_一意制約以外の挿入エラーはdatabaseのまま() {
        let err = map_insert_error(sqlx::Error::RowNotFound, &[1, 2]);

        assert!(err.as_conflict().is_none());
    }

    #[test]
    fn test_保存値が壊れた行はunexpectedで読み込みに失敗する() {
        let row = TicketRow {
            id:                 Uuid::now_v7(),
            number:             3,
            owner_id:           "user-1".to_string(),
            buyer_display_name: "Maria".to_string(),
            buyer_phone_suffix: "4321".to_string(),
            payment_reference:  "pay-1".to_string(),
            status:             "reserved".to_string(),
            allocated_at:       Utc::now(),
            cancelled_at:       None,
        };

        let result = Ticket::try_from(row);

        assert!(result.is_err());
    }
}
