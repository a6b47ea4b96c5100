//! # 取消ユースケース
//!
//! 割り当て済みの番号を取消し、再び予約できる状態に戻す。
//! 取消は対象番号の行ロックのみを取り、番号プールのロックは取らない。
//!
//! 保存方針（[`CancellationPolicy`]）はデプロイ単位の設定で、
//! 単体取消と一括取消の両方に同じ方針を適用する。

use std::sync::Arc;

use itertools::Itertools;
use rifa_domain::{
    clock::Clock,
    raffle::{NumberSpace, RaffleError, Ticket, TicketNumber, TicketStatus},
};
use rifa_infra::{
    db::{TransactionManager, TxContext},
    repository::TicketRepository,
};

use crate::error::CoreError;

/// 取消時の保存方針
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CancellationPolicy {
    /// 行を残して状態を `cancelled` にする
    #[default]
    Soft,
    /// 有効な行を物理削除する
    Hard,
}

/// 単体取消の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelOneOutcome {
    pub number:            TicketNumber,
    /// すでに取消済みで何も変更しなかった
    pub already_cancelled: bool,
}

/// 取消ユースケース
pub struct CancellationUseCaseImpl {
    ticket_repository: Arc<dyn TicketRepository>,
    tx_manager:        Arc<dyn TransactionManager>,
    clock:             Arc<dyn Clock>,
    space:             NumberSpace,
    policy:            CancellationPolicy,
}

impl CancellationUseCaseImpl {
    pub fn new(
        ticket_repository: Arc<dyn TicketRepository>,
        tx_manager: Arc<dyn TransactionManager>,
        clock: Arc<dyn Clock>,
        space: NumberSpace,
        policy: CancellationPolicy,
    ) -> Self {
        Self {
            ticket_repository,
            tx_manager,
            clock,
            space,
            policy,
        }
    }

    /// 番号を 1 件取消する
    ///
    /// すでに取消済みなら何も変更せず `already_cancelled: true` を返す。
    ///
    /// # Errors
    ///
    /// - `InvalidNumber`: 番号が `[1, max_number]` の範囲外
    /// - `NotFound`: 番号の行が存在しない
    pub async fn cancel_one(&self, number: i64) -> Result<CancelOneOutcome, CoreError> {
        let number = self.space.parse_number(number)?;

        let mut tx = self.tx_manager.begin().await?;
        let rows = self
            .ticket_repository
            .lock_by_numbers(&mut tx, &[number])
            .await?;

        if rows.is_empty() {
            return Err(RaffleError::NotFound(number.as_i32()).into());
        }
        if !rows.iter().any(Ticket::is_active) {
            return Ok(CancelOneOutcome {
                number,
                already_cancelled: true,
            });
        }

        self.release(&mut tx, &[number]).await?;
        tx.commit().await?;

        tracing::info!(%number, policy = ?self.policy, "番号を取消しました");

        Ok(CancelOneOutcome {
            number,
            already_cancelled: false,
        })
    }

    /// 番号を一括で取消し、実際に取消した番号を昇順で返す
    ///
    /// 範囲外の番号は黙って除外し、重複はまとめる。
    /// 取消済み・未割り当ての番号は戻り値に含まれない。
    ///
    /// # Errors
    ///
    /// - `NoValidNumbers`: 除外後に番号が 1 件も残らない
    pub async fn cancel_many(&self, numbers: &[i64]) -> Result<Vec<TicketNumber>, CoreError> {
        let numbers: Vec<TicketNumber> = numbers
            .iter()
            .filter_map(|&value| self.space.parse_number(value).ok())
            .sorted_unstable()
            .dedup()
            .collect();

        if numbers.is_empty() {
            return Err(RaffleError::NoValidNumbers.into());
        }

        let mut tx = self.tx_manager.begin().await?;
        // 番号順に行ロックを取り、一括取消同士のデッドロックを避ける
        self.ticket_repository
            .lock_by_numbers(&mut tx, &numbers)
            .await?;
        let released = self.release(&mut tx, &numbers).await?;
        tx.commit().await?;

        tracing::info!(
            requested = numbers.len(),
            released = released.len(),
            policy = ?self.policy,
            "番号を一括取消しました"
        );

        Ok(released)
    }

    async fn release(
        &self,
        tx: &mut TxContext,
        numbers: &[TicketNumber],
    ) -> Result<Vec<TicketNumber>, CoreError> {
        let released = match self.policy {
            CancellationPolicy::Soft => {
                self.ticket_repository
                    .set_status(tx, numbers, TicketStatus::Cancelled, self.clock.now())
                    .await?
            }
            CancellationPolicy::Hard => self.ticket_repository.delete_active(tx, numbers).await?,
        };
        Ok(released)
    }
}
