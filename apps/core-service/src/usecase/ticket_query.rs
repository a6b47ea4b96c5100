//! チケット照会ユースケース

use std::sync::Arc;

use rifa_domain::raffle::{NumberSpace, RaffleError, Ticket};
use rifa_infra::repository::TicketRepository;

use crate::error::CoreError;

/// チケット照会ユースケース
///
/// 既定では取消済みの行を「空き」とみなし、結果に含めない。
pub struct TicketQueryUseCaseImpl {
    ticket_repository: Arc<dyn TicketRepository>,
    space:             NumberSpace,
}

impl TicketQueryUseCaseImpl {
    pub fn new(ticket_repository: Arc<dyn TicketRepository>, space: NumberSpace) -> Self {
        Self {
            ticket_repository,
            space,
        }
    }

    /// チケット一覧を番号の昇順で取得する
    pub async fn list_tickets(&self, include_cancelled: bool) -> Result<Vec<Ticket>, CoreError> {
        let tickets = self.ticket_repository.find_all(include_cancelled).await?;
        Ok(tickets)
    }

    /// 番号でチケットを取得する
    ///
    /// # Errors
    ///
    /// - `InvalidNumber`: 番号が `[1, max_number]` の範囲外
    /// - `NotFound`: 有効な行がない（`include_cancelled` のときは行が 1 件もない）
    pub async fn get_ticket(
        &self,
        number: i64,
        include_cancelled: bool,
    ) -> Result<Ticket, CoreError> {
        let number = self.space.parse_number(number)?;
        self.ticket_repository
            .find_by_number(number, include_cancelled)
            .await?
            .ok_or_else(|| RaffleError::NotFound(number.as_i32()).into())
    }
}
