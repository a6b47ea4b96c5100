//! 予約枚数と番号の抽選割り当て

use std::collections::BTreeSet;

use super::{NumberSpace, RaffleError, TicketNumber};
use crate::random::RandomSource;

/// 予約枚数（1 以上）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantity(usize);

impl Quantity {
    pub fn new(value: i64) -> Result<Self, RaffleError> {
        usize::try_from(value)
            .ok()
            .filter(|&v| v >= 1)
            .map(Self)
            .ok_or_else(|| RaffleError::InvalidQuantity(value.to_string()))
    }

    pub fn get(&self) -> usize {
        self.0
    }
}

/// 1 回の予約で引く番号の計画
///
/// 枚数が番号空間に収まることを構築時に保証する。
/// 実際の空き状況との突き合わせは [`ReservationPlan::draw`] で行う。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationPlan {
    quantity: Quantity,
    space:    NumberSpace,
}

impl ReservationPlan {
    pub fn new(quantity: Quantity, space: NumberSpace) -> Result<Self, RaffleError> {
        if quantity.get() > space.capacity() {
            return Err(RaffleError::QuantityExceedsSpace {
                quantity:   i64::try_from(quantity.get()).unwrap_or(i64::MAX),
                max_number: space.max_number(),
            });
        }
        Ok(Self { quantity, space })
    }

    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    pub fn space(&self) -> NumberSpace {
        self.space
    }

    /// 空き番号から重複なしで一様に番号を引く
    ///
    /// 引いた位置の要素を末尾と入れ替えて取り除くため、各回 O(1) で引ける。
    /// 戻り値は引いた順（昇順ではない）。
    ///
    /// # Errors
    ///
    /// 空き番号が枚数に満たない場合は `InsufficientAvailability`（実際の残数付き）。
    pub fn draw(
        &self,
        taken: &BTreeSet<TicketNumber>,
        random: &dyn RandomSource,
    ) -> Result<Vec<TicketNumber>, RaffleError> {
        let mut pool = self.space.available(taken);
        let wanted = self.quantity.get();

        if pool.len() < wanted {
            return Err(RaffleError::InsufficientAvailability {
                available: pool.len(),
            });
        }

        let mut drawn = Vec::with_capacity(wanted);
        for _ in 0..wanted {
            let index = random.next_index(pool.len());
            drawn.push(pool.swap_remove(index));
        }
        Ok(drawn)
    }
}
