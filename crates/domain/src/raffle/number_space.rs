//! 抽選番号と番号空間

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::RaffleError;
use crate::DomainError;

/// 設定可能な番号上限の最大値
pub const MAX_NUMBER_SPACE: i32 = 1_000_000;

/// 抽選番号（1 以上）
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(try_from = "i32", into = "i32")]
#[display("{_0}")]
pub struct TicketNumber(i32);

impl TicketNumber {
    pub fn new(value: i32) -> Result<Self, DomainError> {
        if value < 1 {
            return Err(DomainError::Validation(format!(
                "抽選番号は 1 以上である必要があります: {value}"
            )));
        }
        Ok(Self(value))
    }

    pub fn as_i32(&self) -> i32 {
        self.0
    }
}

impl TryFrom<i32> for TicketNumber {
    type Error = DomainError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TicketNumber> for i32 {
    fn from(number: TicketNumber) -> Self {
        number.0
    }
}

/// 番号空間 `[1, max_number]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberSpace {
    max_number: i32,
}

impl NumberSpace {
    /// 設定値から番号空間を作る
    pub fn new(max_number: i64) -> Result<Self, DomainError> {
        match i32::try_from(max_number) {
            Ok(max_number) if (1..=MAX_NUMBER_SPACE).contains(&max_number) => {
                Ok(Self { max_number })
            }
            _ => Err(DomainError::Validation(format!(
                "番号上限は 1 以上 {MAX_NUMBER_SPACE} 以下である必要があります: {max_number}"
            ))),
        }
    }

    pub fn max_number(&self) -> i32 {
        self.max_number
    }

    /// 番号空間に含まれる番号の数
    pub fn capacity(&self) -> usize {
        // max_number は 1 以上が保証されている
        self.max_number.unsigned_abs() as usize
    }

    /// リクエスト単位の上限指定を反映した番号空間を返す
    ///
    /// 指定は設定上限以下に限られる。`None` なら自身をそのまま返す。
    pub fn narrowed(&self, requested: Option<i64>) -> Result<Self, RaffleError> {
        let Some(value) = requested else {
            return Ok(*self);
        };

        if value < 1 || value > i64::from(self.max_number) {
            return Err(RaffleError::InvalidMaxNumber {
                value,
                ceiling: self.max_number,
            });
        }

        // 上の範囲チェックにより i32 に収まる
        let max_number = i32::try_from(value).map_err(|_| RaffleError::InvalidMaxNumber {
            value,
            ceiling: self.max_number,
        })?;
        Ok(Self { max_number })
    }

    pub fn contains(&self, value: i64) -> bool {
        (1..=i64::from(self.max_number)).contains(&value)
    }

    /// 外部入力の整数を番号空間内の番号として解釈する
    pub fn parse_number(&self, value: i64) -> Result<TicketNumber, RaffleError> {
        if !self.contains(value) {
            return Err(RaffleError::InvalidNumber {
                number: value,
                max_number: self.max_number,
            });
        }
        // contains により 1..=max_number が保証されている
        i32::try_from(value)
            .ok()
            .and_then(|v| TicketNumber::new(v).ok())
            .ok_or(RaffleError::InvalidNumber {
                number: value,
                max_number: self.max_number,
            })
    }

    /// 使用中の番号を除いた空き番号を昇順で返す
    ///
    /// 番号空間外の使用中番号（上限を絞った場合など）は単に無視される。
    pub fn available(&self, taken: &BTreeSet<TicketNumber>) -> Vec<TicketNumber> {
        (1..=self.max_number)
            .map(TicketNumber)
            .filter(|n| !taken.contains(n))
            .collect()
    }
}
