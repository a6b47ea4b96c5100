//! チケットエンティティ

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use super::{BuyerAttribution, BuyerName, OwnerId, PhoneSuffix, TicketNumber};
use crate::DomainError;

define_uuid_id! {
    /// チケットの内部 ID
    ///
    /// 取消済みの行を残したまま同じ番号を再割り当てできるよう、
    /// 番号とは別にサロゲートキーを持つ。
    pub struct TicketId;
}

define_validated_string! {
    /// 決済参照（外部決済の取引 ID）
    pub struct PaymentReference {
        label: "決済参照",
        max_length: 255,
    }
}

/// チケットの状態
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TicketStatus {
    Active,
    Cancelled,
}

impl FromStr for TicketStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(DomainError::Validation(format!(
                "不正なチケット状態: {s}"
            ))),
        }
    }
}

/// 新規割り当て時の入力
pub struct NewTicket {
    pub id:                TicketId,
    pub number:            TicketNumber,
    pub buyer:             BuyerAttribution,
    pub payment_reference: PaymentReference,
    pub now:               DateTime<Utc>,
}

/// 永続化済みの値からの復元用
pub struct TicketRecord {
    pub id:                TicketId,
    pub number:            TicketNumber,
    pub owner_id:          OwnerId,
    pub buyer_name:        BuyerName,
    pub phone_suffix:      PhoneSuffix,
    pub payment_reference: PaymentReference,
    pub status:            TicketStatus,
    pub allocated_at:      DateTime<Utc>,
    pub cancelled_at:      Option<DateTime<Utc>>,
}

/// 割り当て済みチケット
///
/// 購入者情報と決済参照は割り当て後に変わらない。
/// 変化するのは `active` から `cancelled` への遷移のみ。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    id:                TicketId,
    number:            TicketNumber,
    buyer:             BuyerAttribution,
    payment_reference: PaymentReference,
    status:            TicketStatus,
    allocated_at:      DateTime<Utc>,
    cancelled_at:      Option<DateTime<Utc>>,
}

impl Ticket {
    pub fn new(params: NewTicket) -> Self {
        Self {
            id:                params.id,
            number:            params.number,
            buyer:             params.buyer,
            payment_reference: params.payment_reference,
            status:            TicketStatus::Active,
            allocated_at:      params.now,
            cancelled_at:      None,
        }
    }

    pub fn from_db(record: TicketRecord) -> Self {
        Self {
            id:                record.id,
            number:            record.number,
            buyer:             BuyerAttribution::new(
                record.owner_id,
                record.buyer_name,
                record.phone_suffix,
            ),
            payment_reference: record.payment_reference,
            status:            record.status,
            allocated_at:      record.allocated_at,
            cancelled_at:      record.cancelled_at,
        }
    }

    pub fn id(&self) -> &TicketId {
        &self.id
    }

    pub fn number(&self) -> TicketNumber {
        self.number
    }

    pub fn buyer(&self) -> &BuyerAttribution {
        &self.buyer
    }

    pub fn payment_reference(&self) -> &PaymentReference {
        &self.payment_reference
    }

    pub fn status(&self) -> TicketStatus {
        self.status
    }

    pub fn allocated_at(&self) -> DateTime<Utc> {
        self.allocated_at
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    pub fn is_active(&self) -> bool {
        self.status == TicketStatus::Active
    }

    /// 取消済みにした新しいインスタンスを返す
    ///
    /// # Errors
    ///
    /// すでに取消済みの場合
    pub fn cancelled(self, now: DateTime<Utc>) -> Result<Self, DomainError> {
        if !self.is_active() {
            return Err(DomainError::Validation(format!(
                "番号 {} はすでに取消済みです",
                self.number
            )));
        }
        Ok(Self {
            status: TicketStatus::Cancelled,
            cancelled_at: Some(now),
            ..self
        })
    }
}
