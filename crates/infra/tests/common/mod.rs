//! テスト共通フィクスチャ
//!
//! DB を使用する統合テストで共通利用するエンティティ生成ヘルパー。

// 各テストファイルが独立したクレートとしてコンパイルされるため、
// 使用しない関数に dead_code 警告が出る。モジュール全体で抑制する。
#![allow(dead_code)]

use chrono::{DateTime, Utc};
use rifa_domain::raffle::{
    BuyerAttribution,
    BuyerName,
    NewTicket,
    OwnerId,
    PaymentReference,
    PhoneSuffix,
    Ticket,
    TicketId,
    TicketNumber,
};

/// テスト用の固定時刻
pub fn test_now() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

pub fn number(value: i32) -> TicketNumber {
    TicketNumber::new(value).unwrap()
}

/// 指定番号・購入者の有効なチケットを作る
pub fn active_ticket(value: i32, owner: &str, payment_reference: &str) -> Ticket {
    Ticket::new(NewTicket {
        id:                TicketId::new(),
        number:            number(value),
        buyer:             BuyerAttribution::new(
            OwnerId::new(owner).unwrap(),
            BuyerName::new(format!("Buyer {owner}")).unwrap(),
            PhoneSuffix::from_phone("+55 11 98765-4321"),
        ),
        payment_reference: PaymentReference::new(payment_reference).unwrap(),
        now:               test_now(),
    })
}
