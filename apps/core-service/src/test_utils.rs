//! テスト用ユーティリティ
//!
//! ユースケース・ハンドラのテストで共通利用するフィクスチャとビルダー。
//! インメモリのチケットストアは `TransactionManager` と `TicketRepository`
//! の両方を兼ねるため、同じストアを両方の引数に渡す。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rifa_domain::{
    clock::FixedClock,
    raffle::{
        BuyerAttribution,
        BuyerName,
        NewTicket,
        NumberSpace,
        OwnerId,
        PaymentReference,
        PhoneSuffix,
        Ticket,
        TicketId,
        TicketNumber,
    },
    random::SeededRandomSource,
};
use rifa_infra::mock::{InMemoryTicketStore, StubBuyerDirectory};

use crate::usecase::{
    CancellationPolicy,
    CancellationUseCaseImpl,
    ReservationUseCaseImpl,
    TicketQueryUseCaseImpl,
};

/// テスト用の固定時刻
pub fn test_now() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

pub fn number(value: i32) -> TicketNumber {
    TicketNumber::new(value).unwrap()
}

pub fn numbers(values: impl IntoIterator<Item = i32>) -> Vec<TicketNumber> {
    values.into_iter().map(number).collect()
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

fn space(max_number: i64) -> NumberSpace {
    NumberSpace::new(max_number).unwrap()
}

/// インメモリストアを使う予約ユースケース（固定時刻・シード付き乱数）
pub fn reservation_usecase(
    store: &InMemoryTicketStore,
    directory: StubBuyerDirectory,
    max_number: i64,
) -> ReservationUseCaseImpl {
    ReservationUseCaseImpl::new(
        Arc::new(store.clone()),
        Arc::new(directory),
        Arc::new(store.clone()),
        Arc::new(FixedClock::new(test_now())),
        Arc::new(SeededRandomSource::new(42)),
        space(max_number),
    )
}

/// インメモリストアを使う取消ユースケース
pub fn cancellation_usecase(
    store: &InMemoryTicketStore,
    max_number: i64,
    policy: CancellationPolicy,
) -> CancellationUseCaseImpl {
    CancellationUseCaseImpl::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(FixedClock::new(test_now())),
        space(max_number),
        policy,
    )
}

/// インメモリストアを使う照会ユースケース
pub fn ticket_query_usecase(store: &InMemoryTicketStore, max_number: i64) -> TicketQueryUseCaseImpl {
    TicketQueryUseCaseImpl::new(Arc::new(store.clone()), space(max_number))
}
