//! # 抽選（ラッフル）ドメイン
//!
//! 決済済みの取引に対して、一意な番号付きチケットを割り当てるためのモデル。
//!
//! ## 構成
//!
//! | 型 | 役割 |
//! |---|------|
//! | [`TicketNumber`] | 1 以上の抽選番号 |
//! | [`NumberSpace`] | 番号空間 `[1, max_number]` |
//! | [`Quantity`] / [`ReservationPlan`] | 予約枚数と抽選割り当て |
//! | [`Ticket`] | 割り当て済みの番号（購入者情報・状態付き） |
//! | [`BuyerAttribution`] | 割り当て時点で確定する購入者情報 |
//! | [`RaffleError`] | 抽選固有のエラー分類 |
//!
//! ## 不変条件
//!
//! - 同じ番号が `active` 状態で 2 人の購入者に割り当てられることはない
//! - `active` なチケット数は番号空間の大きさを超えない
//! - 割り当て後に変化するのは `status`（と `cancelled_at`）のみ

mod allocation;
mod buyer;
mod error;
mod number_space;
mod ticket;

pub use allocation::{Quantity, ReservationPlan};
pub use buyer::{BuyerAttribution, BuyerName, OwnerId, PHONE_SUFFIX_LENGTH, PhoneSuffix};
pub use error::RaffleError;
pub use number_space::{MAX_NUMBER_SPACE, NumberSpace, TicketNumber};
pub use ticket::{NewTicket, PaymentReference, Ticket, TicketId, TicketRecord, TicketStatus};
