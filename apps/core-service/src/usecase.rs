//! # ユースケース層
//!
//! Core Service のビジネスロジックを実装する。
//!
//! ## 設計方針
//!
//! - **依存性注入**: リポジトリ・時刻・乱数を `Arc<dyn Trait>` で外部から注入
//! - **薄いハンドラ**: ハンドラは薄く保ち、ロジックはユースケースに集約
//! - **トランザクション**: 書き込みは `TransactionManager` で開始した
//!   `TxContext` の中で行い、エラー時はドロップでロールバックする
//!
//! ## モジュール構成
//!
//! - `reservation`: 番号の予約
//! - `cancellation`: 番号の取消（単体・一括）
//! - `ticket_query`: チケットの照会

pub mod cancellation;
pub mod reservation;
pub mod ticket_query;

pub use cancellation::{CancelOneOutcome, CancellationPolicy, CancellationUseCaseImpl};
pub use reservation::{ReservationUseCaseImpl, ReserveInput};
pub use ticket_query::TicketQueryUseCaseImpl;
