//! # リポジトリ実装
//!
//! sqlx を使い、PostgreSQL 固有の処理をカプセル化する。
//! ユースケース層はトレイト経由で利用し、テストではインメモリ実装に差し替える。

pub mod ticket_repository;

pub use ticket_repository::{ACTIVE_NUMBER_CONSTRAINT, PostgresTicketRepository, TicketRepository};
