//! # Rifa ドメイン層
//!
//! 抽選番号（チケット）の予約・取消を扱うドメインモデルを定義する。
//!
//! ## 設計方針
//!
//! - **エンティティ**: 一意の識別子を持つオブジェクト（例: [`raffle::Ticket`]）
//! - **値オブジェクト**: 生成時に検証される不変オブジェクト（例:
//!   [`raffle::TicketNumber`], [`raffle::NumberSpace`]）
//! - **ドメインサービス**: エンティティに属さないロジック（番号の抽選割り当て）
//! - **ドメインエラー**: ビジネスルール違反を表現するエラー型
//!
//! ## 依存関係の方向
//!
//! ```text
//! core-service → infra → domain
//!        ↘                 ↑
//!          ────────────────
//! ```
//!
//! ドメイン層はインフラ層（DB、外部サービス）に一切依存しない。
//! 時刻と乱数は [`clock::Clock`] / [`random::RandomSource`] として外部から注入する。
//!
//! ## モジュール構成
//!
//! - [`error`] - 汎用バリデーションエラー
//! - [`clock`] - 時刻プロバイダ
//! - [`random`] - 乱数ソース
//! - [`raffle`] - チケット・番号空間・抽選割り当て
//!
//! ## 使用例
//!
//! ```rust
//! use rifa_domain::raffle::{NumberSpace, TicketNumber};
//!
//! let space = NumberSpace::new(10).unwrap();
//! let number = space.parse_number(7).unwrap();
//! assert_eq!(number, TicketNumber::new(7).unwrap());
//! ```

#[macro_use]
mod macros;

pub mod clock;
pub mod error;
pub mod raffle;
pub mod random;

pub use error::DomainError;
