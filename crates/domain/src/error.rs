//! # ドメイン層エラー定義
//!
//! 値オブジェクトの生成時に発生する汎用的な検証エラー。
//!
//! 抽選固有のエラー分類（在庫不足、範囲外の番号など）は
//! [`RaffleError`](crate::raffle::RaffleError) に分けて定義し、
//! こちらは「値として不正」であることだけを表す。
//!
//! ## 使用例
//!
//! ```rust
//! use rifa_domain::DomainError;
//!
//! fn validate_name(name: &str) -> Result<(), DomainError> {
//!     if name.is_empty() {
//!         return Err(DomainError::Validation("名前は必須です".to_string()));
//!     }
//!     Ok(())
//! }
//!
//! assert!(validate_name("").is_err());
//! ```

use thiserror::Error;

/// ドメイン層で発生する汎用エラー
///
/// API 層では 400 Bad Request に変換される。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// バリデーションエラー
    ///
    /// - 必須フィールドが未入力
    /// - 文字数制限の超過
    /// - 範囲外の数値
    #[error("バリデーションエラー: {0}")]
    Validation(String),
}
