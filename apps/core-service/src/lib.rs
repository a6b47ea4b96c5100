//! # Core Service ライブラリ
//!
//! 抽選番号の予約・取消・照会を行うユースケースとハンドラを公開する。
//! バイナリ（`main.rs`）と結合テストの両方から利用する。

pub mod config;
pub mod error;
pub mod handler;
pub mod usecase;

// テストユーティリティ（内部実装、ドキュメントからは隠す）
#[cfg(any(test, feature = "test-utils"))]
#[doc(hidden)]
pub mod test_utils;
