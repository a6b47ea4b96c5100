//! # Rifa インフラ層
//!
//! 外部システムとの接続・通信を担当する。
//!
//! ## 責務
//!
//! - **データベース接続**: PostgreSQL の接続プール、マイグレーション、トランザクション
//! - **リポジトリ実装**: チケットの永続化と番号プールのロック
//! - **購入者ディレクトリ**: PostgreSQL / HTTP の 2 実装
//!
//! ## 依存関係
//!
//! ```text
//! core-service → infra → domain
//! ```
//!
//! ドメイン層はインフラ層に依存しない。
//!
//! ## 使用例
//!
//! ```rust,ignore
//! use rifa_infra::{db, repository::PostgresTicketRepository};
//!
//! async fn setup() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = db::create_pool("postgres://localhost/rifa").await?;
//!     db::run_migrations(&pool).await?;
//!     let tickets = PostgresTicketRepository::new(pool.clone());
//!     Ok(())
//! }
//! ```

pub mod db;
pub mod directory;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod repository;

pub use error::{InfraError, InfraErrorKind};
