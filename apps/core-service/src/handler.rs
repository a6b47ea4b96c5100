//! # HTTP リクエストハンドラ
//!
//! axum のルートに対応するハンドラ関数を定義する。
//!
//! ## 設計方針
//!
//! - 各ハンドラはサブモジュールに配置
//! - 親モジュール（この `handler.rs`）で re-export し、フラットな API を提供
//! - ハンドラは薄く保ち、番号の割り当て規則はユースケースとドメイン層に委譲

pub mod health;
pub mod ticket;

pub use health::{ReadinessState, health_check, readiness_check};
pub use ticket::{
    TicketState,
    cancel_ticket,
    cancel_tickets,
    get_ticket,
    list_tickets,
    reserve_tickets,
    ticket_routes,
};
