//! # Core Service エラー定義
//!
//! Core Service 固有のエラーと、HTTP レスポンスへの変換を定義する。
//!
//! ## ステータスコードの対応
//!
//! | エラー | ステータス |
//! |--------|-----------|
//! | 入力の検証エラー | 400 |
//! | `NotFound` / `OwnerNotFound` | 404 |
//! | `InsufficientAvailability` / `Conflict` | 409 |
//! | データストア・購入者ディレクトリに到達できない | 503 |
//! | その他のインフラエラー | 500 |

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rifa_domain::{DomainError, raffle::RaffleError};
use rifa_infra::InfraError;
use rifa_shared::ErrorResponse;
use thiserror::Error;

/// Core Service で発生するエラー
#[derive(Debug, Error)]
pub enum CoreError {
    /// 抽選のビジネスルール違反
    #[error(transparent)]
    Raffle(#[from] RaffleError),

    /// データストアまたは購入者ディレクトリに到達できない
    #[error("依存先に到達できません: {0}")]
    StorageUnavailable(InfraError),

    /// その他のインフラエラー
    #[error("インフラエラー: {0}")]
    Infra(InfraError),
}

impl From<InfraError> for CoreError {
    fn from(err: InfraError) -> Self {
        if err.is_unavailable() {
            Self::StorageUnavailable(err)
        } else {
            Self::Infra(err)
        }
    }
}

impl From<DomainError> for CoreError {
    fn from(err: DomainError) -> Self {
        Self::Raffle(err.into())
    }
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let body = match &self {
            CoreError::Raffle(err) => raffle_error_response(err),
            CoreError::StorageUnavailable(e) => {
                tracing::warn!(
                    error = %e,
                    span_trace = %e.span_trace(),
                    "依存先に到達できません"
                );
                ErrorResponse::service_unavailable(
                    "データストアまたは購入者ディレクトリに到達できません",
                )
                .with_extension("retryable", true)
            }
            CoreError::Infra(e) => {
                tracing::error!(
                    error = %e,
                    span_trace = %e.span_trace(),
                    "インフラエラー"
                );
                ErrorResponse::internal_error()
            }
        };

        let status =
            StatusCode::from_u16(body.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(body)).into_response()
    }
}

fn raffle_error_response(err: &RaffleError) -> ErrorResponse {
    let detail = err.to_string();
    match err {
        RaffleError::InvalidQuantity(_) => {
            ErrorResponse::new("invalid-quantity", "Invalid Quantity", 400, detail)
        }
        RaffleError::MissingPaymentReference => ErrorResponse::new(
            "missing-payment-reference",
            "Missing Payment Reference",
            400,
            detail,
        ),
        RaffleError::MissingOwner => {
            ErrorResponse::new("missing-owner", "Missing Owner", 400, detail)
        }
        RaffleError::InvalidMaxNumber { .. } => {
            ErrorResponse::new("invalid-max-number", "Invalid Max Number", 400, detail)
        }
        RaffleError::QuantityExceedsSpace { .. } => ErrorResponse::new(
            "quantity-exceeds-space",
            "Quantity Exceeds Space",
            400,
            detail,
        ),
        RaffleError::InvalidNumber { .. } => {
            ErrorResponse::new("invalid-number", "Invalid Number", 400, detail)
        }
        RaffleError::NoValidNumbers => {
            ErrorResponse::new("no-valid-numbers", "No Valid Numbers", 400, detail)
        }
        RaffleError::Validation(_) => ErrorResponse::validation_error(detail),
        RaffleError::OwnerNotFound(_) => {
            ErrorResponse::new("owner-not-found", "Owner Not Found", 404, detail)
        }
        RaffleError::NotFound(_) => ErrorResponse::not_found(detail),
        RaffleError::InsufficientAvailability { available } => ErrorResponse::new(
            "insufficient-availability",
            "Insufficient Availability",
            409,
            detail,
        )
        .with_extension("available", *available),
        RaffleError::Conflict => ErrorResponse::conflict(detail).with_extension("retryable", true),
    }
}
