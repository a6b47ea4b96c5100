//! # チケットハンドラ
//!
//! 番号の予約・取消・照会 API を提供する。
//!
//! ## エンドポイント
//!
//! - `POST /tickets/reservations` - 番号の予約
//! - `POST /tickets/{number}/cancel` - 番号の取消
//! - `POST /tickets/cancellations` - 番号の一括取消
//! - `GET /tickets` - チケット一覧
//! - `GET /tickets/{number}` - チケット取得

use std::sync::Arc;

use axum::{
    Json,
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use rifa_domain::raffle::{RaffleError, Ticket};
use rifa_shared::ApiResponse;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::CoreError,
    usecase::{
        CancellationUseCaseImpl,
        ReservationUseCaseImpl,
        ReserveInput,
        TicketQueryUseCaseImpl,
    },
};

/// チケット API の共有状態
pub struct TicketState {
    pub reservation:  ReservationUseCaseImpl,
    pub cancellation: CancellationUseCaseImpl,
    pub query:        TicketQueryUseCaseImpl,
}

/// チケット API のルーター
pub fn ticket_routes(state: Arc<TicketState>) -> Router {
    Router::new()
        .route("/tickets", get(list_tickets))
        .route("/tickets/reservations", post(reserve_tickets))
        .route("/tickets/cancellations", post(cancel_tickets))
        .route("/tickets/{number}", get(get_ticket))
        .route("/tickets/{number}/cancel", post(cancel_ticket))
        .with_state(state)
}

// --- リクエスト/レスポンス型 ---

/// 予約リクエスト
///
/// `quantity` は整数以外も受け取り、ユースケースの検証エラーとして返す。
#[derive(Debug, Deserialize)]
pub struct ReserveRequest {
    #[serde(default)]
    pub quantity:           serde_json::Value,
    pub owner_id:           Option<String>,
    pub payment_reference:  Option<String>,
    pub buyer_display_name: Option<String>,
    pub buyer_phone_suffix: Option<String>,
    pub max_number:         Option<i64>,
}

/// 一括取消リクエスト
///
/// 整数以外の要素は黙って除外する。
#[derive(Debug, Deserialize)]
pub struct CancelManyRequest {
    #[serde(default)]
    pub numeros: Vec<serde_json::Value>,
}

/// 照会クエリパラメータ
#[derive(Debug, Deserialize)]
pub struct TicketQuery {
    #[serde(default)]
    pub include_cancelled: bool,
}

/// 予約結果 DTO
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ReservationDto {
    /// 割り当てた番号（抽選順）
    pub reserved: Vec<i32>,
}

/// 単体取消結果 DTO
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct CancelOneDto {
    pub success:           bool,
    pub numero:            i32,
    #[serde(
        rename = "alreadyCancelled",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub already_cancelled: Option<bool>,
}

/// 一括取消結果 DTO
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct CancelManyDto {
    pub success: bool,
    /// 実際に取消した番号（昇順）
    pub deleted: Vec<i32>,
}

/// チケット DTO
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct TicketDto {
    pub id:                 Uuid,
    pub number:             i32,
    pub owner_id:           String,
    pub buyer_display_name: String,
    pub buyer_phone_suffix: String,
    pub payment_reference:  String,
    pub status:             String,
    pub allocated_at:       String,
    pub cancelled_at:       Option<String>,
}

impl From<&Ticket> for TicketDto {
    fn from(ticket: &Ticket) -> Self {
        Self {
            id:                 *ticket.id().as_uuid(),
            number:             ticket.number().as_i32(),
            owner_id:           ticket.buyer().owner_id().as_str().to_string(),
            buyer_display_name: ticket.buyer().name().as_str().to_string(),
            buyer_phone_suffix: ticket.buyer().phone_suffix().as_str().to_string(),
            payment_reference:  ticket.payment_reference().as_str().to_string(),
            status:             ticket.status().to_string(),
            allocated_at:       ticket.allocated_at().to_rfc3339(),
            cancelled_at:       ticket.cancelled_at().map(|t| t.to_rfc3339()),
        }
    }
}

// --- ハンドラ ---

/// POST /tickets/reservations
///
/// 番号を予約する。
///
/// ## レスポンス
///
/// - `201 Created`: 割り当てた番号
/// - `400 Bad Request`: 入力検証エラー
/// - `404 Not Found`: 購入者がディレクトリに存在しない
/// - `409 Conflict`: 空き番号不足（`available` 付き）、または再試行可能な競合
/// - `503 Service Unavailable`: データストアまたはディレクトリに到達できない
#[tracing::instrument(skip_all)]
pub async fn reserve_tickets(
    State(state): State<Arc<TicketState>>,
    Json(req): Json<ReserveRequest>,
) -> Result<impl IntoResponse, CoreError> {
    let quantity = req
        .quantity
        .as_i64()
        .ok_or_else(|| RaffleError::InvalidQuantity(req.quantity.to_string()))?;

    let input = ReserveInput {
        quantity,
        owner_id: req.owner_id,
        payment_reference: req.payment_reference,
        buyer_display_name: req.buyer_display_name,
        buyer_phone_suffix: req.buyer_phone_suffix,
        max_number: req.max_number,
    };

    let reserved = state.reservation.reserve(input).await?;

    let dto = ReservationDto {
        reserved: reserved.iter().map(|n| n.as_i32()).collect(),
    };
    Ok((StatusCode::CREATED, Json(ApiResponse::new(dto))))
}

/// POST /tickets/{number}/cancel
///
/// 番号を 1 件取消する。取消済みなら `alreadyCancelled: true` の成功を返す。
///
/// ## レスポンス
///
/// - `200 OK`: 取消結果
/// - `400 Bad Request`: 番号が範囲外
/// - `404 Not Found`: 番号の割り当てがない
#[tracing::instrument(skip_all, fields(%number))]
pub async fn cancel_ticket(
    State(state): State<Arc<TicketState>>,
    Path(number): Path<i64>,
) -> Result<impl IntoResponse, CoreError> {
    let outcome = state.cancellation.cancel_one(number).await?;

    let dto = CancelOneDto {
        success:           true,
        numero:            outcome.number.as_i32(),
        already_cancelled: outcome.already_cancelled.then_some(true),
    };
    Ok((StatusCode::OK, Json(ApiResponse::new(dto))))
}

/// POST /tickets/cancellations
///
/// 番号を一括で取消す。範囲外・整数以外の要素は除外する。
///
/// ## レスポンス
///
/// - `200 OK`: 実際に取消した番号
/// - `400 Bad Request`: 有効な番号が 1 件もない
#[tracing::instrument(skip_all)]
pub async fn cancel_tickets(
    State(state): State<Arc<TicketState>>,
    Json(req): Json<CancelManyRequest>,
) -> Result<impl IntoResponse, CoreError> {
    let numbers: Vec<i64> = req
        .numeros
        .iter()
        .filter_map(serde_json::Value::as_i64)
        .collect();

    let deleted = state.cancellation.cancel_many(&numbers).await?;

    let dto = CancelManyDto {
        success: true,
        deleted: deleted.iter().map(|n| n.as_i32()).collect(),
    };
    Ok((StatusCode::OK, Json(ApiResponse::new(dto))))
}

/// GET /tickets
///
/// チケット一覧を番号の昇順で取得する。
#[tracing::instrument(skip_all, fields(include_cancelled = query.include_cancelled))]
pub async fn list_tickets(
    State(state): State<Arc<TicketState>>,
    Query(query): Query<TicketQuery>,
) -> Result<impl IntoResponse, CoreError> {
    let tickets = state.query.list_tickets(query.include_cancelled).await?;

    let items: Vec<TicketDto> = tickets.iter().map(TicketDto::from).collect();
    Ok((StatusCode::OK, Json(ApiResponse::new(items))))
}

/// GET /tickets/{number}
///
/// 番号でチケットを取得する。
///
/// ## レスポンス
///
/// - `200 OK`: チケット
/// - `400 Bad Request`: 番号が範囲外
/// - `404 Not Found`: 有効なチケットがない
#[tracing::instrument(skip_all, fields(%number))]
pub async fn get_ticket(
    State(state): State<Arc<TicketState>>,
    Path(number): Path<i64>,
    Query(query): Query<TicketQuery>,
) -> Result<impl IntoResponse, CoreError> {
    let ticket = state
        .query
        .get_ticket(number, query.include_cancelled)
        .await?;

    Ok((StatusCode::OK, Json(ApiResponse::new(TicketDto::from(&ticket)))))
}
