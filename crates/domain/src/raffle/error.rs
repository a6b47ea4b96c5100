//! 抽選固有のエラー分類

use thiserror::Error;

use crate::DomainError;

/// 予約・取消・照会で発生するビジネスエラー
///
/// ストレージ到達不能（`StorageUnavailable`）はインフラ起因のため含めない。
/// API 層で `InfraError` と合わせて HTTP ステータスに変換する。
///
/// | バリアント | HTTP | 備考 |
/// |-----------|------|------|
/// | 入力検証系 | 400 | トランザクション開始前に検出 |
/// | `OwnerNotFound` / `NotFound` | 404 | |
/// | `InsufficientAvailability` | 409 | 実際の残数を返す |
/// | `Conflict` | 409 | 同じリクエストで再試行してよい |
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RaffleError {
    /// 予約枚数が 1 未満
    #[error("購入枚数は 1 以上の整数である必要があります: {0}")]
    InvalidQuantity(String),

    /// 決済参照が未指定
    #[error("決済参照（payment_reference）が指定されていません")]
    MissingPaymentReference,

    /// 購入者 ID が未指定
    #[error("購入者 ID（owner_id）が指定されていません")]
    MissingOwner,

    /// 番号上限の上書き値が不正（1 未満、または設定上限を超える）
    #[error("番号上限は 1 以上 {ceiling} 以下である必要があります: {value}")]
    InvalidMaxNumber { value: i64, ceiling: i32 },

    /// 予約枚数が番号空間を超える
    #[error("購入枚数 {quantity} が番号上限 {max_number} を超えています")]
    QuantityExceedsSpace { quantity: i64, max_number: i32 },

    /// 購入者ディレクトリに該当する購入者がいない
    #[error("購入者が見つかりません: {0}")]
    OwnerNotFound(String),

    /// 空き番号が不足している
    #[error("空き番号が不足しています（残り {available} 件）")]
    InsufficientAvailability { available: usize },

    /// 同時実行による一意制約違反
    #[error("番号の確保中に競合が発生しました。再試行してください")]
    Conflict,

    /// 番号が番号空間の範囲外
    #[error("番号 {number} は範囲外です（1〜{max_number}）")]
    InvalidNumber { number: i64, max_number: i32 },

    /// 指定番号のチケットが存在しない
    #[error("番号 {0} のチケットが見つかりません")]
    NotFound(i32),

    /// 一括取消の入力に有効な番号が 1 件もない
    #[error("有効な番号が含まれていません")]
    NoValidNumbers,

    /// 購入者名などの値が不正
    #[error("バリデーションエラー: {0}")]
    Validation(String),
}

impl RaffleError {
    /// 呼び出し側が同じ内容で再送してよいエラーか
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict)
    }
}

impl From<DomainError> for RaffleError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => Self::Validation(msg),
        }
    }
}
