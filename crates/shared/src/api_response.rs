//! # API レスポンスエンベロープ
//!
//! 成功レスポンスの統一形式 `{ "data": T }` を提供する。

use serde::{Deserialize, Serialize};

/// 成功レスポンスの統一型
///
/// 予約・取消・照会の各エンドポイントは `{ "data": T }` 形式で返す。
///
/// ## 使用例
///
/// ```
/// use rifa_shared::ApiResponse;
///
/// let response = ApiResponse::new(vec![3, 7]);
/// assert_eq!(response.data, vec![3, 7]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializeでdataキーに包まれる() {
        let response = ApiResponse::new(serde_json::json!({ "reserved": [4, 9] }));
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json, serde_json::json!({ "data": { "reserved": [4, 9] } }));
    }

    #[test]
    fn test_deserializeでjsonからオブジェクトに変換する() {
        let json = r#"{"data": [1, 2]}"#;
        let response: ApiResponse<Vec<i32>> = serde_json::from_str(json).unwrap();

        assert_eq!(response.data, vec![1, 2]);
    }
}
