//! # 購入者ディレクトリ
//!
//! 購入者 ID から表示名と電話番号を引く読み取り専用のアダプタ。
//! チケットのストレージとは別のストアで、トランザクションは共有しない。
//!
//! | 実装 | 参照先 |
//! |------|--------|
//! | [`PostgresBuyerDirectory`] | 同じデータベースの `buyers` テーブル |
//! | [`HttpBuyerDirectory`] | 外部ユーザー管理サービスの `GET {base}/buyers/{owner_id}` |

mod http;
mod postgres;

use async_trait::async_trait;
pub use http::HttpBuyerDirectory;
pub use postgres::PostgresBuyerDirectory;
use rifa_domain::raffle::OwnerId;
use serde::Deserialize;

use crate::error::InfraError;

/// ディレクトリから得た購入者情報
///
/// 電話番号は加工前の値。末尾桁への切り詰めは呼び出し側で行う。
/// 電話番号が未登録（欠落・`null`）なら空文字列になる。
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct BuyerProfile {
    pub display_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub phone:        String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl std::fmt::Debug for BuyerProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuyerProfile")
            .field("display_name", &"[REDACTED]")
            .field("phone", &"[REDACTED]")
            .finish()
    }
}

/// 購入者ディレクトリトレイト
#[async_trait]
pub trait BuyerDirectory: Send + Sync {
    /// 購入者を検索する
    ///
    /// - `Ok(Some(profile))`: 見つかった場合
    /// - `Ok(None)`: 該当する購入者がいない場合
    /// - `Err(_)`: ディレクトリに到達できない場合
    async fn lookup_buyer(&self, owner_id: &OwnerId) -> Result<Option<BuyerProfile>, InfraError>;
}
