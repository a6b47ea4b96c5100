//! 外部ユーザー管理サービスを参照するディレクトリ実装

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use rifa_domain::raffle::OwnerId;

use super::{BuyerDirectory, BuyerProfile};
use crate::error::InfraError;

/// HTTP 実装の BuyerDirectory
///
/// `GET {base_url}/buyers/{owner_id}` を呼び出す。
/// 200 なら `{ "display_name", "phone" }`、404 なら未登録として扱う。
/// それ以外のステータスや通信失敗はディレクトリ到達不能のエラーになる。
#[derive(Debug, Clone)]
pub struct HttpBuyerDirectory {
    base_url: String,
    client:   reqwest::Client,
}

impl HttpBuyerDirectory {
    /// # 引数
    ///
    /// - `base_url`: ディレクトリのベース URL（例: `http://localhost:14000`）
    /// - `timeout`: 1 リクエストあたりのタイムアウト
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, InfraError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn buyer_url(&self, owner_id: &OwnerId) -> String {
        format!(
            "{}/buyers/{}",
            self.base_url,
            urlencoding::encode(owner_id.as_str())
        )
    }
}

#[async_trait]
impl BuyerDirectory for HttpBuyerDirectory {
    #[tracing::instrument(skip_all, level = "debug", fields(%owner_id))]
    async fn lookup_buyer(&self, owner_id: &OwnerId) -> Result<Option<BuyerProfile>, InfraError> {
        let response = self.client.get(self.buyer_url(owner_id)).send().await?;

        match response.status() {
            StatusCode::OK => Ok(Some(response.json::<BuyerProfile>().await?)),
            StatusCode::NOT_FOUND => Ok(None),
            status => {
                tracing::warn!(%status, "購入者ディレクトリが想定外のステータスを返しました");
                Err(InfraError::directory(format!(
                    "想定外のステータス: {status}"
                )))
            }
        }
    }
}
