//! # Core Service 設定
//!
//! 環境変数から Core Service サーバーの設定を読み込む。
//!
//! | 変数名 | 必須 | 説明 |
//! |--------|------|------|
//! | `CORE_HOST` | No | バインドアドレス（デフォルト: `0.0.0.0`） |
//! | `CORE_PORT` | **Yes** | ポート番号 |
//! | `DATABASE_URL` | **Yes** | PostgreSQL 接続 URL |
//! | `RAFFLE_MAX_NUMBER` | No | 番号の上限（デフォルト: `1000`） |
//! | `RAFFLE_CANCELLATION_POLICY` | No | `soft` / `hard`（デフォルト: `soft`） |
//! | `BUYER_DIRECTORY_BACKEND` | No | `postgres` / `http`（デフォルト: `postgres`） |
//! | `BUYER_DIRECTORY_URL` | backend=http のとき | 購入者ディレクトリのベース URL |
//! | `BUYER_DIRECTORY_TIMEOUT_MS` | No | ディレクトリ呼び出しのタイムアウト（デフォルト: `3000`） |
//! | `RUN_MIGRATIONS` | No | 起動時にマイグレーションを適用するか（デフォルト: `true`） |

use std::{env, time::Duration};

use rifa_domain::raffle::NumberSpace;
use thiserror::Error;

use crate::usecase::CancellationPolicy;

const DEFAULT_MAX_NUMBER: i64 = 1000;
const DEFAULT_DIRECTORY_TIMEOUT_MS: u64 = 3000;

/// 設定読み込みエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} が設定されていません")]
    Missing(&'static str),

    #[error("{name} の値が不正です: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Core Service サーバーの設定
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// バインドアドレス
    pub host:            String,
    /// ポート番号
    pub port:            u16,
    /// データベース接続 URL
    pub database_url:    String,
    /// 抽選の設定
    pub raffle:          RaffleConfig,
    /// 購入者ディレクトリの接続先
    pub buyer_directory: DirectoryBackend,
    /// 起動時にマイグレーションを適用するか
    pub run_migrations:  bool,
}

/// 抽選の設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaffleConfig {
    /// 番号空間（`1..=max_number`）
    pub space:               NumberSpace,
    /// 取消時の保存方針
    pub cancellation_policy: CancellationPolicy,
}

/// 購入者ディレクトリのバックエンド
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryBackend {
    /// 同じデータベースの `buyers` テーブル
    Postgres,
    /// 外部のユーザー管理サービス
    Http { base_url: String, timeout: Duration },
}

impl CoreConfig {
    /// 環境変数から設定を読み込む
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// 任意の参照関数から設定を読み込む
    ///
    /// テストでプロセスの環境変数を書き換えずに済むよう分離している。
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| lookup(name).ok_or(ConfigError::Missing(name));

        let port = required("CORE_PORT")?;
        let port = port.parse().map_err(|_| ConfigError::Invalid {
            name:  "CORE_PORT",
            value: port,
        })?;

        Ok(Self {
            host: lookup("CORE_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            database_url: required("DATABASE_URL")?,
            raffle: RaffleConfig::from_lookup(&lookup)?,
            buyer_directory: DirectoryBackend::from_lookup(&lookup)?,
            run_migrations: lookup("RUN_MIGRATIONS")
                .map(|v| parse_bool("RUN_MIGRATIONS", &v))
                .transpose()?
                .unwrap_or(true),
        })
    }
}

impl RaffleConfig {
    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let max_number = match lookup("RAFFLE_MAX_NUMBER") {
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .and_then(|v| NumberSpace::new(v).ok())
                .ok_or(ConfigError::Invalid {
                    name:  "RAFFLE_MAX_NUMBER",
                    value: raw,
                })?,
            None => NumberSpace::new(DEFAULT_MAX_NUMBER).map_err(|_| ConfigError::Invalid {
                name:  "RAFFLE_MAX_NUMBER",
                value: DEFAULT_MAX_NUMBER.to_string(),
            })?,
        };

        let cancellation_policy = match lookup("RAFFLE_CANCELLATION_POLICY").as_deref() {
            None | Some("soft") => CancellationPolicy::Soft,
            Some("hard") => CancellationPolicy::Hard,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name:  "RAFFLE_CANCELLATION_POLICY",
                    value: other.to_string(),
                });
            }
        };

        Ok(Self {
            space: max_number,
            cancellation_policy,
        })
    }
}

impl DirectoryBackend {
    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        match lookup("BUYER_DIRECTORY_BACKEND").as_deref() {
            None | Some("postgres") => Ok(Self::Postgres),
            Some("http") => {
                let base_url = lookup("BUYER_DIRECTORY_URL")
                    .ok_or(ConfigError::Missing("BUYER_DIRECTORY_URL"))?;
                let timeout_ms = match lookup("BUYER_DIRECTORY_TIMEOUT_MS") {
                    Some(raw) => raw.parse::<u64>().map_err(|_| ConfigError::Invalid {
                        name:  "BUYER_DIRECTORY_TIMEOUT_MS",
                        value: raw,
                    })?,
                    None => DEFAULT_DIRECTORY_TIMEOUT_MS,
                };
                Ok(Self::Http {
                    base_url,
                    timeout: Duration::from_millis(timeout_ms),
                })
            }
            Some(other) => Err(ConfigError::Invalid {
                name:  "BUYER_DIRECTORY_BACKEND",
                value: other.to_string(),
            }),
        }
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    if value.eq_ignore_ascii_case("true") || value == "1" {
        Ok(true)
    } else if value.eq_ignore_ascii_case("false") || value == "0" {
        Ok(false)
    } else {
        Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<CoreConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CoreConfig::from_lookup(|name| vars.get(name).cloned())
    }

    const BASE: [(&str, &str); 2] = [
        ("CORE_PORT", "3001"),
        ("DATABASE_URL", "postgres://rifa@localhost/rifa"),
    ];

    fn with_base(extra: &[(&'static str, &'static str)]) -> Vec<(&'static str, &'static str)> {
        BASE.iter().chain(extra).copied().collect()
    }

    #[test]
    fn test_必須項目のみでデフォルト値が使われる() {
        let config = load(&BASE).unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3001);
        assert_eq!(config.raffle.space.max_number(), 1000);
        assert_eq!(config.raffle.cancellation_policy, CancellationPolicy::Soft);
        assert_eq!(config.buyer_directory, DirectoryBackend::Postgres);
        assert!(config.run_migrations);
    }

    #[rstest]
    #[case("CORE_PORT")]
    #[case("DATABASE_URL")]
    fn test_必須項目がなければmissing(#[case] missing: &'static str) {
        let vars: Vec<_> = BASE.iter().copied().filter(|(k, _)| *k != missing).collect();

        assert_eq!(load(&vars).unwrap_err(), ConfigError::Missing(missing));
    }

    #[rstest]
    #[case("RAFFLE_MAX_NUMBER", "0")]
    #[case("RAFFLE_MAX_NUMBER", "abc")]
    #[case("RAFFLE_MAX_NUMBER", "1000001")]
    #[case("RAFFLE_CANCELLATION_POLICY", "archive")]
    #[case("BUYER_DIRECTORY_BACKEND", "ldap")]
    #[case("RUN_MIGRATIONS", "maybe")]
    fn test_不正な値はinvalid(#[case] name: &'static str, #[case] value: &'static str) {
        let result = load(&with_base(&[(name, value)]));

        assert_eq!(
            result.unwrap_err(),
            ConfigError::Invalid {
                name,
                value: value.to_string(),
            }
        );
    }

    #[test]
    fn test_物理削除の方針を選べる() {
        let config = load(&with_base(&[("RAFFLE_CANCELLATION_POLICY", "hard")])).unwrap();

        assert_eq!(config.raffle.cancellation_policy, CancellationPolicy::Hard);
    }

    #[test]
    fn test_httpバックエンドはurlとタイムアウトを読む() {
        let config = load(&with_base(&[
            ("BUYER_DIRECTORY_BACKEND", "http"),
            ("BUYER_DIRECTORY_URL", "http://users.internal"),
            ("BUYER_DIRECTORY_TIMEOUT_MS", "500"),
        ]))
        .unwrap();

        assert_eq!(
            config.buyer_directory,
            DirectoryBackend::Http {
                base_url: "http://users.internal".to_string(),
                timeout:  Duration::from_millis(500),
            }
        );
    }

    #[test]
    fn test_httpバックエンドでurlがなければmissing() {
        let result = load(&with_base(&[("BUYER_DIRECTORY_BACKEND", "http")]));

        assert_eq!(
            result.unwrap_err(),
            ConfigError::Missing("BUYER_DIRECTORY_URL")
        );
    }

    #[test]
    fn test_マイグレーションを無効にできる() {
        let config = load(&with_base(&[("RUN_MIGRATIONS", "false")])).unwrap();

        assert!(!config.run_migrations);
    }
}
