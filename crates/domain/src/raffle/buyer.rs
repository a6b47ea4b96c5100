//! 購入者情報
//!
//! 割り当て時点で確定し、以後チケットに固定される値を扱う。
//! 購入者名と電話番号は個人情報のため `Debug` 出力をマスクする。

use serde::{Deserialize, Serialize};

use crate::DomainError;

/// 保存する電話番号の末尾桁数
pub const PHONE_SUFFIX_LENGTH: usize = 4;

define_validated_string! {
    /// 購入者 ID（外部のユーザー管理で採番された識別子）
    pub struct OwnerId {
        label: "購入者 ID",
        max_length: 255,
    }
}

define_validated_string! {
    /// 購入者の表示名
    pub struct BuyerName {
        label: "購入者名",
        max_length: 255,
        pii: true,
    }
}

/// 電話番号の末尾（最大 4 文字、空も可）
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneSuffix(String);

impl PhoneSuffix {
    /// 電話番号の末尾 4 文字を取り出す
    ///
    /// 4 文字未満の場合は全体をそのまま使う。前後の空白は除去する。
    pub fn from_phone(phone: &str) -> Self {
        let trimmed = phone.trim();
        let skip = trimmed.chars().count().saturating_sub(PHONE_SUFFIX_LENGTH);
        Self(trimmed.chars().skip(skip).collect())
    }

    /// 保存済みの値から復元する
    pub fn from_stored(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.chars().count() > PHONE_SUFFIX_LENGTH {
            return Err(DomainError::Validation(format!(
                "電話番号末尾は {PHONE_SUFFIX_LENGTH} 文字以内である必要があります"
            )));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for PhoneSuffix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PhoneSuffix").field(&"[REDACTED]").finish()
    }
}

/// チケットに記録される購入者情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuyerAttribution {
    owner_id:     OwnerId,
    name:         BuyerName,
    phone_suffix: PhoneSuffix,
}

impl BuyerAttribution {
    pub fn new(owner_id: OwnerId, name: BuyerName, phone_suffix: PhoneSuffix) -> Self {
        Self {
            owner_id,
            name,
            phone_suffix,
        }
    }

    pub fn owner_id(&self) -> &OwnerId {
        &self.owner_id
    }

    pub fn name(&self) -> &BuyerName {
        &self.name
    }

    pub fn phone_suffix(&self) -> &PhoneSuffix {
        &self.phone_suffix
    }
}
