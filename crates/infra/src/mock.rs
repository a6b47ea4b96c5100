//! # テスト用インメモリ実装
//!
//! ユースケーステストで使うインメモリのチケットストアと購入者ディレクトリ。
//! `test-utils` feature を有効にすると他クレートからも利用できる。
//!
//! ```toml
//! [dev-dependencies]
//! rifa-infra = { workspace = true, features = ["test-utils"] }
//! ```
//!
//! [`InMemoryTicketStore`] は PostgreSQL 実装と同じトランザクション契約を持つ:
//!
//! - `begin()` からコミットまたはドロップまで、テーブル全体の排他ガードを保持する
//! - 書き込みは作業コピーに対して行い、コミット時にのみ公開する
//! - ドロップ（コミットなし）は作業コピーを捨てる＝ロールバック
//!
//! 同じストアに対して、トランザクションを保持したまま非トランザクションの
//! 読み取りを呼ぶとデッドロックする。

use std::{
    collections::{BTreeSet, HashMap, HashSet},
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rifa_domain::raffle::{OwnerId, Ticket, TicketNumber, TicketStatus};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::{
    db::{TransactionManager, TxContext},
    directory::{BuyerDirectory, BuyerProfile},
    error::InfraError,
    repository::TicketRepository,
};

// ===== InMemoryTicketStore =====

/// インメモリのトランザクション
pub struct MemoryTx {
    guard:   OwnedMutexGuard<Vec<Ticket>>,
    working: Vec<Ticket>,
}

impl MemoryTx {
    pub(crate) fn commit(self) {
        let Self { mut guard, working } = self;
        *guard = working;
    }
}

/// インメモリのチケットストア
///
/// `TransactionManager` と `TicketRepository` の両方を実装する。
#[derive(Clone, Default)]
pub struct InMemoryTicketStore {
    table:       Arc<AsyncMutex<Vec<Ticket>>>,
    unseen:      Arc<Mutex<HashSet<TicketNumber>>>,
    unavailable: Arc<Mutex<bool>>,
}

impl InMemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 初期データを投入する
    pub async fn seed(&self, tickets: impl IntoIterator<Item = Ticket>) {
        self.table.lock().await.extend(tickets);
    }

    /// コミット済みの全行（履歴を含む）を取得する
    pub async fn snapshot(&self) -> Vec<Ticket> {
        self.table.lock().await.clone()
    }

    /// プールロック時の読み取りから指定番号を隠す
    ///
    /// ロック後に別トランザクションが割り込んで挿入した状況を再現する。
    /// 隠した番号を挿入しようとすると一意制約違反（Conflict）になる。
    pub fn hide_from_pool_lock(&self, numbers: impl IntoIterator<Item = TicketNumber>) {
        self.unseen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(numbers);
    }

    /// 以降の `begin()` を接続プール枯渇として失敗させる
    pub fn make_unavailable(&self) {
        *self
            .unavailable
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = true;
    }

    fn is_unavailable(&self) -> bool {
        *self
            .unavailable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn sorted_by_number(mut tickets: Vec<Ticket>) -> Vec<Ticket> {
    tickets.sort_by_key(|t| (t.number(), t.allocated_at()));
    tickets
}

#[async_trait]
impl TransactionManager for InMemoryTicketStore {
    async fn begin(&self) -> Result<TxContext, InfraError> {
        if self.is_unavailable() {
            return Err(sqlx::Error::PoolTimedOut.into());
        }
        let guard = Arc::clone(&self.table).lock_owned().await;
        let working = guard.clone();
        Ok(TxContext::memory(MemoryTx { guard, working }))
    }
}

#[async_trait]
impl TicketRepository for InMemoryTicketStore {
    async fn find_all(&self, include_cancelled: bool) -> Result<Vec<Ticket>, InfraError> {
        let table = self.table.lock().await;
        Ok(sorted_by_number(
            table
                .iter()
                .filter(|t| include_cancelled || t.is_active())
                .cloned()
                .collect(),
        ))
    }

    async fn find_by_number(
        &self,
        number: TicketNumber,
        include_cancelled: bool,
    ) -> Result<Option<Ticket>, InfraError> {
        let table = self.table.lock().await;
        let rows: Vec<&Ticket> = table.iter().filter(|t| t.number() == number).collect();

        if let Some(active) = rows.iter().find(|t| t.is_active()) {
            return Ok(Some((*active).clone()));
        }
        if !include_cancelled {
            return Ok(None);
        }
        Ok(rows
            .into_iter()
            .max_by_key(|t| (t.cancelled_at(), t.allocated_at()))
            .cloned())
    }

    async fn lock_active_numbers(
        &self,
        tx: &mut TxContext,
    ) -> Result<BTreeSet<TicketNumber>, InfraError> {
        let tx = tx.memory_tx()?;
        let unseen = self
            .unseen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        Ok(tx
            .working
            .iter()
            .filter(|t| t.is_active())
            .map(Ticket::number)
            .filter(|n| !unseen.contains(n))
            .collect())
    }

    async fn insert_many(&self, tx: &mut TxContext, tickets: &[Ticket]) -> Result<(), InfraError> {
        let tx = tx.memory_tx()?;
        let mut active: HashSet<TicketNumber> = tx
            .working
            .iter()
            .filter(|t| t.is_active())
            .map(Ticket::number)
            .collect();

        // 1 文の INSERT と同じく、1 件でも違反があれば何も書き込まない
        for ticket in tickets {
            if ticket.is_active() && !active.insert(ticket.number()) {
                return Err(InfraError::conflict("Ticket", ticket.number().to_string()));
            }
        }
        tx.working.extend(tickets.iter().cloned());
        Ok(())
    }

    async fn lock_by_numbers(
        &self,
        tx: &mut TxContext,
        numbers: &[TicketNumber],
    ) -> Result<Vec<Ticket>, InfraError> {
        let tx = tx.memory_tx()?;
        Ok(sorted_by_number(
            tx.working
                .iter()
                .filter(|t| numbers.contains(&t.number()))
                .cloned()
                .collect(),
        ))
    }

    async fn set_status(
        &self,
        tx: &mut TxContext,
        numbers: &[TicketNumber],
        status: TicketStatus,
        now: DateTime<Utc>,
    ) -> Result<Vec<TicketNumber>, InfraError> {
        let tx = tx.memory_tx()?;
        let targets: HashSet<TicketNumber> = numbers.iter().copied().collect();
        let mut changed = BTreeSet::new();

        match status {
            TicketStatus::Cancelled => {
                let rows = std::mem::take(&mut tx.working);
                for ticket in rows {
                    if ticket.is_active() && targets.contains(&ticket.number()) {
                        changed.insert(ticket.number());
                        let cancelled = ticket
                            .cancelled(now)
                            .map_err(|e| InfraError::unexpected(e.to_string()))?;
                        tx.working.push(cancelled);
                    } else {
                        tx.working.push(ticket);
                    }
                }
            }
            TicketStatus::Active => {
                let active: HashSet<TicketNumber> = tx
                    .working
                    .iter()
                    .filter(|t| t.is_active())
                    .map(Ticket::number)
                    .collect();
                // 番号ごとに最後に取消された行を有効に戻す
                let mut latest: HashMap<TicketNumber, usize> = HashMap::new();
                for (index, ticket) in tx.working.iter().enumerate() {
                    let number = ticket.number();
                    if ticket.is_active() || !targets.contains(&number) || active.contains(&number)
                    {
                        continue;
                    }
                    let newer = latest.get(&number).is_none_or(|&current| {
                        let current = &tx.working[current];
                        (ticket.cancelled_at(), ticket.allocated_at())
                            > (current.cancelled_at(), current.allocated_at())
                    });
                    if newer {
                        latest.insert(number, index);
                    }
                }
                for (number, index) in latest {
                    tx.working[index] = reactivated(&tx.working[index]);
                    changed.insert(number);
                }
            }
        }

        Ok(changed.into_iter().collect())
    }

    async fn delete_active(
        &self,
        tx: &mut TxContext,
        numbers: &[TicketNumber],
    ) -> Result<Vec<TicketNumber>, InfraError> {
        let tx = tx.memory_tx()?;
        let mut deleted = BTreeSet::new();
        tx.working.retain(|t| {
            let remove = t.is_active() && numbers.contains(&t.number());
            if remove {
                deleted.insert(t.number());
            }
            !remove
        });
        Ok(deleted.into_iter().collect())
    }
}

/// 取消済みの行を有効な状態に戻した複製を作る
fn reactivated(ticket: &Ticket) -> Ticket {
    Ticket::from_db(rifa_domain::raffle::TicketRecord {
        id:                ticket.id().clone(),
        number:            ticket.number(),
        owner_id:          ticket.buyer().owner_id().clone(),
        buyer_name:        ticket.buyer().name().clone(),
        phone_suffix:      ticket.buyer().phone_suffix().clone(),
        payment_reference: ticket.payment_reference().clone(),
        status:            TicketStatus::Active,
        allocated_at:      ticket.allocated_at(),
        cancelled_at:      None,
    })
}

// ===== StubBuyerDirectory =====

/// 固定の購入者情報を返すディレクトリ
#[derive(Clone, Default)]
pub struct StubBuyerDirectory {
    buyers:      Arc<Mutex<HashMap<String, BuyerProfile>>>,
    lookups:     Arc<Mutex<Vec<String>>>,
    unavailable: bool,
}

impl StubBuyerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 常に到達不能エラーを返すディレクトリ
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn with_buyer(self, owner_id: &str, display_name: &str, phone: &str) -> Self {
        self.buyers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                owner_id.to_string(),
                BuyerProfile {
                    display_name: display_name.to_string(),
                    phone:        phone.to_string(),
                },
            );
        self
    }

    /// 検索された購入者 ID の履歴
    pub fn lookups(&self) -> Vec<String> {
        self.lookups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl BuyerDirectory for StubBuyerDirectory {
    async fn lookup_buyer(&self, owner_id: &OwnerId) -> Result<Option<BuyerProfile>, InfraError> {
        self.lookups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(owner_id.as_str().to_string());

        if self.unavailable {
            return Err(InfraError::directory("connection refused"));
        }
        Ok(self
            .buyers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(owner_id.as_str())
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rifa_domain::raffle::{
        BuyerAttribution,
        BuyerName,
        NewTicket,
        PaymentReference,
        PhoneSuffix,
        TicketId,
    };

    use super::*;

    fn n(value: i32) -> TicketNumber {
        TicketNumber::new(value).unwrap()
    }

    fn ticket(number: i32, owner: &str) -> Ticket {
        Ticket::new(NewTicket {
            id:                TicketId::new(),
            number:            n(number),
            buyer:             BuyerAttribution::new(
                OwnerId::new(owner).unwrap(),
                BuyerName::new("Buyer").unwrap(),
                PhoneSuffix::from_phone("1234"),
            ),
            payment_reference: PaymentReference::new("pay").unwrap(),
            now:               Utc::now(),
        })
    }

    #[tokio::test]
    async fn test_コミットしなければ書き込みは破棄される() {
        let sut = InMemoryTicketStore::new();

        {
            let mut tx = sut.begin().await.unwrap();
            sut.insert_many(&mut tx, &[ticket(1, "u1")]).await.unwrap();
            // ドロップ = ロールバック
        }

        assert!(sut.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_コミットで書き込みが公開される() {
        let sut = InMemoryTicketStore::new();

        let mut tx = sut.begin().await.unwrap();
        sut.insert_many(&mut tx, &[ticket(1, "u1"), ticket(2, "u1")])
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let numbers: Vec<i32> = sut
            .find_all(false)
            .await
            .unwrap()
            .iter()
            .map(|t| t.number().as_i32())
            .collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_有効な番号の重複挿入はconflictで何も書き込まない() {
        let sut = InMemoryTicketStore::new();
        sut.seed([ticket(3, "u1")]).await;

        let mut tx = sut.begin().await.unwrap();
        let err = sut
            .insert_many(&mut tx, &[ticket(4, "u2"), ticket(3, "u2")])
            .await
            .unwrap_err();
        tx.commit().await.unwrap();

        assert!(err.as_conflict().is_some());
        assert_eq!(sut.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn test_取消は変化した番号だけを返し再取消は空() {
        let sut = InMemoryTicketStore::new();
        sut.seed([ticket(2, "u1"), ticket(5, "u1")]).await;

        let mut tx = sut.begin().await.unwrap();
        let first = sut
            .set_status(&mut tx, &[n(5), n(2), n(9)], TicketStatus::Cancelled, Utc::now())
            .await
            .unwrap();
        let second = sut
            .set_status(&mut tx, &[n(2)], TicketStatus::Cancelled, Utc::now())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(first, vec![n(2), n(5)]);
        assert!(second.is_empty());
        assert!(sut.find_all(false).await.unwrap().is_empty());
        assert_eq!(sut.find_all(true).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_有効化は有効な行がない番号の最新取消行だけを戻す() {
        let sut = InMemoryTicketStore::new();
        let old = ticket(1, "old").cancelled(Utc::now()).unwrap();
        let current = ticket(2, "current");
        let released = ticket(2, "prev").cancelled(Utc::now()).unwrap();
        sut.seed([old.clone(), current, released]).await;

        let mut tx = sut.begin().await.unwrap();
        let changed = sut
            .set_status(&mut tx, &[n(1), n(2)], TicketStatus::Active, Utc::now())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(changed, vec![n(1)]);
        let restored = sut.find_by_number(n(1), false).await.unwrap().unwrap();
        assert_eq!(restored.id(), old.id());
        assert_eq!(restored.cancelled_at(), None);
    }

    #[tokio::test]
    async fn test_物理削除は有効な行のみを削除する() {
        let sut = InMemoryTicketStore::new();
        sut.seed([ticket(1, "u1"), ticket(2, "u1").cancelled(Utc::now()).unwrap()])
            .await;

        let mut tx = sut.begin().await.unwrap();
        let deleted = sut.delete_active(&mut tx, &[n(1), n(2)]).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(deleted, vec![n(1)]);
        assert_eq!(sut.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn test_番号検索は有効な行を優先し履歴指定時は取消行を返す() {
        let sut = InMemoryTicketStore::new();
        sut.seed([ticket(7, "old").cancelled(Utc::now()).unwrap()]).await;

        assert!(sut.find_by_number(n(7), false).await.unwrap().is_none());
        let history = sut.find_by_number(n(7), true).await.unwrap().unwrap();
        assert_eq!(history.status(), TicketStatus::Cancelled);

        sut.seed([ticket(7, "new")]).await;
        let active = sut.find_by_number(n(7), true).await.unwrap().unwrap();
        assert_eq!(active.buyer().owner_id().as_str(), "new");
    }

    #[tokio::test]
    async fn test_隠した番号はプールロックの結果に含まれない() {
        let sut = InMemoryTicketStore::new();
        sut.seed([ticket(1, "u1"), ticket(2, "u1")]).await;
        sut.hide_from_pool_lock([n(2)]);

        let mut tx = sut.begin().await.unwrap();
        let taken = sut.lock_active_numbers(&mut tx).await.unwrap();

        assert_eq!(taken, BTreeSet::from([n(1)]));
    }

    #[tokio::test]
    async fn test_利用不可にするとbeginが到達不能エラーになる() {
        let sut = InMemoryTicketStore::new();
        sut.make_unavailable();

        let Err(err) = sut.begin().await else {
            panic!("begin は失敗すること");
        };

        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn test_スタブディレクトリは登録済みの購入者を返し検索履歴を残す() {
        let sut = StubBuyerDirectory::new().with_buyer("u1", "Maria", "11987654321");

        let found = sut.lookup_buyer(&OwnerId::new("u1").unwrap()).await.unwrap();
        let missing = sut.lookup_buyer(&OwnerId::new("u2").unwrap()).await.unwrap();

        assert_eq!(found.unwrap().display_name, "Maria");
        assert!(missing.is_none());
        assert_eq!(sut.lookups(), vec!["u1".to_string(), "u2".to_string()]);
    }
}
