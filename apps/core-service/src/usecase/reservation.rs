//! # 予約ユースケース
//!
//! 決済済みの取引に対して、未使用の番号を指定枚数だけ割り当てる。
//!
//! ## 処理の流れ
//!
//! 1. 入力検証（I/O より前）
//! 2. 購入者名・電話番号が揃っていなければ購入者ディレクトリを参照
//! 3. トランザクション開始、番号プールをロックして使用中の番号を取得
//! 4. 空き番号から重複なしで抽選
//! 5. 抽選した番号ごとにチケットを一括挿入してコミット
//!
//! 番号プールのロックにより予約同士は直列化される。
//! 一意制約違反はロールバックして再試行可能な `Conflict` を返す。

use std::sync::Arc;

use rifa_domain::{
    clock::Clock,
    raffle::{
        BuyerAttribution,
        BuyerName,
        NewTicket,
        NumberSpace,
        OwnerId,
        PaymentReference,
        PhoneSuffix,
        Quantity,
        RaffleError,
        ReservationPlan,
        Ticket,
        TicketId,
        TicketNumber,
    },
    random::RandomSource,
};
use rifa_infra::{
    InfraError,
    db::TransactionManager,
    directory::BuyerDirectory,
    repository::TicketRepository,
};

use crate::error::CoreError;

/// 予約の入力
///
/// 文字列は空白のみなら未指定として扱う。
#[derive(Debug, Clone, Default)]
pub struct ReserveInput {
    pub quantity:           i64,
    pub owner_id:           Option<String>,
    pub payment_reference:  Option<String>,
    pub buyer_display_name: Option<String>,
    pub buyer_phone_suffix: Option<String>,
    /// 番号上限のリクエスト単位の指定（設定上限以下）
    pub max_number:         Option<i64>,
}

/// 検証済みの予約リクエスト
struct ValidatedReservation {
    plan:              ReservationPlan,
    owner_id:          OwnerId,
    payment_reference: PaymentReference,
    name:              Option<BuyerName>,
    phone_suffix:      Option<PhoneSuffix>,
}

/// 予約ユースケース
pub struct ReservationUseCaseImpl {
    ticket_repository: Arc<dyn TicketRepository>,
    buyer_directory:   Arc<dyn BuyerDirectory>,
    tx_manager:        Arc<dyn TransactionManager>,
    clock:             Arc<dyn Clock>,
    random:            Arc<dyn RandomSource>,
    space:             NumberSpace,
}

impl ReservationUseCaseImpl {
    pub fn new(
        ticket_repository: Arc<dyn TicketRepository>,
        buyer_directory: Arc<dyn BuyerDirectory>,
        tx_manager: Arc<dyn TransactionManager>,
        clock: Arc<dyn Clock>,
        random: Arc<dyn RandomSource>,
        space: NumberSpace,
    ) -> Self {
        Self {
            ticket_repository,
            buyer_directory,
            tx_manager,
            clock,
            random,
            space,
        }
    }

    /// 番号を予約し、割り当てた番号を抽選順で返す
    ///
    /// # Errors
    ///
    /// - 入力検証: `InvalidQuantity` → `MissingPaymentReference` → `MissingOwner`
    ///   → `InvalidMaxNumber` → `QuantityExceedsSpace` の順に判定する
    /// - `OwnerNotFound`: ディレクトリに購入者がいない
    /// - `InsufficientAvailability`: 空き番号が足りない（残数付き）
    /// - `Conflict`: 挿入時の一意制約違反（再試行可能）
    /// - `StorageUnavailable`: データストアまたはディレクトリに到達できない
    pub async fn reserve(&self, input: ReserveInput) -> Result<Vec<TicketNumber>, CoreError> {
        let request = self.validate(input)?;
        let buyer = self
            .resolve_buyer(request.owner_id, request.name, request.phone_suffix)
            .await?;
        let quantity = request.plan.quantity().get();

        let mut tx = self.tx_manager.begin().await?;
        let taken = self.ticket_repository.lock_active_numbers(&mut tx).await?;
        let drawn = request.plan.draw(&taken, self.random.as_ref())?;

        let now = self.clock.now();
        let tickets: Vec<Ticket> = drawn
            .iter()
            .map(|&number| {
                Ticket::new(NewTicket {
                    id: TicketId::new(),
                    number,
                    buyer: buyer.clone(),
                    payment_reference: request.payment_reference.clone(),
                    now,
                })
            })
            .collect();

        self.ticket_repository
            .insert_many(&mut tx, &tickets)
            .await
            .map_err(|e| {
                if e.as_conflict().is_some() {
                    tracing::warn!(error = %e, "番号の確保中に一意制約違反が発生しました");
                    CoreError::from(RaffleError::Conflict)
                } else {
                    CoreError::from(e)
                }
            })?;
        tx.commit().await?;

        tracing::info!(
            owner_id = %buyer.owner_id(),
            payment_reference = %request.payment_reference,
            quantity,
            "番号を予約しました"
        );

        Ok(drawn)
    }

    fn validate(&self, input: ReserveInput) -> Result<ValidatedReservation, CoreError> {
        let quantity = Quantity::new(input.quantity)?;
        let payment_reference =
            non_blank(input.payment_reference).ok_or(RaffleError::MissingPaymentReference)?;
        let owner_id = non_blank(input.owner_id).ok_or(RaffleError::MissingOwner)?;
        let space = self.space.narrowed(input.max_number)?;
        let plan = ReservationPlan::new(quantity, space)?;

        Ok(ValidatedReservation {
            plan,
            owner_id: OwnerId::new(owner_id)?,
            payment_reference: PaymentReference::new(payment_reference)?,
            name: non_blank(input.buyer_display_name)
                .map(BuyerName::new)
                .transpose()?,
            phone_suffix: non_blank(input.buyer_phone_suffix)
                .map(|phone| PhoneSuffix::from_phone(&phone)),
        })
    }

    /// 購入者情報を確定する
    ///
    /// 呼び出し側の指定を優先し、足りない項目だけディレクトリから補う。
    async fn resolve_buyer(
        &self,
        owner_id: OwnerId,
        name: Option<BuyerName>,
        phone_suffix: Option<PhoneSuffix>,
    ) -> Result<BuyerAttribution, CoreError> {
        if let (Some(name), Some(phone_suffix)) = (&name, &phone_suffix) {
            return Ok(BuyerAttribution::new(
                owner_id,
                name.clone(),
                phone_suffix.clone(),
            ));
        }

        let profile = self
            .buyer_directory
            .lookup_buyer(&owner_id)
            .await?
            .ok_or_else(|| RaffleError::OwnerNotFound(owner_id.as_str().to_string()))?;

        let name = match name {
            Some(name) => name,
            // ディレクトリ側の不正データは呼び出し側の入力エラーにしない
            None => BuyerName::new(profile.display_name).map_err(|e| {
                InfraError::unexpected(format!("購入者ディレクトリの表示名が不正です: {e}"))
            })?,
        };
        let phone_suffix =
            phone_suffix.unwrap_or_else(|| PhoneSuffix::from_phone(&profile.phone));

        Ok(BuyerAttribution::new(owner_id, name, phone_suffix))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
