//! # Core Service サーバー
//!
//! 決済済みの取引に抽選番号を割り当てる内部サービス。
//!
//! ## 役割
//!
//! - **予約**: 空き番号から一様ランダムに番号を割り当てる
//! - **取消**: 割り当て済みの番号を解放する（単体・一括）
//! - **照会**: 割り当て状況を番号順で返す
//!
//! 同じ番号が同時に 2 人の購入者へ割り当てられることはない。
//! 予約は番号プールのロックで直列化し、データベースの部分一意インデックスで最終的に保証する。
//!
//! ## 環境変数
//!
//! | 変数名 | 必須 | 説明 |
//! |--------|------|------|
//! | `CORE_HOST` | No | バインドアドレス（デフォルト: `0.0.0.0`） |
//! | `CORE_PORT` | **Yes** | ポート番号 |
//! | `DATABASE_URL` | **Yes** | PostgreSQL 接続 URL |
//! | `RAFFLE_MAX_NUMBER` | No | 番号空間の上限（デフォルト: `1000`） |
//! | `RAFFLE_CANCELLATION_POLICY` | No | `soft`（デフォルト）または `hard` |
//! | `BUYER_DIRECTORY_BACKEND` | No | `postgres`（デフォルト）または `http` |
//! | `BUYER_DIRECTORY_URL` | http 時のみ | 購入者ディレクトリのベース URL |
//! | `BUYER_DIRECTORY_TIMEOUT_MS` | No | ディレクトリ呼び出しのタイムアウト（デフォルト: `3000`） |
//! | `RUN_MIGRATIONS` | No | 起動時にマイグレーションを適用するか（デフォルト: `true`） |
//! | `LOG_FORMAT` | No | `json` または `pretty` |
//!
//! ## 起動方法
//!
//! ```bash
//! CORE_PORT=3001 DATABASE_URL=postgres://... cargo run -p rifa-core-service
//! ```

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{Router, http::HeaderName, routing::get};
use rifa_core_service::{
    config::{CoreConfig, DirectoryBackend},
    handler::{ReadinessState, TicketState, health_check, readiness_check, ticket_routes},
    usecase::{CancellationUseCaseImpl, ReservationUseCaseImpl, TicketQueryUseCaseImpl},
};
use rifa_domain::{clock::SystemClock, random::ThreadRandomSource};
use rifa_infra::{
    db::{self, PgTransactionManager},
    directory::{BuyerDirectory, HttpBuyerDirectory, PostgresBuyerDirectory},
    repository::{PostgresTicketRepository, TicketRepository},
};
use rifa_shared::observability::{
    MakeRequestUuidV7,
    REQUEST_ID_HEADER,
    TracingConfig,
    init_tracing,
    make_request_span,
};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

/// Core Service サーバーのエントリーポイント
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env ファイルを読み込む（存在する場合）
    dotenvy::dotenv().ok();

    // トレーシング初期化
    let tracing_config = TracingConfig::from_env("core-service");
    init_tracing(tracing_config);
    let _tracing_guard = tracing::info_span!("app", service = "core-service").entered();

    // 設定読み込み
    let config = CoreConfig::from_env().context("設定の読み込みに失敗しました")?;

    tracing::info!(
        max_number = config.raffle.space.max_number(),
        policy = ?config.raffle.cancellation_policy,
        "Core Service サーバーを起動します: {}:{}",
        config.host,
        config.port
    );

    // データベース接続プールを作成
    let pool = db::create_pool(&config.database_url)
        .await
        .context("データベース接続に失敗しました")?;
    tracing::info!("データベースに接続しました");

    // マイグレーション実行
    if config.run_migrations {
        db::run_migrations(&pool)
            .await
            .context("マイグレーションの実行に失敗しました")?;
        tracing::info!("マイグレーションを適用しました");
    }

    // Readiness Check 用 State（pool が move される前に clone）
    let readiness_state = Arc::new(ReadinessState { pool: pool.clone() });

    // 依存コンポーネントを初期化
    let ticket_repository: Arc<dyn TicketRepository> =
        Arc::new(PostgresTicketRepository::new(pool.clone()));
    let tx_manager = Arc::new(PgTransactionManager::new(pool.clone()));
    let buyer_directory: Arc<dyn BuyerDirectory> = match &config.buyer_directory {
        DirectoryBackend::Postgres => Arc::new(PostgresBuyerDirectory::new(pool.clone())),
        DirectoryBackend::Http { base_url, timeout } => Arc::new(
            HttpBuyerDirectory::new(base_url, *timeout)
                .context("購入者ディレクトリクライアントの初期化に失敗しました")?,
        ),
    };
    let clock = Arc::new(SystemClock);
    let space = config.raffle.space;

    let ticket_state = Arc::new(TicketState {
        reservation:  ReservationUseCaseImpl::new(
            ticket_repository.clone(),
            buyer_directory,
            tx_manager.clone(),
            clock.clone(),
            Arc::new(ThreadRandomSource),
            space,
        ),
        cancellation: CancellationUseCaseImpl::new(
            ticket_repository.clone(),
            tx_manager,
            clock,
            space,
            config.raffle.cancellation_policy,
        ),
        query:        TicketQueryUseCaseImpl::new(ticket_repository, space),
    });

    // ルーター構築
    let request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);
    let app = Router::new()
        .route("/health", get(health_check))
        .merge(
            Router::new()
                .route("/health/ready", get(readiness_check))
                .with_state(readiness_state),
        )
        .merge(ticket_routes(ticket_state))
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuidV7));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("アドレスのパースに失敗しました")?;

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Core Service サーバーが起動しました: {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
