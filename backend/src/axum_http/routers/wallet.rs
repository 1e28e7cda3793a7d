use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;
use crates::{
    domain::{
        entities::{credit_packs::CreditPackEntity, wallet_transactions::WalletTransactionEntity},
        repositories::{credit_packs::CreditPackRepository, wallet::WalletRepository},
        value_objects::{
            bookings::ChargeIntentDto,
            wallet::{NextExpiringCredits, WalletBalanceDto},
        },
    },
    infra::db::repositories::{credit_packs::CreditPackPostgres, wallet::WalletPostgres},
};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    axum_http::{error_responses::AppResult, http_serve::AppServices},
    usecases::{payment_gateway::PaymentGateway, wallet::WalletUseCase},
};

pub fn routes(services: &AppServices) -> Router {
    let wallet_usecase = WalletUseCase::new(
        Arc::new(WalletPostgres::new(Arc::clone(&services.db_pool))),
        Arc::new(CreditPackPostgres::new(Arc::clone(&services.db_pool))),
        Arc::clone(&services.gateway),
    );

    Router::new()
        .route("/balance", get(get_wallet_balance))
        .route("/next-expiring", get(get_next_expiring_credits))
        .route("/transactions", get(list_transactions))
        .route("/credit-packs", get(list_credit_packs))
        .route(
            "/credit-packs/:credit_pack_id/charge-intents",
            post(create_credit_pack_intent),
        )
        .with_state(Arc::new(wallet_usecase))
}

pub async fn get_wallet_balance<W, CP, G>(
    State(wallet_usecase): State<Arc<WalletUseCase<W, CP, G>>>,
    auth: AuthUser,
) -> AppResult<Json<WalletBalanceDto>>
where
    W: WalletRepository + Send + Sync + 'static,
    CP: CreditPackRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    let balance = wallet_usecase
        .get_wallet_balance(auth.user_id, Utc::now())
        .await?;
    Ok(Json(balance))
}

pub async fn get_next_expiring_credits<W, CP, G>(
    State(wallet_usecase): State<Arc<WalletUseCase<W, CP, G>>>,
    auth: AuthUser,
) -> AppResult<Json<Option<NextExpiringCredits>>>
where
    W: WalletRepository + Send + Sync + 'static,
    CP: CreditPackRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    let next = wallet_usecase
        .get_next_expiring_credits(auth.user_id, Utc::now())
        .await?;
    Ok(Json(next))
}

pub async fn list_transactions<W, CP, G>(
    State(wallet_usecase): State<Arc<WalletUseCase<W, CP, G>>>,
    auth: AuthUser,
) -> AppResult<Json<Vec<WalletTransactionEntity>>>
where
    W: WalletRepository + Send + Sync + 'static,
    CP: CreditPackRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    let transactions = wallet_usecase.list_transactions(auth.user_id).await?;
    Ok(Json(transactions))
}

pub async fn list_credit_packs<W, CP, G>(
    State(wallet_usecase): State<Arc<WalletUseCase<W, CP, G>>>,
    _auth: AuthUser,
) -> AppResult<Json<Vec<CreditPackEntity>>>
where
    W: WalletRepository + Send + Sync + 'static,
    CP: CreditPackRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    let packs = wallet_usecase.list_credit_packs().await?;
    Ok(Json(packs))
}

pub async fn create_credit_pack_intent<W, CP, G>(
    State(wallet_usecase): State<Arc<WalletUseCase<W, CP, G>>>,
    auth: AuthUser,
    Path(credit_pack_id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<ChargeIntentDto>)>
where
    W: WalletRepository + Send + Sync + 'static,
    CP: CreditPackRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    let intent = wallet_usecase
        .create_credit_pack_intent(auth.user_id, credit_pack_id, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(intent)))
}
