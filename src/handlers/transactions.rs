use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::AppState;
use crate::domain::Attendee;
use crate::error::AppError;
use crate::services::lifecycle::CreateOrder;

#[derive(Debug, Deserialize)]
pub struct CreateTransactionPayload {
    pub buyer_id: Uuid,
    pub ticket_type_id: Uuid,
    pub quantity: i32,
    pub attendees: Vec<Attendee>,
    #[serde(default)]
    pub voucher_code: Option<String>,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub points_requested: i64,
}

#[derive(Debug, Deserialize)]
pub struct PaymentProofPayload {
    pub proof: String,
}

pub async fn create_transaction(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Json(payload): Json<CreateTransactionPayload>,
) -> Result<impl IntoResponse, AppError> {
    let order = CreateOrder {
        buyer_id: payload.buyer_id,
        ticket_type_id: payload.ticket_type_id,
        quantity: payload.quantity,
        attendees: payload.attendees,
        voucher_code: payload.voucher_code,
        coupon_code: payload.coupon_code,
        points_requested: payload.points_requested,
    };

    let tx = state.lifecycle.create(event_id, order).await?;
    Ok((StatusCode::CREATED, Json(tx)))
}

pub async fn submit_payment_proof(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PaymentProofPayload>,
) -> Result<impl IntoResponse, AppError> {
    let tx = state.lifecycle.submit_proof(id, &payload.proof).await?;
    Ok(Json(tx))
}

pub async fn confirm_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let tx = state.lifecycle.confirm(id).await?;
    Ok(Json(tx))
}

pub async fn reject_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let tx = state.lifecycle.reject(id).await?;
    Ok(Json(tx))
}

pub async fn cancel_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let tx = state.lifecycle.cancel(id).await?;
    Ok(Json(tx))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let tx = state.lifecycle.get(id).await?;
    Ok(Json(tx))
}

pub async fn get_transaction_tickets(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let tickets = state.lifecycle.tickets(id).await?;
    Ok(Json(tickets))
}
