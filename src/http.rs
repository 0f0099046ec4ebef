//! HTTP surface: JSON endpoints for ledger operations, profile management,
//! time travel, and lesson-management fan-out.
//!
//! Success bodies carry `{ "success": true, ... }`; failures map through
//! `AppError` to `{ "success": false, "message" }` with the matching status.

use crate::error::{AppError, AppResult};
use crate::models::{AccountType, ObligationKind, RecurrenceKind, StudentProfile};
use crate::websocket::{lesson_management_group, WsEvent};
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz_handler))
        .route("/bills", post(create_bill_handler))
        .route("/payments", post(create_payment_handler))
        .route("/deposits", post(deposit_handler))
        .route("/transfer", post(transfer_handler))
        .route("/sendFunds", post(send_funds_handler))
        .route("/loans", post(loan_handler))
        .route("/simulateTimeTravel", post(simulate_time_travel_handler))
        .route("/timeTravelProfiles", post(time_travel_profile_handler))
        .route("/profiles", post(create_profile_handler))
        .route("/profiles/:member_name", get(get_profile_handler))
        .route("/threads/:member_name", get(get_threads_handler))
        .route(
            "/lessonManagementUpdate",
            post(lesson_management_update_handler),
        )
        .with_state(state)
}

// =========================================================================
// Request parsing helpers
// =========================================================================

fn require<T>(field: Option<T>, name: &str) -> AppResult<T> {
    field.ok_or_else(|| AppError::Validation(format!("{} is required", name)))
}

/// Amounts arrive as JSON numbers or strings depending on the client
fn parse_decimal(value: &Value) -> AppResult<Decimal> {
    let parsed = match value {
        Value::Number(number) => number.to_string().parse::<Decimal>().ok(),
        Value::String(text) => text.parse::<Decimal>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| AppError::InvalidDecimal(value.to_string()))
}

fn parse_account_type(raw: &str) -> AppResult<AccountType> {
    AccountType::from_str(raw)
        .ok_or_else(|| AppError::Validation(format!("Unknown account type '{}'", raw)))
}

fn parse_interval(raw: &str) -> AppResult<RecurrenceKind> {
    RecurrenceKind::from_str(raw)
        .ok_or_else(|| AppError::Validation(format!("Unknown interval '{}'", raw)))
}

fn parse_count(value: &Value, name: &str) -> AppResult<u32> {
    let parsed = match value {
        Value::Number(number) => number.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(text) => text.parse::<u32>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| AppError::Validation(format!("{} must be a whole number", name)))
}

fn ok_message(message: &str) -> Json<Value> {
    Json(json!({ "success": true, "message": message }))
}

// =========================================================================
// Obligation endpoints (/bills, /payments)
// =========================================================================

/// The obligation payload is a positional array, the way the original
/// client sends it: [memberName, accountType, amount, interval, name,
/// category, date?].
#[derive(Debug, Deserialize)]
struct ParcelRequest {
    parcel: Option<Vec<Value>>,
}

struct ObligationParcel {
    member_name: String,
    account_type: AccountType,
    amount: Decimal,
    interval: RecurrenceKind,
    name: String,
    category: String,
    date: Option<DateTime<Utc>>,
}

fn parcel_str(parcel: &[Value], index: usize, name: &str) -> AppResult<String> {
    parcel
        .get(index)
        .and_then(|value| value.as_str())
        .map(str::to_string)
        .ok_or_else(|| AppError::Validation(format!("parcel {} must be a string", name)))
}

fn parse_parcel(request: ParcelRequest) -> AppResult<ObligationParcel> {
    let parcel = require(request.parcel, "parcel")?;
    if parcel.len() < 6 {
        return Err(AppError::Validation(
            "parcel must carry memberName, accountType, amount, interval, name and category"
                .to_string(),
        ));
    }

    let member_name = parcel_str(&parcel, 0, "memberName")?;
    let account_type = parse_account_type(&parcel_str(&parcel, 1, "accountType")?)?;
    let amount = parse_decimal(&parcel[2])?;
    let interval = parse_interval(&parcel_str(&parcel, 3, "interval")?)?;
    let name = parcel_str(&parcel, 4, "name")?;
    let category = parcel_str(&parcel, 5, "category")?;
    let date = match parcel.get(6) {
        None | Some(Value::Null) => None,
        Some(value) => Some(
            serde_json::from_value::<DateTime<Utc>>(value.clone()).map_err(|_| {
                AppError::Validation("parcel date must be an RFC 3339 timestamp".to_string())
            })?,
        ),
    };

    Ok(ObligationParcel {
        member_name,
        account_type,
        amount,
        interval,
        name,
        category,
        date,
    })
}

async fn append_obligation(
    state: &AppState,
    kind: ObligationKind,
    request: ParcelRequest,
) -> AppResult<Json<Value>> {
    let parcel = parse_parcel(request)?;
    state
        .ledger
        .add_obligation(
            &parcel.member_name,
            parcel.account_type,
            kind,
            parcel.amount,
            parcel.interval,
            &parcel.name,
            &parcel.category,
            parcel.date,
        )
        .await?;
    let noun = match kind {
        ObligationKind::Bill => "Bill",
        ObligationKind::Payment => "Payment",
    };
    Ok(ok_message(&format!("{} added successfully", noun)))
}

async fn create_bill_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ParcelRequest>,
) -> AppResult<Json<Value>> {
    append_obligation(&state, ObligationKind::Bill, request).await
}

async fn create_payment_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ParcelRequest>,
) -> AppResult<Json<Value>> {
    append_obligation(&state, ObligationKind::Payment, request).await
}

// =========================================================================
// Ledger endpoints
// =========================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DepositRequest {
    member_name: Option<String>,
    account_type: Option<String>,
    amount: Option<Value>,
}

async fn deposit_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DepositRequest>,
) -> AppResult<Json<Value>> {
    let member_name = require(request.member_name, "memberName")?;
    let account_type = parse_account_type(&require(request.account_type, "accountType")?)?;
    let amount = parse_decimal(&require(request.amount, "amount")?)?;

    state.ledger.deposit(&member_name, account_type, amount).await?;
    Ok(ok_message("Deposit completed successfully"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransferRequest {
    member_name: Option<String>,
    from_account_type: Option<String>,
    to_account_type: Option<String>,
    amount: Option<Value>,
}

async fn transfer_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TransferRequest>,
) -> AppResult<Json<Value>> {
    let member_name = require(request.member_name, "memberName")?;
    let from_type = parse_account_type(&require(request.from_account_type, "fromAccountType")?)?;
    let to_type = parse_account_type(&require(request.to_account_type, "toAccountType")?)?;
    let amount = parse_decimal(&require(request.amount, "amount")?)?;

    state
        .ledger
        .transfer(&member_name, from_type, to_type, amount)
        .await?;
    Ok(ok_message("Transfer completed successfully"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendFundsRequest {
    sender_name: Option<String>,
    recipient_name: Option<String>,
    amount: Option<Value>,
}

async fn send_funds_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SendFundsRequest>,
) -> AppResult<Json<Value>> {
    let sender_name = require(request.sender_name, "senderName")?;
    let recipient_name = require(request.recipient_name, "recipientName")?;
    let amount = parse_decimal(&require(request.amount, "amount")?)?;

    state
        .ledger
        .send_funds(&sender_name, &recipient_name, amount)
        .await?;
    Ok(ok_message("Funds sent successfully"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoanRequest {
    member_name: Option<String>,
    amount: Option<Value>,
}

async fn loan_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoanRequest>,
) -> AppResult<Json<Value>> {
    let member_name = require(request.member_name, "memberName")?;
    let amount = parse_decimal(&require(request.amount, "amount")?)?;

    state.ledger.take_loan(&member_name, amount).await?;
    Ok(ok_message("Loan granted successfully"))
}

// =========================================================================
// Time travel endpoints
// =========================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SimulateTimeTravelRequest {
    user_name: Option<String>,
    days: Option<Value>,
}

async fn simulate_time_travel_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SimulateTimeTravelRequest>,
) -> AppResult<Json<Value>> {
    let user_name = require(request.user_name, "userName")?;
    let days = parse_count(&require(request.days, "days")?, "days")?;

    state.time_travel.simulate(&user_name, days).await?;
    Ok(ok_message(&format!(
        "Simulated {} days for {}",
        days, user_name
    )))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimeTravelProfileRequest {
    member_name: Option<String>,
}

async fn time_travel_profile_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TimeTravelProfileRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let member_name = require(request.member_name, "memberName")?;
    let (profile, created) = state.time_travel.ensure_shadow_profile(&member_name).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(json!({ "success": true, "profile": profile }))))
}

// =========================================================================
// Profile endpoints
// =========================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateProfileRequest {
    member_name: Option<String>,
    teacher: Option<String>,
    class_period: Option<Value>,
}

fn parse_class_period(value: &Value) -> AppResult<i32> {
    let parsed = match value {
        Value::Number(number) => number.as_i64().and_then(|n| i32::try_from(n).ok()),
        Value::String(text) => text.parse::<i32>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| AppError::Validation("classPeriod must be a number".to_string()))
}

async fn create_profile_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateProfileRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let member_name = require(request.member_name, "memberName")?;
    let teacher = require(request.teacher, "teacher")?;
    let class_period = parse_class_period(&require(request.class_period, "classPeriod")?)?;

    let profile = StudentProfile::new(&member_name, &teacher, class_period);
    state.profiles.create(&profile).await?;

    state
        .presence
        .broadcast_all(WsEvent::StudentAdded {
            member_name: profile.member_name.clone(),
            teacher: profile.teacher.clone(),
            class_period: profile.class_period,
        })
        .await;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": "Profile created successfully" })),
    ))
}

async fn get_profile_handler(
    State(state): State<Arc<AppState>>,
    Path(member_name): Path<String>,
) -> AppResult<Json<StudentProfile>> {
    let profile = state.profiles.get(&member_name).await?;
    Ok(Json(profile))
}

async fn get_threads_handler(
    State(state): State<Arc<AppState>>,
    Path(member_name): Path<String>,
) -> AppResult<Json<Value>> {
    let threads = state.messaging.threads_for(&member_name).await?;
    Ok(Json(json!(threads)))
}

// =========================================================================
// Lesson management fan-out
// =========================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LessonManagementUpdateRequest {
    teacher_name: Option<String>,
    action: Option<String>,
    data: Option<Value>,
}

/// Pure fan-out glue: nothing is persisted here. Every listener gets a
/// refresh nudge; the teacher's dashboards get the detailed update.
async fn lesson_management_update_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LessonManagementUpdateRequest>,
) -> AppResult<Json<Value>> {
    let teacher_name = require(request.teacher_name, "teacherName")?;
    let action = require(request.action, "action")?;
    let data = request.data.unwrap_or(Value::Null);

    state.presence.broadcast_all(WsEvent::LessonManagementRefresh).await;

    let update = WsEvent::LessonManagementUpdate {
        teacher_name: teacher_name.clone(),
        action,
        data,
    };
    state
        .presence
        .send_to_group(&lesson_management_group(&teacher_name), update.clone())
        .await;
    state.presence.send_to(&teacher_name, update).await;

    Ok(ok_message("Lesson management update processed"))
}

// =========================================================================
// Health
// =========================================================================

async fn healthz_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
