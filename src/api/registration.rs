//! Phone-verified registration, one step per request

use axum::{extract::State, Json};
use std::sync::Arc;

use super::ApiJson;
use crate::services::{OtpRegistration, RegistrationOutcome, RegistrationService};
use crate::Result;

pub async fn register(
    State(registration): State<Arc<RegistrationService>>,
    ApiJson(step): ApiJson<OtpRegistration>,
) -> Result<Json<RegistrationOutcome>> {
    Ok(Json(registration.handle(step).await?))
}
