//! Phone-verified customer registration: send a code, confirm it, then create the account

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::aggregates::{Customer, NewCustomer};
use crate::notify::Notifier;
use crate::otp::{generate_code, OtpState, OtpStore};
use crate::services::AccountService;
use crate::{EcommerceError, Result};

/// Wrong guesses allowed per code before it is revoked.
const MAX_OTP_FAILURES: u32 = 5;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum OtpRegistration {
    SendOtp { phone: String },
    VerifyOtp { phone: String, otp: String },
    #[serde(rename_all = "camelCase")]
    Register { phone: String, name: String, email: String, password: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RegistrationOutcome {
    Message { message: &'static str },
    Registered { message: &'static str, customer: Customer },
}

pub struct RegistrationService {
    otps: Arc<dyn OtpStore>,
    notifier: Arc<dyn Notifier>,
    accounts: Arc<AccountService>,
}

impl RegistrationService {
    pub fn new(otps: Arc<dyn OtpStore>, notifier: Arc<dyn Notifier>, accounts: Arc<AccountService>) -> Self {
        Self { otps, notifier, accounts }
    }

    pub async fn handle(&self, step: OtpRegistration) -> Result<RegistrationOutcome> {
        match step {
            OtpRegistration::SendOtp { phone } => {
                let phone = required_phone(&phone)?;
                let code = generate_code();
                self.otps.put(phone, OtpState::sent(code.clone())).await;
                self.notifier
                    .send_sms(phone, &format!("Hello! Your verification code is {code}."))
                    .await
                    .map_err(|e| EcommerceError::Internal(e.to_string()))?;
                tracing::info!(%phone, "verification code sent");
                Ok(RegistrationOutcome::Message { message: "OTP sent" })
            }
            OtpRegistration::VerifyOtp { phone, otp } => {
                let phone = required_phone(&phone)?;
                match self.otps.get(phone).await {
                    Some(OtpState::Sent { code, .. }) if code == otp.trim() => {
                        self.otps.put(phone, OtpState::Verified).await;
                        Ok(RegistrationOutcome::Message { message: "OTP verified" })
                    }
                    Some(OtpState::Sent { code, failures }) => {
                        let failures = failures + 1;
                        if failures >= MAX_OTP_FAILURES {
                            tracing::warn!(%phone, failures, "too many wrong verification codes, code revoked");
                            self.otps.remove(phone).await;
                        } else {
                            tracing::warn!(%phone, failures, "verification code mismatch");
                            self.otps.replace(phone, OtpState::Sent { code, failures }).await;
                        }
                        Err(EcommerceError::Validation("Invalid OTP".into()))
                    }
                    _ => {
                        tracing::warn!(%phone, "verification attempted without a pending code");
                        Err(EcommerceError::Validation("Invalid OTP".into()))
                    }
                }
            }
            OtpRegistration::Register { phone, name, email, password } => {
                let phone = required_phone(&phone)?.to_string();
                if self.otps.get(&phone).await != Some(OtpState::Verified) {
                    return Err(EcommerceError::Unauthorized("OTP not verified".into()));
                }
                let new = NewCustomer { name, email, phone: phone.clone(), password };
                let customer = self.accounts.register_customer(new).await?;
                self.otps.remove(&phone).await;
                Ok(RegistrationOutcome::Registered { message: "Registration successful", customer })
            }
        }
    }
}

fn required_phone(phone: &str) -> Result<&str> {
    let phone = phone.trim();
    if phone.is_empty() { return Err(EcommerceError::Validation("Phone number is required".into())); }
    Ok(phone)
}
