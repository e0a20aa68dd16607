use crate::config::WITHDRAW_CURRENCY;
use serde::Serialize;

/// Body of `POST /api/withdraw`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WithdrawRequest {
    pub currency: String,
    pub amount: f64,
    pub to_address: String,
}

impl WithdrawRequest {
    pub fn new(amount: f64, to_address: impl Into<String>) -> Self {
        Self {
            currency: WITHDRAW_CURRENCY.into(),
            amount,
            to_address: to_address.into(),
        }
    }
}
