//! Quota charging.
//!
//! Charging never mutates a user directly. It checks the quotas and returns
//! a [`QuotaDelta`] that the owner of the user records applies (and
//! persists, if it does).

use serde::Serialize;
use tracing::info;

use super::bill::{Bill, BillAction, BillAmount};
use crate::router::{MtQuotas, User};

/// Charging errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChargeError {
    #[error("user {user_id} has insufficient balance ({balance}) for {required}")]
    InsufficientBalance {
        user_id: String,
        balance: f64,
        required: f64,
    },

    #[error("user {user_id} has insufficient submit_sm_count ({count}) for {required}")]
    InsufficientSubmitSmCount {
        user_id: String,
        count: u64,
        required: u64,
    },
}

/// Quota changes produced by a charge.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QuotaDelta {
    pub user_id: String,
    /// Amount to subtract from the balance
    pub balance: f64,
    /// Count to subtract from submit_sm_count
    pub submit_sm_count: u64,
}

impl QuotaDelta {
    fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            ..Default::default()
        }
    }

    /// Whether applying this delta changes nothing.
    pub fn is_empty(&self) -> bool {
        self.balance == 0.0 && self.submit_sm_count == 0
    }
}

impl MtQuotas {
    /// Apply a charge. Unlimited quotas stay unlimited.
    pub fn apply(&mut self, delta: &QuotaDelta) {
        if let Some(balance) = self.balance.as_mut() {
            *balance -= delta.balance;
        }
        if let Some(count) = self.submit_sm_count.as_mut() {
            *count = count.saturating_sub(delta.submit_sm_count);
        }
    }
}

/// Charge `user` for submitting `parts` PDUs billed with `bill`.
///
/// Both quotas are checked before anything is charged.
pub fn charge_submit_sm(user: &User, bill: &Bill, parts: u32) -> Result<QuotaDelta, ChargeError> {
    let quotas = user.quotas();
    let mut delta = QuotaDelta::new(user.id());

    let amount = bill.amount(BillAmount::SubmitSm) * f64::from(parts);
    if let (true, Some(balance)) = (amount > 0.0, quotas.balance) {
        if balance < amount {
            info!(
                user_id = %user.id(),
                balance,
                required = amount,
                "insufficient balance for submit_sm charging"
            );
            return Err(ChargeError::InsufficientBalance {
                user_id: user.id().to_string(),
                balance,
                required: amount,
            });
        }
        delta.balance = amount;
    }

    let decrement = bill
        .action(BillAction::DecrementSubmitSmCount)
        .saturating_mul(u64::from(parts));
    if let (true, Some(count)) = (decrement > 0, quotas.submit_sm_count) {
        if count < decrement {
            info!(
                user_id = %user.id(),
                count,
                required = decrement,
                "insufficient submit_sm_count for submit_sm charging"
            );
            return Err(ChargeError::InsufficientSubmitSmCount {
                user_id: user.id().to_string(),
                count,
                required: decrement,
            });
        }
        delta.submit_sm_count = decrement;
    }

    if !delta.is_empty() {
        info!(
            user_id = %user.id(),
            balance = delta.balance,
            submit_sm_count = delta.submit_sm_count,
            "user charged for submit_sm"
        );
    }

    Ok(delta)
}

/// Charge the deferred submit_sm_resp amount.
pub fn charge_submit_sm_resp(user: &User, amount: f64) -> Result<QuotaDelta, ChargeError> {
    let mut delta = QuotaDelta::new(user.id());

    if let (true, Some(balance)) = (amount > 0.0, user.quotas().balance) {
        if balance < amount {
            return Err(ChargeError::InsufficientBalance {
                user_id: user.id().to_string(),
                balance,
                required: amount,
            });
        }
        delta.balance = amount;
        info!(user_id = %user.id(), amount, "user charged for submit_sm_resp");
    }

    Ok(delta)
}
