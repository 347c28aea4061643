//! Per-send bills.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::router::MtQuotas;

/// Bill errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BillError {
    #[error("{0} is not a valid bill key")]
    InvalidKey(String),
}

/// Billable amount, by charging phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BillAmount {
    /// Charged when the message is submitted
    SubmitSm,
    /// Charged when the SMSC acknowledges the submission
    SubmitSmResp,
}

impl BillAmount {
    pub const ALL: [BillAmount; 2] = [BillAmount::SubmitSm, BillAmount::SubmitSmResp];

    pub fn as_str(&self) -> &'static str {
        match self {
            BillAmount::SubmitSm => "submit_sm",
            BillAmount::SubmitSmResp => "submit_sm_resp",
        }
    }
}

impl FromStr for BillAmount {
    type Err = BillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submit_sm" => Ok(BillAmount::SubmitSm),
            "submit_sm_resp" => Ok(BillAmount::SubmitSmResp),
            other => Err(BillError::InvalidKey(other.to_string())),
        }
    }
}

/// Billable action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BillAction {
    DecrementSubmitSmCount,
}

impl BillAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillAction::DecrementSubmitSmCount => "decrement_submit_sm_count",
        }
    }
}

impl FromStr for BillAction {
    type Err = BillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "decrement_submit_sm_count" => Ok(BillAction::DecrementSubmitSmCount),
            other => Err(BillError::InvalidKey(other.to_string())),
        }
    }
}

/// What a user pays for sending one MT message part.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Bill {
    submit_sm: f64,
    submit_sm_resp: f64,
    decrement_submit_sm_count: u64,
}

impl Bill {
    /// Empty bill.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bill a route rate against a user's quotas.
    ///
    /// A rated route charges only users with a limited balance: the early
    /// decrement share (if any) on submit_sm and the rest on submit_sm_resp,
    /// otherwise the full rate on submit_sm. A limited submit_sm_count adds
    /// a decrement of one, whatever the rate.
    pub fn for_rate(rate: f64, quotas: &MtQuotas) -> Self {
        let mut bill = Self::new();

        if rate > 0.0 && quotas.balance.is_some() {
            match quotas.early_decrement_balance_percent {
                Some(percent) => {
                    bill.submit_sm = rate * percent / 100.0;
                    bill.submit_sm_resp = rate - bill.submit_sm;
                }
                None => {
                    bill.submit_sm = rate;
                    bill.submit_sm_resp = 0.0;
                }
            }
        }

        if quotas.submit_sm_count.is_some() {
            bill.decrement_submit_sm_count = 1;
        }

        bill
    }

    pub fn amount(&self, key: BillAmount) -> f64 {
        match key {
            BillAmount::SubmitSm => self.submit_sm,
            BillAmount::SubmitSmResp => self.submit_sm_resp,
        }
    }

    /// Amount lookup by wire name.
    pub fn amount_by_name(&self, key: &str) -> Result<f64, BillError> {
        Ok(self.amount(key.parse()?))
    }

    pub fn set_amount(&mut self, key: BillAmount, amount: f64) {
        match key {
            BillAmount::SubmitSm => self.submit_sm = amount,
            BillAmount::SubmitSmResp => self.submit_sm_resp = amount,
        }
    }

    /// Sum of all amounts.
    pub fn total_amount(&self) -> f64 {
        BillAmount::ALL.iter().map(|k| self.amount(*k)).sum()
    }

    pub fn action(&self, key: BillAction) -> u64 {
        match key {
            BillAction::DecrementSubmitSmCount => self.decrement_submit_sm_count,
        }
    }

    /// Action lookup by wire name.
    pub fn action_by_name(&self, key: &str) -> Result<u64, BillError> {
        Ok(self.action(key.parse()?))
    }

    pub fn set_action(&mut self, key: BillAction, value: u64) {
        match key {
            BillAction::DecrementSubmitSmCount => self.decrement_submit_sm_count = value,
        }
    }
}

impl fmt::Display for Bill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "submit_sm={:.2} submit_sm_resp={:.2} decrement_submit_sm_count={}",
            self.submit_sm, self.submit_sm_resp, self.decrement_submit_sm_count
        )
    }
}
