//! Message senders and their MT quotas.

use serde::{Deserialize, Serialize};

/// MT messaging quotas of a user.
///
/// `None` means unlimited for every quota.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MtQuotas {
    /// Remaining balance in the billing currency
    pub balance: Option<f64>,
    /// Share of the route rate charged on submit_sm (the rest on submit_sm_resp)
    pub early_decrement_balance_percent: Option<f64>,
    /// Remaining number of submit_sm PDUs
    pub submit_sm_count: Option<u64>,
}

impl MtQuotas {
    /// Quotas with every limit unset.
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn with_balance(mut self, balance: f64) -> Self {
        self.balance = Some(balance);
        self
    }

    pub fn with_early_decrement_percent(mut self, percent: f64) -> Self {
        self.early_decrement_balance_percent = Some(percent);
        self
    }

    pub fn with_submit_sm_count(mut self, count: u64) -> Self {
        self.submit_sm_count = Some(count);
        self
    }
}

/// An authenticated message sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    id: String,
    group_id: String,
    #[serde(default)]
    quotas: MtQuotas,
}

impl User {
    pub fn new(id: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            group_id: group_id.into(),
            quotas: MtQuotas::default(),
        }
    }

    pub fn with_quotas(mut self, quotas: MtQuotas) -> Self {
        self.quotas = quotas;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn quotas(&self) -> &MtQuotas {
        &self.quotas
    }

    pub fn quotas_mut(&mut self) -> &mut MtQuotas {
        &mut self.quotas
    }
}
