//! Billing of MT messages.
//!
//! A route produces a [`Bill`] for the sending user, based on the route
//! rate and the user's quotas. Charging applies a bill to the quotas and
//! yields a [`QuotaDelta`] for whoever owns the user records.
//!
//! ```text
//! Route::get_bill_for(user) ──▶ Bill
//!   ├──▶ charge_submit_sm(user, bill, parts) ──▶ QuotaDelta
//!   └──▶ charge_submit_sm_resp(user, amount) ──▶ QuotaDelta
//! ```

mod bill;
mod charge;

pub use bill::{Bill, BillAction, BillAmount, BillError};
pub use charge::{charge_submit_sm, charge_submit_sm_resp, ChargeError, QuotaDelta};
