use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::enums::wallet_transaction_types::WalletTransactionType;

/// The part of a ledger row that balance computation needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerAmount {
    pub amount_cents: i64,
    pub expires_at: Option<DateTime<Utc>>,
}

impl LedgerAmount {
    pub fn is_live_at(&self, as_of: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|expires_at| expires_at > as_of)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextExpiringCredits {
    pub expires_at: DateTime<Utc>,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WalletBalanceDto {
    pub user_id: Uuid,
    pub balance_cents: i64,
    pub as_of: DateTime<Utc>,
}

/// Request to append one row to the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct NewWalletTransaction {
    pub user_id: Uuid,
    pub transaction_type: WalletTransactionType,
    pub amount_cents: i64,
    pub expires_at: Option<DateTime<Utc>>,
    pub booking_id: Option<Uuid>,
    pub credit_pack_id: Option<Uuid>,
    pub external_payment_id: Option<String>,
    /// Instant the balance snapshot is taken at.
    pub as_of: DateTime<Utc>,
}

/// Balance at `as_of`: every amount whose expiry is unset or still in the future.
pub fn balance_at(entries: &[LedgerAmount], as_of: DateTime<Utc>) -> i64 {
    entries
        .iter()
        .filter(|entry| entry.is_live_at(as_of))
        .map(|entry| entry.amount_cents)
        .sum()
}

/// Earliest future expiry among positive live entries, with the total that shares it.
pub fn next_expiring_credits(
    entries: &[LedgerAmount],
    as_of: DateTime<Utc>,
) -> Option<NextExpiringCredits> {
    let expiring = entries.iter().filter_map(|entry| match entry.expires_at {
        Some(expires_at) if entry.amount_cents > 0 && expires_at > as_of => {
            Some((expires_at, entry.amount_cents))
        }
        _ => None,
    });

    let expires_at = expiring.clone().map(|(expires_at, _)| expires_at).min()?;
    let amount_cents = expiring
        .filter(|(candidate, _)| *candidate == expires_at)
        .map(|(_, amount)| amount)
        .sum();

    Some(NextExpiringCredits {
        expires_at,
        amount_cents,
    })
}

/// Splits a debit of `amount_cents` across the live credit lots, soonest
/// expiry first and non-expiring credit last. Each slice is negative and keeps
/// the expiry of the lot it draws from, so spent credit leaves the balance
/// together with its purchase. `None` when the live lots cannot cover it.
pub fn allocate_debit(
    entries: &[LedgerAmount],
    amount_cents: i64,
    as_of: DateTime<Utc>,
) -> Option<Vec<LedgerAmount>> {
    let mut lots: BTreeMap<(bool, Option<DateTime<Utc>>), i64> = BTreeMap::new();
    for entry in entries.iter().filter(|entry| entry.is_live_at(as_of)) {
        *lots
            .entry((entry.expires_at.is_none(), entry.expires_at))
            .or_insert(0) += entry.amount_cents;
    }

    let mut outstanding = amount_cents;
    let mut slices = Vec::new();
    for ((_, expires_at), available) in lots {
        if outstanding == 0 {
            break;
        }
        if available <= 0 {
            continue;
        }
        let taken = available.min(outstanding);
        slices.push(LedgerAmount {
            amount_cents: -taken,
            expires_at,
        });
        outstanding -= taken;
    }

    (outstanding == 0).then_some(slices)
}

/// Splits a refund of `amount_cents` over the payment slices it reverses,
/// each refund slice keeping the expiry of its payment. Any excess over what
/// was paid goes to the last slice, or to a non-expiring slice when there is
/// no payment to mirror.
pub fn mirror_refund(payments: &[LedgerAmount], amount_cents: i64) -> Vec<LedgerAmount> {
    let mut outstanding = amount_cents;
    let mut slices: Vec<LedgerAmount> = Vec::new();

    for payment in payments.iter().filter(|payment| payment.amount_cents < 0) {
        if outstanding == 0 {
            break;
        }
        let taken = (-payment.amount_cents).min(outstanding);
        slices.push(LedgerAmount {
            amount_cents: taken,
            expires_at: payment.expires_at,
        });
        outstanding -= taken;
    }

    if outstanding > 0 {
        match slices.last_mut() {
            Some(last) => last.amount_cents += outstanding,
            None => slices.push(LedgerAmount {
                amount_cents: outstanding,
                expires_at: None,
            }),
        }
    }

    slices
}
