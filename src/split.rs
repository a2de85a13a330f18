use crate::error::ValidationError;
use crate::money::Money;
use crate::schemas::{ExpenseDraft, NormalizedExpense, Payment, Share, SplitEntry, SplitType};

const DEFAULT_CATEGORY: &str = "General";

/// Checks that an expense's payments and shares add up to its amount.
///
/// Equal splits are recomputed from the amount; the rounding remainder is
/// assigned to the last member in split order so the shares sum exactly.
/// Multi-payer expenses whose split entries carry no amounts are shared
/// equally the same way; otherwise their shares are checked like unequal ones.
/// Explicit shares and payments may be off by one cent; the difference is
/// moved onto the last entry that can absorb it, so whatever is returned
/// sums to the amount exactly.
#[derive(Clone, Copy, Debug, Default)]
pub struct SplitValidator;

impl SplitValidator {
    pub fn validate(&self, draft: ExpenseDraft) -> Result<NormalizedExpense, ValidationError> {
        if !draft.amount.is_positive() {
            return Err(ValidationError::NonPositiveAmount(draft.amount));
        }
        if draft.split_between.is_empty() {
            return Err(ValidationError::EmptySplit);
        }

        let split = match draft.split_type {
            SplitType::Equal => equal_shares(draft.amount, draft.split_between),
            SplitType::MultiPayer if draft.split_between.iter().all(|e| e.amount.is_none()) => {
                equal_shares(draft.amount, draft.split_between)
            }
            SplitType::Unequal | SplitType::MultiPayer => {
                let mut shares = explicit_shares(draft.split_between);
                check_shares(draft.amount, &mut shares)?;
                shares
            }
        };

        let payment = match draft.split_type {
            SplitType::MultiPayer => {
                let mut payments = draft.paid_by_multiple;
                check_payments(draft.amount, &mut payments)?;
                Payment::MultiPayer(payments)
            }
            SplitType::Equal | SplitType::Unequal => match draft.paid_by {
                Some(payer) => Payment::SinglePayer(payer),
                None => Payment::NoPayer,
            },
        };

        Ok(NormalizedExpense {
            description: draft.description,
            category: draft
                .category
                .filter(|category| !category.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            amount: draft.amount,
            split_type: draft.split_type,
            payment,
            split,
            date: draft.date,
        })
    }
}

fn equal_shares(amount: Money, entries: Vec<SplitEntry>) -> Vec<Share> {
    let amounts = amount.split_evenly(entries.len());
    entries
        .into_iter()
        .zip(amounts)
        .map(|(entry, amount)| Share {
            member_id: entry.member_id,
            amount,
        })
        .collect()
}

// Omitted amounts count as zero.
fn explicit_shares(entries: Vec<SplitEntry>) -> Vec<Share> {
    entries
        .into_iter()
        .map(|entry| Share {
            member_id: entry.member_id,
            amount: entry.amount.unwrap_or(Money::ZERO),
        })
        .collect()
}

fn ensure_non_negative(shares: &[Share]) -> Result<(), ValidationError> {
    match shares.iter().find(|share| share.amount.is_negative()) {
        Some(share) => Err(ValidationError::NegativeShare {
            member: share.member_id.clone(),
            amount: share.amount,
        }),
        None => Ok(()),
    }
}

fn check_shares(amount: Money, shares: &mut [Share]) -> Result<(), ValidationError> {
    ensure_non_negative(shares)?;
    let computed: Money = shares.iter().map(|share| share.amount).sum();
    if !computed.approx_eq(amount) {
        return Err(ValidationError::SplitSumMismatch {
            computed,
            expected: amount,
        });
    }
    absorb_gap(shares, amount - computed);
    Ok(())
}

fn check_payments(amount: Money, payments: &mut [Share]) -> Result<(), ValidationError> {
    ensure_non_negative(payments)?;
    let computed: Money = payments.iter().map(|payment| payment.amount).sum();
    if !computed.approx_eq(amount) {
        return Err(ValidationError::PaymentSumMismatch {
            computed,
            expected: amount,
        });
    }
    absorb_gap(payments, amount - computed);
    Ok(())
}

// Moves an accepted rounding gap onto the last share that stays
// non-negative, so stored shares sum to the amount exactly.
fn absorb_gap(shares: &mut [Share], gap: Money) {
    if gap.is_zero() {
        return;
    }
    if let Some(share) = shares
        .iter_mut()
        .rev()
        .find(|share| !(share.amount + gap).is_negative())
    {
        share.amount += gap;
    }
}
