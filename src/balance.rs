use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::money::{Money, EPSILON};
use crate::schemas::{Expense, GroupId, MemberId, Payment};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Balance {
    pub paid: Money,
    pub owed: Money,
    pub net: Money,
}

impl Balance {
    pub fn is_settled(&self) -> bool {
        self.net.abs() <= EPSILON
    }
}

/// Per-member balances of one group. Members with no activity are absent.
pub type BalanceSheet = BTreeMap<MemberId, Balance>;

/// Folds a group's expenses into paid/owed/net per member.
///
/// Only additions are involved, so the result does not depend on the order
/// of `expenses`. Expenses that belong to another group are skipped.
pub fn compute_balances<'a, I>(group_id: &GroupId, expenses: I) -> BalanceSheet
where
    I: IntoIterator<Item = &'a Expense>,
{
    let mut balances = BalanceSheet::new();
    let mut folded = 0usize;

    for expense in expenses {
        if &expense.group_id != group_id {
            tracing::warn!(
                group_id = %group_id,
                expense_id = %expense.id,
                "skipping expense from another group"
            );
            continue;
        }
        folded += 1;

        match &expense.payment {
            Payment::NoPayer => {}
            Payment::SinglePayer(payer) => {
                balances.entry(payer.clone()).or_default().paid += expense.amount;
            }
            Payment::MultiPayer(payments) => {
                for payment in payments {
                    balances
                        .entry(payment.member_id.clone())
                        .or_default()
                        .paid += payment.amount;
                }
            }
        }

        for share in &expense.split {
            balances.entry(share.member_id.clone()).or_default().owed += share.amount;
        }
    }

    for balance in balances.values_mut() {
        balance.net = balance.paid - balance.owed;
    }

    tracing::debug!(
        group_id = %group_id,
        expenses = folded,
        members = balances.len(),
        "computed group balances"
    );
    balances
}

/// Total of the group's expenses recorded without a payer. That amount is
/// owed by the split members but credited to nobody.
pub fn unpaid_total<'a, I>(group_id: &GroupId, expenses: I) -> Money
where
    I: IntoIterator<Item = &'a Expense>,
{
    expenses
        .into_iter()
        .filter(|e| &e.group_id == group_id && e.payment == Payment::NoPayer)
        .map(|e| e.amount)
        .sum()
}
