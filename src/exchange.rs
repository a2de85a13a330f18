use serde::{Deserialize, Serialize};

use crate::balance::BalanceSheet;
use crate::error::SettlementError;
use crate::money::{Money, EPSILON};
use crate::schemas::MemberId;

/// A suggested transfer: `from` should pay `amount` to `to`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settlement {
    pub from: MemberId,
    pub to: MemberId,
    pub amount: Money,
}

#[derive(Clone, Debug)]
struct PersonalBalance {
    id: MemberId,
    remaining: Money,
}

// Largest first; equal amounts fall back to member id so output is stable.
fn sort_largest_first(people: &mut [PersonalBalance]) {
    people.sort_by(|a, b| b.remaining.cmp(&a.remaining).then_with(|| a.id.cmp(&b.id)));
}

/// Turns net balances into transfers that bring every member to zero.
///
/// Greedy largest-first matching: the biggest debtor pays the biggest
/// creditor as much as either can absorb, and whoever reaches zero is
/// dropped. This keeps the transfer count low in practice but is not
/// guaranteed to be the global minimum, which is a subset-partition problem.
///
/// Members within one cent of zero take no part. Debt or credit left
/// unmatched once either side runs out is tolerated up to one cent per
/// member; more than that means the balances did not come from a consistent
/// expense set and is reported as [`SettlementError::ConservationViolation`].
pub fn settle(balances: &BalanceSheet) -> Result<Vec<Settlement>, SettlementError> {
    settle_with_unpaid(balances, Money::ZERO)
}

/// Like [`settle`], for sheets that include expenses recorded without a
/// payer. Their total, `unpaid`, is owed by the split members to nobody and
/// is expected to remain as unmatched debt.
pub fn settle_with_unpaid(
    balances: &BalanceSheet,
    unpaid: Money,
) -> Result<Vec<Settlement>, SettlementError> {
    let mut debtors = Vec::new();
    let mut creditors = Vec::new();

    for (id, balance) in balances {
        if balance.net < -EPSILON {
            debtors.push(PersonalBalance {
                id: id.clone(),
                remaining: balance.net.abs(),
            });
        } else if balance.net > EPSILON {
            creditors.push(PersonalBalance {
                id: id.clone(),
                remaining: balance.net,
            });
        }
    }

    sort_largest_first(&mut debtors);
    sort_largest_first(&mut creditors);

    let mut settlements = Vec::new();
    let (mut d, mut c) = (0, 0);

    while d < debtors.len() && c < creditors.len() {
        let debtor = &mut debtors[d];
        let creditor = &mut creditors[c];

        let amount = debtor.remaining.min(creditor.remaining);
        debtor.remaining -= amount;
        creditor.remaining -= amount;
        settlements.push(Settlement {
            from: debtor.id.clone(),
            to: creditor.id.clone(),
            amount,
        });

        if debtor.remaining < EPSILON {
            d += 1;
        }
        if creditor.remaining < EPSILON {
            c += 1;
        }
    }

    let unmatched_debt: Money = debtors[d..].iter().map(|p| p.remaining).sum();
    let unmatched_credit: Money = creditors[c..].iter().map(|p| p.remaining).sum();
    let tolerance = Money::from_cents(EPSILON.cents() * balances.len() as i64);

    let residue = unmatched_debt - unmatched_credit - unpaid;

    if residue.abs() > tolerance {
        tracing::error!(
            ?balances,
            %unpaid,
            %unmatched_debt,
            %unmatched_credit,
            "settlement left balances unmatched"
        );
        return Err(SettlementError::ConservationViolation {
            unmatched_debt,
            unmatched_credit,
        });
    }
    if !residue.is_zero() {
        tracing::debug!(%residue, %unpaid, "rounding residue left unsettled");
    }

    Ok(settlements)
}
