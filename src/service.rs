//! Boundary between requests and the ledger engine.
//!
//! Checks that every member an expense references belongs to its group,
//! runs the split validator, and persists through the repositories. Writes
//! to one group are serialized by a per-group lock; balance reads share it.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::balance::{compute_balances, unpaid_total, Balance, BalanceSheet};
use crate::error::{ServiceError, ServiceResult};
use crate::exchange::{settle_with_unpaid, Settlement};
use crate::money::Money;
use crate::repository::Repositories;
use crate::schemas::{Expense, ExpenseDraft, ExpenseId, Group, GroupId, Member, MemberId};
use crate::split::SplitValidator;

const MAX_GROUP_NAME: usize = 100;
const MAX_MEMBER_NAME: usize = 50;

#[derive(Clone, Debug, Deserialize)]
pub struct GroupInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MemberInput {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    pub total_expenses: usize,
    pub total_amount: Money,
    pub member_count: usize,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDetails {
    #[serde(flatten)]
    pub group: Group,
    pub expenses: Vec<Expense>,
    pub balances: BalanceSheet,
    pub settlements: Vec<Settlement>,
    pub summary: GroupSummary,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberBalance {
    #[serde(flatten)]
    pub balance: Balance,
    pub member_name: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedSettlement {
    #[serde(flatten)]
    pub settlement: Settlement,
    pub from_name: String,
    pub to_name: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSummary {
    pub total_members: usize,
    pub total_settlements: usize,
    pub is_balanced: bool,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupBalances {
    pub balances: BTreeMap<MemberId, MemberBalance>,
    pub settlements: Vec<NamedSettlement>,
    pub summary: BalanceSummary,
}

pub struct SplitService {
    repos: Repositories,
    validator: SplitValidator,
    locks: Mutex<HashMap<GroupId, Arc<RwLock<()>>>>,
}

impl SplitService {
    pub fn new(repos: Repositories) -> Self {
        Self {
            repos,
            validator: SplitValidator,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// The lock for `id`. Entries nobody holds are pruned on every call, so
    /// the table only tracks groups with requests in flight.
    fn group_lock(&self, id: &GroupId) -> Arc<RwLock<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(id.clone()).or_default().clone()
    }

    fn forget_lock(&self, id: &GroupId) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.remove(id);
    }

    async fn load_group(&self, id: &GroupId) -> ServiceResult<Group> {
        self.repos
            .groups
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Group", id))
    }

    async fn load_expense(&self, id: &ExpenseId) -> ServiceResult<Expense> {
        self.repos
            .expenses
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Expense", id))
    }

    // Groups

    pub async fn create_group(&self, input: GroupInput) -> ServiceResult<Group> {
        let name = group_name(&input.name)?;
        let description = input.description.unwrap_or_default().trim().to_string();
        let group = Group::new(name, description);
        self.repos.groups.save(&group).await?;
        info!(group_id = %group.id, "group created");
        Ok(group)
    }

    pub async fn list_groups(&self) -> ServiceResult<Vec<Group>> {
        Ok(self.repos.groups.find_all().await?)
    }

    pub async fn get_group(&self, id: &GroupId) -> ServiceResult<GroupDetails> {
        let lock = self.group_lock(id);
        let _read = lock.read().await;

        let group = self.load_group(id).await?;
        let expenses = self.repos.expenses.find_by_group(id).await?;
        let balances = compute_balances(id, &expenses);
        let settlements = settle_with_unpaid(&balances, unpaid_total(id, &expenses))?;

        let summary = GroupSummary {
            total_expenses: expenses.len(),
            total_amount: expenses.iter().map(|e| e.amount).sum(),
            member_count: group.members.len(),
        };
        Ok(GroupDetails {
            group,
            expenses,
            balances,
            settlements,
            summary,
        })
    }

    pub async fn update_group(&self, id: &GroupId, input: GroupInput) -> ServiceResult<Group> {
        let name = group_name(&input.name)?;
        let lock = self.group_lock(id);
        let _write = lock.write().await;

        let mut group = self.load_group(id).await?;
        group.name = name;
        if let Some(description) = input.description {
            group.description = description.trim().to_string();
        }
        group.updated_at = Utc::now();
        self.repos.groups.save(&group).await?;
        Ok(group)
    }

    /// Deletes the group together with all of its expenses.
    pub async fn delete_group(&self, id: &GroupId) -> ServiceResult<()> {
        let lock = self.group_lock(id);
        let _write = lock.write().await;

        if !self.repos.groups.delete(id).await? {
            return Err(ServiceError::not_found("Group", id));
        }
        let removed = self.repos.expenses.delete_by_group(id).await?;
        self.forget_lock(id);
        info!(group_id = %id, expenses = removed, "group deleted");
        Ok(())
    }

    // Members

    pub async fn add_member(&self, group_id: &GroupId, input: MemberInput) -> ServiceResult<Member> {
        let name = member_name(&input.name)?;
        let email = member_email(input.email)?;

        let lock = self.group_lock(group_id);
        let _write = lock.write().await;

        let mut group = self.load_group(group_id).await?;
        let lowered = name.to_lowercase();
        if group.members.iter().any(|m| m.name.to_lowercase() == lowered) {
            return Err(ServiceError::Conflict {
                field: "name",
                message: "A member with this name already exists in the group".into(),
            });
        }

        let member = Member {
            id: MemberId::generate(),
            name,
            email,
            joined_at: Utc::now(),
        };
        group.members.push(member.clone());
        group.updated_at = Utc::now();
        self.repos.groups.save(&group).await?;
        info!(group_id = %group_id, member_id = %member.id, "member added");
        Ok(member)
    }

    /// Members referenced by any expense of the group cannot be removed.
    pub async fn remove_member(&self, group_id: &GroupId, member_id: &MemberId) -> ServiceResult<()> {
        let lock = self.group_lock(group_id);
        let _write = lock.write().await;

        let mut group = self.load_group(group_id).await?;
        if !group.has_member(member_id) {
            return Err(ServiceError::not_found("Member", member_id));
        }
        let expenses = self.repos.expenses.find_by_group(group_id).await?;
        if expenses.iter().any(|e| e.involves(member_id)) {
            warn!(group_id = %group_id, member_id = %member_id, "member still has expenses");
            return Err(ServiceError::MemberHasExpenses);
        }

        group.members.retain(|m| &m.id != member_id);
        group.updated_at = Utc::now();
        self.repos.groups.save(&group).await?;
        info!(group_id = %group_id, member_id = %member_id, "member removed");
        Ok(())
    }

    // Expenses

    pub async fn create_expense(&self, group_id: &GroupId, draft: ExpenseDraft) -> ServiceResult<Expense> {
        let lock = self.group_lock(group_id);
        let _write = lock.write().await;

        let group = self.load_group(group_id).await?;
        let draft = resolve_members(&group, draft)?;
        let normalized = self.validator.validate(draft).map_err(|err| {
            warn!(group_id = %group_id, error = %err, "expense rejected");
            err
        })?;

        let expense = Expense::new(group_id.clone(), normalized);
        self.repos.expenses.save(&expense).await?;
        info!(group_id = %group_id, expense_id = %expense.id, amount = %expense.amount, "expense created");
        Ok(expense)
    }

    /// Replaces an expense's content; the draft is validated from scratch.
    pub async fn update_expense(&self, id: &ExpenseId, draft: ExpenseDraft) -> ServiceResult<Expense> {
        let group_id = self.load_expense(id).await?.group_id;
        let lock = self.group_lock(&group_id);
        let _write = lock.write().await;

        let mut expense = self.load_expense(id).await?;
        let group = self.load_group(&group_id).await?;
        let draft = resolve_members(&group, draft)?;
        let normalized = self.validator.validate(draft).map_err(|err| {
            warn!(expense_id = %id, error = %err, "expense update rejected");
            err
        })?;

        expense.apply(normalized);
        self.repos.expenses.save(&expense).await?;
        info!(group_id = %group_id, expense_id = %id, "expense updated");
        Ok(expense)
    }

    pub async fn get_expense(&self, id: &ExpenseId) -> ServiceResult<Expense> {
        self.load_expense(id).await
    }

    pub async fn list_expenses(&self, group_id: Option<&GroupId>) -> ServiceResult<Vec<Expense>> {
        let expenses = match group_id {
            Some(group_id) => self.repos.expenses.find_by_group(group_id).await?,
            None => self.repos.expenses.find_all().await?,
        };
        Ok(expenses)
    }

    pub async fn delete_expense(&self, id: &ExpenseId) -> ServiceResult<()> {
        let group_id = self.load_expense(id).await?.group_id;
        let lock = self.group_lock(&group_id);
        let _write = lock.write().await;

        if !self.repos.expenses.delete(id).await? {
            return Err(ServiceError::not_found("Expense", id));
        }
        info!(group_id = %group_id, expense_id = %id, "expense deleted");
        Ok(())
    }

    // Balances

    pub async fn group_balances(&self, group_id: &GroupId) -> ServiceResult<GroupBalances> {
        let lock = self.group_lock(group_id);
        let _read = lock.read().await;

        let group = self.load_group(group_id).await?;
        let expenses = self.repos.expenses.find_by_group(group_id).await?;
        let balances = compute_balances(group_id, &expenses);
        let settlements = settle_with_unpaid(&balances, unpaid_total(group_id, &expenses))?;
        debug!(group_id = %group_id, settlements = settlements.len(), "settlements computed");

        let balances: BTreeMap<_, _> = balances
            .into_iter()
            .map(|(id, balance)| {
                let member_name = group.member_name(&id).to_string();
                (id, MemberBalance { balance, member_name })
            })
            .collect();
        let settlements: Vec<_> = settlements
            .into_iter()
            .map(|settlement| NamedSettlement {
                from_name: group.member_name(&settlement.from).to_string(),
                to_name: group.member_name(&settlement.to).to_string(),
                settlement,
            })
            .collect();

        let summary = BalanceSummary {
            total_members: balances.len(),
            total_settlements: settlements.len(),
            is_balanced: settlements.is_empty(),
        };
        Ok(GroupBalances {
            balances,
            settlements,
            summary,
        })
    }
}

fn group_name(raw: &str) -> ServiceResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ServiceError::invalid(
            "name",
            "Group name is required and must be a non-empty string",
        ));
    }
    if name.chars().count() > MAX_GROUP_NAME {
        return Err(ServiceError::invalid(
            "name",
            "Group name must be less than 100 characters",
        ));
    }
    Ok(name.to_string())
}

fn member_name(raw: &str) -> ServiceResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ServiceError::invalid(
            "name",
            "Member name is required and must be a non-empty string",
        ));
    }
    if name.chars().count() > MAX_MEMBER_NAME {
        return Err(ServiceError::invalid(
            "name",
            "Member name must be less than 50 characters",
        ));
    }
    Ok(name.to_string())
}

fn member_email(raw: Option<String>) -> ServiceResult<Option<String>> {
    let email = match raw.as_deref().map(str::trim) {
        None | Some("") => return Ok(None),
        Some(email) => email.to_lowercase(),
    };
    let well_formed = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.split('.').count() >= 2
                && domain.split('.').all(|part| !part.is_empty())
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if !well_formed {
        return Err(ServiceError::invalid("email", "Invalid email format"));
    }
    Ok(Some(email))
}

/// Maps every payer and split member to a member id of `group`, accepting
/// ids or email addresses.
fn resolve_members(group: &Group, mut draft: ExpenseDraft) -> ServiceResult<ExpenseDraft> {
    if draft.description.trim().is_empty() {
        return Err(ServiceError::invalid(
            "description",
            "Description is required and must be a non-empty string",
        ));
    }
    draft.description = draft.description.trim().to_string();

    if let Some(payer) = draft.paid_by.take() {
        let member = group
            .member_by_id_or_email(payer.as_str())
            .ok_or_else(|| ServiceError::UnknownMembers {
                field: "paidBy",
                members: vec![payer.to_string()],
            })?;
        draft.paid_by = Some(member.id.clone());
    }

    let mut unknown = Vec::new();
    for payment in &mut draft.paid_by_multiple {
        match group.member_by_id_or_email(payment.member_id.as_str()) {
            Some(member) => payment.member_id = member.id.clone(),
            None => unknown.push(payment.member_id.to_string()),
        }
    }
    if !unknown.is_empty() {
        return Err(ServiceError::UnknownMembers {
            field: "paidByMultiple",
            members: unknown,
        });
    }

    for entry in &mut draft.split_between {
        match group.member_by_id_or_email(entry.member_id.as_str()) {
            Some(member) => entry.member_id = member.id.clone(),
            None => unknown.push(entry.member_id.to_string()),
        }
    }
    if !unknown.is_empty() {
        return Err(ServiceError::UnknownMembers {
            field: "splitBetween",
            members: unknown,
        });
    }

    Ok(draft)
}
