use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::Money;

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// A fresh random (v4) identifier.
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(GroupId);
string_id!(MemberId);
string_id!(ExpenseId);

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: MemberId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub joined_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub members: Vec<Member>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Group {
    pub fn new(name: String, description: String) -> Self {
        let now = Utc::now();
        Self {
            id: GroupId::generate(),
            name,
            description,
            members: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    pub fn member(&self, id: &MemberId) -> Option<&Member> {
        self.members.iter().find(|member| &member.id == id)
    }

    pub fn has_member(&self, id: &MemberId) -> bool {
        self.member(id).is_some()
    }

    /// Payers may be referenced by id or by email address.
    pub fn member_by_id_or_email(&self, identifier: &str) -> Option<&Member> {
        self.members.iter().find(|member| {
            member.id.as_str() == identifier || member.email.as_deref() == Some(identifier)
        })
    }

    pub fn member_name(&self, id: &MemberId) -> &str {
        self.member(id).map_or("Unknown", |member| member.name.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SplitType {
    Equal,
    Unequal,
    MultiPayer,
}

/// One member's part of an expense, either what they owe or what they paid.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Share {
    pub member_id: MemberId,
    pub amount: Money,
}

impl Share {
    pub fn new(member_id: impl Into<MemberId>, amount: Money) -> Self {
        Self {
            member_id: member_id.into(),
            amount,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", content = "payers", rename_all = "kebab-case")]
pub enum Payment {
    NoPayer,
    SinglePayer(MemberId),
    MultiPayer(Vec<Share>),
}

impl Payment {
    pub fn involves(&self, member: &MemberId) -> bool {
        match self {
            Payment::NoPayer => false,
            Payment::SinglePayer(payer) => payer == member,
            Payment::MultiPayer(payments) => payments.iter().any(|p| &p.member_id == member),
        }
    }
}

/// A split recipient as submitted; the amount may be omitted when it is
/// derived from an equal split.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitEntry {
    pub member_id: MemberId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Money>,
}

impl SplitEntry {
    pub fn new(member_id: impl Into<MemberId>, amount: Option<Money>) -> Self {
        Self {
            member_id: member_id.into(),
            amount,
        }
    }
}

/// Expense as submitted by a client, before monetary validation.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseDraft {
    pub description: String,
    pub amount: Money,
    #[serde(default)]
    pub category: Option<String>,
    pub split_type: SplitType,
    #[serde(default)]
    pub paid_by: Option<MemberId>,
    #[serde(default)]
    pub paid_by_multiple: Vec<Share>,
    pub split_between: Vec<SplitEntry>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

/// A draft whose shares are consistent with its amount and whose payer
/// fields have been folded into a single [`Payment`].
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedExpense {
    pub description: String,
    pub category: String,
    pub amount: Money,
    pub split_type: SplitType,
    pub payment: Payment,
    pub split: Vec<Share>,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: ExpenseId,
    pub group_id: GroupId,
    pub description: String,
    pub category: String,
    pub amount: Money,
    pub split_type: SplitType,
    pub payment: Payment,
    pub split: Vec<Share>,
    pub date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Expense {
    pub fn new(group_id: GroupId, normalized: NormalizedExpense) -> Self {
        let now = Utc::now();
        Self {
            id: ExpenseId::generate(),
            group_id,
            description: normalized.description,
            category: normalized.category,
            amount: normalized.amount,
            split_type: normalized.split_type,
            payment: normalized.payment,
            split: normalized.split,
            date: normalized.date.unwrap_or(now),
            created_at: now,
            updated_at: now,
        }
    }

    /// Replaces the monetary content, keeping identity and creation time.
    pub fn apply(&mut self, normalized: NormalizedExpense) {
        self.description = normalized.description;
        self.category = normalized.category;
        self.amount = normalized.amount;
        self.split_type = normalized.split_type;
        self.payment = normalized.payment;
        self.split = normalized.split;
        if let Some(date) = normalized.date {
            self.date = date;
        }
        self.updated_at = Utc::now();
    }

    pub fn involves(&self, member: &MemberId) -> bool {
        self.payment.involves(member) || self.split.iter().any(|s| &s.member_id == member)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_deserializes_from_client_json() {
        let draft: ExpenseDraft = serde_json::from_str(
            r#"{
                "description": "Dinner",
                "amount": 90,
                "splitType": "equal",
                "paidBy": "a",
                "splitBetween": [{"memberId": "a"}, {"memberId": "b"}, {"memberId": "c"}]
            }"#,
        )
        .unwrap();

        assert_eq!(draft.split_type, SplitType::Equal);
        assert_eq!(draft.amount, Money::from_cents(9000));
        assert_eq!(draft.paid_by, Some(MemberId::from("a")));
        assert!(draft.paid_by_multiple.is_empty());
        assert_eq!(draft.split_between[2].amount, None);
    }

    #[test]
    fn split_type_uses_kebab_case() {
        let json = serde_json::to_string(&SplitType::MultiPayer).unwrap();
        assert_eq!(json, "\"multi-payer\"");
    }

    #[test]
    fn member_lookup_by_email() {
        let mut group = Group::new("Trip".into(), String::new());
        group.members.push(Member {
            id: MemberId::from("m1"),
            name: "Ana".into(),
            email: Some("ana@example.com".into()),
            joined_at: Utc::now(),
        });

        assert_eq!(
            group.member_by_id_or_email("ana@example.com").map(|m| &m.id),
            Some(&MemberId::from("m1"))
        );
        assert_eq!(group.member_name(&MemberId::from("nobody")), "Unknown");
    }
}
