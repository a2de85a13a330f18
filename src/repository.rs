//! Storage capabilities used by the service layer.
//!
//! The ledger engine never touches storage; the service loads a group's
//! expense snapshot through these traits and hands it to the engine.

use async_trait::async_trait;
use bson::doc;
use futures::TryStreamExt;
use mongodb::options::ReplaceOptions;
use mongodb::{Client, Collection, Database};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::StorageError;
use crate::schemas::{Expense, ExpenseId, Group, GroupId};

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait GroupRepository: Send + Sync {
    async fn find_all(&self) -> StorageResult<Vec<Group>>;
    async fn find_by_id(&self, id: &GroupId) -> StorageResult<Option<Group>>;
    /// Inserts or replaces the group with the same id.
    async fn save(&self, group: &Group) -> StorageResult<()>;
    /// Returns whether a group was removed.
    async fn delete(&self, id: &GroupId) -> StorageResult<bool>;
}

#[async_trait]
pub trait ExpenseRepository: Send + Sync {
    async fn find_all(&self) -> StorageResult<Vec<Expense>>;
    async fn find_by_group(&self, group_id: &GroupId) -> StorageResult<Vec<Expense>>;
    async fn find_by_id(&self, id: &ExpenseId) -> StorageResult<Option<Expense>>;
    /// Inserts or replaces the expense with the same id.
    async fn save(&self, expense: &Expense) -> StorageResult<()>;
    /// Returns whether an expense was removed.
    async fn delete(&self, id: &ExpenseId) -> StorageResult<bool>;
    /// Returns the number of expenses removed.
    async fn delete_by_group(&self, group_id: &GroupId) -> StorageResult<u64>;
}

#[derive(Default)]
struct Tables {
    groups: Vec<Group>,
    expenses: Vec<Expense>,
}

/// Process-local store, kept in insertion order.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GroupRepository for InMemoryStore {
    async fn find_all(&self) -> StorageResult<Vec<Group>> {
        Ok(self.tables.read().await.groups.clone())
    }

    async fn find_by_id(&self, id: &GroupId) -> StorageResult<Option<Group>> {
        let tables = self.tables.read().await;
        Ok(tables.groups.iter().find(|g| &g.id == id).cloned())
    }

    async fn save(&self, group: &Group) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        match tables.groups.iter().position(|g| g.id == group.id) {
            Some(index) => tables.groups[index] = group.clone(),
            None => tables.groups.push(group.clone()),
        }
        Ok(())
    }

    async fn delete(&self, id: &GroupId) -> StorageResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.groups.len();
        tables.groups.retain(|g| &g.id != id);
        Ok(tables.groups.len() != before)
    }
}

#[async_trait]
impl ExpenseRepository for InMemoryStore {
    async fn find_all(&self) -> StorageResult<Vec<Expense>> {
        Ok(self.tables.read().await.expenses.clone())
    }

    async fn find_by_group(&self, group_id: &GroupId) -> StorageResult<Vec<Expense>> {
        let tables = self.tables.read().await;
        Ok(tables
            .expenses
            .iter()
            .filter(|e| &e.group_id == group_id)
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: &ExpenseId) -> StorageResult<Option<Expense>> {
        let tables = self.tables.read().await;
        Ok(tables.expenses.iter().find(|e| &e.id == id).cloned())
    }

    async fn save(&self, expense: &Expense) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        match tables.expenses.iter().position(|e| e.id == expense.id) {
            Some(index) => tables.expenses[index] = expense.clone(),
            None => tables.expenses.push(expense.clone()),
        }
        Ok(())
    }

    async fn delete(&self, id: &ExpenseId) -> StorageResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.expenses.len();
        tables.expenses.retain(|e| &e.id != id);
        Ok(tables.expenses.len() != before)
    }

    async fn delete_by_group(&self, group_id: &GroupId) -> StorageResult<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.expenses.len();
        tables.expenses.retain(|e| &e.group_id != group_id);
        Ok((before - tables.expenses.len()) as u64)
    }
}

/// MongoDB-backed store: one collection for groups, one for expenses,
/// documents keyed by their `id` field.
#[derive(Clone)]
pub struct MongoStore {
    groups: Collection<Group>,
    expenses: Collection<Expense>,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> StorageResult<Self> {
        let client = Client::with_uri_str(uri).await?;
        Ok(Self::from_database(client.database(database)))
    }

    pub fn from_database(db: Database) -> Self {
        Self {
            groups: db.collection::<Group>("groups"),
            expenses: db.collection::<Expense>("expenses"),
        }
    }

    fn upsert() -> ReplaceOptions {
        ReplaceOptions::builder().upsert(true).build()
    }
}

#[async_trait]
impl GroupRepository for MongoStore {
    async fn find_all(&self) -> StorageResult<Vec<Group>> {
        let cursor = self.groups.find(None, None).await?;
        Ok(cursor.try_collect::<Vec<_>>().await?)
    }

    async fn find_by_id(&self, id: &GroupId) -> StorageResult<Option<Group>> {
        Ok(self.groups.find_one(doc! { "id": id.as_str() }, None).await?)
    }

    async fn save(&self, group: &Group) -> StorageResult<()> {
        self.groups
            .replace_one(doc! { "id": group.id.as_str() }, group, Self::upsert())
            .await?;
        Ok(())
    }

    async fn delete(&self, id: &GroupId) -> StorageResult<bool> {
        let result = self.groups.delete_one(doc! { "id": id.as_str() }, None).await?;
        Ok(result.deleted_count > 0)
    }
}

#[async_trait]
impl ExpenseRepository for MongoStore {
    async fn find_all(&self) -> StorageResult<Vec<Expense>> {
        let cursor = self.expenses.find(None, None).await?;
        Ok(cursor.try_collect::<Vec<_>>().await?)
    }

    async fn find_by_group(&self, group_id: &GroupId) -> StorageResult<Vec<Expense>> {
        let cursor = self
            .expenses
            .find(doc! { "groupId": group_id.as_str() }, None)
            .await?;
        Ok(cursor.try_collect::<Vec<_>>().await?)
    }

    async fn find_by_id(&self, id: &ExpenseId) -> StorageResult<Option<Expense>> {
        Ok(self.expenses.find_one(doc! { "id": id.as_str() }, None).await?)
    }

    async fn save(&self, expense: &Expense) -> StorageResult<()> {
        self.expenses
            .replace_one(doc! { "id": expense.id.as_str() }, expense, Self::upsert())
            .await?;
        Ok(())
    }

    async fn delete(&self, id: &ExpenseId) -> StorageResult<bool> {
        let result = self.expenses.delete_one(doc! { "id": id.as_str() }, None).await?;
        Ok(result.deleted_count > 0)
    }

    async fn delete_by_group(&self, group_id: &GroupId) -> StorageResult<u64> {
        let result = self
            .expenses
            .delete_many(doc! { "groupId": group_id.as_str() }, None)
            .await?;
        Ok(result.deleted_count)
    }
}

/// Collects the two repository roles of one backing store.
#[derive(Clone)]
pub struct Repositories {
    pub groups: Arc<dyn GroupRepository>,
    pub expenses: Arc<dyn ExpenseRepository>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self {
            groups: store.clone(),
            expenses: store,
        }
    }

    pub fn mongo(store: MongoStore) -> Self {
        let store = Arc::new(store);
        Self {
            groups: store.clone(),
            expenses: store,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use crate::schemas::{Payment, Share, SplitType};
    use chrono::Utc;

    fn expense(group: &GroupId) -> Expense {
        let now = Utc::now();
        Expense {
            id: ExpenseId::generate(),
            group_id: group.clone(),
            description: "Taxi".into(),
            category: "Transport".into(),
            amount: Money::from_cents(1500),
            split_type: SplitType::Unequal,
            payment: Payment::NoPayer,
            split: vec![Share::new("a", Money::from_cents(1500))],
            date: now,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn in_memory_save_is_an_upsert() {
        let store = InMemoryStore::new();
        let mut group = Group::new("Trip".into(), String::new());
        GroupRepository::save(&store, &group).await.unwrap();
        group.name = "Road trip".into();
        GroupRepository::save(&store, &group).await.unwrap();

        let all = GroupRepository::find_all(&store).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Road trip");
    }

    #[tokio::test]
    async fn in_memory_expenses_filter_by_group() {
        let store = InMemoryStore::new();
        let g1 = GroupId::from("g1");
        let g2 = GroupId::from("g2");
        for e in [expense(&g1), expense(&g1), expense(&g2)] {
            ExpenseRepository::save(&store, &e).await.unwrap();
        }

        assert_eq!(store.find_by_group(&g1).await.unwrap().len(), 2);
        assert_eq!(store.delete_by_group(&g1).await.unwrap(), 2);
        assert_eq!(ExpenseRepository::find_all(&store).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn in_memory_delete_reports_missing() {
        let store = InMemoryStore::new();
        let e = expense(&GroupId::from("g"));
        ExpenseRepository::save(&store, &e).await.unwrap();

        assert!(ExpenseRepository::delete(&store, &e.id).await.unwrap());
        assert!(!ExpenseRepository::delete(&store, &e.id).await.unwrap());
    }
}
