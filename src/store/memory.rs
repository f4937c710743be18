use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{ExpenseTally, Store, StoreError, UserTally};
use crate::{
    admin::analytics,
    auth::repo_types::{NewUser, User, ADMIN_ROLE, ADMIN_ROLE_ID, USER_ROLE, USER_ROLE_ID},
    expenses::repo_types::{Expense, ExpenseType, NewExpense},
};

/// In-process [`Store`] with the same ordering and uniqueness rules as the
/// Postgres schema.
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

struct Inner {
    roles: Vec<(i32, String)>,
    users: Vec<User>,
    expenses: Vec<Expense>,
    failing: bool,
    failing_expense_reads: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                roles: vec![
                    (ADMIN_ROLE_ID, ADMIN_ROLE.to_string()),
                    (USER_ROLE_ID, USER_ROLE.to_string()),
                ],
                users: Vec::new(),
                expenses: Vec::new(),
                failing: false,
                failing_expense_reads: false,
            }),
        }
    }

    /// Make every subsequent call fail with a backend error.
    pub fn fail_all(&self) {
        self.lock().failing = true;
    }

    /// Make expense listings fail while user lookups keep working.
    pub fn fail_expense_reads(&self) {
        self.lock().failing_expense_reads = true;
    }

    /// Insert a user with an explicit creation time.
    pub fn insert_user_at(&self, new_user: NewUser, created_at: OffsetDateTime) -> User {
        let mut inner = self.lock();
        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name,
            email: new_user.email,
            password_hash: new_user.password_hash,
            is_active: true,
            role_id: new_user.role_id,
            role_name: inner.role_name(new_user.role_id),
            google_id: new_user.google_id,
            created_at,
        };
        inner.users.push(user.clone());
        user
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn guard(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        let inner = self.lock();
        if inner.failing {
            return Err(StoreError::Backend(anyhow::anyhow!("store unavailable")));
        }
        Ok(inner)
    }

    fn expense_guard(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        let inner = self.guard()?;
        if inner.failing_expense_reads {
            return Err(StoreError::Backend(anyhow::anyhow!("expenses table unavailable")));
        }
        Ok(inner)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn role_name(&self, role_id: i32) -> Option<String> {
        self.roles
            .iter()
            .find(|(id, _)| *id == role_id)
            .map(|(_, name)| name.clone())
    }

    fn user_mut(&mut self, id: Uuid) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.id == id)
    }
}

fn newest_first(expenses: &mut [Expense]) {
    expenses.sort_by(|a, b| b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at)));
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let inner = self.guard()?;
        let mut users = inner.users.clone();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let inner = self.guard()?;
        Ok(inner.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let inner = self.guard()?;
        Ok(inner.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_google_id(&self, google_id: &str) -> Result<Option<User>, StoreError> {
        let inner = self.guard()?;
        Ok(inner
            .users
            .iter()
            .find(|u| u.google_id.as_deref() == Some(google_id))
            .cloned())
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        {
            let inner = self.guard()?;
            if inner.users.iter().any(|u| u.email == new_user.email) {
                return Err(StoreError::Conflict("email"));
            }
            if new_user.google_id.is_some()
                && inner.users.iter().any(|u| u.google_id == new_user.google_id)
            {
                return Err(StoreError::Conflict("google account"));
            }
            if inner.role_name(new_user.role_id).is_none() {
                return Err(StoreError::UnknownRole(new_user.role_id));
            }
        }
        Ok(self.insert_user_at(new_user, OffsetDateTime::now_utc()))
    }

    async fn link_google_id(&self, id: Uuid, google_id: &str) -> Result<Option<User>, StoreError> {
        let mut inner = self.guard()?;
        if inner
            .users
            .iter()
            .any(|u| u.id != id && u.google_id.as_deref() == Some(google_id))
        {
            return Err(StoreError::Conflict("google account"));
        }
        Ok(inner.user_mut(id).map(|user| {
            user.google_id = Some(google_id.to_string());
            user.clone()
        }))
    }

    async fn update_user_role(&self, id: Uuid, role_id: i32) -> Result<Option<User>, StoreError> {
        let mut inner = self.guard()?;
        if inner.users.iter().all(|u| u.id != id) {
            return Ok(None);
        }
        let role_name = inner
            .role_name(role_id)
            .ok_or(StoreError::UnknownRole(role_id))?;
        Ok(inner.user_mut(id).map(|user| {
            user.role_id = role_id;
            user.role_name = Some(role_name);
            user.clone()
        }))
    }

    async fn deactivate_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let mut inner = self.guard()?;
        Ok(inner.user_mut(id).map(|user| {
            user.is_active = false;
            user.clone()
        }))
    }

    async fn create_expense(&self, new_expense: NewExpense) -> Result<Expense, StoreError> {
        let mut inner = self.guard()?;
        if inner.users.iter().all(|u| u.id != new_expense.user_id) {
            return Err(StoreError::Backend(anyhow::anyhow!(
                "user {} does not exist",
                new_expense.user_id
            )));
        }
        let expense = Expense {
            id: Uuid::new_v4(),
            user_id: new_expense.user_id,
            amount: new_expense.amount,
            kind: new_expense.kind,
            category: new_expense.category,
            description: new_expense.description,
            payment_method: new_expense.payment_method,
            date: new_expense.date,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.expenses.push(expense.clone());
        Ok(expense)
    }

    async fn list_expenses(&self) -> Result<Vec<Expense>, StoreError> {
        let inner = self.expense_guard()?;
        let mut expenses = inner.expenses.clone();
        newest_first(&mut expenses);
        Ok(expenses)
    }

    async fn list_expenses_for_user(&self, user_id: Uuid) -> Result<Vec<Expense>, StoreError> {
        let inner = self.expense_guard()?;
        let mut expenses: Vec<Expense> = inner
            .expenses
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut expenses);
        Ok(expenses)
    }

    async fn tally_users(&self) -> Result<UserTally, StoreError> {
        let inner = self.guard()?;
        Ok(UserTally {
            total: analytics::count_users(&inner.users) as u64,
            active: inner.users.iter().filter(|u| u.is_active).count() as u64,
        })
    }

    async fn tally_expenses(&self) -> Result<ExpenseTally, StoreError> {
        let inner = self.expense_guard()?;
        Ok(ExpenseTally {
            count: inner.expenses.len() as u64,
            income: analytics::sum_amount(&inner.expenses, Some(ExpenseType::Income)),
            expense: analytics::sum_amount(&inner.expenses, Some(ExpenseType::Expense)),
        })
    }
}
