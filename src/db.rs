use anyhow::Context;
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    auth::repo_types::{NewUser, User},
    expenses::repo_types::{Expense, NewExpense},
    store::{ExpenseTally, Store, StoreError, UserTally},
};

const USER_SELECT: &str = r#"
    SELECT u.id, u.name, u.email, u.password_hash, u.is_active, u.role_id,
           r.name AS role_name, u.google_id, u.created_at
    FROM users u
    LEFT JOIN roles r ON r.id = u.role_id
"#;

const EXPENSE_COLUMNS: &str =
    "id, user_id, amount, kind, category, description, payment_method, date, created_at";

/// Postgres-backed [`Store`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("run migrations")?;
        Ok(())
    }

    async fn fetch_user_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<User, StoreError> {
        let sql = format!("{USER_SELECT} WHERE u.id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_one(&mut **tx)
            .await
            .context("reload user")?;
        Ok(user)
    }

    /// Lock the user row for the rest of the transaction. `false` if missing.
    async fn lock_user(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<bool, StoreError> {
        let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .context("lock user row")?;
        Ok(row.is_some())
    }

    async fn find_user_where(&self, clause: &str, value: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("{USER_SELECT} WHERE {clause} = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("find user by {clause}"))?;
        Ok(user)
    }
}

/// Translate constraint violations into domain errors.
fn write_error(err: sqlx::Error, what: &'static str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            // unique_violation
            Some("23505") => {
                return match db_err.constraint() {
                    Some("users_google_id_key") => StoreError::Conflict("google account"),
                    _ => StoreError::Conflict("email"),
                };
            }
            // foreign_key_violation
            Some("23503") => {
                return StoreError::Backend(anyhow::anyhow!("{what}: referenced row missing"));
            }
            _ => {}
        }
    }
    StoreError::Backend(anyhow::Error::new(err).context(what))
}

#[async_trait]
impl Store for PgStore {
    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let sql = format!("{USER_SELECT} ORDER BY u.created_at ASC");
        let users = sqlx::query_as::<_, User>(&sql)
            .fetch_all(&self.pool)
            .await
            .context("list users")?;
        Ok(users)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let sql = format!("{USER_SELECT} WHERE u.id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("find user by id")?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.find_user_where("u.email", email).await
    }

    async fn find_user_by_google_id(&self, google_id: &str) -> Result<Option<User>, StoreError> {
        self.find_user_where("u.google_id", google_id).await
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        let role_exists: Option<(i32,)> = sqlx::query_as("SELECT id FROM roles WHERE id = $1")
            .bind(new_user.role_id)
            .fetch_optional(&self.pool)
            .await
            .context("look up role")?;
        if role_exists.is_none() {
            return Err(StoreError::UnknownRole(new_user.role_id));
        }

        sqlx::query_as::<_, User>(
            r#"
            WITH u AS (
                INSERT INTO users (id, name, email, password_hash, role_id, google_id)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
            )
            SELECT u.id, u.name, u.email, u.password_hash, u.is_active, u.role_id,
                   r.name AS role_name, u.google_id, u.created_at
            FROM u
            LEFT JOIN roles r ON r.id = u.role_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new_user.name)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(new_user.role_id)
        .bind(&new_user.google_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| write_error(e, "insert user"))
    }

    async fn link_google_id(&self, id: Uuid, google_id: &str) -> Result<Option<User>, StoreError> {
        let mut tx = self.pool.begin().await.context("begin tx")?;
        if !Self::lock_user(&mut tx, id).await? {
            return Ok(None);
        }
        sqlx::query("UPDATE users SET google_id = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(google_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| write_error(e, "link google account"))?;
        let user = Self::fetch_user_tx(&mut tx, id).await?;
        tx.commit().await.context("commit tx")?;
        Ok(Some(user))
    }

    async fn update_user_role(&self, id: Uuid, role_id: i32) -> Result<Option<User>, StoreError> {
        let mut tx = self.pool.begin().await.context("begin tx")?;
        if !Self::lock_user(&mut tx, id).await? {
            return Ok(None);
        }

        let role: Option<(i32,)> = sqlx::query_as("SELECT id FROM roles WHERE id = $1")
            .bind(role_id)
            .fetch_optional(&mut *tx)
            .await
            .context("look up role")?;
        if role.is_none() {
            return Err(StoreError::UnknownRole(role_id));
        }

        sqlx::query("UPDATE users SET role_id = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(role_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| write_error(e, "update role"))?;
        let user = Self::fetch_user_tx(&mut tx, id).await?;
        tx.commit().await.context("commit tx")?;
        Ok(Some(user))
    }

    async fn deactivate_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let mut tx = self.pool.begin().await.context("begin tx")?;
        if !Self::lock_user(&mut tx, id).await? {
            return Ok(None);
        }
        sqlx::query("UPDATE users SET is_active = FALSE, updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("deactivate user")?;
        let user = Self::fetch_user_tx(&mut tx, id).await?;
        tx.commit().await.context("commit tx")?;
        Ok(Some(user))
    }

    async fn create_expense(&self, new_expense: NewExpense) -> Result<Expense, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO expenses
                (id, user_id, amount, kind, category, description, payment_method, date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {EXPENSE_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Expense>(&sql)
            .bind(Uuid::new_v4())
            .bind(new_expense.user_id)
            .bind(new_expense.amount)
            .bind(new_expense.kind)
            .bind(&new_expense.category)
            .bind(&new_expense.description)
            .bind(&new_expense.payment_method)
            .bind(new_expense.date)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| write_error(e, "insert expense"))
    }

    async fn list_expenses(&self) -> Result<Vec<Expense>, StoreError> {
        let sql = format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses ORDER BY date DESC, created_at DESC"
        );
        let rows = sqlx::query_as::<_, Expense>(&sql)
            .fetch_all(&self.pool)
            .await
            .context("list expenses")?;
        Ok(rows)
    }

    async fn list_expenses_for_user(&self, user_id: Uuid) -> Result<Vec<Expense>, StoreError> {
        let sql = format!(
            r#"
            SELECT {EXPENSE_COLUMNS}
            FROM expenses
            WHERE user_id = $1
            ORDER BY date DESC, created_at DESC
            "#
        );
        let rows = sqlx::query_as::<_, Expense>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .context("list expenses for user")?;
        Ok(rows)
    }

    async fn tally_users(&self) -> Result<UserTally, StoreError> {
        let (total, active): (i64, i64) =
            sqlx::query_as("SELECT COUNT(*), COUNT(*) FILTER (WHERE is_active) FROM users")
                .fetch_one(&self.pool)
                .await
                .context("count users")?;
        Ok(UserTally {
            total: total as u64,
            active: active as u64,
        })
    }

    async fn tally_expenses(&self) -> Result<ExpenseTally, StoreError> {
        let (count, income, expense): (i64, Decimal, Decimal) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(amount) FILTER (WHERE kind = 'income'), 0),
                   COALESCE(SUM(amount) FILTER (WHERE kind = 'expense'), 0)
            FROM expenses
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("sum expenses")?;
        Ok(ExpenseTally {
            count: count as u64,
            income,
            expense,
        })
    }
}
