//! Derived views over user and expense snapshots for the admin dashboard.
//!
//! Everything here is a pure function over slices loaded from the store, so
//! a view is either computed completely or not at all.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use serde::{ser::SerializeMap, Serialize, Serializer};
use time::{Date, Month, OffsetDateTime, UtcOffset};
use uuid::Uuid;

use crate::{
    auth::repo_types::User,
    expenses::repo_types::{iso_date, Expense, ExpenseType},
};

pub const UNCATEGORIZED: &str = "Uncategorized";
pub const UNKNOWN_USER: &str = "Unknown User";
pub const TREND_WINDOW_MONTHS: u32 = 6;
pub const TOP_SPENDERS_LIMIT: usize = 5;

/// Label used for grouping; null, empty and blank categories share one bucket.
pub fn category_label(category: Option<&str>) -> &str {
    match category.map(str::trim) {
        Some(label) if !label.is_empty() => label,
        _ => UNCATEGORIZED,
    }
}

pub fn count_users(users: &[User]) -> usize {
    users.len()
}

/// Sum of `amount`, optionally restricted to one type. Zero when nothing matches.
pub fn sum_amount(expenses: &[Expense], kind: Option<ExpenseType>) -> Decimal {
    expenses
        .iter()
        .filter(|e| kind.map_or(true, |k| e.kind == k))
        .map(|e| e.amount)
        .sum()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeExpenseTotals {
    pub total_income: Decimal,
    pub total_expense: Decimal,
}

/// The fields of an expense shown in dashboard listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseSummary {
    pub id: Uuid,
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub kind: ExpenseType,
    pub description: Option<String>,
    pub category: Option<String>,
    pub payment_method: String,
    #[serde(with = "iso_date")]
    pub date: Date,
}

impl From<&Expense> for ExpenseSummary {
    fn from(e: &Expense) -> Self {
        Self {
            id: e.id,
            amount: e.amount,
            kind: e.kind,
            description: e.description.clone(),
            category: e.category.clone(),
            payment_method: e.payment_method.clone(),
            date: e.date,
        }
    }
}

/// Expenses keyed by calendar date, newest date first.
///
/// Serializes as a JSON object whose keys are `YYYY-MM-DD` in that order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpensesByDate(pub Vec<(Date, Vec<ExpenseSummary>)>);

#[cfg(test)]
impl ExpensesByDate {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, date: Date) -> Option<&[ExpenseSummary]> {
        self.0
            .iter()
            .find(|(d, _)| *d == date)
            .map(|(_, items)| items.as_slice())
    }
}

impl Serialize for ExpensesByDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (date, items) in &self.0 {
            map.serialize_entry(&iso_date::format(*date), items)?;
        }
        map.end()
    }
}

/// Group by calendar date. Within a date the input order is kept.
pub fn group_by_calendar_date(expenses: &[Expense]) -> ExpensesByDate {
    let mut by_date: BTreeMap<Date, Vec<ExpenseSummary>> = BTreeMap::new();
    for expense in expenses {
        by_date
            .entry(expense.date)
            .or_default()
            .push(ExpenseSummary::from(expense));
    }
    ExpensesByDate(by_date.into_iter().rev().collect())
}

/// Number of expenses per category label.
pub fn group_by_category(expenses: &[Expense]) -> BTreeMap<String, u64> {
    let mut counts = BTreeMap::new();
    for expense in expenses {
        *counts
            .entry(category_label(expense.category.as_deref()).to_string())
            .or_insert(0) += 1;
    }
    counts
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotal {
    pub category: String,
    pub total_amount: Decimal,
}

/// Sum of amounts per category label, ordered by label.
pub fn group_by_category_sum(expenses: &[Expense]) -> Vec<CategoryTotal> {
    let mut sums: BTreeMap<&str, Decimal> = BTreeMap::new();
    for expense in expenses {
        *sums
            .entry(category_label(expense.category.as_deref()))
            .or_default() += expense.amount;
    }
    sums.into_iter()
        .map(|(category, total_amount)| CategoryTotal {
            category: category.to_string(),
            total_amount,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthCount {
    pub month: String,
    pub user_count: u64,
}

/// `now` moved back by whole calendar months, day clamped to the target month.
fn months_before(now: OffsetDateTime, months: u32) -> OffsetDateTime {
    let index = now.year() * 12 + i32::from(u8::from(now.month())) - 1 - months as i32;
    let year = index.div_euclid(12);
    let Ok(month) = Month::try_from(index.rem_euclid(12) as u8 + 1) else {
        return now;
    };
    let day = now.day().min(time::util::days_in_year_month(year, month));
    match Date::from_calendar_date(year, month, day) {
        Ok(date) => now.replace_date(date),
        Err(_) => now,
    }
}

/// Users created per month (UTC) from `window_months` before `now` up to `now`.
/// Months without sign-ups are left out; keys ascend.
pub fn monthly_user_trend(users: &[User], now: OffsetDateTime, window_months: u32) -> Vec<MonthCount> {
    let since = months_before(now, window_months);
    let mut per_month: BTreeMap<(i32, u8), u64> = BTreeMap::new();
    for user in users {
        if user.created_at < since || user.created_at > now {
            continue;
        }
        let created = user.created_at.to_offset(UtcOffset::UTC);
        *per_month
            .entry((created.year(), u8::from(created.month())))
            .or_insert(0) += 1;
    }
    per_month
        .into_iter()
        .map(|((year, month), user_count)| MonthCount {
            month: format!("{year:04}-{month:02}"),
            user_count,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopSpender {
    pub user_id: Uuid,
    pub total_spent: Decimal,
    pub name: String,
}

/// Users ranked by total `expense` amount, highest first, ties by user id.
pub fn top_spenders(expenses: &[Expense], users: &[User], limit: usize) -> Vec<TopSpender> {
    let mut totals: HashMap<Uuid, Decimal> = HashMap::new();
    for expense in expenses.iter().filter(|e| e.kind == ExpenseType::Expense) {
        *totals.entry(expense.user_id).or_default() += expense.amount;
    }

    let mut ranked: Vec<(Uuid, Decimal)> = totals.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let names: HashMap<Uuid, &str> = users.iter().map(|u| (u.id, u.name.as_str())).collect();
    ranked
        .into_iter()
        .take(limit)
        .map(|(user_id, total_spent)| TopSpender {
            user_id,
            total_spent,
            name: names.get(&user_id).copied().unwrap_or(UNKNOWN_USER).to_string(),
        })
        .collect()
}

/// Total `expense` amount divided by the number of users, to the cent.
pub fn average_expense_per_user(expenses: &[Expense], users: &[User]) -> Decimal {
    let count = count_users(users);
    if count == 0 {
        return Decimal::ZERO;
    }
    (sum_amount(expenses, Some(ExpenseType::Expense)) / Decimal::from(count)).round_dp(2)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserExpenseDigest {
    pub user_id: Uuid,
    pub name: String,
    pub expenses: Vec<ExpenseSummary>,
}

/// Every user with their expenses, newest date first.
pub fn per_user_digest(users: &[User], expenses: &[Expense]) -> Vec<UserExpenseDigest> {
    let mut by_user: HashMap<Uuid, Vec<&Expense>> = HashMap::new();
    for expense in expenses {
        by_user.entry(expense.user_id).or_default().push(expense);
    }

    users
        .iter()
        .map(|user| {
            let mut own = by_user.remove(&user.id).unwrap_or_default();
            // stable: same-date entries keep the store's order
            own.sort_by(|a, b| b.date.cmp(&a.date));
            UserExpenseDigest {
                user_id: user.id,
                name: user.name.clone(),
                expenses: own.into_iter().map(ExpenseSummary::from).collect(),
            }
        })
        .collect()
}
