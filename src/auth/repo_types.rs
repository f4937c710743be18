use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

pub const ADMIN_ROLE_ID: i32 = 1;
pub const USER_ROLE_ID: i32 = 2;
pub const ADMIN_ROLE: &str = "admin";
pub const USER_ROLE: &str = "user";

/// User record joined with its role name.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,                   // unique user ID
    pub name: String,               // display name
    pub email: String,              // unique, lowercased
    pub password_hash: String,      // Argon2 PHC string or the OAuth sentinel
    pub is_active: bool,            // false once deactivated
    pub role_id: i32,               // FK to roles
    pub role_name: Option<String>,  // joined roles.name
    pub google_id: Option<String>,  // Google subject id
    pub created_at: OffsetDateTime, // creation timestamp
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role_name.as_deref() == Some(ADMIN_ROLE)
    }
}

/// Fields needed to insert a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role_id: i32,
    pub google_id: Option<String>,
}
