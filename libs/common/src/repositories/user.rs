//! User repository for database operations

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;
use uuid::Uuid;

use super::UserStore;
use crate::error::{DatabaseError, DatabaseResult};
use crate::models::{NewUser, UpdateUser, User};

const USER_COLUMNS: &str = "id, first_name, last_name, company_name, phone, account_type, \
     telegram, instagram, password_hash, liked, created_at, updated_at";

/// User repository
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_user(row: &PgRow) -> DatabaseResult<User> {
    let account_type: String = row.get("account_type");

    Ok(User {
        id: row.get("id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        company_name: row.get("company_name"),
        phone: row.get("phone"),
        account_type: account_type.parse().map_err(DatabaseError::Decode)?,
        telegram: row.get("telegram"),
        instagram: row.get("instagram"),
        password_hash: row.get("password_hash"),
        liked: row.get("liked"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl UserStore for UserRepository {
    async fn find_all(&self) -> DatabaseResult<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM users ORDER BY created_at",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_user).collect()
    }

    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(map_user).transpose()
    }

    async fn find_by_phone(&self, phone: &str) -> DatabaseResult<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE phone = $1",
            USER_COLUMNS
        ))
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_user).transpose()
    }

    async fn create(&self, new_user: &NewUser) -> DatabaseResult<User> {
        info!("Creating new user: {}", new_user.phone);

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO users (first_name, last_name, company_name, phone, account_type,
                               telegram, instagram, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(&new_user.company_name)
        .bind(&new_user.phone)
        .bind(new_user.account_type.as_str())
        .bind(&new_user.telegram)
        .bind(&new_user.instagram)
        .bind(&new_user.password_hash)
        .fetch_one(&self.pool)
        .await?;

        map_user(&row)
    }

    async fn update(&self, id: Uuid, update: &UpdateUser) -> DatabaseResult<Option<User>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE users SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                company_name = COALESCE($4, company_name),
                phone = COALESCE($5, phone),
                account_type = COALESCE($6, account_type),
                telegram = COALESCE($7, telegram),
                instagram = COALESCE($8, instagram),
                password_hash = COALESCE($9, password_hash),
                updated_at = now()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(&update.company_name)
        .bind(&update.phone)
        .bind(update.account_type.map(|t| t.as_str()))
        .bind(&update.telegram)
        .bind(&update.instagram)
        .bind(&update.password_hash)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_user).transpose()
    }

    async fn delete(&self, id: Uuid) -> DatabaseResult<bool> {
        info!("Deleting user: {}", id);

        let mut tx = self.pool.begin().await?;

        // Likes on this user's pets are dropped before the cascade removes the pets
        sqlx::query(
            r#"
            UPDATE users
            SET liked = ARRAY(
                SELECT l FROM unnest(liked) AS l
                WHERE l NOT IN (SELECT id FROM pets WHERE owner_id = $1)
            )
            WHERE liked && ARRAY(SELECT id FROM pets WHERE owner_id = $1)
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    async fn like(&self, user_id: Uuid, pet_id: Uuid) -> DatabaseResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET liked = array_append(liked, $2), updated_at = now()
            WHERE id = $1 AND NOT ($2 = ANY(liked))
            "#,
        )
        .bind(user_id)
        .bind(pet_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn unlike(&self, user_id: Uuid, pet_id: Uuid) -> DatabaseResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET liked = array_remove(liked, $2), updated_at = now()
            WHERE id = $1 AND $2 = ANY(liked)
            "#,
        )
        .bind(user_id)
        .bind(pet_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
