//! Pet repository for database operations

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;
use uuid::Uuid;

use super::PetStore;
use crate::error::{DatabaseError, DatabaseResult};
use crate::models::{NewPet, Pet, Sex, UpdatePet};

const PET_COLUMNS: &str = "id, name, pet_type, breed, age, birth_date, weight, sterilized, sex, \
     description, city, price, images, owner_id, created_at, updated_at";

/// Pet repository
#[derive(Clone)]
pub struct PetRepository {
    pool: PgPool,
}

impl PetRepository {
    /// Create a new pet repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_pet(row: &PgRow) -> DatabaseResult<Pet> {
    let sex: Option<String> = row.get("sex");
    let sex = sex
        .map(|s| s.parse::<Sex>())
        .transpose()
        .map_err(DatabaseError::Decode)?;

    Ok(Pet {
        id: row.get("id"),
        name: row.get("name"),
        pet_type: row.get("pet_type"),
        breed: row.get("breed"),
        age: row.get("age"),
        birth_date: row.get("birth_date"),
        weight: row.get("weight"),
        sterilized: row.get("sterilized"),
        sex,
        description: row.get("description"),
        city: row.get("city"),
        price: row.get("price"),
        images: row.get("images"),
        owner_id: row.get("owner_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl PetStore for PetRepository {
    async fn find_all(&self) -> DatabaseResult<Vec<Pet>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM pets ORDER BY created_at",
            PET_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_pet).collect()
    }

    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<Pet>> {
        let row = sqlx::query(&format!("SELECT {} FROM pets WHERE id = $1", PET_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(map_pet).transpose()
    }

    async fn find_by_owner(&self, owner_id: Uuid) -> DatabaseResult<Vec<Pet>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM pets WHERE owner_id = $1 ORDER BY created_at",
            PET_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_pet).collect()
    }

    async fn create(&self, new_pet: &NewPet) -> DatabaseResult<Pet> {
        info!("Creating pet {} for owner {}", new_pet.name, new_pet.owner_id);

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO pets (name, pet_type, breed, age, birth_date, weight, sterilized, sex,
                              description, city, price, images, owner_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {}
            "#,
            PET_COLUMNS
        ))
        .bind(&new_pet.name)
        .bind(&new_pet.pet_type)
        .bind(&new_pet.breed)
        .bind(&new_pet.age)
        .bind(new_pet.birth_date)
        .bind(new_pet.weight)
        .bind(new_pet.sterilized)
        .bind(new_pet.sex.map(|s| s.as_str()))
        .bind(&new_pet.description)
        .bind(&new_pet.city)
        .bind(new_pet.price)
        .bind(&new_pet.images)
        .bind(new_pet.owner_id)
        .fetch_one(&self.pool)
        .await?;

        map_pet(&row)
    }

    async fn update(&self, id: Uuid, update: &UpdatePet) -> DatabaseResult<Option<Pet>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE pets SET
                name = COALESCE($2, name),
                pet_type = COALESCE($3, pet_type),
                breed = COALESCE($4, breed),
                age = COALESCE($5, age),
                birth_date = COALESCE($6, birth_date),
                weight = COALESCE($7, weight),
                sterilized = COALESCE($8, sterilized),
                sex = COALESCE($9, sex),
                description = COALESCE($10, description),
                city = COALESCE($11, city),
                price = COALESCE($12, price),
                images = COALESCE($13, images),
                updated_at = now()
            WHERE id = $1
            RETURNING {}
            "#,
            PET_COLUMNS
        ))
        .bind(id)
        .bind(&update.name)
        .bind(&update.pet_type)
        .bind(&update.breed)
        .bind(&update.age)
        .bind(update.birth_date)
        .bind(update.weight)
        .bind(update.sterilized)
        .bind(update.sex.map(|s| s.as_str()))
        .bind(&update.description)
        .bind(&update.city)
        .bind(update.price)
        .bind(&update.images)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_pet).transpose()
    }

    async fn delete(&self, id: Uuid) -> DatabaseResult<bool> {
        info!("Deleting pet: {}", id);

        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE users SET liked = array_remove(liked, $1) WHERE $1 = ANY(liked)")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM pets WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }
}
