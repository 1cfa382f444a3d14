//! In-memory store used by the service tests
//!
//! Mirrors the behavior of the Postgres repositories: insertion order is
//! kept, phones are unique, deleting a pet removes it from liked sets and
//! deleting a user removes their pets.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{PetStore, UserStore};
use crate::error::{DatabaseError, DatabaseResult};
use crate::models::{NewPet, NewUser, Pet, UpdatePet, UpdateUser, User};

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    pets: Vec<Pet>,
}

/// Shared in-memory implementation of both stores
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully built user, bypassing validation
    pub async fn insert_user(&self, user: User) {
        self.tables.write().await.users.push(user);
    }

    /// Insert a fully built pet, bypassing validation
    pub async fn insert_pet(&self, pet: Pet) {
        self.tables.write().await.pets.push(pet);
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_all(&self) -> DatabaseResult<Vec<User>> {
        Ok(self.tables.read().await.users.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_phone(&self, phone: &str) -> DatabaseResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.phone == phone).cloned())
    }

    async fn create(&self, new_user: &NewUser) -> DatabaseResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.phone == new_user.phone) {
            return Err(DatabaseError::Duplicate("users_phone_key".to_string()));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            first_name: new_user.first_name.clone(),
            last_name: new_user.last_name.clone(),
            company_name: new_user.company_name.clone(),
            phone: new_user.phone.clone(),
            account_type: new_user.account_type,
            telegram: new_user.telegram.clone(),
            instagram: new_user.instagram.clone(),
            password_hash: new_user.password_hash.clone(),
            liked: vec![],
            created_at: now,
            updated_at: now,
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn update(&self, id: Uuid, update: &UpdateUser) -> DatabaseResult<Option<User>> {
        let mut tables = self.tables.write().await;
        if let Some(phone) = &update.phone {
            if tables.users.iter().any(|u| u.id != id && &u.phone == phone) {
                return Err(DatabaseError::Duplicate("users_phone_key".to_string()));
            }
        }

        let Some(user) = tables.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };

        let update = update.clone();
        if let Some(v) = update.first_name {
            user.first_name = v;
        }
        if let Some(v) = update.last_name {
            user.last_name = v;
        }
        if let Some(v) = update.company_name {
            user.company_name = v;
        }
        if let Some(v) = update.phone {
            user.phone = v;
        }
        if let Some(v) = update.account_type {
            user.account_type = v;
        }
        if let Some(v) = update.telegram {
            user.telegram = v;
        }
        if let Some(v) = update.instagram {
            user.instagram = v;
        }
        if let Some(v) = update.password_hash {
            user.password_hash = v;
        }
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: Uuid) -> DatabaseResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.users.len();
        tables.users.retain(|u| u.id != id);
        if tables.users.len() == before {
            return Ok(false);
        }

        let owned: Vec<Uuid> = tables
            .pets
            .iter()
            .filter(|p| p.owner_id == id)
            .map(|p| p.id)
            .collect();
        tables.pets.retain(|p| p.owner_id != id);
        for user in tables.users.iter_mut() {
            user.liked.retain(|pet_id| !owned.contains(pet_id));
        }

        Ok(true)
    }

    async fn like(&self, user_id: Uuid, pet_id: Uuid) -> DatabaseResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.users.iter_mut().find(|u| u.id == user_id) {
            Some(user) if !user.liked.contains(&pet_id) => {
                user.liked.push(pet_id);
                user.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn unlike(&self, user_id: Uuid, pet_id: Uuid) -> DatabaseResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.users.iter_mut().find(|u| u.id == user_id) {
            Some(user) if user.liked.contains(&pet_id) => {
                user.liked.retain(|id| *id != pet_id);
                user.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl PetStore for MemoryStore {
    async fn find_all(&self) -> DatabaseResult<Vec<Pet>> {
        Ok(self.tables.read().await.pets.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<Pet>> {
        let tables = self.tables.read().await;
        Ok(tables.pets.iter().find(|p| p.id == id).cloned())
    }

    async fn find_by_owner(&self, owner_id: Uuid) -> DatabaseResult<Vec<Pet>> {
        let tables = self.tables.read().await;
        Ok(tables
            .pets
            .iter()
            .filter(|p| p.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn create(&self, new_pet: &NewPet) -> DatabaseResult<Pet> {
        let now = Utc::now();
        let new_pet = new_pet.clone();
        let pet = Pet {
            id: Uuid::new_v4(),
            name: new_pet.name,
            pet_type: new_pet.pet_type,
            breed: new_pet.breed,
            age: new_pet.age,
            birth_date: new_pet.birth_date,
            weight: new_pet.weight,
            sterilized: new_pet.sterilized,
            sex: new_pet.sex,
            description: new_pet.description,
            city: new_pet.city,
            price: new_pet.price,
            images: new_pet.images,
            owner_id: new_pet.owner_id,
            created_at: now,
            updated_at: now,
        };
        self.tables.write().await.pets.push(pet.clone());
        Ok(pet)
    }

    async fn update(&self, id: Uuid, update: &UpdatePet) -> DatabaseResult<Option<Pet>> {
        let mut tables = self.tables.write().await;
        let Some(pet) = tables.pets.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        update.clone().apply_to(pet);
        Ok(Some(pet.clone()))
    }

    async fn delete(&self, id: Uuid) -> DatabaseResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.pets.len();
        tables.pets.retain(|p| p.id != id);
        if tables.pets.len() == before {
            return Ok(false);
        }
        for user in tables.users.iter_mut() {
            user.liked.retain(|pet_id| *pet_id != id);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AccountType;

    fn new_user(phone: &str) -> NewUser {
        NewUser {
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            company_name: String::new(),
            phone: phone.to_string(),
            account_type: AccountType::Private,
            telegram: String::new(),
            instagram: String::new(),
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_phone_is_rejected() {
        let store = MemoryStore::new();
        UserStore::create(&store, &new_user("+77010000001")).await.unwrap();

        let err = UserStore::create(&store, &new_user("+77010000001"))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_like_is_idempotent_and_cleared_on_pet_delete() {
        let store = MemoryStore::new();
        let owner = UserStore::create(&store, &new_user("+77010000001")).await.unwrap();
        let fan = UserStore::create(&store, &new_user("+77010000002")).await.unwrap();
        let pet = PetStore::create(
            &store,
            &NewPet {
                name: "Rex".to_string(),
                pet_type: "dog".to_string(),
                owner_id: owner.id,
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert!(store.like(fan.id, pet.id).await.unwrap());
        assert!(!store.like(fan.id, pet.id).await.unwrap());

        assert!(PetStore::delete(&store, pet.id).await.unwrap());
        let fan = UserStore::find_by_id(&store, fan.id).await.unwrap().unwrap();
        assert!(fan.liked.is_empty());
    }

    #[tokio::test]
    async fn test_deleting_user_removes_their_pets() {
        let store = MemoryStore::new();
        let owner = UserStore::create(&store, &new_user("+77010000001")).await.unwrap();
        PetStore::create(
            &store,
            &NewPet {
                name: "Rex".to_string(),
                pet_type: "dog".to_string(),
                owner_id: owner.id,
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert!(UserStore::delete(&store, owner.id).await.unwrap());
        assert!(PetStore::find_all(&store).await.unwrap().is_empty());
    }
}
