//! Fixtures shared by the unit tests

use async_trait::async_trait;
use chrono::Utc;
use common::{
    error::{DatabaseError, DatabaseResult},
    jwt::{JwtConfig, JwtService},
    models::{AccountType, NewPet, NewUser, Pet, UpdatePet, UpdateUser, User},
    repositories::{MemoryStore, PetStore, UserStore},
};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::{
    middleware::AuthGate,
    state::AppState,
    storage::{ImageStore, ImageUpload, StorageError},
};

pub fn jwt_service() -> JwtService {
    JwtService::new(JwtConfig {
        access_secret: "test-access-secret".to_string(),
        refresh_secret: "test-refresh-secret".to_string(),
        access_token_expiry: 900,
        refresh_token_expiry: 3600,
    })
}

pub fn user(phone: &str) -> User {
    User {
        id: Uuid::new_v4(),
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        company_name: String::new(),
        phone: phone.to_string(),
        account_type: AccountType::Private,
        telegram: String::new(),
        instagram: String::new(),
        password_hash: String::new(),
        liked: Vec::new(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn pet(name: &str, pet_type: &str, owner_id: Uuid) -> Pet {
    Pet {
        id: Uuid::new_v4(),
        name: name.to_string(),
        pet_type: pet_type.to_string(),
        breed: None,
        age: None,
        birth_date: None,
        weight: 0.0,
        sterilized: None,
        sex: None,
        description: String::new(),
        city: None,
        price: None,
        images: Vec::new(),
        owner_id,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// `Authorization` header value carrying a fresh access token
pub fn bearer(jwt: &JwtService, user: &User) -> String {
    format!("Bearer {}", jwt.generate_access_token(user).unwrap())
}

/// Image store that records uploads instead of sending them anywhere
#[derive(Default)]
pub struct RecordingImageStore {
    pub uploads: Mutex<Vec<String>>,
}

#[async_trait]
impl ImageStore for RecordingImageStore {
    async fn upload(&self, image: ImageUpload) -> Result<String, StorageError> {
        let url = format!("https://cdn.test/{}", image.key);
        self.uploads.lock().unwrap().push(url.clone());
        Ok(url)
    }
}

pub fn app_state(store: &MemoryStore, admins: &[Uuid]) -> (AppState, Arc<RecordingImageStore>) {
    let images = Arc::new(RecordingImageStore::default());
    let users = Arc::new(store.clone());

    let state = AppState {
        db_pool: None,
        users: users.clone(),
        pets: Arc::new(store.clone()),
        images: images.clone(),
        gate: AuthGate::new(jwt_service(), users, admins),
    };

    (state, images)
}

/// Store whose every operation fails as if the database were unreachable
pub struct FailingStore;

fn unavailable<T>() -> DatabaseResult<T> {
    Err(DatabaseError::Connection(sqlx::Error::PoolTimedOut))
}

#[async_trait]
impl UserStore for FailingStore {
    async fn find_all(&self) -> DatabaseResult<Vec<User>> {
        unavailable()
    }
    async fn find_by_id(&self, _id: Uuid) -> DatabaseResult<Option<User>> {
        unavailable()
    }
    async fn find_by_phone(&self, _phone: &str) -> DatabaseResult<Option<User>> {
        unavailable()
    }
    async fn create(&self, _new_user: &NewUser) -> DatabaseResult<User> {
        unavailable()
    }
    async fn update(&self, _id: Uuid, _update: &UpdateUser) -> DatabaseResult<Option<User>> {
        unavailable()
    }
    async fn delete(&self, _id: Uuid) -> DatabaseResult<bool> {
        unavailable()
    }
    async fn like(&self, _user_id: Uuid, _pet_id: Uuid) -> DatabaseResult<bool> {
        unavailable()
    }
    async fn unlike(&self, _user_id: Uuid, _pet_id: Uuid) -> DatabaseResult<bool> {
        unavailable()
    }
}

#[async_trait]
impl PetStore for FailingStore {
    async fn find_all(&self) -> DatabaseResult<Vec<Pet>> {
        unavailable()
    }
    async fn find_by_id(&self, _id: Uuid) -> DatabaseResult<Option<Pet>> {
        unavailable()
    }
    async fn find_by_owner(&self, _owner_id: Uuid) -> DatabaseResult<Vec<Pet>> {
        unavailable()
    }
    async fn create(&self, _new_pet: &NewPet) -> DatabaseResult<Pet> {
        unavailable()
    }
    async fn update(&self, _id: Uuid, _update: &UpdatePet) -> DatabaseResult<Option<Pet>> {
        unavailable()
    }
    async fn delete(&self, _id: Uuid) -> DatabaseResult<bool> {
        unavailable()
    }
}

/// State whose stores fail every read and write
pub fn failing_app_state() -> AppState {
    let users: Arc<dyn UserStore> = Arc::new(FailingStore);

    AppState {
        db_pool: None,
        users: users.clone(),
        pets: Arc::new(FailingStore),
        images: Arc::new(RecordingImageStore::default()),
        gate: AuthGate::new(jwt_service(), users, &[]),
    }
}
