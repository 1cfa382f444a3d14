//! Stores for users and pet listings
//!
//! Handlers only see the `UserStore` and `PetStore` traits. The Postgres
//! repositories back the running services; `MemoryStore` backs the tests.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DatabaseResult;
use crate::models::{NewPet, NewUser, Pet, UpdatePet, UpdateUser, User};

pub mod memory;
pub mod pet;
pub mod user;

pub use memory::MemoryStore;
pub use pet::PetRepository;
pub use user::UserRepository;

/// Persistence operations on users
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Every stored user
    async fn find_all(&self) -> DatabaseResult<Vec<User>>;

    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<User>>;

    async fn find_by_phone(&self, phone: &str) -> DatabaseResult<Option<User>>;

    /// Fails with `DatabaseError::Duplicate` when the phone is taken
    async fn create(&self, new_user: &NewUser) -> DatabaseResult<User>;

    /// Returns `None` when no user has this id
    async fn update(&self, id: Uuid, update: &UpdateUser) -> DatabaseResult<Option<User>>;

    /// Removes the user together with their pets
    async fn delete(&self, id: Uuid) -> DatabaseResult<bool>;

    /// Adds the pet to the liked set; `false` when it was already there
    async fn like(&self, user_id: Uuid, pet_id: Uuid) -> DatabaseResult<bool>;

    /// Removes the pet from the liked set; `false` when it was not there
    async fn unlike(&self, user_id: Uuid, pet_id: Uuid) -> DatabaseResult<bool>;
}

/// Persistence operations on pet listings
#[async_trait]
pub trait PetStore: Send + Sync {
    async fn find_all(&self) -> DatabaseResult<Vec<Pet>>;

    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<Pet>>;

    async fn find_by_owner(&self, owner_id: Uuid) -> DatabaseResult<Vec<Pet>>;

    async fn create(&self, new_pet: &NewPet) -> DatabaseResult<Pet>;

    async fn update(&self, id: Uuid, update: &UpdatePet) -> DatabaseResult<Option<Pet>>;

    /// Removes the pet and drops it from every user's liked set
    async fn delete(&self, id: Uuid) -> DatabaseResult<bool>;
}
