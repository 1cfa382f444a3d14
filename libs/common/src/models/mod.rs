//! Domain models shared by the auth and api services

pub mod pet;
pub mod user;

// Re-export for convenience
pub use pet::{NewPet, Pet, Sex, UpdatePet};
pub use user::{AccountType, NewUser, UpdateUser, User};
