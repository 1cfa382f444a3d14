//! Pet listing model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "male",
            Sex::Female => "female",
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sex {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" => Ok(Sex::Male),
            "female" => Ok(Sex::Female),
            other => Err(format!("Unknown sex: {}", other)),
        }
    }
}

/// Pet listing entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pet {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub pet_type: String,
    pub breed: Option<String>,
    pub age: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub weight: f64,
    pub sterilized: Option<bool>,
    pub sex: Option<Sex>,
    pub description: String,
    pub city: Option<String>,
    pub price: Option<f64>,
    pub images: Vec<String>,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New pet creation payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewPet {
    pub name: String,
    #[serde(rename = "type")]
    pub pet_type: String,
    pub breed: Option<String>,
    pub age: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub weight: f64,
    pub sterilized: Option<bool>,
    pub sex: Option<Sex>,
    pub description: String,
    pub city: Option<String>,
    pub price: Option<f64>,
    pub images: Vec<String>,
    pub owner_id: Uuid,
}

/// Pet update payload; `None` leaves the stored value untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePet {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub pet_type: Option<String>,
    pub breed: Option<String>,
    pub age: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub weight: Option<f64>,
    pub sterilized: Option<bool>,
    pub sex: Option<Sex>,
    pub description: Option<String>,
    pub city: Option<String>,
    pub price: Option<f64>,
    pub images: Option<Vec<String>>,
}

impl UpdatePet {
    /// Apply the present fields onto an existing pet
    pub fn apply_to(self, pet: &mut Pet) {
        if let Some(name) = self.name {
            pet.name = name;
        }
        if let Some(pet_type) = self.pet_type {
            pet.pet_type = pet_type;
        }
        if self.breed.is_some() {
            pet.breed = self.breed;
        }
        if self.age.is_some() {
            pet.age = self.age;
        }
        if self.birth_date.is_some() {
            pet.birth_date = self.birth_date;
        }
        if let Some(weight) = self.weight {
            pet.weight = weight;
        }
        if self.sterilized.is_some() {
            pet.sterilized = self.sterilized;
        }
        if self.sex.is_some() {
            pet.sex = self.sex;
        }
        if let Some(description) = self.description {
            pet.description = description;
        }
        if self.city.is_some() {
            pet.city = self.city;
        }
        if self.price.is_some() {
            pet.price = self.price;
        }
        if let Some(images) = self.images {
            pet.images = images;
        }
        pet.updated_at = Utc::now();
    }
}
