//! API models for request and response payloads

use chrono::NaiveDate;
use common::models::{AccountType, NewPet, Sex, UpdatePet};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

/// Text fields of a multipart pet form
///
/// Blank values count as absent.
#[derive(Debug, Default, Clone)]
pub struct PetForm {
    pub name: Option<String>,
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
}

impl PetForm {
    /// Record one text field; unknown field names are ignored
    pub fn set(&mut self, field: &str, value: &str) -> ApiResult<()> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(());
        }

        match field {
            "name" => self.name = Some(value.to_string()),
            "type" => self.pet_type = Some(value.to_string()),
            "breed" => self.breed = Some(value.to_string()),
            "age" => self.age = Some(value.to_string()),
            "birth_date" => {
                let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
                    ApiError::BadRequest("birth_date must be formatted as YYYY-MM-DD".to_string())
                })?;
                self.birth_date = Some(date);
            }
            "weight" => self.weight = Some(parse_number("weight", value)?),
            "sterilized" => {
                let sterilized = match value.to_ascii_lowercase().as_str() {
                    "true" => true,
                    "false" => false,
                    _ => {
                        return Err(ApiError::BadRequest(
                            "sterilized must be true or false".to_string(),
                        ));
                    }
                };
                self.sterilized = Some(sterilized);
            }
            "sex" => self.sex = Some(value.parse().map_err(ApiError::BadRequest)?),
            "description" => self.description = Some(value.to_string()),
            "city" => self.city = Some(value.to_string()),
            "price" => self.price = Some(parse_number("price", value)?),
            _ => {}
        }

        Ok(())
    }

    /// Payload for a new listing; name and type are required
    pub fn into_new_pet(self, owner_id: Uuid, images: Vec<String>) -> ApiResult<NewPet> {
        let name = self
            .name
            .ok_or_else(|| ApiError::BadRequest("name is required".to_string()))?;
        let pet_type = self
            .pet_type
            .ok_or_else(|| ApiError::BadRequest("type is required".to_string()))?;

        Ok(NewPet {
            name,
            pet_type,
            breed: self.breed,
            age: self.age,
            birth_date: self.birth_date,
            weight: self.weight.unwrap_or(0.0),
            sterilized: self.sterilized,
            sex: self.sex,
            description: self.description.unwrap_or_default(),
            city: self.city,
            price: self.price,
            images,
            owner_id,
        })
    }

    /// Partial update; uploaded images replace the stored ones
    pub fn into_update(self, images: Vec<String>) -> UpdatePet {
        UpdatePet {
            name: self.name,
            pet_type: self.pet_type,
            breed: self.breed,
            age: self.age,
            birth_date: self.birth_date,
            weight: self.weight,
            sterilized: self.sterilized,
            sex: self.sex,
            description: self.description,
            city: self.city,
            price: self.price,
            images: if images.is_empty() { None } else { Some(images) },
        }
    }
}

fn parse_number(field: &str, value: &str) -> ApiResult<f64> {
    value
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite() && *n >= 0.0)
        .ok_or_else(|| ApiError::BadRequest(format!("{} must be a non-negative number", field)))
}

/// Request for a profile update; absent fields are left unchanged
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company_name: Option<String>,
    pub phone: Option<String>,
    pub account_type: Option<AccountType>,
    pub telegram: Option<String>,
    pub instagram: Option<String>,
    pub password: Option<String>,
}

/// Response for like and unlike
#[derive(Debug, Serialize)]
pub struct LikeResponse {
    pub pet_id: Uuid,
    pub liked: bool,
}
