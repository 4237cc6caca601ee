use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A vehicle registered by a user. `passengers` bounds the capacity of every
/// trip offered with it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Car {
    pub id: Uuid,
    pub owner_id: Uuid,
    /// License plate, three letters followed by three digits.
    pub plate: String,
    pub passengers: u32,
    pub brand: String,
    /// Model year.
    pub model: String,
    pub photo_car_url: Option<String>,
    pub photo_soat_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Car {
    pub fn new(owner_id: Uuid, plate: String, passengers: u32, brand: String, model: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            plate,
            passengers,
            brand,
            model,
            photo_car_url: None,
            photo_soat_url: None,
            created_at: Utc::now(),
        }
    }
}
