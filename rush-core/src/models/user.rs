use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Passenger,
    Driver,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Passenger => "passenger",
            Role::Driver => "driver",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "passenger" => Ok(Role::Passenger),
            "driver" => Ok(Role::Driver),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: Uuid,
    /// National identification number, digits only. Unique.
    pub id_user: String,
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub number: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    pub photo_url: Option<String>,
    pub car_ids: Vec<Uuid>,
    /// Trips this user holds a reservation on.
    pub reserved_trips: Vec<Uuid>,
    /// Trips this user offers as a driver.
    pub my_trips: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        id_user: String,
        name: String,
        last_name: String,
        email: String,
        number: String,
        password_hash: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            id_user,
            name,
            last_name,
            email,
            number,
            password_hash,
            role: Role::Passenger,
            photo_url: None,
            car_ids: Vec::new(),
            reserved_trips: Vec::new(),
            my_trips: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn owns_car(&self, car_id: &Uuid) -> bool {
        self.car_ids.contains(car_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_str() {
        assert_eq!("driver".parse::<Role>().unwrap(), Role::Driver);
        assert_eq!(Role::Passenger.to_string(), "passenger");
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_password_hash_is_never_serialized() {
        let user = User::new(
            "1001".into(),
            "Ana".into(),
            "Gomez".into(),
            "ana@campus.edu".into(),
            "3001234567".into(),
            "$argon2id$secret".into(),
        );
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "passenger");
    }
}
