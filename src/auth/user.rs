use oso::PolarClass;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Passenger,
    Driver,
    Admin,
}

impl Role {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Passenger => "passenger",
            Self::Driver => "driver",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "passenger" => Ok(Self::Passenger),
            "driver" => Ok(Self::Driver),
            "admin" => Ok(Self::Admin),
            _ => Err(Error::unauthenticated()),
        }
    }
}

/// An already authenticated caller, as handed over by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub role: Role,
}

impl User {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    pub fn passenger(id: Uuid) -> Self {
        Self::new(id, Role::Passenger)
    }

    pub fn driver(id: Uuid) -> Self {
        Self::new(id, Role::Driver)
    }

    pub fn admin(id: Uuid) -> Self {
        Self::new(id, Role::Admin)
    }
}

impl PolarClass for User {
    fn get_polar_class_builder() -> oso::ClassBuilder<User> {
        oso::Class::builder()
            .name("User")
            .add_attribute_getter("id", |recv: &User| recv.id.to_string())
            .add_attribute_getter("role", |recv: &User| recv.role.name().to_string())
    }

    fn get_polar_class() -> oso::Class {
        let builder = User::get_polar_class_builder();
        builder.build()
    }
}

#[test]
fn roles_parse_from_their_names() {
    for role in [Role::Passenger, Role::Driver, Role::Admin] {
        assert_eq!(role.name().parse::<Role>().unwrap(), role);
    }

    assert!("system".parse::<Role>().is_err());
}
