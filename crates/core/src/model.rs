//! Records held by the status store and the closed vocabularies they use.
//!
//! Identifiers are integer newtypes so an entity id can never be passed where a user id is
//! expected. Tag enums (`DataType`, `ItemStatus`, `EntityType`) are stored as their lowercase
//! snake_case tags, which are also their wire form.

use crate::{AccessError, AccessResult};
use alinea_types::{EmailAddress, NonEmptyText};
use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.0))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                i64::column_result(value).map(Self)
            }
        }
    };
}

macro_rules! sql_tag {
    ($name:ident) => {
        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: AccessError| FromSqlError::Other(Box::new(e)))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

record_id!(
    /// Primary key of an [`Entity`].
    EntityId
);
record_id!(
    /// Primary key of a [`User`].
    UserId
);
record_id!(
    /// Primary key of an [`AccessRequest`].
    AccessRequestId
);
record_id!(
    /// Primary key of an [`AccessRequestItem`].
    ItemId
);

/// Category of personal data an entity can ask for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    PersonalInfo,
    MedicalInfo,
    DentalQuestionnaire,
    PsychologicalInfo,
}

impl DataType {
    pub const ALL: [DataType; 4] = [
        DataType::PersonalInfo,
        DataType::MedicalInfo,
        DataType::DentalQuestionnaire,
        DataType::PsychologicalInfo,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DataType::PersonalInfo => "personal_info",
            DataType::MedicalInfo => "medical_info",
            DataType::DentalQuestionnaire => "dental_questionnaire",
            DataType::PsychologicalInfo => "psychological_info",
        }
    }

    /// Human readable label sent as `data_type_display`.
    pub fn label(self) -> &'static str {
        match self {
            DataType::PersonalInfo => "Personal Information",
            DataType::MedicalInfo => "Medical Information",
            DataType::DentalQuestionnaire => "Dental Questionnaire",
            DataType::PsychologicalInfo => "Psychological Information",
        }
    }

    /// Parses every tag in `tags`, failing on the first unknown one.
    pub fn parse_all<S: AsRef<str>>(tags: &[S]) -> AccessResult<Vec<DataType>> {
        tags.iter().map(|t| t.as_ref().parse()).collect()
    }
}

impl FromStr for DataType {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataType::ALL
            .into_iter()
            .find(|dt| dt.as_str() == s)
            .ok_or_else(|| AccessError::UnknownDataType(s.to_string()))
    }
}

sql_tag!(DataType);

/// Decision state of a single requested data type.
///
/// Items start `Pending`. The store accepts any value change afterwards; the HTTP and gRPC
/// surfaces only let callers set `Approved` or `Rejected`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Approved,
    Rejected,
}

impl ItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Approved => "approved",
            ItemStatus::Rejected => "rejected",
        }
    }

    /// Parses a status a caller may set directly: `approved` or `rejected`.
    pub fn parse_decision(s: &str) -> AccessResult<ItemStatus> {
        match s.parse()? {
            ItemStatus::Pending => Err(AccessError::InvalidStatus(format!(
                "{s} (expected approved or rejected)"
            ))),
            decided => Ok(decided),
        }
    }
}

impl FromStr for ItemStatus {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ItemStatus::Pending),
            "approved" => Ok(ItemStatus::Approved),
            "rejected" => Ok(ItemStatus::Rejected),
            other => Err(AccessError::InvalidStatus(other.to_string())),
        }
    }
}

sql_tag!(ItemStatus);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Clinic,
    Dentist,
    Hospital,
    Psychologist,
    Therapist,
    Pharmacy,
}

impl EntityType {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Clinic => "clinic",
            EntityType::Dentist => "dentist",
            EntityType::Hospital => "hospital",
            EntityType::Psychologist => "psychologist",
            EntityType::Therapist => "therapist",
            EntityType::Pharmacy => "pharmacy",
        }
    }
}

impl FromStr for EntityType {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clinic" => Ok(EntityType::Clinic),
            "dentist" => Ok(EntityType::Dentist),
            "hospital" => Ok(EntityType::Hospital),
            "psychologist" => Ok(EntityType::Psychologist),
            "therapist" => Ok(EntityType::Therapist),
            "pharmacy" => Ok(EntityType::Pharmacy),
            other => Err(AccessError::UnknownEntityType(other.to_string())),
        }
    }
}

sql_tag!(EntityType);

/// An organisation that can request data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub entity_type: EntityType,
    pub address: String,
    pub phone: String,
    pub email: Option<String>,
}

/// The owner of personal data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone_number: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct AccessRequest {
    pub id: AccessRequestId,
    pub entity_id: EntityId,
    pub user_id: UserId,
    pub requested_at: DateTime<Utc>,
    pub purpose: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct AccessRequestItem {
    pub id: ItemId,
    pub access_request_id: AccessRequestId,
    pub data_type: DataType,
    pub status: ItemStatus,
    pub status_set_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub rejection_reason: Option<String>,
}

#[derive(Clone, Debug)]
pub struct NewEntity {
    pub name: NonEmptyText,
    pub entity_type: EntityType,
    pub address: String,
    pub phone: String,
    pub email: Option<EmailAddress>,
}

#[derive(Clone, Debug)]
pub struct NewUser {
    pub username: NonEmptyText,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<EmailAddress>,
    pub phone_number: String,
}

/// Optional filters for listing access requests.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestFilter {
    pub entity_id: Option<EntityId>,
    pub user_id: Option<UserId>,
}

/// A field-level edit to an item, as applied by a save.
///
/// `None` leaves the field untouched. `rejection_reason: Some(None)` clears the reason.
#[derive(Clone, Debug, Default)]
pub struct ItemUpdate {
    pub status: Option<ItemStatus>,
    pub rejection_reason: Option<Option<String>>,
}
