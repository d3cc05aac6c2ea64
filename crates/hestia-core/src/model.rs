use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Persona {
    #[serde(rename = "Ama de Casa", alias = "Housewife")]
    Housewife,
    #[serde(rename = "Estudiante", alias = "Student")]
    Student,
    #[serde(rename = "Persona Común", alias = "Common Person")]
    CommonPerson,
}

impl Persona {
    pub const ALL: [Persona; 3] = [Persona::Housewife, Persona::Student, Persona::CommonPerson];

    pub fn label(self) -> &'static str {
        match self {
            Persona::Housewife => "Ama de Casa",
            Persona::Student => "Estudiante",
            Persona::CommonPerson => "Persona Común",
        }
    }

    /// Tone guidance handed to the assistant for this persona.
    pub fn focus(self) -> &'static str {
        match self {
            Persona::Housewife => "Enfócate en eficiencia del hogar, organización familiar y ahorro.",
            Persona::Student => {
                "Enfócate en productividad, estudio y recetas rápidas/económicas."
            }
            Persona::CommonPerson => {
                "Un equilibrio entre vida laboral, personal y hobbies."
            }
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Persona {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        match key.as_str() {
            "housewife" | "ama de casa" | "ama-de-casa" | "ama" => Ok(Persona::Housewife),
            "student" | "estudiante" => Ok(Persona::Student),
            "common" | "common person" | "common-person" | "persona común" | "persona comun"
            | "comun" | "común" => Ok(Persona::CommonPerson),
            _ => Err(anyhow!(
                "unknown persona `{s}` (expected housewife, student or common)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Priority {
    #[serde(rename = "Baja", alias = "Low")]
    Low,
    #[default]
    #[serde(rename = "Media", alias = "Medium")]
    Medium,
    #[serde(rename = "Alta", alias = "High")]
    High,
}

impl Priority {
    pub fn label(self) -> &'static str {
        match self {
            Priority::Low => "Baja",
            Priority::Medium => "Media",
            Priority::High => "Alta",
        }
    }

    pub fn parse_lenient(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "baja" | "low" | "l" => Some(Priority::Low),
            "media" | "medium" | "m" => Some(Priority::Medium),
            "alta" | "high" | "h" => Some(Priority::High),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Priority::parse_lenient(s)
            .ok_or_else(|| anyhow!("unknown priority `{s}` (expected low, medium or high)"))
    }
}

/// Public view of an account. Never carries credentials.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub persona: Option<Persona>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub persona: Option<Persona>,
    pub password_hash: String,
    /// Token of the most recent sign-in; a stored session must present it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
}

impl Account {
    pub fn to_user(&self) -> User {
        User {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            persona: self.persona,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub priority: Priority,
    pub due_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub category: String,
    pub quantity: u32,
    pub unit: String,
    pub min_quantity: u32,
}

impl InventoryItem {
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.min_quantity
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default)]
    pub prep_time: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Warning,
    Success,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub id: Uuid,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub timestamp: DateTime<Utc>,
}
