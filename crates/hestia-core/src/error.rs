use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("stored value under `{key}` is not valid: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize value for `{key}`: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("bundle schema version {found} is newer than the supported version {supported}")]
    UnsupportedSchema { found: u32, supported: u32 },

    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),
}

/// Credential and account failures. The messages are shown to the user as-is.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Por favor, completa todos los campos, incluyendo tu perfil.")]
    MissingFields,

    #[error("El correo electrónico ya está registrado.")]
    DuplicateEmail,

    #[error("Credenciales incorrectas o cuenta inexistente.")]
    InvalidCredentials,

    #[error("Error: Perfil no definido. Por favor re-registra tu cuenta.")]
    MissingPersona,

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: &'static str },

    #[error("no {entity} matches `{id}`")]
    UnknownId { entity: &'static str, id: String },

    #[error("`{prefix}` matches more than one {entity}")]
    AmbiguousId { entity: &'static str, prefix: String },
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("unsupported spreadsheet type: {0} (expected .xlsx, .xls or .csv)")]
    UnsupportedExtension(String),

    #[error("failed to read workbook: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("workbook has no sheets")]
    NoSheets,

    #[error("failed to read csv: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no active session; run `hestia login` first")]
    NoSession,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
