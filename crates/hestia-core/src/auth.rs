//! Local accounts. Passwords are stored only as Argon2id PHC strings.

use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::datastore::DataStore;
use crate::error::AuthError;
use crate::model::{Account, Persona};
use crate::session::Session;

#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub name: String,
    pub persona: Option<Persona>,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[instrument(skip(store, registration), fields(email = %registration.email))]
pub fn register(
    store: &mut DataStore,
    registration: Registration,
    now: DateTime<Utc>,
) -> Result<Session, AuthError> {
    let Registration {
        email,
        password,
        name,
        persona,
    } = registration;

    if email.trim().is_empty() || password.is_empty() || name.trim().is_empty() {
        return Err(AuthError::MissingFields);
    }
    let Some(persona) = persona else {
        return Err(AuthError::MissingFields);
    };

    let mut accounts = store.load_accounts()?;
    if accounts.iter().any(|account| account.email == email) {
        debug!("email already registered");
        return Err(AuthError::DuplicateEmail);
    }

    let mut account = Account {
        id: Uuid::new_v4(),
        email,
        name,
        persona: Some(persona),
        password_hash: hash_password(&password)?,
        session_token: None,
    };
    let session = Session::issue(account.to_user(), now);
    account.session_token = Some(session.token.clone());

    accounts.push(account);
    store.save_accounts(&accounts)?;
    store.save_session(&session)?;

    info!(user = %session.user.id, "registered account");
    Ok(session)
}

#[instrument(skip(store, credentials), fields(email = %credentials.email))]
pub fn login(
    store: &mut DataStore,
    credentials: Credentials,
    now: DateTime<Utc>,
) -> Result<Session, AuthError> {
    if credentials.email.trim().is_empty() || credentials.password.is_empty() {
        return Err(AuthError::MissingFields);
    }

    let mut accounts = store.load_accounts()?;
    let found = accounts
        .iter_mut()
        .find(|account| account.email == credentials.email)
        .filter(|account| verify_password(&credentials.password, &account.password_hash));

    let Some(account) = found else {
        warn!("login rejected");
        return Err(AuthError::InvalidCredentials);
    };
    if account.persona.is_none() {
        warn!(user = %account.id, "account has no persona; login refused");
        return Err(AuthError::MissingPersona);
    }

    let session = Session::issue(account.to_user(), now);
    account.session_token = Some(session.token.clone());
    store.save_accounts(&accounts)?;
    store.save_session(&session)?;
    info!(user = %session.user.id, "logged in");
    Ok(session)
}

/// Reloads the persisted session, dropping it when its account is gone, its
/// token was superseded, or the account never had a persona.
#[instrument(skip(store))]
pub fn restore(store: &mut DataStore) -> Result<Option<Session>, AuthError> {
    let Some(mut session) = store.load_session()? else {
        return Ok(None);
    };

    let accounts = store.load_accounts()?;
    let Some(account) = accounts.iter().find(|a| a.id == session.user.id) else {
        warn!(user = %session.user.id, "session refers to a missing account; clearing");
        store.clear_session()?;
        return Ok(None);
    };

    if account.session_token.as_deref() != Some(session.token.as_str()) {
        warn!(user = %session.user.id, "session token does not match the account; clearing");
        store.clear_session()?;
        return Ok(None);
    }

    if account.persona.is_none() {
        store.clear_session()?;
        return Err(AuthError::MissingPersona);
    }

    session.user = account.to_user();
    Ok(Some(session))
}

#[instrument(skip(store))]
pub fn logout(store: &mut DataStore) -> Result<(), AuthError> {
    store.clear_session()?;
    info!("session cleared");
    Ok(())
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let mut salt_bytes = [0_u8; 16];
    rand::rng().fill(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| AuthError::Hash(e.to_string()))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(err) => {
            warn!(error = %err, "stored password hash is unreadable");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(email: &str) -> Registration {
        Registration {
            email: email.to_string(),
            password: "hunter22".to_string(),
            name: "Ana".to_string(),
            persona: Some(Persona::Student),
        }
    }

    #[test]
    fn register_then_login_yields_the_same_user() {
        let mut store = DataStore::in_memory();
        let now = Utc::now();
        let registered = register(&mut store, registration("ana@example.com"), now).unwrap();

        let logged_in = login(
            &mut store,
            Credentials {
                email: "ana@example.com".to_string(),
                password: "hunter22".to_string(),
            },
            now,
        )
        .unwrap();

        assert_eq!(logged_in.user.id, registered.user.id);
        assert_eq!(logged_in.user.name, "Ana");
        assert_eq!(logged_in.user.persona, Some(Persona::Student));
        assert_ne!(logged_in.token, registered.token);
    }

    #[test]
    fn duplicate_email_is_rejected_without_touching_accounts() {
        let mut store = DataStore::in_memory();
        let now = Utc::now();
        register(&mut store, registration("ana@example.com"), now).unwrap();
        let before = serde_json::to_string(&store.load_accounts().unwrap()).unwrap();

        let mut again = registration("ana@example.com");
        again.name = "Otra".to_string();
        let err = register(&mut store, again, now).unwrap_err();

        assert!(matches!(err, AuthError::DuplicateEmail));
        let after = serde_json::to_string(&store.load_accounts().unwrap()).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn password_is_never_stored_in_plaintext() {
        let mut store = DataStore::in_memory();
        register(&mut store, registration("ana@example.com"), Utc::now()).unwrap();
        let accounts = store.load_accounts().unwrap();
        assert!(!accounts[0].password_hash.contains("hunter22"));
        assert!(accounts[0].password_hash.starts_with("$argon2id$"));
    }

    #[test]
    fn wrong_password_and_unknown_email_are_indistinguishable() {
        let mut store = DataStore::in_memory();
        let now = Utc::now();
        register(&mut store, registration("ana@example.com"), now).unwrap();

        let wrong = login(
            &mut store,
            Credentials {
                email: "ana@example.com".to_string(),
                password: "nope".to_string(),
            },
            now,
        );
        let unknown = login(
            &mut store,
            Credentials {
                email: "bob@example.com".to_string(),
                password: "hunter22".to_string(),
            },
            now,
        );
        assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));
        assert!(matches!(unknown, Err(AuthError::InvalidCredentials)));
    }

    #[test]
    fn missing_fields_are_validation_errors() {
        let mut store = DataStore::in_memory();
        let mut no_persona = registration("ana@example.com");
        no_persona.persona = None;
        assert!(matches!(
            register(&mut store, no_persona, Utc::now()),
            Err(AuthError::MissingFields)
        ));
        assert!(store.load_accounts().unwrap().is_empty());
    }

    #[test]
    fn restore_clears_sessions_for_deleted_accounts() {
        let mut store = DataStore::in_memory();
        register(&mut store, registration("ana@example.com"), Utc::now()).unwrap();
        assert!(restore(&mut store).unwrap().is_some());

        store.save_accounts(&[]).unwrap();
        assert!(restore(&mut store).unwrap().is_none());
        assert!(store.load_session().unwrap().is_none());
    }

    fn strip_persona(store: &mut DataStore) {
        let mut accounts = store.load_accounts().unwrap();
        accounts[0].persona = None;
        store.save_accounts(&accounts).unwrap();
    }

    #[test]
    fn login_refuses_accounts_without_persona() {
        let mut store = DataStore::in_memory();
        register(&mut store, registration("ana@example.com"), Utc::now()).unwrap();
        logout(&mut store).unwrap();
        strip_persona(&mut store);

        let err = login(
            &mut store,
            Credentials {
                email: "ana@example.com".to_string(),
                password: "hunter22".to_string(),
            },
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, AuthError::MissingPersona));
        assert!(store.load_session().unwrap().is_none());
    }

    #[test]
    fn restore_reports_and_clears_sessions_without_persona() {
        let mut store = DataStore::in_memory();
        register(&mut store, registration("ana@example.com"), Utc::now()).unwrap();
        strip_persona(&mut store);

        assert!(matches!(restore(&mut store), Err(AuthError::MissingPersona)));
        assert!(store.load_session().unwrap().is_none());
        assert!(restore(&mut store).unwrap().is_none());
    }

    #[test]
    fn a_later_login_supersedes_the_stored_session() {
        let mut store = DataStore::in_memory();
        let first = register(&mut store, registration("ana@example.com"), Utc::now()).unwrap();
        login(
            &mut store,
            Credentials {
                email: "ana@example.com".to_string(),
                password: "hunter22".to_string(),
            },
            Utc::now(),
        )
        .unwrap();

        store.save_session(&first).unwrap();
        assert!(restore(&mut store).unwrap().is_none());
        assert!(store.load_session().unwrap().is_none());
    }
}
