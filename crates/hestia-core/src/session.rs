use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};

use crate::model::User;

const TOKEN_LEN: usize = 40;

/// The authenticated user, persisted under `activeUser` so a restart resumes it.
///
/// `token` is also recorded on the account; a session whose token no longer
/// matches (a later sign-in, a copied file) is not resumed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user: User,
    pub token: String,
    pub issued_at: DateTime<Utc>,
}

impl Session {
    pub fn issue(user: User, now: DateTime<Utc>) -> Self {
        let token = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LEN)
            .map(char::from)
            .collect();
        Self {
            user,
            token,
            issued_at: now,
        }
    }
}
