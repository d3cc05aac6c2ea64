//! Application state: one active session, its bundle, and the notification
//! feed. Mutations go through [`AppStore::dispatch`], which reduces, persists
//! the whole bundle and then tells subscribers. The feed is stored per
//! account so later invocations (the dashboard, the assistant) still see it.

use chrono::{DateTime, Local, NaiveDate, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::auth::{self, Credentials, Registration};
use crate::bundle::Bundle;
use crate::datastore::DataStore;
use crate::error::{AuthError, StorageError, StoreError, ValidationError};
use crate::inventory::{self, InventoryAction};
use crate::model::{Notification, User};
use crate::notify::{Notice, NotificationFeed};
use crate::recipes::{self, RecipeAction};
use crate::session::Session;
use crate::tasks::{self, TaskAction};

/// Inputs a reducer may read besides the collection itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReduceContext {
    pub today: NaiveDate,
}

impl ReduceContext {
    pub fn now() -> Self {
        Self {
            today: Local::now().date_naive(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Tasks(TaskAction),
    Inventory(InventoryAction),
    Recipes(RecipeAction),
}

impl From<TaskAction> for Action {
    fn from(action: TaskAction) -> Self {
        Action::Tasks(action)
    }
}

impl From<InventoryAction> for Action {
    fn from(action: InventoryAction) -> Self {
        Action::Inventory(action)
    }
}

impl From<RecipeAction> for Action {
    fn from(action: RecipeAction) -> Self {
        Action::Recipes(action)
    }
}

/// What subscribers see after every change.
#[derive(Debug, Clone, Copy)]
pub struct StateSnapshot<'a> {
    pub user: Option<&'a User>,
    pub bundle: &'a Bundle,
    pub notifications: &'a NotificationFeed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&StateSnapshot<'_>) + Send>;

pub struct AppStore {
    data: DataStore,
    session: Option<Session>,
    bundle: Bundle,
    feed: NotificationFeed,
    persona_missing: bool,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl AppStore {
    /// Opens the store and resumes the persisted session, if any.
    #[instrument(skip(data))]
    pub fn open(mut data: DataStore) -> Result<Self, AuthError> {
        let mut feed = NotificationFeed::new();
        let mut persona_missing = false;
        let session = match auth::restore(&mut data) {
            Ok(session) => session,
            Err(AuthError::MissingPersona) => {
                warn!("stored session has no persona; signed out");
                feed.push(Notice::warning(AuthError::MissingPersona.to_string()), Utc::now());
                persona_missing = true;
                None
            }
            Err(err) => return Err(err),
        };
        let bundle = match &session {
            Some(s) => {
                feed = NotificationFeed::from_entries(data.load_notifications(s.user.id)?);
                data.load_bundle(s.user.id)?
            }
            None => Bundle::default(),
        };
        debug!(active = session.is_some(), "opened application store");
        Ok(Self {
            data,
            session,
            bundle,
            feed,
            persona_missing,
            listeners: Vec::new(),
            next_subscription: 0,
        })
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn user(&self) -> Option<&User> {
        self.session.as_ref().map(|s| &s.user)
    }

    /// The signed-in user. A session dropped at startup for lacking a
    /// persona is reported as such instead of as a plain missing session.
    pub fn require_user(&self) -> Result<&User, StoreError> {
        match self.user() {
            Some(user) => Ok(user),
            None if self.persona_missing => Err(AuthError::MissingPersona.into()),
            None => Err(StoreError::NoSession),
        }
    }

    pub fn bundle(&self) -> &Bundle {
        &self.bundle
    }

    pub fn notifications(&self) -> &NotificationFeed {
        &self.feed
    }

    pub fn register(&mut self, registration: Registration) -> Result<User, AuthError> {
        let session = auth::register(&mut self.data, registration, Utc::now())?;
        let user = session.user.clone();
        self.switch_account(session)?;
        Ok(user)
    }

    pub fn login(&mut self, credentials: Credentials) -> Result<User, AuthError> {
        let session = auth::login(&mut self.data, credentials, Utc::now())?;
        let user = session.user.clone();
        self.switch_account(session)?;
        Ok(user)
    }

    #[instrument(skip(self))]
    pub fn logout(&mut self) -> Result<Notification, AuthError> {
        auth::logout(&mut self.data)?;
        self.session = None;
        self.bundle = Bundle::default();
        self.feed = NotificationFeed::new();
        let notification = self.push_notice(Notice::info("Sesión terminada correctamente"), Utc::now());
        self.emit();
        Ok(notification)
    }

    /// Replaces the visible dataset with the one stored for `session`'s
    /// account. Nothing from the previous account is carried over.
    #[instrument(skip(self, session), fields(user = %session.user.id))]
    pub fn switch_account(&mut self, session: Session) -> Result<(), AuthError> {
        let bundle = self.data.load_bundle(session.user.id)?;
        let feed = NotificationFeed::from_entries(self.data.load_notifications(session.user.id)?);
        info!(
            tasks = bundle.tasks.len(),
            inventory = bundle.inventory.len(),
            recipes = bundle.recipes.len(),
            "switched account"
        );
        self.bundle = bundle;
        self.feed = feed;
        self.session = Some(session);
        self.persona_missing = false;
        self.emit();
        Ok(())
    }

    /// Applies `action`, stores the whole bundle and returns the
    /// notifications it produced, newest last.
    #[instrument(skip(self, action))]
    pub fn dispatch(&mut self, action: impl Into<Action>) -> Result<Vec<Notification>, StoreError> {
        self.dispatch_with(action.into(), ReduceContext::now())
    }

    pub fn dispatch_with(
        &mut self,
        action: Action,
        ctx: ReduceContext,
    ) -> Result<Vec<Notification>, StoreError> {
        let account_id = self.require_user()?.id;

        // Reduce a copy so a rejected action leaves state untouched.
        let mut next = self.bundle.clone();
        let notices = match action {
            Action::Tasks(a) => tasks::reduce(&mut next.tasks, a, &ctx)?,
            Action::Inventory(a) => inventory::reduce(&mut next.inventory, a)?,
            Action::Recipes(a) => recipes::reduce(&mut next.recipes, a)?,
        };

        self.data.save_bundle(account_id, &next)?;
        self.bundle = next;

        let now = Utc::now();
        let emitted: Vec<Notification> = notices
            .into_iter()
            .map(|notice| self.push_notice(notice, now))
            .collect();
        if !emitted.is_empty() {
            self.save_feed()?;
        }
        self.emit();
        Ok(emitted)
    }

    /// Adds a notification that did not come from a reducer.
    pub fn notify(&mut self, notice: Notice) -> Result<Notification, StoreError> {
        let notification = self.push_notice(notice, Utc::now());
        self.save_feed()?;
        self.emit();
        Ok(notification)
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&StateSnapshot<'_>) + Send + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    fn push_notice(&mut self, notice: Notice, now: DateTime<Utc>) -> Notification {
        self.feed.push(notice, now).clone()
    }

    /// Signed-out feeds are not stored.
    fn save_feed(&mut self) -> Result<(), StorageError> {
        let Some(session) = &self.session else {
            return Ok(());
        };
        self.data.save_notifications(session.user.id, &self.feed.to_vec())
    }

    fn emit(&mut self) {
        let snapshot = StateSnapshot {
            user: self.session.as_ref().map(|s| &s.user),
            bundle: &self.bundle,
            notifications: &self.feed,
        };
        for (_, listener) in &mut self.listeners {
            listener(&snapshot);
        }
    }
}

impl std::fmt::Debug for AppStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppStore")
            .field("user", &self.user().map(|u| u.id))
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

/// Resolves a full id or a unique id prefix, the way commands accept
/// abbreviations.
pub fn resolve_id<T>(
    items: &[T],
    raw: &str,
    entity: &'static str,
    id_of: impl Fn(&T) -> Uuid,
) -> Result<Uuid, ValidationError> {
    let needle = raw.trim().to_ascii_lowercase();
    if needle.is_empty() {
        return Err(ValidationError::Required { field: "id" });
    }

    let mut matches = items.iter().map(&id_of).filter(|id| {
        id.to_string().starts_with(&needle) || id.simple().to_string().starts_with(&needle)
    });
    let Some(first) = matches.next() else {
        return Err(ValidationError::UnknownId {
            entity,
            id: raw.to_string(),
        });
    };
    if matches.next().is_some() {
        return Err(ValidationError::AmbiguousId {
            entity,
            prefix: raw.to_string(),
        });
    }
    Ok(first)
}
