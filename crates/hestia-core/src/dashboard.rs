use crate::bundle::Bundle;
use crate::inventory::low_stock_count;
use crate::model::{Notification, Persona, Task};
use crate::notify::NotificationFeed;
use crate::tasks::pending_count;

pub const UPCOMING_LIMIT: usize = 5;

/// Read-only overview of one account's household.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSummary<'a> {
    pub user_name: &'a str,
    pub persona: Option<Persona>,
    pub pending_tasks: usize,
    pub low_stock_items: usize,
    pub recipes: usize,
    pub upcoming: Vec<&'a Task>,
    pub notifications: Vec<&'a Notification>,
}

impl<'a> DashboardSummary<'a> {
    pub fn build(
        user_name: &'a str,
        persona: Option<Persona>,
        bundle: &'a Bundle,
        feed: &'a NotificationFeed,
    ) -> Self {
        Self {
            user_name,
            persona,
            pending_tasks: pending_count(&bundle.tasks),
            low_stock_items: low_stock_count(&bundle.inventory),
            recipes: bundle.recipes.len(),
            upcoming: bundle
                .tasks
                .iter()
                .filter(|t| !t.completed)
                .take(UPCOMING_LIMIT)
                .collect(),
            notifications: feed.iter().collect(),
        }
    }

    pub fn persona_label(&self) -> &'static str {
        self.persona.map(Persona::label).unwrap_or("Sin perfil")
    }
}
