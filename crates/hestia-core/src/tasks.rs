use chrono::NaiveDate;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::import::Row;
use crate::model::{Priority, Task};
use crate::notify::Notice;
use crate::store::ReduceContext;

const TITLE_ALIASES: &[&str] = &["title", "Tarea", "Nombre"];
const DESCRIPTION_ALIASES: &[&str] = &["description", "Descripcion"];
const PRIORITY_ALIASES: &[&str] = &["priority", "Prioridad"];
const DUE_ALIASES: &[&str] = &["dueDate", "Fecha"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y"];

#[derive(Debug, Clone, PartialEq)]
pub enum TaskAction {
    Add { title: String, priority: Priority },
    Toggle(Uuid),
    Update { id: Uuid, patch: TaskPatch },
    Delete(Uuid),
    /// Converted tasks, inserted as one block at the top.
    Import(Vec<Task>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: Option<NaiveDate>,
}

#[instrument(skip(tasks, ctx), fields(count = tasks.len()))]
pub fn reduce(
    tasks: &mut Vec<Task>,
    action: TaskAction,
    ctx: &ReduceContext,
) -> Result<Vec<Notice>, ValidationError> {
    match action {
        TaskAction::Add { title, priority } => {
            let title = title.trim().to_string();
            if title.is_empty() {
                return Err(ValidationError::Required { field: "title" });
            }
            tasks.insert(
                0,
                Task {
                    id: Uuid::new_v4(),
                    title,
                    description: String::new(),
                    completed: false,
                    priority,
                    due_date: ctx.today,
                },
            );
            Ok(vec![Notice::info("Tarea programada")])
        }
        TaskAction::Toggle(id) => {
            let task = find_mut(tasks, id)?;
            task.completed = !task.completed;
            debug!(%id, completed = task.completed, "toggled task");
            if task.completed {
                Ok(vec![Notice::success("¡Tarea completada!")])
            } else {
                Ok(vec![])
            }
        }
        TaskAction::Update { id, patch } => {
            if let Some(title) = patch.title.as_deref()
                && title.trim().is_empty()
            {
                return Err(ValidationError::Required { field: "title" });
            }
            let task = find_mut(tasks, id)?;
            if let Some(title) = patch.title {
                task.title = title.trim().to_string();
            }
            if let Some(description) = patch.description {
                task.description = description;
            }
            if let Some(priority) = patch.priority {
                task.priority = priority;
            }
            if let Some(due) = patch.due_date {
                task.due_date = due;
            }
            Ok(vec![])
        }
        TaskAction::Delete(id) => {
            let before = tasks.len();
            tasks.retain(|t| t.id != id);
            if tasks.len() == before {
                return Err(unknown(id));
            }
            Ok(vec![])
        }
        TaskAction::Import(imported) => {
            let count = imported.len();
            tasks.splice(0..0, imported);
            Ok(vec![Notice::success(format!(
                "{count} tareas importadas desde Excel"
            ))])
        }
    }
}

pub fn task_from_row(row: &Row, today: NaiveDate) -> Task {
    Task {
        id: Uuid::new_v4(),
        title: row
            .first(TITLE_ALIASES)
            .unwrap_or("Tarea importada")
            .to_string(),
        description: row.first(DESCRIPTION_ALIASES).unwrap_or_default().to_string(),
        completed: false,
        priority: row
            .first(PRIORITY_ALIASES)
            .and_then(Priority::parse_lenient)
            .unwrap_or_default(),
        due_date: row
            .first(DUE_ALIASES)
            .and_then(parse_due_date)
            .unwrap_or(today),
    }
}

pub fn parse_due_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let parsed = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok());
    if parsed.is_none() {
        debug!(value = raw, "unrecognised due date");
    }
    parsed
}

pub fn pending_count(tasks: &[Task]) -> usize {
    tasks.iter().filter(|t| !t.completed).count()
}

fn find_mut(tasks: &mut [Task], id: Uuid) -> Result<&mut Task, ValidationError> {
    tasks
        .iter_mut()
        .find(|t| t.id == id)
        .ok_or_else(|| unknown(id))
}

fn unknown(id: Uuid) -> ValidationError {
    ValidationError::UnknownId {
        entity: "task",
        id: id.to_string(),
    }
}
