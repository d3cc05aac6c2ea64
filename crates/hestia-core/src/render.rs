use std::io::{self, IsTerminal, Write};

use chrono::NaiveDate;
use unicode_width::UnicodeWidthStr;
use uuid::Uuid;

use crate::assistant::{ChatMessage, Role};
use crate::calendar::MonthGrid;
use crate::config::Config;
use crate::dashboard::DashboardSummary;
use crate::model::{InventoryItem, Notification, NotificationKind, Priority, Recipe, Task, User};
use crate::recipes::missing_ingredients;

const SHORT_ID_LEN: usize = 8;
const CALENDAR_CELL_WIDTH: usize = 6;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        Ok(Self { color: cfg.color()? })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip_all, fields(count = tasks.len()))]
    pub fn task_table<W: Write>(
        &self,
        out: &mut W,
        tasks: &[Task],
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        if tasks.is_empty() {
            writeln!(out, "No hay tareas.")?;
            return Ok(());
        }

        let headers = ["ID", "Hecha", "Prioridad", "Vence", "Tarea"];
        let rows = tasks
            .iter()
            .map(|task| {
                let due = task.due_date.format("%Y-%m-%d").to_string();
                let due = if !task.completed && task.due_date < today {
                    self.paint(&due, "31")
                } else {
                    due
                };
                let title = if task.description.is_empty() {
                    task.title.clone()
                } else {
                    format!("{} ({})", task.title, task.description)
                };
                vec![
                    self.paint(&short_id(task.id), "33"),
                    if task.completed { "[x]" } else { "[ ]" }.to_string(),
                    self.paint_priority(task.priority),
                    due,
                    title,
                ]
            })
            .collect();

        write_table(out, &headers, rows)
    }

    #[tracing::instrument(skip_all, fields(count = items.len()))]
    pub fn inventory_table<W: Write>(
        &self,
        out: &mut W,
        items: &[InventoryItem],
    ) -> anyhow::Result<()> {
        if items.is_empty() {
            writeln!(out, "El inventario está vacío.")?;
            return Ok(());
        }

        let headers = ["ID", "Artículo", "Categoría", "Cantidad", "Mínimo", "Estado"];
        let rows = items
            .iter()
            .map(|item| {
                let status = if item.is_low_stock() {
                    self.paint("BAJO", "31")
                } else {
                    self.paint("OK", "32")
                };
                vec![
                    self.paint(&short_id(item.id), "33"),
                    item.name.clone(),
                    item.category.clone(),
                    format!("{} {}", item.quantity, item.unit),
                    item.min_quantity.to_string(),
                    status,
                ]
            })
            .collect();

        write_table(out, &headers, rows)
    }

    #[tracing::instrument(skip_all, fields(count = recipes.len()))]
    pub fn recipe_table<W: Write>(
        &self,
        out: &mut W,
        recipes: &[Recipe],
        inventory: &[InventoryItem],
    ) -> anyhow::Result<()> {
        if recipes.is_empty() {
            writeln!(out, "No hay recetas guardadas.")?;
            return Ok(());
        }

        let headers = ["ID", "Receta", "Tiempo", "Ingredientes", "Faltan"];
        let rows = recipes
            .iter()
            .map(|recipe| {
                let missing = missing_ingredients(recipe, inventory).len();
                let missing = if missing == 0 {
                    self.paint("0", "32")
                } else {
                    self.paint(&missing.to_string(), "31")
                };
                vec![
                    self.paint(&short_id(recipe.id), "33"),
                    recipe.title.clone(),
                    recipe.prep_time.clone(),
                    recipe.ingredients.len().to_string(),
                    missing,
                ]
            })
            .collect();

        write_table(out, &headers, rows)
    }

    pub fn recipe_detail<W: Write>(
        &self,
        out: &mut W,
        recipe: &Recipe,
        inventory: &[InventoryItem],
    ) -> anyhow::Result<()> {
        let missing = missing_ingredients(recipe, inventory);

        writeln!(out, "{}", self.paint(&recipe.title, "1"))?;
        writeln!(out, "id        {}", recipe.id)?;
        writeln!(out, "tiempo    {}", recipe.prep_time)?;
        writeln!(out)?;
        writeln!(out, "Ingredientes:")?;
        for ingredient in &recipe.ingredients {
            let mark = if missing.contains(&ingredient.as_str()) {
                self.paint("✗", "31")
            } else {
                self.paint("✓", "32")
            };
            writeln!(out, "  {mark} {ingredient}")?;
        }
        if !recipe.instructions.is_empty() {
            writeln!(out)?;
            writeln!(out, "Pasos:")?;
            for (idx, step) in recipe.instructions.iter().enumerate() {
                writeln!(out, "  {}. {step}", idx + 1)?;
            }
        }
        Ok(())
    }

    pub fn dashboard<W: Write>(
        &self,
        out: &mut W,
        summary: &DashboardSummary<'_>,
    ) -> anyhow::Result<()> {
        writeln!(
            out,
            "{} · {}",
            self.paint(&format!("Hola, {}", summary.user_name), "1"),
            summary.persona_label()
        )?;
        writeln!(out)?;
        writeln!(out, "Tareas pendientes  {}", summary.pending_tasks)?;
        let low = summary.low_stock_items.to_string();
        let low = if summary.low_stock_items > 0 {
            self.paint(&low, "31")
        } else {
            low
        };
        writeln!(out, "Stock bajo         {low}")?;
        writeln!(out, "Recetas            {}", summary.recipes)?;

        writeln!(out)?;
        writeln!(out, "Próximas tareas:")?;
        if summary.upcoming.is_empty() {
            writeln!(out, "  (ninguna)")?;
        }
        for task in &summary.upcoming {
            writeln!(
                out,
                "  {} {} [{}]",
                task.due_date.format("%Y-%m-%d"),
                task.title,
                self.paint_priority(task.priority)
            )?;
        }

        writeln!(out)?;
        writeln!(out, "Notificaciones:")?;
        if summary.notifications.is_empty() {
            writeln!(out, "  (sin novedades)")?;
        }
        for notification in &summary.notifications {
            write!(out, "  ")?;
            self.notification(out, notification)?;
        }
        Ok(())
    }

    pub fn calendar<W: Write>(&self, out: &mut W, grid: &MonthGrid<'_>) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(&grid.title(), "1"))?;
        for label in grid.weekday_labels() {
            write!(out, "{}", pad(label, CALENDAR_CELL_WIDTH))?;
        }
        writeln!(out)?;

        for week in grid.weeks() {
            for cell in week {
                let text = match cell {
                    None => String::new(),
                    Some(day) => {
                        let label = chrono::Datelike::day(&day.date).to_string();
                        let label = match day.tasks.len() {
                            0 => label,
                            n => format!("{label}·{n}"),
                        };
                        if day.is_today {
                            self.paint(&label, "7")
                        } else if !day.tasks.is_empty() {
                            self.paint(&label, "36")
                        } else {
                            label
                        }
                    }
                };
                write!(out, "{}", pad(&text, CALENDAR_CELL_WIDTH))?;
            }
            writeln!(out)?;
        }

        let scheduled: Vec<_> = grid.days.iter().filter(|d| !d.tasks.is_empty()).collect();
        if !scheduled.is_empty() {
            writeln!(out)?;
        }
        for day in scheduled {
            for task in &day.tasks {
                let mark = if task.completed { "[x]" } else { "[ ]" };
                writeln!(
                    out,
                    "{} {mark} {} {}",
                    day.date.format("%d"),
                    self.paint(&short_id(task.id), "33"),
                    task.title
                )?;
            }
        }
        Ok(())
    }

    pub fn notification<W: Write>(
        &self,
        out: &mut W,
        notification: &Notification,
    ) -> anyhow::Result<()> {
        let tag = match notification.kind {
            NotificationKind::Info => self.paint("info", "36"),
            NotificationKind::Warning => self.paint("aviso", "31"),
            NotificationKind::Success => self.paint("ok", "32"),
        };
        writeln!(
            out,
            "[{tag}] {} ({})",
            notification.message,
            notification
                .timestamp
                .with_timezone(&chrono::Local)
                .format("%H:%M")
        )?;
        Ok(())
    }

    pub fn chat_message<W: Write>(&self, out: &mut W, message: &ChatMessage) -> anyhow::Result<()> {
        match message.role {
            Role::Assistant => writeln!(out, "{} {}", self.paint("HESTIA>", "1;36"), message.text)?,
            Role::User => writeln!(out, "{} {}", self.paint("tú>", "1"), message.text)?,
        }
        Ok(())
    }

    pub fn user<W: Write>(&self, out: &mut W, user: &User) -> anyhow::Result<()> {
        writeln!(out, "id        {}", user.id)?;
        writeln!(out, "nombre    {}", user.name)?;
        writeln!(out, "email     {}", user.email)?;
        writeln!(
            out,
            "perfil    {}",
            user.persona.map(|p| p.label()).unwrap_or("-")
        )?;
        Ok(())
    }

    fn paint_priority(&self, priority: Priority) -> String {
        let code = match priority {
            Priority::High => "31",
            Priority::Medium => "33",
            Priority::Low => "32",
        };
        self.paint(priority.label(), code)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

pub fn short_id(id: Uuid) -> String {
    id.simple().to_string()[..SHORT_ID_LEN].to_string()
}

fn pad(cell: &str, width: usize) -> String {
    let visible = UnicodeWidthStr::width(strip_ansi(cell).as_str());
    format!("{cell}{}", " ".repeat(width.saturating_sub(visible)))
}

fn write_table<W: Write>(writer: &mut W, headers: &[&str], rows: Vec<Vec<String>>) -> anyhow::Result<()> {
    let mut widths: Vec<usize> = headers.iter().map(|h| UnicodeWidthStr::width(*h)).collect();

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (header, width) in headers.iter().zip(&widths) {
        write!(writer, "{} ", pad(header, *width))?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (cell, width) in row.iter().zip(&widths) {
            write!(writer, "{} ", pad(cell, *width))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
