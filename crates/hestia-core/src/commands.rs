use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{Context, anyhow};
use chrono::Local;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::assistant::{Assistant, AssistantContext, GeminiProvider, SendOutcome};
use crate::auth::{Credentials, Registration};
use crate::calendar::{self, google_calendar_url, month_grid, parse_month, shift_months};
use crate::cli::{
    CalendarArgs, Command, InventoryCommand, LoginArgs, RecipeCommand, RegisterArgs, TaskCommand, join_words,
};
use crate::config::Config;
use crate::dashboard::DashboardSummary;
use crate::error::AuthError;
use crate::import::{Row, import_with};
use crate::inventory::{InventoryAction, ItemPatch, NewItem, item_from_row};
use crate::model::Notification;
use crate::recipes::{NewRecipe, RecipeAction, RecipePatch, parse_ingredients, parse_instructions, recipe_from_row};
use crate::render::Renderer;
use crate::store::{Action, AppStore, resolve_id};
use crate::tasks::{TaskAction, TaskPatch, parse_due_date, task_from_row};

const EXIT_COMMAND: &str = "/exit";
const FEED_COMMAND: &str = "/notifications";

#[instrument(skip_all)]
pub fn dispatch(store: &mut AppStore, cfg: &Config, renderer: &Renderer, command: Command) -> anyhow::Result<()> {
    debug!(?command, "dispatching command");

    match command {
        Command::Register(args) => cmd_register(store, args),
        Command::Login(args) => cmd_login(store, args),
        Command::Logout => cmd_logout(store, renderer),
        Command::Whoami => {
            let user = store.require_user()?;
            renderer.user(&mut io::stdout().lock(), user)
        }
        Command::Dashboard => cmd_dashboard(store, renderer),
        Command::Task(sub) => cmd_task(store, cfg, renderer, sub),
        Command::Inventory(sub) => cmd_inventory(store, renderer, sub),
        Command::Recipe(sub) => cmd_recipe(store, renderer, sub),
        Command::Calendar(args) => cmd_calendar(store, cfg, renderer, args),
        Command::Chat { text } => cmd_chat(store, cfg, renderer, &text),
    }
}

fn cmd_register(store: &mut AppStore, args: RegisterArgs) -> anyhow::Result<()> {
    info!("command register");
    let password = password_or_prompt(args.password)?;
    let user = store.register(Registration {
        email: args.email,
        password,
        name: args.name,
        persona: Some(args.persona),
    })?;
    println!("Bienvenido a HESTIA, {}.", user.name);
    Ok(())
}

fn cmd_login(store: &mut AppStore, args: LoginArgs) -> anyhow::Result<()> {
    info!("command login");
    let password = password_or_prompt(args.password)?;
    let user = store.login(Credentials {
        email: args.email,
        password,
    })?;
    println!("Hola de nuevo, {}.", user.name);
    Ok(())
}

fn cmd_logout(store: &mut AppStore, renderer: &Renderer) -> anyhow::Result<()> {
    info!("command logout");
    store.require_user()?;
    let notification = store.logout()?;
    renderer.notification(&mut io::stdout().lock(), &notification)
}

fn cmd_dashboard(store: &AppStore, renderer: &Renderer) -> anyhow::Result<()> {
    let user = store.require_user()?;
    let summary = DashboardSummary::build(&user.name, user.persona, store.bundle(), store.notifications());
    renderer.dashboard(&mut io::stdout().lock(), &summary)
}

#[instrument(skip(store, cfg, renderer))]
fn cmd_task(store: &mut AppStore, cfg: &Config, renderer: &Renderer, sub: TaskCommand) -> anyhow::Result<()> {
    let today = Local::now().date_naive();

    let action = match sub {
        TaskCommand::List { pending } => {
            store.require_user()?;
            let tasks: Vec<_> = store
                .bundle()
                .tasks
                .iter()
                .filter(|t| !pending || !t.completed)
                .cloned()
                .collect();
            return renderer.task_table(&mut io::stdout().lock(), &tasks, today);
        }
        TaskCommand::ExportCalendar { id } => return cmd_export_calendar(store, cfg, &id),
        TaskCommand::Add { title, priority } => TaskAction::Add {
            title: join_words(&title),
            priority,
        },
        TaskCommand::Toggle { id } => TaskAction::Toggle(task_id(store, &id)?),
        TaskCommand::Edit {
            id,
            title,
            description,
            priority,
            due,
        } => {
            let due_date = due
                .map(|raw| parse_due_date(&raw).ok_or_else(|| anyhow!("invalid due date: {raw} (expected YYYY-MM-DD)")))
                .transpose()?;
            TaskAction::Update {
                id: task_id(store, &id)?,
                patch: TaskPatch {
                    title,
                    description,
                    priority,
                    due_date,
                },
            }
        }
        TaskCommand::Delete { id } => TaskAction::Delete(task_id(store, &id)?),
        TaskCommand::Import { file } => TaskAction::Import(load_import(&file, |row| task_from_row(row, today))?),
    };

    apply(store, renderer, action)
}

#[instrument(skip(store, cfg))]
fn cmd_export_calendar(store: &AppStore, cfg: &Config, raw_id: &str) -> anyhow::Result<()> {
    let id = task_id(store, raw_id)?;
    let task = store
        .bundle()
        .tasks
        .iter()
        .find(|t| t.id == id)
        .ok_or_else(|| anyhow!("no task matches `{raw_id}`"))?;
    let url = google_calendar_url(task).ok_or_else(|| anyhow!("la tarea `{}` ya está completada", task.title))?;

    if cfg.calendar_open()?
        && let Err(err) = calendar::open_in_browser(&url)
    {
        warn!(error = %err, "could not open browser; printing link instead");
    }
    println!("{url}");
    Ok(())
}

#[instrument(skip(store, renderer))]
fn cmd_inventory(store: &mut AppStore, renderer: &Renderer, sub: InventoryCommand) -> anyhow::Result<()> {
    let action = match sub {
        InventoryCommand::List { low } => {
            store.require_user()?;
            let items: Vec<_> = store
                .bundle()
                .inventory
                .iter()
                .filter(|i| !low || i.is_low_stock())
                .cloned()
                .collect();
            return renderer.inventory_table(&mut io::stdout().lock(), &items);
        }
        InventoryCommand::Add {
            name,
            category,
            quantity,
            unit,
            min_quantity,
        } => InventoryAction::Add(NewItem {
            name: join_words(&name),
            category,
            quantity,
            unit,
            min_quantity,
        }),
        InventoryCommand::Adjust { id, delta } => InventoryAction::AdjustQuantity {
            id: item_id(store, &id)?,
            delta,
        },
        InventoryCommand::Edit {
            id,
            name,
            category,
            unit,
            min_quantity,
        } => InventoryAction::Update {
            id: item_id(store, &id)?,
            patch: ItemPatch {
                name,
                category,
                unit,
                min_quantity,
            },
        },
        InventoryCommand::Delete { id } => InventoryAction::Delete(item_id(store, &id)?),
        InventoryCommand::Import { file } => InventoryAction::Import(load_import(&file, item_from_row)?),
    };

    apply(store, renderer, action)
}

#[instrument(skip(store, renderer))]
fn cmd_recipe(store: &mut AppStore, renderer: &Renderer, sub: RecipeCommand) -> anyhow::Result<()> {
    let action = match sub {
        RecipeCommand::List => {
            store.require_user()?;
            let bundle = store.bundle();
            return renderer.recipe_table(&mut io::stdout().lock(), &bundle.recipes, &bundle.inventory);
        }
        RecipeCommand::Show { id } => {
            let id = recipe_id(store, &id)?;
            let bundle = store.bundle();
            let recipe = bundle
                .recipes
                .iter()
                .find(|r| r.id == id)
                .ok_or_else(|| anyhow!("recipe {id} disappeared"))?;
            return renderer.recipe_detail(&mut io::stdout().lock(), recipe, &bundle.inventory);
        }
        RecipeCommand::Add {
            title,
            ingredients,
            instructions,
            prep_time,
        } => RecipeAction::Add(NewRecipe {
            title: join_words(&title),
            ingredients: parse_ingredients(&ingredients),
            instructions: parse_instructions(&instructions),
            prep_time,
        }),
        RecipeCommand::Edit {
            id,
            title,
            ingredients,
            instructions,
            prep_time,
        } => RecipeAction::Update {
            id: recipe_id(store, &id)?,
            patch: RecipePatch {
                title,
                ingredients: ingredients.as_deref().map(parse_ingredients),
                instructions: instructions.as_deref().map(parse_instructions),
                prep_time,
            },
        },
        RecipeCommand::Delete { id } => RecipeAction::Delete(recipe_id(store, &id)?),
        RecipeCommand::Import { file } => RecipeAction::Import(load_import(&file, recipe_from_row)?),
    };

    apply(store, renderer, action)
}

#[instrument(skip(store, cfg, renderer))]
fn cmd_calendar(store: &AppStore, cfg: &Config, renderer: &Renderer, args: CalendarArgs) -> anyhow::Result<()> {
    store.require_user()?;
    let today = Local::now().date_naive();
    let mut focus = match args.month.as_deref() {
        Some(raw) => parse_month(raw).ok_or_else(|| anyhow!("invalid month: {raw} (expected YYYY-MM)"))?,
        None => today,
    };
    if args.prev {
        focus = shift_months(focus, -1);
    } else if args.next {
        focus = shift_months(focus, 1);
    }

    let grid = month_grid(focus, cfg.week_start()?, today, &store.bundle().tasks);
    renderer.calendar(&mut io::stdout().lock(), &grid)
}

#[instrument(skip_all)]
fn cmd_chat(store: &mut AppStore, cfg: &Config, renderer: &Renderer, words: &[String]) -> anyhow::Result<()> {
    let persona = store.require_user()?.persona.ok_or(AuthError::MissingPersona)?;
    let provider = GeminiProvider::new(cfg.gemini_settings()?)?;
    let mut assistant = Assistant::new(persona, cfg.temperature()?);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    if !words.is_empty() {
        return chat_turn(store, renderer, &runtime, &provider, &mut assistant, &join_words(words));
    }

    let stdin = io::stdin();
    let mut out = io::stdout().lock();
    if let Some(greeting) = assistant.transcript().first() {
        renderer.chat_message(&mut out, greeting)?;
    }
    writeln!(out, "(escribe {EXIT_COMMAND} para salir, {FEED_COMMAND} para ver avisos)")?;
    drop(out);

    for line in stdin.lock().lines() {
        let line = line.context("failed to read from stdin")?;
        match line.trim() {
            EXIT_COMMAND => break,
            FEED_COMMAND => {
                let mut out = io::stdout().lock();
                for notification in store.notifications().iter() {
                    renderer.notification(&mut out, notification)?;
                }
            }
            _ => chat_turn(store, renderer, &runtime, &provider, &mut assistant, &line)?,
        }
    }
    Ok(())
}

fn chat_turn(
    store: &mut AppStore,
    renderer: &Renderer,
    runtime: &tokio::runtime::Runtime,
    provider: &GeminiProvider,
    assistant: &mut Assistant,
    input: &str,
) -> anyhow::Result<()> {
    let outcome = {
        let context = AssistantContext::new(store.bundle(), store.notifications());
        runtime.block_on(assistant.send(provider, input, &context))
    };

    let SendOutcome::Replied { notice, .. } = outcome else {
        return Ok(());
    };
    let mut out = io::stdout().lock();
    if let Some(reply) = assistant.transcript().last() {
        renderer.chat_message(&mut out, reply)?;
    }
    if let Some(notice) = notice {
        let notification = store.notify(notice)?;
        renderer.notification(&mut out, &notification)?;
    }
    Ok(())
}

fn apply(store: &mut AppStore, renderer: &Renderer, action: impl Into<Action>) -> anyhow::Result<()> {
    let emitted = store.dispatch(action)?;
    if emitted.is_empty() {
        println!("Hecho.");
    }
    print_notifications(renderer, &emitted)
}

fn print_notifications(renderer: &Renderer, notifications: &[Notification]) -> anyhow::Result<()> {
    let mut out = io::stdout().lock();
    for notification in notifications {
        renderer.notification(&mut out, notification)?;
    }
    Ok(())
}

fn load_import<T>(path: &Path, convert: impl FnMut(&Row) -> T) -> anyhow::Result<Vec<T>> {
    import_with(path, convert).with_context(|| format!("failed to import {}", path.display()))
}

fn task_id(store: &AppStore, raw: &str) -> anyhow::Result<Uuid> {
    store.require_user()?;
    Ok(resolve_id(&store.bundle().tasks, raw, "task", |t| t.id)?)
}

fn item_id(store: &AppStore, raw: &str) -> anyhow::Result<Uuid> {
    store.require_user()?;
    Ok(resolve_id(&store.bundle().inventory, raw, "inventory item", |i| i.id)?)
}

fn recipe_id(store: &AppStore, raw: &str) -> anyhow::Result<Uuid> {
    store.require_user()?;
    Ok(resolve_id(&store.bundle().recipes, raw, "recipe", |r| r.id)?)
}

fn password_or_prompt(password: Option<String>) -> anyhow::Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }
    eprint!("Contraseña: ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
