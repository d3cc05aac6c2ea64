use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::model::{Persona, Priority};

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "hestia",
    version,
    about = "HESTIA AI: household tasks, pantry, recipes and an assistant",
    disable_help_subcommand = true,
    infer_subcommands = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "hestiarc", global = true)]
    pub hestiarc: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create an account and sign in.
    Register(RegisterArgs),
    /// Sign in to an existing account.
    Login(LoginArgs),
    /// Close the active session.
    Logout,
    /// Show the signed-in user.
    Whoami,
    /// Counters, upcoming tasks and recent notifications.
    Dashboard,
    #[command(subcommand)]
    Task(TaskCommand),
    #[command(subcommand)]
    Inventory(InventoryCommand),
    #[command(subcommand)]
    Recipe(RecipeCommand),
    /// Month view of task due dates.
    Calendar(CalendarArgs),
    /// Talk to the assistant; without text, starts an interactive session.
    Chat {
        #[arg(trailing_var_arg = true)]
        text: Vec<String>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct RegisterArgs {
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub name: String,
    #[arg(long, value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<Persona>()))]
    pub persona: Persona,
    /// Read from standard input when omitted.
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct LoginArgs {
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum TaskCommand {
    Add {
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,
        #[arg(short, long, default_value = "media", value_parser = parse_priority)]
        priority: Priority,
    },
    List {
        /// Only tasks that are not completed.
        #[arg(long)]
        pending: bool,
    },
    Toggle {
        id: String,
    },
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_parser = parse_priority)]
        priority: Option<Priority>,
        /// YYYY-MM-DD
        #[arg(long)]
        due: Option<String>,
    },
    Delete {
        id: String,
    },
    Import {
        file: PathBuf,
    },
    /// Open the task as a Google Calendar event template.
    ExportCalendar {
        id: String,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum InventoryCommand {
    Add {
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,
        #[arg(long, default_value = "")]
        category: String,
        #[arg(long, default_value_t = 0)]
        quantity: u32,
        #[arg(long, default_value = crate::inventory::DEFAULT_UNIT)]
        unit: String,
        #[arg(long = "min", default_value_t = crate::inventory::DEFAULT_MIN_QUANTITY)]
        min_quantity: u32,
    },
    List {
        /// Only items at or below their minimum.
        #[arg(long)]
        low: bool,
    },
    /// Change the quantity by a signed amount, e.g. `+2` or `-1`.
    Adjust {
        id: String,
        #[arg(allow_negative_numbers = true)]
        delta: i64,
    },
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        unit: Option<String>,
        #[arg(long = "min")]
        min_quantity: Option<u32>,
    },
    Delete {
        id: String,
    },
    Import {
        file: PathBuf,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum RecipeCommand {
    Add {
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,
        /// Separated by commas or new lines.
        #[arg(long, default_value = "")]
        ingredients: String,
        /// One step per line.
        #[arg(long, default_value = "")]
        instructions: String,
        #[arg(long = "time", default_value = "")]
        prep_time: String,
    },
    List,
    Show {
        id: String,
    },
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        ingredients: Option<String>,
        #[arg(long)]
        instructions: Option<String>,
        #[arg(long = "time")]
        prep_time: Option<String>,
    },
    Delete {
        id: String,
    },
    Import {
        file: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
pub struct CalendarArgs {
    /// Focus month as YYYY-MM; defaults to the current month.
    #[arg(long)]
    pub month: Option<String>,
    #[arg(long, conflicts_with = "next")]
    pub prev: bool,
    #[arg(long)]
    pub next: bool,
}

fn parse_priority(raw: &str) -> Result<Priority, String> {
    Priority::parse_lenient(raw).ok_or_else(|| format!("unknown priority `{raw}` (expected baja, media or alta)"))
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.key=value` / `rc.key:value` overrides out of the
/// argument list before clap sees it.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> PreprocessedArgs {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = rest.split_once('=').or_else(|| rest.split_once(':'));
            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((format!("rc.{k}"), v.to_string()));
                continue;
            }
        }

        cleaned.push(arg);
    }

    PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    }
}

pub fn join_words(words: &[String]) -> String {
    words.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<OsString> {
        list.iter().map(OsString::from).collect()
    }

    #[test]
    fn positional_rc_overrides_are_extracted() {
        let pre = preprocess_args(&args(&["hestia", "rc.color=off", "task", "list", "rc.calendar.open:no"]));
        assert_eq!(pre.cleaned_args, args(&["hestia", "task", "list"]));
        assert_eq!(
            pre.rc_overrides,
            vec![
                ("rc.color".to_string(), "off".to_string()),
                ("rc.calendar.open".to_string(), "no".to_string()),
            ]
        );
    }

    #[test]
    fn subcommands_parse_with_abbreviations() {
        let cli = GlobalCli::try_parse_from(["hestia", "-vv", "inv", "adjust", "ab12", "-3"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Some(Command::Inventory(InventoryCommand::Adjust { id, delta })) => {
                assert_eq!(id, "ab12");
                assert_eq!(delta, -3);
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let cli = GlobalCli::try_parse_from(["hestia", "dash"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Dashboard)));
    }

    #[test]
    fn task_add_collects_words_and_priority() {
        let cli = GlobalCli::try_parse_from(["hestia", "task", "add", "Comprar", "pan", "-p", "alta"]).unwrap();
        match cli.command {
            Some(Command::Task(TaskCommand::Add { title, priority })) => {
                assert_eq!(join_words(&title), "Comprar pan");
                assert_eq!(priority, Priority::High);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn register_requires_a_known_persona() {
        assert!(
            GlobalCli::try_parse_from([
                "hestia", "register", "--email", "a@x.com", "--name", "Ana", "--persona", "pirata",
            ])
            .is_err()
        );
        let cli = GlobalCli::try_parse_from([
            "hestia",
            "register",
            "--email",
            "a@x.com",
            "--name",
            "Ana",
            "--persona",
            "estudiante",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Register(RegisterArgs {
                persona: Persona::Student,
                ..
            }))
        ));
    }
}
