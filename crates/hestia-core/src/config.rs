use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::time::Duration;

use anyhow::{
  Context,
  anyhow
};
use chrono::Weekday;
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::assistant::{
  DEFAULT_TEMPERATURE,
  GeminiSettings
};
use crate::calendar::parse_week_start;

pub const DEFAULT_ENDPOINT: &str =
  "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str =
  "gemini-3-flash-preview";

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = HashMap::new();
    for (key, value) in [
      ("data.location", "~/.hestia"),
      ("color", "on"),
      ("assistant.endpoint", DEFAULT_ENDPOINT),
      ("assistant.model", DEFAULT_MODEL),
      ("assistant.temperature", "0.7"),
      ("assistant.api_key_env", "API_KEY"),
      ("assistant.timeout", "0"),
      ("calendar.week_start", "sunday"),
      ("calendar.open", "on")
    ] {
      map.insert(
        key.to_string(),
        value.to_string()
      );
    }
    Self {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let rc =
      resolve_rc_path(rc_override)?;
    if let Some(path) = rc {
      info!(hestiarc = %path.display(), "loading hestiarc");
      cfg.load_file(&path)?;
    } else {
      debug!(
        "no hestiarc found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> anyhow::Result<Option<bool>> {
    self
      .map
      .get(key)
      .map(|v| {
        parse_bool(v).ok_or_else(|| {
          anyhow!(
            "invalid value for {key}: \
             {v} (expected on/off)"
          )
        })
      })
      .transpose()
  }

  pub fn color(
    &self
  ) -> anyhow::Result<bool> {
    Ok(
      self
        .get_bool("color")?
        .unwrap_or(true)
    )
  }

  pub fn calendar_open(
    &self
  ) -> anyhow::Result<bool> {
    Ok(
      self
        .get_bool("calendar.open")?
        .unwrap_or(true)
    )
  }

  pub fn week_start(
    &self
  ) -> anyhow::Result<Weekday> {
    match self
      .get("calendar.week_start")
    {
      | None => Ok(Weekday::Sun),
      | Some(raw) => {
        parse_week_start(&raw)
          .ok_or_else(|| {
            anyhow!(
              "invalid value for \
               calendar.week_start: \
               {raw} (expected sunday \
               or monday)"
            )
          })
      }
    }
  }

  pub fn temperature(
    &self
  ) -> anyhow::Result<f64> {
    let Some(raw) = self
      .get("assistant.temperature")
    else {
      return Ok(DEFAULT_TEMPERATURE);
    };
    raw
      .trim()
      .parse::<f64>()
      .ok()
      .filter(|t| t.is_finite() && *t >= 0.0)
      .ok_or_else(|| {
        anyhow!(
          "invalid value for \
           assistant.temperature: {raw}"
        )
      })
  }

  /// Provider settings, with the API key read from the environment
  /// variable named by `assistant.api_key_env`.
  pub fn gemini_settings(
    &self
  ) -> anyhow::Result<GeminiSettings> {
    let key_env = self
      .get("assistant.api_key_env")
      .unwrap_or_else(|| {
        "API_KEY".to_string()
      });
    let api_key = std::env::var(&key_env)
      .ok()
      .filter(|k| !k.trim().is_empty());
    if api_key.is_none() {
      warn!(env = %key_env, "assistant API key is not set");
    }

    let timeout_raw = self
      .get("assistant.timeout")
      .unwrap_or_else(|| "0".to_string());
    let secs = timeout_raw
      .trim()
      .parse::<u64>()
      .with_context(|| {
        format!(
          "invalid value for \
           assistant.timeout: \
           {timeout_raw}"
        )
      })?;

    Ok(GeminiSettings {
      endpoint: self
        .get("assistant.endpoint")
        .unwrap_or_else(|| {
          DEFAULT_ENDPOINT.to_string()
        }),
      model: self
        .get("assistant.model")
        .unwrap_or_else(|| {
          DEFAULT_MODEL.to_string()
        }),
      api_key,
      timeout: (secs > 0)
        .then(|| Duration::from_secs(secs))
    })
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let mut line = raw_line.trim();
      if let Some((before, _)) =
        line.split_once('#')
      {
        line = before.trim();
      }

      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if include_path.exists() {
          self
            .load_file(&include_path)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    path.to_path_buf()
  } else if let Some(cfg_value) =
    cfg.get("data.location")
  {
    expand_tilde(Path::new(&cfg_value))
  } else {
    default_data_dir()?
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var("HESTIARC")
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; skipping hestiarc"
    );
    return Ok(None);
  };
  let candidate = home.join(".hestiarc");
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn default_data_dir()
-> anyhow::Result<PathBuf> {
  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  Ok(home.join(".hestia"))
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let expanded =
    expand_tilde(Path::new(include));
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> Option<bool> {
  match s
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "1" | "y" | "yes" | "on"
    | "true" => Some(true),
    | "0" | "n" | "no" | "off"
    | "false" => Some(false),
    | _ => None
  }
}
