//! Game configuration: defaults, then the `-C` file, then command line switches.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use log::debug;

use crate::error::{GameError, Result};
use crate::TermInt;

/// Longest user name the scoreboard accepts.
pub const USER_MAX_LEN: usize = 16;

pub const DEFAULT_ROWS: TermInt = 10;
pub const DEFAULT_COLS: TermInt = 20;
pub const DEFAULT_SNAKE_LEN: u16 = 3;
pub const DEFAULT_TIMEOUT_MS: u64 = 300;

/// A worm game to play in the terminal.
/// Use arrow keys (or WASD) to change direction, Esc to pause.
/// Try to hit food, marked F, but avoid bombs, marked B!
#[derive(Parser, Debug, Default)]
#[command(version)]
pub struct Args {
    /// Specify name of log file
    #[arg(short = 'L', long)]
    pub logfile: Option<PathBuf>,

    /// Read configuration from file
    #[arg(short = 'C', long)]
    pub config: Option<PathBuf>,

    /// Playground height
    #[arg(short, long)]
    pub rows: Option<TermInt>,

    /// Playground width
    #[arg(short, long)]
    pub cols: Option<TermInt>,

    /// Initial snake length
    #[arg(short = 'l', long)]
    pub snakelen: Option<u16>,

    /// Length added for every food eaten (defaults to the initial length)
    #[arg(short, long)]
    pub growth: Option<u16>,

    /// Timeout (ms) between snake steps
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Server port
    #[arg(short = 'P', long)]
    pub port: Option<u16>,

    /// Server host
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// Player's user name
    #[arg(short, long)]
    pub user: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub rows: TermInt,
    pub cols: TermInt,
    pub snake_len: u16,
    pub growth: Option<u16>,
    pub tick_timeout_ms: u64,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
            snake_len: DEFAULT_SNAKE_LEN,
            growth: None,
            tick_timeout_ms: DEFAULT_TIMEOUT_MS,
            host: None,
            port: None,
            user: String::new(),
        }
    }
}

impl Config {
    /// Builds the configuration the command line asks for.
    pub fn load(args: &Args) -> Result<Self> {
        let mut config = Config::default();

        if let Some(path) = &args.config {
            config.read_file(path)?;
        }

        config.apply_args(args);
        config.validate()?;
        Ok(config)
    }

    pub fn read_file(&mut self, path: &Path) -> Result<()> {
        let text = fs::read_to_string(path)
            .map_err(|source| GameError::ConfigFile { path: path.display().to_string(), source })?;
        self.apply_file_contents(&text)
    }

    /// Reads `key: value` lines. Lines of any other shape are comments.
    pub fn apply_file_contents(&mut self, text: &str) -> Result<()> {
        for line in text.lines() {
            let (key, val) = match split_entry(line) {
                Some(entry) => entry,
                None => continue,
            };
            debug!("config {}: {}", key, val);
            self.set(key, val)?;
        }
        Ok(())
    }

    pub fn set(&mut self, key: &str, val: &str) -> Result<()> {
        match key {
            "rows" => self.rows = parse(key, val)?,
            "cols" => self.cols = parse(key, val)?,
            "snakelen" => self.snake_len = parse(key, val)?,
            "growth" => self.growth = Some(parse(key, val)?),
            "timeout" => self.tick_timeout_ms = parse(key, val)?,
            "port" => self.port = Some(parse(key, val)?),
            "host" => self.host = Some(val.to_string()),
            "user" => self.user = val.to_string(),
            _ => return Err(GameError::InvalidValue(format!("unknown configuration key \"{}\"", key))),
        }
        Ok(())
    }

    pub fn apply_args(&mut self, args: &Args) {
        if let Some(rows) = args.rows {
            self.rows = rows;
        }
        if let Some(cols) = args.cols {
            self.cols = cols;
        }
        if let Some(len) = args.snakelen {
            self.snake_len = len;
        }
        if let Some(growth) = args.growth {
            self.growth = Some(growth);
        }
        if let Some(timeout) = args.timeout {
            self.tick_timeout_ms = timeout;
        }
        if let Some(port) = args.port {
            self.port = Some(port);
        }
        if let Some(host) = &args.host {
            self.host = Some(host.clone());
        }
        if let Some(user) = &args.user {
            self.user = user.clone();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.snake_len < 1 {
            return Err(GameError::InvalidArgument("snake length must be at least 1".to_string()));
        }
        if self.tick_timeout_ms < 1 {
            return Err(GameError::InvalidArgument("timeout must be at least 1 ms".to_string()));
        }
        if !self.user.is_empty() {
            validate_user(&self.user)?;
        }
        Ok(())
    }

    pub fn growth_increment(&self) -> u16 {
        self.growth.unwrap_or(self.snake_len)
    }

    pub fn tick_timeout(&self) -> Duration {
        Duration::from_millis(self.tick_timeout_ms)
    }

    /// Scoreboard address, only when both host and a non-zero port are set.
    pub fn reporter_addr(&self) -> Option<(&str, u16)> {
        match (self.host.as_deref(), self.port) {
            (Some(host), Some(port)) if !host.is_empty() && port != 0 => Some((host, port)),
            _ => None,
        }
    }
}

pub fn validate_user(user: &str) -> Result<()> {
    if !user.chars().all(|c| c.is_ascii_alphanumeric() || c == ' ') {
        return Err(GameError::InvalidValue("user name must only contain A-Z, a-z, 0-9".to_string()));
    }
    if user.contains(' ') {
        return Err(GameError::InvalidValue("user name may not contain blanks".to_string()));
    }
    if user.is_empty() || user.len() > USER_MAX_LEN {
        return Err(GameError::InvalidValue(format!("user name must be 1-{} characters in length", USER_MAX_LEN)));
    }
    Ok(())
}

fn split_entry(line: &str) -> Option<(&str, &str)> {
    let (key, val) = line.split_once(": ")?;
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_lowercase()) {
        return None;
    }
    let val = val.trim();
    match val.chars().next() {
        Some(c) if c.is_ascii_alphanumeric() => Some((key, val)),
        _ => None,
    }
}

fn parse<T: std::str::FromStr>(key: &str, val: &str) -> Result<T> {
    val.parse()
        .map_err(|_| GameError::InvalidValue(format!("{}: \"{}\"", key, val)))
}
