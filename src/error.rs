use std::io;

use thiserror::Error;

use crate::TermInt;

/// Process exit codes, as observed by whoever launched the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Ok = 0,
    Syntax = 1,
    Args = 2,
    Signal = 3,
    Prog = 4,
    Err = 5,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

#[derive(Debug, Error)]
pub enum GameError {
    #[error("can't make playground with {rows} rows and {cols} columns (minimum is 3x3)")]
    TooSmall { rows: TermInt, cols: TermInt },

    #[error("can't make playground with {rows} rows and {cols} columns (terminal is {max_rows}x{max_cols})")]
    TooLarge {
        rows: TermInt,
        cols: TermInt,
        max_rows: TermInt,
        max_cols: TermInt,
    },

    #[error("no free cell left on the playground")]
    NoFreeCell,

    #[error("invalid argument or config value: {0}")]
    InvalidValue(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("configuration file {path}: {source}")]
    ConfigFile { path: String, source: io::Error },

    #[error("can't log to file {path}: {source}")]
    LogFile { path: String, source: io::Error },

    #[error("server {host} refuses connection on port {port}: {source}")]
    ReporterConnect {
        host: String,
        port: u16,
        source: io::Error,
    },

    #[error("program error - illegal failure code ({0})")]
    Invariant(i32),

    #[error("terminal error: {0}")]
    Terminal(#[from] io::Error),
}


impl GameError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            GameError::TooSmall { .. } | GameError::TooLarge { .. } => ExitCode::Args,
            GameError::InvalidValue(_) => ExitCode::Syntax,
            GameError::InvalidArgument(_) => ExitCode::Args,
            GameError::Invariant(_) => ExitCode::Prog,
            GameError::NoFreeCell
            | GameError::ConfigFile { .. }
            | GameError::LogFile { .. }
            | GameError::ReporterConnect { .. }
            | GameError::Terminal(_) => ExitCode::Err,
        }
    }
}

pub type Result<T> = std::result::Result<T, GameError>;
