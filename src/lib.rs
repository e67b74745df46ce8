//! A worm game for the terminal.
//!
//! The worm crawls around a bordered playground, grows when it eats food and
//! dies when it hits a border, a bomb or a snake. The game state lives in
//! [`playground::Playground`] and [`worm::Worm`]; drawing and keyboard input
//! go through the [`term::Renderer`] trait, and an optional scoreboard is fed
//! through [`reporter::EventReporter`].

pub mod config;
pub mod error;
pub mod game;
pub mod grid;
pub mod playground;
pub mod reporter;
pub mod term;
pub mod worm;

pub type TermInt = u16;

/// A `(row, col)` position on the playground.
pub type Coords = (TermInt, TermInt);

pub use config::Config;
pub use error::{ExitCode, GameError};
