use std::fmt;

use log::debug;

use crate::config::Config;
use crate::error::{GameError, Result};
use crate::grid::Cell;
use crate::playground::Playground;
use crate::term::Renderer;
use crate::Coords;
use Direction::*;

pub const HEAD_CHAR: char = 'Ö';
pub const BODY_CHAR: char = 'o';

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    Idle,
}

impl Direction {
    /// `(row_step, col_step)`
    pub fn steps(self) -> (i16, i16) {
        match self {
            Up => (-1, 0),
            Down => (1, 0),
            Left => (0, -1),
            Right => (0, 1),
            Idle => (0, 0),
        }
    }
}

/// Why a worm stopped. `None` means it's still alive.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Failure {
    None,
    HitTopBorder,
    HitBottomBorder,
    HitLeftBorder,
    HitRightBorder,
    /// Ran into its own body or another snake.
    HitSnake,
    HitBomb,
}

impl Failure {
    const ALL: [Failure; 7] = [
        Failure::None,
        Failure::HitTopBorder,
        Failure::HitBottomBorder,
        Failure::HitLeftBorder,
        Failure::HitRightBorder,
        Failure::HitSnake,
        Failure::HitBomb,
    ];

    /// Numeric code as sent to the scoreboard.
    pub fn code(self) -> i32 {
        match self {
            Failure::None => 0,
            Failure::HitTopBorder => 1,
            Failure::HitBottomBorder => 2,
            Failure::HitLeftBorder => 3,
            Failure::HitRightBorder => 4,
            Failure::HitSnake => 5,
            Failure::HitBomb => 6,
        }
    }

    /// A code outside the known set means the program itself is broken.
    pub fn from_code(code: i32) -> Result<Failure> {
        Self::ALL.iter().copied().find(|f| f.code() == code).ok_or(GameError::Invariant(code))
    }

    pub fn text(self) -> &'static str {
        match self {
            Failure::None => "Success",
            Failure::HitTopBorder => "Hit top border",
            Failure::HitBottomBorder => "Hit lower border",
            Failure::HitLeftBorder => "Hit left border",
            Failure::HitRightBorder => "Hit right border",
            Failure::HitSnake => "Hit a snake",
            Failure::HitBomb => "Hit a bomb",
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

pub fn failure_text(code: i32) -> Result<&'static str> {
    Failure::from_code(code).map(Failure::text)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WormState {
    Idle,
    Moving,
    Dead,
}

/// A worm crawling across the playground. `body[0]` is the head.
#[derive(Clone, Debug)]
pub struct Worm {
    body: Vec<Coords>,
    length: usize,
    growth: usize,
    direction: Direction,
    score: u64,
    failure: Failure,
}

impl Worm {
    /// Spawns a one square worm in the middle of the playground.
    pub fn new<R: Renderer>(pg: &mut Playground<R>, config: &Config) -> Self {
        let center = (pg.rows() / 2, pg.cols() / 2);
        Self::with_body(pg, vec![center], config.snake_len as usize, config.growth_increment() as usize, Idle)
    }

    /// Places a worm with the given body, head first. Every square must be inside the border.
    pub fn with_body<R: Renderer>(
        pg: &mut Playground<R>,
        body: Vec<Coords>,
        length: usize,
        growth: usize,
        direction: Direction,
    ) -> Self {
        for pos in &body {
            pg.mark_position(*pos, Cell::SNAKE);
        }
        Worm { body, length, growth, direction, score: 0, failure: Failure::None }
    }

    pub fn body(&self) -> &[Coords] {
        &self.body
    }

    pub fn head(&self) -> Coords {
        self.body[0]
    }

    /// Length the worm is growing towards.
    pub fn length(&self) -> usize {
        self.length
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn failure_reason(&self) -> Failure {
        self.failure
    }

    pub fn state(&self) -> WormState {
        if self.failure != Failure::None {
            WormState::Dead
        } else if self.direction == Idle {
            WormState::Idle
        } else {
            WormState::Moving
        }
    }

    /// Changes direction. Turning back into the neck is allowed and kills the worm on the next step.
    pub fn turn(&mut self, direction: Direction) {
        self.direction = direction;
    }

    /// Runs one game tick: a step, then scoring and drawing if the worm survived.
    pub fn tick<R: Renderer>(&mut self, pg: &mut Playground<R>) -> Result<Failure> {
        if self.state() != WormState::Moving {
            return Ok(self.failure);
        }

        self.failure = self.step(pg)?;
        if self.failure == Failure::None {
            self.score += 1;
            self.draw(pg)?;
        }
        Ok(self.failure)
    }

    /// Moves the worm one square in its current direction.
    pub fn step<R: Renderer>(&mut self, pg: &mut Playground<R>) -> Result<Failure> {
        if self.failure != Failure::None {
            return Ok(self.failure);
        }

        let (row_step, col_step) = self.direction.steps();
        if (row_step, col_step) == (0, 0) {
            return Ok(Failure::None);
        }

        let old_head = self.head();
        let new_head = ((old_head.0 as i16 + row_step) as u16, (old_head.1 as i16 + col_step) as u16);

        let cell = pg.query_position(new_head);
        if cell.contains(Cell::SNAKE) {
            return Ok(Failure::HitSnake);
        }
        if cell.contains(Cell::BOMB) {
            return Ok(Failure::HitBomb);
        }

        let breach = self.border_failure(pg, new_head);

        let ate = cell.contains(Cell::FOOD);
        if ate {
            debug!("food eaten at {}, {}", new_head.0, new_head.1);
            pg.unmark_position(new_head, Cell::FOOD);
            self.length += self.growth;
        }

        // The border is never written; a head outside stays in the body only for the last drawing
        if breach == Failure::None {
            pg.mark_position(new_head, Cell::SNAKE);
        }
        let refed = if ate { pg.place_food().map(|_| ()) } else { Ok(()) };

        self.body.insert(0, new_head);
        if self.body.len() > self.length {
            if let Some(tail) = self.body.pop() {
                pg.schedule_clear(tail);
                pg.unmark_position(tail, Cell::SNAKE);
            }
        }

        refed?;
        Ok(breach)
    }

    /// Draws the worm after blanking the squares it left.
    pub fn draw<R: Renderer>(&self, pg: &mut Playground<R>) -> Result<()> {
        pg.flush_clears(false)?;

        let renderer = pg.renderer_mut();
        for pos in self.body.iter().skip(1) {
            renderer.draw_glyph(*pos, BODY_CHAR)?;
        }
        renderer.draw_glyph(self.head(), HEAD_CHAR)?;
        renderer.refresh()?;
        Ok(())
    }

    // Top and left win when a corner is hit
    fn border_failure<R: Renderer>(&self, pg: &Playground<R>, (row, col): Coords) -> Failure {
        if row < 1 {
            Failure::HitTopBorder
        } else if col < 1 {
            Failure::HitLeftBorder
        } else if row >= pg.rows() - 1 {
            Failure::HitBottomBorder
        } else if col >= pg.cols() - 1 {
            Failure::HitRightBorder
        } else {
            Failure::None
        }
    }
}
