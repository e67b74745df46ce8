use crate::{Coords, TermInt};
use std::{io::{self, Stdout, Write, stdout}, time::Duration};

use crossterm::{cursor, execute, queue, style, terminal, ErrorKind};
use crossterm::terminal::{ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::event::{Event, KeyEvent, read, poll};

/// What came out of one bounded wait for the keyboard.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Input {
    Key(KeyEvent),
    Timeout,
}

/// Drawing surface and keyboard the game runs on. All positions are `(row, col)`.
pub trait Renderer {
    /// Size of the surface as `(rows, cols)`.
    fn surface_size(&self) -> Coords;

    fn draw_glyph(&mut self, pos: Coords, ch: char) -> io::Result<()>;

    fn draw_text(&mut self, pos: Coords, text: &str) -> io::Result<()>;

    /// Draws the frame of a `rows` x `cols` playground anchored at the top left corner.
    fn draw_border(&mut self, rows: TermInt, cols: TermInt) -> io::Result<()>;

    fn refresh(&mut self) -> io::Result<()>;

    /// Waits for a key, at most `timeout` if one is given.
    fn read_input(&mut self, timeout: Option<Duration>) -> io::Result<Input>;

    /// Shows a centered box on top of the playground until `hide_message` is called.
    fn show_message(&mut self, lines: &[&str]) -> io::Result<()>;

    fn hide_message(&mut self) -> io::Result<()>;

    /// Gives the terminal back in the state it was found in.
    fn restore(&mut self) -> io::Result<()>;
}

pub struct TermManager {
    width: TermInt,
    height: TermInt,
    stdout: Stdout,
    screen: Vec<char>,
    current_msg: Option<Message>,
    active: bool,
}

struct Message {
    top_left: Coords,
    width: TermInt,
    height: TermInt,
}

impl TermManager {
    pub fn new() -> io::Result<Self> {
        let (width, height) = terminal::size().map_err(term_err)?;
        let stdout = stdout();
        let screen = vec![' '; width as usize * height as usize];
        Ok(TermManager { width, height, stdout, screen, current_msg: None, active: false })
    }

    pub fn setup(&mut self) -> io::Result<()> {
        execute!(self.stdout, EnterAlternateScreen).map_err(term_err)?;
        self.active = true;
        terminal::enable_raw_mode().map_err(term_err)?;
        execute!(self.stdout, cursor::Hide, cursor::DisableBlinking).map_err(term_err)?;
        self.clear()
    }

    pub fn clear(&mut self) -> io::Result<()> {
        execute!(self.stdout, terminal::Clear(ClearType::All)).map_err(term_err)?;
        self.screen = vec![' '; self.width as usize * self.height as usize];
        Ok(())
    }

    ///////////////////////////////////////////////////////////////////////////

    fn print_at(&mut self, (row, col): Coords, ch: char) -> io::Result<()> {
        if row >= self.height || col >= self.width {
            return Ok(());
        }
        queue!(self.stdout, cursor::MoveTo(col, row), style::Print(ch)).map_err(term_err)?;
        self.screen[self.width as usize * row as usize + col as usize] = ch;
        Ok(())
    }

    fn print_at_no_save(&mut self, (row, col): Coords, ch: char) -> io::Result<()> {
        // Message boxes don't go into the screen buffer, so hiding them can restore what was below
        queue!(self.stdout, cursor::MoveTo(col, row), style::Print(ch)).map_err(term_err)?;
        Ok(())
    }
}

impl Renderer for TermManager {
    fn surface_size(&self) -> Coords {
        (self.height, self.width)
    }

    fn draw_glyph(&mut self, pos: Coords, ch: char) -> io::Result<()> {
        self.print_at(pos, ch)
    }

    fn draw_text(&mut self, (row, col): Coords, text: &str) -> io::Result<()> {
        for (i, ch) in text.chars().enumerate() {
            self.print_at((row, col + i as TermInt), ch)?;
        }
        Ok(())
    }

    fn draw_border(&mut self, rows: TermInt, cols: TermInt) -> io::Result<()> {
        let end_row = rows - 1;
        let end_col = cols - 1;

        for col in 0..cols {
            let ch = if col == 0 || col == end_col {'+'} else {'-'};
            self.print_at((0, col), ch)?;
            self.print_at((end_row, col), ch)?;
        }

        for row in 1..end_row {
            self.print_at((row, 0), '|')?;
            self.print_at((row, end_col), '|')?;
        }

        Ok(())
    }

    fn refresh(&mut self) -> io::Result<()> {
        self.stdout.flush()
    }

    fn read_input(&mut self, timeout: Option<Duration>) -> io::Result<Input> {
        loop {
            if let Some(timeout) = timeout {
                if !poll(timeout).map_err(term_err)? {
                    return Ok(Input::Timeout);
                }
            }
            if let Event::Key(ev) = read().map_err(term_err)? {
                return Ok(Input::Key(ev));
            }
        }
    }

    fn show_message(&mut self, lines: &[&str]) -> io::Result<()> {
        if self.current_msg.is_some() {
            self.hide_message()?;
        }

        let msg_height = (lines.len() + 2) as TermInt;
        let msg_width = (lines.iter().map(|x| x.chars().count()).max().unwrap_or(0) + 2) as TermInt;
        let center = (self.height / 2, self.width / 2);
        let top_left = (
            center.0.saturating_sub(msg_height / 2),
            center.1.saturating_sub(msg_width / 2),
        );

        // Top and bottom padding lines
        for row in [top_left.0, top_left.0 + msg_height - 1].iter() {
            for col_diff in 0..msg_width {
                self.print_at_no_save((*row, top_left.1 + col_diff), ' ')?;
            }
        }

        for (i, line) in lines.iter().enumerate() {
            let padded_line = format!("{line: ^width$}", line = line, width = msg_width as usize);
            let row = top_left.0 + i as TermInt + 1;
            for (col_diff, ch) in padded_line.chars().enumerate() {
                self.print_at_no_save((row, top_left.1 + col_diff as TermInt), ch)?;
            }
        }

        self.current_msg = Some(Message { width: msg_width, height: msg_height, top_left });
        self.refresh()
    }

    fn hide_message(&mut self) -> io::Result<()> {
        let msg = match self.current_msg.take() {
            Some(msg) => msg,
            None => return Ok(()),
        };

        // Put back what the box was covering
        for row_diff in 0..msg.height {
            for col_diff in 0..msg.width {
                let (row, col) = (msg.top_left.0 + row_diff, msg.top_left.1 + col_diff);
                if row >= self.height || col >= self.width {
                    continue;
                }
                let ch = self.screen[self.width as usize * row as usize + col as usize];
                self.print_at_no_save((row, col), ch)?;
            }
        }

        self.refresh()
    }

    fn restore(&mut self) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        terminal::disable_raw_mode().map_err(term_err)?;
        execute!(self.stdout, cursor::Show, cursor::EnableBlinking, LeaveAlternateScreen).map_err(term_err)
    }
}

impl Drop for TermManager {
    fn drop(&mut self) {
        if let Err(err) = self.restore() {
            log::error!("failed to restore terminal: {}", err);
        }
    }
}

/// crossterm wraps I/O failures in its own error type; everything else becomes `Other`.
pub fn term_err(err: ErrorKind) -> io::Error {
    match err {
        ErrorKind::IoError(err) => err,
        other => io::Error::new(io::ErrorKind::Other, other.to_string()),
    }
}
