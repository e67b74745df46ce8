use std::io;
use std::time::Duration;

use log::debug;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};

use crate::error::{GameError, Result};
use crate::grid::{Cell, Grid};
use crate::reporter::EventReporter;
use crate::term::{Input, Renderer};
use crate::{Coords, TermInt};

pub const CLEANER_CHAR: char = ' ';
pub const FOOD_CHAR: char = 'F';
pub const BOMB_CHAR: char = 'B';

/// Random draws before falling back to listing the free cells.
const MAX_PLACEMENT_TRIES: usize = 64;

/// The visible area the worm moves in, borders included.
///
/// Positioning of worms, food and bombs happens here, separate from how it is
/// drawn. The playground only draws the objects it places and cleans up the
/// squares a worm leaves behind.
pub struct Playground<R: Renderer> {
    grid: Grid,
    to_clear: Vec<Coords>,
    renderer: R,
    reporter: Option<Box<dyn EventReporter>>,
    rng: Box<dyn RngCore>,
}

impl<R: Renderer> Playground<R> {
    pub fn new(rows: TermInt, cols: TermInt, renderer: R) -> Result<Self> {
        let grid = Grid::new(rows, cols)?;

        let (max_rows, max_cols) = renderer.surface_size();
        if rows > max_rows || cols > max_cols {
            return Err(GameError::TooLarge { rows, cols, max_rows, max_cols });
        }

        Ok(Playground {
            grid,
            to_clear: vec![],
            renderer,
            reporter: None,
            rng: Box::new(rand::thread_rng()),
        })
    }

    pub fn with_reporter(mut self, reporter: Box<dyn EventReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn with_rng(mut self, rng: impl RngCore + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    pub fn rows(&self) -> TermInt {
        self.grid.rows()
    }

    pub fn cols(&self) -> TermInt {
        self.grid.cols()
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn reporter_mut(&mut self) -> Option<&mut (dyn EventReporter + 'static)> {
        self.reporter.as_deref_mut()
    }

    /// Places food on a free square and shows where it went on the top border.
    pub fn place_food(&mut self) -> Result<Coords> {
        let pos = self.free_position()?;
        debug!("food placed at {}, {}", pos.0, pos.1);
        self.mark_position(pos, Cell::FOOD);
        self.renderer.draw_glyph(pos, FOOD_CHAR)?;
        // Keep the label inside the top border line
        let label: String = format!("  Food: {} {}  ", pos.0, pos.1)
            .chars()
            .take(self.cols().saturating_sub(3) as usize)
            .collect();
        self.renderer.draw_text((0, 2), &label)?;
        self.renderer.refresh()?;
        Ok(pos)
    }

    pub fn place_bomb(&mut self) -> Result<Coords> {
        let pos = self.free_position()?;
        debug!("bomb placed at {}, {}", pos.0, pos.1);
        self.mark_position(pos, Cell::BOMB);
        self.renderer.draw_glyph(pos, BOMB_CHAR)?;
        self.renderer.refresh()?;
        Ok(pos)
    }

    /// Sets `flag` at `pos`, or wipes the square if `flag` is empty. Returns what was there.
    /// `pos` must be on the grid.
    pub fn mark_position(&mut self, pos: Coords, flag: Cell) -> Cell {
        let was = self.grid.get(pos);
        let now = if flag.is_empty() { Cell::EMPTY } else { was | flag };
        self.grid.set(pos, now);
        debug!("marked {}, {} with {}", pos.0, pos.1, flag.bits());
        if let Some(reporter) = self.reporter.as_mut() {
            reporter.notify_mark(pos, flag);
        }
        was
    }

    /// Clears `flag` at `pos`. Returns what was there.
    pub fn unmark_position(&mut self, pos: Coords, flag: Cell) -> Cell {
        let was = self.grid.get(pos);
        self.grid.set(pos, was & !flag);
        debug!("unmarked {} from {}, {}", flag.bits(), pos.0, pos.1);
        if let Some(reporter) = self.reporter.as_mut() {
            reporter.notify_unmark(pos, flag);
        }
        was
    }

    pub fn query_position(&self, pos: Coords) -> Cell {
        self.grid.get(pos)
    }

    pub fn schedule_clear(&mut self, pos: Coords) {
        self.to_clear.insert(0, pos);
    }

    pub fn pending_clears(&self) -> &[Coords] {
        &self.to_clear
    }

    /// Blanks every square scheduled for cleaning and forgets them.
    pub fn flush_clears(&mut self, refresh: bool) -> Result<()> {
        for pos in self.to_clear.drain(..) {
            self.renderer.draw_glyph(pos, CLEANER_CHAR)?;
        }
        if refresh {
            self.renderer.refresh()?;
        }
        Ok(())
    }

    pub fn render(&mut self) -> Result<()> {
        self.renderer.draw_border(self.rows(), self.cols())?;
        self.renderer.refresh()?;
        Ok(())
    }

    /// Waits up to `timeout` for any key. Returns whether one was pressed.
    pub fn wait_for_key(&mut self, timeout: Duration) -> Result<bool> {
        match self.renderer.read_input(Some(timeout)) {
            Ok(Input::Key(_)) => Ok(true),
            Ok(Input::Timeout) => Ok(false),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn free_position(&mut self) -> Result<Coords> {
        let taken = Cell::FOOD | Cell::BOMB | Cell::SNAKE;
        let (rows, cols) = (self.rows(), self.cols());

        for _ in 0..MAX_PLACEMENT_TRIES {
            let pos = (self.rng.gen_range(1..rows - 1), self.rng.gen_range(1..cols - 1));
            if !self.grid.get(pos).intersects(taken) {
                return Ok(pos);
            }
        }

        // Crowded board, pick among what's left
        let free: Vec<Coords> = self.grid.interior().filter(|pos| !self.grid.get(*pos).intersects(taken)).collect();
        free.choose(&mut self.rng).copied().ok_or(GameError::NoFreeCell)
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::reporter::testing::{Event, RecordingReporter};
    use crate::term::testing::RecordingRenderer;

    fn playground(rows: TermInt, cols: TermInt) -> Playground<RecordingRenderer> {
        Playground::new(rows, cols, RecordingRenderer::new(50, 100))
            .unwrap()
            .with_rng(StdRng::seed_from_u64(7))
    }

    fn count(pg: &Playground<RecordingRenderer>, flag: Cell) -> usize {
        pg.grid().interior().filter(|pos| pg.query_position(*pos).contains(flag)).count()
    }

    #[test]
    fn rejects_bad_dimensions() {
        let too_small = Playground::new(2, 20, RecordingRenderer::new(50, 100));
        assert!(matches!(too_small, Err(GameError::TooSmall { .. })));

        let too_large = Playground::new(60, 20, RecordingRenderer::new(50, 100));
        assert!(matches!(too_large, Err(GameError::TooLarge { max_rows: 50, .. })));
    }

    #[test]
    fn mark_with_empty_resets_square() {
        let mut pg = playground(10, 20);
        pg.mark_position((3, 3), Cell::FOOD);
        pg.mark_position((3, 3), Cell::SNAKE);

        let was = pg.mark_position((3, 3), Cell::EMPTY);
        assert_eq!(was, Cell::FOOD | Cell::SNAKE);
        assert_eq!(pg.query_position((3, 3)), Cell::EMPTY);
    }

    #[test]
    fn unmark_undoes_mark() {
        let mut pg = playground(10, 20);
        pg.mark_position((4, 4), Cell::BOMB);

        for flag in [Cell::FOOD, Cell::SNAKE, Cell::CLEAR] {
            let before = pg.query_position((4, 4));
            pg.mark_position((4, 4), flag);
            let was = pg.unmark_position((4, 4), flag);
            assert_eq!(was, before | flag);
            assert_eq!(pg.query_position((4, 4)), before);
        }
    }

    #[test]
    fn placement_avoids_occupied_squares() {
        let mut pg = playground(6, 6);
        // Leave two free squares in the 4x4 interior
        let occupied: Vec<Coords> = pg.grid().interior().skip(2).collect();
        for pos in occupied {
            pg.mark_position(pos, Cell::SNAKE);
        }

        let food = pg.place_food().unwrap();
        let bomb = pg.place_bomb().unwrap();
        assert_ne!(food, bomb);
        assert!([(1, 1), (1, 2)].contains(&food));
        assert!([(1, 1), (1, 2)].contains(&bomb));
        assert_eq!(count(&pg, Cell::FOOD), 1);
        assert_eq!(count(&pg, Cell::BOMB), 1);

        assert!(matches!(pg.place_food(), Err(GameError::NoFreeCell)));
    }

    #[test]
    fn placement_draws_glyph() {
        let mut pg = playground(10, 20);
        let food = pg.place_food().unwrap();
        let bomb = pg.place_bomb().unwrap();

        assert!(!pg.grid().is_border(food));
        assert_eq!(pg.renderer().last_glyph_at(food), Some(FOOD_CHAR));
        assert_eq!(pg.renderer().last_glyph_at(bomb), Some(BOMB_CHAR));
        assert!(pg.renderer().texts.iter().any(|(pos, text)| *pos == (0, 2) && text.contains("Food:")));
    }

    #[test]
    fn flushing_clears_drains_the_list() {
        let mut pg = playground(10, 20);
        pg.schedule_clear((2, 2));
        pg.schedule_clear((2, 3));
        assert_eq!(pg.pending_clears(), &[(2, 3), (2, 2)]);

        pg.flush_clears(true).unwrap();
        assert!(pg.pending_clears().is_empty());
        assert_eq!(pg.renderer().last_glyph_at((2, 2)), Some(CLEANER_CHAR));
        assert_eq!(pg.renderer().refreshes, 1);

        let drawn = pg.renderer().glyphs.len();
        pg.flush_clears(false).unwrap();
        assert_eq!(pg.renderer().glyphs.len(), drawn);
    }

    #[test]
    fn reports_marks_and_unmarks() {
        let reporter = RecordingReporter::default();
        let events = reporter.events.clone();
        let mut pg = playground(10, 20).with_reporter(Box::new(reporter));

        pg.mark_position((1, 2), Cell::SNAKE);
        pg.unmark_position((1, 2), Cell::SNAKE);

        assert_eq!(
            *events.borrow(),
            vec![Event::Mark((1, 2), Cell::SNAKE), Event::Unmark((1, 2), Cell::SNAKE)]
        );
    }

    #[test]
    fn waiting_for_a_key() {
        use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

        let enter = Input::Key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE));
        let renderer = RecordingRenderer::new(50, 100).with_inputs(vec![Input::Timeout, enter]);
        let mut pg = Playground::new(10, 20, renderer).unwrap();

        assert!(!pg.wait_for_key(Duration::from_millis(10)).unwrap());
        assert!(pg.wait_for_key(Duration::from_millis(10)).unwrap());
    }

    #[test]
    fn render_draws_frame() {
        let mut pg = playground(10, 20);
        pg.render().unwrap();
        assert_eq!(pg.renderer().borders, 1);
        assert_eq!(pg.renderer().refreshes, 1);
    }
}
