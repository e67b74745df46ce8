use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use signal_hook::consts::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};

use crate::config::Config;
use crate::error::{GameError, Result};
use crate::playground::Playground;
use crate::term::{Input, Renderer};
use crate::worm::{Direction::{self, *}, Failure, Worm};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Signals that end a game early. The number of the last one caught is kept in the flag.
pub const TRAPPED_SIGNALS: [i32; 4] = [SIGINT, SIGHUP, SIGQUIT, SIGTERM];

/// How often a blocked wait checks for a caught signal.
const SIGNAL_POLL: Duration = Duration::from_millis(100);

/// How a game came to an end.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Ending {
    Failed(Failure),
    /// Nowhere left to put food.
    BoardFull,
    Signal(i32),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub score: u64,
    pub ending: Ending,
}

impl Outcome {
    /// Failure code as reported to the scoreboard, -1 when the game was interrupted.
    pub fn failure_code(&self) -> i32 {
        match self.ending {
            Ending::Failed(failure) => failure.code(),
            Ending::BoardFull => Failure::None.code(),
            Ending::Signal(_) => -1,
        }
    }

    pub fn signal(&self) -> i32 {
        match self.ending {
            Ending::Signal(sig) => sig,
            _ => -1,
        }
    }
}

/// Installs handlers for `TRAPPED_SIGNALS`. The returned flag holds the number of
/// the last signal caught, 0 while none was.
pub fn trap_signals() -> io::Result<Arc<AtomicUsize>> {
    let caught = Arc::new(AtomicUsize::new(0));
    for sig in TRAPPED_SIGNALS {
        signal_hook::flag::register_usize(sig, Arc::clone(&caught), sig as usize)?;
    }
    Ok(caught)
}

/// One game: a playground, the worm on it and the tick loop driving them.
pub struct WormGame<R: Renderer> {
    config: Config,
    playground: Playground<R>,
    worm: Worm,
    paused: bool,
    board_full: bool,
    signals: Arc<AtomicUsize>,
}

impl<R: Renderer> WormGame<R> {
    /// Sets up the board: worm in the middle heading up, one food, one bomb.
    ///
    /// A board with no room for the food or the bomb is already won. Any other
    /// failure reports the game as ended and gives the terminal back before
    /// returning.
    pub fn start(config: Config, mut playground: Playground<R>) -> Result<Self> {
        if let Some(reporter) = playground.reporter_mut() {
            reporter.notify_game_start(&config);
        }

        let worm = Worm::new(&mut playground, &config);
        let mut game = WormGame {
            config,
            playground,
            worm,
            paused: false,
            board_full: false,
            signals: Arc::new(AtomicUsize::new(0)),
        };

        if let Err(err) = game.lay_out() {
            game.abort();
            game.shutdown();
            return Err(err);
        }

        info!("game started on {}x{}", game.config.rows, game.config.cols);
        Ok(game)
    }

    /// Ends the game early once `signals` holds a non-zero signal number.
    pub fn with_signals(mut self, signals: Arc<AtomicUsize>) -> Self {
        self.signals = signals;
        self
    }

    pub fn worm(&self) -> &Worm {
        &self.worm
    }

    pub fn playground(&self) -> &Playground<R> {
        &self.playground
    }

    pub fn playground_mut(&mut self) -> &mut Playground<R> {
        &mut self.playground
    }

    /// Runs ticks until the worm dies, the board fills up or the player quits.
    pub fn play(&mut self) -> Result<Outcome> {
        if self.board_full {
            return Ok(Outcome { score: self.worm.score(), ending: Ending::BoardFull });
        }

        let timeout = self.config.tick_timeout();

        let ending = loop {
            if let Some(sig) = self.caught_signal() {
                break Ending::Signal(sig);
            }

            if let Input::Key(key_ev) = self.next_input(timeout)? {
                match &key_ev {
                    ev if is_ctrl_c(ev) => break Ending::Signal(SIGINT),
                    ev if is_ctrl_backslash(ev) => break Ending::Signal(SIGQUIT),
                    KeyEvent { code: KeyCode::Esc, .. } => self.toggle_pause()?,
                    ev => {
                        if let Some(dir) = key_direction(ev) {
                            self.worm.turn(dir);
                        }
                    }
                }
            }

            if self.paused { continue; }

            match self.worm.tick(&mut self.playground) {
                Ok(Failure::None) => {}
                Ok(failure) => break Ending::Failed(failure),
                Err(GameError::NoFreeCell) => break Ending::BoardFull,
                Err(err) => return Err(err),
            }
        };

        Ok(Outcome { score: self.worm.score(), ending })
    }

    /// Shows the result, reports it and waits for a key unless the player quit.
    pub fn finish(&mut self, outcome: &Outcome) -> Result<()> {
        info!("game ended, score {}, {:?}", outcome.score, outcome.ending);

        if self.paused {
            self.toggle_pause()?;
        }

        let score_row = self.playground.rows() - 1;
        let renderer = self.playground.renderer_mut();
        renderer.draw_text((score_row, 2), &format!(" Score: {} ", outcome.score))?;
        self.worm.draw(&mut self.playground)?;

        self.report_end(outcome.score, outcome.failure_code(), outcome.signal());

        if let Ending::Signal(_) = outcome.ending {
            return Ok(());
        }

        let headline = match outcome.ending {
            Ending::BoardFull => "You won!",
            _ => "Game over!",
        };
        self.playground.renderer_mut().show_message(&[
            headline,
            &format!("Score: {}", outcome.score),
            "",
            "Press any key",
        ])?;

        // A signal cuts the wait short too
        while !self.playground.wait_for_key(SIGNAL_POLL)? {
            if let Some(sig) = self.caught_signal() {
                info!("signal {} while waiting for a key", sig);
                break;
            }
        }
        Ok(())
    }

    /// Reports an end that didn't come from the worm, e.g. a fatal error.
    pub fn abort(&mut self) {
        warn!("game aborted at score {}", self.worm.score());
        self.report_end(self.worm.score(), -1, -1);
    }

    /// Closes the scoreboard connection and gives the terminal back.
    pub fn shutdown(&mut self) {
        if let Some(reporter) = self.playground.reporter_mut() {
            reporter.close();
        }
        if let Err(err) = self.playground.renderer_mut().restore() {
            warn!("failed to restore terminal: {}", err);
        }
    }

    ///////////////////////////////////////////////////////////////////////////

    fn lay_out(&mut self) -> Result<()> {
        let placed = self.playground.place_food().and_then(|_| self.playground.place_bomb());
        match placed {
            Ok(_) => {}
            Err(GameError::NoFreeCell) => {
                info!("no room for food or bomb, board is full");
                self.board_full = true;
            }
            Err(err) => return Err(err),
        }

        self.playground.render()?;
        self.worm.turn(Up);
        self.worm.draw(&mut self.playground)
    }

    fn caught_signal(&self) -> Option<i32> {
        match self.signals.swap(0, Ordering::SeqCst) {
            0 => None,
            sig => Some(sig as i32),
        }
    }

    fn next_input(&mut self, timeout: Duration) -> Result<Input> {
        match self.playground.renderer_mut().read_input(Some(timeout)) {
            Err(err) if err.kind() == io::ErrorKind::Interrupted => Ok(Input::Timeout),
            res => Ok(res?),
        }
    }

    fn report_end(&mut self, score: u64, failure_code: i32, signal: i32) {
        if let Some(reporter) = self.playground.reporter_mut() {
            reporter.notify_game_end(score, failure_code, signal);
        }
    }

    fn toggle_pause(&mut self) -> Result<()> {
        let renderer = self.playground.renderer_mut();
        if !self.paused {
            renderer.show_message(&["Paused", "Press Esc to resume", "or Ctrl+C to quit"])?;
        } else {
            renderer.hide_message()?;
        }

        self.paused = !self.paused;
        Ok(())
    }
}

/// Plays one full game and always leaves the terminal restored.
pub fn run<R: Renderer>(config: Config, playground: Playground<R>, signals: Arc<AtomicUsize>) -> Result<Outcome> {
    let mut game = WormGame::start(config, playground)?.with_signals(signals);

    let result = game.play().and_then(|outcome| game.finish(&outcome).map(|_| outcome));
    if result.is_err() {
        game.abort();
    }

    game.shutdown();
    result
}

pub fn key_direction(ev: &KeyEvent) -> Option<Direction> {
    match ev.code {
        KeyCode::Char('w') | KeyCode::Up => Some(Up),
        KeyCode::Char('a') | KeyCode::Left => Some(Left),
        KeyCode::Char('s') | KeyCode::Down => Some(Down),
        KeyCode::Char('d') | KeyCode::Right => Some(Right),
        _ => None,
    }
}

fn is_ctrl_c(ev: &KeyEvent) -> bool {
    ev.code == KeyCode::Char('c') && ev.modifiers.contains(KeyModifiers::CONTROL)
}

// Raw mode delivers Ctrl+\ as Ctrl+4
fn is_ctrl_backslash(ev: &KeyEvent) -> bool {
    matches!(ev.code, KeyCode::Char('\\') | KeyCode::Char('4')) && ev.modifiers.contains(KeyModifiers::CONTROL)
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::grid::Cell;
    use crate::reporter::testing::{Event, RecordingReporter};
    use crate::term::testing::RecordingRenderer;
    use crate::Coords;

    fn key(code: KeyCode) -> Input {
        Input::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn ctrl(ch: char) -> Input {
        Input::Key(KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL))
    }

    fn game(inputs: Vec<Input>, reporter: Option<RecordingReporter>) -> WormGame<RecordingRenderer> {
        let config = Config::default();
        let renderer = RecordingRenderer::new(50, 100).with_inputs(inputs);
        let mut playground = Playground::new(config.rows, config.cols, renderer)
            .unwrap()
            .with_rng(StdRng::seed_from_u64(3));
        if let Some(reporter) = reporter {
            playground = playground.with_reporter(Box::new(reporter));
        }
        WormGame::start(config, playground).unwrap()
    }

    /// Wipes food and bombs off the given squares so a test path is clear.
    fn clear_path(game: &mut WormGame<RecordingRenderer>, path: impl IntoIterator<Item = Coords>) {
        for pos in path {
            let pg = game.playground_mut();
            if pg.query_position(pos).intersects(Cell::FOOD | Cell::BOMB) {
                pg.mark_position(pos, Cell::EMPTY);
            }
        }
    }

    #[test]
    fn start_sets_up_the_board() {
        let game = game(vec![], None);
        let pg = game.playground();

        let count = |flag| pg.grid().interior().filter(|pos| pg.query_position(*pos).contains(flag)).count();
        assert_eq!(count(Cell::FOOD), 1);
        assert_eq!(count(Cell::BOMB), 1);
        assert_eq!(count(Cell::SNAKE), 1);
        assert_eq!(game.worm().head(), (5, 10));
        assert_eq!(game.worm().direction(), Up);
        assert_eq!(pg.renderer().borders, 1);
    }

    #[test]
    fn worm_runs_into_the_top_border() {
        let mut game = game(vec![], None);
        clear_path(&mut game, (1..5).map(|row| (row, 10)));

        let outcome = game.play().unwrap();
        assert_eq!(outcome, Outcome { score: 4, ending: Ending::Failed(Failure::HitTopBorder) });
        assert_eq!(outcome.failure_code(), 1);
        assert_eq!(outcome.signal(), -1);
    }

    #[test]
    fn arrow_keys_steer() {
        let mut game = game(vec![key(KeyCode::Left)], None);
        clear_path(&mut game, (1..10).map(|col| (5, col)));

        let outcome = game.play().unwrap();
        assert_eq!(outcome, Outcome { score: 9, ending: Ending::Failed(Failure::HitLeftBorder) });
    }

    #[test]
    fn ctrl_c_interrupts() {
        let reporter = RecordingReporter::default();
        let events = reporter.events.clone();
        let mut game = game(vec![ctrl('c')], Some(reporter));

        let outcome = game.play().unwrap();
        assert_eq!(outcome, Outcome { score: 0, ending: Ending::Signal(SIGINT) });

        game.finish(&outcome).unwrap();
        assert!(game.playground().renderer().messages.is_empty());
        assert_eq!(events.borrow().last(), Some(&Event::End { score: 0, failure_code: -1, signal: SIGINT }));
    }

    #[test]
    fn pause_holds_the_worm() {
        let inputs = vec![key(KeyCode::Esc), Input::Timeout, Input::Timeout, ctrl('c')];
        let mut game = game(inputs, None);

        let outcome = game.play().unwrap();
        assert_eq!(outcome.score, 0);
        assert_eq!(game.worm().head(), (5, 10));
        assert_eq!(game.playground().renderer().messages[0][0], "Paused");
    }

    #[test]
    fn run_reports_start_and_end() {
        let reporter = RecordingReporter::default();
        let events = reporter.events.clone();
        let config = Config::default();
        let renderer = RecordingRenderer::new(50, 100).with_inputs(vec![ctrl('c')]);
        let playground = Playground::new(config.rows, config.cols, renderer)
            .unwrap()
            .with_reporter(Box::new(reporter));

        let outcome = run(config, playground, Arc::default()).unwrap();
        assert_eq!(outcome.ending, Ending::Signal(SIGINT));

        let events = events.borrow();
        assert_eq!(events.first(), Some(&Event::Start));
        assert!(events.contains(&Event::End { score: 0, failure_code: -1, signal: SIGINT }));
        assert_eq!(events.last(), Some(&Event::Close));
    }

    #[test]
    fn game_over_shows_score() {
        // Five ticks to hit the border, then the key that dismisses the box
        let mut inputs = vec![Input::Timeout; 5];
        inputs.push(key(KeyCode::Enter));
        let mut game = game(inputs, None);
        clear_path(&mut game, (1..5).map(|row| (row, 10)));

        let outcome = game.play().unwrap();
        game.finish(&outcome).unwrap();

        let renderer = game.playground().renderer();
        assert!(renderer.texts.iter().any(|(pos, text)| *pos == (9, 2) && text == " Score: 4 "));
        assert_eq!(renderer.messages.last().unwrap()[0], "Game over!");
    }

    #[test]
    fn caught_signal_ends_the_game() {
        let reporter = RecordingReporter::default();
        let events = reporter.events.clone();
        let signals = Arc::new(AtomicUsize::new(0));
        let mut game = game(vec![], Some(reporter)).with_signals(Arc::clone(&signals));

        signals.store(SIGTERM as usize, Ordering::SeqCst);
        let outcome = game.play().unwrap();
        assert_eq!(outcome, Outcome { score: 0, ending: Ending::Signal(SIGTERM) });
        assert_eq!(outcome.failure_code(), -1);

        game.finish(&outcome).unwrap();
        assert_eq!(events.borrow().last(), Some(&Event::End { score: 0, failure_code: -1, signal: SIGTERM }));
    }

    #[test]
    fn hangup_is_trapped() {
        let signals = trap_signals().unwrap();
        signal_hook::low_level::raise(SIGHUP).unwrap();
        assert_eq!(signals.load(Ordering::SeqCst), SIGHUP as usize);
    }

    #[test]
    fn board_without_room_is_won_at_start() {
        for (rows, cols) in [(3, 3), (3, 4)] {
            let reporter = RecordingReporter::default();
            let events = reporter.events.clone();
            let config = Config { rows, cols, ..Config::default() };
            let renderer = RecordingRenderer::new(50, 100).with_inputs(vec![key(KeyCode::Enter)]);
            let playground = Playground::new(rows, cols, renderer)
                .unwrap()
                .with_rng(StdRng::seed_from_u64(3))
                .with_reporter(Box::new(reporter));

            let outcome = run(config, playground, Arc::default()).unwrap();
            assert_eq!(outcome, Outcome { score: 0, ending: Ending::BoardFull });

            let events = events.borrow();
            assert_eq!(events.first(), Some(&Event::Start));
            assert!(events.contains(&Event::End { score: 0, failure_code: 0, signal: -1 }));
            assert_eq!(events.last(), Some(&Event::Close));
        }
    }

    #[test]
    fn key_mapping() {
        let dir = |code| key_direction(&KeyEvent::new(code, KeyModifiers::NONE));
        assert_eq!(dir(KeyCode::Char('w')), Some(Up));
        assert_eq!(dir(KeyCode::Down), Some(Down));
        assert_eq!(dir(KeyCode::Char('a')), Some(Left));
        assert_eq!(dir(KeyCode::Right), Some(Right));
        assert_eq!(dir(KeyCode::Char('x')), None);
    }
}
