//! Live feed of playground and game events to a remote scoreboard.
//!
//! Every event goes out as one message of comma separated `KEY:VALUE` tokens
//! behind a `G>TAG` prefix, and the scoreboard answers each message with an
//! acknowledgement that is read and thrown away.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{debug, info, warn};
use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::error::{GameError, Result};
use crate::grid::Cell;
use crate::Coords;

/// Client protocol version presented to the scoreboard.
pub const CLIENT_VERSION: &str = "0.3";

/// Largest message either side sends.
pub const MSG_SIZE: usize = 1024;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Receiver of game events. Calls never fail from the caller's point of view.
pub trait EventReporter {
    fn notify_mark(&mut self, pos: Coords, flag: Cell);

    fn notify_unmark(&mut self, pos: Coords, flag: Cell);

    fn notify_game_start(&mut self, config: &Config);

    /// `signal` is -1 unless the game was cut short by a signal.
    fn notify_game_end(&mut self, score: u64, failure_code: i32, signal: i32);

    fn close(&mut self);
}

/// Scoreboard connection over TCP.
pub struct TcpReporter {
    stream: Option<TcpStream>,
    user: String,
    hash: String,
    local_port: u16,
    pid: u32,
}

impl TcpReporter {
    pub fn connect(host: &str, port: u16, user: &str) -> Result<Self> {
        Self::with_timeout(host, port, user, DEFAULT_TIMEOUT)
    }

    /// Connects with `timeout` applied to the connect and to every later send and acknowledgement.
    pub fn with_timeout(host: &str, port: u16, user: &str, timeout: Duration) -> Result<Self> {
        let connect_err = |source| GameError::ReporterConnect { host: host.to_string(), port, source };

        let addrs = (host, port).to_socket_addrs().map_err(connect_err)?;
        let mut last_err = None;
        let mut stream = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(s) => {
                    stream = Some(s);
                    break;
                }
                Err(err) => last_err = Some(err),
            }
        }
        let stream = match stream {
            Some(s) => s,
            None => {
                let err = last_err.unwrap_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::NotFound, "no address for host")
                });
                return Err(connect_err(err));
            }
        };

        stream.set_read_timeout(Some(timeout)).map_err(connect_err)?;
        stream.set_write_timeout(Some(timeout)).map_err(connect_err)?;
        let local = stream.local_addr().map_err(connect_err)?;

        info!("connected to scoreboard {}:{} from {}", host, port, local);

        Ok(TcpReporter {
            stream: Some(stream),
            user: user.to_string(),
            hash: String::new(),
            local_port: local.port(),
            pid: std::process::id(),
        })
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Session id of the current game, empty until the game start is reported.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    fn send(&mut self, msg: &str) {
        let stream = match self.stream.as_mut() {
            Some(stream) => stream,
            None => return,
        };

        let mut bytes = msg.as_bytes();
        if bytes.len() > MSG_SIZE {
            warn!("scoreboard message truncated to {} bytes", MSG_SIZE);
            bytes = &bytes[..MSG_SIZE];
        }

        let res = stream.write_all(bytes).and_then(|_| {
            let mut ack = [0u8; MSG_SIZE];
            match stream.read(&mut ack)? {
                0 => Err(std::io::ErrorKind::UnexpectedEof.into()),
                _ => Ok(()),
            }
        });

        if let Err(err) = res {
            warn!("scoreboard disconnected: {}", err);
            self.disconnect();
        }
    }

    fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

impl EventReporter for TcpReporter {
    fn notify_mark(&mut self, pos: Coords, flag: Cell) {
        self.send(&mark_message("MRK", pos, flag));
    }

    fn notify_unmark(&mut self, pos: Coords, flag: Cell) {
        self.send(&mark_message("UNM", pos, flag));
    }

    fn notify_game_start(&mut self, config: &Config) {
        if let Some(stream) = self.stream.as_ref() {
            let ip = stream.local_addr().map(|a| a.ip().to_string()).unwrap_or_default();
            self.hash = session_hash(&ip, self.local_port, &self.user, unix_time());
        }
        let msg = begin_message(config, self.pid, self.local_port, &self.user, &self.hash);
        debug!("{}", msg);
        self.send(&msg);
    }

    fn notify_game_end(&mut self, score: u64, failure_code: i32, signal: i32) {
        let msg = end_message(score, failure_code, signal, self.pid, self.local_port, &self.user, &self.hash);
        debug!("{}", msg);
        self.send(&msg);
    }

    fn close(&mut self) {
        self.disconnect();
    }
}

pub fn mark_message(tag: &str, (row, col): Coords, flag: Cell) -> String {
    format!("G>{},ROW:{},COL:{},WAT:{}", tag, row, col, flag.bits())
}

pub fn begin_message(config: &Config, pid: u32, port: u16, user: &str, hash: &str) -> String {
    format!(
        "G>BEG,VER:{},PID:{},PRT:{},RWS:{},CLS:{},LEN:{},TIO:{},USR:{},HSH:{}",
        CLIENT_VERSION, pid, port, config.rows, config.cols, config.snake_len, config.tick_timeout_ms, user, hash
    )
}

pub fn end_message(score: u64, failure_code: i32, signal: i32, pid: u32, port: u16, user: &str, hash: &str) -> String {
    format!(
        "G>END,SCR:{},SIG:{},FAI:{},PID:{},PRT:{},USR:{},HSH:{}",
        score, signal, failure_code, pid, port, user, hash
    )
}

/// 16 hex digits identifying one game on the scoreboard.
pub fn session_hash(ip: &str, port: u16, user: &str, time: f64) -> String {
    let digest = Sha256::digest(format!("{}:{}:{}:{}", ip, port, user, time).as_bytes());
    digest.iter().take(8).map(|b| format!("{:02x}", b)).collect()
}

fn unix_time() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs_f64()).unwrap_or(0.0)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    pub enum Event {
        Mark(Coords, Cell),
        Unmark(Coords, Cell),
        Start,
        End { score: u64, failure_code: i32, signal: i32 },
        Close,
    }

    /// Reporter that keeps every event in a list shared with the test.
    #[derive(Clone, Default)]
    pub struct RecordingReporter {
        pub events: Rc<RefCell<Vec<Event>>>,
    }

    impl EventReporter for RecordingReporter {
        fn notify_mark(&mut self, pos: Coords, flag: Cell) {
            self.events.borrow_mut().push(Event::Mark(pos, flag));
        }

        fn notify_unmark(&mut self, pos: Coords, flag: Cell) {
            self.events.borrow_mut().push(Event::Unmark(pos, flag));
        }

        fn notify_game_start(&mut self, _config: &Config) {
            self.events.borrow_mut().push(Event::Start);
        }

        fn notify_game_end(&mut self, score: u64, failure_code: i32, signal: i32) {
            self.events.borrow_mut().push(Event::End { score, failure_code, signal });
        }

        fn close(&mut self) {
            self.events.borrow_mut().push(Event::Close);
        }
    }
}
