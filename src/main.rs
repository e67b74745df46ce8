use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::process::exit;

use anyhow::Context;
use clap::Parser;
use log::{info, LevelFilter};

use wormgame::config::{Args, Config};
use wormgame::game::{self, Ending};
use wormgame::playground::Playground;
use wormgame::reporter::{EventReporter, TcpReporter};
use wormgame::term::TermManager;
use wormgame::worm::failure_text;
use wormgame::{ExitCode, GameError};

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            // --help and --version end up here too
            let code = if err.use_stderr() { ExitCode::Syntax } else { ExitCode::Ok };
            let _ = err.print();
            exit(code.code());
        }
    };

    let code = match play(&args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("ERROR: {:#}", err);
            err.downcast_ref::<GameError>().map(GameError::exit_code).unwrap_or(ExitCode::Err)
        }
    };

    exit(code.code());
}

fn play(args: &Args) -> anyhow::Result<ExitCode> {
    if let Some(path) = &args.logfile {
        init_logging(path)?;
    }
    info!("Started");

    let config = Config::load(args)?;

    let reporter = match config.reporter_addr() {
        Some((host, port)) => Some(TcpReporter::connect(host, port, &config.user)?),
        None => None,
    };

    let term = TermManager::new().context("can't read terminal size")?;
    let mut playground = Playground::new(config.rows, config.cols, term)?;
    if let Some(reporter) = reporter {
        playground = playground.with_reporter(Box::new(reporter) as Box<dyn EventReporter>);
    }
    let signals = game::trap_signals().context("can't install signal handlers")?;
    playground.renderer_mut().setup().context("can't set up terminal")?;

    let outcome = game::run(config, playground, signals)?;

    let failure = match outcome.ending {
        Ending::Failed(failure) => failure_text(failure.code())?,
        Ending::BoardFull => "Board full",
        Ending::Signal(sig) => {
            eprintln!("Interrupted");
            info!("Interrupted by signal {}. Score {}.", sig, outcome.score);
            return Ok(ExitCode::Signal);
        }
    };

    println!("Score:   {}", outcome.score);
    println!("Failure: {}", failure);
    info!("Ended. Score {}. Fail {}.", outcome.score, failure);

    Ok(ExitCode::Ok)
}

fn init_logging(path: &Path) -> Result<(), GameError> {
    let program = std::env::current_exe().and_then(fs::canonicalize).ok();
    if path.exists() && fs::canonicalize(path).ok() == program {
        return Err(GameError::InvalidArgument("log file (-L) same as program file".to_string()));
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| GameError::LogFile { path: path.display().to_string(), source })?;

    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .target(env_logger::Target::Pipe(Box::new(file)))
        .format(|buf, record| {
            writeln!(buf, "{} {:<3.3} {}", buf.timestamp_seconds(), record.level(), record.args())
        })
        .init();

    Ok(())
}
