//! perpetual-groove CLI: inspect, convert and expand sequences.
//!
//! Usage:
//!   pg-cli song.mid
//!   pg-cli song.groove --to-midi song.mid
//!   pg-cli song.mid --to-groove song.groove --expand -v

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use pg_master::{Config, Controller, ControllerError};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// MIDI file or Groove document to load
    input: PathBuf,

    /// Write the sequence as a MIDI file
    #[arg(long, value_name = "OUT")]
    to_midi: Option<PathBuf>,

    /// Write the sequence as a Groove document
    #[arg(long, value_name = "OUT")]
    to_groove: Option<PathBuf>,

    /// List every track's events with loops expanded
    #[arg(long)]
    expand: bool,

    /// TOML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run(&args) {
        eprintln!("pg-cli: {}", e);
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), ControllerError> {
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };

    let mut ctrl = Controller::with_config(config);
    let kind = ctrl.load_path(&args.input)?;
    println!("Loaded {} ({:?})", args.input.display(), kind);
    print!("{}", ctrl.summary());

    if args.expand {
        println!();
        print_expanded(&ctrl)?;
    }
    if let Some(out) = &args.to_midi {
        ctrl.save_midi(out)?;
        println!("Wrote {}", out.display());
    }
    if let Some(out) = &args.to_groove {
        ctrl.save_groove(out)?;
        println!("Wrote {}", out.display());
    }
    Ok(())
}

fn load_config(path: &Path) -> Result<Config, ControllerError> {
    let text = fs::read_to_string(path).map_err(|source| ControllerError::Io { path: path.to_path_buf(), source })?;
    Config::from_toml(&text)
}

fn print_expanded(ctrl: &Controller) -> Result<(), ControllerError> {
    println!("Expanded until {}", ctrl.horizon());
    for (index, track) in ctrl.sequence().tracks.iter().enumerate() {
        println!("{}:", track.name);
        for event in &ctrl.expanded_events(index)? {
            println!("  {}", event);
        }
    }
    Ok(())
}
