use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use peripherals::device::DEFAULT_PATH;
use peripherals::logger::{level_from_verbosity, LevelFilter};

/// Default delay between two iterations of the control loop
pub const DEFAULT_INTERVAL_MS: u64 = 4;

/// Run a CHIP-8 program on the coprocessor
///
/// Keypad on 1-4/Q-R/A-F/Z-V, Enter starts, P pauses, O reloads the program.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[arg(help = "Path to the ROM file to run")]
    pub rom: PathBuf,

    #[arg(short, long, default_value = DEFAULT_PATH, help = "Register channel device")]
    pub device: PathBuf,

    #[arg(short, long, help = "hidraw node of the keyboard, first one found if omitted")]
    pub keyboard: Option<PathBuf>,

    #[arg(long, help = "Drive a software register file instead of the device")]
    pub simulate: bool,

    #[arg(long, default_value_t = DEFAULT_INTERVAL_MS, help = "Control loop delay in milliseconds")]
    pub interval_ms: u64,

    #[arg(long, help = "Log a status snapshot every N milliseconds")]
    pub report_ms: Option<u64>,

    #[arg(short, long, action = clap::ArgAction::Count, help = "More output, repeatable")]
    pub verbose: u8,
}

impl Args {
    pub fn level(&self) -> LevelFilter {
        level_from_verbosity(self.verbose)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn report_every(&self) -> Option<Duration> {
        self.report_ms.map(Duration::from_millis)
    }
}
