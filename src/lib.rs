//! Command line host for the CHIP-8 coprocessor.

use std::fs;

use anyhow::{Context, Result};
use log::info;

use coproc::sim::SimCoprocessor;
use coproc::Shared;
use peripherals::{CharDevice, Keeb};

pub mod cli;
pub mod runner;

pub use cli::Args;
pub use runner::Interrupt;
use runner::{drive, Config};

/// Open the keyboard, load the program and drive the coprocessor until interrupted
///
/// The keyboard is opened before the register channel, a missing keyboard
/// never touches the coprocessor.
pub fn run(args: &Args, interrupt: &Interrupt) -> Result<()> {
    let mut keeb = match &args.keyboard {
        Some(path) => Keeb::open(path),
        None => Keeb::discover(),
    }
    .context("keyboard unavailable")?;

    let rom = fs::read(&args.rom)
        .with_context(|| format!("cannot read ROM {}", args.rom.display()))?;
    info!("{} is {} bytes", args.rom.display(), rom.len());

    let config = Config {
        interval: args.interval(),
        report_every: args.report_every(),
    };

    if args.simulate {
        info!("driving simulated register file");
        drive(Shared::new(SimCoprocessor::new()), &rom, &mut keeb, config, interrupt)
    } else {
        let device = CharDevice::open(&args.device)
            .with_context(|| format!("cannot open {}", args.device.display()))?;
        drive(Shared::new(device), &rom, &mut keeb, config, interrupt)
    }
}
