use anyhow::Context;
use clap::Parser;
use log::{info, warn};

use chip8_host::{Args, Interrupt};
use peripherals::logger::{create_logger, init};

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init(create_logger(args.level())).context("logger already installed")?;

    let interrupt = Interrupt::new();
    let handler = interrupt.clone();
    ctrlc::set_handler(move || {
        if handler.raise() {
            warn!("interrupted again, exiting");
            std::process::exit(130);
        }
        info!("interrupt received, stopping");
    })
    .context("cannot install interrupt handler")?;

    chip8_host::run(&args, &interrupt)
}
