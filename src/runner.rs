//! Control loop, status reporter and the shutdown path.

use std::fmt::Display;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::sleep;
use std::time::Duration;

use anyhow::{anyhow, Result};
use crossbeam_utils::thread;
use log::{debug, error, info, warn};

use coproc::gatekeeper::Gatekeeper;
use coproc::{translate, Action, Error, ReportSource, Session, Shared, Transport};

#[derive(Copy, Clone, Debug)]
pub struct Config {
    pub interval: Duration,
    pub report_every: Option<Duration>,
}

/// Interrupt requests coming from the signal handler
///
/// The first request raises the stop flag. A repeat means a transaction may be
/// stuck on the channel, so `raise` releases it if it can and asks the caller
/// to exit. A channel still held by a blocked send is closed by process exit.
#[derive(Clone, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
    hits: Arc<AtomicUsize>,
    emergency: Arc<Mutex<Option<Box<dyn Fn() + Send>>>>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    pub fn is_raised(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Record one request, `true` when the process should exit right away
    pub fn raise(&self) -> bool {
        self.flag.store(true, Ordering::SeqCst);
        if self.hits.fetch_add(1, Ordering::SeqCst) == 0 {
            return false;
        }
        if let Ok(slot) = self.emergency.try_lock() {
            if let Some(release) = slot.as_ref() {
                release();
            }
        }
        true
    }

    fn on_forced_exit(&self, release: Option<Box<dyn Fn() + Send>>) {
        if let Ok(mut slot) = self.emergency.lock() {
            *slot = release;
        }
    }
}

/// Poll input and forward it to the session until `stop` is raised
///
/// Reports only cause a write when the translated action changes. Each
/// iteration reads back the live `State` register and nothing else, full
/// snapshots come from the optional `report_status` thread.
pub fn control_loop<T, S>(
    session: &mut Session<T>,
    source: &mut S,
    interval: Duration,
    stop: &AtomicBool,
) -> Result<()>
where
    T: Transport,
    S: ReportSource,
    S::Error: Display,
{
    let mut last: Option<Action> = None;
    let mut state = None;

    while !stop.load(Ordering::SeqCst) {
        match source.poll() {
            Ok(report) => {
                let action = translate(&report);
                if last != Some(action) {
                    debug!("input {:?}", action);
                    session.apply(action)?;
                    last = Some(action);
                }
            }
            Err(nb::Error::WouldBlock) => {}
            Err(nb::Error::Other(e)) => return Err(anyhow!("input source lost: {}", e)),
        }

        let live = session.gatekeeper().read_state()?;
        if state != Some(live) {
            info!("coprocessor {:?}", live);
            state = Some(live);
        }

        sleep(interval);
    }
    info!("control loop stopped");
    Ok(())
}

/// Log a status snapshot on a fixed cadence until `done` is raised
pub fn report_status<T: Transport>(transport: Shared<T>, every: Duration, done: &AtomicBool) {
    let mut gate = Gatekeeper::new(transport);
    while !done.load(Ordering::SeqCst) {
        match gate.status() {
            Ok(status) => info!("{}", status),
            Err(e) => {
                warn!("status reporter stopped: {}", e);
                return;
            }
        }
        sleep(every);
    }
}

/// Release the channel exactly once and surface the first failure
pub fn shutdown<T: Transport>(session: Session<T>, outcome: Result<()>) -> Result<()> {
    if let Err(e) = &outcome {
        error!("session failed: {:#}", e);
    }
    let released = session.terminate();
    match (outcome, released) {
        (Err(e), _) => Err(e),
        (Ok(()), Err(e)) => Err(e.into()),
        (Ok(()), Ok(_)) => Ok(()),
    }
}

/// Bring up, start and run a session, then shut it down whatever happened
///
/// An interrupt during bring-up or before `start` leaves the coprocessor
/// paused and is not an error.
pub fn drive<T, S>(
    transport: Shared<T>,
    rom: &[u8],
    source: &mut S,
    config: Config,
    interrupt: &Interrupt,
) -> Result<()>
where
    T: Transport + Send + 'static,
    S: ReportSource,
    S::Error: Display,
{
    let mut session = Session::new(transport.clone()).interruptible(interrupt.flag());
    let done = AtomicBool::new(false);

    let emergency = transport.clone();
    let release: Box<dyn Fn() + Send> = Box::new(move || match emergency.try_release() {
        Ok(true) => warn!("channel released on forced exit"),
        Ok(false) => warn!("channel busy, leaving it to process exit"),
        Err(e) => warn!("forced release failed: {}", e),
    });
    interrupt.on_forced_exit(Some(release));
    let stop = interrupt.flag.as_ref();

    let outcome = thread::scope(|s| {
        if let Some(every) = config.report_every {
            let reporter = transport.clone();
            let done = &done;
            s.spawn(move |_| report_status(reporter, every, done));
        }

        let outcome = operate(&mut session, rom, source, config.interval, stop);
        done.store(true, Ordering::SeqCst);
        outcome
    })
    .unwrap_or_else(|_| Err(anyhow!("status reporter panicked")));

    interrupt.on_forced_exit(None);
    shutdown(session, outcome)
}

fn operate<T, S>(
    session: &mut Session<T>,
    rom: &[u8],
    source: &mut S,
    interval: Duration,
    stop: &AtomicBool,
) -> Result<()>
where
    T: Transport,
    S: ReportSource,
    S::Error: Display,
{
    let report = match session.bring_up(rom) {
        Ok(report) => report,
        Err(Error::Interrupted) => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    if !report.is_clean() {
        warn!(
            "{} bytes failed verification during bring-up",
            report.mismatches.len()
        );
    }
    if stop.load(Ordering::SeqCst) {
        info!("interrupted before start");
        return Ok(());
    }
    session.start()?;
    control_loop(session, source, interval, stop)
}

#[cfg(test)]
mod tests {
    use super::*;
    use coproc::keypad::{KeyReport, Replay, KEY_PAUSE};
    use coproc::sim::SimCoprocessor;
    use coproc::{CoprocessorState, KeyState};

    /// Replays reports, raises `stop` once they are used up
    struct Scripted {
        replay: Replay,
        stop: Arc<AtomicBool>,
    }

    impl ReportSource for Scripted {
        type Error = core::convert::Infallible;

        fn poll(&mut self) -> nb::Result<KeyReport, Self::Error> {
            if self.replay.is_empty() {
                self.stop.store(true, Ordering::SeqCst);
            }
            self.replay.poll()
        }
    }

    /// Fails on first poll
    struct Unplugged;

    impl ReportSource for Unplugged {
        type Error = &'static str;

        fn poll(&mut self) -> nb::Result<KeyReport, Self::Error> {
            Err(nb::Error::Other("unplugged"))
        }
    }

    fn config() -> Config {
        Config {
            interval: Duration::from_millis(1),
            report_every: None,
        }
    }

    #[test]
    fn keypad_and_pause() {
        let _ = env_logger::builder().is_test(true).try_init();

        let shared = Shared::new(SimCoprocessor::new());
        let interrupt = Interrupt::new();
        let mut source = Scripted {
            replay: Replay::new(vec![
                KeyReport::single(0x1A),
                KeyReport::single(0x1A),
                KeyReport::single(KEY_PAUSE),
            ]),
            stop: interrupt.flag(),
        };

        drive(shared.clone(), &[0x12, 0x00], &mut source, config(), &interrupt).unwrap();

        shared
            .with(|sim| {
                assert_eq!(sim.state(), CoprocessorState::Paused);
                assert_eq!(sim.key(), KeyState::pressed(5));
                assert_eq!(sim.releases(), 1);
            })
            .unwrap();
    }

    #[test]
    fn transport_failure_releases_once() {
        let shared = Shared::new(SimCoprocessor::new().fail_after(30));
        let mut source = Replay::default();

        let result = drive(
            shared.clone(),
            &[0x00, 0xE0],
            &mut source,
            config(),
            &Interrupt::new(),
        );
        assert!(result.is_err());
        assert_eq!(shared.with(|sim| sim.releases()).unwrap(), 1);
    }

    #[test]
    fn lost_input_is_fatal() {
        let shared = Shared::new(SimCoprocessor::new());
        let result = drive(
            shared.clone(),
            &[0x00, 0xE0],
            &mut Unplugged,
            config(),
            &Interrupt::new(),
        );
        assert!(result.unwrap_err().to_string().contains("unplugged"));
        assert_eq!(shared.with(|sim| sim.releases()).unwrap(), 1);
    }

    #[test]
    fn reporter_runs_alongside() {
        let _ = env_logger::builder().is_test(true).try_init();

        let shared = Shared::new(SimCoprocessor::new());
        let interrupt = Interrupt::new();
        let mut source = Scripted {
            replay: Replay::new((0..20).map(|n| KeyReport::single(0x1E + n % 4))),
            stop: interrupt.flag(),
        };
        let config = Config {
            interval: Duration::from_millis(1),
            report_every: Some(Duration::from_millis(2)),
        };

        drive(shared.clone(), &[0x12, 0x00], &mut source, config, &interrupt).unwrap();
        assert_eq!(shared.with(|sim| sim.releases()).unwrap(), 1);
    }

    #[test]
    fn interrupt_before_start_stays_paused() {
        let _ = env_logger::builder().is_test(true).try_init();

        let shared = Shared::new(SimCoprocessor::new());
        let interrupt = Interrupt::new();
        assert!(!interrupt.raise());

        drive(
            shared.clone(),
            &[0x12, 0x00],
            &mut Replay::default(),
            config(),
            &interrupt,
        )
        .unwrap();

        shared
            .with(|sim| {
                assert_eq!(sim.state(), CoprocessorState::Paused);
                assert_eq!(sim.releases(), 1);
            })
            .unwrap();
    }

    /// Raises the interrupt twice on its first poll
    struct DoubleInterrupt {
        interrupt: Interrupt,
        exit: bool,
    }

    impl ReportSource for DoubleInterrupt {
        type Error = core::convert::Infallible;

        fn poll(&mut self) -> nb::Result<KeyReport, Self::Error> {
            self.interrupt.raise();
            self.exit = self.interrupt.raise();
            Err(nb::Error::WouldBlock)
        }
    }

    #[test]
    fn second_interrupt_releases_channel() {
        let shared = Shared::new(SimCoprocessor::new());
        let interrupt = Interrupt::new();
        let mut source = DoubleInterrupt {
            interrupt: interrupt.clone(),
            exit: false,
        };

        // the loop's next state read hits the released channel
        let result = drive(shared.clone(), &[0x12, 0x00], &mut source, config(), &interrupt);
        assert!(result.is_err());

        assert!(source.exit);
        assert!(interrupt.is_raised());
        // once by the forced release, once more by the regular shutdown
        assert_eq!(shared.with(|sim| sim.releases()).unwrap(), 2);
        // nothing left registered once the run is over
        assert!(interrupt.raise());
        assert_eq!(shared.with(|sim| sim.releases()).unwrap(), 2);
    }
}
