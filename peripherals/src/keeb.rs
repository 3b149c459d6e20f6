//! USB keyboard as a source of boot-protocol key reports.
//!
//! A hidraw node blocks on read, so reports are pulled on a separate thread
//! and handed over a channel. Polling never blocks the control loop.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::thread;

use crossbeam_channel::{unbounded, Receiver, TryRecvError};
use log::{debug, info, warn};

use coproc::keypad::{KeyReport, ReportSource};

pub struct Keeb {
    reports: Receiver<KeyReport>,
    origin: String,
}

impl Keeb {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        info!("reading key reports from {}", path.display());
        Ok(Self::from_reader(file, path.display().to_string()))
    }

    /// Open the first readable `/dev/hidraw*` node
    pub fn discover() -> io::Result<Self> {
        let mut nodes: Vec<PathBuf> = fs::read_dir("/dev")?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .map_or(false, |name| name.starts_with("hidraw"))
            })
            .collect();
        nodes.sort();

        for node in nodes {
            match Self::open(&node) {
                Ok(keeb) => return Ok(keeb),
                Err(e) => debug!("skipping {}: {}", node.display(), e),
            }
        }
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            "no readable hidraw keyboard found",
        ))
    }

    /// Read reports from any byte stream, eight bytes at a time
    pub fn from_reader<R: Read + Send + 'static>(mut reader: R, origin: String) -> Self {
        let (tx, rx) = unbounded();
        let name = origin.clone();
        thread::spawn(move || {
            let mut buf = [0u8; KeyReport::LENGTH];
            loop {
                if let Err(e) = reader.read_exact(&mut buf) {
                    warn!("keyboard {} stopped: {}", name, e);
                    break;
                }
                if tx.send(KeyReport::from(buf)).is_err() {
                    break;
                }
            }
        });
        Self {
            reports: rx,
            origin,
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }
}

impl ReportSource for Keeb {
    type Error = io::Error;

    fn poll(&mut self) -> nb::Result<KeyReport, Self::Error> {
        match self.reports.try_recv() {
            Ok(report) => Ok(report),
            Err(TryRecvError::Empty) => Err(nb::Error::WouldBlock),
            Err(TryRecvError::Disconnected) => Err(nb::Error::Other(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "keyboard disconnected",
            ))),
        }
    }
}
