use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_utils::thread;
use nanorand::{rand::pcg64::Pcg64 as Rng, RNG};

use coproc::{
    codec::Direction,
    gatekeeper::Gatekeeper,
    register::{RegisterId, PROGRAM_CAPACITY},
    session::FONT_SET,
    sim::SimCoprocessor,
    translate, Action, CoprocessorState, KeyReport, KeyState, Session, SessionBuilder, Shared,
};

fn random_rom(rng: &mut Rng, len: usize) -> Vec<u8> {
    (0..len).map(|_| rng.generate::<u8>()).collect()
}

#[test]
fn start_and_pause_ten_byte_rom() {
    let _ = env_logger::builder().is_test(true).try_init();

    let rom = [0x00, 0xE0, 0xA2, 0x2A, 0x60, 0x0C, 0x61, 0x08, 0x12, 0x08];
    let mut session = SessionBuilder::new()
        .with_transport(SimCoprocessor::new())
        .with_rom(&rom)
        .build()
        .unwrap();

    assert_eq!(session.status().unwrap().state, CoprocessorState::Paused);
    session.start().unwrap();
    assert_eq!(session.status().unwrap().state, CoprocessorState::Running);
    session.pause().unwrap();
    assert_eq!(session.status().unwrap().state, CoprocessorState::Paused);

    let sim = session.terminate().unwrap();
    assert_eq!(sim.releases(), 1);
}

#[test]
fn random_roms_land_at_program_start() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut rng = Rng::new_seed(0x8);

    for &len in &[0, 1, 10, 255, 0x400, PROGRAM_CAPACITY] {
        let rom = random_rom(&mut rng, len);
        let mut session = Session::new(SimCoprocessor::new().scribble(0xFF));
        let report = session.bring_up(&rom).unwrap();
        assert_eq!(report.rom_bytes, len);
        assert!(report.is_clean());

        let sim = session.terminate().unwrap();
        let memory = sim.memory();
        assert_eq!(&memory[0x200..0x200 + len], &rom[..]);
        assert!(memory[0x200 + len..].iter().all(|&b| b == 0), "len {}", len);
    }
}

#[test]
fn oversized_rom_stops_at_memory_end() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut rng = Rng::new_seed(0xC8);
    let rom = random_rom(&mut rng, PROGRAM_CAPACITY + 0x200);

    let mut session = Session::new(SimCoprocessor::new());
    let report = session.bring_up(&rom).unwrap();
    assert!(report.truncated);

    let sim = session.terminate().unwrap();
    assert_eq!(&sim.memory()[0x200..], &rom[..PROGRAM_CAPACITY]);
    let program_writes = sim
        .history()
        .iter()
        .filter(|t| t.address == RegisterId::Memory && t.direction == Direction::Write)
        .filter(|t| t.value & 1 << 20 != 0 && t.value >> 8 & 0x0FFF >= 0x200)
        .count();
    assert_eq!(program_writes, PROGRAM_CAPACITY);
}

#[test]
fn font_written_and_verified() {
    let mut session = Session::new(SimCoprocessor::new());
    session.bring_up(&[0x00, 0xE0]).unwrap();
    let sim = session.terminate().unwrap();

    let font_writes: Vec<_> = sim
        .history()
        .iter()
        .filter(|t| t.address == RegisterId::Memory)
        .take(FONT_SET.len() * 3)
        .collect();
    // each glyph byte is a write, a read request and a fetch
    for (n, chunk) in font_writes.chunks(3).enumerate() {
        assert_eq!(chunk[0].direction, Direction::Write);
        assert_eq!(chunk[0].value, 1 << 20 | (n as u32) << 8 | FONT_SET[n] as u32);
        assert_eq!(chunk[1].direction, Direction::Write);
        assert_eq!(chunk[1].value, (n as u32) << 8);
        assert_eq!(chunk[2].direction, Direction::Read);
        assert_eq!(chunk[2].result, FONT_SET[n] as u32);
    }
    assert_eq!(&sim.memory()[..0x50], &FONT_SET[..]);
}

#[test]
fn framebuffer_pixel_defaults_off() {
    let mut session = Session::new(SimCoprocessor::new());
    session.bring_up(&[]).unwrap();
    session.write_pixel(10, 5, true).unwrap();
    assert!(session.read_pixel(10, 5).unwrap());
    assert!(!session.read_pixel(10, 6).unwrap());
    assert!(session.read_pixel(64, 0).is_err());
}

#[test]
fn keypad_report_reaches_key_register() {
    let mut session = Session::new(SimCoprocessor::new());
    session.bring_up(&[0xF0, 0x0A]).unwrap();

    // W, the keypad's 5
    let action = translate(&KeyReport::from([0, 0, 0x1A, 0, 0, 0, 0, 0]));
    assert_eq!(action, Action::Keypad(5));
    session.apply(action).unwrap();
    assert_eq!(session.status().unwrap().key, KeyState::pressed(5));

    let action = translate(&KeyReport::default());
    session.apply(action).unwrap();
    assert_eq!(session.status().unwrap().key, KeyState::RELEASED);
}

#[test]
fn reporter_shares_channel_with_control_loop() {
    let _ = env_logger::builder().is_test(true).try_init();

    let shared = Shared::new(SimCoprocessor::new());
    let mut session = Session::new(shared.clone());
    session.bring_up(&[0x12, 0x00]).unwrap();
    session.pause().unwrap();

    let done = AtomicBool::new(false);
    let mut rng = Rng::new_seed(42);
    let bytes = random_rom(&mut rng, 64);

    thread::scope(|s| {
        let reporter = shared.clone();
        let done = &done;
        s.spawn(move |_| {
            let mut gate = Gatekeeper::new(reporter);
            while !done.load(Ordering::Relaxed) {
                let status = gate.status().unwrap();
                assert_eq!(status.state, CoprocessorState::Paused);
                std::thread::sleep(Duration::from_micros(50));
            }
        });

        for (offset, &byte) in bytes.iter().enumerate() {
            let address = 0x300 + offset as u16;
            session.write_memory(address, byte).unwrap();
            assert_eq!(session.read_memory(address).unwrap(), byte);
        }
        done.store(true, Ordering::Relaxed);
    })
    .unwrap();

    let sim = session.terminate().unwrap();
    assert_eq!(sim.with(|sim| sim.releases()).unwrap(), 1);
}
