//! Thin terminal host stub. Owns an [`Engine`] and drives
//! `generate_audio_buffer` into a WAV file or a raw PCM sink for manual
//! auditioning; it stands in for the display/page system, flash
//! persistence, and MIDI import that the engine core itself has no
//! knowledge of. Everything it does goes through the `Engine` façade.

use std::io::Write;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode};
use crossterm::terminal;
use log::LevelFilter;
use pocketacid_core::pattern::drum::DrumVoice;
use pocketacid_core::{Engine, EngineConfig};

const POLL_INTERVAL: Duration = Duration::from_millis(16);
const RENDER_BLOCK_FRAMES: usize = 512;

fn main() {
    simplelog::SimpleLogger::init(LevelFilter::Info, simplelog::Config::default())
        .expect("logger installs exactly once");

    let config = EngineConfig::load_from_default_location();
    let engine = Engine::new(config);

    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("render") => {
            let out = args.next().unwrap_or_else(|| "pocketacid-render.wav".to_string());
            let seconds: f32 = args.next().and_then(|s| s.parse().ok()).unwrap_or(4.0);
            render_to_wav(&engine, &out, seconds);
        }
        _ => run_repl(&engine),
    }
}

/// Renders `seconds` of audio from the engine's current scene straight to a
/// WAV file, starting transport first. Used for offline auditioning without
/// a live audio device, since this core has no playback backend of its own.
fn render_to_wav(engine: &Engine, path: &str, seconds: f32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 22_050,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = match hound::WavWriter::create(path, spec) {
        Ok(w) => w,
        Err(e) => {
            log::error!("failed to create {path}: {e}");
            return;
        }
    };

    engine.start();
    let total_frames = (seconds * spec.sample_rate as f32) as usize;
    let mut buf = vec![0_i16; RENDER_BLOCK_FRAMES];
    let mut rendered = 0;
    while rendered < total_frames {
        let n = RENDER_BLOCK_FRAMES.min(total_frames - rendered);
        engine.generate_audio_buffer(&mut buf[..n]);
        for &sample in &buf[..n] {
            if let Err(e) = writer.write_sample(sample) {
                log::error!("wav write failed: {e}");
                return;
            }
        }
        rendered += n;
    }
    engine.stop();
    if let Err(e) = writer.finalize() {
        log::error!("failed to finalize {path}: {e}");
        return;
    }
    println!("wrote {seconds:.1}s to {path}");
}

/// Tiny `crossterm`-driven REPL: transport and step editing through the
/// `Engine` façade only, matching the keymap a real front end would wire to
/// the same calls.
fn run_repl(engine: &Engine) {
    if terminal::enable_raw_mode().is_err() {
        log::warn!("stdin is not a tty; interactive mode unavailable, exiting");
        return;
    }
    print_help();

    let mut last_step = -1;
    'outer: loop {
        if event::poll(POLL_INTERVAL).unwrap_or(false) {
            if let Ok(Event::Key(key)) = event::read() {
                match key.code {
                    KeyCode::Char('q') => break 'outer,
                    KeyCode::Char(' ') => {
                        if engine.is_playing() {
                            engine.stop();
                        } else {
                            engine.start();
                        }
                    }
                    KeyCode::Char('+') => engine.set_bpm(engine.bpm() + 1.0),
                    KeyCode::Char('-') => engine.set_bpm(engine.bpm() - 1.0),
                    KeyCode::Char(c) if c.is_ascii_digit() && c != '0' => {
                        let step = c.to_digit(10).unwrap() as usize - 1;
                        engine.toggle_drum_hit(0, 0, DrumVoice::Kick, step);
                    }
                    KeyCode::Char('s') => {
                        if engine.save_scene("last") {
                            log::info!("scene saved");
                        }
                    }
                    KeyCode::Char('l') => {
                        if engine.load_scene("last") {
                            log::info!("scene loaded");
                        }
                    }
                    _ => {}
                }
            }
        }

        if engine.is_playing() {
            let mut scratch = [0_i16; RENDER_BLOCK_FRAMES];
            engine.generate_audio_buffer(&mut scratch);
        }

        let step = engine.current_step();
        if step != last_step {
            last_step = step;
            print!("\rstep {step:>2} | bpm {:>5.1} | {}   ", engine.bpm(), if engine.is_playing() { "playing" } else { "stopped" });
            let _ = std::io::stdout().flush();
        }
    }

    let _ = terminal::disable_raw_mode();
    println!();
}

fn print_help() {
    println!("pocketacid engine host");
    println!("  space  start/stop   1-8  toggle kick step   +/-  bpm   s/l  save/load 'last'   q  quit");
}
