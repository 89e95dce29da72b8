use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Parser;
use log::info;

use chip8_engine::display::MonoTermDisplay;
use chip8_engine::emulator::Emulator;
use chip8_engine::input::TermInput;
use chip8_engine::random::StdRandom;
use chip8_engine::sound::{Mute, SimpleBeep, Sound};
use chip8_engine::{Chip8Config, Chip8Interpreter, DEFAULT_STEP_HZ, MAX_STEP_HZ};

/// A CHIP-8 emulator for the terminal.
///
/// Keys 1234/QWER/ASDF/ZXCV are the hex keypad, P pauses, Esc quits.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// program to run
    rom: PathBuf,

    /// 8XY6/8XYE shift VX in place (CHIP-48) instead of shifting VY into VX
    #[arg(long)]
    contemporary_shifts: bool,

    /// FX1E sets VF when I runs past 0xFFF
    #[arg(long)]
    index_overflow_flag: bool,

    /// instructions per second
    #[arg(
        long,
        default_value_t = DEFAULT_STEP_HZ,
        value_parser = clap::value_parser!(u32).range(1..=MAX_STEP_HZ as i64)
    )]
    speed: u32,

    /// no buzzer
    #[arg(long)]
    mute: bool,

    /// seed for the random instruction, for repeatable runs
    #[arg(long)]
    seed: Option<u64>,

    /// stop after this many instructions
    #[arg(long)]
    max_steps: Option<u64>,
}

fn run<S: Sound>(cli: &Cli, interpreter: Chip8Interpreter, sound: S) -> Result<(), Box<dyn Error>> {
    let input = TermInput::new()?;
    let display = MonoTermDisplay::new()?;
    let mut emulator = Emulator::new(interpreter, display, input, sound, cli.speed);
    if let Some(n) = cli.max_steps {
        emulator = emulator.with_max_steps(n);
    }
    emulator.run()
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let config = Chip8Config {
        legacy_mode: !cli.contemporary_shifts,
        index_overflow_flag: cli.index_overflow_flag,
        // the pacer ticks the timers at 60Hz
        tick_timers_on_step: false,
    };
    let random = match cli.seed {
        Some(seed) => StdRandom::seeded(seed),
        None => StdRandom::new(),
    };
    let mut interpreter = Chip8Interpreter::with_random(config, Box::new(random));

    let rom = fs::read(&cli.rom)?;
    interpreter.load(&rom)?;
    info!("running {} at {} steps/s", cli.rom.display(), cli.speed);

    let result = if cli.mute {
        run(&cli, interpreter, Mute::new())
    } else {
        run(&cli, interpreter, SimpleBeep::new())
    };

    // shove some junk on stdout to stop the cli messing up the last frame
    for _ in 0..12 {
        println!();
    }
    result
}
