//! A CHIP-8 interpreter.
//!
//! ## Design
//!
//! * the engine is a deterministic state machine: `step()` runs exactly one
//!   instruction and returns; the random instruction is the only thing that
//!   isn't, and its generator is swappable
//! * timing policy belongs to the driver; the engine never sleeps or looks
//!   at the clock, and timers can tick per step or at a separate 60Hz
//! * FX0A doesn't block, it just leaves pc where it is until a key is down
//! * abstract display, input and sound so alternatives can be plugged in;
//!   starting with TUI in-console
//! * interpreter quirks (shift source, FX1E overflow flag) are configuration,
//!   chosen before the program starts
//!
//! Model
//!
//! Emulator
//!  |-- display, input, sound, pacer
//!  |-- interpreter(config, random source)
//!  |    |-- memory map (font at 0x000, program at 0x200)
//!  |    |-- registers, stack, timers, keypad latch
//!  |    `-- framebuffer
//!  `-- main loop
//!       |-- poll input -> set_key / pause / quit
//!       |-- due = pacer.advance(elapsed)
//!       |-- due.steps x interpreter.step(); due.ticks x interpreter.tick_timers()
//!       |-- draw if draw_flag, then clear it
//!       |-- beep/stop on sound_active() changes
//!       `-- sleep until the next step is due
pub mod display;
pub mod emulator;
pub mod error;
pub mod framebuffer;
pub mod input;
pub mod instruction;
pub mod interpreter;
pub mod memory;
pub mod random;
pub mod sound;
pub mod timing;

pub use error::Chip8Error;
pub use framebuffer::{Framebuffer, SCREEN_HEIGHT, SCREEN_WIDTH};
pub use instruction::{Instruction, Opcode};
pub use interpreter::{Chip8Config, Chip8Interpreter, StepOutcome};
pub use random::{RandomSource, SequenceRandom, StdRandom};
pub use timing::{Pacer, DEFAULT_STEP_HZ, MAX_STEP_HZ, TIMER_HZ};
