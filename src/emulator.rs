use crate::display::Display;
use crate::framebuffer::SCREEN_PACKED_BYTES;
use crate::input::{Input, InputEvent};
use crate::interpreter::{Chip8Interpreter, StepOutcome};
use crate::sound::Sound;
use crate::timing::Pacer;
use log::{debug, error, info};
use std::error::Error;
use std::time::{Duration, Instant};

/// Environment: owns the interpreter and the devices around it, and runs
/// the main loop
///
///  |-- input  -> keypad latch, pause, quit
///  |-- pacer  -> n steps, m timer ticks for the time that passed
///  |-- screen -> redraw if the draw flag is up, then lower it
///  |-- sound  -> start/stop on sound_active() transitions
///  `-- sleep until the next step is due
pub struct Emulator<D: Display, I: Input, S: Sound> {
    interpreter: Chip8Interpreter,
    display: D,
    input: I,
    sound: S,
    pacer: Pacer,
    running: bool,
    paused: bool,
    sounding: bool,
    steps_run: u64,
    max_steps: Option<u64>,
}

impl<D: Display, I: Input, S: Sound> Emulator<D, I, S> {
    pub fn new(
        interpreter: Chip8Interpreter,
        display: D,
        input: I,
        sound: S,
        step_hz: u32,
    ) -> Self {
        assert_eq!(
            display.get_display_size_bytes(),
            SCREEN_PACKED_BYTES,
            "display does not take a packed 64x32 screen"
        );
        Emulator {
            interpreter,
            display,
            input,
            sound,
            pacer: Pacer::new(step_hz),
            running: true,
            paused: false,
            sounding: false,
            steps_run: 0,
            max_steps: None,
        }
    }

    /// stop after this many instructions
    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    /// until the user quits, the step limit is hit, the program hits an
    /// opcode it can't get past, or it faults
    pub fn run(&mut self) -> Result<(), Box<dyn Error>> {
        let mut last = Instant::now();
        while self.running {
            let now = Instant::now();
            self.run_for(now - last)?;
            last = now;
            spin_sleep::sleep(self.pacer.until_next_step());
        }
        info!("stopped after {} steps", self.steps_run);
        Ok(())
    }

    /// one pass of the main loop, covering `elapsed` of emulated time
    pub fn run_for(&mut self, elapsed: Duration) -> Result<(), Box<dyn Error>> {
        self.handle_input()?;
        if self.running && !self.paused {
            let due = self.pacer.advance(elapsed);
            for _ in 0..due.steps {
                if !self.step()? {
                    break;
                }
            }
            // when step() ticks the timers itself the pacer's ticks are moot
            if !self.interpreter.config().tick_timers_on_step {
                for _ in 0..due.ticks {
                    self.interpreter.tick_timers();
                }
            }
        }
        self.update_screen()?;
        self.handle_sound()?;
        Ok(())
    }

    /// false once the loop should stop
    fn step(&mut self) -> Result<bool, Box<dyn Error>> {
        // FX0A holds pc still too, but the key it waits for arrives with the
        // next poll; an unknown opcode would just come round again
        let outcome = self.interpreter.step()?;
        self.steps_run += 1;
        if let StepOutcome::UnknownOpcode(word) = outcome {
            error!(
                "stuck on unknown opcode {:#06x} at {:#06x}",
                word,
                self.interpreter.program_counter()
            );
            self.running = false;
        } else if Some(self.steps_run) == self.max_steps {
            info!("reached step limit");
            self.running = false;
        }
        Ok(self.running)
    }

    fn handle_input(&mut self) -> Result<(), Box<dyn Error>> {
        for event in self.input.poll_events()? {
            match event {
                InputEvent::Key { key, pressed } => self.interpreter.set_key(key, pressed),
                InputEvent::Pause => {
                    self.paused = !self.paused;
                    debug!("{}", if self.paused { "paused" } else { "unpaused" });
                }
                InputEvent::Quit => self.running = false,
            }
        }
        Ok(())
    }

    fn update_screen(&mut self) -> Result<(), Box<dyn Error>> {
        if self.interpreter.draw_flag() {
            self.display
                .draw(&self.interpreter.framebuffer().to_packed())?;
            self.interpreter.clear_draw_flag();
        }
        Ok(())
    }

    fn handle_sound(&mut self) -> Result<(), Box<dyn Error>> {
        let active = self.interpreter.sound_active();
        if active != self.sounding {
            if active {
                self.sound.beep()?;
            } else {
                self.sound.stop()?;
            }
            self.sounding = active;
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn steps_run(&self) -> u64 {
        self.steps_run
    }

    pub fn interpreter(&self) -> &Chip8Interpreter {
        &self.interpreter
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn sound(&self) -> &S {
        &self.sound
    }
}
