//! # interpreter
//!
//! The whole machine lives in one `Chip8Interpreter`: 4K of RAM, sixteen
//! byte registers V0-VF, a sixteen deep call stack, the program counter, the
//! index register I, the delay and sound timers, the framebuffer and the
//! keypad latch. Nothing else holds a reference to any of it.
//!
//! `step()` runs exactly one instruction:
//!
//!   fetch   -- two bytes at pc, big endian
//!   decode  -- `Instruction::decode`
//!   execute -- mutate registers, memory, framebuffer; pick the next pc
//!   timers  -- one tick, unless the driver ticks them itself
//!
//! VF doubles as the flag register. Operations that set it read their
//! operands first, so `8FY4` and friends leave the flag, not the result, in VF.
use crate::error::Chip8Error;
use crate::framebuffer::Framebuffer;
use crate::instruction::{Instruction, Opcode};
use crate::memory::{Chip8MemoryMap, MemoryMap, CHIP8_PROGRAM_ADDR, CHIP8_RAM_SIZE_BYTES};
use crate::random::{RandomSource, StdRandom};
use log::{debug, error, trace, warn};

pub const REGISTER_COUNT: usize = 16;
pub const STACK_DEPTH: usize = 16;
pub const KEY_COUNT: usize = 16;

/// the flag register
const VF: usize = 0xf;

/// the sound timer has to be strictly above this for the buzzer to sound
pub const SOUND_TIMER_THRESHOLD: u8 = 1;

/// Variations between interpreters. Set these up before running anything;
/// flipping them mid-program is unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chip8Config {
    /// 8XY6/8XYE shift VY into VX (COSMAC VIP, the default); off shifts VX
    /// in place (CHIP-48 and later)
    pub legacy_mode: bool,
    /// FX1E sets VF to 1 when I + VX goes past 0xFFF, and to 0 otherwise
    pub index_overflow_flag: bool,
    /// `step()` also ticks the timers; turn off when the driver calls
    /// `tick_timers()` at its own 60Hz
    pub tick_timers_on_step: bool,
}

impl Default for Chip8Config {
    fn default() -> Self {
        Chip8Config {
            legacy_mode: true,
            index_overflow_flag: false,
            tick_timers_on_step: true,
        }
    }
}

/// what a successful `step()` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Executed(Instruction),
    /// FX0A with no key down; pc stays put and the same instruction runs next time
    WaitingForKey,
    /// not in the base set; pc stays put, the caller decides whether to stop
    UnknownOpcode(u16),
}

/// where pc goes after an instruction
enum Flow {
    Next,
    Skip,
    Jump(u16),
    Stall,
}

pub struct Chip8Interpreter {
    memory: Chip8MemoryMap,
    registers: [u8; REGISTER_COUNT],
    stack: [u16; STACK_DEPTH],
    stack_pointer: usize,
    program_counter: u16,
    i: u16,
    delay_timer: u8,
    sound_timer: u8,
    screen: Framebuffer,
    keys: [bool; KEY_COUNT],
    draw_flag: bool,
    halted: bool,
    config: Chip8Config,
    random: Box<dyn RandomSource>,
}

impl Default for Chip8Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Chip8Interpreter {
    pub fn new() -> Self {
        Self::with_config(Chip8Config::default())
    }

    pub fn with_config(config: Chip8Config) -> Self {
        Self::with_random(config, Box::new(StdRandom::new()))
    }

    /// fully specified machine; tests hand in a `SequenceRandom`
    pub fn with_random(config: Chip8Config, random: Box<dyn RandomSource>) -> Self {
        Chip8Interpreter {
            memory: Chip8MemoryMap::new(),
            registers: [0; REGISTER_COUNT],
            stack: [0; STACK_DEPTH],
            stack_pointer: 0,
            program_counter: CHIP8_PROGRAM_ADDR,
            i: 0,
            delay_timer: 0,
            sound_timer: 0,
            screen: Framebuffer::new(),
            keys: [false; KEY_COUNT],
            draw_flag: false,
            halted: false,
            config,
            random,
        }
    }

    /// load a chip8 program at 0x200
    pub fn load(&mut self, program: &[u8]) -> Result<(), Chip8Error> {
        self.memory.load_program(program)
    }

    /// execute one instruction, then apply the timer policy
    pub fn step(&mut self) -> Result<StepOutcome, Chip8Error> {
        if self.halted {
            return Err(Chip8Error::Halted);
        }
        let outcome = self.execute_next().map_err(|e| {
            error!("halting at {:#06x}: {}", self.program_counter, e);
            self.halted = true;
            e
        })?;
        if self.config.tick_timers_on_step {
            self.tick_timers();
        }
        Ok(outcome)
    }

    /// one 60Hz timer tick; neither timer goes below zero
    pub fn tick_timers(&mut self) {
        self.delay_timer = self.delay_timer.saturating_sub(1);
        self.sound_timer = self.sound_timer.saturating_sub(1);
    }

    fn execute_next(&mut self) -> Result<StepOutcome, Chip8Error> {
        let pc = self.program_counter;
        let word = self.memory.get_word(pc)?;
        let instruction = match Instruction::decode(Opcode(word)) {
            Some(instruction) => instruction,
            None => {
                warn!("unknown opcode {:#06x} at {:#06x}", word, pc);
                return Ok(StepOutcome::UnknownOpcode(word));
            }
        };
        trace!("{:#06x}: {:04x} {:?}", pc, word, instruction);

        match self.execute(instruction)? {
            Flow::Next => self.program_counter = pc.wrapping_add(2),
            Flow::Skip => self.program_counter = pc.wrapping_add(4),
            Flow::Jump(addr) => self.program_counter = addr,
            Flow::Stall => return Ok(StepOutcome::WaitingForKey),
        }
        Ok(StepOutcome::Executed(instruction))
    }

    fn execute(&mut self, instruction: Instruction) -> Result<Flow, Chip8Error> {
        use Instruction::*;
        let v = &mut self.registers;
        let flow = match instruction {
            Cls => {
                self.screen.clear();
                self.draw_flag = true;
                Flow::Next
            }
            Ret => {
                if self.stack_pointer == 0 {
                    return Err(Chip8Error::StackUnderflow {
                        pc: self.program_counter,
                    });
                }
                self.stack_pointer -= 1;
                Flow::Jump(self.stack[self.stack_pointer].wrapping_add(2))
            }
            Jp(addr) => Flow::Jump(addr),
            Call(addr) => {
                if self.stack_pointer == STACK_DEPTH {
                    return Err(Chip8Error::StackOverflow {
                        pc: self.program_counter,
                    });
                }
                self.stack[self.stack_pointer] = self.program_counter;
                self.stack_pointer += 1;
                Flow::Jump(addr)
            }
            SeByte(x, nn) => skip_if(v[x] == nn),
            SneByte(x, nn) => skip_if(v[x] != nn),
            SeReg(x, y) => skip_if(v[x] == v[y]),
            SneReg(x, y) => skip_if(v[x] != v[y]),
            LdByte(x, nn) => {
                v[x] = nn;
                Flow::Next
            }
            AddByte(x, nn) => {
                v[x] = v[x].wrapping_add(nn);
                Flow::Next
            }
            LdReg(x, y) => {
                v[x] = v[y];
                Flow::Next
            }
            Or(x, y) => {
                v[x] |= v[y];
                Flow::Next
            }
            And(x, y) => {
                v[x] &= v[y];
                Flow::Next
            }
            Xor(x, y) => {
                v[x] ^= v[y];
                Flow::Next
            }
            AddReg(x, y) => {
                let (sum, carry) = v[x].overflowing_add(v[y]);
                v[x] = sum;
                v[VF] = carry as u8;
                Flow::Next
            }
            Sub(x, y) => {
                let (minuend, subtrahend) = (v[x], v[y]);
                v[x] = minuend.wrapping_sub(subtrahend);
                v[VF] = (minuend >= subtrahend) as u8;
                Flow::Next
            }
            Subn(x, y) => {
                let (minuend, subtrahend) = (v[y], v[x]);
                v[x] = minuend.wrapping_sub(subtrahend);
                v[VF] = (minuend >= subtrahend) as u8;
                Flow::Next
            }
            Shr(x, y) => {
                let src = if self.config.legacy_mode { v[y] } else { v[x] };
                v[x] = src >> 1;
                v[VF] = src & 0x01;
                Flow::Next
            }
            Shl(x, y) => {
                let src = if self.config.legacy_mode { v[y] } else { v[x] };
                v[x] = src << 1;
                v[VF] = src >> 7;
                Flow::Next
            }
            LdI(addr) => {
                self.i = addr;
                Flow::Next
            }
            JpV0(addr) => Flow::Jump(addr + v[0] as u16),
            Rnd(x, nn) => {
                v[x] = self.random.next_byte() & nn;
                Flow::Next
            }
            Drw(x, y, n) => {
                let (vx, vy) = (v[x], v[y]);
                self.draw_sprite(vx, vy, n)?;
                Flow::Next
            }
            Skp(x) => skip_if(self.keys[(v[x] & 0x0f) as usize]),
            Sknp(x) => skip_if(!self.keys[(v[x] & 0x0f) as usize]),
            LdRegDt(x) => {
                v[x] = self.delay_timer;
                Flow::Next
            }
            LdKey(x) => match self.keys.iter().rposition(|&down| down) {
                Some(key) => {
                    v[x] = key as u8;
                    Flow::Next
                }
                None => {
                    debug!("waiting for key into V{:X}", x);
                    Flow::Stall
                }
            },
            LdDtReg(x) => {
                self.delay_timer = v[x];
                Flow::Next
            }
            LdSt(x) => {
                self.sound_timer = v[x];
                Flow::Next
            }
            AddI(x) => {
                let vx = v[x];
                let sum = self.i as u32 + vx as u32;
                self.i = self.i.wrapping_add(vx as u16);
                if self.config.index_overflow_flag {
                    v[VF] = (sum >= CHIP8_RAM_SIZE_BYTES as u32) as u8;
                }
                Flow::Next
            }
            LdF(x) => {
                self.i = Chip8MemoryMap::glyph_addr(v[x]);
                Flow::Next
            }
            LdB(x) => {
                let vx = v[x];
                self.memory
                    .write(&[vx / 100, (vx / 10) % 10, vx % 10], self.i)?;
                Flow::Next
            }
            StoreRegs(x) => {
                self.memory.write(&v[..=x], self.i)?;
                self.i = self.i.wrapping_add(x as u16 + 1);
                Flow::Next
            }
            LoadRegs(x) => {
                let block = self.memory.get_ro_slice(self.i, x + 1)?;
                v[..=x].copy_from_slice(block);
                self.i = self.i.wrapping_add(x as u16 + 1);
                Flow::Next
            }
        };
        Ok(flow)
    }

    /// XOR an 8 pixel wide, `rows` high sprite from I onto the screen at
    /// (vx, vy); VF reports whether anything got switched off
    fn draw_sprite(&mut self, vx: u8, vy: u8, rows: u8) -> Result<(), Chip8Error> {
        let sprite = self.memory.get_ro_slice(self.i, rows as usize)?;
        let mut collision = false;
        for (row, bits) in sprite.iter().enumerate() {
            for col in 0..8 {
                if bits & (0x80 >> col) != 0 {
                    collision |= self
                        .screen
                        .toggle(vx as usize + col, vy as usize + row);
                }
            }
        }
        self.registers[VF] = collision as u8;
        self.draw_flag = true;
        Ok(())
    }

    /// framebuffer read; coordinates wrap
    pub fn get_pixel(&self, x: usize, y: usize) -> bool {
        self.screen.get(x, y)
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.screen
    }

    /// set whenever the screen may have changed
    pub fn draw_flag(&self) -> bool {
        self.draw_flag
    }

    /// the renderer calls this once it has drawn the screen
    pub fn clear_draw_flag(&mut self) {
        self.draw_flag = false;
    }

    pub fn sound_active(&self) -> bool {
        self.sound_timer > SOUND_TIMER_THRESHOLD
    }

    /// `key` must be a hex keypad value, 0x0-0xF
    pub fn set_key(&mut self, key: u8, pressed: bool) {
        assert!(
            (key as usize) < KEY_COUNT,
            "key {:#x} is not on the hex keypad",
            key
        );
        self.keys[key as usize] = pressed;
    }

    pub fn set_legacy_mode(&mut self, legacy: bool) {
        self.config.legacy_mode = legacy;
    }

    pub fn set_index_overflow_flag(&mut self, enabled: bool) {
        self.config.index_overflow_flag = enabled;
    }

    pub fn config(&self) -> Chip8Config {
        self.config
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn program_counter(&self) -> u16 {
        self.program_counter
    }

    pub fn stack_pointer(&self) -> usize {
        self.stack_pointer
    }

    pub fn index(&self) -> u16 {
        self.i
    }

    pub fn register(&self, x: usize) -> u8 {
        self.registers[x]
    }

    pub fn delay_timer(&self) -> u8 {
        self.delay_timer
    }

    pub fn sound_timer(&self) -> u8 {
        self.sound_timer
    }

    pub fn memory(&self) -> &Chip8MemoryMap {
        &self.memory
    }
}

fn skip_if(condition: bool) -> Flow {
    if condition {
        Flow::Skip
    } else {
        Flow::Next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::CHIP8_FONT;
    use crate::random::SequenceRandom;
    use proptest::prelude::*;

    /// a machine with `program` loaded and a repeatable random source
    fn machine(program: &[u16]) -> Chip8Interpreter {
        machine_with(Chip8Config::default(), program)
    }

    fn machine_with(config: Chip8Config, program: &[u16]) -> Chip8Interpreter {
        let random = Box::new(SequenceRandom::new(&[0xa5, 0x3c]));
        let mut m = Chip8Interpreter::with_random(config, random);
        let bytes: Vec<u8> = program.iter().flat_map(|w| w.to_be_bytes()).collect();
        m.load(&bytes).unwrap();
        m
    }

    fn run(m: &mut Chip8Interpreter, steps: usize) -> Result<(), Chip8Error> {
        for _ in 0..steps {
            m.step()?;
        }
        Ok(())
    }

    #[test]
    fn test_program_load_ok() -> Result<(), Chip8Error> {
        let mut i = Chip8Interpreter::new();
        i.load(&[0x00, 0xe0]) // clear screen
    }

    #[test]
    fn test_initial_state() {
        let m = Chip8Interpreter::new();
        assert_eq!(m.program_counter(), 0x200);
        assert_eq!(m.stack_pointer(), 0);
        assert_eq!(&m.memory().as_slice()[..80], &CHIP8_FONT[..]);
        assert!(!m.draw_flag());
        assert!(!m.sound_active());
    }

    #[test]
    fn test_rom_too_large() {
        let mut m = Chip8Interpreter::new();
        assert_eq!(
            m.load(&[0; 3585]),
            Err(Chip8Error::RomTooLarge {
                size: 3585,
                max_size: 3584
            })
        );
    }

    #[test]
    fn test_clear_screen() -> Result<(), Chip8Error> {
        // draw the "0" glyph, then clear
        let mut m = machine(&[0xa000, 0xd005, 0x00e0]);
        run(&mut m, 2)?;
        assert!(m.get_pixel(0, 0));
        m.clear_draw_flag();
        run(&mut m, 1)?;
        assert!(m.framebuffer().is_blank());
        assert!(m.draw_flag());
        Ok(())
    }

    #[test]
    fn test_jump() -> Result<(), Chip8Error> {
        let mut m = machine(&[0x1456]);
        run(&mut m, 1)?;
        assert_eq!(m.program_counter(), 0x456);
        Ok(())
    }

    #[test]
    fn test_jump_with_offset() -> Result<(), Chip8Error> {
        let mut m = machine(&[0x6010, 0xb300]);
        run(&mut m, 2)?;
        assert_eq!(m.program_counter(), 0x310);
        Ok(())
    }

    #[test]
    fn test_call_return_round_trip() -> Result<(), Chip8Error> {
        // 0x200: call 0x206; 0x202: ...; 0x206: ret
        let mut m = machine(&[0x2206, 0x0000, 0x0000, 0x00ee]);
        run(&mut m, 1)?;
        assert_eq!(m.program_counter(), 0x206);
        assert_eq!(m.stack_pointer(), 1);
        run(&mut m, 1)?;
        assert_eq!(m.program_counter(), 0x202);
        assert_eq!(m.stack_pointer(), 0);
        Ok(())
    }

    #[test]
    fn test_return_with_empty_stack_is_fatal() -> Result<(), Chip8Error> {
        let mut m = machine(&[0x00ee]);
        assert_eq!(m.step(), Err(Chip8Error::StackUnderflow { pc: 0x200 }));
        assert!(m.is_halted());
        assert_eq!(m.step(), Err(Chip8Error::Halted));
        assert_eq!(m.program_counter(), 0x200);
        Ok(())
    }

    #[test]
    fn test_seventeenth_call_overflows() -> Result<(), Chip8Error> {
        // calls itself forever
        let mut m = machine(&[0x2200]);
        run(&mut m, 16)?;
        assert_eq!(m.stack_pointer(), 16);
        assert_eq!(m.step(), Err(Chip8Error::StackOverflow { pc: 0x200 }));
        assert_eq!(m.stack_pointer(), 16);
        Ok(())
    }

    #[test]
    fn test_skips() -> Result<(), Chip8Error> {
        let cases: [(&[u16], u16); 8] = [
            (&[0x6142, 0x3142], 0x206),
            (&[0x6142, 0x3143], 0x204),
            (&[0x6142, 0x4142], 0x204),
            (&[0x6142, 0x4143], 0x206),
            (&[0x6142, 0x6242, 0x5120], 0x208),
            (&[0x6142, 0x6243, 0x5120], 0x206),
            (&[0x6142, 0x6242, 0x9120], 0x206),
            (&[0x6142, 0x6243, 0x9120], 0x208),
        ];
        for (program, pc) in cases {
            let mut m = machine(program);
            run(&mut m, program.len())?;
            assert_eq!(m.program_counter(), pc, "{:04x?}", program);
        }
        Ok(())
    }

    #[test]
    fn test_load_and_add_immediate_wraps() -> Result<(), Chip8Error> {
        let mut m = machine(&[0x63f0, 0x7320, 0x6f07, 0x7f01]);
        run(&mut m, 4)?;
        assert_eq!(m.register(3), 0x10);
        // 7XNN never touches the flag
        assert_eq!(m.register(0xf), 0x08);
        Ok(())
    }

    #[test]
    fn test_bitwise_ops() -> Result<(), Chip8Error> {
        let mut m = machine(&[
            0x60cc, 0x61aa, 0x8200, 0x8211, 0x8300, 0x8312, 0x8400, 0x8413,
        ]);
        run(&mut m, 8)?;
        assert_eq!(m.register(2), 0xee);
        assert_eq!(m.register(3), 0x88);
        assert_eq!(m.register(4), 0x66);
        Ok(())
    }

    #[test]
    fn test_add_with_carry() -> Result<(), Chip8Error> {
        let mut m = machine(&[0x60fa, 0x610a, 0x8014]);
        run(&mut m, 3)?;
        assert_eq!(m.register(0), 4);
        assert_eq!(m.register(0xf), 1);

        let mut m = machine(&[0x600a, 0x6114, 0x8014]);
        run(&mut m, 3)?;
        assert_eq!(m.register(0), 30);
        assert_eq!(m.register(0xf), 0);
        Ok(())
    }

    #[test]
    fn test_flag_wins_when_vf_is_the_target() -> Result<(), Chip8Error> {
        let mut m = machine(&[0x6ffa, 0x610a, 0x8f14]);
        run(&mut m, 3)?;
        assert_eq!(m.register(0xf), 1);
        Ok(())
    }

    #[test]
    fn test_subtract_x_minus_y() -> Result<(), Chip8Error> {
        let mut m = machine(&[0x600a, 0x6105, 0x8015]);
        run(&mut m, 3)?;
        assert_eq!(m.register(0), 5);
        assert_eq!(m.register(0xf), 1);

        let mut m = machine(&[0x6005, 0x610a, 0x8015]);
        run(&mut m, 3)?;
        assert_eq!(m.register(0), 251);
        assert_eq!(m.register(0xf), 0);

        // equal operands don't borrow
        let mut m = machine(&[0x6007, 0x6107, 0x8015]);
        run(&mut m, 3)?;
        assert_eq!(m.register(0), 0);
        assert_eq!(m.register(0xf), 1);
        Ok(())
    }

    #[test]
    fn test_subtract_y_minus_x() -> Result<(), Chip8Error> {
        let mut m = machine(&[0x6005, 0x610a, 0x8017]);
        run(&mut m, 3)?;
        assert_eq!(m.register(0), 5);
        assert_eq!(m.register(0xf), 1);

        let mut m = machine(&[0x600a, 0x6105, 0x8017]);
        run(&mut m, 3)?;
        assert_eq!(m.register(0), 251);
        assert_eq!(m.register(0xf), 0);
        Ok(())
    }

    #[test]
    fn test_shifts_take_vy_by_default() -> Result<(), Chip8Error> {
        let mut m = machine(&[0x6081, 0x6102, 0x8016]);
        run(&mut m, 3)?;
        assert_eq!(m.register(0), 0x01);
        assert_eq!(m.register(1), 0x02);
        assert_eq!(m.register(0xf), 0);

        let mut m = machine(&[0x6001, 0x61c0, 0x801e]);
        run(&mut m, 3)?;
        assert_eq!(m.register(0), 0x80);
        assert_eq!(m.register(0xf), 1);
        Ok(())
    }

    #[test]
    fn test_contemporary_shifts_in_place() -> Result<(), Chip8Error> {
        let contemporary = Chip8Config {
            legacy_mode: false,
            ..Chip8Config::default()
        };
        let mut m = machine_with(contemporary, &[0x6081, 0x61ff, 0x8016]);
        run(&mut m, 3)?;
        assert_eq!(m.register(0), 0x40);
        assert_eq!(m.register(0xf), 1);

        let mut m = machine_with(contemporary, &[0x6081, 0x6100, 0x801e]);
        run(&mut m, 3)?;
        assert_eq!(m.register(0), 0x02);
        assert_eq!(m.register(0xf), 1);
        Ok(())
    }

    #[test]
    fn test_set_legacy_mode_toggles_shift_source() -> Result<(), Chip8Error> {
        let mut m = machine(&[0x6081, 0x6102, 0x8016]);
        assert!(m.config().legacy_mode);
        m.set_legacy_mode(false);
        assert!(!m.config().legacy_mode);
        run(&mut m, 3)?;
        assert_eq!(m.register(0), 0x40);
        assert_eq!(m.register(0xf), 1);
        Ok(())
    }

    #[test]
    fn test_random_is_masked() -> Result<(), Chip8Error> {
        let mut m = machine(&[0xc00f, 0xc1ff]);
        run(&mut m, 2)?;
        assert_eq!(m.register(0), 0x05);
        assert_eq!(m.register(1), 0x3c);
        Ok(())
    }

    #[test]
    fn test_draw_glyph() -> Result<(), Chip8Error> {
        // "1" glyph at (4, 3)
        let mut m = machine(&[0x6001, 0xf029, 0x6104, 0x6203, 0xd125]);
        run(&mut m, 5)?;
        assert_eq!(m.index(), 5);
        // 0x20 row: only the third column is lit
        assert!(m.get_pixel(6, 3));
        assert!(!m.get_pixel(5, 3));
        // 0x70 bottom row
        assert!(m.get_pixel(5, 7) && m.get_pixel(6, 7) && m.get_pixel(7, 7));
        assert_eq!(m.register(0xf), 0);
        assert!(m.draw_flag());
        Ok(())
    }

    #[test]
    fn test_draw_twice_restores_screen() -> Result<(), Chip8Error> {
        let mut m = machine(&[0xa000, 0xd005, 0xd005]);
        run(&mut m, 2)?;
        assert_eq!(m.register(0xf), 0);
        assert!(!m.framebuffer().is_blank());
        run(&mut m, 1)?;
        assert_eq!(m.register(0xf), 1);
        assert!(m.framebuffer().is_blank());
        Ok(())
    }

    #[test]
    fn test_draw_wraps_at_edges() -> Result<(), Chip8Error> {
        // 0xF0 top row of "0" at (62, 31): lands on 62, 63, 0 and 1
        let mut m = machine(&[0xa000, 0x603e, 0x611f, 0xd011]);
        run(&mut m, 4)?;
        for x in [62, 63, 0, 1] {
            assert!(m.get_pixel(x, 31), "x = {}", x);
        }
        assert!(!m.get_pixel(2, 31));
        Ok(())
    }

    #[test]
    fn test_draw_with_vf_coordinate() -> Result<(), Chip8Error> {
        // VF is read as the x coordinate before it's reused as the flag
        let mut m = machine(&[0xa000, 0x6f08, 0x6000, 0xdf01]);
        run(&mut m, 4)?;
        assert!(m.get_pixel(8, 0));
        assert!(!m.get_pixel(0, 0));
        Ok(())
    }

    #[test]
    fn test_skip_on_key() -> Result<(), Chip8Error> {
        let mut m = machine(&[0x6a0b, 0xea9e]);
        m.set_key(0xb, true);
        run(&mut m, 2)?;
        assert_eq!(m.program_counter(), 0x206);

        let mut m = machine(&[0x6a0b, 0xeaa1]);
        m.set_key(0xb, true);
        run(&mut m, 2)?;
        assert_eq!(m.program_counter(), 0x204);

        let mut m = machine(&[0x6a0b, 0xeaa1]);
        run(&mut m, 2)?;
        assert_eq!(m.program_counter(), 0x206);
        Ok(())
    }

    #[test]
    #[should_panic]
    fn test_set_key_off_keypad_panics() {
        let mut m = Chip8Interpreter::new();
        m.set_key(0x10, true);
    }

    #[test]
    fn test_wait_for_key() -> Result<(), Chip8Error> {
        let mut m = machine(&[0xf30a]);
        for _ in 0..5 {
            assert_eq!(m.step()?, StepOutcome::WaitingForKey);
            assert_eq!(m.program_counter(), 0x200);
        }
        m.set_key(0x7, true);
        assert_eq!(m.step()?, StepOutcome::Executed(Instruction::LdKey(3)));
        assert_eq!(m.register(3), 7);
        assert_eq!(m.program_counter(), 0x202);
        Ok(())
    }

    #[test]
    fn test_wait_for_key_takes_highest() -> Result<(), Chip8Error> {
        let mut m = machine(&[0xf30a]);
        m.set_key(0x2, true);
        m.set_key(0xc, true);
        run(&mut m, 1)?;
        assert_eq!(m.register(3), 0xc);
        Ok(())
    }

    #[test]
    fn test_timers_round_trip_registers() -> Result<(), Chip8Error> {
        let config = Chip8Config {
            tick_timers_on_step: false,
            ..Chip8Config::default()
        };
        let mut m = machine_with(config, &[0x6033, 0xf015, 0xf018, 0xf107]);
        run(&mut m, 4)?;
        assert_eq!(m.delay_timer(), 0x33);
        assert_eq!(m.sound_timer(), 0x33);
        assert_eq!(m.register(1), 0x33);
        m.tick_timers();
        assert_eq!(m.delay_timer(), 0x32);
        Ok(())
    }

    #[test]
    fn test_step_ticks_timers() -> Result<(), Chip8Error> {
        // FX15 sets 3; the same step ticks it down to 2
        let mut m = machine(&[0x6003, 0xf015, 0x1204]);
        run(&mut m, 2)?;
        assert_eq!(m.delay_timer(), 2);
        run(&mut m, 5)?;
        assert_eq!(m.delay_timer(), 0);
        Ok(())
    }

    #[test]
    fn test_sound_threshold() -> Result<(), Chip8Error> {
        let config = Chip8Config {
            tick_timers_on_step: false,
            ..Chip8Config::default()
        };
        let mut m = machine_with(config, &[0x6001, 0xf018, 0x6002, 0xf018]);
        run(&mut m, 2)?;
        assert_eq!(m.sound_timer(), 1);
        assert!(!m.sound_active());
        m.tick_timers();
        assert_eq!(m.sound_timer(), 0);
        assert!(!m.sound_active());
        run(&mut m, 2)?;
        assert!(m.sound_active());
        m.tick_timers();
        assert!(!m.sound_active());
        Ok(())
    }

    #[test]
    fn test_sound_timer_one_then_step() -> Result<(), Chip8Error> {
        let mut m = machine(&[0x6001, 0xf018, 0x1204]);
        run(&mut m, 1)?;
        assert!(!m.sound_active());
        // FX18 loads 1, the step's tick takes it to 0
        run(&mut m, 1)?;
        assert_eq!(m.sound_timer(), 0);
        assert!(!m.sound_active());
        Ok(())
    }

    #[test]
    fn test_add_to_index() -> Result<(), Chip8Error> {
        let mut m = machine(&[0xaffe, 0x6f05, 0x6004, 0xf01e]);
        run(&mut m, 4)?;
        assert_eq!(m.index(), 0x1002);
        // no flag unless asked for
        assert_eq!(m.register(0xf), 5);
        Ok(())
    }

    #[test]
    fn test_add_to_index_overflow_flag() -> Result<(), Chip8Error> {
        let mut m = machine(&[0xaffe, 0x6f05, 0x6004, 0xf01e, 0xa100, 0xf01e]);
        m.set_index_overflow_flag(true);
        run(&mut m, 4)?;
        assert_eq!(m.index(), 0x1002);
        assert_eq!(m.register(0xf), 1);
        run(&mut m, 2)?;
        assert_eq!(m.index(), 0x104);
        assert_eq!(m.register(0xf), 0);
        Ok(())
    }

    #[test]
    fn test_bcd() -> Result<(), Chip8Error> {
        let mut m = machine(&[0xa300, 0x60fe, 0xf033]);
        run(&mut m, 3)?;
        assert_eq!(m.memory().get_ro_slice(0x300, 3)?, &[2, 5, 4]);
        assert_eq!(m.index(), 0x300);
        Ok(())
    }

    #[test]
    fn test_register_block_store_and_load() -> Result<(), Chip8Error> {
        let mut m = machine(&[
            0x6011, 0x6122, 0x6233, 0x6344, 0xa300, 0xf255, // store V0-V2
            0x6000, 0x6100, 0x6200, 0xa300, 0xf165, // load V0-V1
        ]);
        run(&mut m, 6)?;
        assert_eq!(m.memory().get_ro_slice(0x300, 4)?, &[0x11, 0x22, 0x33, 0]);
        assert_eq!(m.index(), 0x303);
        run(&mut m, 5)?;
        assert_eq!(m.register(0), 0x11);
        assert_eq!(m.register(1), 0x22);
        assert_eq!(m.register(2), 0);
        assert_eq!(m.index(), 0x302);
        Ok(())
    }

    #[test]
    fn test_out_of_bounds_access_halts_with_state_intact() -> Result<(), Chip8Error> {
        let out_of_bounds = |address, len| Chip8Error::MemoryOutOfBounds { address, len };
        // (program, steps before the faulting one, expected fault)
        let cases: [(&[u16], usize, Chip8Error); 6] = [
            // sprite read runs off the top of RAM
            (&[0x6042, 0xaffe, 0xd005], 2, out_of_bounds(0xffe, 5)),
            // BCD store needs three bytes, only two left
            (&[0x60fe, 0xaffe, 0xf033], 2, out_of_bounds(0xffe, 3)),
            // block load past the end
            (&[0x6011, 0xaffe, 0xf265], 2, out_of_bounds(0xffe, 3)),
            // fetch straddling the last byte
            (&[0x1fff], 1, out_of_bounds(0xfff, 2)),
            // jump with offset lands past the end
            (&[0x60ff, 0xbfff], 2, out_of_bounds(0x10fe, 2)),
            (&[0xaffe, 0xf255], 1, out_of_bounds(0xffe, 3)),
        ];
        for (program, setup, fault) in cases {
            let mut m = machine(program);
            run(&mut m, setup)?;
            let registers: Vec<u8> = (0..REGISTER_COUNT).map(|x| m.register(x)).collect();
            let memory = m.memory().as_slice().to_vec();
            let screen = m.framebuffer().clone();
            let (pc, index) = (m.program_counter(), m.index());

            assert_eq!(m.step(), Err(fault), "{:04x?}", program);
            assert!(m.is_halted());
            assert_eq!(m.step(), Err(Chip8Error::Halted));

            let after: Vec<u8> = (0..REGISTER_COUNT).map(|x| m.register(x)).collect();
            assert_eq!(after, registers, "{:04x?}", program);
            assert_eq!(m.memory().as_slice(), &memory[..], "{:04x?}", program);
            assert_eq!(m.framebuffer(), &screen);
            assert!(!m.draw_flag());
            assert_eq!(m.program_counter(), pc);
            assert_eq!(m.index(), index);
        }
        Ok(())
    }

    #[test]
    fn test_unknown_opcode_leaves_pc() -> Result<(), Chip8Error> {
        let mut m = machine(&[0x6005, 0xf015, 0x0123]);
        run(&mut m, 2)?;
        assert_eq!(m.step()?, StepOutcome::UnknownOpcode(0x0123));
        assert_eq!(m.step()?, StepOutcome::UnknownOpcode(0x0123));
        assert_eq!(m.program_counter(), 0x204);
        assert!(!m.is_halted());
        // timers keep running regardless
        assert_eq!(m.delay_timer(), 2);
        Ok(())
    }

    proptest! {
        #[test]
        fn add_matches_wide_arithmetic(a in any::<u8>(), b in any::<u8>()) {
            let mut m = machine(&[0x6000 | a as u16, 0x6100 | b as u16, 0x8014]);
            run(&mut m, 3).unwrap();
            let wide = a as u16 + b as u16;
            prop_assert_eq!(m.register(0), (wide & 0xff) as u8);
            prop_assert_eq!(m.register(0xf), (wide > 0xff) as u8);
        }

        #[test]
        fn sub_flag_is_not_borrow(a in any::<u8>(), b in any::<u8>()) {
            let mut m = machine(&[0x6000 | a as u16, 0x6100 | b as u16, 0x8015]);
            run(&mut m, 3).unwrap();
            prop_assert_eq!(m.register(0), a.wrapping_sub(b));
            prop_assert_eq!(m.register(0xf), (a >= b) as u8);
        }

        #[test]
        fn drawing_twice_is_identity(x in any::<u8>(), y in any::<u8>(), glyph in 0u8..16) {
            let mut m = machine(&[
                0x6000 | x as u16,
                0x6100 | y as u16,
                0x6200 | glyph as u16,
                0xf229,
                0xd015,
                0xd015,
            ]);
            run(&mut m, 5).unwrap();
            let once = m.framebuffer().clone();
            prop_assert_eq!(m.register(0xf), 0);
            run(&mut m, 1).unwrap();
            prop_assert!(m.framebuffer().is_blank());
            // the second draw collides exactly when the first lit something
            prop_assert_eq!(m.register(0xf), (!once.is_blank()) as u8);
        }
    }
}
