use thiserror::Error;

/// Everything the engine can report to its caller. Register arithmetic never
/// shows up here; over/underflow is defined wraparound.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Chip8Error {
    #[error("ROM is too large ({size} bytes), max size is {max_size} bytes")]
    RomTooLarge { size: usize, max_size: usize },

    #[error("memory access out of bounds at {address:#06X} (len {len})")]
    MemoryOutOfBounds { address: usize, len: usize },

    #[error("stack overflow: call at {pc:#06X} exceeds 16 levels")]
    StackOverflow { pc: u16 },

    #[error("stack underflow: return at {pc:#06X} with empty call stack")]
    StackUnderflow { pc: u16 },

    #[error("interpreter halted after an earlier fault")]
    Halted,
}
