use crossterm::event::{poll, read, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal;
use log::debug;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::time::{Duration, Instant};

/// left-hand side of a qwerty keyboard, laid out like the COSMAC hex keypad
///   1 2 3 4      1 2 3 C
///   q w e r  =>  4 5 6 D
///   a s d f      7 8 9 E
///   z x c v      A 0 B F
const CHIP8_CONVENTIONAL_KEYMAP: [(char, u8); 16] = [
    ('x', 0x00),
    ('1', 0x01),
    ('2', 0x02),
    ('3', 0x03),
    ('q', 0x04),
    ('w', 0x05),
    ('e', 0x06),
    ('a', 0x07),
    ('s', 0x08),
    ('d', 0x09),
    ('z', 0x0a),
    ('c', 0x0b),
    ('4', 0x0c),
    ('r', 0x0d),
    ('f', 0x0e),
    ('v', 0x0f),
];

/// terminals only report presses (and auto-repeat), so a key counts as held
/// until it has gone this long without repeating
const KEY_HOLD: Duration = Duration::from_millis(150);

/// what the emulator needs to hear about from the keyboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// hex keypad state change
    Key { key: u8, pressed: bool },
    Pause,
    Quit,
}

/// reads keypresses
pub trait Input {
    /// everything that happened since the last poll; never blocks
    fn poll_events(&mut self) -> Result<Vec<InputEvent>, io::Error>;
}

/// tracks which keypad keys are being held, given only press timestamps
struct KeyHold {
    pressed_at: [Option<Instant>; 16],
    hold: Duration,
}

impl KeyHold {
    fn new(hold: Duration) -> Self {
        KeyHold {
            pressed_at: [None; 16],
            hold,
        }
    }

    /// true if the key wasn't already down
    fn press(&mut self, key: u8, now: Instant) -> bool {
        self.pressed_at[key as usize].replace(now).is_none()
    }

    /// keys that have gone quiet for longer than the hold time
    fn expire(&mut self, now: Instant) -> Vec<u8> {
        let mut released = Vec::new();
        for (key, at) in self.pressed_at.iter_mut().enumerate() {
            if let Some(t) = at {
                if now.duration_since(*t) > self.hold {
                    *at = None;
                    released.push(key as u8);
                }
            }
        }
        released
    }
}

/// Input from the terminal, via crossterm. Puts the terminal into raw mode
/// for as long as it lives.
pub struct TermInput {
    keymap: HashMap<char, u8>,
    held: KeyHold,
}

impl TermInput {
    pub fn new() -> Result<Self, io::Error> {
        terminal::enable_raw_mode()?;
        Ok(TermInput {
            keymap: HashMap::from(CHIP8_CONVENTIONAL_KEYMAP),
            held: KeyHold::new(KEY_HOLD),
        })
    }

    fn translate(&mut self, evt: KeyEvent, now: Instant, events: &mut Vec<InputEvent>) {
        match evt.code {
            KeyCode::Esc => events.push(InputEvent::Quit),
            KeyCode::Char('c') if evt.modifiers.contains(KeyModifiers::CONTROL) => {
                events.push(InputEvent::Quit)
            }
            KeyCode::Char('p') => events.push(InputEvent::Pause),
            KeyCode::Char(c) => match self.keymap.get(&c.to_ascii_lowercase()) {
                Some(&key) => {
                    if self.held.press(key, now) {
                        events.push(InputEvent::Key { key, pressed: true });
                    }
                }
                None => debug!("can't map {:?} to a COSMAC key", c),
            },
            other => debug!("ignoring key {:?}", other),
        }
    }
}

impl Drop for TermInput {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

impl Input for TermInput {
    fn poll_events(&mut self) -> Result<Vec<InputEvent>, io::Error> {
        let mut events = Vec::new();
        while poll(Duration::from_millis(0))? {
            if let Event::Key(evt) = read()? {
                self.translate(evt, Instant::now(), &mut events);
            }
        }
        for key in self.held.expire(Instant::now()) {
            events.push(InputEvent::Key {
                key,
                pressed: false,
            });
        }
        Ok(events)
    }
}

/// dummy Input implementation for testing; each poll hands out the next
/// scripted batch, then nothing
pub struct DummyInput {
    batches: VecDeque<Vec<InputEvent>>,
}

impl DummyInput {
    pub fn new(batches: Vec<Vec<InputEvent>>) -> Self {
        DummyInput {
            batches: VecDeque::from(batches),
        }
    }
}

impl Input for DummyInput {
    fn poll_events(&mut self) -> Result<Vec<InputEvent>, io::Error> {
        Ok(self.batches.pop_front().unwrap_or_default())
    }
}
