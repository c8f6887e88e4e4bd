//! Character console
//!
//! `getc` must never block the VM: a console answers `None` when no byte is
//! ready, and the program sees `-1`.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tracing::{debug, warn};

pub trait Console {
    /// Next input byte, if one is ready
    fn getc(&mut self) -> Option<u8>;

    fn putc(&mut self, byte: u8);
}

/// No input, discarded output
#[derive(Debug, Clone, Copy, Default)]
pub struct NullConsole;

impl Console for NullConsole {
    fn getc(&mut self) -> Option<u8> {
        None
    }

    fn putc(&mut self, _byte: u8) {}
}

/// Cloneable in-memory output buffer. Every clone writes to the same bytes.
#[derive(Debug, Clone, Default)]
pub struct SharedOutput(Rc<RefCell<Vec<u8>>>);

impl SharedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Console fed from a fixed input, writing to any sink
pub struct ScriptedConsole {
    input: VecDeque<u8>,
    output: Box<dyn Write>,
}

impl ScriptedConsole {
    pub fn new(input: impl Into<Vec<u8>>, output: impl Write + 'static) -> Self {
        let input: Vec<u8> = input.into();
        ScriptedConsole {
            input: input.into(),
            output: Box::new(output),
        }
    }

    /// Scripted input with output captured in the returned buffer
    pub fn capture(input: impl Into<Vec<u8>>) -> (Self, SharedOutput) {
        let output = SharedOutput::new();
        (Self::new(input, output.clone()), output)
    }
}

impl Console for ScriptedConsole {
    fn getc(&mut self) -> Option<u8> {
        self.input.pop_front()
    }

    fn putc(&mut self, byte: u8) {
        if let Err(err) = self.output.write_all(&[byte]) {
            warn!(%err, "console write failed");
        }
    }
}

/// The controlling terminal in raw mode. Raw mode is left again on drop.
#[derive(Debug)]
pub struct TerminalConsole {
    _private: (),
}

impl TerminalConsole {
    pub fn new() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(TerminalConsole { _private: () })
    }

    fn key_byte(key: KeyEvent) -> Option<u8> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        match key.code {
            KeyCode::Char(c) if c.is_ascii() => {
                let byte = c as u8;
                if key.modifiers.contains(KeyModifiers::CONTROL) && byte.is_ascii_alphabetic() {
                    Some(byte.to_ascii_uppercase() & 0x1F)
                } else {
                    Some(byte)
                }
            }
            KeyCode::Enter => Some(b'\n'),
            KeyCode::Tab => Some(b'\t'),
            KeyCode::Backspace => Some(0x7F),
            KeyCode::Esc => Some(0x1B),
            _ => None,
        }
    }
}

impl Console for TerminalConsole {
    fn getc(&mut self) -> Option<u8> {
        match event::poll(Duration::ZERO) {
            Ok(true) => match event::read() {
                Ok(Event::Key(key)) => Self::key_byte(key),
                Ok(_) => None,
                Err(err) => {
                    debug!(%err, "terminal read failed");
                    None
                }
            },
            Ok(false) => None,
            Err(err) => {
                debug!(%err, "terminal poll failed");
                None
            }
        }
    }

    fn putc(&mut self, byte: u8) {
        let mut stdout = io::stdout();
        // raw mode does not translate newlines
        let result = if byte == b'\n' {
            stdout.write_all(b"\r\n")
        } else {
            stdout.write_all(&[byte])
        };
        if let Err(err) = result.and_then(|()| stdout.flush()) {
            warn!(%err, "terminal write failed");
        }
    }
}

impl Drop for TerminalConsole {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_console_round_trip() {
        let (mut console, output) = ScriptedConsole::capture("hi");
        while let Some(byte) = console.getc() {
            console.putc(byte);
        }
        assert_eq!(console.getc(), None);
        assert_eq!(output.text(), "hi");
    }

    #[test]
    fn test_control_keys() {
        let ctrl_d = KeyEvent::new(KeyCode::Char('d'), KeyModifiers::CONTROL);
        assert_eq!(TerminalConsole::key_byte(ctrl_d), Some(4));
        let enter = KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE);
        assert_eq!(TerminalConsole::key_byte(enter), Some(b'\n'));
        let arrow = KeyEvent::new(KeyCode::Left, KeyModifiers::NONE);
        assert_eq!(TerminalConsole::key_byte(arrow), None);
    }
}
