use std::collections::VecDeque;
use std::io::{self, stdin, stdout, IsTerminal, Read, Write};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use log::{debug, warn};

/// Character device the machine talks to: the keyboard behind KBSR/KBDR and
/// the trap routines, plus the display.
pub trait Console: Send + Sync {
    /// Never blocks. `None` when no key is waiting.
    fn poll_key(&self) -> io::Result<Option<u8>>;

    /// Blocks until a key is available.
    fn read_key(&self) -> io::Result<u8>;

    fn write_bytes(&self, bytes: &[u8]) -> io::Result<()>;

    /// Called from the run loop between instructions. Fails with
    /// `Interrupted` when the user asked to stop.
    fn check_interrupt(&self) -> io::Result<()> {
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Puts the terminal into raw mode for as long as it lives.
pub struct TerminalGuard {
    raw: bool,
}

impl TerminalGuard {
    pub fn acquire() -> io::Result<Self> {
        let raw = stdin().is_terminal();
        if raw {
            crossterm::terminal::enable_raw_mode()?;
            debug!("Terminal: raw mode enabled");
        }
        Ok(TerminalGuard { raw })
    }

    pub fn is_raw(&self) -> bool {
        self.raw
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if self.raw {
            if let Err(e) = crossterm::terminal::disable_raw_mode() {
                warn!("Terminal: failed to restore mode: {e}");
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Where raw-mode key events come from.
pub trait EventSource: Send + Sync {
    /// Never blocks.
    fn ready(&self) -> io::Result<bool>;

    fn read(&self) -> io::Result<Event>;
}

struct TerminalEvents;

impl EventSource for TerminalEvents {
    fn ready(&self) -> io::Result<bool> {
        event::poll(Duration::ZERO)
    }

    fn read(&self) -> io::Result<Event> {
        event::read()
    }
}

enum Input {
    Keys {
        source: Box<dyn EventSource>,
        pending: Mutex<VecDeque<u8>>,
    },
    Pipe(Mutex<Receiver<u8>>),
}

/// The process's own terminal. In raw mode keys come from crossterm events;
/// otherwise stdin is drained by a reader thread so polls never block.
pub struct StdConsole {
    input: Input,
    raw: bool,
}

impl StdConsole {
    pub fn new(guard: &TerminalGuard) -> Self {
        if guard.is_raw() {
            return StdConsole::with_events(Box::new(TerminalEvents));
        }

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for byte in stdin().lock().bytes() {
                match byte {
                    Ok(b) => {
                        if tx.send(b).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Console: stdin read failed: {e}");
                        break;
                    }
                }
            }
        });
        StdConsole { input: Input::Pipe(Mutex::new(rx)), raw: false }
    }

    /// Raw-mode console fed by `source`.
    pub fn with_events(source: Box<dyn EventSource>) -> Self {
        StdConsole {
            input: Input::Keys { source, pending: Mutex::new(VecDeque::new()) },
            raw: true,
        }
    }

    fn key_byte(key: KeyEvent) -> io::Result<Option<u8>> {
        if key.kind != KeyEventKind::Press {
            return Ok(None);
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return match key.code {
                KeyCode::Char('c') => Err(io::Error::new(io::ErrorKind::Interrupted, "interrupted")),
                KeyCode::Char(c) if c.is_ascii_lowercase() => Ok(Some(c as u8 - b'a' + 1)),
                _ => Ok(None),
            };
        }
        Ok(match key.code {
            KeyCode::Char(c) if c.is_ascii() => Some(c as u8),
            KeyCode::Enter => Some(b'\n'),
            KeyCode::Backspace => Some(0x08),
            KeyCode::Tab => Some(b'\t'),
            KeyCode::Esc => Some(0x1b),
            _ => None,
        })
    }

    fn event_byte(source: &dyn EventSource) -> io::Result<Option<u8>> {
        match source.read()? {
            Event::Key(key) => Self::key_byte(key),
            _ => Ok(None),
        }
    }

    fn next_event_key(source: &dyn EventSource, pending: &Mutex<VecDeque<u8>>, block: bool) -> io::Result<Option<u8>> {
        if let Some(b) = pending.lock().unwrap().pop_front() {
            return Ok(Some(b));
        }
        loop {
            if !block && !source.ready()? {
                return Ok(None);
            }
            if let Some(b) = Self::event_byte(source)? {
                return Ok(Some(b));
            }
        }
    }
}

impl Console for StdConsole {
    fn poll_key(&self) -> io::Result<Option<u8>> {
        match &self.input {
            Input::Keys { source, pending } => Self::next_event_key(source.as_ref(), pending, false),
            Input::Pipe(rx) => match rx.lock().unwrap().try_recv() {
                Ok(b) => Ok(Some(b)),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => Ok(None),
            },
        }
    }

    fn read_key(&self) -> io::Result<u8> {
        match &self.input {
            Input::Keys { source, pending } => loop {
                if let Some(b) = Self::next_event_key(source.as_ref(), pending, true)? {
                    return Ok(b);
                }
            },
            Input::Pipe(rx) => rx
                .lock()
                .unwrap()
                .recv()
                .map_err(|_| io::Error::new(io::ErrorKind::UnexpectedEof, "end of input")),
        }
    }

    /// Raw mode swallows SIGINT, so Ctrl-C only shows up as a key event.
    /// Keys that arrive meanwhile are queued for the program.
    fn check_interrupt(&self) -> io::Result<()> {
        if let Input::Keys { source, pending } = &self.input {
            while source.ready()? {
                if let Some(b) = Self::event_byte(source.as_ref())? {
                    pending.lock().unwrap().push_back(b);
                }
            }
        }
        Ok(())
    }

    fn write_bytes(&self, bytes: &[u8]) -> io::Result<()> {
        let mut out = stdout().lock();
        if self.raw {
            for chunk in bytes.split_inclusive(|&b| b == b'\n') {
                match chunk.split_last() {
                    Some((&b'\n', line)) => {
                        out.write_all(line)?;
                        out.write_all(b"\r\n")?;
                    }
                    _ => out.write_all(chunk)?,
                }
            }
        } else {
            out.write_all(bytes)?;
        }
        out.flush()
    }
}

////////////////////////////////////////////////////////////////////////////////

/// In-memory console for driving programs from tests.
#[derive(Default)]
pub struct PipeConsole {
    out_buf: Mutex<Vec<u8>>,
    in_buf: Mutex<VecDeque<u8>>,
}

impl PipeConsole {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_input(input: &[u8]) -> Self {
        let console = PipeConsole::new();
        console.write_input(input);
        console
    }

    pub fn take_output(&self) -> Vec<u8> {
        std::mem::take(&mut self.out_buf.lock().unwrap())
    }

    pub fn output_string(&self) -> String {
        String::from_utf8_lossy(&self.out_buf.lock().unwrap()).into_owned()
    }

    pub fn push_input(&self, val: u8) {
        self.in_buf.lock().unwrap().push_back(val);
    }

    pub fn write_input(&self, vals: &[u8]) {
        for val in vals.iter() {
            self.push_input(*val);
        }
    }

    pub fn pending_input(&self) -> usize {
        self.in_buf.lock().unwrap().len()
    }
}

impl Console for PipeConsole {
    fn poll_key(&self) -> io::Result<Option<u8>> {
        Ok(self.in_buf.lock().unwrap().pop_front())
    }

    fn read_key(&self) -> io::Result<u8> {
        self.in_buf
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "pipe console is empty"))
    }

    fn write_bytes(&self, bytes: &[u8]) -> io::Result<()> {
        self.out_buf.lock().unwrap().extend_from_slice(bytes);
        Ok(())
    }
}

/// Replays a fixed list of events. `None` entries are polls that find
/// nothing ready.
#[cfg(test)]
pub(crate) struct ScriptedEvents(Mutex<VecDeque<Option<Event>>>);

#[cfg(test)]
impl ScriptedEvents {
    pub(crate) fn new(events: Vec<Option<Event>>) -> Self {
        ScriptedEvents(Mutex::new(events.into()))
    }
}

#[cfg(test)]
impl EventSource for ScriptedEvents {
    fn ready(&self) -> io::Result<bool> {
        let mut events = self.0.lock().unwrap();
        match events.front() {
            Some(Some(_)) => Ok(true),
            Some(None) => {
                events.pop_front();
                Ok(false)
            }
            None => Ok(false),
        }
    }

    fn read(&self) -> io::Result<Event> {
        let mut events = self.0.lock().unwrap();
        while let Some(entry) = events.pop_front() {
            if let Some(event) = entry {
                return Ok(event);
            }
        }
        Err(io::Error::new(io::ErrorKind::UnexpectedEof, "script exhausted"))
    }
}
