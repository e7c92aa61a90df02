//! Key decoding
//!
//! Turns the raw byte stream from the terminal into [`KeyEvent`]s. A lone
//! ESC byte is ambiguous: it is either the Escape key or the start of a
//! cursor-key sequence such as `ESC [ A`. The decoder resolves it by reading
//! the follow-up bytes with the source's per-read timeout, so a bare Escape
//! costs at most two timeout windows.

use std::io::{self, Read};
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use super::terminal::{Result, TerminalError};

/// Escape byte that introduces a control sequence.
pub const ESCAPE: u8 = 0x1B;

/// Byte the terminal sends for Ctrl + `letter`.
pub const fn ctrl_key(letter: u8) -> u8 {
    letter & 0x1F
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// A logical key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    /// Any byte without a more specific meaning
    Character(u8),
    /// Cursor key (`ESC [ A..D`)
    Arrow(Direction),
    /// Escape key, or an escape sequence that was not recognized
    Escape,
    /// The configured exit combination, carrying its letter
    ControlCombo(u8),
}

/// Source of single bytes with a bounded wait.
pub trait ByteSource {
    /// Read one byte, waiting at most one timeout window.
    ///
    /// `Ok(None)` means the window elapsed without data. It is not an error.
    fn read_byte(&mut self) -> io::Result<Option<u8>>;
}

/// Empty reads in a row, each well short of the timeout, that mean hangup.
const HANGUP_EMPTY_READS: u32 = 3;

/// Adapts a reader whose reads return `Ok(0)` when their timeout elapses,
/// which is how a terminal in raw mode with `VMIN = 0` behaves.
///
/// A hung-up terminal also returns `Ok(0)`, but immediately. With a known
/// read timeout, `HANGUP_EMPTY_READS` consecutive empty reads that each
/// return in under half the window are reported as `UnexpectedEof`. Other
/// read errors (`EIO` after hangup on most systems) pass through unchanged.
pub struct ReadSource<R> {
    inner: R,
    read_timeout: Option<Duration>,
    early_empty_reads: u32,
}

impl<R: Read> ReadSource<R> {
    /// Every empty read counts as an elapsed window.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            read_timeout: None,
            early_empty_reads: 0,
        }
    }

    /// Empty reads that return well before `read_timeout` count towards hangup.
    pub fn with_read_timeout(inner: R, read_timeout: Duration) -> Self {
        Self {
            read_timeout: Some(read_timeout),
            ..Self::new(inner)
        }
    }

    fn empty_read(&mut self, elapsed: Duration) -> io::Result<Option<u8>> {
        let Some(timeout) = self.read_timeout else {
            return Ok(None);
        };
        if elapsed >= timeout / 2 {
            self.early_empty_reads = 0;
            return Ok(None);
        }

        self.early_empty_reads += 1;
        if self.early_empty_reads >= HANGUP_EMPTY_READS {
            warn!(reads = self.early_empty_reads, "empty reads without waiting; treating as hangup");
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof));
        }
        Ok(None)
    }
}

impl<R: Read> ByteSource for ReadSource<R> {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut buf = [0u8; 1];
        let started = Instant::now();
        match self.inner.read(&mut buf) {
            Ok(1) => {
                self.early_empty_reads = 0;
                Ok(Some(buf[0]))
            }
            Ok(_) => self.empty_read(started.elapsed()),
            // EAGAIN on some platforms when VTIME expires
            Err(e) if matches!(e.kind(), io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
enum DecodeState {
    #[default]
    Idle,
    SawEscape,
    /// `ESC [`
    SawBracket,
    /// `ESC` followed by anything but `[`
    SawForeign,
}

enum Step {
    Next(DecodeState),
    Resolved(KeyEvent),
}

/// Reads [`KeyEvent`]s from a [`ByteSource`].
pub struct KeyDecoder<S> {
    source: S,
    exit_letter: u8,
}

impl<S: ByteSource> KeyDecoder<S> {
    /// `exit_letter` is the letter whose Ctrl combination ends the session.
    pub fn new(source: S, exit_letter: u8) -> Self {
        Self {
            source,
            exit_letter: exit_letter.to_ascii_lowercase(),
        }
    }

    pub fn exit_byte(&self) -> u8 {
        ctrl_key(self.exit_letter)
    }

    /// Block until one key has been decoded.
    ///
    /// Empty timeout windows before the first byte are retried; only hard
    /// read errors are returned.
    pub fn read_key(&mut self) -> Result<KeyEvent> {
        let mut byte = loop {
            if let Some(byte) = self.next_byte()? {
                break byte;
            }
        };

        let mut state = DecodeState::Idle;
        let event = loop {
            match self.step(state, byte) {
                Step::Resolved(event) => break event,
                Step::Next(next) => {
                    state = next;
                    match self.next_byte()? {
                        Some(b) => byte = b,
                        // Follow-up did not arrive in time
                        None => break KeyEvent::Escape,
                    }
                }
            }
        };

        log_event(&event);
        Ok(event)
    }

    fn step(&self, state: DecodeState, byte: u8) -> Step {
        match state {
            DecodeState::Idle if byte == ESCAPE => Step::Next(DecodeState::SawEscape),
            DecodeState::Idle if byte == self.exit_byte() => {
                Step::Resolved(KeyEvent::ControlCombo(self.exit_letter))
            }
            DecodeState::Idle => Step::Resolved(KeyEvent::Character(byte)),
            DecodeState::SawEscape if byte == b'[' => Step::Next(DecodeState::SawBracket),
            DecodeState::SawEscape => Step::Next(DecodeState::SawForeign),
            DecodeState::SawBracket => Step::Resolved(match byte {
                b'A' => KeyEvent::Arrow(Direction::Up),
                b'B' => KeyEvent::Arrow(Direction::Down),
                b'C' => KeyEvent::Arrow(Direction::Right),
                b'D' => KeyEvent::Arrow(Direction::Left),
                _ => KeyEvent::Escape,
            }),
            DecodeState::SawForeign => Step::Resolved(KeyEvent::Escape),
        }
    }

    fn next_byte(&mut self) -> Result<Option<u8>> {
        match self.source.read_byte() {
            Ok(byte) => Ok(byte),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(TerminalError::InputClosed),
            Err(e) => Err(TerminalError::Input(e)),
        }
    }

    #[allow(dead_code)]
    pub fn source(&self) -> &S {
        &self.source
    }
}

fn log_event(event: &KeyEvent) {
    match *event {
        KeyEvent::Character(byte) if byte.is_ascii_graphic() || byte == b' ' => {
            debug!(byte, ch = %(byte as char), "key");
        }
        KeyEvent::Character(byte) => debug!(byte, "key (control)"),
        other => trace!(event = ?other, "key"),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Scripted input. `None` stands for one elapsed timeout window; an
    /// exhausted script reports end of input.
    #[derive(Default)]
    pub struct ScriptedSource {
        script: VecDeque<Option<u8>>,
        pub reads: usize,
    }

    impl ScriptedSource {
        pub fn new(script: impl IntoIterator<Item = Option<u8>>) -> Self {
            Self {
                script: script.into_iter().collect(),
                reads: 0,
            }
        }

        pub fn bytes(bytes: &[u8]) -> Self {
            Self::new(bytes.iter().copied().map(Some))
        }

        pub fn remaining(&self) -> usize {
            self.script.len()
        }
    }

    impl ByteSource for ScriptedSource {
        fn read_byte(&mut self) -> io::Result<Option<u8>> {
            self.reads += 1;
            self.script
                .pop_front()
                .ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof))
        }
    }

    fn decode(script: impl IntoIterator<Item = Option<u8>>) -> KeyEvent {
        KeyDecoder::new(ScriptedSource::new(script), b'q').read_key().unwrap()
    }

    #[test]
    fn test_plain_character() {
        assert_eq!(decode([Some(b'a')]), KeyEvent::Character(b'a'));
        assert_eq!(decode([Some(b'\r')]), KeyEvent::Character(b'\r'));
    }

    #[test]
    fn test_timeouts_before_first_byte_are_retried() {
        let mut decoder = KeyDecoder::new(ScriptedSource::new([None, None, None, Some(b'x')]), b'q');
        assert_eq!(decoder.read_key().unwrap(), KeyEvent::Character(b'x'));
        assert_eq!(decoder.source().reads, 4);
    }

    #[test]
    fn test_lone_escape_resolves_on_timeout() {
        assert_eq!(decode([Some(ESCAPE), None]), KeyEvent::Escape);
        assert_eq!(decode([Some(ESCAPE), Some(b'['), None]), KeyEvent::Escape);
    }

    #[test]
    fn test_arrow_keys() {
        let cases = [
            (b'A', Direction::Up),
            (b'B', Direction::Down),
            (b'C', Direction::Right),
            (b'D', Direction::Left),
        ];
        for (final_byte, direction) in cases {
            assert_eq!(
                decode([Some(ESCAPE), Some(b'['), Some(final_byte)]),
                KeyEvent::Arrow(direction)
            );
        }
    }

    #[test]
    fn test_unknown_sequences_collapse_to_escape() {
        // ESC [ Z (back-tab) is not a recognized key
        assert_eq!(decode([Some(ESCAPE), Some(b'['), Some(b'Z')]), KeyEvent::Escape);
        // ESC O A (application cursor mode)
        assert_eq!(decode([Some(ESCAPE), Some(b'O'), Some(b'A')]), KeyEvent::Escape);
    }

    #[test]
    fn test_escape_consumes_both_follow_up_bytes() {
        let mut decoder = KeyDecoder::new(ScriptedSource::bytes(b"\x1bOAx"), b'q');
        assert_eq!(decoder.read_key().unwrap(), KeyEvent::Escape);
        assert_eq!(decoder.read_key().unwrap(), KeyEvent::Character(b'x'));
    }

    #[test]
    fn test_exit_combo() {
        let mut decoder = KeyDecoder::new(ScriptedSource::bytes(&[0x19]), b'y');
        assert_eq!(decoder.exit_byte(), 0x19);
        assert_eq!(decoder.read_key().unwrap(), KeyEvent::ControlCombo(b'y'));
    }

    #[test]
    fn test_other_control_bytes_are_characters() {
        // Ctrl-C arrives as a byte because ISIG is off
        assert_eq!(decode([Some(ctrl_key(b'c'))]), KeyEvent::Character(0x03));
    }

    #[test]
    fn test_ctrl_key() {
        assert_eq!(ctrl_key(b'q'), 0x11);
        assert_eq!(ctrl_key(b'y'), 0x19);
        assert_eq!(ctrl_key(b'Y'), 0x19);
    }

    #[test]
    fn test_end_of_input_is_an_error() {
        let mut decoder = KeyDecoder::new(ScriptedSource::new([None]), b'q');
        assert!(matches!(decoder.read_key(), Err(TerminalError::InputClosed)));
    }

    #[test]
    fn test_read_source_maps_timeouts() {
        let mut source = ReadSource::new(&b""[..]);
        assert_eq!(source.read_byte().unwrap(), None);

        let mut source = ReadSource::new(&b"hi"[..]);
        assert_eq!(source.read_byte().unwrap(), Some(b'h'));
        assert_eq!(source.read_byte().unwrap(), Some(b'i'));
        assert_eq!(source.read_byte().unwrap(), None);
    }

    #[test]
    fn test_immediate_empty_reads_mean_hangup() {
        let source = ReadSource::with_read_timeout(&b""[..], Duration::from_secs(10));
        let mut decoder = KeyDecoder::new(source, b'q');
        assert!(matches!(decoder.read_key(), Err(TerminalError::InputClosed)));
    }

    #[test]
    fn test_hangup_count_resets_on_data() {
        let mut source = ReadSource::with_read_timeout(&b"ab"[..], Duration::from_secs(10));
        assert_eq!(source.read_byte().unwrap(), Some(b'a'));
        assert_eq!(source.read_byte().unwrap(), Some(b'b'));
        assert_eq!(source.read_byte().unwrap(), None);
        assert_eq!(source.read_byte().unwrap(), None);
        assert_eq!(
            source.read_byte().unwrap_err().kind(),
            io::ErrorKind::UnexpectedEof
        );
    }

    /// Empty reads that wait out the whole window, like an idle terminal.
    struct IdleTerminal {
        window: Duration,
    }

    impl Read for IdleTerminal {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            std::thread::sleep(self.window);
            Ok(0)
        }
    }

    #[test]
    fn test_idle_windows_are_not_hangup() {
        let window = Duration::from_millis(4);
        let mut source = ReadSource::with_read_timeout(IdleTerminal { window }, window);
        for _ in 0..(HANGUP_EMPTY_READS * 2) {
            assert_eq!(source.read_byte().unwrap(), None);
        }
    }

    struct BrokenTerminal;

    impl Read for BrokenTerminal {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "input/output error"))
        }
    }

    #[test]
    fn test_hard_read_error_is_input_error() {
        let mut decoder = KeyDecoder::new(ReadSource::new(BrokenTerminal), b'q');
        assert!(matches!(decoder.read_key(), Err(TerminalError::Input(_))));
    }
}
