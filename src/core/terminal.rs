//! Terminal line-discipline control
//!
//! Captures the terminal mode in effect at startup, switches the terminal
//! into raw mode and puts the captured mode back when the guard is released.
//!
//! The platform calls sit behind [`ModeControl`] so the guard logic runs the
//! same way against a real TTY and against an in-memory terminal.

use std::io;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum TerminalError {
    #[error("Failed to read terminal attributes: {0}")]
    ReadMode(#[source] io::Error),

    #[error("Failed to write terminal attributes: {0}")]
    WriteMode(#[source] io::Error),

    #[error("Failed to restore terminal attributes: {0}")]
    RestoreMode(#[source] io::Error),

    #[error("Failed to query terminal size: {0}")]
    Geometry(#[source] io::Error),

    #[error("Terminal reported an empty window ({cols}x{rows})")]
    EmptyGeometry { cols: u16, rows: u16 },

    #[error("Failed to read from terminal: {0}")]
    Input(#[source] io::Error),

    #[error("Terminal input closed")]
    InputClosed,

    #[error("Failed to write to terminal: {0}")]
    Output(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, TerminalError>;

/// Visible terminal size. Both dimensions are always non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub rows: u16,
    pub cols: u16,
}

impl Geometry {
    pub fn new(rows: u16, cols: u16) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(TerminalError::EmptyGeometry { cols, rows });
        }
        Ok(Self { rows, cols })
    }

    pub fn last_row(&self) -> u16 {
        self.rows - 1
    }

    pub fn last_col(&self) -> u16 {
        self.cols - 1
    }
}

/// Platform primitives for reading and writing the line discipline.
pub trait ModeControl {
    /// Opaque capture of the terminal configuration.
    type Mode: Clone;

    fn current_mode(&mut self) -> Result<Self::Mode>;

    fn apply_mode(&mut self, mode: &Self::Mode) -> Result<()>;

    /// Derive the raw configuration from `base`.
    ///
    /// Reads on the derived mode return after at most `read_timeout` even
    /// when no byte arrived.
    fn raw_variant(&self, base: &Self::Mode, read_timeout: Duration) -> Self::Mode;

    fn geometry(&mut self) -> Result<Geometry>;
}

/// Scoped raw mode.
///
/// The mode captured by [`RawMode::enter`] is restored exactly once, either
/// through [`RawMode::exit`] or when the guard is dropped.
pub struct RawMode<C: ModeControl> {
    control: C,
    saved: C::Mode,
    active: bool,
}

impl<C: ModeControl> RawMode<C> {
    pub fn enter(mut control: C, read_timeout: Duration) -> Result<Self> {
        let saved = control.current_mode()?;
        let raw = control.raw_variant(&saved, read_timeout);

        // Built before applying so a failed apply still restores on drop.
        let mut guard = Self {
            control,
            saved,
            active: true,
        };
        guard.control.apply_mode(&raw)?;

        debug!(?read_timeout, "Entered raw terminal mode");
        Ok(guard)
    }

    /// Restore the captured mode. Calling it again is a no-op.
    pub fn exit(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;

        self.control.apply_mode(&self.saved).map_err(|e| match e {
            TerminalError::WriteMode(err) => TerminalError::RestoreMode(err),
            other => other,
        })?;

        debug!("Restored terminal mode");
        Ok(())
    }

    #[allow(dead_code)]
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn geometry(&mut self) -> Result<Geometry> {
        self.control.geometry()
    }

    #[allow(dead_code)]
    pub fn control(&self) -> &C {
        &self.control
    }
}

impl<C: ModeControl> Drop for RawMode<C> {
    fn drop(&mut self) {
        if let Err(e) = self.exit() {
            warn!(error = %e, "Failed to restore terminal mode on drop");
        }
    }
}

#[cfg(unix)]
pub use tty::Tty;

#[cfg(unix)]
mod tty {
    use std::io;
    use std::os::fd::AsFd;
    use std::time::Duration;

    use nix::sys::termios::{
        self, ControlFlags, InputFlags, LocalFlags, OutputFlags, SetArg,
        SpecialCharacterIndices, Termios,
    };

    use super::{Geometry, ModeControl, Result, TerminalError};

    /// Controlling terminal on standard input.
    pub struct Tty {
        stdin: io::Stdin,
    }

    impl Default for Tty {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Tty {
        pub fn new() -> Self {
            Self { stdin: io::stdin() }
        }
    }

    /// VTIME is counted in tenths of a second and must fit a `cc_t`.
    pub(super) fn deciseconds(timeout: Duration) -> u8 {
        let tenths = (timeout.as_millis() + 99) / 100;
        tenths.clamp(1, 255) as u8
    }

    impl ModeControl for Tty {
        type Mode = Termios;

        fn current_mode(&mut self) -> Result<Termios> {
            termios::tcgetattr(self.stdin.as_fd()).map_err(|e| TerminalError::ReadMode(e.into()))
        }

        fn apply_mode(&mut self, mode: &Termios) -> Result<()> {
            termios::tcsetattr(self.stdin.as_fd(), SetArg::TCSAFLUSH, mode)
                .map_err(|e| TerminalError::WriteMode(e.into()))
        }

        fn raw_variant(&self, base: &Termios, read_timeout: Duration) -> Termios {
            let mut raw = base.clone();

            // No echo, byte-at-a-time input, no signals from Ctrl-C/Ctrl-Z
            raw.local_flags
                .remove(LocalFlags::ECHO | LocalFlags::ICANON | LocalFlags::ISIG | LocalFlags::IEXTEN);
            // No flow control, no CR->NL, no break/parity/strip processing
            raw.input_flags.remove(
                InputFlags::IXON
                    | InputFlags::ICRNL
                    | InputFlags::BRKINT
                    | InputFlags::INPCK
                    | InputFlags::ISTRIP,
            );
            raw.output_flags.remove(OutputFlags::OPOST);
            raw.control_flags.insert(ControlFlags::CS8);

            raw.control_chars[SpecialCharacterIndices::VMIN as usize] = 0;
            raw.control_chars[SpecialCharacterIndices::VTIME as usize] = deciseconds(read_timeout);
            raw
        }

        fn geometry(&mut self) -> Result<Geometry> {
            let (cols, rows) = crossterm::terminal::size().map_err(TerminalError::Geometry)?;
            Geometry::new(rows, cols)
        }
    }
}
