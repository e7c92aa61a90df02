//! Editor session
//!
//! Owns the screen geometry and cursor, feeds decoded keys into cursor
//! movement and redraws the viewport after every key.
//!
//! ```text
//! initialize ──ok──> Running ──exit combo──> Terminated(Exited)
//!      │                 │
//!      └──error──────────┴──error──────────> Terminated(Failed)
//! ```

use std::io::Write;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::cursor::{AxisMapping, Cursor};
use super::input::{ByteSource, Direction, KeyDecoder, KeyEvent};
use super::terminal::{Geometry, Result};
use crate::ui::Renderer;

/// Letter keys that move the cursor like the arrow keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementKeys {
    pub enabled: bool,
    pub up: char,
    pub down: char,
    pub left: char,
    pub right: char,
}

impl Default for MovementKeys {
    fn default() -> Self {
        Self {
            enabled: true,
            up: 'w',
            down: 's',
            left: 'a',
            right: 'd',
        }
    }
}

impl MovementKeys {
    pub fn direction_for(&self, byte: u8) -> Option<Direction> {
        if !self.enabled {
            return None;
        }
        let ch = char::from(byte);
        if ch == self.up {
            Some(Direction::Up)
        } else if ch == self.down {
            Some(Direction::Down)
        } else if ch == self.left {
            Some(Direction::Left)
        } else if ch == self.right {
            Some(Direction::Right)
        } else {
            None
        }
    }
}

/// Session settings
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Letter whose Ctrl combination ends the session
    pub exit_letter: u8,
    pub axis_mapping: AxisMapping,
    pub movement_keys: MovementKeys,
    /// Welcome text drawn on the placeholder grid
    pub banner: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            exit_letter: b'q',
            axis_mapping: AxisMapping::default(),
            movement_keys: MovementKeys::default(),
            banner: String::new(),
        }
    }
}

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The exit combination was pressed
    Exited,
    /// A terminal error ended the session
    Failed,
}

impl Termination {
    pub fn exit_code(self) -> i32 {
        match self {
            Termination::Exited => 0,
            Termination::Failed => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Terminated(Termination),
}

/// A running editor bound to one input source and one output sink.
pub struct Session<S, W: Write> {
    state: SessionState,
    geometry: Geometry,
    cursor: Cursor,
    decoder: KeyDecoder<S>,
    renderer: Renderer<W>,
    axis_mapping: AxisMapping,
    movement_keys: MovementKeys,
}

impl<S: ByteSource, W: Write> Session<S, W> {
    /// Query the geometry and start in `Running` with the cursor at the origin.
    ///
    /// A failed query ends the session before it starts; the caller runs the
    /// fatal path.
    pub fn initialize<G>(query_geometry: G, source: S, out: W, options: SessionOptions) -> Result<Self>
    where
        G: FnOnce() -> Result<Geometry>,
    {
        let geometry = query_geometry().map_err(|e| {
            warn!(error = %e, "Initializing -> Terminated: geometry query failed");
            e
        })?;
        info!(rows = geometry.rows, cols = geometry.cols, "Initializing -> Running");

        Ok(Self {
            state: SessionState::Running,
            geometry,
            cursor: Cursor::default(),
            decoder: KeyDecoder::new(source, options.exit_letter),
            renderer: Renderer::new(out, options.banner),
            axis_mapping: options.axis_mapping,
            movement_keys: options.movement_keys,
        })
    }

    /// Drive the render/read/dispatch loop until the session terminates.
    ///
    /// On the graceful path the screen is cleared and homed before
    /// returning. Errors leave the session `Terminated(Failed)`.
    pub fn run(&mut self) -> Result<Termination> {
        match self.run_loop() {
            Ok(termination) => Ok(termination),
            Err(e) => {
                self.state = SessionState::Terminated(Termination::Failed);
                warn!(error = %e, "Running -> Terminated: fatal error");
                Err(e)
            }
        }
    }

    fn run_loop(&mut self) -> Result<Termination> {
        loop {
            // No dirty tracking: every key costs a full redraw
            self.renderer.render(self.geometry, self.cursor, true)?;
            let key = self.decoder.read_key()?;
            self.dispatch(key);

            if let SessionState::Terminated(termination) = self.state {
                self.renderer.render(self.geometry, self.cursor, false)?;
                return Ok(termination);
            }
        }
    }

    /// Apply one key to the session state.
    pub fn dispatch(&mut self, key: KeyEvent) {
        match key {
            KeyEvent::Arrow(direction) => self.move_cursor(direction),
            KeyEvent::ControlCombo(letter) => {
                let letter = char::from(letter);
                info!(%letter, "Running -> Terminated: exit requested");
                self.state = SessionState::Terminated(Termination::Exited);
            }
            KeyEvent::Character(byte) => match self.movement_keys.direction_for(byte) {
                Some(direction) => self.move_cursor(direction),
                None => debug!(byte, "no action"),
            },
            KeyEvent::Escape => debug!("escape ignored"),
        }
    }

    fn move_cursor(&mut self, direction: Direction) {
        self.cursor.step(direction, self.geometry, self.axis_mapping);
        debug!(?direction, x = self.cursor.x, y = self.cursor.y, "cursor moved");
    }

    #[allow(dead_code)]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[allow(dead_code)]
    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    #[allow(dead_code)]
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    #[allow(dead_code)]
    pub fn renderer(&self) -> &Renderer<W> {
        &self.renderer
    }

    #[allow(dead_code)]
    pub fn decoder(&self) -> &KeyDecoder<S> {
        &self.decoder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::input::ctrl_key;
    use crate::core::input::tests::ScriptedSource;
    use crate::core::terminal::TerminalError;
    use crate::ui::renderer::{render_frame, teardown_frame};

    fn options(exit_letter: u8) -> SessionOptions {
        SessionOptions {
            exit_letter,
            banner: "Welcome".to_string(),
            ..Default::default()
        }
    }

    fn session(input: &[u8], rows: u16, cols: u16) -> Session<ScriptedSource, Vec<u8>> {
        Session::initialize(
            || Geometry::new(rows, cols),
            ScriptedSource::bytes(input),
            Vec::<u8>::new(),
            options(b'q'),
        )
        .unwrap()
    }

    #[test]
    fn test_initialize_places_cursor_at_origin() {
        let session = session(b"", 24, 80);
        assert_eq!(session.state(), SessionState::Running);
        assert_eq!(session.cursor(), Cursor::default());
        assert_eq!(session.geometry(), Geometry::new(24, 80).unwrap());
    }

    #[test]
    fn test_initialize_fails_on_geometry_error() {
        let result = Session::initialize(
            || Geometry::new(24, 0),
            ScriptedSource::default(),
            Vec::<u8>::new(),
            options(b'q'),
        );
        assert!(matches!(result, Err(TerminalError::EmptyGeometry { .. })));
    }

    #[test]
    fn test_exit_combo_terminates() {
        let mut session = Session::initialize(
            || Geometry::new(10, 40),
            ScriptedSource::bytes(&[0x19]),
            Vec::<u8>::new(),
            options(b'y'),
        )
        .unwrap();

        let termination = session.run().unwrap();
        assert_eq!(termination, Termination::Exited);
        assert_eq!(termination.exit_code(), 0);
        assert_eq!(session.state(), SessionState::Terminated(Termination::Exited));
    }

    #[test]
    fn test_arrows_move_and_redraw() {
        // Down, Left, then exit
        let input = b"\x1b[B\x1b[D\x11";
        let mut session = session(input, 10, 40);
        session.run().unwrap();

        assert_eq!(session.cursor(), Cursor::new(1, 1));
        // Three loop iterations plus the teardown frame
        assert_eq!(session.renderer().frames(), 4);
    }

    #[test]
    fn test_unrecognized_keys_are_no_ops() {
        let input = [b'x', 0x1b, b'[', b'Z', ctrl_key(b'c'), ctrl_key(b'q')];
        let mut session = session(&input, 10, 40);
        session.run().unwrap();

        assert_eq!(session.cursor(), Cursor::default());
        // Every key still costs a redraw
        assert_eq!(session.renderer().frames(), 5);
    }

    #[test]
    fn test_input_error_fails_session() {
        let mut session = session(b"d", 10, 40);
        let result = session.run();

        assert!(matches!(result, Err(TerminalError::InputClosed)));
        assert_eq!(session.state(), SessionState::Terminated(Termination::Failed));
        assert_eq!(Termination::Failed.exit_code(), 1);
    }

    #[test]
    fn test_letter_movement_scenario() {
        let geometry = Geometry::new(10, 40).unwrap();
        let mut session = session(&[b'd', b'd', b's', ctrl_key(b'q')], 10, 40);

        let termination = session.run().unwrap();
        assert_eq!(termination, Termination::Exited);
        assert_eq!(session.decoder().source().remaining(), 0);

        // 'd' is Right (y axis, already at 0), 's' is Down (x axis)
        assert_eq!(session.cursor(), Cursor::new(1, 0));

        let mut expected = Vec::new();
        for cursor in [Cursor::new(0, 0), Cursor::new(0, 0), Cursor::new(0, 0), Cursor::new(1, 0)] {
            expected.extend(render_frame(geometry, cursor, true, "Welcome"));
        }
        expected.extend(teardown_frame(Cursor::new(1, 0)));
        assert_eq!(session.renderer().writer(), &expected);
        assert!(expected.ends_with(b"\x1b[2J\x1b[H\x1b[1;2H\x1b[H"));
    }

    #[test]
    fn test_movement_keys_can_be_disabled() {
        let mut session = Session::initialize(
            || Geometry::new(10, 40),
            ScriptedSource::bytes(b"ss\x11"),
            Vec::<u8>::new(),
            SessionOptions {
                movement_keys: MovementKeys {
                    enabled: false,
                    ..Default::default()
                },
                ..options(b'q')
            },
        )
        .unwrap();

        session.run().unwrap();
        assert_eq!(session.cursor(), Cursor::default());
    }

    #[test]
    fn test_conventional_mapping() {
        let mut session = Session::initialize(
            || Geometry::new(10, 40),
            ScriptedSource::bytes(b"\x1b[B\x1b[C\x1b[C\x11"),
            Vec::<u8>::new(),
            SessionOptions {
                axis_mapping: AxisMapping::Conventional,
                ..options(b'q')
            },
        )
        .unwrap();

        session.run().unwrap();
        assert_eq!(session.cursor(), Cursor::new(2, 1));
    }
}
