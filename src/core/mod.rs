//! Core editor components.
//!
//! - **terminal**: raw mode entry/restore and geometry query
//! - **input**: byte stream to key event decoding
//! - **cursor**: cursor position and clamped movement
//! - **session**: the render/read/dispatch loop
//!
//! # Architecture
//!
//! ```text
//! RawMode<Tty> (restores the line discipline on exit)
//! Session
//! ├── KeyDecoder (ByteSource -> KeyEvent)
//! ├── Cursor + Geometry
//! └── Renderer (frames -> stdout)
//! ```

pub mod cursor;
pub mod input;
pub mod session;
pub mod terminal;
