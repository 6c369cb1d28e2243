//! Tty subsystem: queues/line-discipline (§4.5), pseudo-terminals + devpts
//! (§4.6), and the VT100/ANSI console state machine (§4.5's escape-sequence
//! paragraph), generalized from the teacher's placeholder
//! `kernel/src/drivers/tty/mod.rs`.
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod console;
pub mod ioctl;
pub mod line_discipline;
pub mod pty;
pub mod termios;
pub mod tty;

pub use console::{Console, CsiFinal, EgaColor};
pub use ioctl::{Ioctl, IoctlResult};
pub use pty::{devpts, PtyError, PtyMaster, PtySlave, PtySlaveTable, MAX_PTY_DEVICES};
pub use termios::{Termios, Winsize};
pub use tty::{ProcessDirectory, Tty, TtyError, TTY_BUF_SIZE};
