//! Tty core: queues, read/write algorithms, and job control (§4.5),
//! generalized from the teacher's placeholder
//! `kernel/src/drivers/tty/mod.rs` (a 49-line prompt-printing loop with no
//! real tty semantics) into the full design the distilled spec describes.
use byte_ring::ByteRing;

use crate::line_discipline::{process_key, raw_process_key};
use crate::termios::{LFlag, Termios, Winsize, VEOF, VMIN, VTIME};

/// Fixed capacity of each of a tty's three byte queues.
pub const TTY_BUF_SIZE: usize = 1024;

/// Wake threshold for blocked writers: `ttyx_write` wakes sleepers once at
/// least this many bytes of free space reappear in `write_q`.
pub const WRITE_WAKE_THRESHOLD: usize = 128;

pub type RawRing = ByteRing<TTY_BUF_SIZE>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtyError {
    /// `ttyx_read`: caller's process group differs from the tty's
    /// foreground group.
    BackgroundRead,
    /// A blocking call was interrupted with nothing consumed.
    Restart,
    /// A blocking call was interrupted after partial progress.
    Interrupted,
    WouldBlock,
}

/// Job-control / wakeup seam: `tty-core` doesn't own a task table, so
/// signal delivery and queue-wakeup notification are abstracted behind this
/// trait, the same way `fat-fs`'s `BlockDevice` abstracts disk I/O away
/// from the FAT algorithms.
pub trait ProcessDirectory {
    /// Queue `signo` to every task whose process group is `pgid`
    /// (`tty_send_signal`).
    fn send_signal_to_pgroup(&mut self, pgid: u32, signo: u32);
    /// The calling task's own process group, consulted by `ttyx_read`'s
    /// foreground-group check.
    fn caller_pgid(&self) -> u32;
}

pub const SIGINT: u32 = 2;
pub const SIGQUIT: u32 = 3;
pub const SIGTSTP: u32 = 20;
pub const SIGTTIN: u32 = 21;
pub const SIGTTOU: u32 = 22;

/// A terminal device (§3's "Tty").
pub struct Tty {
    pub read_q: RawRing,
    pub write_q: RawRing,
    pub secondary_q: RawRing,
    pub termios: Termios,
    pub winsize: Winsize,
    /// Foreground process group; zero iff no controlling session is
    /// attached (§3 invariant).
    pub pgid: u32,
    pub sid: u32,
    pub controlling: bool,
    pub scroll_top: u16,
    pub scroll_bottom: u16,
    pub row: u16,
    pub col: u16,
    /// Bytes typed into the current, not-yet-terminated cooked line since
    /// the last LF/EOF/EOL boundary. Bounds how far ERASE/KILL/WERASE may
    /// retract into `secondary_q` so they never eat into an already
    /// committed line.
    pub line_len: usize,
}

impl Tty {
    pub fn new() -> Self {
        Tty {
            read_q: ByteRing::new(),
            write_q: ByteRing::new(),
            secondary_q: ByteRing::new(),
            termios: Termios::default(),
            winsize: Winsize::default(),
            pgid: 0,
            sid: 0,
            controlling: false,
            scroll_top: 1,
            scroll_bottom: 25,
            row: 0,
            col: 0,
            line_len: 0,
        }
    }

    fn is_canonical(&self) -> bool {
        self.termios.lflag.contains(LFlag::ICANON)
    }

    /// `tty_send_signal(pgid, sig)`: queue `sig` to every task in `pgid`
    /// via the caller-supplied directory.
    pub fn send_signal(&self, dir: &mut impl ProcessDirectory, sig: u32) {
        if self.pgid != 0 {
            dir.send_signal_to_pgroup(self.pgid, sig);
        }
    }

    /// Hardware/keyboard IRQ path: push one raw byte through the line
    /// discipline into `secondary_q` (cooked mode) or straight through
    /// (raw mode), dispatching job-control signal keys in cooked mode.
    pub fn input_byte(&mut self, byte: u8, dir: &mut impl ProcessDirectory) {
        if self.is_canonical() {
            process_key(self, byte, dir);
        } else {
            raw_process_key(self, byte);
        }
    }

    /// §4.5 `ttyx_read`, steps 1-4.
    ///
    /// `requested` is the caller's buffer length; `signal_pending` reports
    /// whether the calling task currently has a deliverable signal (the
    /// caller is expected to re-check this across sleep/wake cycles — this
    /// function performs one non-blocking pass over already-buffered data
    /// and returns `WouldBlock` when it would otherwise have to sleep, so
    /// callers drive the sleep loop themselves via `block_task`).
    pub fn ttyx_read(
        &mut self,
        out: &mut [u8],
        requested: usize,
        dir: &mut impl ProcessDirectory,
        signal_pending: bool,
    ) -> Result<usize, TtyError> {
        // Step 1: background-group check.
        if self.pgid != 0 && dir.caller_pgid() != self.pgid {
            self.send_signal(dir, SIGTTIN);
            return Err(TtyError::BackgroundRead);
        }

        let min = (self.termios.cc[VMIN] as usize).min(requested);

        if signal_pending {
            return Err(TtyError::Restart);
        }

        let mut n = 0usize;
        while n < out.len() {
            if self.is_canonical() && self.secondary_q.extra <= 0 {
                break;
            }
            let byte = match self.secondary_q.dequeue() {
                Some(b) => b,
                None => break,
            };

            let is_eof = byte == self.termios.cc[VEOF] && self.is_canonical();
            let is_newline = byte == b'\n';
            if self.is_canonical() && (is_newline || is_eof) && self.secondary_q.extra > 0 {
                self.secondary_q.extra -= 1;
            }

            if is_eof {
                // EOF is a control signal, not data: consumed but not
                // copied out, matching `read()` returning 0 on EOF.
                if n == 0 {
                    return Ok(0);
                }
                return Ok(n);
            }

            out[n] = byte;
            n += 1;

            if self.is_canonical() && is_newline {
                return Ok(n);
            }
            if !self.is_canonical() && n >= min.max(1) {
                return Ok(n);
            }
        }

        if n > 0 {
            Ok(n)
        } else {
            Err(TtyError::WouldBlock)
        }
    }

    /// §4.5 `ttyx_write`: apply OPOST transforms, enqueue into `write_q`.
    /// Returns the number of input bytes consumed before the queue filled;
    /// the caller sleeps (wake threshold `WRITE_WAKE_THRESHOLD`) and calls
    /// again with the remainder.
    pub fn ttyx_write(&mut self, data: &[u8]) -> usize {
        use crate::termios::OFlag;
        let opost = self.termios.oflag.contains(OFlag::OPOST);

        let mut consumed = 0;
        let mut i = 0;
        while i < data.len() {
            let b = data[i];

            if !opost {
                if !self.write_q.enqueue(b) {
                    break;
                }
                consumed += 1;
                i += 1;
                continue;
            }

            if b == b'\n' && self.termios.oflag.contains(OFlag::ONLCR) {
                if !self.write_q.has_space_for(2) {
                    break;
                }
                self.write_q.enqueue(b'\r');
                self.write_q.enqueue(b'\n');
            } else if b == b'\r' && self.termios.oflag.contains(OFlag::OCRNL) {
                if !self.write_q.enqueue(b'\n') {
                    break;
                }
            } else {
                let out = if self.termios.oflag.contains(OFlag::OLCUC) && b.is_ascii_lowercase() {
                    b.to_ascii_uppercase()
                } else {
                    b
                };
                if !self.write_q.enqueue(out) {
                    break;
                }
            }
            consumed += 1;
            i += 1;
        }
        consumed
    }

    /// Whether `write_q` has reopened enough space to wake a sleeping
    /// writer.
    pub fn write_queue_has_woken(&self) -> bool {
        self.write_q.free() >= WRITE_WAKE_THRESHOLD
    }
}

impl Default for Tty {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeDirectory {
        pgid: u32,
        signals: alloc::vec::Vec<(u32, u32)>,
    }

    impl ProcessDirectory for FakeDirectory {
        fn send_signal_to_pgroup(&mut self, pgid: u32, signo: u32) {
            self.signals.push((pgid, signo));
        }
        fn caller_pgid(&self) -> u32 {
            self.pgid
        }
    }

    #[test]
    fn background_read_sends_sigttin_and_errors() {
        let mut tty = Tty::new();
        tty.pgid = 5;
        let mut dir = FakeDirectory { pgid: 6, signals: alloc::vec::Vec::new() };
        let mut buf = [0u8; 16];
        let err = tty.ttyx_read(&mut buf, 16, &mut dir, false).unwrap_err();
        assert_eq!(err, TtyError::BackgroundRead);
        assert_eq!(dir.signals, alloc::vec![(5, SIGTTIN)]);
    }

    #[test]
    fn canonical_read_returns_on_newline() {
        let mut tty = Tty::new();
        tty.pgid = 0;
        for &b in b"hi\n" {
            tty.secondary_q.enqueue(b);
        }
        tty.secondary_q.extra = 1;
        let mut dir = FakeDirectory { pgid: 0, signals: alloc::vec::Vec::new() };
        let mut buf = [0u8; 16];
        let n = tty.ttyx_read(&mut buf, 16, &mut dir, false).unwrap();
        assert_eq!(&buf[..n], b"hi\n");
        assert_eq!(tty.secondary_q.extra, 0);
    }

    #[test]
    fn raw_write_onlcr_expands_newline() {
        let mut tty = Tty::new();
        let n = tty.ttyx_write(b"a\nb");
        assert_eq!(n, 3);
        let mut out = alloc::vec::Vec::new();
        while let Some(b) = tty.write_q.dequeue() {
            out.push(b);
        }
        assert_eq!(out, b"a\r\nb");
    }

    #[test]
    fn write_stops_when_queue_fills_and_reports_consumed() {
        let mut tty = Tty::new();
        use crate::termios::OFlag;
        tty.termios.oflag = OFlag::empty();
        // fill to one byte of capacity
        for _ in 0..(TTY_BUF_SIZE - 1) {
            tty.write_q.enqueue(0);
        }
        let consumed = tty.ttyx_write(b"xy");
        assert_eq!(consumed, 1);
    }
}
