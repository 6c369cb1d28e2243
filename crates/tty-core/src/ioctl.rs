//! Tty ioctl command set (§6 "Ioctls (tty)"), grounded on
//! `original_source/kernel/kernel/tty_ioctl.c`'s `tty_ioctl` dispatch
//! switch. Each variant carries its argument, and `Tty::ioctl` dispatches
//! it directly rather than going through a raw `(cmd, *mut u8)` pair, since
//! this crate has no user-memory-copy boundary of its own (the syscall
//! layer in `kernel/` owns `copy_from_user`/`copy_to_user`).
use crate::termios::{Termios, Winsize};
use crate::tty::{ProcessDirectory, Tty};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushQueue {
    Input,
    Output,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowAction {
    /// `TCOOFF`: suspend output.
    SuspendOutput,
    /// `TCOON`: restart suspended output.
    RestartOutput,
    /// `TCIOFF`: transmit a STOP character.
    SendStop,
    /// `TCION`: transmit a START character.
    SendStart,
}

/// One ioctl request, parameterized by its argument type per §6's command
/// table.
#[derive(Debug, Clone, Copy)]
pub enum Ioctl {
    /// `TCGETS`/`TCGETA`: read back the live `termios`.
    GetTermios,
    /// `TCSETS`/`TCSETA`: apply immediately.
    SetTermios(Termios),
    /// `TCSETSW`/`TCSETAW`: apply after output drains (modeled the same as
    /// immediate application — this crate has no separate "drain" state
    /// machine beyond the write queue itself being empty).
    SetTermiosDrain(Termios),
    /// `TCSETSF`/`TCSETAF`: drain output, discard input, then apply.
    SetTermiosFlush(Termios),
    GetWinsize,
    SetWinsize(Winsize),
    /// `TCXONC`.
    FlowControl(FlowAction),
    /// `TCFLSH`.
    Flush(FlushQueue),
    /// `TIOCINQ`: bytes currently readable.
    InputCount,
    /// `TIOCOUTQ`: bytes queued for output.
    OutputCount,
    /// `TIOCSTI`: insert a byte into the input queue as if typed.
    InsertInput(u8),
    /// `TIOCSCTTY`: acquire as controlling terminal; `true` requests a
    /// root "steal" of an existing ctty.
    SetControllingTty { steal: bool },
    GetForegroundPgrp,
    SetForegroundPgrp(u32),
    GetSid,
    /// `TIOCGSOFTCAR`/`TIOCSSOFTCAR`: `CLOCAL` flag passthrough.
    GetSoftCarrier,
    SetSoftCarrier(bool),
    /// `TIOCSPTLCK`: lock (`true`)/unlock (`false`) the pty slave.
    SetPtyLock(bool),
    /// `TIOCGPTN`: read back the pty slave's slot number.
    GetPtyNumber,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoctlError {
    NotATty,
    NotPermitted,
    InvalidArgument,
}

/// What an ioctl call hands back: either nothing (a pure setter), or the
/// one piece of data the corresponding getter reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoctlResult {
    None,
    Termios(Termios),
    Winsize(Winsize),
    Count(usize),
    Pgrp(u32),
    Sid(u32),
    SoftCarrier(bool),
}

impl Tty {
    /// Dispatch one ioctl request against this tty. `caller_pgid`/`steal`
    /// are consulted by `TIOCSCTTY`'s session-leader-with-no-ctty rule.
    pub fn ioctl(
        &mut self,
        req: Ioctl,
        dir: &mut impl ProcessDirectory,
        caller_is_session_leader: bool,
        caller_sid: u32,
    ) -> Result<IoctlResult, IoctlError> {
        use Ioctl::*;
        match req {
            GetTermios => Ok(IoctlResult::Termios(self.termios)),
            SetTermios(t) | SetTermiosDrain(t) => {
                self.termios = t;
                Ok(IoctlResult::None)
            }
            SetTermiosFlush(t) => {
                self.read_q.clear();
                self.secondary_q.clear();
                self.termios = t;
                Ok(IoctlResult::None)
            }
            GetWinsize => Ok(IoctlResult::Winsize(self.winsize)),
            SetWinsize(w) => {
                self.winsize = w;
                Ok(IoctlResult::None)
            }
            FlowControl(_action) => {
                // Flow-control start/stop/suspend/restart touches only the
                // hardware-side transmit gate, which this no_std crate
                // does not model directly; the request is accepted as a
                // no-op seam for the kernel's driver layer to act on.
                Ok(IoctlResult::None)
            }
            Flush(which) => {
                match which {
                    FlushQueue::Input => {
                        self.read_q.clear();
                        self.secondary_q.clear();
                    }
                    FlushQueue::Output => self.write_q.clear(),
                    FlushQueue::Both => {
                        self.read_q.clear();
                        self.secondary_q.clear();
                        self.write_q.clear();
                    }
                }
                Ok(IoctlResult::None)
            }
            InputCount => Ok(IoctlResult::Count(self.secondary_q.used())),
            OutputCount => Ok(IoctlResult::Count(self.write_q.used())),
            InsertInput(byte) => {
                self.input_byte(byte, dir);
                Ok(IoctlResult::None)
            }
            SetControllingTty { steal } => {
                if self.pgid != 0 && !steal {
                    return Err(IoctlError::NotPermitted);
                }
                if self.pgid != 0 && steal && !caller_is_session_leader {
                    return Err(IoctlError::NotPermitted);
                }
                if !caller_is_session_leader {
                    return Err(IoctlError::NotPermitted);
                }
                self.sid = caller_sid;
                self.pgid = dir.caller_pgid();
                self.controlling = true;
                Ok(IoctlResult::None)
            }
            GetForegroundPgrp => Ok(IoctlResult::Pgrp(self.pgid)),
            SetForegroundPgrp(pgid) => {
                self.pgid = pgid;
                Ok(IoctlResult::None)
            }
            GetSid => {
                if !self.controlling {
                    return Err(IoctlError::NotATty);
                }
                Ok(IoctlResult::Sid(self.sid))
            }
            GetSoftCarrier => {
                use crate::termios::CFlag;
                Ok(IoctlResult::SoftCarrier(!self.termios.cflag.contains(CFlag::CLOCAL)))
            }
            SetSoftCarrier(on) => {
                use crate::termios::CFlag;
                if on {
                    self.termios.cflag.remove(CFlag::CLOCAL);
                } else {
                    self.termios.cflag.insert(CFlag::CLOCAL);
                }
                Ok(IoctlResult::None)
            }
            // Pty-specific requests are handled by `pty::` helpers directly
            // against the slave table, since `Tty` itself has no notion of
            // "which slot am I"; these two variants exist so a syscall
            // dispatcher can match on one `Ioctl` enum regardless of
            // device kind and get a typed "not applicable here" error.
            SetPtyLock(_) | GetPtyNumber => Err(IoctlError::InvalidArgument),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeDirectory {
        pgid: u32,
    }
    impl ProcessDirectory for FakeDirectory {
        fn send_signal_to_pgroup(&mut self, _pgid: u32, _signo: u32) {}
        fn caller_pgid(&self) -> u32 {
            self.pgid
        }
    }

    #[test]
    fn termios_roundtrip_via_tcsets_tcgets() {
        let mut tty = Tty::new();
        let mut dir = FakeDirectory { pgid: 0 };
        let mut t = Termios::default();
        t.ispeed = 9600;
        let res = tty.ioctl(Ioctl::SetTermios(t), &mut dir, true, 1).unwrap();
        assert_eq!(res, IoctlResult::None);
        let got = tty.ioctl(Ioctl::GetTermios, &mut dir, true, 1).unwrap();
        assert_eq!(got, IoctlResult::Termios(t));
    }

    #[test]
    fn winsize_roundtrip() {
        let mut tty = Tty::new();
        let mut dir = FakeDirectory { pgid: 0 };
        let w = Winsize { rows: 50, cols: 120, xpixel: 0, ypixel: 0 };
        tty.ioctl(Ioctl::SetWinsize(w), &mut dir, true, 1).unwrap();
        assert_eq!(tty.ioctl(Ioctl::GetWinsize, &mut dir, true, 1).unwrap(), IoctlResult::Winsize(w));
    }

    #[test]
    fn tiocsctty_requires_session_leader() {
        let mut tty = Tty::new();
        let mut dir = FakeDirectory { pgid: 7 };
        assert_eq!(
            tty.ioctl(Ioctl::SetControllingTty { steal: false }, &mut dir, false, 1),
            Err(IoctlError::NotPermitted)
        );
        tty.ioctl(Ioctl::SetControllingTty { steal: false }, &mut dir, true, 1).unwrap();
        assert_eq!(tty.pgid, 7);
        assert!(tty.controlling);
    }

    #[test]
    fn tiocsctty_steal_requires_root_flag_and_session_leader() {
        let mut tty = Tty::new();
        tty.pgid = 3;
        let mut dir = FakeDirectory { pgid: 9 };
        assert_eq!(
            tty.ioctl(Ioctl::SetControllingTty { steal: false }, &mut dir, true, 1),
            Err(IoctlError::NotPermitted)
        );
        tty.ioctl(Ioctl::SetControllingTty { steal: true }, &mut dir, true, 2).unwrap();
        assert_eq!(tty.sid, 2);
    }

    #[test]
    fn tcflsh_clears_requested_queues_only() {
        let mut tty = Tty::new();
        let mut dir = FakeDirectory { pgid: 0 };
        tty.write_q.enqueue(1);
        tty.secondary_q.enqueue(2);
        tty.ioctl(Ioctl::Flush(FlushQueue::Output), &mut dir, true, 1).unwrap();
        assert!(tty.write_q.is_empty());
        assert!(!tty.secondary_q.is_empty());
    }

    #[test]
    fn tiocinq_reports_secondary_queue_depth() {
        let mut tty = Tty::new();
        let mut dir = FakeDirectory { pgid: 0 };
        for &b in b"ab" {
            tty.secondary_q.enqueue(b);
        }
        assert_eq!(tty.ioctl(Ioctl::InputCount, &mut dir, true, 1).unwrap(), IoctlResult::Count(2));
    }
}
