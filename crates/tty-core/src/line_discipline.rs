//! Cooked-mode input translation, line editing, and signal-key dispatch
//! (§4.5 "Line discipline"), grounded on the byte-by-byte processing
//! `tty.c`'s input driver performs under `ICANON`.
use crate::termios::{IFlag, LFlag, VEOF, VERASE, VINTR, VKILL, VQUIT, VSUSP, VWERASE};
use crate::tty::{ProcessDirectory, Tty, SIGINT, SIGQUIT, SIGTSTP};

/// Cooked-mode byte arrival: translate per `c_iflag`, handle ERASE/KILL/
/// WERASE edits with local echo, count LF/EOF/EOL boundaries in
/// `secondary_q.extra`, and dispatch job-control signal keys.
pub fn process_key(tty: &mut Tty, mut byte: u8, dir: &mut impl ProcessDirectory) {
    if tty.termios.iflag.contains(IFlag::ISTRIP) {
        byte &= 0x7f;
    }

    if byte == b'\r' {
        if tty.termios.iflag.contains(IFlag::IGNCR) {
            return;
        }
        if tty.termios.iflag.contains(IFlag::ICRNL) {
            byte = b'\n';
        }
    } else if byte == b'\n' && tty.termios.iflag.contains(IFlag::INLCR) {
        byte = b'\r';
    }

    if tty.termios.iflag.contains(IFlag::IUCLC) && byte.is_ascii_uppercase() {
        byte = byte.to_ascii_lowercase();
    }

    let isig = tty.termios.lflag.contains(LFlag::ISIG);
    if isig {
        if byte == tty.termios.cc[VINTR] {
            tty.send_signal(dir, SIGINT);
            return;
        }
        if byte == tty.termios.cc[VQUIT] {
            tty.send_signal(dir, SIGQUIT);
            return;
        }
        if byte == tty.termios.cc[VSUSP] {
            tty.send_signal(dir, SIGTSTP);
            return;
        }
    }

    if byte == tty.termios.cc[VERASE] {
        erase_one(tty);
        return;
    }
    if byte == tty.termios.cc[VKILL] {
        kill_line(tty);
        return;
    }
    if byte == tty.termios.cc[VWERASE] {
        erase_word(tty);
        return;
    }

    let is_boundary = byte == b'\n' || byte == tty.termios.cc[VEOF];
    if !tty.secondary_q.enqueue(byte) {
        return; // full: silent drop, as at the byte-ring layer
    }
    if is_boundary {
        tty.secondary_q.extra += 1;
        tty.line_len = 0;
    } else {
        tty.line_len += 1;
    }
}

/// Raw-mode byte arrival: copied verbatim, no boundary counting, no signal
/// synthesis.
pub fn raw_process_key(tty: &mut Tty, byte: u8) {
    tty.secondary_q.enqueue(byte);
}

fn erase_one(tty: &mut Tty) {
    if tty.line_len == 0 {
        return;
    }
    tty.secondary_q.pop_back();
    tty.line_len -= 1;
}

fn kill_line(tty: &mut Tty) {
    while tty.line_len > 0 {
        tty.secondary_q.pop_back();
        tty.line_len -= 1;
    }
}

fn erase_word(tty: &mut Tty) {
    // Skip trailing whitespace, then erase back to the next whitespace or
    // the start of the current line, matching common WERASE behavior.
    while tty.line_len > 0 {
        match tty.secondary_q.peek_back() {
            Some(b' ') | Some(b'\t') => {
                tty.secondary_q.pop_back();
                tty.line_len -= 1;
            }
            _ => break,
        }
    }
    while tty.line_len > 0 {
        match tty.secondary_q.peek_back() {
            Some(b' ') | Some(b'\t') | None => break,
            _ => {
                tty.secondary_q.pop_back();
                tty.line_len -= 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    struct FakeDirectory;
    impl ProcessDirectory for FakeDirectory {
        fn send_signal_to_pgroup(&mut self, _pgid: u32, _signo: u32) {}
        fn caller_pgid(&self) -> u32 {
            0
        }
    }

    fn drain(tty: &mut Tty) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(b) = tty.secondary_q.dequeue() {
            out.push(b);
        }
        out
    }

    #[test]
    fn erase_removes_last_char_and_not_past_line_start() {
        let mut tty = Tty::new();
        let mut dir = FakeDirectory;
        for &b in b"ab" {
            process_key(&mut tty, b, &mut dir);
        }
        process_key(&mut tty, tty.termios.cc[VERASE], &mut dir);
        assert_eq!(drain(&mut tty), b"a");
    }

    #[test]
    fn erase_does_not_cross_a_committed_newline() {
        let mut tty = Tty::new();
        let mut dir = FakeDirectory;
        for &b in b"a\n" {
            process_key(&mut tty, b, &mut dir);
        }
        process_key(&mut tty, tty.termios.cc[VERASE], &mut dir);
        // "a\n" is already a committed line (line_len reset to 0); erase is
        // a no-op since nothing is pending in the new line
        assert_eq!(drain(&mut tty), b"a\n");
    }

    #[test]
    fn kill_clears_whole_pending_line() {
        let mut tty = Tty::new();
        let mut dir = FakeDirectory;
        for &b in b"hello" {
            process_key(&mut tty, b, &mut dir);
        }
        process_key(&mut tty, tty.termios.cc[VKILL], &mut dir);
        assert_eq!(drain(&mut tty), b"");
        assert_eq!(tty.line_len, 0);
    }

    #[test]
    fn newline_increments_extra_and_resets_line_len() {
        let mut tty = Tty::new();
        let mut dir = FakeDirectory;
        for &b in b"hi\n" {
            process_key(&mut tty, b, &mut dir);
        }
        assert_eq!(tty.secondary_q.extra, 1);
        assert_eq!(tty.line_len, 0);
    }

    #[test]
    fn werase_erases_back_to_previous_whitespace() {
        let mut tty = Tty::new();
        let mut dir = FakeDirectory;
        for &b in b"foo bar" {
            process_key(&mut tty, b, &mut dir);
        }
        process_key(&mut tty, tty.termios.cc[VWERASE], &mut dir);
        assert_eq!(drain(&mut tty), b"foo ");
    }

    #[test]
    fn sigint_key_is_consumed_not_buffered() {
        let mut tty = Tty::new();
        tty.pgid = 1;
        struct Recording(Vec<(u32, u32)>);
        impl ProcessDirectory for Recording {
            fn send_signal_to_pgroup(&mut self, pgid: u32, signo: u32) {
                self.0.push((pgid, signo));
            }
            fn caller_pgid(&self) -> u32 {
                0
            }
        }
        let mut dir = Recording(Vec::new());
        process_key(&mut tty, tty.termios.cc[VINTR], &mut dir);
        assert_eq!(dir.0, alloc::vec![(1, SIGINT)]);
        assert_eq!(drain(&mut tty), b"");
    }

    #[test]
    fn raw_mode_copies_verbatim_with_no_signal_synthesis() {
        let mut tty = Tty::new();
        raw_process_key(&mut tty, tty.termios.cc[VINTR]);
        assert_eq!(drain(&mut tty), alloc::vec![tty.termios.cc[VINTR]]);
    }
}
