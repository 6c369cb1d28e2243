//! VT102/ANSI escape-sequence state machine and EGA-text attribute model
//! (§4.5 "Escape-sequence state machine" / "Cursor rendering" / "Scroll
//! region"), grounded on `original_source/kernel/kernel/console.c`'s
//! state-numbered `console_write` loop (states 0 Ground, 1 ESC, 2/3 CSI
//! param collection, 4 CSI final, 5/6 G0/G1 charset select, 7 OSC).
//!
//! This crate models the state machine and the cell-attribute/cursor
//! bookkeeping; actual pixel/VGA-memory writes are left to a `ConsoleSink`
//! implementation the way the teacher's `fb.c` picks a pixel-format
//! routine once at boot and `console.c` calls through `erase_display`/
//! `erase_line`/`set_attribs` function pointers rather than inlining them.

use crate::tty::Tty;

pub const NPAR: usize = 16;

/// Maximum parameter value a single CSI digit run accumulates to before
/// saturating (guards against a pathological input overflowing `u32`).
const PAR_MAX: u32 = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CsiState {
    Ground,
    Esc,
    CsiEntry,
    CsiParam,
    G0Select,
    G1Select,
    Osc,
}

/// Character sets selectable into `G0`/`G1` via `ESC (` / `ESC )`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    Us,
    Uk,
    Graphics,
}

/// Standard EGA/VGA 4-bit color palette index (foreground or background).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EgaColor {
    Black = 0,
    Red = 1,
    Green = 2,
    Brown = 3,
    Blue = 4,
    Magenta = 5,
    Cyan = 6,
    White = 7,
}

/// The CSI final byte that completed a sequence, surfaced for tests/
/// observability; dispatch itself happens inline in `feed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsiFinal {
    CursorUp,
    CursorDown,
    CursorForward,
    CursorBack,
    CursorNextLine,
    CursorPrevLine,
    CursorColumn,
    CursorRow,
    CursorPosition,
    EraseDisplay,
    EraseLine,
    InsertLines,
    DeleteLines,
    DeleteChars,
    InsertChars,
    SetAttributes,
    DeviceId,
    StatusReport,
    SaveCursor,
    RestoreCursor,
    SetScrollRegion,
    DecPrivateSet,
    DecPrivateReset,
    Unknown(u8),
}

/// Seam for the actual cell writes a sink (EGA text buffer, 8/16/24/32bpp
/// framebuffer glyph renderer, or a test double) performs; the state
/// machine only decides *what* to erase/scroll/write and where the cursor
/// ends up.
pub trait ConsoleSink {
    fn cols(&self) -> u16;
    fn rows(&self) -> u16;
    /// Fill `[row, col_start..col_end)` with blanks using the current
    /// attribute.
    fn erase_run(&mut self, row: u16, col_start: u16, col_end: u16);
    /// Scroll the region `[top, bottom)` up or down by `lines`, filling
    /// the vacated rows with blanks.
    fn scroll_region(&mut self, top: u16, bottom: u16, lines: i32);
    fn insert_blank_lines(&mut self, top: u16, bottom: u16, count: u16);
    fn delete_lines(&mut self, top: u16, bottom: u16, count: u16);
    fn insert_blank_chars(&mut self, row: u16, col: u16, count: u16);
    fn delete_chars(&mut self, row: u16, col: u16, count: u16);
    /// Render a single printable byte at the cursor with the current
    /// attribute/color, per the active charset.
    fn putc(&mut self, row: u16, col: u16, byte: u8, charset: Charset, color: u8, attribs: u8);
    /// Reply bytes a status/device-id query writes back into the tty's own
    /// `read_q`, as if typed by the "remote" end.
    fn reply(&mut self, bytes: &[u8]);
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Attrib: u8 {
        const BOLD        = 0x01;
        const BRIGHT_FG   = 0x02;
        const UNDERLINE   = 0x04;
        const BRIGHT_BG   = 0x08;
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ConsoleFlags: u16 {
        const REVERSE_VIDEO   = 0x0001;
        const CURSOR_RELATIVE = 0x0002; // DECOM
        const AUTOWRAP        = 0x0004;
        const LFNL            = 0x0008; // DEC private mode 20
        const APP_KEYMODE     = 0x0010;
        const CURSOR_ENABLED  = 0x0020;
    }
}

#[derive(Debug, Clone, Copy)]
struct SavedCursor {
    row: u16,
    col: u16,
    color: u8,
    attribs: Attrib,
}

/// Console state machine instance: one per tty that has console semantics
/// (the framebuffer/EGA text consoles, not ptys).
pub struct Console {
    state: CsiState,
    par: [u32; NPAR],
    npar: usize,
    csi_ignore: bool,
    pub g: [Charset; 2],
    pub gl: usize, // 0 or 1: which of g[] is active
    pub color: u8,
    pub default_color: u8,
    pub attribs: Attrib,
    pub flags: ConsoleFlags,
    saved: Option<SavedCursor>,
}

impl Console {
    pub fn new(default_color: u8) -> Self {
        Console {
            state: CsiState::Ground,
            par: [0; NPAR],
            npar: 0,
            csi_ignore: false,
            g: [Charset::Us, Charset::Us],
            gl: 0,
            color: default_color,
            default_color,
            attribs: Attrib::empty(),
            flags: ConsoleFlags::AUTOWRAP | ConsoleFlags::CURSOR_ENABLED,
            saved: None,
        }
    }

    fn set_col(&self, tty: &mut Tty, sink: &impl ConsoleSink, col: u16) {
        tty.col = col.min(sink.cols().saturating_sub(1));
    }

    fn set_row(&self, tty: &mut Tty, row: i32) {
        let top = if self.flags.contains(ConsoleFlags::CURSOR_RELATIVE) {
            tty.scroll_top as i32 - 1
        } else {
            0
        };
        let clamped = row.max(top).min((tty.scroll_bottom as i32) - 1);
        tty.row = clamped.max(0) as u16;
    }

    /// Feed one output byte through the state machine, writing through
    /// `sink` as needed. Returns the CSI final dispatched, if this byte
    /// completed one (purely for observability/testing).
    pub fn feed(&mut self, tty: &mut Tty, sink: &mut impl ConsoleSink, c: u8) -> Option<CsiFinal> {
        match self.state {
            CsiState::Ground => self.feed_ground(tty, sink, c),
            CsiState::Esc => self.feed_esc(tty, sink, c),
            CsiState::CsiEntry => self.feed_csi_entry(c),
            CsiState::CsiParam => self.feed_csi_param(tty, sink, c),
            CsiState::G0Select => {
                self.g[0] = charset_for(c);
                self.state = CsiState::Ground;
                None
            }
            CsiState::G1Select => {
                self.g[1] = charset_for(c);
                self.state = CsiState::Ground;
                None
            }
            CsiState::Osc => {
                if c == 0x07 {
                    self.state = CsiState::Ground;
                }
                None
            }
        }
    }

    fn feed_ground(&mut self, tty: &mut Tty, sink: &mut impl ConsoleSink, c: u8) -> Option<CsiFinal> {
        match c {
            0x1b => self.state = CsiState::Esc,
            b'\n' => self.newline(tty, sink),
            b'\r' => tty.col = 0,
            0x08 => {
                if tty.col > 0 {
                    tty.col -= 1;
                }
            }
            _ => {
                let charset = self.g[self.gl];
                sink.putc(tty.row, tty.col, c, charset, self.effective_color(), self.attribs.bits());
                tty.col += 1;
                if tty.col >= sink.cols() {
                    if self.flags.contains(ConsoleFlags::AUTOWRAP) {
                        tty.col = 0;
                        self.newline(tty, sink);
                    } else {
                        tty.col = sink.cols() - 1;
                    }
                }
            }
        }
        None
    }

    fn newline(&mut self, tty: &mut Tty, sink: &mut impl ConsoleSink) {
        if tty.row + 1 >= tty.scroll_bottom {
            sink.scroll_region(tty.scroll_top, tty.scroll_bottom, 1);
        } else {
            tty.row += 1;
        }
    }

    fn effective_color(&self) -> u8 {
        if self.flags.contains(ConsoleFlags::REVERSE_VIDEO) {
            (self.color << 4) | (self.color >> 4)
        } else {
            self.color
        }
    }

    fn feed_esc(&mut self, tty: &mut Tty, sink: &mut impl ConsoleSink, c: u8) -> Option<CsiFinal> {
        self.state = CsiState::Ground;
        match c {
            b'[' => self.state = CsiState::CsiEntry,
            b'(' => self.state = CsiState::G0Select,
            b')' => self.state = CsiState::G1Select,
            b']' => self.state = CsiState::Osc,
            b'c' => *self = Console::new(self.default_color),
            b'D' => self.newline(tty, sink),
            b'E' => {
                tty.col = 0;
                self.newline(tty, sink);
            }
            b'M' => {
                if tty.row >= tty.scroll_top {
                    tty.row -= 1;
                } else {
                    sink.scroll_region(tty.scroll_top, tty.scroll_bottom, -1);
                }
            }
            b'Z' => sink.reply(b"\x1b[?6c"),
            b'7' => {
                self.saved = Some(SavedCursor { row: tty.row, col: tty.col, color: self.color, attribs: self.attribs });
            }
            b'8' => {
                if let Some(s) = self.saved {
                    tty.row = s.row;
                    tty.col = s.col;
                    self.color = s.color;
                    self.attribs = s.attribs;
                }
            }
            b'>' => self.flags.remove(ConsoleFlags::APP_KEYMODE),
            b'=' => self.flags.insert(ConsoleFlags::APP_KEYMODE),
            _ => {}
        }
        None
    }

    fn feed_csi_entry(&mut self, c: u8) -> Option<CsiFinal> {
        self.par = [0; NPAR];
        self.npar = 0;
        self.csi_ignore = c == b'[';
        self.state = CsiState::CsiParam;
        if self.csi_ignore || c == b'?' {
            return None;
        }
        self.accumulate_or_finalize(c)
    }

    fn feed_csi_param(&mut self, tty: &mut Tty, sink: &mut impl ConsoleSink, c: u8) -> Option<CsiFinal> {
        if self.csi_ignore {
            self.state = CsiState::Ground;
            self.csi_ignore = false;
            return None;
        }
        match self.accumulate_or_finalize(c) {
            Some(()) => None,
            None => {
                self.state = CsiState::Ground;
                Some(self.dispatch_csi(tty, sink, c))
            }
        }
    }

    /// Returns `Some(())` while still accumulating parameters, `None` once
    /// `c` is the final byte to dispatch on.
    fn accumulate_or_finalize(&mut self, c: u8) -> Option<()> {
        if c == b';' && self.npar < NPAR - 1 {
            self.npar += 1;
            Some(())
        } else if c.is_ascii_digit() {
            let slot = &mut self.par[self.npar];
            *slot = (*slot * 10 + (c - b'0') as u32).min(PAR_MAX);
            Some(())
        } else {
            None
        }
    }

    fn dispatch_csi(&mut self, tty: &mut Tty, sink: &mut impl ConsoleSink, c: u8) -> CsiFinal {
        let p0 = self.par[0];
        match c {
            b'F' => {
                tty.col = 0;
                self.set_row(tty, tty.row as i32 - p0.max(1) as i32);
                CsiFinal::CursorUp
            }
            b'A' => {
                self.set_row(tty, tty.row as i32 - p0.max(1) as i32);
                CsiFinal::CursorUp
            }
            b'E' => {
                tty.col = 0;
                self.set_row(tty, tty.row as i32 + p0.max(1) as i32);
                CsiFinal::CursorDown
            }
            b'B' | b'e' => {
                self.set_row(tty, tty.row as i32 + p0.max(1) as i32);
                CsiFinal::CursorDown
            }
            b'C' | b'a' => {
                self.set_col(tty, sink, tty.col + p0.max(1) as u16);
                CsiFinal::CursorForward
            }
            b'D' => {
                let back = p0.max(1) as u16;
                self.set_col(tty, sink, tty.col.saturating_sub(back));
                CsiFinal::CursorBack
            }
            b'`' | b'G' => {
                let col = if p0 > 0 { p0 - 1 } else { 0 };
                self.set_col(tty, sink, col as u16);
                CsiFinal::CursorColumn
            }
            b'd' => {
                let row = if p0 > 0 { p0 - 1 } else { 0 };
                self.set_row(tty, row as i32);
                CsiFinal::CursorRow
            }
            b'H' | b'f' => {
                let row = if p0 > 0 { p0 - 1 } else { 0 };
                let col = if self.par[1] > 0 { self.par[1] - 1 } else { 0 };
                self.set_row(tty, row as i32);
                self.set_col(tty, sink, col as u16);
                CsiFinal::CursorPosition
            }
            b'J' => {
                erase_display(tty, sink, p0);
                CsiFinal::EraseDisplay
            }
            b'K' => {
                erase_line(tty, sink, p0);
                CsiFinal::EraseLine
            }
            b'L' => {
                sink.insert_blank_lines(tty.row, tty.scroll_bottom, p0 as u16);
                CsiFinal::InsertLines
            }
            b'M' => {
                sink.delete_lines(tty.row, tty.scroll_bottom, p0 as u16);
                CsiFinal::DeleteLines
            }
            b'X' | b'P' => {
                sink.delete_chars(tty.row, tty.col, p0 as u16);
                CsiFinal::DeleteChars
            }
            b'@' => {
                sink.insert_blank_chars(tty.row, tty.col, p0 as u16);
                CsiFinal::InsertChars
            }
            b'm' => {
                set_attribs(self, &self.par.clone(), self.npar + 1);
                CsiFinal::SetAttributes
            }
            b'c' => {
                sink.reply(b"\x1b[?6c");
                CsiFinal::DeviceId
            }
            b'n' => {
                match p0 {
                    5 => sink.reply(b"\x1b[0n"),
                    6 => sink.reply(alloc::format!("\x1b[{};{}R", tty.row + 1, tty.col + 1).as_bytes()),
                    _ => {}
                }
                CsiFinal::StatusReport
            }
            b's' => {
                self.saved = Some(SavedCursor { row: tty.row, col: tty.col, color: self.color, attribs: self.attribs });
                CsiFinal::SaveCursor
            }
            b'u' => {
                if let Some(s) = self.saved {
                    tty.row = s.row;
                    tty.col = s.col;
                    self.color = s.color;
                    self.attribs = s.attribs;
                }
                CsiFinal::RestoreCursor
            }
            b'r' => {
                let top = if p0 > 0 { p0 as u16 } else { 1 };
                let bottom = if self.par[1] > 0 { self.par[1] as u16 } else { sink.rows() };
                tty.scroll_top = top;
                tty.scroll_bottom = bottom;
                tty.row = tty.scroll_top - 1;
                tty.col = 0;
                CsiFinal::SetScrollRegion
            }
            b'h' => {
                handle_dec_sequence(self, p0, true);
                CsiFinal::DecPrivateSet
            }
            b'l' => {
                handle_dec_sequence(self, p0, false);
                CsiFinal::DecPrivateReset
            }
            other => CsiFinal::Unknown(other),
        }
    }
}

fn charset_for(c: u8) -> Charset {
    match c {
        b'B' => Charset::Us,
        b'U' => Charset::Uk,
        b'0' | b'K' => Charset::Graphics,
        _ => Charset::Us,
    }
}

/// `erase_display`: `0` cursor→end, `1` start→cursor, `2`/`3` whole screen.
fn erase_display(tty: &mut Tty, sink: &mut impl ConsoleSink, cmd: u32) {
    let rows = sink.rows();
    match cmd {
        0 => {
            sink.erase_run(tty.row, tty.col, sink.cols());
            for r in (tty.row + 1)..rows {
                sink.erase_run(r, 0, sink.cols());
            }
        }
        1 => {
            for r in 0..tty.row {
                sink.erase_run(r, 0, sink.cols());
            }
            sink.erase_run(tty.row, 0, tty.col + 1);
        }
        2 | 3 => {
            for r in 0..rows {
                sink.erase_run(r, 0, sink.cols());
            }
        }
        _ => {}
    }
}

/// `erase_line`: `0` cursor→EOL, `1` start-of-line→cursor, `2` whole line.
fn erase_line(tty: &mut Tty, sink: &mut impl ConsoleSink, cmd: u32) {
    match cmd {
        0 => sink.erase_run(tty.row, tty.col, sink.cols()),
        1 => sink.erase_run(tty.row, 0, tty.col + 1),
        2 => sink.erase_run(tty.row, 0, sink.cols()),
        _ => {}
    }
}

/// `set_attribs` (SGR): a subset of the full VT100 table covering reset,
/// bold/bright/underline/blink(as-bright-bg)/reverse and the 8+8 basic
/// foreground/background colors plus their `9x`/`10x` bright aliases.
fn set_attribs(con: &mut Console, par: &[u32; NPAR], count: usize) {
    for &p in &par[..count.min(NPAR)] {
        match p {
            0 => {
                con.color = con.default_color;
                con.attribs = Attrib::empty();
                con.flags.remove(ConsoleFlags::REVERSE_VIDEO);
            }
            1 => con.attribs.insert(Attrib::BOLD),
            2 => con.attribs.insert(Attrib::BRIGHT_FG),
            4 | 21 => con.attribs.insert(Attrib::UNDERLINE),
            5 => con.attribs.insert(Attrib::BRIGHT_BG),
            7 => con.flags.insert(ConsoleFlags::REVERSE_VIDEO),
            22 => con.attribs.remove(Attrib::BOLD | Attrib::BRIGHT_FG | Attrib::BRIGHT_BG),
            24 => con.attribs.remove(Attrib::UNDERLINE),
            25 => con.attribs.remove(Attrib::BRIGHT_BG),
            27 => con.flags.remove(ConsoleFlags::REVERSE_VIDEO),
            30..=37 => con.color = (con.color & 0xf0) | (p - 30) as u8,
            38 | 39 => con.color = (con.color & 0xf0) | (con.default_color & 0x0f),
            40..=47 => con.color = (con.color & 0x0f) | (((p - 40) as u8) << 4),
            49 => con.color = (con.color & 0x0f) | (con.default_color & 0xf0),
            90..=97 => con.color = (con.color & 0xf0) | (p - 90) as u8 | 0x08,
            100..=107 => con.color = (con.color & 0x0f) | ((((p - 100) as u8) | 0x08) << 4),
            _ => {}
        }
    }
}

/// DEC private mode set/reset (`CSI ? n h` / `CSI ? n l`), for the modes
/// this spec names: 1 (unused by this workspace, accepted and ignored),
/// 5 reverse video, 6 DECOM (cursor-relative), 7 autowrap, 20 LFNL, 25
/// cursor visibility.
fn handle_dec_sequence(con: &mut Console, cmd: u32, set: bool) {
    let flag = match cmd {
        5 => Some(ConsoleFlags::REVERSE_VIDEO),
        6 => Some(ConsoleFlags::CURSOR_RELATIVE),
        7 => Some(ConsoleFlags::AUTOWRAP),
        20 => Some(ConsoleFlags::LFNL),
        25 => Some(ConsoleFlags::CURSOR_ENABLED),
        _ => None,
    };
    if let Some(flag) = flag {
        if set {
            con.flags.insert(flag);
        } else {
            con.flags.remove(flag);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    struct FakeSink {
        cols: u16,
        rows: u16,
        erased: Vec<(u16, u16, u16)>,
        scrolled: Vec<(u16, u16, i32)>,
        replies: Vec<u8>,
        chars: Vec<(u16, u16, u8)>,
    }

    impl FakeSink {
        fn new(cols: u16, rows: u16) -> Self {
            FakeSink { cols, rows, erased: Vec::new(), scrolled: Vec::new(), replies: Vec::new(), chars: Vec::new() }
        }
    }

    impl ConsoleSink for FakeSink {
        fn cols(&self) -> u16 {
            self.cols
        }
        fn rows(&self) -> u16 {
            self.rows
        }
        fn erase_run(&mut self, row: u16, col_start: u16, col_end: u16) {
            self.erased.push((row, col_start, col_end));
        }
        fn scroll_region(&mut self, top: u16, bottom: u16, lines: i32) {
            self.scrolled.push((top, bottom, lines));
        }
        fn insert_blank_lines(&mut self, _top: u16, _bottom: u16, _count: u16) {}
        fn delete_lines(&mut self, _top: u16, _bottom: u16, _count: u16) {}
        fn insert_blank_chars(&mut self, _row: u16, _col: u16, _count: u16) {}
        fn delete_chars(&mut self, _row: u16, _col: u16, _count: u16) {}
        fn putc(&mut self, row: u16, col: u16, byte: u8, _charset: Charset, _color: u8, _attribs: u8) {
            self.chars.push((row, col, byte));
        }
        fn reply(&mut self, bytes: &[u8]) {
            self.replies.extend_from_slice(bytes);
        }
    }

    fn feed_str(con: &mut Console, tty: &mut Tty, sink: &mut FakeSink, s: &[u8]) -> Option<CsiFinal> {
        let mut last = None;
        for &b in s {
            last = con.feed(tty, sink, b).or(last);
        }
        last
    }

    #[test]
    fn plain_text_advances_cursor_and_writes_cells() {
        let mut con = Console::new(0x07);
        let mut tty = Tty::new();
        let mut sink = FakeSink::new(80, 25);
        feed_str(&mut con, &mut tty, &mut sink, b"hi");
        assert_eq!(tty.col, 2);
        assert_eq!(sink.chars, alloc::vec![(0, 0, b'h'), (0, 1, b'i')]);
    }

    #[test]
    fn csi_cursor_position_is_one_based_and_clamped() {
        let mut con = Console::new(0x07);
        let mut tty = Tty::new();
        let mut sink = FakeSink::new(80, 25);
        let last = feed_str(&mut con, &mut tty, &mut sink, b"\x1b[5;10H");
        assert_eq!(last, Some(CsiFinal::CursorPosition));
        assert_eq!(tty.row, 4);
        assert_eq!(tty.col, 9);
    }

    #[test]
    fn csi_erase_display_whole_screen() {
        let mut con = Console::new(0x07);
        let mut tty = Tty::new();
        let mut sink = FakeSink::new(80, 25);
        let last = feed_str(&mut con, &mut tty, &mut sink, b"\x1b[2J");
        assert_eq!(last, Some(CsiFinal::EraseDisplay));
        assert_eq!(sink.erased.len(), 25);
    }

    #[test]
    fn csi_sgr_sets_colors_and_resets() {
        let mut con = Console::new(0x07);
        let mut tty = Tty::new();
        let mut sink = FakeSink::new(80, 25);
        feed_str(&mut con, &mut tty, &mut sink, b"\x1b[31;44m");
        assert_eq!(con.color & 0x0f, 1); // red fg
        assert_eq!((con.color >> 4) & 0x0f, 4); // blue bg
        feed_str(&mut con, &mut tty, &mut sink, b"\x1b[0m");
        assert_eq!(con.color, con.default_color);
    }

    #[test]
    fn status_report_5n_replies_terminal_ok() {
        let mut con = Console::new(0x07);
        let mut tty = Tty::new();
        let mut sink = FakeSink::new(80, 25);
        feed_str(&mut con, &mut tty, &mut sink, b"\x1b[5n");
        assert_eq!(sink.replies, b"\x1b[0n");
    }

    #[test]
    fn decset_decom_shifts_row_origin_into_scroll_region() {
        let mut con = Console::new(0x07);
        let mut tty = Tty::new();
        let mut sink = FakeSink::new(80, 25);
        tty.scroll_top = 5;
        tty.scroll_bottom = 20;
        feed_str(&mut con, &mut tty, &mut sink, b"\x1b[?6h"); // DECOM on... but '?' is discarded, so mode read is '6'
        feed_str(&mut con, &mut tty, &mut sink, b"\x1b[0d"); // move to row 0 (1-based 0 -> clamped to 0 -> +relative)
        assert_eq!(tty.row as i32, tty.scroll_top as i32 - 1);
    }

    #[test]
    fn newline_at_bottom_of_scroll_region_scrolls_instead_of_overrunning() {
        let mut con = Console::new(0x07);
        let mut tty = Tty::new();
        let mut sink = FakeSink::new(80, 25);
        tty.scroll_top = 1;
        tty.scroll_bottom = 25;
        tty.row = 24;
        con.feed(&mut tty, &mut sink, b'\n');
        assert_eq!(tty.row, 24);
        assert_eq!(sink.scrolled, alloc::vec![(1, 25, 1)]);
    }

    #[test]
    fn save_and_restore_cursor() {
        let mut con = Console::new(0x07);
        let mut tty = Tty::new();
        let mut sink = FakeSink::new(80, 25);
        tty.row = 3;
        tty.col = 7;
        feed_str(&mut con, &mut tty, &mut sink, b"\x1b7");
        tty.row = 10;
        tty.col = 0;
        feed_str(&mut con, &mut tty, &mut sink, b"\x1b8");
        assert_eq!((tty.row, tty.col), (3, 7));
    }
}
