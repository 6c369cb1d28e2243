use crate::vga;

pub fn run(_args: &str) {
    vga::init();
}
