use crate::println;
use crate::shell::state::CWD;

pub fn run(_args: &str) {
    println!("{}", CWD.lock());
}
