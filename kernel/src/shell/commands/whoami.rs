use crate::println;

pub fn run(_args: &str) {
    println!("root");
}
