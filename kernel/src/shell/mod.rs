pub mod commands;
pub mod state;

use alloc::string::String;
use alloc::vec::Vec;
use crate::println;

/// Parse input line into command + arguments, then dispatch.
pub fn exec_command(input: &str) {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return;
    }

    // Split by whitespace: first token = command, rest = args
    let parts: Vec<&str> = trimmed.splitn(2, ' ').collect();
    let cmd = parts[0];
    let args = if parts.len() > 1 { parts[1] } else { "" };

    state::log_cmd(trimmed);

    match cmd {
        "echo"        => commands::echo::run(args),
        "ls"          => commands::ls::run(args),
        "cat"         => commands::cat::run(args),
        "clear"       => commands::clear::run(args),
        "help"        => commands::help::run(args),
        "date"        => commands::date::run(args),
        "whoami"      => commands::whoami::run(args),
        "pwd"         => commands::pwd::run(args),
        "uptime"      => commands::uptime::run(args),
        "version"     => commands::version::run(args),
        "neofetch"    => commands::neofetch::run(args),
        "ps"          => commands::ps::run(args),
        "kill"        => commands::kill::run(args),
        "mkdir"       => commands::mkdir::run(args),
        "rm"          => commands::rm::run(args),
        "cp"          => commands::cp::run(args),
        "mv"          => commands::mv::run(args),
        "cd"          => commands::cd::run(args),
        "touch"       => commands::touch::run(args),
        "write"       => commands::write::run(args),
        "catbin"      => commands::catbin::run(args),
        "objdump"     => commands::objdump::run(args),
        "shellscript" => commands::shellscript::run(args),
        "log"         => commands::log::run(args),
        "exec"        => commands::exec::run(args),
        "spawn"       => commands::spawn::run(args),
        "yield"       => commands::yield_cmd::run(args),
        "vfstest"     => commands::vfstest::run(args),
        "atatest"     => commands::atatest::run(args),
        _             => println!("{}: command not found", cmd),
    }
}
