//! Library half of the `remora` binary: subcommand arguments and their execution.

pub mod commands;
