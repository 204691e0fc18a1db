use clap::{Args, Subcommand};
use std::path::PathBuf;

use pipeframe_frame::DEFAULT_MAX_PAYLOAD;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod decode;
pub mod echo;
pub mod encode;
pub mod run;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Spawn a child, exchange framed messages with it, then shut it down.
    Run(RunArgs),
    /// Echo framed stdin back to stdout (useful as a child for `run`).
    Echo(EchoArgs),
    /// Print each frame of a framed byte stream.
    Decode(DecodeArgs),
    /// Frame newline-delimited payloads from stdin onto stdout.
    Encode(EncodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Echo(args) => echo::run(args),
        Command::Decode(args) => decode::run(args, format),
        Command::Encode(args) => encode::run(args),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// JSON message to send (repeatable).
    #[arg(long, conflicts_with = "data")]
    pub json: Vec<String>,
    /// Raw string message to send (repeatable).
    #[arg(long, conflicts_with = "json")]
    pub data: Vec<String>,
    /// Shut the child down after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
    /// Shut the child down after this long (e.g. 5s, 500ms).
    #[arg(long)]
    pub timeout: Option<String>,
    /// Largest payload accepted in either direction, in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_PAYLOAD)]
    pub max_payload: usize,
    /// Program to spawn, followed by its arguments.
    #[arg(
        value_name = "PROGRAM",
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub command: Vec<String>,
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Largest payload accepted, in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_PAYLOAD)]
    pub max_payload: usize,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Read frames from a file instead of stdin.
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,
    /// Largest payload accepted, in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_PAYLOAD)]
    pub max_payload: usize,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Require every line to be valid JSON.
    #[arg(long)]
    pub json: bool,
    /// Largest payload accepted, in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_PAYLOAD)]
    pub max_payload: usize,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
