//! Rover CLI Library
//!
//! Command-line interface over the rover crates:
//!
//! - **Hint sniffing**: infer the format of a local delimited file
//!   (`rover sniff`)
//! - **Directory copy**: move a directory of files between stores,
//!   taking an optimized route when one applies (`rover copy`)

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Rover - move delimited data between filesystems and object stores
#[derive(Parser, Debug)]
#[command(name = "rover")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Infer the format of a local delimited file
    Sniff {
        /// File to inspect
        path: PathBuf,

        /// A known hint, as name=value (repeatable). Values parse as
        /// JSON where possible, so `header-row=false` is a boolean and
        /// `field-delimiter=,` is a string.
        #[arg(long = "hint", value_name = "NAME=VALUE")]
        hints: Vec<String>,
    },

    /// Copy a directory of files between stores
    Copy {
        /// Source directory URL (file://, s3://, gs://, or a bare path)
        source: String,

        /// Destination directory URL
        dest: String,
    },
}
