//! Command-line interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Compile designer tables into typed Rust code and binary snapshots.
#[derive(Parser, Debug)]
#[command(name = "tabula", version, about, long_about = None)]
pub struct Args {
    /// Project configuration file (defaults to ./tabula.toml when present)
    #[arg(short, long, value_name = "FILE", env = "TABULA_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// More log output; repeat for trace level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the schema and key chain of every table
    Schema {
        /// Print the schemas as JSON
        #[arg(long)]
        json: bool,
    },

    /// Emit the generated module and rebuild the host
    Generate {
        /// Do not run the rebuild command; the host is rebuilt out of band
        #[arg(long)]
        no_rebuild: bool,
    },

    /// Show whether a generation is waiting for its resume step
    Status,

    /// Drop a pending generation
    Clear,

    /// Print the header of a snapshot file
    Inspect {
        /// Snapshot to read (defaults to the configured snapshot path)
        snapshot: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn args_are_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let args = Args::parse_from(["tabula", "generate", "--no-rebuild", "-vv", "-c", "x.toml"]);
        assert_eq!(args.verbose, 2);
        assert_eq!(args.config, Some(PathBuf::from("x.toml")));
        assert!(matches!(args.command, Command::Generate { no_rebuild: true }));
    }
}
