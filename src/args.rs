use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Stage, filter and compress the release archive
    Build,
    /// Remove the archive and any staging leftovers
    Clean,
}

/// Command-line arguments for relpack
#[derive(Debug)]
pub struct Args {
    pub action: Action,

    /// Enable verbose output
    pub verbose: bool,

    /// Project root (defaults to the current directory)
    pub path: Option<PathBuf>,
}

impl Args {
    /// Parse command-line arguments
    pub fn parse() -> Self {
        Self::from_matches(&command().get_matches())
    }

    fn from_matches(matches: &clap::ArgMatches) -> Self {
        let action = match matches.subcommand_name() {
            Some("clean") => Action::Clean,
            _ => Action::Build,
        };

        Self {
            action,
            verbose: matches.get_flag("verbose"),
            path: matches.get_one::<String>("path").map(PathBuf::from),
        }
    }
}

fn command() -> Command {
    Command::new("relpack")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Package a project's distributable files into a release archive")
        .subcommand(Command::new("build").about("Build the release archive (default)"))
        .subcommand(Command::new("clean").about("Remove the release archive and staging leftovers"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .value_name("DIR")
                .env("RELPACK_PATH")
                .global(true)
                .help("Project root directory")
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Enable verbose output")
        )
}
