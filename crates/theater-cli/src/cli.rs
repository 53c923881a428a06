//! CLI argument parsing with clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use theater_core::FileKey;
use theater_core::source::path;

/// theater - browse, inspect and export theater replay folders
#[derive(Parser, Debug)]
#[command(name = "theater", version, about = "Browse, inspect and export theater replay folders")]
pub struct Cli {
    /// Override the theater home directory (default: $THEATER_HOME or ~/.theater)
    #[arg(long, value_name = "DIR", global = true)]
    pub home: Option<PathBuf>,

    /// Log debug diagnostics to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Choose the replay folder. A directory is remembered for later runs
    Pick {
        /// Folder whose subfolders are games
        #[arg(
            value_name = "DIR",
            required_unless_present = "files_from",
            conflicts_with = "files_from"
        )]
        dir: Option<PathBuf>,

        #[command(flatten)]
        list: FileListArgs,
    },

    /// Reopen the remembered folder and report the outcome
    Restore,

    /// List games and their theater files
    List {
        #[command(flatten)]
        list: FileListArgs,
    },

    /// Read metadata from every theater file
    Inspect {
        /// Only this game
        #[arg(long, value_name = "GAME")]
        game: Option<String>,

        #[command(flatten)]
        list: FileListArgs,
    },

    /// Export theater files with a meta.json manifest into a zip archive
    Export {
        /// Export every file of this game, or resolve --file paths inside it
        #[arg(long, value_name = "GAME")]
        game: Option<String>,

        /// File to export as GAME/RELATIVE_PATH (or RELATIVE_PATH with --game); repeatable
        #[arg(long = "file", value_name = "PATH")]
        files: Vec<String>,

        /// Replace the user-identifying tail of session names in the manifest
        #[arg(long)]
        strip_pii: bool,

        /// Archive file name (default: archive.zip)
        #[arg(long, value_name = "NAME")]
        name: Option<String>,

        /// Output directory (default: export_dir from config, else current directory)
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,

        #[command(flatten)]
        list: FileListArgs,
    },

    /// Zip every file under the folder, theater files or not
    Backup {
        /// Archive file name (default: backup.zip)
        #[arg(long, value_name = "NAME")]
        name: Option<String>,

        /// Output directory (default: export_dir from config, else current directory)
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,

        #[command(flatten)]
        list: FileListArgs,
    },

    /// Forget the remembered folder
    Forget,
}

impl Command {
    /// The flat-list selection this command carries, if any.
    pub fn file_list(&self) -> Option<&FileListArgs> {
        let list = match self {
            Command::Pick { list, .. }
            | Command::List { list }
            | Command::Inspect { list, .. }
            | Command::Export { list, .. }
            | Command::Backup { list, .. } => list,
            Command::Restore | Command::Forget => return None,
        };
        list.files_from.is_some().then_some(list)
    }
}

/// Use a pre-enumerated file list instead of a directory. Never remembered.
#[derive(Args, Debug, Default, Clone)]
pub struct FileListArgs {
    /// File holding one relative path per line ('-' for stdin)
    #[arg(long, value_name = "LIST")]
    pub files_from: Option<PathBuf>,

    /// Folder the listed paths are relative to (default: current directory)
    #[arg(long, value_name = "DIR", requires = "files_from")]
    pub base: Option<PathBuf>,
}

/// Turn `--file` arguments into file keys.
///
/// With a game, each path is relative to it. Without one, the first path
/// segment names the game. Paths with no relative part are rejected.
pub fn file_keys(game: Option<&str>, files: &[String]) -> Result<Vec<FileKey>, String> {
    files
        .iter()
        .map(|raw| {
            let parts = path::segments(raw);
            let (game_name, rest) = match game {
                Some(g) => (g, &parts[..]),
                None => match parts.split_first() {
                    Some((g, rest)) => (*g, rest),
                    None => return Err(format!("empty file path: {:?}", raw)),
                },
            };
            if rest.is_empty() {
                return Err(format!("expected GAME/RELATIVE_PATH, got {:?}", raw));
            }
            Ok(FileKey::new(game_name, rest.join("/")))
        })
        .collect()
}

/// Parse a file list: one path per line, blank lines and `#` comments skipped.
pub fn parse_file_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}
