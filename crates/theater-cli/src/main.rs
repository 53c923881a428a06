// theater-cli: command-line frontend for theater-core
// Argument parsing, folder selection and JSON output

mod cli;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use serde::Serialize;
use serde_json::json;

use cli::{Cli, Command, FileListArgs};
use theater_core::host::FolderPicker;
use theater_core::host::local::LocalPicker;
use theater_core::{
    CapabilityStore, Config, FileKey, RestoreOutcome, Result, SqliteStore, TheaterError,
    TheaterFs, build_manifest, catalog, config,
};

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Build the picker for this invocation.
///
/// A `pick <DIR>` grants that directory. A file list behaves like a host
/// without directory handles. Everything else can only restore.
fn picker_for(command: &Command) -> Result<Arc<dyn FolderPicker>> {
    if let Some(list) = command.file_list() {
        return Ok(Arc::new(file_list_picker(list)?));
    }
    if let Command::Pick { dir: Some(dir), .. } = command {
        return Ok(Arc::new(LocalPicker::directory(dir)));
    }
    Ok(Arc::new(LocalPicker::restore_only()))
}

fn file_list_picker(list: &FileListArgs) -> Result<LocalPicker> {
    let content = match list.files_from.as_deref() {
        Some(path) if path == Path::new("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
        Some(path) => std::fs::read_to_string(path)?,
        None => String::new(),
    };
    let base = match &list.base {
        Some(base) => base.clone(),
        None => std::env::current_dir()?,
    };
    Ok(LocalPicker::file_list(base, cli::parse_file_list(&content)))
}

/// Make a root active: pick the file list if one was given, otherwise
/// restore the remembered folder.
async fn activate(fs: &mut TheaterFs, command: &Command, config: &Config) -> Result<()> {
    if command.file_list().is_some() {
        fs.pick_root().await?;
        return Ok(());
    }
    match fs.try_restore(config.auto_request_permission).await {
        RestoreOutcome::Restored { .. } => Ok(()),
        RestoreOutcome::NotRestored {
            reason,
            folder_name,
        } => {
            log::warn!(
                "could not reopen {}: {}",
                folder_name.as_deref().unwrap_or("saved folder"),
                reason
            );
            Err(TheaterError::NoFolderSelected)
        }
    }
}

fn output_dir(out: Option<&Path>, config: &Config) -> Result<PathBuf> {
    match out.or(config.export_dir.as_deref()) {
        Some(dir) => Ok(dir.to_path_buf()),
        None => Ok(std::env::current_dir()?),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let home = config::resolve_home(cli.home.clone())?;
    let config = Config::load(&home)?;
    let store = CapabilityStore::new(Arc::new(SqliteStore::new(config::handles_db_path(&home))));
    let mut fs = TheaterFs::new(picker_for(&cli.command)?, store, config.extensions());

    let result = execute(&mut fs, &cli.command, &config).await;
    // a pick's capability save runs in the background
    fs.flush().await;
    result
}

async fn execute(fs: &mut TheaterFs, command: &Command, config: &Config) -> Result<()> {
    match command {
        Command::Pick { .. } => {
            let outcome = fs.pick_root().await?;
            print_json(&outcome)
        }
        Command::Restore => {
            let outcome = fs.try_restore(config.auto_request_permission).await;
            print_json(&outcome)
        }
        Command::List { .. } => {
            activate(fs, command, config).await?;
            print_json(&fs.list_games().await?)
        }
        Command::Inspect { game, .. } => {
            activate(fs, command, config).await?;
            let mut games = fs.list_games().await?;
            if let Some(game) = game {
                games.retain(|g| &g.name == game);
            }
            let rows =
                catalog::inspect_games(fs.source()?, &games, &config.inspect_options()).await;
            print_json(&rows)
        }
        Command::Export {
            game,
            files,
            strip_pii,
            name,
            out,
            ..
        } => {
            activate(fs, command, config).await?;
            let keys: Vec<FileKey> = if files.is_empty() {
                fs.list_games()
                    .await?
                    .into_iter()
                    .filter(|g| game.as_ref().is_none_or(|want| &g.name == want))
                    .flat_map(|g| {
                        let name = g.name;
                        g.files
                            .into_iter()
                            .map(move |f| FileKey::new(name.clone(), f))
                    })
                    .collect()
            } else {
                cli::file_keys(game.as_deref(), files).map_err(TheaterError::NotFound)?
            };

            let rows =
                catalog::inspect_entries(fs.source()?, &keys, &config.inspect_options()).await;
            let manifest = build_manifest(&rows, *strip_pii || config.strip_pii);
            let dir = output_dir(out.as_deref(), config)?;
            let archive = fs
                .build_selected_archive(&keys, &manifest.to_json()?, &dir, name.as_deref())
                .await?;
            print_json(&json!({ "archive": archive, "fileCount": keys.len() }))
        }
        Command::Backup { name, out, .. } => {
            activate(fs, command, config).await?;
            let dir = output_dir(out.as_deref(), config)?;
            let archive = fs.build_full_backup_archive(&dir, name.as_deref()).await?;
            print_json(&json!({ "archive": archive }))
        }
        Command::Forget => {
            fs.clear_selection().await;
            print_json(&json!({ "forgotten": true }))
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("[ERROR] {}", e);
            ExitCode::FAILURE
        }
    }
}
