//! imvault - Encrypted single-file archives for message conversations
//!
//! Usage:
//!   imvault list --store records.json          - List chats in an export
//!   imvault export --store records.json ...    - Build an encrypted .imv
//!   imvault extract <archive> -o <dir>         - Decrypt and unpack
//!   imvault info <archive>                     - Inspect the header

use clap::{Parser, Subcommand};
use imvault::{
    archive::{extract_archive, ArchiveBuilder},
    config::Config,
    crypto::{Header, ImvCipher, HEADER_SIZE},
    store::{JsonRecordStore, RecordStore},
    Error, Result,
};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "imvault")]
#[command(author = "imvault Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Encrypted single-file archives for message conversations")]
struct Cli {
    /// Configuration file path (KDF parameters, chunk size)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List chats available in a record export
    List {
        /// Record export JSON file
        #[arg(long)]
        store: PathBuf,
    },

    /// Build an encrypted archive from selected chats
    Export {
        /// Record export JSON file
        #[arg(long)]
        store: PathBuf,

        /// Output .imv path
        #[arg(short, long)]
        output: PathBuf,

        /// Read the password from a file instead of prompting
        #[arg(long)]
        password_file: Option<PathBuf>,

        /// Chat IDs to include
        #[arg(required = true)]
        chat_ids: Vec<i64>,
    },

    /// Decrypt an archive and extract its contents
    Extract {
        /// Archive .imv path
        archive: PathBuf,

        /// Destination directory
        #[arg(short, long)]
        output: PathBuf,

        /// Read the password from a file instead of prompting
        #[arg(long)]
        password_file: Option<PathBuf>,
    },

    /// Show archive header information (no password required)
    Info {
        /// Archive .imv path
        archive: PathBuf,
    },
}

fn read_password(password_file: Option<&PathBuf>, confirm: bool) -> Result<String> {
    if let Some(path) = password_file {
        let password = std::fs::read_to_string(path)?;
        return Ok(password.trim_end_matches(['\r', '\n']).to_string());
    }

    let password = rpassword::prompt_password("Archive password: ")
        .map_err(|e| Error::Config(format!("could not read password: {}", e)))?;
    if password.is_empty() {
        return Err(Error::Config("password must not be empty".to_string()));
    }
    if confirm {
        let again = rpassword::prompt_password("Confirm password: ")
            .map_err(|e| Error::Config(format!("could not read password: {}", e)))?;
        if password != again {
            return Err(Error::Config("passwords do not match".to_string()));
        }
    }
    Ok(password)
}

fn format_size(size: u64) -> String {
    let mut size = size as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{:.1} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.1} TB", size)
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let cipher = ImvCipher::new(&config)?;

    match cli.command {
        Commands::List { store } => {
            let store = JsonRecordStore::load(&store)?;
            let chats = store.list_chats()?;
            println!("{:>8}  {:>9}  {:<20}  {}", "ID", "MESSAGES", "LAST", "NAME");
            for chat in chats {
                println!(
                    "{:>8}  {:>9}  {:<20}  {}",
                    chat.chat_id,
                    chat.message_count,
                    chat.last_date.as_deref().unwrap_or("-"),
                    chat.display_name
                );
            }
        }

        Commands::Export {
            store,
            output,
            password_file,
            chat_ids,
        } => {
            let store = JsonRecordStore::load(&store)?;
            let password = read_password(password_file.as_ref(), true)?;
            let total = chat_ids.len();

            ArchiveBuilder::new(&store, &cipher, &password, &output, chat_ids)
                .with_progress(|current, _| {
                    eprintln!("  archived chat {}/{}", current, total);
                })
                .build()?;

            let size = std::fs::metadata(&output)?.len();
            println!("Wrote {} ({})", output.display(), format_size(size));
        }

        Commands::Extract {
            archive,
            output,
            password_file,
        } => {
            let password = read_password(password_file.as_ref(), false)?;
            let count = extract_archive(&archive, &password, &output, &cipher)?;
            println!("Extracted {} entries to {}", count, output.display());
        }

        Commands::Info { archive } => {
            let data = std::fs::read(&archive)?;
            let header = Header::parse(&data)?;
            println!("File:    {}", archive.display());
            println!("Size:    {}", format_size(data.len() as u64));
            println!(
                "Version: {} ({})",
                header.version,
                if header.version == 1 {
                    "legacy single block"
                } else {
                    "chunked"
                }
            );
            println!("Body:    {} bytes", data.len() - HEADER_SIZE);
        }
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("failed to set tracing subscriber");

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
