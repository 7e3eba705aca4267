//! Keyfile CLI application.
//!
//! This binary creates, inspects and re-encrypts single-keypair keyfiles.
//! Passwords are read from `BT_COLD_PW_<NAME>` environment variables or the
//! terminal, never from the command line.

use clap::{ArgGroup, Args, Parser, Subcommand};
use keyfile::config::KeyfileConfig;
use keyfile::crypto::ed25519::{generate_keypair, Keypair};
use keyfile::crypto::keypair::KeyMaterial;
use keyfile::error::{KeyFileError, Result};
use keyfile::storage::keystore::{KeyStore, Keyfile};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "keyfile")]
#[command(about = "Password-protected keyfile for a single keypair", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show whether a keyfile exists and is encrypted
    Status {
        /// Keyfile path
        #[arg(long)]
        path: PathBuf,
    },

    /// Print the public key and address stored in a keyfile
    Show {
        /// Keyfile path
        #[arg(long)]
        path: PathBuf,
    },

    /// Generate a new mnemonic-backed keypair
    Generate {
        /// Keyfile path
        #[arg(long)]
        path: PathBuf,

        /// Number of mnemonic words
        #[arg(long, default_value = "12")]
        words: usize,

        #[command(flatten)]
        write: WriteArgs,
    },

    /// Store an existing key
    Import {
        /// Keyfile path
        #[arg(long)]
        path: PathBuf,

        #[command(flatten)]
        key: ImportSource,

        #[command(flatten)]
        write: WriteArgs,
    },

    /// Encrypt a plaintext keyfile in place
    Encrypt {
        /// Keyfile path
        #[arg(long)]
        path: PathBuf,
    },

    /// Decrypt an encrypted keyfile in place
    Decrypt {
        /// Keyfile path
        #[arg(long)]
        path: PathBuf,
    },
}

#[derive(Args)]
struct WriteArgs {
    /// Store the keypair unencrypted
    #[arg(long)]
    no_encrypt: bool,

    /// Replace an existing keyfile without asking
    #[arg(long)]
    overwrite: bool,
}

#[derive(Args)]
#[command(group(ArgGroup::new("source").required(true).args(["seed", "mnemonic", "address"])))]
struct ImportSource {
    /// Private seed as hex
    #[arg(long)]
    seed: Option<String>,

    /// Mnemonic phrase
    #[arg(long)]
    mnemonic: Option<String>,

    /// SS58 address (verify-only keypair)
    #[arg(long)]
    address: Option<String>,
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => KeyfileConfig::load(path)?,
        None => KeyfileConfig::default(),
    };

    match cli.command {
        Commands::Status { path } => handle_status(&open(&path, &config)),
        Commands::Show { path } => handle_show(&open(&path, &config)),
        Commands::Generate { path, words, write } => {
            handle_generate(&open(&path, &config), words, &write)
        }
        Commands::Import { path, key, write } => handle_import(&open(&path, &config), key, &write),
        Commands::Encrypt { path } => {
            let keyfile = open(&path, &config);
            keyfile.encrypt(None)?;
            println!("{}", keyfile);
            Ok(())
        }
        Commands::Decrypt { path } => {
            let keyfile = open(&path, &config);
            keyfile.decrypt(None)?;
            println!("{}", keyfile);
            Ok(())
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open(path: &Path, config: &KeyfileConfig) -> Keyfile<Keypair> {
    Keyfile::from_config(path, config)
}

fn handle_status(keyfile: &Keyfile<Keypair>) -> Result<()> {
    println!("{}", keyfile);
    println!("Name: {}", keyfile.name());
    println!("Exists: {}", keyfile.exists());
    println!("Readable: {}", keyfile.is_readable());
    println!("Writable: {}", keyfile.is_writable());
    println!("Encrypted: {}", keyfile.is_encrypted());
    Ok(())
}

fn handle_show(keyfile: &Keyfile<Keypair>) -> Result<()> {
    let keypair = keyfile.get_keypair(None)?;

    println!("Address: {}", keypair.ss58_address().unwrap_or("-"));
    println!("Public key: {}", keypair.public_key_hex().unwrap_or_default());
    println!("Can sign: {}", keypair.can_sign());
    Ok(())
}

fn handle_generate(keyfile: &Keyfile<Keypair>, words: usize, write: &WriteArgs) -> Result<()> {
    let keypair = generate_keypair(words)?;
    keyfile.set_keypair(&keypair, !write.no_encrypt, write.overwrite, None)?;

    println!("Generated keypair in {}", keyfile);
    println!("Address: {}", keypair.ss58_address().unwrap_or("-"));
    if let Some(mnemonic) = keypair.mnemonic() {
        println!();
        println!("Write down this mnemonic; it is the only way to recover the key:");
        println!("{}", mnemonic);
    }
    Ok(())
}

fn handle_import(keyfile: &Keyfile<Keypair>, key: ImportSource, write: &WriteArgs) -> Result<()> {
    let keypair = match (key.seed, key.mnemonic, key.address) {
        (Some(seed), _, _) => Keypair::from_seed_hex(&seed)?,
        (_, Some(mnemonic), _) => Keypair::from_mnemonic(&mnemonic)?,
        (_, _, Some(address)) => Keypair::from_address(&address)?,
        (None, None, None) => {
            return Err(KeyFileError::InvalidKeyError(
                "one of --seed, --mnemonic or --address is required".to_string(),
            ))
        }
    };
    keyfile.set_keypair(&keypair, !write.no_encrypt, write.overwrite, None)?;

    println!("Imported keypair into {}", keyfile);
    println!("Address: {}", keypair.ss58_address().unwrap_or("-"));
    Ok(())
}
