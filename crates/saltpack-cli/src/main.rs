//! saltpack: encrypt, sign, and armor messages from the command line
//!
//! Commands:
//!   keygen [--signing]                      - generate an X25519 (or Ed25519) key pair
//!   encrypt --key <sk> -g <pk,pk> -g <pk>   - encrypt for one or more recipient groups
//!   decrypt --key <sk> [--debug]            - decrypt a message addressed to <sk>
//!   sign --key <sk> [--detached]            - attached or detached Ed25519 signature
//!   verify [--signature <file>]             - check a signature, print the signer
//!   armor / dearmor                         - base62 ASCII armor
//!   efficient <alphabet_size>               - list efficient armor block sizes
//!   config show                             - display current configuration
//!
//! Input is read from stdin (or `--input`) and written to stdout (or `--output`).
//! Logs go to stderr.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracing_subscriber::filter::{Directive, LevelFilter};
use tracing_subscriber::EnvFilter;

use saltpack_core::SaltpackConfig;
use saltpack_crypto::{
    armor, dearmor, decrypt, decrypt_with_observer, efficient_block_sizes, encrypt,
    generate_secret_key, generate_signing_key, sign_attached, sign_detached, verify_attached,
    verify_detached, ArmorOptions, PublicKey, SecretKey, SigningKey, TracingObserver,
};

const KIND_ENCRYPTED: &str = "ENCRYPTED MESSAGE";
const KIND_SIGNED: &str = "SIGNED MESSAGE";
const KIND_DETACHED: &str = "DETACHED SIGNATURE";

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "saltpack",
    version,
    about = "Multi-recipient encryption, signing, and armor",
    long_about = "saltpack: encrypt a message once for many recipients, sign it, and armor it as base62 text"
)]
struct Cli {
    /// Path to config.toml
    #[arg(
        long,
        short = 'c',
        env = "SALTPACK_CONFIG",
        default_value = "~/.config/saltpack/config.toml"
    )]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, env = "SALTPACK_LOG")]
    log: Option<String>,

    /// Log format; overrides the config file
    #[arg(long, env = "SALTPACK_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum, PartialEq)]
enum LogFormat {
    Json,
    Text,
}

impl LogFormat {
    fn from_config(value: &str) -> Self {
        if value == "json" {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

#[derive(Args, Debug)]
struct IoArgs {
    /// Read from this file instead of stdin
    #[arg(long, short = 'i')]
    input: Option<PathBuf>,

    /// Write to this file instead of stdout
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a key pair and print it as hex
    Keygen {
        /// Ed25519 signing key instead of an X25519 encryption key
        #[arg(long)]
        signing: bool,
    },

    /// Encrypt a message for one or more recipient groups
    Encrypt {
        /// Sender's X25519 secret key (hex)
        #[arg(long, short = 'k', env = "SALTPACK_SECRET_KEY", hide_env_values = true)]
        key: String,

        /// Comma-separated recipient public keys (hex). Repeat for each group.
        #[arg(long = "group", short = 'g', required = true)]
        groups: Vec<String>,

        /// Plaintext bytes per chunk (default: from config)
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Emit ASCII armor
        #[arg(long, short = 'a')]
        armor: bool,

        #[command(flatten)]
        io: IoArgs,
    },

    /// Decrypt a message with your secret key
    Decrypt {
        /// Recipient's X25519 secret key (hex)
        #[arg(long, short = 'k', env = "SALTPACK_SECRET_KEY", hide_env_values = true)]
        key: String,

        /// Input is ASCII armored
        #[arg(long, short = 'a')]
        armor: bool,

        /// Log header, key bundle, and chunk details while decrypting
        #[arg(long)]
        debug: bool,

        #[command(flatten)]
        io: IoArgs,
    },

    /// Sign a message
    Sign {
        /// Ed25519 signing key (hex)
        #[arg(long, short = 'k', env = "SALTPACK_SIGNING_KEY", hide_env_values = true)]
        key: String,

        /// Write only the signature, not the message
        #[arg(long)]
        detached: bool,

        /// Message bytes per signed chunk (default: from config)
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Emit ASCII armor
        #[arg(long, short = 'a')]
        armor: bool,

        #[command(flatten)]
        io: IoArgs,
    },

    /// Verify a signature and print the signer's public key
    Verify {
        /// Detached signature file; the input is then the signed message
        #[arg(long, short = 's')]
        signature: Option<PathBuf>,

        /// Signature (and attached message) are ASCII armored
        #[arg(long, short = 'a')]
        armor: bool,

        #[command(flatten)]
        io: IoArgs,
    },

    /// ASCII-armor arbitrary bytes
    Armor {
        /// Label for the BEGIN/END lines
        #[arg(long, default_value = "MESSAGE")]
        kind: String,

        /// Omit the BEGIN/END lines
        #[arg(long)]
        raw: bool,

        #[command(flatten)]
        io: IoArgs,
    },

    /// Decode ASCII armor back to bytes
    Dearmor {
        /// Input has no BEGIN/END lines
        #[arg(long)]
        raw: bool,

        #[command(flatten)]
        io: IoArgs,
    },

    /// List efficient armor block sizes for an alphabet
    Efficient {
        alphabet_size: u32,

        /// Largest block size to consider (exclusive)
        #[arg(long, default_value_t = 50)]
        max: usize,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
}

impl Commands {
    fn wants_debug(&self) -> bool {
        matches!(self, Commands::Decrypt { debug: true, .. })
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = expand_tilde(&cli.config);
    let (config, found) = load_config(&config_path)?;

    let force_debug = cli.command.wants_debug();
    let level = if force_debug {
        "debug".to_string()
    } else {
        cli.log.clone().unwrap_or_else(|| config.logging.level.clone())
    };
    let format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| LogFormat::from_config(&config.logging.format));
    init_logging(&level, &format, force_debug)?;

    if !found {
        warn!(
            "config file not found: {}  (using defaults)",
            config_path.display()
        );
    }
    debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        "saltpack starting"
    );

    match cli.command {
        Commands::Keygen { signing } => cmd_keygen(signing),
        Commands::Encrypt { key, groups, chunk_size, armor, io } => {
            cmd_encrypt(&config, &key, &groups, chunk_size, armor, &io)
        }
        Commands::Decrypt { key, armor, debug, io } => cmd_decrypt(&config, &key, armor, debug, &io),
        Commands::Sign { key, detached, chunk_size, armor, io } => {
            cmd_sign(&config, &key, detached, chunk_size, armor, &io)
        }
        Commands::Verify { signature, armor, io } => {
            cmd_verify(&config, signature.as_deref(), armor, &io)
        }
        Commands::Armor { kind, raw, io } => cmd_armor(&config, &kind, raw, &io),
        Commands::Dearmor { raw, io } => cmd_dearmor(&config, raw, &io),
        Commands::Efficient { alphabet_size, max } => cmd_efficient(alphabet_size, max),
        Commands::Config { action: ConfigAction::Show } => {
            cmd_config_show(&config, &config_path, found)
        }
    }
}

// ── Config loading and logging ────────────────────────────────────────────────

/// Load the config file, reporting whether it existed.
fn load_config(path: &Path) -> Result<(SaltpackConfig, bool)> {
    let found = path.exists();
    let config = SaltpackConfig::load(path)
        .with_context(|| format!("loading config: {}", path.display()))?;
    Ok((config, found))
}

/// `RUST_LOG` wins over `level`, except that `force_debug` always enables
/// debug output for the crypto engine.
fn log_filter(base: EnvFilter, force_debug: bool) -> Result<EnvFilter> {
    if !force_debug {
        return Ok(base);
    }
    let engine: Directive = "saltpack_crypto=debug".parse()?;
    Ok(base.add_directive(LevelFilter::DEBUG.into()).add_directive(engine))
}

fn init_logging(level: &str, format: &LogFormat, force_debug: bool) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let base = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let filter = log_filter(base, force_debug)?;

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
    Ok(())
}

/// Expand `~` in path to the user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    match s.strip_prefix("~/") {
        Some(rest) => {
            let home = std::env::var("HOME").unwrap_or_default();
            PathBuf::from(home).join(rest)
        }
        None => path.to_path_buf(),
    }
}

// ── I/O and key parsing ───────────────────────────────────────────────────────

fn read_input(io: &IoArgs) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    match &io.input {
        Some(path) => {
            data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        }
        None => {
            std::io::stdin()
                .read_to_end(&mut data)
                .context("reading stdin")?;
        }
    }
    Ok(data)
}

fn write_output(io: &IoArgs, data: &[u8]) -> Result<()> {
    match &io.output {
        Some(path) => {
            std::fs::write(path, data).with_context(|| format!("writing {}", path.display()))
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(data).context("writing stdout")?;
            stdout.flush().context("flushing stdout")
        }
    }
}

fn as_text(data: &[u8]) -> Result<&str> {
    std::str::from_utf8(data).context("armored input is not UTF-8")
}

fn parse_secret_key(hex_key: &str) -> Result<SecretKey> {
    SecretKey::from_hex(hex_key.trim()).context("parsing secret key")
}

fn parse_signing_key(hex_key: &str) -> Result<SigningKey> {
    let bytes = hex::decode(hex_key.trim()).context("signing key is not hex")?;
    let seed: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| anyhow::anyhow!("signing key must be 32 bytes, got {}", bytes.len()))?;
    Ok(SigningKey::from_bytes(&seed))
}

/// Each `--group` value is one group of comma-separated public keys.
fn parse_groups(groups: &[String]) -> Result<Vec<Vec<PublicKey>>> {
    groups
        .iter()
        .enumerate()
        .map(|(index, group)| {
            group
                .split(',')
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(|key| {
                    PublicKey::from_hex(key)
                        .with_context(|| format!("group {index}: bad public key {key:?}"))
                })
                .collect()
        })
        .collect()
}

fn armor_options(config: &SaltpackConfig, raw: bool) -> ArmorOptions {
    ArmorOptions {
        word_size: config.armor.word_size,
        words_per_line: config.armor.words_per_line,
        raw: raw || config.armor.raw,
    }
}

// ── `saltpack keygen` ─────────────────────────────────────────────────────────

fn cmd_keygen(signing: bool) -> Result<()> {
    if signing {
        let key = generate_signing_key();
        println!("secret: {}", hex::encode(key.to_bytes()));
        println!("public: {}", hex::encode(key.verifying_key().as_bytes()));
    } else {
        let key = generate_secret_key();
        println!("secret: {}", hex::encode(key.as_bytes()));
        println!("public: {}", key.public_key().to_hex());
    }
    Ok(())
}

// ── `saltpack encrypt` / `decrypt` ────────────────────────────────────────────

fn cmd_encrypt(
    config: &SaltpackConfig,
    key: &str,
    groups: &[String],
    chunk_size: Option<usize>,
    armored: bool,
    io: &IoArgs,
) -> Result<()> {
    let sender = parse_secret_key(key)?;
    let groups = parse_groups(groups)?;
    let chunk_size = chunk_size.unwrap_or(config.encrypt.chunk_size);
    let message = read_input(io)?;

    let encrypted = encrypt(&sender, &groups, &message, chunk_size).context("encrypting")?;
    info!(
        groups = groups.len(),
        recipients = groups.iter().map(Vec::len).sum::<usize>(),
        bytes = encrypted.len(),
        "encrypted"
    );

    if armored {
        let text = armor(&encrypted, KIND_ENCRYPTED, &armor_options(config, false));
        write_output(io, text.as_bytes())
    } else {
        write_output(io, &encrypted)
    }
}

fn cmd_decrypt(
    config: &SaltpackConfig,
    key: &str,
    armored: bool,
    debug: bool,
    io: &IoArgs,
) -> Result<()> {
    let recipient = parse_secret_key(key)?;
    let mut input = read_input(io)?;
    if armored {
        input = dearmor(as_text(&input)?, config.armor.raw).context("dearmoring")?;
    }

    let plaintext = if debug {
        decrypt_with_observer(&input, &recipient, &mut TracingObserver)
    } else {
        decrypt(&input, &recipient)
    }
    .context("decrypting")?;

    write_output(io, &plaintext)
}

// ── `saltpack sign` / `verify` ────────────────────────────────────────────────

fn cmd_sign(
    config: &SaltpackConfig,
    key: &str,
    detached: bool,
    chunk_size: Option<usize>,
    armored: bool,
    io: &IoArgs,
) -> Result<()> {
    let signer = parse_signing_key(key)?;
    let message = read_input(io)?;

    let (signed, kind) = if detached {
        (sign_detached(&signer, &message).context("signing")?, KIND_DETACHED)
    } else {
        let chunk_size = chunk_size.unwrap_or(config.sign.chunk_size);
        (
            sign_attached(&signer, &message, chunk_size).context("signing")?,
            KIND_SIGNED,
        )
    };

    if armored {
        let text = armor(&signed, kind, &armor_options(config, false));
        write_output(io, text.as_bytes())
    } else {
        write_output(io, &signed)
    }
}

fn cmd_verify(
    config: &SaltpackConfig,
    signature_path: Option<&Path>,
    armored: bool,
    io: &IoArgs,
) -> Result<()> {
    let input = read_input(io)?;
    let unarmor = |data: Vec<u8>| -> Result<Vec<u8>> {
        if armored {
            dearmor(as_text(&data)?, config.armor.raw).context("dearmoring")
        } else {
            Ok(data)
        }
    };

    match signature_path {
        Some(path) => {
            let signature = std::fs::read(path)
                .with_context(|| format!("reading signature {}", path.display()))?;
            let signer = verify_detached(&input, &unarmor(signature)?).context("verifying")?;
            eprintln!("signed by {}", hex::encode(signer.as_bytes()));
            Ok(())
        }
        None => {
            let (signer, message) = verify_attached(&unarmor(input)?).context("verifying")?;
            eprintln!("signed by {}", hex::encode(signer.as_bytes()));
            write_output(io, &message)
        }
    }
}

// ── `saltpack armor` / `dearmor` / `efficient` ────────────────────────────────

fn cmd_armor(config: &SaltpackConfig, kind: &str, raw: bool, io: &IoArgs) -> Result<()> {
    let data = read_input(io)?;
    let text = armor(&data, &kind.to_uppercase(), &armor_options(config, raw));
    write_output(io, text.as_bytes())
}

fn cmd_dearmor(config: &SaltpackConfig, raw: bool, io: &IoArgs) -> Result<()> {
    let input = read_input(io)?;
    let data = dearmor(as_text(&input)?, raw || config.armor.raw).context("dearmoring")?;
    write_output(io, &data)
}

fn cmd_efficient(alphabet_size: u32, max: usize) -> Result<()> {
    if alphabet_size < 2 {
        anyhow::bail!("alphabet size must be at least 2");
    }
    println!("efficient block sizes for alphabet size {alphabet_size}");
    for (chars, bytes, efficiency) in efficient_block_sizes(alphabet_size, max) {
        println!("{chars:2} chars: {bytes:2} bytes ({:.2}%)", 100.0 * efficiency);
    }
    Ok(())
}

// ── `saltpack config show` ────────────────────────────────────────────────────

fn cmd_config_show(config: &SaltpackConfig, config_path: &Path, found: bool) -> Result<()> {
    if found {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}
