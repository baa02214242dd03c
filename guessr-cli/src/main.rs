//! # Guessr CLI
//!
//! Command-line host for a guessr market. The market is kept in a JSON snapshot file between
//! invocations; each command loads it, applies one operation against the system clock, and
//! writes it back only if the operation succeeded.

use anyhow::{Context, Result};
use bitcoin::hashes::sha256;
use clap::{Parser, Subcommand};
use colored::*;
use guessr_core::{
    commitment::{commitment_hash, parse_signature, signing_message},
    utils::*,
    Identity, Market, MarketConfig, MarketEngine, Settlement, SystemClock,
};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

#[derive(Parser)]
#[command(name = "guessr")]
#[command(about = "Commit-reveal closest-guess betting markets signed with Bitcoin keys")]
#[command(version)]
struct Cli {
    /// Market snapshot file
    #[arg(short, long, global = true, default_value = "guessr-market.json")]
    state: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new, closed market snapshot
    Init {
        /// Owner identity (HASH160 of the owner's public key, hex)
        #[arg(short, long)]
        owner: Identity,
        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Overwrite an existing snapshot
        #[arg(long)]
        force: bool,
    },
    /// Open a market (owner only)
    Open {
        /// Caller identity
        #[arg(long)]
        caller: Identity,
        /// Betting deadline: Unix timestamp, or +SECONDS from now
        #[arg(short = 't', long)]
        close_time: String,
        /// Stake per bet in satoshis
        #[arg(short = 'a', long)]
        stake: u64,
        /// What is being guessed
        #[arg(short, long)]
        description: String,
    },
    /// Place a sealed bet
    Bet {
        /// Caller identity
        #[arg(long)]
        caller: Identity,
        /// Commitment hash (hex), see `commitment`
        #[arg(long)]
        commitment: sha256::Hash,
        /// Attached stake in satoshis
        #[arg(short = 'a', long)]
        stake: u64,
    },
    /// Declare the outcome (owner only)
    Declare {
        /// Caller identity
        #[arg(long)]
        caller: Identity,
        /// Declared result
        #[arg(short, long, allow_hyphen_values = true)]
        result: i64,
    },
    /// Reveal a guess
    Reveal {
        /// Caller identity
        #[arg(long)]
        caller: Identity,
        /// The guess that was signed
        #[arg(short, long, allow_hyphen_values = true)]
        guess: i64,
        /// 65-byte recoverable signature (hex)
        #[arg(long)]
        signature: String,
    },
    /// Close the reveal window and print payouts
    Close {
        /// Caller identity
        #[arg(long)]
        caller: Identity,
    },
    /// Transfer the owner capability
    TransferOwner {
        /// Caller identity
        #[arg(long)]
        caller: Identity,
        /// New owner identity
        #[arg(long)]
        new_owner: Identity,
    },
    /// Show market information
    Status,
    /// Print the message to sign for a guess
    Digest {
        /// The guess
        #[arg(short, long, allow_hyphen_values = true)]
        guess: i64,
        /// Nonce to bind (defaults to the market's current nonce)
        #[arg(short, long)]
        nonce: Option<u64>,
    },
    /// Compute the commitment hash of a signature
    Commitment {
        /// 65-byte recoverable signature (hex)
        signature: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            owner,
            config,
            force,
        } => {
            if cli.state.exists() && !force {
                anyhow::bail!(
                    "{} already exists, pass --force to overwrite",
                    cli.state.display()
                );
            }
            let config = match config {
                Some(path) => load_config(&path)?,
                None => MarketConfig::default(),
            };
            let market = Market::new(owner, config);
            save_market(&cli.state, &market)?;

            println!("{}", "Market initialised".green().bold());
            println!("{}: {}", "Owner".yellow().bold(), owner);
            println!(
                "{}: {}s",
                "Reveal period".yellow().bold(),
                market.config().reveal_period
            );
            println!("{}: {}", "Snapshot".yellow().bold(), cli.state.display());
        }

        Commands::Open {
            caller,
            close_time,
            stake,
            description,
        } => {
            let mut engine = load_engine(&cli.state)?;
            let close_time = parse_timestamp(&close_time, engine.now())?;
            let market_id = engine.open_market(&caller, close_time, stake, description)?;
            save_market(&cli.state, engine.market())?;

            println!("{}", "Market opened".green().bold());
            println!("{}", "═".repeat(50).bright_black());
            println!("{}: {}", "Market ID".yellow().bold(), market_id);
            println!(
                "{}: {}",
                "Betting closes".yellow().bold(),
                format_timestamp(close_time)
            );
            println!(
                "{}: {} sats ({} BTC)",
                "Stake".yellow().bold(),
                stake,
                satoshi_to_btc(stake)
            );
            println!("{}: {}", "Nonce".cyan().bold(), engine.market().nonce());
            println!("{}", "═".repeat(50).bright_black());
        }

        Commands::Bet {
            caller,
            commitment,
            stake,
        } => {
            let mut engine = load_engine(&cli.state)?;
            engine.bet(&caller, commitment, stake)?;
            save_market(&cli.state, engine.market())?;

            println!(
                "{}: {} committed {}",
                "Bet placed".green().bold(),
                caller.to_string().cyan(),
                commitment
            );
            println!(
                "{}: {} sats",
                "Pool".yellow().bold(),
                engine.market().betting_pool()
            );
        }

        Commands::Declare { caller, result } => {
            let mut engine = load_engine(&cli.state)?;
            engine.declare_result(&caller, result)?;
            save_market(&cli.state, engine.market())?;

            println!("{}: {}", "Result declared".green().bold(), result);
            if let Some(deadline) = engine.market().reveal_deadline() {
                println!(
                    "{}: {}",
                    "Reveals accepted until".yellow().bold(),
                    format_timestamp(deadline)
                );
            }
        }

        Commands::Reveal {
            caller,
            guess,
            signature,
        } => {
            let mut engine = load_engine(&cli.state)?;
            let signature = parse_signature(&signature)?;
            engine.reveal(&caller, guess, &signature)?;
            save_market(&cli.state, engine.market())?;

            println!(
                "{}: {} guessed {}",
                "Guess revealed".green().bold(),
                caller.to_string().cyan(),
                guess
            );
            print_winners(engine.market().winners());
        }

        Commands::Close { caller } => {
            let mut engine = load_engine(&cli.state)?;
            let settlement = engine.close_revealing(&caller)?;
            save_market(&cli.state, engine.market())?;
            print_settlement(&settlement);
        }

        Commands::TransferOwner { caller, new_owner } => {
            let mut engine = load_engine(&cli.state)?;
            engine.transfer_ownership(&caller, new_owner)?;
            save_market(&cli.state, engine.market())?;
            println!("{}: {}", "New owner".green().bold(), new_owner);
        }

        Commands::Status => {
            let engine = load_engine(&cli.state)?;
            let market = engine.market();

            println!("{}", "Market Info".green().bold());
            println!("{}", "═".repeat(50).bright_black());
            if let Some(market_id) = market.market_id() {
                println!("{}: {}", "Market ID".yellow().bold(), market_id);
            }
            println!("{}: {}", "Owner".yellow().bold(), market.owner());
            println!("{}: {}", "Phase".yellow().bold(), market.phase());
            println!("{}: {}", "Status".yellow().bold(), engine.status());
            println!("{}: {}", "Description".yellow().bold(), market.description());
            println!(
                "{}: {}",
                "Betting closes".yellow().bold(),
                format_timestamp(market.bet_close_time())
            );
            println!("{}: {} sats", "Stake".yellow().bold(), market.bet_amount());
            println!(
                "{}: {} sats from {} bets",
                "Pool".yellow().bold(),
                market.betting_pool(),
                market.bettor_count()
            );
            if let Some(result) = market.result() {
                println!("{}: {}", "Result".yellow().bold(), result);
            }
            println!("{}: {}", "Nonce".cyan().bold(), market.nonce());
            print_winners(market.winners());
            println!("{}", "═".repeat(50).bright_black());
        }

        Commands::Digest { guess, nonce } => {
            let nonce = match nonce {
                Some(nonce) => nonce,
                None => load_engine(&cli.state)?.market().nonce(),
            };
            println!(
                "{}: {}",
                "Message to sign".green().bold(),
                signing_message(guess, nonce).cyan()
            );
            println!(
                "{}",
                "Sign it with your wallet's signmessage and keep the signature secret until the reveal."
                    .bright_blue()
            );
        }

        Commands::Commitment { signature } => {
            let signature = parse_signature(&signature)?;
            println!(
                "{}: {}",
                "Commitment".green().bold(),
                commitment_hash(&signature).to_string().cyan()
            );
        }
    }

    Ok(())
}

/// Log filter from `RUST_LOG` directives, `info` when unset.
fn log_filter(directives: Option<&str>) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .parse_lossy(directives.unwrap_or_default())
}

fn load_config(path: &Path) -> Result<MarketConfig> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    MarketConfig::from_json(&json)
        .with_context(|| format!("Invalid config file {}", path.display()))
}

fn load_engine(path: &Path) -> Result<MarketEngine<SystemClock>> {
    let json = std::fs::read_to_string(path).with_context(|| {
        format!(
            "Failed to read market snapshot {} (run `guessr init` first)",
            path.display()
        )
    })?;
    let market = Market::from_json(&json)
        .with_context(|| format!("Corrupt market snapshot {}", path.display()))?;
    Ok(MarketEngine::with_clock(market, SystemClock))
}

fn save_market(path: &Path, market: &Market) -> Result<()> {
    let json = market.to_json()?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)
        .with_context(|| format!("Failed to write market snapshot {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace market snapshot {}", path.display()))?;
    info!(path = %path.display(), nonce = market.nonce(), "snapshot saved");
    Ok(())
}

fn print_winners(winners: &[Identity]) {
    if winners.is_empty() {
        println!("{}", "No winners yet".bright_black());
        return;
    }
    for (i, winner) in winners.iter().enumerate() {
        println!("{} {}: {}", "Winner".yellow().bold(), i, winner);
    }
}

fn print_settlement(settlement: &Settlement) {
    println!("{}", "Reveal closed".green().bold());
    println!("{}", "═".repeat(50).bright_black());
    println!("{}: {}", "Result".yellow().bold(), settlement.result);
    if settlement.refunded {
        println!("{}", "Nobody revealed, stakes are refunded.".bright_blue());
    }
    for payout in &settlement.payouts {
        println!(
            "{}: {} sats -> {}",
            "Payout".cyan().bold(),
            payout.amount,
            payout.recipient
        );
    }
    println!("{}", "═".repeat(50).bright_black());
}
