//! Binary entrypoint for the guildhall admin CLI.
//!
//! Commands:
//! - `init` - create a starter `config.toml` and the guild record directory
//! - `list` / `show <name>` - inspect loaded guilds
//! - `check` - load every record and report the ones that fail to parse
//! - `create`, `rename`, `disband` - guild lifecycle
//! - `add-member`, `remove-member`, `set-rank`, `set-default-rank` - membership
//! - `grant`, `revoke` - rank permissions
//! - `set-prefix`, `deposit`, `withdraw`, `claim`, `unclaim` - guild fields
//!
//! See the library crate docs for module-level details: `guildhall::`.
use std::str::FromStr;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::{error, info, warn};

use guildhall::config::Config;
use guildhall::guild::color::strip;
use guildhall::guild::{lock_guild, ChunkRef, Guild, GuildRegistry, PlayerId};
use guildhall::validation::names_match;

#[derive(Parser)]
#[command(name = "guildhall")]
#[command(about = "Manage guild records for a multiplayer game server")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file and create the record directory
    Init,
    #[command(flatten)]
    Guild(GuildCommand),
}

/// Commands that run against the loaded registry.
#[derive(Subcommand)]
enum GuildCommand {
    /// List loaded guilds
    List,
    /// Show one guild in detail
    Show { name: String },
    /// Load every record and report malformed ones
    Check,
    /// Create a guild led by a player
    Create { name: String, leader: String },
    /// Rename a guild
    Rename { old: String, new: String },
    /// Delete a guild record
    Disband { name: String },
    /// Add a player to the guild's default rank
    AddMember { guild: String, player: String },
    /// Remove a player from the guild
    RemoveMember { guild: String, player: String },
    /// Move a member to another rank
    SetRank {
        guild: String,
        player: String,
        rank: String,
    },
    /// Flag the rank new members join
    SetDefaultRank { guild: String, rank: String },
    /// Give a rank a permission
    Grant {
        guild: String,
        rank: String,
        permission: String,
    },
    /// Take a permission from a rank
    Revoke {
        guild: String,
        rank: String,
        permission: String,
    },
    /// Set the raw (untranslated) prefix
    SetPrefix { guild: String, prefix: String },
    /// Add to the guild balance
    Deposit { guild: String, amount: f64 },
    /// Subtract from the guild balance
    Withdraw { guild: String, amount: f64 },
    /// Claim a chunk for the guild
    Claim {
        guild: String,
        world: String,
        #[arg(allow_hyphen_values = true)]
        x: i32,
        #[arg(allow_hyphen_values = true)]
        z: i32,
    },
    /// Release a chunk
    Unclaim {
        guild: String,
        world: String,
        #[arg(allow_hyphen_values = true)]
        x: i32,
        #[arg(allow_hyphen_values = true)]
        z: i32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            init_logging(&None, cli.verbose);
            info!("Initializing new guildhall configuration");
            let cfg = Config::default();
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
            tokio::fs::create_dir_all(cfg.guild_dir()).await?;
            info!("Guild records will be stored in {}", cfg.guild_dir().display());
            Ok(())
        }
        Commands::Guild(command) => {
            let config = Config::load(&cli.config).await?;
            init_logging(&Some(config.clone()), cli.verbose);
            run(command, &config)
        }
    }
}

fn run(command: GuildCommand, config: &Config) -> Result<()> {
    let (registry, report) = GuildRegistry::open(config)?;

    match command {
        GuildCommand::List => {
            for guild in registry.all() {
                let g = lock_guild(&guild);
                let members: usize = g.ranks().values().map(|r| r.members.len()).sum();
                println!(
                    "{}{} - {} members, {} claims, balance {:.2}",
                    strip(g.prefix()),
                    g.name(),
                    members,
                    g.claims().len(),
                    g.balance()
                );
            }
        }
        GuildCommand::Show { name } => {
            let guild = find(&registry, &name)?;
            let g = lock_guild(&guild);
            println!("{}", g.name());
            println!("  leader:  {}", g.leader());
            println!("  prefix:  {:?}", g.raw_prefix());
            println!("  balance: {:.2}", g.balance());
            for (rank_name, rank) in g.ranks() {
                let marker = if rank.is_default { " (default)" } else { "" };
                println!("  rank {}{}", rank_name, marker);
                println!("    permissions: {}", rank.permissions.join(", "));
                for member in &rank.members {
                    println!("    - {}", member);
                }
            }
            for claim in g.claims() {
                println!("  claim {}", claim);
            }
        }
        GuildCommand::Check => {
            println!("{} guild records loaded", report.loaded.len());
            for skipped in &report.skipped {
                println!("  skipped {}: {}", skipped.name, skipped.error);
            }
            if !report.is_clean() {
                error!("{} guild records failed to load", report.skipped.len());
                std::process::exit(1);
            }
        }
        GuildCommand::Create { name, leader } => {
            let leader = parse_player(&leader)?;
            registry.create_guild(&name, leader)?;
            println!("Created guild {}", name);
        }
        GuildCommand::Rename { old, new } => {
            registry.rename_guild(&old, &new)?;
            println!("Renamed {} to {}", old, new);
        }
        GuildCommand::Disband { name } => {
            registry.disband(&name)?;
            println!("Disbanded {}", name);
        }
        GuildCommand::AddMember { guild, player } => {
            let player = parse_player(&player)?;
            let rank = with_guild(&registry, &guild, |g| Ok(g.add_member(player)?))?;
            println!("Added {} to {} as {}", player, guild, rank);
        }
        GuildCommand::RemoveMember { guild, player } => {
            let player = parse_player(&player)?;
            let rank = with_guild(&registry, &guild, |g| Ok(g.remove_member(&player)?))?;
            println!("Removed {} ({}) from {}", player, rank, guild);
        }
        GuildCommand::SetRank {
            guild,
            player,
            rank,
        } => {
            let player = parse_player(&player)?;
            with_guild(&registry, &guild, |g| Ok(g.set_rank(&player, &rank)?))?;
            println!("{} is now {} in {}", player, rank, guild);
        }
        GuildCommand::SetDefaultRank { guild, rank } => {
            with_guild(&registry, &guild, |g| Ok(g.set_default_rank(&rank)?))?;
            println!("Default rank of {} is now {}", guild, rank);
        }
        GuildCommand::Grant {
            guild,
            rank,
            permission,
        } => {
            let added = with_guild(&registry, &guild, |g| Ok(g.add_permission(&rank, &permission)?))?;
            if !added {
                warn!("Rank {} of {} already had {}", rank, guild, permission);
            }
        }
        GuildCommand::Revoke {
            guild,
            rank,
            permission,
        } => {
            let removed =
                with_guild(&registry, &guild, |g| Ok(g.remove_permission(&rank, &permission)?))?;
            if !removed {
                warn!("Rank {} of {} did not have {}", rank, guild, permission);
            }
        }
        GuildCommand::SetPrefix { guild, prefix } => {
            with_guild(&registry, &guild, |g| Ok(g.set_prefix(&prefix)?))?;
        }
        GuildCommand::Deposit { guild, amount } => {
            let balance = with_guild(&registry, &guild, |g| Ok(g.deposit(amount)?))?;
            println!("{} balance: {:.2}", guild, balance);
        }
        GuildCommand::Withdraw { guild, amount } => {
            let balance = with_guild(&registry, &guild, |g| Ok(g.withdraw(amount)?))?;
            println!("{} balance: {:.2}", guild, balance);
        }
        GuildCommand::Claim { guild, world, x, z } => {
            let chunk = ChunkRef::new(world, x, z);
            if let Some(owner) = registry.claim_owner(&chunk) {
                let owner_name = lock_guild(&owner).name().to_string();
                if !names_match(&owner_name, &guild) {
                    return Err(anyhow!("{} is already claimed by {}", chunk, owner_name));
                }
            }
            let added = with_guild(&registry, &guild, |g| Ok(g.claim_chunk(chunk.clone())?))?;
            if !added {
                warn!("{} already holds {}", guild, chunk);
            }
        }
        GuildCommand::Unclaim { guild, world, x, z } => {
            let chunk = ChunkRef::new(world, x, z);
            let removed = with_guild(&registry, &guild, |g| Ok(g.unclaim_chunk(&chunk)?))?;
            if !removed {
                warn!("{} does not hold {}", guild, chunk);
            }
        }
    }

    Ok(())
}

fn parse_player(raw: &str) -> Result<PlayerId> {
    PlayerId::from_str(raw).map_err(|e| anyhow!("Invalid player id {}: {}", raw, e))
}

fn find(registry: &GuildRegistry, name: &str) -> Result<guildhall::guild::SharedGuild> {
    registry
        .get(name)
        .ok_or_else(|| anyhow!("No guild named {}", name))
}

fn with_guild<T>(
    registry: &GuildRegistry,
    name: &str,
    action: impl FnOnce(&mut Guild) -> Result<T>,
) -> Result<T> {
    let guild = find(registry, name)?;
    let mut g = lock_guild(&guild);
    action(&mut g)
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let configured = config
        .as_ref()
        .and_then(|cfg| log::LevelFilter::from_str(&cfg.logging.level).ok())
        .unwrap_or(log::LevelFilter::Info);
    let base_level = match verbosity {
        0 => configured,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);
    let log_file = config
        .as_ref()
        .and_then(|cfg| cfg.logging.file.as_ref())
        .and_then(|file| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
                .ok()
        });
    if let Some(f) = log_file {
        let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
        // Echo to the console only when attached to a terminal
        let is_tty = atty::is(atty::Stream::Stdout);
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());
            if let Ok(mut guard) = write_mutex.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
        });
    }
    let _ = builder.try_init();
}
