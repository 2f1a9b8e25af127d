//! bptstore command line tool
//!
//! Opens one table, runs one command, closes it.
//!
//! ```text
//! bptstore-cli --table data/trains insert 1001 42
//! bptstore-cli --table data/stops --multi find Shanghai
//! RUST_LOG=bptstore=trace bptstore-cli --table data/trains check
//! ```

use anyhow::{bail, Context, Result};
use bptstore::config::DEFAULT_CACHE_CAPACITY;
use bptstore::{BTree, FixedStr, MultiBTree, TreeConfig, TreeStats};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Key type of multi-value tables
type NameKey = FixedStr<32>;

#[derive(Parser, Debug)]
#[command(name = "bptstore-cli", version, about = "Inspect and edit bptstore tables")]
struct Cli {
    /// Table base path; data lives in <table>.db and <table>_pool.db
    #[arg(short, long)]
    table: PathBuf,

    /// Open a multi-value table (string key -> many u64 values)
    #[arg(long)]
    multi: bool,

    /// Node degree (even, >= 4). Derived from the node byte budget when omitted.
    #[arg(long)]
    degree: Option<usize>,

    /// Page cache capacity in nodes
    #[arg(long, default_value_t = DEFAULT_CACHE_CAPACITY)]
    cache: usize,

    /// fsync the table files on close
    #[arg(long)]
    sync: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Insert a key/value pair (no-op if already present)
    Insert { key: String, value: u64 },
    /// Print the value(s) stored under a key
    Find { key: String },
    /// Remove a key (unique) or a key/value pair (multi)
    Erase { key: String, value: Option<u64> },
    /// Print every entry with lo <= key <= hi
    Range { lo: String, hi: String },
    /// Print every entry in key order
    Dump,
    /// Verify tree invariants and print its shape
    Check,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = TreeConfig::default().with_cache_capacity(cli.cache);
    config.degree = cli.degree;
    config.store.sync_on_close = cli.sync;

    if cli.multi {
        let tree = MultiBTree::<NameKey, u64>::open(&cli.table, config)
            .with_context(|| format!("failed to open multi table {}", cli.table.display()))?;
        run_multi(tree, cli.command)
    } else {
        let tree = BTree::<u64, u64>::open(&cli.table, config)
            .with_context(|| format!("failed to open table {}", cli.table.display()))?;
        run_unique(tree, cli.command)
    }
}

fn parse_u64(raw: &str) -> Result<u64> {
    raw.parse()
        .with_context(|| format!("unique tables use u64 keys, got {:?}", raw))
}

fn parse_name(raw: &str) -> Result<NameKey> {
    Ok(NameKey::new(raw)?)
}

fn run_unique(mut tree: BTree<u64, u64>, command: Command) -> Result<()> {
    match command {
        Command::Insert { key, value } => {
            let inserted = tree.insert(parse_u64(&key)?, value)?;
            println!("{}", if inserted { "inserted" } else { "exists" });
        }
        Command::Find { key } => match tree.find(&parse_u64(&key)?)? {
            Some(value) => println!("{}", value),
            None => println!("not found"),
        },
        Command::Erase { key, value } => {
            if value.is_some() {
                bail!("unique tables erase by key only");
            }
            match tree.erase(&parse_u64(&key)?)? {
                Some(value) => println!("erased {}", value),
                None => println!("not found"),
            }
        }
        Command::Range { lo, hi } => {
            for (k, v) in tree.range(&parse_u64(&lo)?, &parse_u64(&hi)?)? {
                println!("{}\t{}", k, v);
            }
        }
        Command::Dump => {
            for (k, v) in tree.iter_all()? {
                println!("{}\t{}", k, v);
            }
        }
        Command::Check => {
            let stats = tree.check_invariants()?;
            print_stats(&stats, tree.degree());
            let cache = tree.cache_stats();
            let file = tree.file_stats();
            println!(
                "file: {} bytes, {}-byte slots, {} free",
                file.data_end, file.slot_size, file.free_slots
            );
            println!("cache: {} hits, {} misses", cache.hits, cache.misses);
        }
    }
    tree.close()?;
    Ok(())
}

fn run_multi(mut tree: MultiBTree<NameKey, u64>, command: Command) -> Result<()> {
    match command {
        Command::Insert { key, value } => {
            let inserted = tree.insert(parse_name(&key)?, value)?;
            println!("{}", if inserted { "inserted" } else { "exists" });
        }
        Command::Find { key } => {
            let values = tree.find(&parse_name(&key)?)?;
            if values.is_empty() {
                println!("not found");
            }
            for value in values {
                println!("{}", value);
            }
        }
        Command::Erase { key, value } => {
            let Some(value) = value else {
                bail!("multi tables erase a key/value pair; pass the value too");
            };
            let erased = tree.erase(&parse_name(&key)?, &value)?;
            println!("{}", if erased { "erased" } else { "not found" });
        }
        Command::Range { lo, hi } => {
            for (k, v) in tree.range(&parse_name(&lo)?, &parse_name(&hi)?)? {
                println!("{}\t{}", k, v);
            }
        }
        Command::Dump => {
            for (k, v) in tree.iter_all()? {
                println!("{}\t{}", k, v);
            }
        }
        Command::Check => {
            let stats = tree.check_invariants()?;
            print_stats(&stats, tree.degree());
            let file = tree.file_stats();
            println!(
                "file: {} bytes, {}-byte slots, {} free",
                file.data_end, file.slot_size, file.free_slots
            );
        }
    }
    tree.close()?;
    Ok(())
}

fn print_stats(stats: &TreeStats, degree: usize) {
    println!("ok: degree {}, height {}", degree, stats.height);
    println!(
        "nodes: {} leaf, {} internal; entries: {}",
        stats.leaf_nodes, stats.internal_nodes, stats.entries
    );
}
