//! # CLI — StratumKV Interactive Shell
//!
//! A REPL-style command-line interface for the StratumKV storage engine.
//! Reads commands from stdin, executes them against the engine, and prints
//! results to stdout. Designed for both interactive use and scripted testing
//! (pipe commands via stdin).
//!
//! ## Commands
//!
//! ```text
//! PUT key value   Insert or update a key-value pair
//! GET key         Look up a key (prints value or "(nil)")
//! DEL key         Delete a key (writes a tombstone)
//! FLUSH           Force-drain the memtable queue to disk
//! COMPACT         Force an unconditional compaction
//! STATS           Print engine state
//! EXIT / QUIT     Shut down gracefully
//! ```
//!
//! ## Configuration
//!
//! `STRATUMKV_DATA_DIR` selects the data directory (default: `"data"`).
//! Every other setting is read by [`config::EngineConfig::from_env`] — see
//! its documentation for the full list of `STRATUMKV_*` variables.

use anyhow::Result;
use config::EngineConfig;
use engine::Engine;
use std::io::{self, BufRead, Write};
use tracing::info;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let data_dir = std::env::var("STRATUMKV_DATA_DIR").unwrap_or_else(|_| "data".to_string());
    let config = EngineConfig::from_env();

    let engine = Engine::open(&data_dir, config)?;

    info!(dir = %data_dir, ?config, "StratumKV started");
    println!("StratumKV started (dir={data_dir})");
    println!("Commands: PUT key value | GET key | DEL key | FLUSH | COMPACT | STATS | EXIT");
    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let mut parts = line.split_whitespace();
        if let Some(cmd) = parts.next() {
            match cmd.to_uppercase().as_str() {
                "PUT" => match parts.next() {
                    Some(k) => {
                        let v: String = parts.collect::<Vec<&str>>().join(" ");
                        if v.is_empty() {
                            println!("ERR usage: PUT key value");
                        } else {
                            match engine.put(k.as_bytes().to_vec(), v.into_bytes()) {
                                Ok(()) => println!("OK"),
                                Err(e) => println!("ERR put failed: {e}"),
                            }
                        }
                    }
                    None => println!("ERR usage: PUT key value"),
                },
                "GET" => match parts.next() {
                    Some(k) => match engine.get(k.as_bytes()) {
                        Ok(Some(v)) => println!("{}", String::from_utf8_lossy(&v)),
                        Ok(None) => println!("(nil)"),
                        Err(e) => println!("ERR get failed: {e}"),
                    },
                    None => println!("ERR usage: GET key"),
                },
                "DEL" => match parts.next() {
                    Some(k) => match engine.delete(k.as_bytes().to_vec()) {
                        Ok(()) => println!("OK"),
                        Err(e) => println!("ERR del failed: {e}"),
                    },
                    None => println!("ERR usage: DEL key"),
                },
                "FLUSH" => match engine.flush() {
                    Ok(()) => println!("OK"),
                    Err(e) => println!("ERR flush failed: {e}"),
                },
                "COMPACT" => match engine.force_compaction() {
                    Ok(()) => println!("OK"),
                    Err(e) => println!("ERR compact failed: {e}"),
                },
                "STATS" => println!("{:?}", engine.stats()),
                "EXIT" | "QUIT" => {
                    println!("bye");
                    break;
                }
                other => println!("unknown command: {other}"),
            }
        }
        print!("> ");
        io::stdout().flush().ok();
    }

    engine.close()?;
    Ok(())
}
