//! mvstore Interactive Shell
//!
//! Usage:
//!   mvstore-shell --isolation serializable
//!
//! Commands: begin | commit | rollback | get K | set K V | delete K

use std::io::{self, BufRead, Write};

use clap::Parser;

use mvstore::{Database, IsolationLevel};

#[derive(Parser, Debug)]
#[command(name = "mvstore-shell")]
#[command(about = "Interactive shell for the mvstore MVCC key-value store")]
#[command(version)]
struct Args {
    /// Default isolation level for new transactions
    #[arg(short, long, default_value = "read-committed")]
    isolation: IsolationLevel,
}

fn main() {
    env_logger::init();

    let args = Args::parse();
    let db = Database::new(args.isolation);
    let mut conn = db.connect();

    log::info!("mvstore shell starting at {} isolation", args.isolation);
    println!(
        "mvstore shell ({} isolation). Commands: begin | commit | rollback | get K | set K V | delete K | quit",
        args.isolation
    );

    let stdin = io::stdin();
    loop {
        print!("> ");
        if io::stdout().flush().is_err() {
            break;
        }

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" || line == "exit" {
            break;
        }

        // The core treats transaction misuse as a caller bug; the shell
        // keeps a human from tripping those asserts.
        let command = line.split_whitespace().next().unwrap_or("");
        if command == "begin" && conn.active_txn().is_some() {
            println!("error: a transaction is already in progress");
            continue;
        }
        if command != "begin" && conn.active_txn().is_none() {
            println!("error: no transaction in progress (run `begin`)");
            continue;
        }

        match conn.exec(line) {
            Ok(result) if result.is_empty() => println!("ok"),
            Ok(result) => println!("{}", result),
            Err(e) => println!("error: {}", e),
        }
    }
}
