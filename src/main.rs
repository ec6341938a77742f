//! Binary entry point: serve the visualization facade, or drive a tree
//! from stdin.

use std::env;
use std::io;
use std::io::BufRead;
use std::io::Write;
use std::process;
use std::str::SplitWhitespace;

use log::LevelFilter;
use log::error;
use simplelog::ColorChoice;
use simplelog::Config;
use simplelog::TermLogger;
use simplelog::TerminalMode;

use holly::error::ServeError;
use holly::server::Server;
use holly::snapshot;
use holly::tree::RbTree;

const DEFAULT_PORT: u16 = 8080;

fn main() {
    let _ = TermLogger::init(
        LevelFilter::Info,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    );

    let args: Vec<String> = env::args().skip(1).collect();
    let result = match args.first().map(String::as_str) {
        None | Some("serve") => serve(&args),
        Some("repl") => repl(),
        Some("help") | Some("--help") => {
            usage();
            Ok(())
        }
        Some(other) => {
            eprintln!("unknown command: {}", other);
            usage();
            process::exit(2);
        }
    };

    if let Err(err) = result {
        error!("{}", err);
        process::exit(1);
    }
}

fn usage() {
    eprintln!("usage: holly [serve [--port PORT]] | repl | help");
}

fn serve(args: &[String]) -> Result<(), ServeError> {
    let mut rest = args;
    if rest.first().map(String::as_str) == Some("serve") {
        rest = &rest[1..];
    }

    let mut port = DEFAULT_PORT;
    let mut iter = rest.iter();
    while let Some(flag) = iter.next() {
        match flag.as_str() {
            "--port" => {
                port = iter.next().and_then(|raw| raw.parse().ok()).unwrap_or_else(|| {
                    eprintln!("--port needs a port number");
                    process::exit(2);
                });
            }
            other => {
                eprintln!("unknown flag: {}", other);
                usage();
                process::exit(2);
            }
        }
    }

    let server = Server::bind(port)?;
    println!("open http://{} in a browser", server.local_addr()?);
    return server.run();
}

/// Stdin command loop over a locally owned tree.
fn repl() -> Result<(), ServeError> {
    let mut tree = RbTree::new();
    println!("commands: insert N, delete N, search N, keys, json, clear, quit");
    prompt()?;

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let mut words = line.split_whitespace();
        match words.next() {
            Some("insert") => match key_arg(&mut words) {
                Some(key) => {
                    tree.insert(key);
                    println!("ok ({} keys)", tree.len());
                }
                None => println!("insert needs an integer key"),
            },
            Some("delete") => match key_arg(&mut words) {
                Some(key) => {
                    if tree.delete(key) {
                        println!("deleted {}", key);
                    } else {
                        println!("{} not found", key);
                    }
                }
                None => println!("delete needs an integer key"),
            },
            Some("search") => match key_arg(&mut words) {
                Some(key) => {
                    if tree.contains(key) {
                        println!("found {}", key);
                    } else {
                        println!("{} not found", key);
                    }
                }
                None => println!("search needs an integer key"),
            },
            Some("keys") => println!("{:?}", tree.keys()),
            Some("json") => println!("{}", snapshot::to_json(&tree)),
            Some("clear") => {
                for key in tree.keys() {
                    tree.delete(key);
                }
                println!("cleared");
            }
            Some("quit") | Some("exit") => break,
            Some("help") => {
                println!("commands: insert N, delete N, search N, keys, json, clear, quit");
            }
            Some(other) => println!("unknown command: {} (try help)", other),
            None => {}
        }
        prompt()?;
    }

    return Ok(());
}

fn prompt() -> Result<(), ServeError> {
    print!("> ");
    io::stdout().flush()?;
    return Ok(());
}

fn key_arg(words: &mut SplitWhitespace<'_>) -> Option<i64> {
    return words.next().and_then(|raw| raw.parse().ok());
}
