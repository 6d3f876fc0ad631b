//! cairn-ctl: command-line interface for the cairn status API.

use anyhow::{Context, Result};

mod cmd;

const DEFAULT_PORT: u16 = 13382;

fn print_usage() {
    println!("Usage: cairn-ctl [--port <port>] <command>");
    println!();
    println!("Commands:");
    println!("  status                    Show node status and live sessions");
    println!("  sessions inspect <id>     Show one session");
    println!("  sessions drop <id>        Close a session");
    println!("  shutdown                  Stop the daemon");
    println!();
    println!("Options:");
    println!("  --port <port>   Status API port (default: {})", DEFAULT_PORT);
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Parse --port option
    let mut port = DEFAULT_PORT;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--port" {
            i += 1;
            port = args
                .get(i)
                .context("--port requires a value")?
                .parse()
                .context("--port must be a number")?;
        } else {
            remaining.push(&args[i]);
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["status"] | [] => cmd::status::cmd_status(port).await,
        ["sessions", "inspect", id] => cmd::sessions::cmd_session_inspect(port, id).await,
        ["sessions", "drop", id] => cmd::sessions::cmd_session_drop(port, id).await,
        ["shutdown"] => cmd::status::cmd_shutdown(port).await,
        ["help"] | ["--help"] | ["-h"] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
