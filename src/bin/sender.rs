//! Sender client
//!
//! Logs in as a sender, then reads commands from stdin:
//! `/join ROOM`, `/leave`, `/quit`, or plain text to broadcast.
//!
//! Run with:
//! ```not_rust
//! roomchat-sender 127.0.0.1 8080 alice
//! ```

use std::process::ExitCode;

use clap::Parser;
use tokio::io::BufReader;

use roomchat::{logging, run_sender, Connection};

#[derive(Parser, Debug)]
#[command(name = "roomchat-sender")]
#[command(about = "Send messages to chat rooms", long_about = None)]
struct Args {
    /// Server host name or address
    host: String,

    /// Server port
    port: u16,

    /// Username (letters and digits only)
    username: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init("roomchat=warn,roomchat_sender=warn", true);

    let args = Args::parse();

    let mut conn = match Connection::connect((args.host.as_str(), args.port)).await {
        Ok(conn) => conn,
        Err(e) => {
            eprintln!("Failed to connect to server: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stderr = tokio::io::stderr();
    let result = run_sender(&mut conn, &args.username, stdin, &mut stderr).await;
    conn.close().await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        // Rejections print the server's reason verbatim.
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
