//! Receiver client
//!
//! Logs in as a receiver, joins one room and prints every message broadcast
//! there as `sender: text` until the server closes the connection.
//!
//! Run with:
//! ```not_rust
//! roomchat-receiver 127.0.0.1 8080 bob lounge
//! ```

use std::process::ExitCode;

use clap::Parser;

use roomchat::{logging, run_receiver, Connection};

#[derive(Parser, Debug)]
#[command(name = "roomchat-receiver")]
#[command(about = "Print messages broadcast to a chat room", long_about = None)]
struct Args {
    /// Server host name or address
    host: String,

    /// Server port
    port: u16,

    /// Username (letters and digits only)
    username: String,

    /// Room to join (letters and digits only)
    room: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init("roomchat=warn,roomchat_receiver=warn", true);

    let args = Args::parse();

    let mut conn = match Connection::connect((args.host.as_str(), args.port)).await {
        Ok(conn) => conn,
        Err(e) => {
            eprintln!("Failed to connect to server: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut stdout = tokio::io::stdout();
    let mut stderr = tokio::io::stderr();
    let result = run_receiver(
        &mut conn,
        &args.username,
        &args.room,
        &mut stdout,
        &mut stderr,
    )
    .await;
    conn.close().await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
