
mod config;
mod control_id;
mod encoding;
mod error;
mod frame;
mod messages;
mod sender;

use std::path::PathBuf;

use chrono::Local;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::config::{seconds, EncodingPolicy, RunConfig};
use crate::error::ConfigError;
use crate::messages::{load_messages, sample_messages, MessageSet};
use crate::sender::{RunState, Sender};

/// Sends sample HL7 messages over MLLP to a TCP endpoint, in a loop.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Host address of the HL7 receiver
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port number of the HL7 receiver
    #[arg(short, long, default_value_t = 2575)]
    port: u16,

    /// Pause between sends, in seconds
    #[arg(short, long, default_value_t = 1.0)]
    interval: f64,

    /// Total number of messages to send before stopping (0 = forever)
    #[arg(short, long, default_value_t = 0)]
    count: u64,

    /// Wait for an MLLP ACK frame after each send
    #[arg(long)]
    ack: bool,

    /// Payload encoding (utf-8, latin-1, ascii, utf-16le, utf-16be)
    #[arg(short, long, default_value = "utf-8")]
    encoding: String,

    /// Open a new TCP connection for every message
    #[arg(long)]
    new_conn_each: bool,

    /// Connect timeout in seconds (0 = none)
    #[arg(long, default_value_t = 5.0)]
    connect_timeout: f64,

    /// Send/receive timeout in seconds (0 = none)
    #[arg(long, default_value_t = 5.0)]
    send_timeout: f64,

    /// HL7 message file to send instead of the built-in samples; repeatable
    #[arg(short, long = "message", value_name = "PATH")]
    messages: Vec<PathBuf>,

    /// Skip messages the encoding cannot represent instead of reconnecting
    #[arg(long)]
    skip_unencodable: bool,
}

fn run_config(args: &Args) -> Result<RunConfig, ConfigError> {
    Ok(RunConfig {
        host: args.host.clone(),
        port: args.port,
        interval: seconds("interval", args.interval)?,
        count: args.count,
        connect_timeout: seconds("connect timeout", args.connect_timeout)?,
        io_timeout: seconds("send timeout", args.send_timeout)?,
        ack: args.ack,
        encoding: args.encoding.parse()?,
        new_conn_each: args.new_conn_each,
        encoding_policy: if args.skip_unencodable {
            EncodingPolicy::Skip
        } else {
            EncodingPolicy::Reconnect
        },
        ..RunConfig::default()
    })
}

fn message_set(args: &Args) -> Result<MessageSet, ConfigError> {
    if args.messages.is_empty() {
        Ok(sample_messages(Local::now()))
    } else {
        load_messages(&args.messages)
    }
}

fn run(args: Args) -> Result<RunState, ConfigError> {
    let config = run_config(&args)?;
    let messages = message_set(&args)?;
    Ok(Sender::new(messages, config).run())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(state) => {
            println!(
                "Sent {} HL7 messages ({} complete passes)",
                state.sent_total(),
                state.cycle_index()
            );
        }
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
