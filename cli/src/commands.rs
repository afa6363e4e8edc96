pub mod options;
pub mod ping;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rawsock")]
#[command(about = "Raw-socket I/O engine demos.")]
pub struct CommandLine {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send ICMP echo requests to a host and print the replies
    #[command(alias = "p")]
    Ping {
        /// IPv4 or IPv6 address to ping
        target: String,
        /// Number of echo requests to send
        #[arg(short, long, default_value_t = 4)]
        count: u32,
        /// Time-to-live for outgoing packets
        #[arg(long)]
        ttl: Option<i32>,
        /// Payload bytes appended to the echo header
        #[arg(short, long, default_value_t = 32)]
        size: usize,
    },
    /// Inspect and tweak socket options on a raw socket
    #[command(alias = "o")]
    Options,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
