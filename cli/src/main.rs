mod commands;
mod terminal;

use commands::{CommandLine, Commands, options, ping};

fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();

    terminal::logging::init();

    match commands.command {
        Commands::Ping {
            target,
            count,
            ttl,
            size,
        } => ping::ping(&target, count, ttl, size),
        Commands::Options => options::show(),
    }
}
