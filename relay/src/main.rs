//! `relay`: starts the HTTP bridge (`relay serve`) and exposes the same
//! transforms as one-shot file converters for offline debugging and
//! scripting (`relay openai-to-anthropic`, `relay
//! openai-stream-to-anthropic-stream`).

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "relay", author, version, about = "Anthropic Messages \u{2194} OpenAI Responses bridge")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP server that proxies `/v1/messages` to an
    /// OpenAI-compatible Responses endpoint.
    Serve,

    /// Convert a batch OpenAI Responses-shaped JSON payload into an
    /// Anthropic request-shaped `{messages, system?}` document.
    OpenaiToAnthropic(commands::convert::OpenaiToAnthropicArgs),

    /// Convert an NDJSON stream of OpenAI Responses events into an NDJSON
    /// stream of Anthropic streaming events.
    OpenaiStreamToAnthropicStream(commands::stream_convert::StreamConvertArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => commands::serve::run().await,
        Commands::OpenaiToAnthropic(args) => commands::convert::run(args),
        Commands::OpenaiStreamToAnthropicStream(args) => commands::stream_convert::run(args),
    }
}
