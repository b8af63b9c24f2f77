//! `relay openai-to-anthropic`: batch JSON file (or stdin/stdout) conversion
//! from an OpenAI Responses-shaped payload to an Anthropic request-shaped
//! `{messages, system?}` document, per spec.md §6's CLI surface.

use std::path::PathBuf;

use clap::Args;
use transform::{item::ItemTransformFlags, response::Mode};

use super::{read_input, write_output};

#[derive(Args, Debug)]
pub struct OpenaiToAnthropicArgs {
    /// Input JSON file; reads stdin when omitted.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Output JSON file; writes stdout when omitted.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Which shape the input payload is in.
    #[arg(long, default_value = "auto", value_parser = parse_mode)]
    mode: Mode,

    /// Render `reasoning` items with no summary as a `[openai_reasoning]`
    /// placeholder text block instead of dropping them.
    #[arg(long)]
    keep_reasoning: bool,

    /// Render a `reasoning` item's summary as a `thinking` block.
    #[arg(long)]
    keep_reasoning_summary: bool,

    /// Render item types this crate doesn't model as a text block carrying
    /// their JSON, instead of silently dropping them.
    #[arg(long)]
    keep_unknown: bool,
}

fn parse_mode(s: &str) -> Result<Mode, String> {
    Mode::parse(s).ok_or_else(|| format!("invalid mode '{s}' (expected auto|input|response|output)"))
}

pub fn run(args: OpenaiToAnthropicArgs) -> anyhow::Result<()> {
    let raw = read_input(&args.input)?;
    let data: serde_json::Value = serde_json::from_str(&raw)?;

    let flags = ItemTransformFlags {
        keep_reasoning: args.keep_reasoning,
        keep_unknown: args.keep_unknown,
        keep_reasoning_summary: args.keep_reasoning_summary,
    };
    let out = transform::response::convert(&data, args.mode, flags)?;

    write_output(&args.output, &serde_json::to_string_pretty(&out)?)?;
    Ok(())
}
