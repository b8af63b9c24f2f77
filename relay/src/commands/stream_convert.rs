//! `relay openai-stream-to-anthropic-stream`: drive the streaming state
//! machine (C4) over an NDJSON file of decoded OpenAI Responses events,
//! emitting one Anthropic streaming event per output line.
//!
//! This is the batch/offline sibling of the HTTP surface's SSE path: the
//! same [`StreamTransformer`] is used, just fed from pre-decoded lines
//! instead of a live upstream byte stream.

use std::path::PathBuf;

use clap::Args;
use transform::stream::StreamTransformer;

use super::{read_input, write_output};

#[derive(Args, Debug)]
pub struct StreamConvertArgs {
    /// Input NDJSON file (one decoded Responses event per line); reads
    /// stdin when omitted.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Output NDJSON file (one Anthropic streaming event per line); writes
    /// stdout when omitted.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Model name to seed `message_start` with, before any
    /// `response.created` event overrides it.
    #[arg(long, default_value = "unknown")]
    model: String,

    /// Stable id to use in `message_start` instead of a freshly generated
    /// `msg_<hex>` identifier.
    #[arg(long)]
    message_id: Option<String>,

    /// Accumulate `response.reasoning_summary.*` text and emit it as a
    /// trailing `thinking` block.
    #[arg(long, default_value_t = true)]
    keep_reasoning_summary: bool,
}

pub fn run(args: StreamConvertArgs) -> anyhow::Result<()> {
    let raw = read_input(&args.input)?;
    let mut transformer = StreamTransformer::new(args.model, args.message_id, args.keep_reasoning_summary);

    let mut out = String::new();
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let event: serde_json::Value = serde_json::from_str(line)?;
        for anthropic_event in transformer.push(&event) {
            out.push_str(&serde_json::to_string(&anthropic_event)?);
            out.push('\n');
        }
        if transformer.is_ended() {
            break;
        }
    }
    for anthropic_event in transformer.finish() {
        out.push_str(&serde_json::to_string(&anthropic_event)?);
        out.push('\n');
    }

    write_output(&args.output, &out)?;
    Ok(())
}
