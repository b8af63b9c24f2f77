//! End-to-end scenarios from the design document's testable-properties
//! section, run against the public streaming and batch transform entry
//! points rather than internal state.

use serde_json::{Value, json};
use transform::{
    item::ItemTransformFlags, model_map, protocol::responses::ResponseObject, response::batch_to_message,
    stream::StreamTransformer,
};

fn push_all(st: &mut StreamTransformer, events: &[Value]) -> Vec<Value> {
    let mut out = Vec::new();
    for event in events {
        for ev in st.push(event) {
            out.push(serde_json::to_value(&ev).unwrap());
        }
    }
    out
}

fn types(events: &[Value]) -> Vec<String> {
    events.iter().map(|e| e["type"].as_str().unwrap().to_string()).collect()
}

#[test]
fn scenario_1_text_only() {
    let mut st = StreamTransformer::new("gpt-5", Some("msg_1".into()), false);
    let events = push_all(
        &mut st,
        &[
            json!({"type": "response.created", "response": {"model": "gpt-5.2"}}),
            json!({"type": "response.output_item.added", "item": {"type": "message"}}),
            json!({"type": "response.output_text.delta", "delta": "Hel"}),
            json!({"type": "response.output_text.delta", "delta": "lo"}),
            json!({"type": "response.output_item.done", "item": {"type": "message"}}),
            json!({"type": "response.completed", "response": {"output": [], "usage": {"output_tokens": 2}}}),
        ],
    );

    assert_eq!(
        types(&events),
        vec![
            "message_start",
            "content_block_start",
            "content_block_delta",
            "content_block_delta",
            "content_block_stop",
            "message_delta",
            "message_stop",
        ]
    );
    assert_eq!(events[2]["delta"]["text"], json!("Hel"));
    assert_eq!(events[3]["delta"]["text"], json!("lo"));
    assert_eq!(events[5]["delta"]["stop_reason"], json!("end_turn"));
    assert_eq!(events[5]["usage"]["output_tokens"], json!(2));
}

#[test]
fn scenario_2_tool_call_streamed() {
    let mut st = StreamTransformer::new("gpt-5", Some("msg_1".into()), false);
    let events = push_all(
        &mut st,
        &[
            json!({
                "type": "response.output_item.added",
                "item": {"type": "function_call", "id": "fc_1", "call_id": "call_1", "name": "get_weather"},
            }),
            json!({"type": "response.function_call_arguments.delta", "item_id": "fc_1", "delta": "{\"location\":"}),
            json!({"type": "response.function_call_arguments.delta", "item_id": "fc_1", "delta": " \"SF\"}"}),
            json!({
                "type": "response.function_call_arguments.done",
                "item_id": "fc_1",
                "arguments": "{\"location\": \"SF\"}",
            }),
            json!({"type": "response.output_item.done", "item": {"type": "function_call", "id": "fc_1"}}),
            json!({"type": "response.completed", "response": {"output": [{"type": "function_call"}], "usage": {}}}),
        ],
    );

    let start = events.iter().find(|e| e["type"] == "content_block_start").unwrap();
    assert_eq!(start["content_block"]["type"], json!("tool_use"));
    assert_eq!(start["content_block"]["id"], json!("call_1"));
    assert_eq!(start["content_block"]["name"], json!("get_weather"));
    assert_eq!(start["content_block"]["input"], json!({}));

    let json_parts: String = events
        .iter()
        .filter(|e| e["type"] == "content_block_delta" && e["delta"]["type"] == "input_json_delta")
        .map(|e| e["delta"]["partial_json"].as_str().unwrap())
        .collect();
    assert_eq!(json_parts, "{\"location\": \"SF\"}");

    let message_delta = events.iter().find(|e| e["type"] == "message_delta").unwrap();
    assert_eq!(message_delta["delta"]["stop_reason"], json!("tool_use"));
}

#[test]
fn scenario_3_text_interleaved_with_tool() {
    let mut st = StreamTransformer::new("gpt-5", Some("msg_1".into()), false);
    let events = push_all(
        &mut st,
        &[
            json!({"type": "response.output_text.delta", "delta": "A"}),
            json!({
                "type": "response.output_item.added",
                "item": {"type": "function_call", "id": "fc_1", "call_id": "call_1", "name": "f"},
            }),
            json!({"type": "response.function_call_arguments.delta", "item_id": "fc_1", "delta": "{"}),
            json!({"type": "response.output_text.delta", "delta": "B"}),
            json!({"type": "response.function_call_arguments.delta", "item_id": "fc_1", "delta": "}"}),
            json!({"type": "response.function_call_arguments.done", "item_id": "fc_1", "arguments": "{}"}),
            json!({"type": "response.output_item.done", "item": {"type": "function_call", "id": "fc_1"}}),
            json!({"type": "response.completed", "response": {"output": [], "usage": {}}}),
        ],
    );

    // Block indices: 0 = text "A", 1 = tool "{}" , 2 = text "B".
    let starts: Vec<_> = events.iter().filter(|e| e["type"] == "content_block_start").collect();
    assert_eq!(starts.len(), 3);
    assert_eq!(starts[0]["content_block"]["type"], json!("text"));
    assert_eq!(starts[0]["index"], json!(0));
    assert_eq!(starts[1]["content_block"]["type"], json!("tool_use"));
    assert_eq!(starts[1]["index"], json!(1));
    assert_eq!(starts[2]["content_block"]["type"], json!("text"));
    assert_eq!(starts[2]["index"], json!(2));

    let text_a = events
        .iter()
        .filter(|e| e["type"] == "content_block_delta" && e["index"] == 0 && e["delta"]["type"] == "text_delta")
        .map(|e| e["delta"]["text"].as_str().unwrap())
        .collect::<String>();
    assert_eq!(text_a, "A");

    let tool_json = events
        .iter()
        .filter(|e| e["type"] == "content_block_delta" && e["index"] == 1 && e["delta"]["type"] == "input_json_delta")
        .map(|e| e["delta"]["partial_json"].as_str().unwrap())
        .collect::<String>();
    assert_eq!(tool_json, "{}");

    let text_b = events
        .iter()
        .filter(|e| e["type"] == "content_block_delta" && e["index"] == 2 && e["delta"]["type"] == "text_delta")
        .map(|e| e["delta"]["text"].as_str().unwrap())
        .collect::<String>();
    assert_eq!(text_b, "B");

    // "B" is emitted only after the tool block's stop.
    let tool_stop = events.iter().position(|e| e["type"] == "content_block_stop" && e["index"] == 1).unwrap();
    let b_delta = events
        .iter()
        .position(|e| e["type"] == "content_block_delta" && e["index"] == 2 && e["delta"]["text"] == "B")
        .unwrap();
    assert!(b_delta > tool_stop);
}

#[test]
fn scenario_4_max_tokens_cutoff() {
    let mut st = StreamTransformer::new("gpt-5", Some("msg_1".into()), false);
    let events = push_all(
        &mut st,
        &[json!({
            "type": "response.incomplete",
            "response": {"output": [], "usage": {}, "incomplete_details": {"reason": "max_tokens"}},
        })],
    );
    let message_delta = events.iter().find(|e| e["type"] == "message_delta").unwrap();
    assert_eq!(message_delta["delta"]["stop_reason"], json!("max_tokens"));
}

#[test]
fn scenario_5_model_map_wildcard() {
    let map = model_map::parse_document(&json!({
        "claude-*-4-5": {"model": "gpt-5.2-codex", "reasoning": {"effort": "low"}},
        "*": "gpt-4o-mini",
    }));
    let (model, extras) = model_map::resolve(&map, "claude-sonnet-4-5");
    assert_eq!(model, "gpt-5.2-codex");
    assert_eq!(extras, json!({"reasoning": {"effort": "low"}}));
}

#[test]
fn scenario_6_reasoning_summary_passthrough() {
    let mut st = StreamTransformer::new("gpt-5", Some("msg_1".into()), true);
    let events = push_all(
        &mut st,
        &[
            json!({"type": "response.reasoning_summary.delta", "delta": "First"}),
            json!({"type": "response.reasoning_summary.delta", "delta": " Second"}),
            json!({"type": "response.completed", "response": {"output": [], "usage": {}}}),
        ],
    );

    let thinking_starts: Vec<_> = events
        .iter()
        .filter(|e| e["type"] == "content_block_start" && e["content_block"]["type"] == "thinking")
        .collect();
    assert_eq!(thinking_starts.len(), 1);

    let thinking_deltas: Vec<_> = events
        .iter()
        .filter(|e| e["type"] == "content_block_delta" && e["delta"]["type"] == "thinking_delta")
        .collect();
    assert_eq!(thinking_deltas.len(), 1);
    assert_eq!(thinking_deltas[0]["delta"]["thinking"], json!("First Second"));

    let thinking_start_idx = events.iter().position(|e| e["type"] == "content_block_start" && e["content_block"]["type"] == "thinking").unwrap();
    let message_delta_idx = events.iter().position(|e| e["type"] == "message_delta").unwrap();
    assert!(thinking_start_idx < message_delta_idx);
}

#[test]
fn batch_transform_end_to_end_for_tool_use() {
    let response: ResponseObject = serde_json::from_value(json!({
        "id": "resp_1",
        "model": "gpt-5.2",
        "output": [
            {"type": "message", "role": "assistant", "content": [{"type": "output_text", "text": "Let me check."}]},
            {"type": "function_call", "call_id": "call_1", "name": "get_weather", "arguments": "{\"location\": \"SF\"}"},
        ],
        "usage": {"input_tokens": 10, "output_tokens": 5},
    }))
    .unwrap();

    let message = batch_to_message(&response, ItemTransformFlags::default());
    assert_eq!(message.id, "resp_1");
    assert_eq!(message.content.len(), 2);
    assert_eq!(message.stop_reason.as_deref(), Some("tool_use"));
    assert_eq!(message.usage.input_tokens, Some(10));
}
