//! The single `/v1/messages` (aliased `/v1/message`) handler: C2 → C6 →
//! upstream → C1 → C4 (stream) or C3 (batch) → client.

use axum::{
    Json,
    extract::State,
    http::HeaderMap,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use async_stream::stream;
use eventsource_stream::Eventsource;
use futures_util::{Stream, StreamExt};
use serde_json::Value;

use transform::{
    deep_merge::deep_merge,
    item::ItemTransformFlags,
    protocol::responses::ResponseObject,
    request::convert_request,
    response::{batch_to_message, terminal_response},
    sse,
    stream::StreamTransformer,
};

use crate::{auth, error::ProxyError, upstream, AppState};

const ITEM_FLAGS: ItemTransformFlags =
    ItemTransformFlags { keep_reasoning: false, keep_unknown: false, keep_reasoning_summary: false };

pub async fn create_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<Response, ProxyError> {
    let payload: Value = serde_json::from_slice(&body).map_err(|e| ProxyError::InvalidInput(e.to_string()))?;
    if !payload.is_object() {
        return Err(ProxyError::InvalidInput("request body must be a JSON object".into()));
    }

    log_json("anthropic.request", &payload, &state);

    let openai_auth = auth::resolve(&headers, &state.config)?;

    let mut openai_req = convert_request(&payload, None)?;
    if let Some(model) = openai_req.get("model").and_then(Value::as_str) {
        let (resolved_model, extras) = state.model_map.resolve(model);
        openai_req["model"] = Value::String(resolved_model);
        if extras.is_object() && !extras.as_object().unwrap().is_empty() {
            deep_merge(&mut openai_req, &extras);
        }
    }
    if openai_req.get("model").and_then(Value::as_str).is_none_or(str::is_empty) {
        return Err(ProxyError::InvalidInput("missing model".into()));
    }

    openai_req["store"] = Value::Bool(false);
    if state.config.force_stream {
        openai_req["stream"] = Value::Bool(true);
    }

    log_json("openai.request", &openai_req, &state);

    let url = upstream::responses_url(&openai_auth.base_url);
    let client_stream = payload.get("stream").and_then(Value::as_bool).unwrap_or(false);

    if client_stream {
        return Ok(stream_response(url, openai_auth, openai_req, state).await?.into_response());
    }

    let data = if openai_req.get("stream").and_then(Value::as_bool).unwrap_or(false) {
        let events = fetch_stream_events(&url, &openai_auth, &openai_req).await?;
        log_json("openai.stream.events", &Value::Array(events.clone()), &state);
        let response = terminal_response(&events)?;
        serde_json::to_value(&response).expect("ResponseObject serializes infallibly")
    } else {
        upstream::post_batch(&url, &openai_auth.key, &openai_req).await?
    };

    log_json("openai.response", &data, &state);
    let response: ResponseObject = serde_json::from_value(data).map_err(|e| ProxyError::InvalidInput(e.to_string()))?;
    let message = batch_to_message(&response, ITEM_FLAGS);
    let out = serde_json::to_value(&message).expect("MessageEnvelope serializes infallibly");
    log_json("anthropic.response", &out, &state);

    Ok(Json(out).into_response())
}

async fn fetch_stream_events(
    url: &str,
    auth: &auth::OpenAiAuth,
    openai_req: &Value,
) -> Result<Vec<Value>, ProxyError> {
    let response = upstream::post_stream(url, &auth.key, openai_req).await?;
    let mut events = Vec::new();
    let mut source = response.bytes_stream().eventsource();
    while let Some(event) = source.next().await {
        let event = event.map_err(|e| ProxyError::UpstreamConnection(e.to_string()))?;
        if let Some(value) = sse::decode_payload(&event.data) {
            events.push(value);
        }
    }
    Ok(events)
}

async fn stream_response(
    url: String,
    auth: auth::OpenAiAuth,
    openai_req: Value,
    state: AppState,
) -> Result<Sse<impl Stream<Item = Result<Event, std::convert::Infallible>>>, ProxyError> {
    let model = openai_req.get("model").and_then(Value::as_str).unwrap_or("unknown").to_string();
    let response = upstream::post_stream(&url, &auth.key, &openai_req).await?;
    let mut source = response.bytes_stream().eventsource();
    let mut transformer = StreamTransformer::new(model, None, ITEM_FLAGS.keep_reasoning_summary);

    let output = stream! {
        while let Some(event) = source.next().await {
            let event = match event {
                Ok(event) => event,
                Err(_) => break,
            };
            let Some(decoded) = sse::decode_payload(&event.data) else { continue };
            for anthropic_event in transformer.push(&decoded) {
                yield Ok(to_sse_event(&anthropic_event));
            }
            if transformer.is_ended() {
                break;
            }
        }
        for anthropic_event in transformer.finish() {
            yield Ok(to_sse_event(&anthropic_event));
        }
        let _ = state;
    };

    Ok(Sse::new(output).keep_alive(KeepAlive::default()))
}

/// Frame one Anthropic streaming event as an axum SSE `Event`, carrying both
/// the `event: <type>` line and the `data:` line per C1's encoding contract.
fn to_sse_event(event: &transform::protocol::anthropic::StreamEvent) -> Event {
    let payload = serde_json::to_string(event).expect("StreamEvent serialization is infallible");
    Event::default().event(event.event_name()).data(payload)
}

fn log_json(label: &str, value: &Value, state: &AppState) {
    if state.config.log_payloads {
        log::info!("{label}: {}", transform::scrub::scrub_and_truncate(value, state.config.log_max_chars));
    } else if log::log_enabled!(log::Level::Debug) {
        log::debug!("{label}: {}", transform::scrub::scrub_and_truncate(value, state.config.log_max_chars));
    }
}
