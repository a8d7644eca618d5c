use std::collections::HashSet;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::Value;

use crate::viewport::GraphPayload;

pub fn parse_graph_payload(value: &Value) -> Result<GraphPayload> {
    if !value.is_object() {
        return Err(anyhow!("expected a JSON object with chunks, got {value}"));
    }

    let mut payload = GraphPayload::deserialize(value)
        .context("payload does not match the chunk/node/link shape")?;

    let mut seen = HashSet::new();
    payload.chunks.retain(|chunk| {
        let fresh = seen.insert(chunk.id.clone());
        if !fresh {
            log::warn!("dropping duplicate chunk {}", chunk.id);
        }
        fresh
    });

    Ok(payload)
}
