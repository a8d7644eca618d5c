use serde::{Deserialize, Deserializer};

use crate::layout::StyleKind;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct GraphPayload {
    #[serde(default)]
    pub chunks: Vec<ChunkData>,
    #[serde(default)]
    pub links: Vec<CrossLinkData>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChunkData {
    pub id: String,
    pub hierarchy: NodeData,
    #[serde(default)]
    pub links: Vec<LinkData>,
    #[serde(default)]
    pub layout: Option<StyleKind>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NodeData {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_state")]
    pub state: i64,
    #[serde(default)]
    pub children: Vec<NodeData>,
}

impl NodeData {
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

fn lenient_state<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let number = serde_json::Number::deserialize(deserializer)?;
    Ok(number.as_i64().unwrap_or(i64::MAX))
}

#[derive(Clone, Debug, Deserialize)]
pub struct LinkData {
    pub source: String,
    pub target: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CrossLinkData {
    #[serde(default)]
    pub source_chunk: Option<String>,
    pub source: String,
    #[serde(default)]
    pub target_chunk: Option<String>,
    pub target: String,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub(crate) fn leaf(id: &str, state: i64) -> NodeData {
        NodeData {
            id: id.to_owned(),
            name: id.to_owned(),
            state,
            children: Vec::new(),
        }
    }

    pub(crate) fn branch(id: &str, children: Vec<NodeData>) -> NodeData {
        NodeData {
            id: id.to_owned(),
            name: id.to_owned(),
            state: 0,
            children,
        }
    }

    pub(crate) fn chunk(id: &str, hierarchy: NodeData) -> ChunkData {
        ChunkData {
            id: id.to_owned(),
            hierarchy,
            links: Vec::new(),
            layout: None,
        }
    }

    pub(crate) fn aggregation(id: &str, leaves_per_branch: usize) -> ChunkData {
        let branches = ["a", "b"]
            .iter()
            .map(|suffix| {
                let leaves = (0..leaves_per_branch)
                    .map(|index| leaf(&format!("{id}-{suffix}-{index}"), (index % 4) as i64))
                    .collect();
                branch(&format!("{id}-{suffix}"), leaves)
            })
            .collect();
        chunk(id, branch(&format!("{id}-root"), branches))
    }
}
