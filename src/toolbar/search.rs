use crate::viewport::{MonitoringState, NodeRef, Viewport};
use crate::world::World;

use super::{ContentBlock, PluginBase, PluginKind, ToolbarEvent, ToolbarPlugin};

const ROW_BLOCK_HEIGHT: f32 = 240.0;
const ROWS_PER_BLOCK: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchResult {
    pub name: String,
    pub state: MonitoringState,
    pub chunk_id: String,
    pub node_id: String,
}

/// How many results fit into a viewport of `height`: ten per 240 pixels,
/// never fewer than ten.
pub fn result_cap(height: f32) -> usize {
    let blocks = (height.max(0.0) / ROW_BLOCK_HEIGHT).floor() as usize;
    (blocks * ROWS_PER_BLOCK).max(ROWS_PER_BLOCK)
}

/// Case-insensitive substring match over every node name in viewport order.
pub fn filter_nodes(viewport: &Viewport, query: &str) -> Vec<SearchResult> {
    let needle = query.to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    viewport
        .iter_nodes()
        .filter(|(_, node)| node.name.to_lowercase().contains(&needle))
        .map(|(_, node)| SearchResult {
            name: node.name.clone(),
            state: node.state,
            chunk_id: node.chunk_id.clone(),
            node_id: node.id.clone(),
        })
        .collect()
}

pub struct SearchAggregationsPlugin {
    base: PluginBase,
    query: String,
    matches: Vec<SearchResult>,
    shown: usize,
    hovered: Option<(String, String)>,
}

impl Default for SearchAggregationsPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchAggregationsPlugin {
    pub fn new() -> Self {
        Self {
            base: PluginBase::new(true),
            query: String::new(),
            matches: Vec::new(),
            shown: 0,
            hovered: None,
        }
    }

    pub fn shown_results(&self) -> &[SearchResult] {
        &self.matches[..self.shown]
    }

    fn updated_search(&mut self, viewport: &Viewport) {
        self.matches = filter_nodes(viewport, &self.query);
        self.shown = self.matches.len().min(result_cap(viewport.height()));
    }

    /// Node refs go stale on every swap, so hits are resolved on use.
    fn resolve(&self, viewport: &Viewport, index: usize) -> Option<NodeRef> {
        self.shown_results()
            .get(index)
            .and_then(|hit| viewport.find_node(&hit.chunk_id, &hit.node_id))
    }

    fn clear_hover(&mut self, viewport: &mut Viewport) {
        if let Some(node) = self
            .hovered
            .take()
            .and_then(|(chunk_id, node_id)| viewport.find_node(&chunk_id, &node_id))
        {
            viewport.set_node_highlight(node, false);
        }
    }
}

impl ToolbarPlugin for SearchAggregationsPlugin {
    fn kind(&self) -> PluginKind {
        PluginKind::SearchAggregations
    }

    fn id(&self) -> &'static str {
        "search_aggregations"
    }

    fn title(&self) -> &'static str {
        "Search nodes"
    }

    fn base(&self) -> &PluginBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut PluginBase {
        &mut self.base
    }

    fn has_toggle_button(&self) -> bool {
        false
    }

    fn sort_index(&self) -> i32 {
        5
    }

    fn disable_actions(&mut self, world: &mut World) {
        self.clear_hover(world.viewport_mut());
    }

    fn render_content(&mut self, world: &World) {
        if !self.query.is_empty() {
            self.updated_search(world.viewport());
        }

        let shown = self.shown;
        let total = self.matches.len();
        let content = self.base.div_selection();
        content.clear();
        if self.query.is_empty() {
            return;
        }

        content.push(ContentBlock::Heading(format!("Matches for \"{}\"", self.query)));
        for (index, hit) in self.matches[..shown].iter().enumerate() {
            content.push(ContentBlock::Entry {
                index,
                name: hit.name.clone(),
                state: hit.state,
            });
        }
        if total > shown {
            content.push(ContentBlock::Notice(format!("{shown} of {total} matches shown")));
        }
    }

    fn handle_event(&mut self, world: &mut World, event: &ToolbarEvent) {
        match event {
            ToolbarEvent::Input(query) => {
                self.clear_hover(world.viewport_mut());
                self.query = query.clone();
                if query.is_empty() {
                    self.matches.clear();
                    self.shown = 0;
                } else {
                    self.updated_search(world.viewport());
                }
            }
            ToolbarEvent::Hover(index) => {
                self.clear_hover(world.viewport_mut());
                if let Some(node) = self.resolve(world.viewport(), *index)
                    && world.viewport_mut().set_node_highlight(node, true)
                {
                    let hit = &self.shown_results()[*index];
                    self.hovered = Some((hit.chunk_id.clone(), hit.node_id.clone()));
                }
            }
            ToolbarEvent::MouseOut => self.clear_hover(world.viewport_mut()),
            ToolbarEvent::Click(index) => {
                if let Some(node) = self.resolve(world.viewport(), *index) {
                    world.viewport_mut().zoom_to_node(node);
                }
            }
            ToolbarEvent::SelectStyle(_) => {}
        }
    }
}
