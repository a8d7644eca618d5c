use crate::layout::StyleKind;
use crate::world::World;

use super::{ContentBlock, PluginBase, PluginKind, ToolbarEvent, ToolbarPlugin};

/// Layout configuration box: converts every node to one style at a time.
pub struct LayoutingPlugin {
    base: PluginBase,
    selected: Option<Option<StyleKind>>,
}

impl Default for LayoutingPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutingPlugin {
    pub fn new() -> Self {
        Self {
            base: PluginBase::new(false),
            selected: None,
        }
    }
}

impl ToolbarPlugin for LayoutingPlugin {
    fn kind(&self) -> PluginKind {
        PluginKind::Layouting
    }

    fn id(&self) -> &'static str {
        "layouting_toolbar"
    }

    fn title(&self) -> &'static str {
        "Modify Layout"
    }

    fn base(&self) -> &PluginBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut PluginBase {
        &mut self.base
    }

    fn enable_actions(&mut self, world: &mut World) {
        log::debug!(
            "layout editing enabled with {} active styles",
            world.layout().active_styles().count()
        );
    }

    fn disable_actions(&mut self, _world: &mut World) {
        self.selected = None;
    }

    fn render_content(&mut self, world: &World) {
        let selected = self.selected;
        let default_style = world.layout().default_style();
        let styles = world.layout().active_styles().count();
        let alpha = world.simulation().alpha();
        let phase = world.simulation().phase();

        let content = self.base.div_selection();
        content.clear();
        content.push(ContentBlock::Heading("Layout Configuration".to_owned()));
        content.push(ContentBlock::Choice {
            label: "Free floating".to_owned(),
            style: None,
            selected: selected == Some(None),
        });
        for kind in StyleKind::ALL {
            if kind == StyleKind::Force {
                continue;
            }
            content.push(ContentBlock::Choice {
                label: kind.description().to_owned(),
                style: Some(kind),
                selected: selected == Some(Some(kind)),
            });
        }
        content.push(ContentBlock::Line(format!(
            "{styles} active styles, chunk default {default_style}"
        )));
        content.push(ContentBlock::Line(format!("Simulation {phase:?}, alpha {alpha:.3}")));
    }

    fn handle_event(&mut self, world: &mut World, event: &ToolbarEvent) {
        let ToolbarEvent::SelectStyle(kind) = event else {
            return;
        };
        if !self.is_active() {
            return;
        }
        world.convert_all(*kind);
        self.selected = Some(*kind);
        log::info!(
            "converted all nodes to {}",
            kind.map_or("free floating", StyleKind::type_name)
        );
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::toolbar::Toolbar;
    use crate::toolbar::test_support::world_with;

    fn world() -> World {
        world_with(
            json!({"chunks": [{
                "id": "bi",
                "hierarchy": {"id": "root", "children": [{"id": "a"}, {"id": "b"}]}
            }]}),
            600.0,
        )
    }

    #[test]
    fn selecting_fixed_pins_every_node() {
        let mut world = world();
        let mut toolbar = Toolbar::new();
        toolbar.register(Box::new(LayoutingPlugin::new()));
        toolbar.update_toolbar_plugins(&world);
        toolbar.enable(PluginKind::Layouting, &mut world);

        toolbar.dispatch(
            PluginKind::Layouting,
            &mut world,
            &ToolbarEvent::SelectStyle(Some(StyleKind::Fixed)),
        );

        assert_eq!(world.layout().active_styles().count(), 3);
        assert!(world.viewport().iter_nodes().all(|(_, node)| !node.is_free()));
        let selected = toolbar
            .plugin(PluginKind::Layouting)
            .and_then(|plugin| plugin.base().content())
            .map(|content| {
                content
                    .blocks()
                    .iter()
                    .filter(|block| matches!(block, ContentBlock::Choice { selected: true, .. }))
                    .count()
            });
        assert_eq!(selected, Some(1));
    }

    #[test]
    fn inactive_plugin_ignores_style_selection() {
        let mut world = world();
        let mut toolbar = Toolbar::new();
        toolbar.register(Box::new(LayoutingPlugin::new()));
        toolbar.update_toolbar_plugins(&world);
        let before = world.layout().active_styles().count();

        toolbar.dispatch(
            PluginKind::Layouting,
            &mut world,
            &ToolbarEvent::SelectStyle(None),
        );

        assert_eq!(world.layout().active_styles().count(), before);
    }
}
