mod layouting;
mod search;

use std::collections::BTreeMap;

use crate::layout::StyleKind;
use crate::viewport::MonitoringState;
use crate::world::World;

pub use layouting::LayoutingPlugin;
pub use search::SearchAggregationsPlugin;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PluginKind {
    SearchAggregations,
    Layouting,
}

/// One rendered element of a plugin's content container.
#[derive(Clone, Debug, PartialEq)]
pub enum ContentBlock {
    Heading(String),
    Line(String),
    /// A selectable search hit; `index` is what hover and click events carry.
    Entry {
        index: usize,
        name: String,
        state: MonitoringState,
    },
    Choice {
        label: String,
        style: Option<StyleKind>,
        selected: bool,
    },
    Notice(String),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PluginContent {
    blocks: Vec<ContentBlock>,
}

impl PluginContent {
    pub fn blocks(&self) -> &[ContentBlock] {
        &self.blocks
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
    }

    pub fn push(&mut self, block: ContentBlock) {
        self.blocks.push(block);
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ToolbarEvent {
    Input(String),
    Hover(usize),
    MouseOut,
    Click(usize),
    SelectStyle(Option<StyleKind>),
}

/// Activation flag and content container shared by every plugin.
#[derive(Debug, Default)]
pub struct PluginBase {
    active: bool,
    content: Option<PluginContent>,
}

impl PluginBase {
    pub fn new(active: bool) -> Self {
        Self {
            active,
            content: None,
        }
    }

    pub fn is_setup(&self) -> bool {
        self.content.is_some()
    }

    fn setup_selections(&mut self) {
        if self.content.is_none() {
            self.content = Some(PluginContent::default());
        }
    }

    /// The plugin's content container.
    ///
    /// # Panics
    ///
    /// Panics when called before the toolbar set the container up.
    pub fn div_selection(&mut self) -> &mut PluginContent {
        match self.content.as_mut() {
            Some(content) => content,
            None => panic!("div_selection() called before setup_selections()"),
        }
    }

    pub fn content(&self) -> Option<&PluginContent> {
        self.content.as_ref()
    }
}

pub trait ToolbarPlugin {
    fn kind(&self) -> PluginKind;

    fn id(&self) -> &'static str;

    fn title(&self) -> &'static str;

    fn base(&self) -> &PluginBase;

    fn base_mut(&mut self) -> &mut PluginBase;

    fn has_toggle_button(&self) -> bool {
        true
    }

    fn sort_index(&self) -> i32 {
        10
    }

    fn is_active(&self) -> bool {
        self.base().active
    }

    fn enable_actions(&mut self, _world: &mut World) {}

    fn disable_actions(&mut self, _world: &mut World) {}

    fn render_content(&mut self, world: &World);

    fn handle_event(&mut self, world: &mut World, event: &ToolbarEvent);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ToggleButton {
    pub pressed: bool,
}

struct PluginSlot {
    plugin: Box<dyn ToolbarPlugin>,
    button: Option<ToggleButton>,
    registered: usize,
}

/// Typed plugin registry, one instance per plugin kind.
#[derive(Default)]
pub struct Toolbar {
    slots: BTreeMap<PluginKind, PluginSlot>,
}

impl Toolbar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Box<dyn ToolbarPlugin>) -> bool {
        let kind = plugin.kind();
        if self.slots.contains_key(&kind) {
            return false;
        }
        let registered = self.slots.len();
        self.slots.insert(
            kind,
            PluginSlot {
                plugin,
                button: None,
                registered,
            },
        );
        true
    }

    pub fn plugin(&self, kind: PluginKind) -> Option<&dyn ToolbarPlugin> {
        self.slots.get(&kind).map(|slot| slot.plugin.as_ref())
    }

    pub fn button(&self, kind: PluginKind) -> Option<ToggleButton> {
        self.slots.get(&kind).and_then(|slot| slot.button)
    }

    /// Creates missing containers and buttons, then re-renders every active
    /// plugin.
    pub fn update_toolbar_plugins(&mut self, world: &World) {
        for slot in self.slots.values_mut() {
            if !slot.plugin.base().is_setup() {
                slot.plugin.base_mut().setup_selections();
                log::debug!("set up toolbar plugin {}", slot.plugin.id());
            }
            if slot.plugin.has_toggle_button() && slot.button.is_none() {
                slot.button = Some(ToggleButton {
                    pressed: slot.plugin.is_active(),
                });
            }
            if slot.plugin.is_active() {
                slot.plugin.render_content(world);
            }
        }
    }

    pub fn enable(&mut self, kind: PluginKind, world: &mut World) -> bool {
        let Some(slot) = self.slots.get_mut(&kind) else {
            return false;
        };
        slot.plugin.base_mut().setup_selections();
        slot.plugin.base_mut().active = true;
        slot.plugin.enable_actions(world);
        slot.plugin.render_content(world);
        if let Some(button) = slot.button.as_mut() {
            button.pressed = true;
        }
        true
    }

    pub fn disable(&mut self, kind: PluginKind, world: &mut World) -> bool {
        let Some(slot) = self.slots.get_mut(&kind) else {
            return false;
        };
        slot.plugin.base_mut().setup_selections();
        slot.plugin.base_mut().active = false;
        slot.plugin.disable_actions(world);
        slot.plugin.base_mut().div_selection().clear();
        if let Some(button) = slot.button.as_mut() {
            button.pressed = false;
        }
        true
    }

    pub fn toggle(&mut self, kind: PluginKind, world: &mut World) -> bool {
        match self.plugin(kind).map(|plugin| plugin.is_active()) {
            Some(true) => self.disable(kind, world),
            Some(false) => self.enable(kind, world),
            None => false,
        }
    }

    /// Ascending `sort_index`, ties in registration order.
    pub fn sorted_plugins(&self) -> Vec<&dyn ToolbarPlugin> {
        let mut slots = self.slots.values().collect::<Vec<_>>();
        slots.sort_by_key(|slot| slot.registered);
        slots.sort_by_key(|slot| slot.plugin.sort_index());
        slots.into_iter().map(|slot| slot.plugin.as_ref()).collect()
    }

    /// Routes a UI event to one plugin and re-renders it if active.
    pub fn dispatch(&mut self, kind: PluginKind, world: &mut World, event: &ToolbarEvent) {
        let Some(slot) = self.slots.get_mut(&kind) else {
            return;
        };
        slot.plugin.handle_event(world, event);
        if slot.plugin.is_active() && slot.plugin.base().is_setup() {
            slot.plugin.render_content(world);
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use serde_json::Value;

    use crate::config::EngineConfig;
    use crate::datasource::{FetchError, FetchResponse, Transport};
    use crate::simulation::GuiLayers;
    use crate::viewport::Viewport;
    use crate::world::World;

    struct NoTransport;

    impl Transport for NoTransport {
        fn fetch(&self, _url: &str, _params: &Value) -> Result<FetchResponse, FetchError> {
            Ok(FetchResponse::ok(Value::Null))
        }
    }

    pub(crate) struct NoGui;

    impl GuiLayers for NoGui {
        fn update_gui_of_layers(&mut self, _viewport: &Viewport) {}
    }

    pub(crate) fn world_with(payload: Value, height: f32) -> World {
        let mut world = World::new(EngineConfig::default(), Arc::new(NoTransport), [800.0, height]);
        world.queue_payload(payload);
        world.turn(0.0, &mut NoGui);
        world
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use serde_json::json;

    use super::test_support::world_with;
    use super::*;

    struct Recorder {
        kind: PluginKind,
        base: PluginBase,
        toggle: bool,
        sort_index: i32,
        calls: Rc<RefCell<Vec<&'static str>>>,
    }

    impl Recorder {
        fn new(kind: PluginKind, toggle: bool, sort_index: i32) -> Self {
            Self {
                kind,
                base: PluginBase::new(false),
                toggle,
                sort_index,
                calls: Rc::default(),
            }
        }
    }

    impl ToolbarPlugin for Recorder {
        fn kind(&self) -> PluginKind {
            self.kind
        }

        fn id(&self) -> &'static str {
            "recorder"
        }

        fn title(&self) -> &'static str {
            "Recorder"
        }

        fn base(&self) -> &PluginBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut PluginBase {
            &mut self.base
        }

        fn has_toggle_button(&self) -> bool {
            self.toggle
        }

        fn sort_index(&self) -> i32 {
            self.sort_index
        }

        fn enable_actions(&mut self, _world: &mut World) {
            self.calls.borrow_mut().push("enable");
        }

        fn disable_actions(&mut self, _world: &mut World) {
            self.calls.borrow_mut().push("disable");
        }

        fn render_content(&mut self, _world: &World) {
            self.calls.borrow_mut().push("render");
            let content = self.base.div_selection();
            content.clear();
            content.push(ContentBlock::Line("recorder".to_owned()));
        }

        fn handle_event(&mut self, _world: &mut World, _event: &ToolbarEvent) {
            self.calls.borrow_mut().push("event");
        }
    }

    fn empty_world() -> World {
        world_with(json!({"chunks": []}), 600.0)
    }

    #[test]
    fn registration_is_idempotent_per_kind() {
        let mut toolbar = Toolbar::new();

        assert!(toolbar.register(Box::new(Recorder::new(PluginKind::Layouting, true, 1))));
        assert!(!toolbar.register(Box::new(Recorder::new(PluginKind::Layouting, false, 2))));

        assert_eq!(toolbar.sorted_plugins().len(), 1);
        assert_eq!(
            toolbar.plugin(PluginKind::Layouting).map(|plugin| plugin.sort_index()),
            Some(1)
        );
    }

    #[test]
    fn containers_and_buttons_are_created_once() {
        let world = empty_world();
        let mut toolbar = Toolbar::new();
        toolbar.register(Box::new(Recorder::new(PluginKind::Layouting, true, 1)));
        toolbar.register(Box::new(Recorder::new(PluginKind::SearchAggregations, false, 0)));

        toolbar.update_toolbar_plugins(&world);
        toolbar.update_toolbar_plugins(&world);

        assert_eq!(toolbar.button(PluginKind::Layouting), Some(ToggleButton::default()));
        assert_eq!(toolbar.button(PluginKind::SearchAggregations), None);
        assert!(
            toolbar
                .plugin(PluginKind::SearchAggregations)
                .is_some_and(|plugin| plugin.base().is_setup())
        );
    }

    #[test]
    fn enable_then_disable_restores_the_initial_state() {
        let mut world = empty_world();
        let mut toolbar = Toolbar::new();
        let recorder = Recorder::new(PluginKind::Layouting, true, 1);
        let calls = Rc::clone(&recorder.calls);
        toolbar.register(Box::new(recorder));
        toolbar.update_toolbar_plugins(&world);
        let content_of = |toolbar: &Toolbar| {
            toolbar
                .plugin(PluginKind::Layouting)
                .and_then(|plugin| plugin.base().content().cloned())
        };
        let initial = content_of(&toolbar);

        assert!(toolbar.toggle(PluginKind::Layouting, &mut world));
        assert_eq!(toolbar.button(PluginKind::Layouting), Some(ToggleButton { pressed: true }));
        assert!(content_of(&toolbar).is_some_and(|content| !content.is_empty()));

        assert!(toolbar.toggle(PluginKind::Layouting, &mut world));
        assert_eq!(toolbar.button(PluginKind::Layouting), Some(ToggleButton { pressed: false }));
        assert_eq!(content_of(&toolbar), initial);
        assert!(content_of(&toolbar).is_some_and(|content| content.is_empty()));
        assert!(
            !toolbar
                .plugin(PluginKind::Layouting)
                .is_some_and(|plugin| plugin.is_active())
        );
        assert_eq!(*calls.borrow(), ["enable", "render", "disable"]);
    }

    #[test]
    fn sorted_by_index_then_registration() {
        let mut toolbar = Toolbar::new();
        toolbar.register(Box::new(Recorder::new(PluginKind::Layouting, true, 5)));
        toolbar.register(Box::new(Recorder::new(PluginKind::SearchAggregations, false, 5)));

        let order = toolbar
            .sorted_plugins()
            .iter()
            .map(|plugin| plugin.kind())
            .collect::<Vec<_>>();
        assert_eq!(order, [PluginKind::Layouting, PluginKind::SearchAggregations]);

        let mut toolbar = Toolbar::new();
        toolbar.register(Box::new(Recorder::new(PluginKind::Layouting, true, 5)));
        toolbar.register(Box::new(Recorder::new(PluginKind::SearchAggregations, false, 1)));
        assert_eq!(
            toolbar.sorted_plugins()[0].kind(),
            PluginKind::SearchAggregations
        );
    }

    #[test]
    fn dispatch_rerenders_only_active_plugins() {
        let mut world = empty_world();
        let mut toolbar = Toolbar::new();
        toolbar.register(Box::new(Recorder::new(PluginKind::Layouting, true, 1)));
        toolbar.update_toolbar_plugins(&world);

        toolbar.dispatch(PluginKind::Layouting, &mut world, &ToolbarEvent::MouseOut);
        assert!(
            toolbar
                .plugin(PluginKind::Layouting)
                .and_then(|plugin| plugin.base().content())
                .is_some_and(PluginContent::is_empty)
        );

        toolbar.enable(PluginKind::Layouting, &mut world);
        toolbar.dispatch(PluginKind::Layouting, &mut world, &ToolbarEvent::MouseOut);
        assert!(
            toolbar
                .plugin(PluginKind::Layouting)
                .and_then(|plugin| plugin.base().content())
                .is_some_and(|content| !content.is_empty())
        );
    }

    #[test]
    #[should_panic(expected = "before setup_selections")]
    fn content_access_before_setup_panics() {
        let mut base = PluginBase::new(true);
        base.div_selection();
    }
}
