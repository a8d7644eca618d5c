use clap::ValueEnum;
use eframe::egui::{self, RichText, Ui};

use crate::datasource::DatasourceKind;
use crate::toolbar::{ContentBlock, PluginKind, ToolbarEvent};
use crate::util::format_latency;

use super::super::NodevisApp;
use super::super::render_utils::state_color;

impl NodevisApp {
    pub(in crate::app) fn draw_datasources(&mut self, ui: &mut Ui, now: f64) {
        ui.heading("Datasources");
        let kinds = self.world.datasources().kinds().to_vec();
        if kinds.is_empty() {
            ui.weak("No datasource registered.");
        }

        for kind in kinds {
            let Some(datasource) = self.world.datasources().get(kind) else {
                continue;
            };
            let mut enabled = datasource.is_enabled();
            let age = datasource
                .last_update()
                .map_or_else(|| "never".to_owned(), |last| format!("{:.0} s ago", now - last));
            let latency = datasource.fetch_latency().map(format_latency);
            let error = datasource.last_error().map(str::to_owned);
            let in_flight = datasource.in_flight();
            let interval = kind
                .supports_periodic_updates()
                .then(|| datasource.update_interval());
            let source = format!(
                "{} ({} subscribers)",
                datasource.target().map_or("no target", |target| target.url.as_str()),
                datasource.subscriber_count()
            );

            ui.horizontal(|ui| {
                if ui.checkbox(&mut enabled, kind.name()).changed() {
                    if enabled {
                        self.world.datasources_mut().enable(kind);
                    } else {
                        self.world.datasources_mut().disable(kind);
                    }
                }
                if in_flight > 0 {
                    ui.spinner();
                }
                if ui.small_button("Fetch now").clicked() {
                    self.world.request(kind, now);
                }
                if ui.small_button("Remove").clicked() {
                    self.world.remove_datasource(kind);
                }
            });
            ui.weak(source);
            match interval {
                Some(interval) => ui.label(format!("updated {age}, every {interval:.0} s")),
                None => ui.label(format!("updated {age}, on demand")),
            };
            if let Some(latency) = latency {
                ui.label(format!("latency {latency}"));
            }
            if let Some(error) = error {
                ui.colored_label(egui::Color32::from_rgb(238, 67, 67), error);
            }
        }

        let missing = DatasourceKind::value_variants()
            .iter()
            .copied()
            .filter(|kind| self.world.datasources().get(*kind).is_none())
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            ui.horizontal(|ui| {
                for kind in missing {
                    if ui.small_button(format!("Add {kind}")).clicked() {
                        self.world.add_datasource(kind);
                        self.world.request(kind, now);
                    }
                }
            });
        }
    }

    pub(in crate::app) fn draw_chunks(&mut self, ui: &mut Ui) {
        ui.heading("Chunks");
        let ids = self
            .world
            .viewport()
            .get_hierarchy_list()
            .iter()
            .map(|chunk| (chunk.id.clone(), chunk.nodes.len()))
            .collect::<Vec<_>>();
        if ids.is_empty() {
            ui.weak("Nothing loaded yet.");
            return;
        }

        for (id, nodes) in ids {
            ui.horizontal(|ui| {
                ui.label(format!("{id}  ({nodes} nodes)"));
                if ui.small_button("Hide").clicked() {
                    self.world.hide_chunk(&id);
                }
            });
        }
    }

    pub(in crate::app) fn draw_toolbar(&mut self, ui: &mut Ui) {
        let mut hovered_now = None;

        for plugin in self.toolbar.sorted_plugins() {
            let kind = plugin.kind();
            ui.add_space(6.0);
            ui.horizontal(|ui| {
                ui.heading(plugin.title());
                if let Some(button) = self.toolbar.button(kind) {
                    let label = if button.pressed { "Disable" } else { "Enable" };
                    if ui.selectable_label(button.pressed, label).clicked() {
                        self.pending_toggles.push(kind);
                    }
                }
            });

            if kind == PluginKind::SearchAggregations && plugin.is_active() {
                let response = ui.add(
                    egui::TextEdit::singleline(&mut self.search).hint_text("Search node names"),
                );
                if response.changed() {
                    self.pending_events
                        .push((kind, ToolbarEvent::Input(self.search.clone())));
                }
            }

            let Some(content) = plugin.base().content() else {
                continue;
            };
            for block in content.blocks() {
                match block {
                    ContentBlock::Heading(text) => {
                        ui.strong(text);
                    }
                    ContentBlock::Line(text) => {
                        ui.label(text);
                    }
                    ContentBlock::Entry { index, name, state } => {
                        let text = RichText::new(format!("{name}  [{}]", state.label()))
                            .color(state_color(*state));
                        let response = ui.selectable_label(false, text);
                        if response.hovered() {
                            hovered_now = Some(*index);
                        }
                        if response.clicked() {
                            self.pending_events.push((kind, ToolbarEvent::Click(*index)));
                        }
                    }
                    ContentBlock::Choice {
                        label,
                        style,
                        selected,
                    } => {
                        if ui.radio(*selected, label).clicked() {
                            self.pending_events
                                .push((kind, ToolbarEvent::SelectStyle(*style)));
                        }
                    }
                    ContentBlock::Notice(text) => {
                        ui.label(RichText::new(text).italics().weak());
                    }
                }
            }
        }

        if hovered_now != self.hovered_entry {
            let event = match hovered_now {
                Some(index) => ToolbarEvent::Hover(index),
                None => ToolbarEvent::MouseOut,
            };
            self.pending_events.push((PluginKind::SearchAggregations, event));
            self.hovered_entry = hovered_now;
        }
    }
}
