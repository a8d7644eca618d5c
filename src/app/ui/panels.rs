use eframe::egui::{self, Align, Context, Layout};

use crate::layout::StyleKind;

use super::super::NodevisApp;

impl NodevisApp {
    pub(in crate::app) fn show(&mut self, ctx: &Context, now: f64) {
        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("nodevis");
                    ui.separator();
                    let viewport = self.world.viewport();
                    ui.label(format!("chunks: {}", viewport.get_hierarchy_list().len()));
                    ui.label(format!("nodes: {}", viewport.node_count()));
                    ui.label(format!("links: {}", viewport.links().len()));
                    ui.label(format!("revision: {}", viewport.revision()));
                    if self.last_turn.tick.retranslated > 0 {
                        ui.label(format!("floating styles: {}", self.last_turn.tick.retranslated));
                    }
                    let mut default_style = self.world.layout().default_style();
                    egui::ComboBox::from_id_salt("default_style")
                        .selected_text(default_style.description())
                        .show_ui(ui, |ui| {
                            for kind in StyleKind::ALL {
                                ui.selectable_value(&mut default_style, kind, kind.description());
                            }
                        });
                    if default_style != self.world.layout().default_style() {
                        self.world.set_default_style(default_style);
                    }
                    if ui.button("Reset zoom").clicked() {
                        self.world.viewport_mut().set_zoom(1.0);
                    }
                    ui.checkbox(&mut self.show_quadtree_overlay, "Quadtree");
                    ui.checkbox(&mut self.show_fps_bar, "FPS");
                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        ui.label(self.visible_graph_text());
                        if let Some(fps_text) = self.fps_display_text() {
                            ui.label(fps_text);
                        }
                    });
                });
            });

        egui::TopBottomPanel::bottom("status_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label(self.simulation_text());
                    if self.scene.revision != self.world.viewport().revision() {
                        ui.weak("(scene pending)");
                    }
                });
            });

        egui::SidePanel::left("toolbar")
            .resizable(true)
            .default_width(320.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    self.draw_datasources(ui, now);
                    ui.separator();
                    self.draw_chunks(ui);
                    ui.separator();
                    self.draw_toolbar(ui);
                });
            });

        egui::CentralPanel::default().show(ctx, |ui| self.draw_graph(ui));
    }
}
