use eframe::egui::Context;

use super::super::NodevisApp;

impl NodevisApp {
    pub(in crate::app) fn update_fps_counter(&mut self, ctx: &Context) {
        const FPS_SAMPLE_WINDOW: usize = 180;

        let dt = ctx.input(|input| input.stable_dt);
        if dt <= f32::EPSILON {
            return;
        }

        self.fps_current = (1.0 / dt).clamp(0.0, 1000.0);
        self.fps_samples.push_back(self.fps_current);
        while self.fps_samples.len() > FPS_SAMPLE_WINDOW {
            self.fps_samples.pop_front();
        }
    }

    pub(in crate::app) fn fps_display_text(&self) -> Option<String> {
        if !self.show_fps_bar {
            return None;
        }

        let mut parts = vec![format!("FPS {:.0}", self.fps_current)];
        if !self.fps_samples.is_empty() {
            let avg = self.fps_samples.iter().sum::<f32>() / self.fps_samples.len() as f32;
            parts.push(format!("avg {avg:.1}"));
        }
        if self.fps_current > f32::EPSILON {
            parts.push(format!("{:.1} ms", 1000.0 / self.fps_current));
        }
        Some(parts.join(" | "))
    }

    pub(in crate::app) fn visible_graph_text(&self) -> String {
        format!(
            "visible: {} / {} nodes, {} / {} links",
            self.visible_node_count,
            self.scene.nodes.len(),
            self.visible_link_count,
            self.scene.links.len()
        )
    }

    pub(in crate::app) fn simulation_text(&self) -> String {
        let simulation = self.world.simulation();
        format!(
            "{:?}  alpha {:.3}  ticks {}  restarts {}  scene refreshes {}",
            simulation.phase(),
            simulation.alpha(),
            simulation.tick_count(),
            simulation.restart_count(),
            self.scene.refreshes
        )
    }
}
