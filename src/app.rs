use anyhow::Result;
use eframe::egui;

use crate::setup::ViewerSetup;
use crate::state::AppState;
use crate::ui::panels;
use crate::ui::viewport::Viewport;

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct IsoViewApp {
    pub state: AppState,
    viewport: Viewport,
}

impl IsoViewApp {
    /// Assemble the pipeline with `ctx` as its redraw surface.
    pub fn new(ctx: egui::Context, setup: ViewerSetup) -> Result<Self> {
        let (controller, panel) = setup.build(ctx)?;
        log::info!(
            "Opened {} view with {} slider(s)",
            setup.mode.name(),
            panel.bindings().len()
        );
        let state = AppState::new(controller, panel, setup.mode.name(), setup.config.background);
        Ok(Self {
            state,
            viewport: Viewport::default(),
        })
    }
}

impl eframe::App for IsoViewApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: toolbar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &self.state, &mut self.viewport);
        });

        // ---- Bottom panel: sliders ----
        egui::TopBottomPanel::bottom("control_panel")
            .resizable(false)
            .show(ctx, |ui| {
                panels::control_panel(ui, &mut self.state);
            });

        // ---- Central panel: 3D view ----
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                self.viewport.show(ui, &self.state);
            });
    }
}
