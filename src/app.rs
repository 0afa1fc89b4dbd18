//! The viewer application: the map, the legend window and feature popups.

use std::sync::Arc;
use std::time::Duration;

use eframe::egui;
use egui::{Align2, Color32};

use crate::bootstrap::{BaseStyleLoader, InitStatus, Initializer, build_map};
use crate::client::DataClient;
use crate::config::ViewerSettings;
use crate::session::Session;

/// The viewer application.
pub struct ViewerApp {
    session: Session,
    initializer: Initializer,
    base_style: Option<BaseStyleLoader>,
}

impl ViewerApp {
    /// Creates the map and starts loading the manifest from `client`.
    pub fn new(settings: &ViewerSettings, client: Arc<dyn DataClient>) -> Self {
        let (map, base_style) = build_map(&settings.view, &settings.base_style);
        Self {
            session: Session::new(map),
            base_style,
            initializer: Initializer::new(
                client,
                settings.raster_ids.clone(),
                settings.show_satellite,
            ),
        }
    }

    /// The session state.
    pub fn session(&self) -> &Session {
        &self.session
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let status = self.initializer.poll(&mut self.session);
        let style_done = match &mut self.base_style {
            Some(loader) => loader.poll(self.session.map_mut()),
            None => false,
        };
        if style_done {
            self.base_style = None;
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                ui.add(self.session.map_mut());
            });

        if let Some(click) = self.session.map_mut().take_click() {
            self.session.handle_click(&click);
        }

        egui::Window::new("Layers")
            .anchor(Align2::LEFT_TOP, [10.0, 10.0])
            .resizable(false)
            .default_width(260.0)
            .show(ctx, |ui| {
                match &status {
                    InitStatus::Loading => {
                        ui.label("Loading…");
                    }
                    InitStatus::Failed(_) => {
                        ui.colored_label(Color32::RED, "Failed to load manifest");
                    }
                    InitStatus::Ready => {}
                }
                self.session.legend_ui(ui);
            });

        self.session.popup_ui(ctx);

        // Background fetches do not wake the UI up.
        if matches!(status, InitStatus::Loading) || self.base_style.is_some() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}
