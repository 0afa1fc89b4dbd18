#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // hide console window on Windows in release

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use eframe::egui;
use manifest_map_view::app::ViewerApp;
use manifest_map_view::client::{DataClient, DirectoryClient, HttpClient};
use manifest_map_view::config::{BaseStyle, DataLocation, MapView, ViewerSettings};

#[derive(Parser, Debug)]
#[command(name = "manifest-map-view")]
#[command(about = "Shows the datasets listed in a manifest on an interactive map", version)]
struct Cli {
    /// Base URL of the data server.
    #[arg(long, value_name = "URL", conflicts_with = "data_dir")]
    server: Option<String>,

    /// Directory of .geojson files to show instead of a server.
    #[arg(long = "data-dir", value_name = "PATH")]
    data_dir: Option<PathBuf>,

    /// Initial longitude of the map center.
    #[arg(long = "center-lng", allow_negative_numbers = true)]
    center_lng: Option<f64>,

    /// Initial latitude of the map center.
    #[arg(long = "center-lat", allow_negative_numbers = true)]
    center_lat: Option<f64>,

    /// Initial zoom level.
    #[arg(long)]
    zoom: Option<u8>,

    /// Raster dataset id to show when the manifest lists it. Can be repeated.
    #[arg(long = "raster", value_name = "ID")]
    rasters: Vec<String>,

    /// URL of a style or TileJSON document to take the base tiles from.
    #[arg(long = "style-url", value_name = "URL")]
    style_url: Option<String>,

    /// Show the satellite imagery overlay at startup.
    #[arg(long = "show-satellite")]
    show_satellite: bool,
}

impl Cli {
    fn into_settings(self) -> ViewerSettings {
        let defaults = ViewerSettings::default();

        let data = match (self.server, self.data_dir) {
            (_, Some(dir)) => DataLocation::Directory(dir),
            (Some(url), None) => DataLocation::Server(url),
            (None, None) => defaults.data,
        };

        let mut view = MapView::default();
        if let Some(lon) = self.center_lng {
            view.center.lon = lon;
        }
        if let Some(lat) = self.center_lat {
            view.center.lat = lat;
        }
        if let Some(zoom) = self.zoom {
            view.zoom = zoom;
        }

        ViewerSettings {
            data,
            view,
            base_style: self
                .style_url
                .map(|url| BaseStyle::Remote { url })
                .unwrap_or_default(),
            raster_ids: self.rasters,
            show_satellite: self.show_satellite,
        }
    }
}

fn main() -> eframe::Result {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Cli::parse().into_settings();
    log::info!("Reading datasets from {:?}", settings.data);

    let client: Arc<dyn DataClient> = match &settings.data {
        DataLocation::Server(url) => Arc::new(HttpClient::new(url.as_str())),
        DataLocation::Directory(dir) => Arc::new(DirectoryClient::new(dir)),
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1024.0, 768.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Manifest Map View",
        options,
        Box::new(move |_cc| Ok(Box::new(ViewerApp::new(&settings, client)))),
    )
}
