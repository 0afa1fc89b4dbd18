//! The layer toggle panel.
//!
//! Every registered layer has exactly one checkbox. The checkbox and the layer visibility only
//! change together, either through [`Legend::set_checked`] (a checkbox was clicked) or through
//! [`Legend::select_all`] / [`Legend::deselect_all`].

use egui::Ui;
use log::warn;

use crate::Map;
use crate::error::ViewerError;
use crate::layers::Visibility;

/// The section of the panel a toggle is shown in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ToggleGroup {
    /// GeoJSON datasets.
    Vector,
    /// Tile datasets and base maps.
    Raster,
}

/// A checkbox bound to one layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToggleEntry {
    /// The id of the layer, which is also the id of the toggle.
    pub layer_id: String,
    /// The text shown next to the checkbox.
    pub label: String,
    /// Whether the checkbox is checked.
    pub checked: bool,
}

/// The layer toggle panel.
#[derive(Clone, Debug, Default)]
pub struct Legend {
    vector: Vec<ToggleEntry>,
    raster: Vec<ToggleEntry>,
}

impl Legend {
    /// Creates an empty legend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a toggle for `layer_id` and applies `checked` to the layer's visibility.
    pub fn add_toggle(
        &mut self,
        map: &mut Map,
        layer_id: &str,
        label: impl Into<String>,
        group: ToggleGroup,
        checked: bool,
    ) -> Result<(), ViewerError> {
        if self.entry(layer_id).is_some() {
            return Err(ViewerError::DuplicateLayer(layer_id.to_string()));
        }
        map.set_visibility(layer_id, Visibility::from_checked(checked))?;

        let entry = ToggleEntry {
            layer_id: layer_id.to_string(),
            label: label.into(),
            checked,
        };
        match group {
            ToggleGroup::Vector => self.vector.push(entry),
            ToggleGroup::Raster => self.raster.push(entry),
        }
        Ok(())
    }

    /// Handles a change of one checkbox.
    pub fn set_checked(
        &mut self,
        map: &mut Map,
        layer_id: &str,
        checked: bool,
    ) -> Result<(), ViewerError> {
        let entry = self
            .vector
            .iter_mut()
            .chain(self.raster.iter_mut())
            .find(|e| e.layer_id == layer_id)
            .ok_or_else(|| ViewerError::UnknownLayer(layer_id.to_string()))?;

        map.set_visibility(layer_id, Visibility::from_checked(checked))?;
        entry.checked = checked;
        Ok(())
    }

    /// Checks every toggle and shows every layer.
    pub fn select_all(&mut self, map: &mut Map) {
        self.set_all(map, true);
    }

    /// Unchecks every toggle and hides every layer.
    pub fn deselect_all(&mut self, map: &mut Map) {
        self.set_all(map, false);
    }

    fn set_all(&mut self, map: &mut Map, checked: bool) {
        for entry in self.vector.iter_mut().chain(self.raster.iter_mut()) {
            match map.set_visibility(&entry.layer_id, Visibility::from_checked(checked)) {
                Ok(()) => entry.checked = checked,
                Err(e) => warn!("Toggle {} has no layer: {}", entry.layer_id, e),
            }
        }
    }

    /// Returns the toggle of `layer_id`.
    pub fn entry(&self, layer_id: &str) -> Option<&ToggleEntry> {
        self.entries().find(|e| e.layer_id == layer_id)
    }

    /// Whether the toggle of `layer_id` is checked.
    pub fn is_checked(&self, layer_id: &str) -> Option<bool> {
        self.entry(layer_id).map(|e| e.checked)
    }

    /// All toggles, vector group first.
    pub fn entries(&self) -> impl Iterator<Item = &ToggleEntry> {
        self.vector.iter().chain(self.raster.iter())
    }

    /// The toggles of one group, in insertion order.
    pub fn group(&self, group: ToggleGroup) -> &[ToggleEntry] {
        match group {
            ToggleGroup::Vector => &self.vector,
            ToggleGroup::Raster => &self.raster,
        }
    }

    /// Shows the panel: a section per group and the bulk buttons.
    pub fn ui(&mut self, ui: &mut Ui, map: &mut Map) {
        let mut changes: Vec<(String, bool)> = Vec::new();

        egui::ScrollArea::vertical()
            .max_height(420.0)
            .show(ui, |ui| {
                let groups = [("Vector Layers", &self.vector), ("Base Maps", &self.raster)];
                for (heading, entries) in groups {
                    ui.strong(heading);
                    for entry in entries {
                        let mut checked = entry.checked;
                        if ui.checkbox(&mut checked, entry.label.as_str()).changed() {
                            changes.push((entry.layer_id.clone(), checked));
                        }
                    }
                    ui.add_space(4.0);
                }
            });

        for (layer_id, checked) in changes {
            if let Err(e) = self.set_checked(map, &layer_id, checked) {
                warn!("Failed to toggle {}: {}", layer_id, e);
            }
        }

        ui.separator();
        ui.horizontal(|ui| {
            if ui.button("Select All").clicked() {
                self.select_all(map);
            }
            if ui.button("Deselect All").clicked() {
                self.deselect_all(map);
            }
        });
    }
}
