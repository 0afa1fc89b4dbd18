//! Layer colors.
//!
//! Land cover categories have fixed colors. Everything else takes the next color of a small
//! qualitative palette, in the order categories are first registered across all datasets.

use egui::Color32;

/// Colors handed out to categories without a fixed color, cycling.
pub const FALLBACK_PALETTE: [Color32; 8] = [
    Color32::from_rgb(0xe4, 0x1a, 0x1c),
    Color32::from_rgb(0x37, 0x7e, 0xb8),
    Color32::from_rgb(0x4d, 0xaf, 0x4a),
    Color32::from_rgb(0x98, 0x4e, 0xa3),
    Color32::from_rgb(0xff, 0x7f, 0x00),
    Color32::from_rgb(0xff, 0xff, 0x33),
    Color32::from_rgb(0xa6, 0x56, 0x28),
    Color32::from_rgb(0xf7, 0x81, 0xbf),
];

/// Returns the fixed color of a known category.
pub fn known_color(category: &str) -> Option<Color32> {
    let color = match category {
        "WATER" | "WTR" => Color32::from_rgb(0x00, 0x77, 0xbe),
        "TREES" => Color32::from_rgb(0x22, 0x8b, 0x22),
        "GRASS" | "GRS" => Color32::from_rgb(0x00, 0xff, 0x00),
        "FOREST" | "FRT" => Color32::from_rgb(0x00, 0x64, 0x00),
        "WETLAND" | "WTD" => Color32::from_rgb(0xdd, 0xa0, 0xdd),
        "SHRUBS" | "SHR" => Color32::from_rgb(0xa0, 0x52, 0x2d),
        "FLOODED_VEGETATION" => Color32::from_rgb(0xa0, 0x20, 0xf0),
        "CROPS" | "AGR" => Color32::from_rgb(0xda, 0xa5, 0x20),
        "BUILT" | "BLT" => Color32::from_rgb(0x80, 0x80, 0x80),
        "BARE" | "BRE" => Color32::from_rgb(0xd2, 0xb4, 0x8c),
        "SNOW_AND_ICE" => Color32::from_rgb(0xff, 0xfa, 0xfa),
        "GREEN_INFRASTRUCTURE" => Color32::from_rgb(0x00, 0xff, 0x7f),
        "PARKS_AND_OPEN_SPACES" => Color32::from_rgb(0x90, 0xee, 0x90), // lightgreen
        "TURF" => Color32::from_rgb(0x98, 0xfb, 0x98),                  // palegreen
        "RIPARIAN" => Color32::from_rgb(0x80, 0x00, 0x80),              // purple
        "DRAINAGE_SWALES" => Color32::from_rgb(0xc3, 0xcd, 0x32),
        "OK_PARKS" => Color32::from_rgb(0xff, 0x63, 0x47),
        _ => return None,
    };
    Some(color)
}

/// Hands out layer colors. The fallback position advances every time a color is taken from the
/// palette, so the result depends on registration order.
#[derive(Clone, Debug, Default)]
pub struct ColorAssigner {
    next_fallback: usize,
}

impl ColorAssigner {
    /// Creates an assigner starting at the first palette color.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next palette color.
    pub fn next_fallback(&mut self) -> Color32 {
        let color = FALLBACK_PALETTE[self.next_fallback % FALLBACK_PALETTE.len()];
        self.next_fallback += 1;
        color
    }

    /// Returns the fixed color of `category`, or the next palette color for unknown categories.
    pub fn color_for(&mut self, category: &str) -> Color32 {
        known_color(category).unwrap_or_else(|| self.next_fallback())
    }

    /// How many palette colors have been handed out.
    pub fn fallbacks_used(&self) -> usize {
        self.next_fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_categories_use_fixed_colors() {
        let mut colors = ColorAssigner::new();
        assert_eq!(colors.color_for("WATER"), Color32::from_rgb(0x00, 0x77, 0xbe));
        assert_eq!(colors.color_for("WTR"), Color32::from_rgb(0x00, 0x77, 0xbe));
        assert_eq!(colors.color_for("TURF"), Color32::from_rgb(0x98, 0xfb, 0x98));
        assert_eq!(colors.fallbacks_used(), 0);
    }

    #[test]
    fn unknown_categories_cycle_through_palette() {
        let mut colors = ColorAssigner::new();
        let assigned: Vec<Color32> = (0..9)
            .map(|i| colors.color_for(&format!("CLASS_{i}")))
            .collect();

        assert_eq!(&assigned[..8], &FALLBACK_PALETTE[..]);
        // The ninth unknown category reuses the first color.
        assert_eq!(assigned[8], FALLBACK_PALETTE[0]);
    }

    #[test]
    fn known_categories_do_not_advance_the_palette() {
        let mut colors = ColorAssigner::new();
        assert_eq!(colors.color_for("UNKNOWN_A"), FALLBACK_PALETTE[0]);
        colors.color_for("BUILT");
        assert_eq!(colors.color_for("UNKNOWN_B"), FALLBACK_PALETTE[1]);
        assert_eq!(colors.next_fallback(), FALLBACK_PALETTE[2]);
    }

    #[test]
    fn category_lookup_is_case_sensitive() {
        assert!(known_color("water").is_none());
        assert!(known_color("").is_none());
    }
}
