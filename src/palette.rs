//! Deterministic location palettes.
//!
//! A place resolves to exactly one [`ColorTier`] through a strict fallback
//! chain (name type, then city, then state, then raw coordinates). The tier
//! yields a primary HSL triple; the other four palette colors are fixed
//! transforms of it. Nothing here is random: the same place always produces
//! the same palette.

use serde::{Deserialize, Serialize};

use crate::geo::{geohash, NEIGHBORHOOD_GEOHASH_PRECISION};
use crate::models::{LocationContext, LocationKind, LocationRecord, VirtualLocation};

/// Grid cell size (degrees) used to keep colors stable within a neighborhood.
const NEIGHBORHOOD_GRID_DEG: f64 = 0.003;

/// Ink colors used when no location is known.
pub const ZEN_INK: [&str; 5] = ["#000000", "#333333", "#666666", "#999999", "#e6e6e6"];

/// Neutral inks kept in the first two slots for anonymous locations.
pub const NEUTRAL_INK: [&str; 2] = ["#000000", "#333333"];

/// A hue/saturation/lightness color.
///
/// Construction through [`Hsl::new`] wraps hue into `[0, 360)` and clamps
/// saturation and lightness into `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hsl {
    pub hue: f64,
    pub saturation: f64,
    pub lightness: f64,
}

impl Hsl {
    pub fn new(hue: f64, saturation: f64, lightness: f64) -> Self {
        Self {
            hue: hue.rem_euclid(360.0),
            saturation: saturation.clamp(0.0, 100.0),
            lightness: lightness.clamp(0.0, 100.0),
        }
    }

    const fn base(hue: f64, saturation: f64, lightness: f64) -> Self {
        Self {
            hue,
            saturation,
            lightness,
        }
    }

    pub fn to_rgb(&self) -> (u8, u8, u8) {
        let h = self.hue / 360.0;
        let s = self.saturation / 100.0;
        let l = self.lightness / 100.0;

        if s == 0.0 {
            let v = channel(l);
            return (v, v, v);
        }

        let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
        let p = 2.0 * l - q;
        (
            channel(hue_to_rgb(p, q, h + 1.0 / 3.0)),
            channel(hue_to_rgb(p, q, h)),
            channel(hue_to_rgb(p, q, h - 1.0 / 3.0)),
        )
    }

    /// `#rrggbb`, lower-case.
    pub fn to_hex(&self) -> String {
        let (r, g, b) = self.to_rgb();
        format!("#{:02x}{:02x}{:02x}", r, g, b)
    }

    /// CSS `hsl()` notation.
    pub fn to_css(&self) -> String {
        format!(
            "hsl({}, {}%, {}%)",
            self.hue, self.saturation, self.lightness
        )
    }
}

fn hue_to_rgb(p: f64, q: f64, mut t: f64) -> f64 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        return p + (q - p) * 6.0 * t;
    }
    if t < 1.0 / 2.0 {
        return q;
    }
    if t < 2.0 / 3.0 {
        return p + (q - p) * (2.0 / 3.0 - t) * 6.0;
    }
    p
}

fn channel(v: f64) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

// ============================================================
// Tier tables
// ============================================================

/// Place types recognized from keywords in a location's name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameType {
    Park,
    Museum,
    Downtown,
    Garden,
    Forest,
    Waterfront,
    /// Matched like any other keyword: "Urban Plaza" takes this tier even
    /// when its city has a color of its own.
    Urban,
    Historic,
}

impl NameType {
    pub const ALL: [Self; 8] = [
        Self::Park,
        Self::Museum,
        Self::Downtown,
        Self::Garden,
        Self::Forest,
        Self::Waterfront,
        Self::Urban,
        Self::Historic,
    ];

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Park => "park",
            Self::Museum => "museum",
            Self::Downtown => "downtown",
            Self::Garden => "garden",
            Self::Forest => "forest",
            Self::Waterfront => "waterfront",
            Self::Urban => "urban",
            Self::Historic => "historic",
        }
    }

    pub fn base(&self) -> Hsl {
        match self {
            Self::Park => Hsl::base(120.0, 60.0, 50.0),
            Self::Museum => Hsl::base(280.0, 40.0, 45.0),
            Self::Downtown => Hsl::base(200.0, 50.0, 40.0),
            Self::Garden => Hsl::base(60.0, 70.0, 55.0),
            Self::Forest => Hsl::base(140.0, 65.0, 35.0),
            Self::Waterfront => Hsl::base(180.0, 55.0, 50.0),
            Self::Urban => Hsl::base(0.0, 20.0, 30.0),
            Self::Historic => Hsl::base(30.0, 45.0, 40.0),
        }
    }

    /// The keyword occurring earliest in `name`; ties go to table order.
    pub fn detect(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        Self::ALL
            .iter()
            .filter_map(|t| lower.find(t.keyword()).map(|pos| (pos, *t)))
            .min_by_key(|(pos, _)| *pos)
            .map(|(_, t)| t)
    }
}

/// Cities with a dedicated base color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum City {
    StLouis,
    Chicago,
    NewYork,
    LosAngeles,
    SanFrancisco,
    Seattle,
    Miami,
    Denver,
}

impl City {
    pub fn from_name(city: &str) -> Option<Self> {
        match city.trim().to_lowercase().as_str() {
            "st. louis" => Some(Self::StLouis),
            "chicago" => Some(Self::Chicago),
            "new york" => Some(Self::NewYork),
            "los angeles" => Some(Self::LosAngeles),
            "san francisco" => Some(Self::SanFrancisco),
            "seattle" => Some(Self::Seattle),
            "miami" => Some(Self::Miami),
            "denver" => Some(Self::Denver),
            _ => None,
        }
    }

    pub fn base(&self) -> Hsl {
        match self {
            Self::StLouis => Hsl::base(200.0, 45.0, 40.0),
            Self::Chicago => Hsl::base(240.0, 35.0, 30.0),
            Self::NewYork => Hsl::base(0.0, 25.0, 20.0),
            Self::LosAngeles => Hsl::base(30.0, 55.0, 50.0),
            Self::SanFrancisco => Hsl::base(180.0, 40.0, 45.0),
            Self::Seattle => Hsl::base(120.0, 35.0, 25.0),
            Self::Miami => Hsl::base(180.0, 60.0, 60.0),
            Self::Denver => Hsl::base(60.0, 65.0, 55.0),
        }
    }
}

/// States with a dedicated base color, keyed by two-letter code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UsState {
    Mo,
    Il,
    Ca,
    Ny,
    Tx,
    Fl,
    Wa,
    Co,
}

impl UsState {
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_uppercase().as_str() {
            "MO" => Some(Self::Mo),
            "IL" => Some(Self::Il),
            "CA" => Some(Self::Ca),
            "NY" => Some(Self::Ny),
            "TX" => Some(Self::Tx),
            "FL" => Some(Self::Fl),
            "WA" => Some(Self::Wa),
            "CO" => Some(Self::Co),
            _ => None,
        }
    }

    pub fn base(&self) -> Hsl {
        match self {
            Self::Mo => Hsl::base(200.0, 50.0, 45.0),
            Self::Il => Hsl::base(0.0, 30.0, 40.0),
            Self::Ca => Hsl::base(30.0, 60.0, 50.0),
            Self::Ny => Hsl::base(240.0, 40.0, 35.0),
            Self::Tx => Hsl::base(0.0, 20.0, 25.0),
            Self::Fl => Hsl::base(180.0, 50.0, 55.0),
            Self::Wa => Hsl::base(120.0, 40.0, 30.0),
            Self::Co => Hsl::base(60.0, 70.0, 60.0),
        }
    }
}

/// The fallback stage that produced a palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tier", content = "key", rename_all = "snake_case")]
pub enum ColorTier {
    NameType(NameType),
    City(City),
    State(UsState),
    Coordinate,
}

// ============================================================
// Derivation
// ============================================================

/// The attributes of a place that drive its palette.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Place<'a> {
    pub name: &'a str,
    pub city: Option<&'a str>,
    pub state: Option<&'a str>,
    pub latitude: f64,
    pub longitude: f64,
}

impl<'a> From<&'a LocationRecord> for Place<'a> {
    fn from(location: &'a LocationRecord) -> Self {
        Self {
            name: &location.name,
            city: location.city.as_deref(),
            state: location.state.as_deref(),
            latitude: location.latitude,
            longitude: location.longitude,
        }
    }
}

impl<'a> From<&'a VirtualLocation> for Place<'a> {
    fn from(location: &'a VirtualLocation) -> Self {
        Self {
            name: &location.name,
            city: Some(&location.city),
            state: None,
            latitude: location.latitude,
            longitude: location.longitude,
        }
    }
}

/// Five theme colors derived from one primary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaletteSet {
    pub tier: ColorTier,
    pub primary: Hsl,
    pub secondary: Hsl,
    pub accent: Hsl,
    pub background: Hsl,
    pub text: Hsl,
}

impl PaletteSet {
    pub fn from_primary(tier: ColorTier, primary: Hsl) -> Self {
        let Hsl {
            hue: h,
            saturation: s,
            lightness: l,
        } = primary;

        Self {
            tier,
            primary: Hsl::new(h, s, l),
            secondary: Hsl::new(h + 30.0, (s - 20.0).max(30.0), (l + 15.0).min(70.0)),
            accent: Hsl::new(h + 180.0, (s + 10.0).min(90.0), (l - 10.0).max(40.0)),
            background: Hsl::new(h, (s - 40.0).max(10.0), (l + 40.0).min(95.0)),
            text: Hsl::new(h, (s - 30.0).max(20.0), (l - 30.0).max(15.0)),
        }
    }

    pub fn colors(&self) -> [Hsl; 5] {
        [
            self.primary,
            self.secondary,
            self.accent,
            self.background,
            self.text,
        ]
    }
}

/// Derive the palette for a place.
pub fn derive<'a>(place: impl Into<Place<'a>>) -> PaletteSet {
    let place = place.into();
    let (tier, primary) = resolve_tier(&place);
    PaletteSet::from_primary(tier, primary)
}

/// Walk the tier chain and return the first match with its jittered color.
pub fn resolve_tier(place: &Place<'_>) -> (ColorTier, Hsl) {
    let hash = name_hash(place.name);

    if let Some(name_type) = NameType::detect(place.name) {
        let base = name_type.base();
        let hue = base.hue + (hash % 360) as f64 * 0.3;
        return (
            ColorTier::NameType(name_type),
            jitter(base, hue, hash),
        );
    }

    if let Some(city) = place.city.and_then(City::from_name) {
        let base = city.base();
        return (ColorTier::City(city), jitter(base, regional_hue(base, hash), hash));
    }

    if let Some(state) = place.state.and_then(UsState::from_code) {
        let base = state.base();
        return (
            ColorTier::State(state),
            jitter(base, regional_hue(base, hash), hash),
        );
    }

    (
        ColorTier::Coordinate,
        coordinate_color(place.latitude, place.longitude),
    )
}

/// Sum of the name's UTF-16 code units.
pub fn name_hash(name: &str) -> u64 {
    name.encode_utf16().map(u64::from).sum()
}

fn regional_hue(base: Hsl, hash: u64) -> f64 {
    base.hue + (hash % 60) as f64 - 30.0
}

fn jitter(base: Hsl, hue: f64, hash: u64) -> Hsl {
    let saturation = (base.saturation + (hash % 20) as f64).min(80.0);
    let lightness = (base.lightness + (hash % 15) as f64 - 7.0).clamp(20.0, 80.0);
    Hsl::new(hue, saturation, lightness)
}

fn coordinate_color(lat: f64, lng: f64) -> Hsl {
    let coord_hash = (lat * 1000.0 + lng * 1000.0).abs() % 360.0;

    let grid_lat = round_half_up(lat / NEIGHBORHOOD_GRID_DEG) * NEIGHBORHOOD_GRID_DEG;
    let grid_lng = round_half_up(lng / NEIGHBORHOOD_GRID_DEG) * NEIGHBORHOOD_GRID_DEG;
    let neighborhood_hash = (grid_lat * 1000.0 + grid_lng * 1000.0).abs() % 360.0;

    let cell = geohash(lat, lng, NEIGHBORHOOD_GEOHASH_PRECISION);
    let geohash_hash = (cell.bytes().map(u64::from).sum::<u64>() % 360) as f64;

    let hue = (coord_hash + neighborhood_hash + geohash_hash) % 360.0;
    let saturation = (50.0 + lat.abs() % 30.0).clamp(30.0, 80.0);
    let lightness = (45.0 + lng.abs() % 30.0).clamp(25.0, 70.0);

    tracing::debug!(
        geohash = %cell,
        coord_hash,
        neighborhood_hash,
        geohash_hash,
        "coordinate tier color"
    );

    Hsl::new(hue, saturation, lightness)
}

fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}

// ============================================================
// Theme
// ============================================================

/// Palette and drawing inks applied for a location context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub location: LocationKind,
    /// `None` when no location is known; hosts keep their default styling.
    pub palette: Option<PaletteSet>,
    /// Five `#rrggbb` ink colors for the brush toolbar.
    pub ink: Vec<String>,
}

impl Theme {
    pub fn for_context(context: &LocationContext) -> Self {
        match context {
            LocationContext::Named(location) => {
                let palette = derive(location);
                Self {
                    location: LocationKind::Named,
                    ink: palette.colors().iter().map(Hsl::to_hex).collect(),
                    palette: Some(palette),
                }
            }
            LocationContext::Virtual(location) => {
                let palette = derive(location);
                let mut ink: Vec<String> = NEUTRAL_INK.iter().map(|c| c.to_string()).collect();
                ink.extend(
                    [palette.accent, palette.secondary, palette.text]
                        .iter()
                        .map(Hsl::to_hex),
                );
                Self {
                    location: LocationKind::Virtual,
                    palette: Some(palette),
                    ink,
                }
            }
            LocationContext::None => Self::zen(),
        }
    }

    /// Context-free default theme.
    pub fn zen() -> Self {
        Self {
            location: LocationKind::None,
            palette: None,
            ink: ZEN_INK.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// CSS custom properties for the page theme.
    pub fn css_variables(&self) -> Vec<(&'static str, String)> {
        let Some(palette) = &self.palette else {
            return Vec::new();
        };
        vec![
            ("--location-primary", palette.primary.to_css()),
            ("--location-secondary", palette.secondary.to_css()),
            ("--location-accent", palette.accent.to_css()),
            ("--location-background", palette.background.to_css()),
            ("--location-text", palette.text.to_css()),
        ]
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::zen()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use uuid::Uuid;

    fn location(name: &str, city: Option<&str>, state: Option<&str>) -> LocationRecord {
        LocationRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            slug: name.to_lowercase().replace(' ', "-"),
            latitude: 38.6359,
            longitude: -90.2951,
            radius_meters: 1_500.0,
            city: city.map(str::to_string),
            state: state.map(str::to_string),
            is_active: true,
        }
    }

    fn assert_in_range(color: &Hsl) {
        assert!((0.0..360.0).contains(&color.hue), "hue {}", color.hue);
        assert!((0.0..=100.0).contains(&color.saturation));
        assert!((0.0..=100.0).contains(&color.lightness));
    }

    #[test]
    fn forest_park_uses_forest_tier() {
        let palette = derive(&location("Forest Park", None, None));
        let hash = name_hash("Forest Park");

        assert_eq!(palette.tier, ColorTier::NameType(NameType::Forest));
        let expected_hue = (140.0 + (hash % 360) as f64 * 0.3) % 360.0;
        assert!((palette.primary.hue - expected_hue).abs() < 1e-9);
        assert_eq!(palette.primary.saturation, 80.0);
        assert_eq!(palette.primary.lightness, 35.0);
    }

    #[test]
    fn earliest_keyword_wins() {
        assert_eq!(NameType::detect("Forest Park"), Some(NameType::Forest));
        assert_eq!(NameType::detect("Park Forest"), Some(NameType::Park));
        assert_eq!(NameType::detect("Downtown Museum"), Some(NameType::Downtown));
        assert_eq!(NameType::detect("City Hall"), None);
    }

    #[test]
    fn urban_is_a_name_tier() {
        let palette = derive(&location("Urban Plaza", Some("St. Louis"), Some("MO")));
        assert_eq!(palette.tier, ColorTier::NameType(NameType::Urban));
    }

    #[test]
    fn city_tier_before_state_tier() {
        let palette = derive(&location("Gateway Arch", Some("St. Louis"), Some("MO")));
        assert_eq!(palette.tier, ColorTier::City(City::StLouis));

        let palette = derive(&location("Gateway Arch", Some("Springfield"), Some("mo")));
        assert_eq!(palette.tier, ColorTier::State(UsState::Mo));
    }

    #[test]
    fn regional_hue_wraps_below_zero() {
        // New York has base hue 0; a small name hash pushes the jitter negative.
        let palette = derive(&location("A", Some("New York"), None));
        let expected = (0.0 + (65 % 60) as f64 - 30.0).rem_euclid(360.0);
        assert_eq!(palette.tier, ColorTier::City(City::NewYork));
        assert!((palette.primary.hue - expected).abs() < 1e-9);
    }

    #[test]
    fn unknown_place_falls_through_to_coordinates() {
        let palette = derive(&location("City Hall", Some("Boise"), Some("ID")));
        assert_eq!(palette.tier, ColorTier::Coordinate);
    }

    #[test]
    fn derive_is_pure() {
        let loc = location("Tower Grove", Some("Boise"), None);
        assert_eq!(derive(&loc), derive(&loc));

        let virt = VirtualLocation::at(38.6270, -90.1994);
        assert_eq!(derive(&virt), derive(&virt));
    }

    #[test]
    fn fuzzed_coordinates_stay_in_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..2_000 {
            let virt = VirtualLocation::at(
                rng.gen_range(-90.0..=90.0),
                rng.gen_range(-180.0..=180.0),
            );
            let palette = derive(&virt);
            assert_eq!(palette.tier, ColorTier::Coordinate);
            assert!((30.0..=80.0).contains(&palette.primary.saturation));
            assert!((25.0..=70.0).contains(&palette.primary.lightness));
            for color in palette.colors() {
                assert_in_range(&color);
            }
        }
    }

    #[test]
    fn secondary_colors_follow_primary() {
        let palette = PaletteSet::from_primary(ColorTier::Coordinate, Hsl::new(350.0, 75.0, 60.0));
        assert_eq!(palette.secondary, Hsl::new(20.0, 55.0, 70.0));
        assert_eq!(palette.accent, Hsl::new(170.0, 85.0, 50.0));
        assert_eq!(palette.background, Hsl::new(350.0, 35.0, 95.0));
        assert_eq!(palette.text, Hsl::new(350.0, 45.0, 30.0));
    }

    #[test]
    fn hex_conversion() {
        assert_eq!(Hsl::new(0.0, 100.0, 50.0).to_hex(), "#ff0000");
        assert_eq!(Hsl::new(120.0, 100.0, 50.0).to_hex(), "#00ff00");
        assert_eq!(Hsl::new(240.0, 100.0, 25.0).to_hex(), "#000080");
        assert_eq!(Hsl::new(0.0, 0.0, 20.0).to_hex(), "#333333");
    }

    #[test]
    fn virtual_ink_keeps_two_neutrals() {
        let context = LocationContext::Virtual(VirtualLocation::at(38.6270, -90.1994));
        let theme = Theme::for_context(&context);

        assert_eq!(theme.ink.len(), 5);
        assert_eq!(&theme.ink[..2], &["#000000", "#333333"]);
        let palette = theme.palette.expect("virtual theme has a palette");
        assert_eq!(theme.ink[2], palette.accent.to_hex());
        assert_eq!(theme.ink[3], palette.secondary.to_hex());
        assert_eq!(theme.ink[4], palette.text.to_hex());
        for ink in &theme.ink[2..] {
            assert!(!NEUTRAL_INK.contains(&ink.as_str()));
        }
    }

    #[test]
    fn named_ink_is_fully_derived() {
        let context = LocationContext::Named(location("Forest Park", None, None));
        let theme = Theme::for_context(&context);
        let palette = theme.palette.expect("named theme has a palette");
        let expected: Vec<String> = palette.colors().iter().map(Hsl::to_hex).collect();
        assert_eq!(theme.ink, expected);
        assert_eq!(theme.css_variables().len(), 5);
    }

    #[test]
    fn no_location_uses_zen_inks() {
        let theme = Theme::for_context(&LocationContext::None);
        assert!(theme.palette.is_none());
        assert_eq!(theme.ink, ZEN_INK.to_vec());
        assert!(theme.css_variables().is_empty());
    }
}
