use crate::models::color::Color;
use std::fmt;
use thiserror::Error;

pub const SECTION_DEBUG: &str = "Debug";
pub const SECTION_DAMAGE_NUMBERS: &str = "DamageNumbers";
pub const SECTION_COLORS: &str = "Colors";
pub const SECTION_CROSSHAIR_MARKERS: &str = "CrosshairMarkers";
pub const SECTION_TEXT_STYLING: &str = "TextStyling";
pub const SECTION_ADVANCED: &str = "Advanced";

/// Top-level document sections, in the order they are written.
pub const SECTIONS: [&str; 6] = [
    SECTION_DEBUG,
    SECTION_DAMAGE_NUMBERS,
    SECTION_COLORS,
    SECTION_CROSSHAIR_MARKERS,
    SECTION_TEXT_STYLING,
    SECTION_ADVANCED,
];

/// Errors raised when assigning a setting by key.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettingsError {
    #[error("Unknown setting: {0}")]
    UnknownSetting(String),

    #[error("Setting {key} expects a {expected} value, got {found}")]
    TypeMismatch {
        key: &'static str,
        expected: SettingKind,
        found: SettingKind,
    },

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// A 3-component vector, stored in the document as `x,y,z`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Parse `x,y,z`. All three components must parse or the whole value is rejected.
    pub fn parse(text: &str) -> Option<Self> {
        let parts: Vec<&str> = text.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return None;
        }

        let component = |s: &str| s.parse::<f32>().ok().filter(|v| v.is_finite());
        Some(Self {
            x: component(parts[0])?,
            y: component(parts[1])?,
            z: component(parts[2])?,
        })
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.x, self.y, self.z)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKind {
    Bool,
    Int,
    Float,
    Text,
    Vector,
    Color,
}

impl fmt::Display for SettingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SettingKind::Bool => "boolean",
            SettingKind::Int => "integer",
            SettingKind::Float => "float",
            SettingKind::Text => "string",
            SettingKind::Vector => "vector",
            SettingKind::Color => "color",
        };
        f.write_str(name)
    }
}

/// A single setting value, tagged with its type.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Text(String),
    Vector(Vec3),
    Color(Color),
}

impl SettingValue {
    pub fn kind(&self) -> SettingKind {
        match self {
            SettingValue::Bool(_) => SettingKind::Bool,
            SettingValue::Int(_) => SettingKind::Int,
            SettingValue::Float(_) => SettingKind::Float,
            SettingValue::Text(_) => SettingKind::Text,
            SettingValue::Vector(_) => SettingKind::Vector,
            SettingValue::Color(_) => SettingKind::Color,
        }
    }

    /// Parse the textual form used by the document and by host change notifications.
    ///
    /// Numbers use the invariant format (`.` as decimal separator); booleans
    /// are case-insensitive.
    pub fn parse(kind: SettingKind, text: &str) -> Option<Self> {
        let trimmed = text.trim();
        match kind {
            SettingKind::Bool => {
                if trimmed.eq_ignore_ascii_case("true") {
                    Some(SettingValue::Bool(true))
                } else if trimmed.eq_ignore_ascii_case("false") {
                    Some(SettingValue::Bool(false))
                } else {
                    None
                }
            }
            SettingKind::Int => trimmed.parse().ok().map(SettingValue::Int),
            SettingKind::Float => trimmed
                .parse::<f32>()
                .ok()
                .filter(|v| v.is_finite())
                .map(SettingValue::Float),
            SettingKind::Text => Some(SettingValue::Text(text.to_string())),
            SettingKind::Vector => Vec3::parse(trimmed).map(SettingValue::Vector),
            SettingKind::Color => Color::parse(trimmed).map(SettingValue::Color),
        }
    }

    fn mismatch(&self, key: SettingKey) -> SettingsError {
        SettingsError::TypeMismatch {
            key: key.name(),
            expected: key.kind(),
            found: self.kind(),
        }
    }

    fn into_bool(self, key: SettingKey) -> Result<bool, SettingsError> {
        match self {
            SettingValue::Bool(v) => Ok(v),
            other => Err(other.mismatch(key)),
        }
    }

    fn into_int(self, key: SettingKey) -> Result<i32, SettingsError> {
        match self {
            SettingValue::Int(v) => Ok(v),
            other => Err(other.mismatch(key)),
        }
    }

    fn into_float(self, key: SettingKey) -> Result<f32, SettingsError> {
        match self {
            SettingValue::Float(v) => Ok(v),
            other => Err(other.mismatch(key)),
        }
    }

    fn into_text(self, key: SettingKey) -> Result<String, SettingsError> {
        match self {
            SettingValue::Text(v) => Ok(v),
            other => Err(other.mismatch(key)),
        }
    }

    fn into_vector(self, key: SettingKey) -> Result<Vec3, SettingsError> {
        match self {
            SettingValue::Vector(v) => Ok(v),
            other => Err(other.mismatch(key)),
        }
    }

    fn into_color(self, key: SettingKey) -> Result<Color, SettingsError> {
        match self {
            SettingValue::Color(v) => Ok(v),
            other => Err(other.mismatch(key)),
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Bool(v) => write!(f, "{}", v),
            SettingValue::Int(v) => write!(f, "{}", v),
            SettingValue::Float(v) => write!(f, "{}", v),
            SettingValue::Text(v) => f.write_str(v),
            SettingValue::Vector(v) => write!(f, "{}", v),
            SettingValue::Color(v) => write!(f, "{}", v),
        }
    }
}

/// Every named setting in the configuration document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    EnableDebugLogging,

    MinimumDamageThreshold,
    DamageNumberCooldown,
    FontSize,
    TextLifetime,
    FloatSpeed,
    TextOffset,

    NormalDamageColor,
    HeadshotDamageColor,
    KillDamageColor,
    HeadshotKillDamageColor,

    EnableCrosshairMarkers,
    MarkerDuration,
    MarkerFontSize,
    NormalHitMarker,
    KillMarker,
    HeadshotMarker,
    HeadshotKillMarker,
    NormalMarkerColor,
    KillMarkerColor,
    HeadshotMarkerColor,
    HeadshotKillMarkerColor,

    FontName,
    EnableOutline,
    OutlineColor,
    OutlineThickness,

    PlayerDamageOnly,
    RandomizePosition,
    PositionRandomness,
    ScaleTextByDamage,
    MinScale,
    MaxScale,
    MaxDamageForScale,
}

impl SettingKey {
    /// All keys in document order.
    pub const ALL: [SettingKey; 33] = [
        SettingKey::EnableDebugLogging,
        SettingKey::MinimumDamageThreshold,
        SettingKey::DamageNumberCooldown,
        SettingKey::FontSize,
        SettingKey::TextLifetime,
        SettingKey::FloatSpeed,
        SettingKey::TextOffset,
        SettingKey::NormalDamageColor,
        SettingKey::HeadshotDamageColor,
        SettingKey::KillDamageColor,
        SettingKey::HeadshotKillDamageColor,
        SettingKey::EnableCrosshairMarkers,
        SettingKey::MarkerDuration,
        SettingKey::MarkerFontSize,
        SettingKey::NormalHitMarker,
        SettingKey::KillMarker,
        SettingKey::HeadshotMarker,
        SettingKey::HeadshotKillMarker,
        SettingKey::NormalMarkerColor,
        SettingKey::KillMarkerColor,
        SettingKey::HeadshotMarkerColor,
        SettingKey::HeadshotKillMarkerColor,
        SettingKey::FontName,
        SettingKey::EnableOutline,
        SettingKey::OutlineColor,
        SettingKey::OutlineThickness,
        SettingKey::PlayerDamageOnly,
        SettingKey::RandomizePosition,
        SettingKey::PositionRandomness,
        SettingKey::ScaleTextByDamage,
        SettingKey::MinScale,
        SettingKey::MaxScale,
        SettingKey::MaxDamageForScale,
    ];

    /// (section, element name, kind, document comment)
    const fn meta(self) -> (&'static str, &'static str, SettingKind, &'static str) {
        use SettingKind as K;
        match self {
            SettingKey::EnableDebugLogging => (
                SECTION_DEBUG,
                "EnableDebugLogging",
                K::Bool,
                "Enable debug messages in the log - set to true to troubleshoot issues (default: false)",
            ),
            SettingKey::MinimumDamageThreshold => (
                SECTION_DAMAGE_NUMBERS,
                "MinimumDamageThreshold",
                K::Int,
                "Minimum damage to show numbers (0 = show all damage, default: 2)",
            ),
            SettingKey::DamageNumberCooldown => (
                SECTION_DAMAGE_NUMBERS,
                "DamageNumberCooldown",
                K::Float,
                "Minimum time between damage numbers in seconds, prevents spam (default: 0)",
            ),
            SettingKey::FontSize => (
                SECTION_DAMAGE_NUMBERS,
                "FontSize",
                K::Int,
                "Size of damage text (default: 20)",
            ),
            SettingKey::TextLifetime => (
                SECTION_DAMAGE_NUMBERS,
                "TextLifetime",
                K::Float,
                "How long text is visible in seconds (default: 1.5)",
            ),
            SettingKey::FloatSpeed => (
                SECTION_DAMAGE_NUMBERS,
                "FloatSpeed",
                K::Float,
                "Speed text floats upward (default: 0.85)",
            ),
            SettingKey::TextOffset => (
                SECTION_DAMAGE_NUMBERS,
                "TextOffset",
                K::Vector,
                "Offset from entity position in X,Y,Z format (default: 0,1.5,0)",
            ),
            SettingKey::NormalDamageColor => (
                SECTION_COLORS,
                "NormalDamageColor",
                K::Color,
                "Normal damage color (default: #BFBFBF)",
            ),
            SettingKey::HeadshotDamageColor => (
                SECTION_COLORS,
                "HeadshotDamageColor",
                K::Color,
                "Headshot damage color (default: #B28000)",
            ),
            SettingKey::KillDamageColor => (
                SECTION_COLORS,
                "KillDamageColor",
                K::Color,
                "Killing blow color (default: #800000)",
            ),
            SettingKey::HeadshotKillDamageColor => (
                SECTION_COLORS,
                "HeadshotKillDamageColor",
                K::Color,
                "Headshot kill color (default: #660000)",
            ),
            SettingKey::EnableCrosshairMarkers => (
                SECTION_CROSSHAIR_MARKERS,
                "EnableCrosshairMarkers",
                K::Bool,
                "Enable/disable crosshair hit markers (default: true)",
            ),
            SettingKey::MarkerDuration => (
                SECTION_CROSSHAIR_MARKERS,
                "MarkerDuration",
                K::Float,
                "How long markers are visible in seconds (default: 0.35)",
            ),
            SettingKey::MarkerFontSize => (
                SECTION_CROSSHAIR_MARKERS,
                "MarkerFontSize",
                K::Int,
                "Size of crosshair marker symbols (default: 30)",
            ),
            SettingKey::NormalHitMarker => (
                SECTION_CROSSHAIR_MARKERS,
                "NormalHitMarker",
                K::Text,
                "Symbol for normal hits (default: ×)",
            ),
            SettingKey::KillMarker => (
                SECTION_CROSSHAIR_MARKERS,
                "KillMarker",
                K::Text,
                "Symbol for kills (default: ×)",
            ),
            SettingKey::HeadshotMarker => (
                SECTION_CROSSHAIR_MARKERS,
                "HeadshotMarker",
                K::Text,
                "Symbol for headshots (default: ×)",
            ),
            SettingKey::HeadshotKillMarker => (
                SECTION_CROSSHAIR_MARKERS,
                "HeadshotKillMarker",
                K::Text,
                "Symbol for headshot kills (default: X)",
            ),
            SettingKey::NormalMarkerColor => (
                SECTION_CROSSHAIR_MARKERS,
                "NormalMarkerColor",
                K::Color,
                "Normal hit marker color (default: #BFBFBF)",
            ),
            SettingKey::KillMarkerColor => (
                SECTION_CROSSHAIR_MARKERS,
                "KillMarkerColor",
                K::Color,
                "Kill marker color (default: #B28000)",
            ),
            SettingKey::HeadshotMarkerColor => (
                SECTION_CROSSHAIR_MARKERS,
                "HeadshotMarkerColor",
                K::Color,
                "Headshot marker color (default: #800000)",
            ),
            SettingKey::HeadshotKillMarkerColor => (
                SECTION_CROSSHAIR_MARKERS,
                "HeadshotKillMarkerColor",
                K::Color,
                "Headshot kill marker color (default: #660000)",
            ),
            SettingKey::FontName => (
                SECTION_TEXT_STYLING,
                "FontName",
                K::Text,
                "Font used for damage numbers (default: LiberationSans)",
            ),
            SettingKey::EnableOutline => (
                SECTION_TEXT_STYLING,
                "EnableOutline",
                K::Bool,
                "Enable text outline for better visibility (default: true)",
            ),
            SettingKey::OutlineColor => (
                SECTION_TEXT_STYLING,
                "OutlineColor",
                K::Color,
                "Outline color (default: #000000)",
            ),
            SettingKey::OutlineThickness => (
                SECTION_TEXT_STYLING,
                "OutlineThickness",
                K::Float,
                "Outline thickness - higher values = thicker outline (default: 0.2)",
            ),
            SettingKey::PlayerDamageOnly => (
                SECTION_ADVANCED,
                "PlayerDamageOnly",
                K::Bool,
                "Only show damage caused by the player (default: true)",
            ),
            SettingKey::RandomizePosition => (
                SECTION_ADVANCED,
                "RandomizePosition",
                K::Bool,
                "Slightly randomize text position to prevent overlap (default: true)",
            ),
            SettingKey::PositionRandomness => (
                SECTION_ADVANCED,
                "PositionRandomness",
                K::Float,
                "Amount of position randomization (default: 0.25)",
            ),
            SettingKey::ScaleTextByDamage => (
                SECTION_ADVANCED,
                "ScaleTextByDamage",
                K::Bool,
                "Scale text size based on damage amount (default: true)",
            ),
            SettingKey::MinScale => (
                SECTION_ADVANCED,
                "MinScale",
                K::Float,
                "Minimum text scale multiplier when scaling by damage (default: 1)",
            ),
            SettingKey::MaxScale => (
                SECTION_ADVANCED,
                "MaxScale",
                K::Float,
                "Maximum text scale multiplier when scaling by damage (default: 2)",
            ),
            SettingKey::MaxDamageForScale => (
                SECTION_ADVANCED,
                "MaxDamageForScale",
                K::Int,
                "Damage amount that gives maximum scale (default: 100)",
            ),
        }
    }

    pub const fn section(self) -> &'static str {
        self.meta().0
    }

    pub const fn name(self) -> &'static str {
        self.meta().1
    }

    pub const fn kind(self) -> SettingKind {
        self.meta().2
    }

    /// Human-readable comment written above the value in the document.
    pub const fn description(self) -> &'static str {
        self.meta().3
    }

    /// `Section/Name`
    pub fn path(self) -> String {
        format!("{}/{}", self.section(), self.name())
    }

    /// Resolve a key from its element name or its `Section/Name` path (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        let (section, field) = match name.split_once('/') {
            Some((section, field)) => (Some(section), field),
            None => (None, name),
        };

        Self::ALL.into_iter().find(|key| {
            key.name().eq_ignore_ascii_case(field)
                && section.is_none_or(|s| key.section().eq_ignore_ascii_case(s))
        })
    }

    /// Keys belonging to one section, in document order.
    pub fn in_section(section: &str) -> impl Iterator<Item = SettingKey> + '_ {
        Self::ALL.into_iter().filter(move |key| key.section() == section)
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// In-memory values of every setting.
///
/// This is the single source of truth both configuration backends read and
/// write. It is owned by [`crate::state::SettingsManager`]; components never
/// keep their own copies beyond a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsState {
    // Debug
    pub enable_debug_logging: bool,

    // Damage numbers
    pub minimum_damage_threshold: i32,
    pub damage_number_cooldown: f32,
    pub font_size: i32,
    pub text_lifetime: f32,
    pub float_speed: f32,
    pub text_offset: Vec3,

    // Colors
    pub normal_damage_color: Color,
    pub headshot_damage_color: Color,
    pub kill_damage_color: Color,
    pub headshot_kill_damage_color: Color,

    // Crosshair markers
    pub enable_crosshair_markers: bool,
    pub marker_duration: f32,
    pub marker_font_size: i32,
    pub normal_hit_marker: String,
    pub kill_marker: String,
    pub headshot_marker: String,
    pub headshot_kill_marker: String,
    pub normal_marker_color: Color,
    pub kill_marker_color: Color,
    pub headshot_marker_color: Color,
    pub headshot_kill_marker_color: Color,

    // Text styling
    pub font_name: String,
    pub enable_outline: bool,
    pub outline_color: Color,
    pub outline_thickness: f32,

    // Advanced
    pub player_damage_only: bool,
    pub randomize_position: bool,
    pub position_randomness: f32,
    pub scale_text_by_damage: bool,
    pub min_scale: f32,
    pub max_scale: f32,
    pub max_damage_for_scale: i32,
}

impl Default for SettingsState {
    fn default() -> Self {
        const GREY: Color = Color::rgb(191, 191, 191);
        const GOLD: Color = Color::rgb(178, 128, 0);
        const RED: Color = Color::rgb(128, 0, 0);
        const DARK_RED: Color = Color::rgb(102, 0, 0);

        Self {
            enable_debug_logging: false,

            minimum_damage_threshold: 2,
            damage_number_cooldown: 0.0,
            font_size: 20,
            text_lifetime: 1.5,
            float_speed: 0.85,
            text_offset: Vec3::new(0.0, 1.5, 0.0),

            normal_damage_color: GREY,
            headshot_damage_color: GOLD,
            kill_damage_color: RED,
            headshot_kill_damage_color: DARK_RED,

            enable_crosshair_markers: true,
            marker_duration: 0.35,
            marker_font_size: 30,
            normal_hit_marker: "×".to_string(),
            kill_marker: "×".to_string(),
            headshot_marker: "×".to_string(),
            headshot_kill_marker: "X".to_string(),
            normal_marker_color: GREY,
            kill_marker_color: GOLD,
            headshot_marker_color: RED,
            headshot_kill_marker_color: DARK_RED,

            font_name: "LiberationSans".to_string(),
            enable_outline: true,
            outline_color: Color::BLACK,
            outline_thickness: 0.2,

            player_damage_only: true,
            randomize_position: true,
            position_randomness: 0.25,
            scale_text_by_damage: true,
            min_scale: 1.0,
            max_scale: 2.0,
            max_damage_for_scale: 100,
        }
    }
}

impl SettingsState {
    /// Read one setting by key.
    pub fn get(&self, key: SettingKey) -> SettingValue {
        use SettingValue as V;
        match key {
            SettingKey::EnableDebugLogging => V::Bool(self.enable_debug_logging),
            SettingKey::MinimumDamageThreshold => V::Int(self.minimum_damage_threshold),
            SettingKey::DamageNumberCooldown => V::Float(self.damage_number_cooldown),
            SettingKey::FontSize => V::Int(self.font_size),
            SettingKey::TextLifetime => V::Float(self.text_lifetime),
            SettingKey::FloatSpeed => V::Float(self.float_speed),
            SettingKey::TextOffset => V::Vector(self.text_offset),
            SettingKey::NormalDamageColor => V::Color(self.normal_damage_color),
            SettingKey::HeadshotDamageColor => V::Color(self.headshot_damage_color),
            SettingKey::KillDamageColor => V::Color(self.kill_damage_color),
            SettingKey::HeadshotKillDamageColor => V::Color(self.headshot_kill_damage_color),
            SettingKey::EnableCrosshairMarkers => V::Bool(self.enable_crosshair_markers),
            SettingKey::MarkerDuration => V::Float(self.marker_duration),
            SettingKey::MarkerFontSize => V::Int(self.marker_font_size),
            SettingKey::NormalHitMarker => V::Text(self.normal_hit_marker.clone()),
            SettingKey::KillMarker => V::Text(self.kill_marker.clone()),
            SettingKey::HeadshotMarker => V::Text(self.headshot_marker.clone()),
            SettingKey::HeadshotKillMarker => V::Text(self.headshot_kill_marker.clone()),
            SettingKey::NormalMarkerColor => V::Color(self.normal_marker_color),
            SettingKey::KillMarkerColor => V::Color(self.kill_marker_color),
            SettingKey::HeadshotMarkerColor => V::Color(self.headshot_marker_color),
            SettingKey::HeadshotKillMarkerColor => V::Color(self.headshot_kill_marker_color),
            SettingKey::FontName => V::Text(self.font_name.clone()),
            SettingKey::EnableOutline => V::Bool(self.enable_outline),
            SettingKey::OutlineColor => V::Color(self.outline_color),
            SettingKey::OutlineThickness => V::Float(self.outline_thickness),
            SettingKey::PlayerDamageOnly => V::Bool(self.player_damage_only),
            SettingKey::RandomizePosition => V::Bool(self.randomize_position),
            SettingKey::PositionRandomness => V::Float(self.position_randomness),
            SettingKey::ScaleTextByDamage => V::Bool(self.scale_text_by_damage),
            SettingKey::MinScale => V::Float(self.min_scale),
            SettingKey::MaxScale => V::Float(self.max_scale),
            SettingKey::MaxDamageForScale => V::Int(self.max_damage_for_scale),
        }
    }

    /// Assign one setting by key. The value's type must match the key's kind.
    pub fn set(&mut self, key: SettingKey, value: SettingValue) -> Result<(), SettingsError> {
        match key {
            SettingKey::EnableDebugLogging => self.enable_debug_logging = value.into_bool(key)?,
            SettingKey::MinimumDamageThreshold => {
                self.minimum_damage_threshold = value.into_int(key)?
            }
            SettingKey::DamageNumberCooldown => {
                self.damage_number_cooldown = value.into_float(key)?
            }
            SettingKey::FontSize => self.font_size = value.into_int(key)?,
            SettingKey::TextLifetime => self.text_lifetime = value.into_float(key)?,
            SettingKey::FloatSpeed => self.float_speed = value.into_float(key)?,
            SettingKey::TextOffset => self.text_offset = value.into_vector(key)?,
            SettingKey::NormalDamageColor => self.normal_damage_color = value.into_color(key)?,
            SettingKey::HeadshotDamageColor => {
                self.headshot_damage_color = value.into_color(key)?
            }
            SettingKey::KillDamageColor => self.kill_damage_color = value.into_color(key)?,
            SettingKey::HeadshotKillDamageColor => {
                self.headshot_kill_damage_color = value.into_color(key)?
            }
            SettingKey::EnableCrosshairMarkers => {
                self.enable_crosshair_markers = value.into_bool(key)?
            }
            SettingKey::MarkerDuration => self.marker_duration = value.into_float(key)?,
            SettingKey::MarkerFontSize => self.marker_font_size = value.into_int(key)?,
            SettingKey::NormalHitMarker => self.normal_hit_marker = value.into_text(key)?,
            SettingKey::KillMarker => self.kill_marker = value.into_text(key)?,
            SettingKey::HeadshotMarker => self.headshot_marker = value.into_text(key)?,
            SettingKey::HeadshotKillMarker => self.headshot_kill_marker = value.into_text(key)?,
            SettingKey::NormalMarkerColor => self.normal_marker_color = value.into_color(key)?,
            SettingKey::KillMarkerColor => self.kill_marker_color = value.into_color(key)?,
            SettingKey::HeadshotMarkerColor => {
                self.headshot_marker_color = value.into_color(key)?
            }
            SettingKey::HeadshotKillMarkerColor => {
                self.headshot_kill_marker_color = value.into_color(key)?
            }
            SettingKey::FontName => self.font_name = value.into_text(key)?,
            SettingKey::EnableOutline => self.enable_outline = value.into_bool(key)?,
            SettingKey::OutlineColor => self.outline_color = value.into_color(key)?,
            SettingKey::OutlineThickness => self.outline_thickness = value.into_float(key)?,
            SettingKey::PlayerDamageOnly => self.player_damage_only = value.into_bool(key)?,
            SettingKey::RandomizePosition => self.randomize_position = value.into_bool(key)?,
            SettingKey::PositionRandomness => {
                self.position_randomness = value.into_float(key)?
            }
            SettingKey::ScaleTextByDamage => self.scale_text_by_damage = value.into_bool(key)?,
            SettingKey::MinScale => self.min_scale = value.into_float(key)?,
            SettingKey::MaxScale => self.max_scale = value.into_float(key)?,
            SettingKey::MaxDamageForScale => self.max_damage_for_scale = value.into_int(key)?,
        }
        Ok(())
    }

    /// Parse `text` according to the key's kind and assign it.
    ///
    /// On a parse failure the current value is left untouched.
    pub fn set_from_text(&mut self, key: SettingKey, text: &str) -> Result<(), SettingsError> {
        let value =
            SettingValue::parse(key.kind(), text).ok_or_else(|| SettingsError::InvalidValue {
                key: key.name(),
                value: text.to_string(),
            })?;
        self.set(key, value)
    }

    /// Clamp values the renderer cannot work with.
    ///
    /// Returns the keys that were adjusted.
    pub fn validate(&mut self) -> Vec<SettingKey> {
        let mut adjusted = Vec::new();

        if self.font_size < 6 {
            self.font_size = 6;
            adjusted.push(SettingKey::FontSize);
        }
        if self.text_lifetime < 0.05 {
            self.text_lifetime = 0.05;
            adjusted.push(SettingKey::TextLifetime);
        }
        if self.float_speed < 0.0 {
            self.float_speed = 0.0;
            adjusted.push(SettingKey::FloatSpeed);
        }
        if self.marker_duration < 0.0 {
            self.marker_duration = 0.0;
            adjusted.push(SettingKey::MarkerDuration);
        }
        if self.min_scale <= 0.0 {
            self.min_scale = 0.1;
            adjusted.push(SettingKey::MinScale);
        }
        if self.max_scale < self.min_scale {
            self.max_scale = self.min_scale;
            adjusted.push(SettingKey::MaxScale);
        }
        if self.max_damage_for_scale <= 0 {
            self.max_damage_for_scale = 1;
            adjusted.push(SettingKey::MaxDamageForScale);
        }

        adjusted
    }

    /// One-line summary for the startup log.
    pub fn summary(&self) -> String {
        format!(
            "Debug:{}, Font:{} {}px, Lifetime:{}s, Float:{}, Markers:{}",
            self.enable_debug_logging,
            self.font_name,
            self.font_size,
            self.text_lifetime,
            self.float_speed,
            if self.enable_crosshair_markers { "On" } else { "Off" }
        )
    }
}
