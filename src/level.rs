use serde::{Deserialize, Serialize};

/// Rows of the starter map handed out before any AI generation has happened.
const BASE_MAP: [&str; 10] = [
    "                        ",
    "                        ",
    "       $                ",
    "     ====               ",
    "                        ",
    "   @        ===         ",
    "                        ",
    "        $       >       ",
    "                        ",
    "========================",
];

pub const RECOMMENDED_ROWS: usize = 10;
pub const RECOMMENDED_COLUMNS: usize = 24;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tileset {
    #[default]
    Jungle,
    Cave,
    Castle,
    Space,
    Lava,
}

impl Tileset {
    pub const ALL: [Tileset; 5] = [
        Tileset::Jungle,
        Tileset::Cave,
        Tileset::Castle,
        Tileset::Space,
        Tileset::Lava,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Tileset::Jungle => "jungle",
            Tileset::Cave => "cave",
            Tileset::Castle => "castle",
            Tileset::Space => "space",
            Tileset::Lava => "lava",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|t| t.as_str() == normalized)
    }

    fn keywords(self) -> &'static [&'static str] {
        match self {
            Tileset::Jungle => &["jungle", "forest", "grass", "tree", "vine", "green", "meadow"],
            Tileset::Cave => &["cave", "underground", "mine", "crystal", "dark", "tunnel", "rock"],
            Tileset::Castle => &["castle", "knight", "dungeon", "tower", "king", "medieval", "stone"],
            Tileset::Space => &["space", "star", "planet", "galaxy", "moon", "alien", "rocket"],
            Tileset::Lava => &["lava", "fire", "volcano", "magma", "hell", "burning", "heat"],
        }
    }

    /// Pick the tileset whose keywords best match a free-text theme description.
    /// Ties and descriptions with no matching keyword fall back to jungle.
    pub fn closest_to(description: &str) -> Self {
        let lowered = description.to_ascii_lowercase();
        let mut best = Tileset::Jungle;
        let mut best_score = 0usize;
        for tileset in Self::ALL {
            let score = tileset
                .keywords()
                .iter()
                .filter(|kw| lowered.contains(*kw))
                .count();
            if score > best_score {
                best = tileset;
                best_score = score;
            }
        }
        best
    }

    /// Default (background, hud, accent) colors for the theme.
    pub fn palette(self) -> (&'static str, &'static str, &'static str) {
        match self {
            Tileset::Jungle => ("#8ecae6", "#0b090a", "#ffb703"),
            Tileset::Cave => ("#2b2d42", "#edf2f4", "#ef233c"),
            Tileset::Castle => ("#f8f5f2", "#2b2b2b", "#ff7f50"),
            Tileset::Space => ("#0b1026", "#f8f8ff", "#6ea8fe"),
            Tileset::Lava => ("#2b0a0a", "#fff4e6", "#ff4d4d"),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// 0.0 for easy up to 1.0 for hard.
    pub fn factor(self) -> f32 {
        match self {
            Difficulty::Easy => 0.0,
            Difficulty::Medium => 0.5,
            Difficulty::Hard => 1.0,
        }
    }
}

/// Which interpretation of the ASCII characters applies.
///
/// The built-in campaign maps `@` to the exit portal and spawns the player at a
/// fixed point; authored (AI or user) levels use `@` as the spawn marker and `!`
/// as the portal.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileLegend {
    Campaign,
    #[default]
    Authored,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileKind {
    Empty,
    Grass,
    Steel,
    Bag,
    Coin,
    Prize,
    Spike,
    Enemy,
    Apple,
    Spawn,
    Portal,
}

impl TileKind {
    pub fn from_char(c: char, legend: TileLegend) -> Option<Self> {
        let kind = match c {
            ' ' => TileKind::Empty,
            '=' => TileKind::Grass,
            '-' => TileKind::Steel,
            '$' => TileKind::Coin,
            '%' => TileKind::Prize,
            '^' => TileKind::Spike,
            '>' => TileKind::Enemy,
            '!' => TileKind::Portal,
            '@' => match legend {
                TileLegend::Campaign => TileKind::Portal,
                TileLegend::Authored => TileKind::Spawn,
            },
            '0' if legend == TileLegend::Campaign => TileKind::Bag,
            _ => return None,
        };
        Some(kind)
    }

    /// Static tiles that block movement. Grass is handled separately because it
    /// lets rising bodies pass through.
    pub fn is_solid(self) -> bool {
        matches!(
            self,
            TileKind::Grass | TileKind::Steel | TileKind::Bag | TileKind::Prize | TileKind::Spike
        )
    }

    pub fn is_jump_through(self) -> bool {
        self == TileKind::Grass
    }

    /// Tiles that become free-moving entities instead of static grid cells.
    pub fn is_dynamic(self) -> bool {
        matches!(self, TileKind::Enemy | TileKind::Apple)
    }

    pub fn tags(self) -> &'static [&'static str] {
        match self {
            TileKind::Grass => &["platform"],
            TileKind::Coin => &["coin"],
            TileKind::Prize => &["prize"],
            TileKind::Spike => &["danger"],
            TileKind::Enemy => &["enemy"],
            TileKind::Apple => &["apple"],
            TileKind::Portal => &["portal"],
            TileKind::Spawn => &["playerSpawn"],
            TileKind::Empty | TileKind::Steel | TileKind::Bag => &[],
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColorField {
    BackgroundColor,
    HudColor,
    AccentColor,
    PlatformTint,
}

impl ColorField {
    pub fn as_str(self) -> &'static str {
        match self {
            ColorField::BackgroundColor => "backgroundColor",
            ColorField::HudColor => "hudColor",
            ColorField::AccentColor => "accentColor",
            ColorField::PlatformTint => "platformTint",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Parse `#RGB` or `#RRGGBB` (case-insensitive, leading `#` required).
    pub fn parse_hex(value: &str) -> Option<Self> {
        let hex = value.trim().strip_prefix('#')?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        match hex.len() {
            3 => {
                let mut channels = hex.chars().map(|c| {
                    let v = c.to_digit(16).unwrap_or(0) as u8;
                    v * 16 + v
                });
                Some(Self {
                    r: channels.next()?,
                    g: channels.next()?,
                    b: channels.next()?,
                })
            }
            6 => Some(Self {
                r: u8::from_str_radix(&hex[0..2], 16).ok()?,
                g: u8::from_str_radix(&hex[2..4], 16).ok()?,
                b: u8::from_str_radix(&hex[4..6], 16).ok()?,
            }),
            _ => None,
        }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Level {
    pub level_map: Vec<String>,
    pub tileset: Tileset,
    pub difficulty: Difficulty,
    pub background_color: String,
    pub hud_color: String,
    pub accent_color: String,
    #[serde(default)]
    pub platform_tint: Option<String>,
}

impl Level {
    pub fn default_for_theme(theme: &str) -> Self {
        let tileset = Tileset::from_label(theme).unwrap_or_default();
        let (background, hud, accent) = tileset.palette();
        Self {
            level_map: BASE_MAP.iter().map(|row| row.to_string()).collect(),
            tileset,
            difficulty: Difficulty::Easy,
            background_color: background.to_string(),
            hud_color: hud.to_string(),
            accent_color: accent.to_string(),
            platform_tint: None,
        }
    }

    pub fn height(&self) -> usize {
        self.level_map.len()
    }

    /// Width of the widest row, counted in characters.
    pub fn width(&self) -> usize {
        self.level_map
            .iter()
            .map(|row| row.chars().count())
            .max()
            .unwrap_or(0)
    }

    pub fn color(&self, field: ColorField) -> Option<&str> {
        match field {
            ColorField::BackgroundColor => Some(&self.background_color),
            ColorField::HudColor => Some(&self.hud_color),
            ColorField::AccentColor => Some(&self.accent_color),
            ColorField::PlatformTint => self.platform_tint.as_deref(),
        }
    }

    /// Copy of the level with exactly one color field replaced.
    pub fn with_color(&self, field: ColorField, value: impl Into<String>) -> Self {
        let mut out = self.clone();
        out.set_color(field, value);
        out
    }

    pub fn set_color(&mut self, field: ColorField, value: impl Into<String>) {
        let value = value.into();
        match field {
            ColorField::BackgroundColor => self.background_color = value,
            ColorField::HudColor => self.hud_color = value,
            ColorField::AccentColor => self.accent_color = value,
            ColorField::PlatformTint => self.platform_tint = Some(value),
        }
    }

    pub fn effective_platform_tint(&self) -> &str {
        self.platform_tint.as_deref().unwrap_or(&self.accent_color)
    }

    /// Iterate `(column, row, char)` over every cell, rows top to bottom.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, char)> + '_ {
        self.level_map
            .iter()
            .enumerate()
            .flat_map(|(row, line)| line.chars().enumerate().map(move |(col, c)| (col, row, c)))
    }

    pub fn count_char(&self, target: char) -> usize {
        self.cells().filter(|(_, _, c)| *c == target).count()
    }

    /// Position of the first spawn marker, as (column, row).
    pub fn spawn_cell(&self) -> Option<(usize, usize)> {
        self.cells()
            .find(|(_, _, c)| *c == '@')
            .map(|(col, row, _)| (col, row))
    }

    pub fn validate(&self) -> Result<(), LevelErrors> {
        validate(self)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LevelIssue {
    #[error("levelMap has no rows")]
    EmptyMap,
    #[error("row {row} is {found} chars wide, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("expected exactly one player spawn '@', found {0}")]
    SpawnCount(usize),
    #[error("expected at most one portal exit '!', found {0}")]
    ExitCount(usize),
    #[error("unknown tile {ch:?} at row {row}, column {col}")]
    UnknownTile { row: usize, col: usize, ch: char },
    #[error("{field} is not a CSS hex color: {value:?}")]
    InvalidColor { field: &'static str, value: String },
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid level: {}", summarize(.0))]
pub struct LevelErrors(pub Vec<LevelIssue>);

fn summarize(issues: &[LevelIssue]) -> String {
    issues
        .iter()
        .map(|issue| issue.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Check every structural and color invariant of an authored level, collecting
/// all issues rather than stopping at the first.
pub fn validate(level: &Level) -> Result<(), LevelErrors> {
    let mut issues = Vec::new();

    if level.level_map.is_empty() {
        issues.push(LevelIssue::EmptyMap);
    }

    let expected = level
        .level_map
        .first()
        .map(|row| row.chars().count())
        .unwrap_or(0);
    for (row, line) in level.level_map.iter().enumerate() {
        let found = line.chars().count();
        if found != expected {
            issues.push(LevelIssue::RaggedRow {
                row,
                expected,
                found,
            });
        }
    }

    let spawns = level.count_char('@');
    if !level.level_map.is_empty() && spawns != 1 {
        issues.push(LevelIssue::SpawnCount(spawns));
    }
    let exits = level.count_char('!');
    if exits > 1 {
        issues.push(LevelIssue::ExitCount(exits));
    }

    for (col, row, ch) in level.cells() {
        if TileKind::from_char(ch, TileLegend::Authored).is_none() {
            issues.push(LevelIssue::UnknownTile { row, col, ch });
        }
    }

    for field in [
        ColorField::BackgroundColor,
        ColorField::HudColor,
        ColorField::AccentColor,
        ColorField::PlatformTint,
    ] {
        if let Some(value) = level.color(field) {
            if Rgb::parse_hex(value).is_none() {
                issues.push(LevelIssue::InvalidColor {
                    field: field.as_str(),
                    value: value.to_string(),
                });
            }
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(LevelErrors(issues))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_level_is_valid_for_every_theme() {
        for tileset in Tileset::ALL {
            let level = Level::default_for_theme(tileset.as_str());
            assert_eq!(level.tileset, tileset);
            assert_eq!(level.height(), RECOMMENDED_ROWS);
            assert_eq!(level.width(), RECOMMENDED_COLUMNS);
            level.validate().expect("starter level should validate");
        }
    }

    #[test]
    fn unknown_theme_falls_back_to_jungle() {
        let level = Level::default_for_theme("underwater");
        assert_eq!(level.tileset, Tileset::Jungle);
        assert_eq!(level.background_color, "#8ecae6");
    }

    #[test]
    fn json_uses_camel_case_keys() {
        let level = Level::default_for_theme("lava");
        let value = serde_json::to_value(&level).expect("serialize");
        assert!(value.get("levelMap").is_some());
        assert_eq!(value["tileset"], "lava");
        assert_eq!(value["difficulty"], "easy");
        assert_eq!(value["backgroundColor"], "#2b0a0a");
        assert!(value["platformTint"].is_null());
    }

    #[test]
    fn missing_platform_tint_deserializes_as_none() {
        let level: Level = serde_json::from_value(serde_json::json!({
            "levelMap": ["@ ", "=="],
            "tileset": "cave",
            "difficulty": "hard",
            "backgroundColor": "#000",
            "hudColor": "#fff",
            "accentColor": "#f00"
        }))
        .expect("deserialize");
        assert!(level.platform_tint.is_none());
        assert_eq!(level.effective_platform_tint(), "#f00");
    }

    #[test]
    fn validation_collects_every_issue() {
        let mut level = Level::default_for_theme("jungle");
        level.level_map[2] = "  ".to_string();
        level.level_map[3] = "@      ?                ".to_string();
        level.level_map[4] = "!                      !".to_string();
        level.hud_color = "white".to_string();

        let errors = level.validate().expect_err("should be invalid").0;
        assert!(errors.contains(&LevelIssue::RaggedRow {
            row: 2,
            expected: 24,
            found: 2
        }));
        assert!(errors.contains(&LevelIssue::SpawnCount(2)));
        assert!(errors.contains(&LevelIssue::ExitCount(2)));
        assert!(errors.contains(&LevelIssue::UnknownTile {
            row: 3,
            col: 7,
            ch: '?'
        }));
        assert!(errors
            .iter()
            .any(|e| matches!(e, LevelIssue::InvalidColor { field: "hudColor", .. })));
    }

    #[test]
    fn missing_spawn_and_empty_map_are_rejected() {
        let mut level = Level::default_for_theme("space");
        level.level_map = level
            .level_map
            .iter()
            .map(|row| row.replace('@', " "))
            .collect();
        assert_eq!(
            level.validate().expect_err("no spawn").0,
            vec![LevelIssue::SpawnCount(0)]
        );

        level.level_map.clear();
        assert_eq!(
            level.validate().expect_err("empty").0,
            vec![LevelIssue::EmptyMap]
        );
    }

    #[test]
    fn color_edit_touches_only_target_field() {
        let level = Level::default_for_theme("castle");
        let edited = level.with_color(ColorField::HudColor, "#123456");
        assert_eq!(edited.hud_color, "#123456");
        assert_eq!(edited.background_color, level.background_color);
        assert_eq!(edited.accent_color, level.accent_color);
        assert_eq!(edited.platform_tint, level.platform_tint);
        assert_eq!(edited.level_map, level.level_map);

        let tinted = level.with_color(ColorField::PlatformTint, "#abc");
        assert_eq!(tinted.platform_tint.as_deref(), Some("#abc"));
        assert_eq!(tinted.hud_color, level.hud_color);
    }

    #[test]
    fn hex_parsing_accepts_short_and_long_forms() {
        assert_eq!(
            Rgb::parse_hex("#1a1a2e"),
            Some(Rgb {
                r: 0x1a,
                g: 0x1a,
                b: 0x2e
            })
        );
        assert_eq!(
            Rgb::parse_hex("#FfF"),
            Some(Rgb {
                r: 255,
                g: 255,
                b: 255
            })
        );
        assert_eq!(Rgb::parse_hex("1a1a2e"), None);
        assert_eq!(Rgb::parse_hex("#12345"), None);
        assert_eq!(Rgb::parse_hex("#ggg"), None);
        assert_eq!(Rgb::parse_hex("#0a0b0c").map(Rgb::to_hex).as_deref(), Some("#0a0b0c"));
    }

    #[test]
    fn legend_decides_what_at_sign_means() {
        assert_eq!(
            TileKind::from_char('@', TileLegend::Authored),
            Some(TileKind::Spawn)
        );
        assert_eq!(
            TileKind::from_char('@', TileLegend::Campaign),
            Some(TileKind::Portal)
        );
        assert_eq!(TileKind::from_char('0', TileLegend::Authored), None);
        assert_eq!(
            TileKind::from_char('0', TileLegend::Campaign),
            Some(TileKind::Bag)
        );
        assert_eq!(TileKind::from_char('#', TileLegend::Authored), None);
    }

    #[test]
    fn closest_tileset_matches_theme_keywords() {
        assert_eq!(Tileset::closest_to("A burning volcano fortress"), Tileset::Lava);
        assert_eq!(Tileset::closest_to("Alien moon base"), Tileset::Space);
        assert_eq!(Tileset::closest_to("Crystal mine tunnels"), Tileset::Cave);
        assert_eq!(Tileset::closest_to("Haunted knight tower"), Tileset::Castle);
        assert_eq!(Tileset::closest_to("candy land"), Tileset::Jungle);
    }
}
