use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng as _, SeedableRng};
use serde_json::json;

use super::prompts::{ACTIVE_LEVEL_PREFIX, CURRENT_LEVEL_HEADER, INSTRUCTION_HEADER};
use super::{
    ChatReply, ChatRequest, LevelModel, ModelError, ModelMessage, ObjectRequest, ObjectSchema, ToolCall,
};
use crate::level::{Difficulty, Level, Rgb, Tileset, RECOMMENDED_COLUMNS, RECOMMENDED_ROWS};

const IDEA_TEMPLATES: [&str; 10] = [
    "Hop across floating {theme} ledges while a ghost patrols the gap below.",
    "Grab a coin trail that arcs over a row of spikes in the {theme}.",
    "Headbutt a prize box for an apple, then bully your way past two ghosts.",
    "Climb a {theme} staircase of narrow platforms with coins on every step.",
    "Sprint along the {theme} floor, timing jumps over spaced spike pits.",
    "Thread a tight corridor of steel ledges guarded by a lone ghost.",
    "Hunt hidden coins tucked above the highest {theme} platforms.",
    "Dodge ghosts on a long {theme} bridge with a prize box halfway across.",
    "Drop down through grass ledges to reach a portal in the {theme} depths.",
    "Race a spike gauntlet where every safe landing holds a coin.",
];

const MAX_IDEA_CHARS: usize = 119;

/// Offline stand-in for a hosted language model. Output is a pure function of
/// the prompt, so the same request always yields the same level.
#[derive(Clone, Debug, Default)]
pub struct ProceduralModel {
    salt: u64,
}

impl ProceduralModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Different salts give different (still deterministic) designs.
    pub fn with_salt(salt: u64) -> Self {
        Self { salt }
    }

    fn rng_for(&self, text: &str) -> SmallRng {
        let mut hasher = DefaultHasher::new();
        self.salt.hash(&mut hasher);
        text.hash(&mut hasher);
        SmallRng::seed_from_u64(hasher.finish())
    }
}

impl LevelModel for ProceduralModel {
    fn generate_object(&self, request: &ObjectRequest) -> Result<serde_json::Value, ModelError> {
        let mut rng = self.rng_for(&request.prompt);
        match request.schema {
            ObjectSchema::Ideas => Ok(json!({ "ideas": ideas(&mut rng, &request.prompt) })),
            ObjectSchema::Level => {
                let level = match request.prompt.strip_prefix(CURRENT_LEVEL_HEADER) {
                    Some(rest) => {
                        let (current, instruction) = rest
                            .split_once(INSTRUCTION_HEADER)
                            .ok_or_else(|| ModelError::Malformed("edit prompt has no instruction".into()))?;
                        let current: Level = serde_json::from_str(current)
                            .map_err(|e| ModelError::Malformed(format!("current level: {e}")))?;
                        revise(&current, instruction, &mut rng).0
                    }
                    None => {
                        let subject = subject_of(&request.prompt);
                        compose(
                            &mut rng,
                            Tileset::closest_to(subject),
                            difficulty_from(subject),
                        )
                    }
                };
                serde_json::to_value(level).map_err(|e| ModelError::Malformed(e.to_string()))
            }
        }
    }

    fn chat(&self, request: &ChatRequest) -> Result<ChatReply, ModelError> {
        let level_id = request
            .system
            .lines()
            .find_map(|line| line.strip_prefix(ACTIVE_LEVEL_PREFIX))
            .map(str::trim)
            .filter(|id| !id.is_empty());
        let instruction = request
            .messages
            .iter()
            .rev()
            .find_map(|m| match m {
                ModelMessage::User { content } => Some(content.as_str()),
                _ => None,
            })
            .unwrap_or("");
        let call_id = format!("call_{}", request.messages.len());

        let Some(last) = request.messages.last() else {
            return Ok(say("Tell me what you would like to change in this level."));
        };
        match last {
            ModelMessage::User { .. } => match level_id {
                Some(id) => Ok(call(call_id, "readLevel", json!({ "levelId": id }))),
                None => Ok(say("Open a level in the builder and I can edit it for you.")),
            },
            ModelMessage::Tool { name, output, .. } if name == "readLevel" => {
                if let Some(err) = output.get("error").and_then(|e| e.as_str()) {
                    return Ok(say(&format!("I couldn't read that level: {err}")));
                }
                let level: Level = serde_json::from_value(output["level"].clone())
                    .map_err(|e| ModelError::Malformed(format!("readLevel output: {e}")))?;
                let title = output["title"].as_str().unwrap_or("this level");
                let mut rng = self.rng_for(instruction);
                let (revised, changes) = revise(&level, instruction, &mut rng);
                if changes.is_empty() {
                    return Ok(say(&format!(
                        "I looked at \"{title}\" but found nothing to change for that. \
                         Try asking for more coins, fewer ghosts, or a different tileset."
                    )));
                }
                let mut input = json!({ "level": revised });
                input["levelId"] = output["levelId"].clone();
                Ok(call(call_id, "updateLevel", input))
            }
            ModelMessage::Tool { name, output, .. } if name == "updateLevel" => {
                if let Some(err) = output.get("error").and_then(|e| e.as_str()) {
                    return Ok(say(&format!("That change was rejected: {err}")));
                }
                let title = output["title"].as_str().unwrap_or("the level");
                let summary = serde_json::from_value::<Level>(output["level"].clone())
                    .map(|level| describe(&level))
                    .unwrap_or_default();
                Ok(say(&format!("Saved \"{title}\". {summary}").trim().to_string()))
            }
            _ => Ok(say("Done.")),
        }
    }
}

fn say(text: &str) -> ChatReply {
    ChatReply {
        text: text.to_string(),
        tool_calls: Vec::new(),
    }
}

fn call(id: String, name: &str, input: serde_json::Value) -> ChatReply {
    ChatReply {
        text: String::new(),
        tool_calls: vec![ToolCall {
            id,
            name: name.to_string(),
            input,
        }],
    }
}

fn describe(level: &Level) -> String {
    format!(
        "It now has {} coins, {} ghosts and {} spikes on the {} tileset.",
        level.count_char('$'),
        level.count_char('>'),
        level.count_char('^'),
        level.tileset.as_str()
    )
}

/// The free-text part of a generation prompt.
fn subject_of(prompt: &str) -> &str {
    if let Some(rest) = prompt.split_once("Theme description: ").map(|(_, r)| r) {
        return rest.split(". Pick the closest").next().unwrap_or(rest);
    }
    prompt
        .split_once("level for: ")
        .map(|(_, rest)| rest)
        .unwrap_or(prompt)
}

fn difficulty_from(text: &str) -> Difficulty {
    let lowered = text.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| lowered.contains(w));
    if has(&["hard", "difficult", "brutal", "expert", "insane"]) {
        Difficulty::Hard
    } else if has(&["medium", "tricky", "moderate", "challenging"]) {
        Difficulty::Medium
    } else {
        Difficulty::Easy
    }
}

fn ideas(rng: &mut SmallRng, prompt: &str) -> Vec<String> {
    let theme = prompt
        .strip_prefix("Theme: ")
        .and_then(|rest| rest.split(". Prompt:").next())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or("jungle");
    IDEA_TEMPLATES
        .choose_multiple(rng, 4)
        .map(|template| {
            let idea = template.replace("{theme}", theme);
            if idea.chars().count() > MAX_IDEA_CHARS {
                idea.chars().take(MAX_IDEA_CHARS).collect()
            } else {
                idea
            }
        })
        .collect()
}

/// Mutable character grid over a level map.
struct Grid {
    rows: Vec<Vec<char>>,
}

impl Grid {
    fn blank(width: usize, height: usize) -> Self {
        Self {
            rows: vec![vec![' '; width]; height],
        }
    }

    fn from_level(level: &Level) -> Self {
        Self {
            rows: level.level_map.iter().map(|r| r.chars().collect()).collect(),
        }
    }

    fn width(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or(0)
    }

    fn height(&self) -> usize {
        self.rows.len()
    }

    fn get(&self, col: usize, row: usize) -> char {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .copied()
            .unwrap_or(' ')
    }

    fn set(&mut self, col: usize, row: usize, ch: char) {
        if let Some(cell) = self.rows.get_mut(row).and_then(|r| r.get_mut(col)) {
            *cell = ch;
        }
    }

    fn supported(&self, col: usize, row: usize) -> bool {
        row + 1 < self.height() && matches!(self.get(col, row + 1), '=' | '-')
    }

    /// Empty cells standing on a platform, away from the spawn and portal.
    fn standing_spots(&self, min_col: usize) -> Vec<(usize, usize)> {
        let keep_clear: Vec<(usize, usize)> = ['@', '!']
            .iter()
            .filter_map(|c| self.find(*c))
            .collect();
        let mut spots = Vec::new();
        for row in 0..self.height() {
            for col in min_col..self.width().saturating_sub(1) {
                let near_marker = keep_clear
                    .iter()
                    .any(|(c, r)| *r == row && c.abs_diff(col) <= 1);
                if self.get(col, row) == ' ' && self.supported(col, row) && !near_marker {
                    spots.push((col, row));
                }
            }
        }
        spots
    }

    fn find(&self, target: char) -> Option<(usize, usize)> {
        self.rows.iter().enumerate().find_map(|(row, line)| {
            line.iter().position(|c| *c == target).map(|col| (col, row))
        })
    }

    fn remove_all(&mut self, target: char) -> usize {
        let mut removed = 0;
        for cell in self.rows.iter_mut().flatten() {
            if *cell == target {
                *cell = ' ';
                removed += 1;
            }
        }
        removed
    }

    /// Scatter up to `count` of `ch` over standing spots; returns how many landed.
    fn scatter(&mut self, rng: &mut SmallRng, ch: char, count: usize, min_col: usize) -> usize {
        let mut spots = self.standing_spots(min_col);
        spots.shuffle(rng);
        let mut placed = 0;
        for (col, row) in spots {
            if placed == count {
                break;
            }
            // Keep spikes single-width so every pit stays jumpable.
            if ch == '^' && (self.get(col.saturating_sub(1), row) == '^' || self.get(col + 1, row) == '^') {
                continue;
            }
            if self.get(col, row) == ' ' {
                self.set(col, row, ch);
                placed += 1;
            }
        }
        placed
    }

    fn add_platform(&mut self, rng: &mut SmallRng, row: usize, start: usize, len: usize) {
        let tile = if rng.gen_bool(0.5) { '=' } else { '-' };
        let end = (start + len).min(self.width().saturating_sub(1));
        for col in start..end {
            if self.get(col, row) == ' ' {
                self.set(col, row, tile);
            }
        }
    }

    fn into_map(self) -> Vec<String> {
        self.rows.into_iter().map(|r| r.into_iter().collect()).collect()
    }
}

fn counts_for(difficulty: Difficulty) -> (usize, usize, usize) {
    // (coins, ghosts, spikes)
    match difficulty {
        Difficulty::Easy => (6, 1, 0),
        Difficulty::Medium => (5, 2, 2),
        Difficulty::Hard => (4, 3, 4),
    }
}

/// Build a fresh level in the recommended 10x24 layout.
pub(crate) fn compose(rng: &mut SmallRng, tileset: Tileset, difficulty: Difficulty) -> Level {
    let (width, height) = (RECOMMENDED_COLUMNS, RECOMMENDED_ROWS);
    let ground = height - 2;
    let mut grid = Grid::blank(width, height);
    for col in 0..width {
        grid.set(col, height - 1, '=');
    }

    let platforms = rng.gen_range(3..6);
    let lane = (width - 6) / platforms;
    for i in 0..platforms {
        let row = rng.gen_range(2..ground - 1);
        let start = 3 + i * lane + rng.gen_range(0..2);
        let len = rng.gen_range(3..6);
        grid.add_platform(rng, row, start, len);
    }

    grid.set(1, ground, '@');
    grid.set(width - 2, ground, '!');

    for _ in 0..8 {
        let col = rng.gen_range(4..width - 4);
        let row = ground - 3;
        if grid.get(col, row) == ' ' && grid.get(col, row + 1) == ' ' && grid.get(col, row - 1) == ' ' {
            grid.set(col, row, '%');
            break;
        }
    }

    let (coins, ghosts, spikes) = counts_for(difficulty);
    grid.scatter(rng, '$', coins, 3);
    grid.scatter(rng, '>', ghosts, 6);
    grid.scatter(rng, '^', spikes, 5);

    let (background, hud, accent) = tileset.palette();
    Level {
        level_map: grid.into_map(),
        tileset,
        difficulty,
        background_color: background.to_string(),
        hud_color: hud.to_string(),
        accent_color: accent.to_string(),
        platform_tint: None,
    }
}

fn shade(hex: &str, factor: f32) -> Option<String> {
    let rgb = Rgb::parse_hex(hex)?;
    let scale = |v: u8| (v as f32 * factor).round().clamp(0.0, 255.0) as u8;
    Some(
        Rgb {
            r: scale(rgb.r),
            g: scale(rgb.g),
            b: scale(rgb.b),
        }
        .to_hex(),
    )
}

/// Apply a plain-language instruction with keyword rules. Returns the revised
/// level and a list of what changed (empty when nothing matched).
pub(crate) fn revise(current: &Level, instruction: &str, rng: &mut SmallRng) -> (Level, Vec<String>) {
    let lowered = instruction.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| lowered.contains(w));
    let fewer = has(&["fewer", "less", "remove", "no ", "without", "get rid"]);
    let mut level = current.clone();
    let mut grid = Grid::from_level(current);
    let mut changes = Vec::new();

    if has(&["coin"]) {
        if fewer {
            changes.push(format!("removed {} coins", grid.remove_all('$')));
        } else {
            changes.push(format!("added {} coins", grid.scatter(rng, '$', 3, 3)));
        }
    }
    if has(&["enem", "ghost"]) {
        if fewer {
            changes.push(format!("removed {} ghosts", grid.remove_all('>')));
        } else {
            changes.push(format!("added {} ghosts", grid.scatter(rng, '>', 2, 6)));
        }
    }
    if has(&["spike"]) {
        if fewer {
            changes.push(format!("removed {} spikes", grid.remove_all('^')));
        } else {
            changes.push(format!("added {} spikes", grid.scatter(rng, '^', 2, 5)));
        }
    }
    if has(&["platform", "ledge"]) && !fewer && grid.height() > 5 && grid.width() > 8 {
        let row = rng.gen_range(2..grid.height() - 3);
        let start = rng.gen_range(3..grid.width() - 5);
        grid.add_platform(rng, row, start, 4);
        changes.push("added a platform".to_string());
    }
    if has(&["harder", "more difficult", "tougher"]) {
        level.difficulty = match level.difficulty {
            Difficulty::Easy => Difficulty::Medium,
            _ => Difficulty::Hard,
        };
        let spikes = grid.scatter(rng, '^', 2, 5);
        let ghosts = grid.scatter(rng, '>', 1, 6);
        changes.push(format!("made it harder (+{spikes} spikes, +{ghosts} ghosts)"));
    } else if has(&["easier", "simpler", "gentler"]) {
        level.difficulty = match level.difficulty {
            Difficulty::Hard => Difficulty::Medium,
            _ => Difficulty::Easy,
        };
        let spikes = grid.remove_all('^');
        changes.push(format!("made it easier (-{spikes} spikes)"));
    }
    for tileset in Tileset::ALL {
        if tileset != level.tileset && lowered.contains(tileset.as_str()) {
            let (background, hud, accent) = tileset.palette();
            level.tileset = tileset;
            level.background_color = background.to_string();
            level.hud_color = hud.to_string();
            level.accent_color = accent.to_string();
            level.platform_tint = None;
            changes.push(format!("switched to the {} tileset", tileset.as_str()));
            break;
        }
    }
    if has(&["darker", "night"]) {
        if let Some(darker) = shade(&level.background_color, 0.6) {
            level.background_color = darker;
            changes.push("darkened the background".to_string());
        }
    } else if has(&["brighter", "lighter"]) {
        if let Some(lighter) = shade(&level.background_color, 1.4) {
            level.background_color = lighter;
            changes.push("brightened the background".to_string());
        }
    }

    level.level_map = grid.into_map();
    (level, changes)
}
