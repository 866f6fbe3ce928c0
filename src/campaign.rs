use crate::level::{Difficulty, Level, TileLegend, Tileset};

/// Built-in levels played from the main menu. Read with [`TileLegend::Campaign`]:
/// `@` is the exit portal and the player starts at a fixed point.
const CAMPAIGN_MAPS: [&[&str]; 3] = [
    &[
        "    0       ",
        "   --       ",
        "       $    ",
        " %    ===   ",
        "            ",
        "   ^^  > = @",
        "============",
    ],
    &[
        "                          $",
        "                          $",
        "                          $",
        "                          $",
        "                          $",
        "           $         =    $",
        "  %      ====         =   $",
        "                      =   $",
        "                      =    ",
        "       ^^      = >    =   @",
        "===========================",
    ],
    &[
        "     $    $    $    $     $",
        "     $    $    $    $     $",
        "                           ",
        "                           ",
        "                           ",
        "                           ",
        "                           ",
        " ^^^^>^^^^>^^^^>^^^^>^^^^^@",
        "===========================",
    ],
];

/// Player start for campaign levels, in tiles from the top-left corner.
pub const CAMPAIGN_SPAWN_TILE: (usize, usize) = (1, 0);

pub fn campaign_levels() -> Vec<Level> {
    let (background, hud, accent) = ("#8db7ff", "#ffffff", "#ffdc32");
    CAMPAIGN_MAPS
        .iter()
        .enumerate()
        .map(|(i, rows)| Level {
            level_map: rows.iter().map(|r| r.to_string()).collect(),
            tileset: Tileset::Jungle,
            difficulty: match i {
                0 => Difficulty::Easy,
                1 => Difficulty::Medium,
                _ => Difficulty::Hard,
            },
            background_color: background.to_string(),
            hud_color: hud.to_string(),
            accent_color: accent.to_string(),
            platform_tint: None,
        })
        .collect()
}

pub fn campaign_legend() -> TileLegend {
    TileLegend::Campaign
}
