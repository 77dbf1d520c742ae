//! Server configuration.
//!
//! A JSON file describes the listen address, the map layout and the initial
//! population. Every key is optional; the defaults describe a small walled
//! test map with a few items and one wanderer.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use land_component::{MapChunk, Terrain};
use land_math::Position;
use serde::Deserialize;

/// Default listen address.
pub const DEFAULT_LISTEN: &str = "127.0.0.1:4343";

/// A straight run of terrain drawn onto the bordered map.
#[derive(Debug, Clone, Deserialize)]
pub struct SegmentConfig {
    /// Start cell, inclusive.
    pub from: [i32; 2],
    /// Per-cell step, e.g. `[1, 0]` for a horizontal run.
    pub step: [i32; 2],
    /// Number of cells.
    pub len: u32,
    /// Terrain to draw.
    #[serde(default = "default_segment_terrain")]
    pub terrain: Terrain,
}

fn default_segment_terrain() -> Terrain {
    Terrain::Wall
}

/// Map dimensions and interior segments.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Width in cells, border included.
    pub width: u32,
    /// Height in cells, border included.
    pub height: u32,
    /// Segments drawn over the floor.
    pub segments: Vec<SegmentConfig>,
}

impl Default for MapConfig {
    fn default() -> Self {
        let wall = |from: [i32; 2], step: [i32; 2], len: u32| SegmentConfig {
            from,
            step,
            len,
            terrain: Terrain::Wall,
        };
        Self {
            width: 40,
            height: 20,
            segments: vec![
                wall([10, 4], [1, 0], 8),
                wall([10, 5], [0, 1], 6),
                wall([26, 8], [0, 1], 9),
                SegmentConfig {
                    from: [30, 3],
                    step: [1, 0],
                    len: 5,
                    terrain: Terrain::Water,
                },
            ],
        }
    }
}

/// An item lying on the map at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemConfig {
    /// Display and inventory name.
    pub name: String,
    /// Drawing character.
    pub glyph: char,
    /// Cell the item lies on.
    pub at: [i32; 2],
    /// Whether players can pick it up.
    #[serde(default = "default_gettable")]
    pub gettable: bool,
}

fn default_gettable() -> bool {
    true
}

/// A server-driven creature.
#[derive(Debug, Clone, Deserialize)]
pub struct WandererConfig {
    /// Display name.
    pub name: String,
    /// Drawing character.
    pub glyph: char,
    /// Starting cell.
    pub at: [i32; 2],
    /// Wander ticks between steps.
    #[serde(default = "default_period")]
    pub period_ticks: u32,
}

fn default_period() -> u32 {
    2
}

/// Configuration for one server process.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to accept connections on, `host:port`.
    pub listen: String,
    /// Interval of the wander system, in milliseconds.
    pub wander_tick_ms: u64,
    /// Map layout.
    pub map: MapConfig,
    /// Items placed at startup.
    pub items: Vec<ItemConfig>,
    /// Wanderers placed at startup.
    pub wanderers: Vec<WandererConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let item = |name: &str, glyph: char, at: [i32; 2]| ItemConfig {
            name: name.to_string(),
            glyph,
            at,
            gettable: true,
        };
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            wander_tick_ms: 250,
            map: MapConfig::default(),
            items: vec![
                item("sword", '/', [5, 5]),
                item("apple", '%', [15, 10]),
                item("coin", '$', [33, 15]),
                ItemConfig {
                    name: "boulder".to_string(),
                    glyph: '0',
                    at: [22, 6],
                    gettable: false,
                },
            ],
            wanderers: vec![WandererConfig {
                name: "rat".to_string(),
                glyph: 'r',
                at: [30, 12],
                period_ticks: 2,
            }],
        }
    }
}

impl ServerConfig {
    /// Load a config from a JSON file. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("parsing config file {}", path.display()))
    }

    /// Parse a config from JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid config.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Override the listen address.
    #[must_use]
    pub fn with_listen(mut self, listen: impl Into<String>) -> Self {
        self.listen = listen.into();
        self
    }

    /// Check the settings the server cannot start without.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.listen.trim().is_empty() {
            bail!("missing listen address in config");
        }
        if self.map.width < 3 || self.map.height < 3 {
            bail!(
                "map must be at least 3x3, got {}x{}",
                self.map.width,
                self.map.height
            );
        }
        if self.wander_tick_ms == 0 {
            bail!("wander_tick_ms must be positive");
        }
        Ok(())
    }

    /// Interval of the wander system.
    #[must_use]
    pub fn wander_tick(&self) -> Duration {
        Duration::from_millis(self.wander_tick_ms)
    }

    /// Build the terrain grid: a walled rectangle with the configured
    /// segments drawn on top.
    #[must_use]
    pub fn build_map(&self) -> MapChunk {
        let mut map = MapChunk::bordered(self.map.width, self.map.height);
        for segment in &self.map.segments {
            map.line(
                Position::from(segment.from),
                Position::from(segment.step),
                segment.len,
                segment.terrain,
            );
        }
        map
    }
}
