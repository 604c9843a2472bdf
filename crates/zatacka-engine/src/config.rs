use serde::{Deserialize, Serialize};

use zatacka_core::error::SettingsError;
use zatacka_core::player::PowerKind;

/// Smallest field edge; leaves room for eight distinct spawn cells.
pub const MIN_FIELD_EDGE: u32 = 16;
pub const MAX_FIELD_EDGE: u32 = 1024;
/// Longest a power, a gap, or the spawn grace may last.
pub const MAX_EFFECT_TICKS: u32 = 10_000;
pub const MAX_POWER_CHARGES: u8 = 16;

/// Data-driven simulation parameters, fixed when a controller is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Field width in cells.
    pub field_width: u32,
    /// Field height in cells.
    pub field_height: u32,
    /// Ticks a hole-maker leaves no trail.
    pub hole_ticks: u32,
    /// Ticks a wall-maker lays permanent wall.
    pub wall_ticks: u32,
    /// Ticks a border-phaser wraps around the field edges.
    pub phase_ticks: u32,
    /// Power activations available to each player per round.
    pub power_charges: u8,
    /// Ticks after spawning during which a cycle leaves no trail and passes
    /// through trails and walls. Borders and head-on hits still count.
    pub grace_ticks: u32,
    /// Trail ticks between two periodic gaps, drawn per gap.
    pub gap_interval_min: u32,
    pub gap_interval_max: u32,
    /// Length of a periodic gap, drawn per gap. `0` disables gaps.
    pub gap_duration_min: u32,
    pub gap_duration_max: u32,
    /// Seed for gap timing. Drawn from the OS when absent.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            field_width: 80,
            field_height: 60,
            hole_ticks: 6,
            wall_ticks: 12,
            phase_ticks: 30,
            power_charges: 1,
            grace_ticks: 3,
            gap_interval_min: 20,
            gap_interval_max: 40,
            gap_duration_min: 2,
            gap_duration_max: 3,
            seed: None,
        }
    }
}

impl EngineConfig {
    /// Load config from environment or TOML file, falling back to defaults.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("ZATACKA_ENGINE_CONFIG")
            && let Some(config) = Self::read(&path)
        {
            return config;
        }
        Self::read("config/engine.toml").unwrap_or_default()
    }

    fn read(path: &str) -> Option<Self> {
        let contents = std::fs::read_to_string(path).ok()?;
        let config = match toml::from_str::<Self>(&contents) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path, error = %e, "Ignoring unparsable engine config");
                return None;
            },
        };
        match config.validate() {
            Ok(()) => Some(config),
            Err(e) => {
                tracing::warn!(path, error = %e, "Ignoring invalid engine config");
                None
            },
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        for (setting, value) in [
            ("field_width", self.field_width),
            ("field_height", self.field_height),
        ] {
            check_range(setting, value, MIN_FIELD_EDGE, MAX_FIELD_EDGE)?;
        }
        for (setting, value) in [
            ("hole_ticks", self.hole_ticks),
            ("wall_ticks", self.wall_ticks),
            ("phase_ticks", self.phase_ticks),
        ] {
            check_range(setting, value, 1, MAX_EFFECT_TICKS)?;
        }
        check_range(
            "power_charges",
            u32::from(self.power_charges),
            0,
            u32::from(MAX_POWER_CHARGES),
        )?;
        check_range("grace_ticks", self.grace_ticks, 0, MAX_EFFECT_TICKS)?;

        if self.gaps_enabled() {
            check_range(
                "gap_duration_min",
                self.gap_duration_min,
                1,
                self.gap_duration_max,
            )?;
            // A gap must be shorter than the shortest trail run, or a cycle
            // could roam the field forever.
            check_range(
                "gap_interval_min",
                self.gap_interval_min,
                self.gap_duration_max.saturating_add(1),
                MAX_EFFECT_TICKS,
            )?;
            check_range(
                "gap_interval_max",
                self.gap_interval_max,
                self.gap_interval_min,
                MAX_EFFECT_TICKS,
            )?;
        }
        Ok(())
    }

    /// Whether cycles leave periodic gaps in their trail.
    pub fn gaps_enabled(&self) -> bool {
        self.gap_duration_max > 0
    }

    /// How long an activated power lasts.
    pub fn power_ticks(&self, kind: PowerKind) -> u32 {
        match kind {
            PowerKind::None => 0,
            PowerKind::HoleMaker => self.hole_ticks,
            PowerKind::WallMaker => self.wall_ticks,
            PowerKind::BorderPhaser => self.phase_ticks,
        }
    }

    pub fn cells(&self) -> u32 {
        self.field_width.saturating_mul(self.field_height)
    }

    /// Upper bound on round length.
    ///
    /// The last cycle standing fills a fresh cell on every tick except its
    /// grace, hole and gap ticks. Gaps are shorter than the trail runs
    /// between them, which bounds their share of the round.
    pub fn tick_limit(&self) -> u32 {
        let no_trail = u64::from(self.cells())
            + u64::from(self.grace_ticks)
            + u64::from(self.power_charges) * u64::from(self.hole_ticks);
        let limit = if self.gaps_enabled() && self.gap_interval_min > self.gap_duration_max {
            let interval = u64::from(self.gap_interval_min);
            let gap = u64::from(self.gap_duration_max);
            (no_trail + gap).saturating_mul(interval) / (interval - gap)
        } else {
            no_trail
        };
        u32::try_from(limit.saturating_add(1)).unwrap_or(u32::MAX)
    }
}

fn check_range(setting: &'static str, value: u32, min: u32, max: u32) -> Result<(), SettingsError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(SettingsError::OutOfRange {
            setting,
            value,
            min,
            max,
        })
    }
}
