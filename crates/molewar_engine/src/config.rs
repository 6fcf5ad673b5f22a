//! # Game Tuning
//!
//! All balance values in one serde struct, loadable from a TOML file.
//! The defaults are the shipped tuning; a deployment can override any
//! subset of fields.

use serde::{Deserialize, Serialize};

use crate::error::{EconomyError, EconomyResult};

/// Upper bound on any configured duration: one year, far above any sane
/// tuning and low enough that millisecond conversion can never overflow.
const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

/// Tunable game balance values.
///
/// Durations are stored in whole seconds (the grain every rule uses) and
/// converted to milliseconds at the comparison sites.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GameConfig {
    /// Balance a freshly created (or respawned) player holds.
    pub starting_points: u64,
    /// Points gained by wacking your own animal.
    pub self_wack_gain: u64,
    /// Upper bound on points stolen per attack.
    pub steal_cap: u64,
    /// Points burned to raise a shield.
    pub shield_cost: u64,
    /// How long a shield holds, in seconds.
    pub shield_duration_secs: u64,
    /// How long a dead player waits before respawning, in seconds.
    pub respawn_cooldown_secs: u64,
    /// Width of the loss-alert window, in seconds.
    pub loss_window_secs: u64,
    /// Accumulated loss that triggers an attack warning.
    pub loss_alert_threshold: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            starting_points: 1000,
            self_wack_gain: 100,
            steal_cap: 100,
            shield_cost: 1000,
            shield_duration_secs: 600,
            respawn_cooldown_secs: 90,
            loss_window_secs: 60,
            loss_alert_threshold: 1000,
        }
    }
}

impl GameConfig {
    /// Parses a config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::InvalidConfig`] on parse failure or a tuning
    /// value that cannot work (zero steal cap, zero alert threshold).
    pub fn from_toml_str(text: &str) -> EconomyResult<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| EconomyError::InvalidConfig(format!("tuning parse failed: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a config from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::InvalidConfig`] if the file cannot be read or
    /// fails validation.
    pub fn from_toml(path: impl AsRef<std::path::Path>) -> EconomyResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| EconomyError::InvalidConfig(format!("tuning file unreadable: {e}")))?;
        Self::from_toml_str(&text)
    }

    /// Rejects tuning values the rules cannot operate with.
    fn validate(&self) -> EconomyResult<()> {
        if self.starting_points == 0 {
            // A fresh player with 0 points would be alive at zero balance,
            // violating the death invariant.
            return Err(EconomyError::InvalidConfig(
                "starting_points must be positive".to_string(),
            ));
        }
        if self.steal_cap == 0 {
            return Err(EconomyError::InvalidConfig(
                "steal_cap must be positive".to_string(),
            ));
        }
        if self.loss_alert_threshold == 0 {
            return Err(EconomyError::InvalidConfig(
                "loss_alert_threshold must be positive".to_string(),
            ));
        }
        for (name, secs) in [
            ("shield_duration_secs", self.shield_duration_secs),
            ("respawn_cooldown_secs", self.respawn_cooldown_secs),
            ("loss_window_secs", self.loss_window_secs),
        ] {
            if secs > MAX_DURATION_SECS {
                return Err(EconomyError::InvalidConfig(format!(
                    "{name} exceeds the {MAX_DURATION_SECS}s limit"
                )));
            }
        }
        Ok(())
    }

    /// Shield duration in milliseconds.
    #[inline]
    #[must_use]
    pub const fn shield_duration_millis(&self) -> u64 {
        self.shield_duration_secs * 1000
    }

    /// Respawn cooldown in milliseconds.
    #[inline]
    #[must_use]
    pub const fn respawn_cooldown_millis(&self) -> u64 {
        self.respawn_cooldown_secs * 1000
    }

    /// Loss-alert window in milliseconds.
    #[inline]
    #[must_use]
    pub const fn loss_window_millis(&self) -> u64 {
        self.loss_window_secs * 1000
    }
}
