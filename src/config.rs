// src/config.rs
//! Persistent settings for routing and simulation

use crate::error::{ConfigError, Result};
use crate::plan::{PlanConfig, DEFAULT_MAX_LEG_GAP_M};
use crate::routing::osrm::DEFAULT_OSRM_URL;
use crate::routing::{DirectRouter, OsrmClient, Profile, RoutingService};
use crate::simulation::SimulationConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RouterKind {
    /// Offline straight-segment routing
    #[default]
    Direct,
    /// OSRM-compatible HTTP service
    Osrm,
}

impl std::fmt::Display for RouterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouterKind::Direct => write!(f, "direct"),
            RouterKind::Osrm => write!(f, "osrm"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavConfig {
    pub router: RouterKind,
    pub osrm_url: String,
    pub profile: Profile,
    pub max_leg_gap_m: f64,
    pub simulation: SimulationConfig,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            router: RouterKind::Direct,
            osrm_url: DEFAULT_OSRM_URL.to_string(),
            profile: Profile::Driving,
            max_leg_gap_m: DEFAULT_MAX_LEG_GAP_M,
            simulation: SimulationConfig::default(),
        }
    }
}

impl NavConfig {
    /// Load configuration from the user's config file, or defaults when absent
    pub fn load() -> Result<Self> {
        let path = Self::get_config_path()?;
        Ok(Self::load_from(&path)?)
    }

    pub fn load_from(path: &Path) -> std::result::Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        serde_json::from_str(&contents).map_err(|source| ConfigError::Decode {
            what: path.display().to_string(),
            source,
        })
    }

    /// Save configuration to the user's config file
    pub fn save(&self) -> Result<()> {
        let path = Self::get_config_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// `$HOME/.config/route-handoff/config.json`
    pub fn get_config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .map_err(|_| ConfigError::Invalid("HOME environment variable not set".to_string()))?;

        Ok(PathBuf::from(home)
            .join(".config")
            .join("route-handoff")
            .join("config.json"))
    }

    /// Build the configured routing service
    pub fn build_router(&self) -> Result<Box<dyn RoutingService>> {
        Ok(match self.router {
            RouterKind::Direct => Box::new(DirectRouter::new(self.simulation.speed_mps)),
            RouterKind::Osrm => Box::new(OsrmClient::new(&self.osrm_url)?),
        })
    }

    pub fn update_router(&mut self, router: RouterKind) {
        self.router = router;
    }

    /// Switch to OSRM at `url`
    pub fn update_osrm(&mut self, url: String) {
        self.router = RouterKind::Osrm;
        self.osrm_url = url;
    }

    /// Apply router overrides from the command line. An OSRM URL only makes
    /// sense for the OSRM router, so pairing it with `direct` is rejected.
    pub fn apply_router_overrides(
        &mut self,
        router: Option<RouterKind>,
        osrm_url: Option<String>,
    ) -> std::result::Result<(), ConfigError> {
        match (router, osrm_url) {
            (Some(RouterKind::Direct), Some(url)) => Err(ConfigError::Invalid(format!(
                "OSRM URL {} cannot be used with the direct router",
                url
            ))),
            (_, Some(url)) => {
                self.update_osrm(url);
                Ok(())
            }
            (Some(router), None) => {
                self.update_router(router);
                Ok(())
            }
            (None, None) => Ok(()),
        }
    }

    /// Load a plan file, filling its profile and gap tolerance from this
    /// config when the file leaves them out
    pub fn load_plan(&self, path: &Path) -> std::result::Result<PlanConfig, ConfigError> {
        let mut plan = PlanConfig::load(path)?;
        plan.fill_defaults(self.profile, self.max_leg_gap_m);
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NavConfig::default();
        assert_eq!(config.router, RouterKind::Direct);
        assert_eq!(config.simulation.tick_ms, 1000);
        assert_eq!(config.max_leg_gap_m, DEFAULT_MAX_LEG_GAP_M);
    }

    #[test]
    fn test_update_osrm() {
        let mut config = NavConfig::default();
        config.update_osrm("http://localhost:5000".to_string());
        assert_eq!(config.router, RouterKind::Osrm);
        assert_eq!(config.osrm_url, "http://localhost:5000");

        config.update_router(RouterKind::Direct);
        assert_eq!(config.router, RouterKind::Direct);
    }

    #[test]
    fn test_router_overrides() {
        let mut config = NavConfig::default();
        config
            .apply_router_overrides(Some(RouterKind::Osrm), Some("http://localhost:5000".to_string()))
            .unwrap();
        assert_eq!(config.router, RouterKind::Osrm);
        assert_eq!(config.osrm_url, "http://localhost:5000");

        config.apply_router_overrides(Some(RouterKind::Direct), None).unwrap();
        assert_eq!(config.router, RouterKind::Direct);

        let result = config.apply_router_overrides(
            Some(RouterKind::Direct),
            Some("http://other:5000".to_string()),
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
        assert_eq!(config.router, RouterKind::Direct);
        assert_eq!(config.osrm_url, "http://localhost:5000");
    }

    #[test]
    fn test_load_plan_fills_profile_and_gap_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let bare = dir.path().join("bare.json");
        std::fs::write(
            &bare,
            r#"{"legs": [{"name": "walk", "kind": "match", "coordinates": [[18.1, 59.3], [18.2, 59.3]]}]}"#,
        )
        .unwrap();
        let explicit = dir.path().join("explicit.json");
        std::fs::write(
            &explicit,
            r#"{"profile": "cycling", "max_leg_gap_m": 10,
                "legs": [{"name": "ride", "kind": "match", "coordinates": [[18.1, 59.3], [18.2, 59.3]]}]}"#,
        )
        .unwrap();

        let config = NavConfig {
            profile: Profile::Walking,
            max_leg_gap_m: 75.0,
            ..NavConfig::default()
        };

        let plan = config.load_plan(&bare).unwrap();
        assert_eq!(plan.profile(), Profile::Walking);
        assert_eq!(plan.gap_tolerance(), 75.0);
        assert_eq!(plan.base_dir, dir.path());

        let plan = config.load_plan(&explicit).unwrap();
        assert_eq!(plan.profile(), Profile::Cycling);
        assert_eq!(plan.gap_tolerance(), 10.0);
    }

    #[test]
    fn test_save_and_load_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = NavConfig::default();
        config.simulation.speed_multiplier = 4.0;
        config.save_to(&path).unwrap();

        let loaded = NavConfig::load_from(&path).unwrap();
        assert_eq!(loaded.simulation.speed_multiplier, 4.0);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"router": "osrm", "simulation": {"tick_ms": 250}}"#).unwrap();

        let loaded = NavConfig::load_from(&path).unwrap();
        assert_eq!(loaded.router, RouterKind::Osrm);
        assert_eq!(loaded.simulation.tick_ms, 250);
        assert_eq!(loaded.simulation.speed_mps, 13.9);
        assert_eq!(loaded.osrm_url, DEFAULT_OSRM_URL);
    }

    #[test]
    fn test_missing_file_gives_defaults_and_bad_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        assert_eq!(NavConfig::load_from(&missing).unwrap(), NavConfig::default());

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{not json").unwrap();
        assert!(matches!(
            NavConfig::load_from(&bad),
            Err(ConfigError::Decode { .. })
        ));
    }
}
