//! Application settings

use std::path::Path;

use serde::{Deserialize, Serialize};

use shared::DEFAULT_PAINT_COLOR;

/// Length unit for user-facing measurements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Units {
    Millimeters,
    Centimeters,
    Meters,
    #[default]
    Inches,
}

impl Units {
    /// Get the abbreviation for this unit
    pub fn abbrev(&self) -> &'static str {
        match self {
            Units::Millimeters => "mm",
            Units::Centimeters => "cm",
            Units::Meters => "m",
            Units::Inches => "in",
        }
    }

    /// Conversion to scene units (meters)
    pub fn to_meters(&self, value: f32) -> f32 {
        match self {
            Units::Millimeters => value / 1000.0,
            Units::Centimeters => value / 100.0,
            Units::Meters => value,
            Units::Inches => value / 39.37,
        }
    }
}

/// Where model assets are fetched from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetSettings {
    /// Prefix for root-relative asset URLs (`/models/...`)
    pub origin: Option<String>,
    /// Low-detail base model, loaded first
    pub low_detail_url: String,
    /// High-detail base model, loaded in the background
    pub high_detail_url: String,
    /// Part assets live at `{part_base_url}{part_id}.glb`
    pub part_base_url: String,
}

impl Default for AssetSettings {
    fn default() -> Self {
        Self {
            origin: None,
            low_detail_url: "/models/RC/Truck.glb".to_string(),
            high_detail_url: "/models/RC/High/Truck.glb".to_string(),
            part_base_url: "https://d2i8r6g6395gr3.cloudfront.net/glb/".to_string(),
        }
    }
}

impl AssetSettings {
    pub fn part_url(&self, part_id: &str) -> String {
        format!("{}{}.glb", self.part_base_url, part_id)
    }

    /// Absolute URL for `url`, joining root-relative paths onto `origin`.
    pub fn resolve(&self, url: &str) -> String {
        match &self.origin {
            Some(origin) if url.starts_with('/') => {
                format!("{}{}", origin.trim_end_matches('/'), url)
            }
            _ => url.to_string(),
        }
    }
}

/// Object store the artifacts are published to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// S3-compatible endpoint. `None` with no keys keeps artifacts in memory.
    pub endpoint: Option<String>,
    pub bucket: String,
    pub region: String,
    /// Path-style addressing (`{endpoint}/{bucket}/{key}`)
    pub force_path_style: bool,
    pub glb_folder: String,
    pub usdz_folder: String,
    /// Overrides the store's own public URL for published objects
    pub public_base_url: Option<String>,
    /// Static credentials; without them the default AWS provider chain is used.
    pub access_key_id: Option<String>,
    #[serde(skip_serializing)]
    pub secret_access_key: Option<String>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            bucket: "rough-country".to_string(),
            region: "us-east-1".to_string(),
            force_path_style: false,
            glb_folder: "rough-country-glb".to_string(),
            usdz_folder: "rough-country-usdz".to_string(),
            public_base_url: None,
            access_key_id: None,
            secret_access_key: None,
        }
    }
}

/// Public bases used by the AR viewer page (`{base}/{hash}.{ext}`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerSettings {
    pub glb_base_url: String,
    pub usdz_base_url: String,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            glb_base_url: "https://d48f7equ64qjl.cloudfront.net/rough-country-glb".to_string(),
            usdz_base_url: "https://d48f7equ64qjl.cloudfront.net/rough-country-usdz".to_string(),
        }
    }
}

/// Vehicle-specific naming and limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleSettings {
    /// Sub-assembly that receives paint and is moved by height adjustment
    pub body_node: String,
    /// Name fragment of the part the body must clear
    pub reference_part: String,
    pub default_color: String,
    /// Unit of height deltas and the clearance threshold
    pub units: Units,
    pub clearance: f32,
    pub height_step: f32,
}

impl Default for VehicleSettings {
    fn default() -> Self {
        Self {
            body_node: "TruckBody".to_string(),
            reference_part: "tire".to_string(),
            default_color: DEFAULT_PAINT_COLOR.to_string(),
            units: Units::Inches,
            clearance: 0.25,
            height_step: 0.25,
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3001".to_string(),
        }
    }
}

/// All application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub assets: AssetSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub viewer: ViewerSettings,
    #[serde(default)]
    pub vehicle: VehicleSettings,
    #[serde(default)]
    pub server: ServerSettings,
}

impl Settings {
    /// Settings from the platform config dir (or defaults), then environment overrides.
    pub fn load() -> Self {
        let mut settings = Self::default_path()
            .and_then(|path| match Self::from_file(&path) {
                Ok(s) => {
                    tracing::info!("Loaded settings from {}", path.display());
                    Some(s)
                }
                Err(e) => {
                    if path.exists() {
                        tracing::warn!("Ignoring settings at {}: {e}", path.display());
                    }
                    None
                }
            })
            .unwrap_or_default();
        settings.apply_env(|k| std::env::var(k).ok());
        settings
    }

    fn default_path() -> Option<std::path::PathBuf> {
        directories::ProjectDirs::from("com", "configurator", "configurator")
            .map(|dirs| dirs.config_dir().join("settings.json"))
    }

    /// Read settings from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let json = std::fs::read_to_string(path).map_err(|e| format!("read error: {e}"))?;
        serde_json::from_str(&json).map_err(|e| format!("JSON parse error: {e}"))
    }

    /// Save settings to a JSON file
    pub fn save(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| e.to_string())?;
        std::fs::write(path, json).map_err(|e| e.to_string())
    }

    /// Apply `CONFIGURATOR_*` / `S3_*` overrides from a variable lookup.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("CONFIGURATOR_ASSET_ORIGIN") {
            self.assets.origin = Some(v);
        }
        if let Some(v) = var("CONFIGURATOR_LOW_DETAIL_URL") {
            self.assets.low_detail_url = v;
        }
        if let Some(v) = var("CONFIGURATOR_HIGH_DETAIL_URL") {
            self.assets.high_detail_url = v;
        }
        if let Some(v) = var("CONFIGURATOR_PART_BASE_URL") {
            self.assets.part_base_url = v;
        }
        if let Some(v) = var("CONFIGURATOR_BIND") {
            self.server.bind = v;
        }
        if let Some(v) = var("S3_ENDPOINT") {
            self.storage.endpoint = Some(v);
        }
        if let Some(v) = var("S3_BUCKET") {
            self.storage.bucket = v;
        }
        if let Some(v) = var("S3_REGION") {
            self.storage.region = v;
        }
        if let Some(v) = var("S3_FORCE_PATH_STYLE") {
            self.storage.force_path_style = v == "true" || v == "1";
        }
        if let Some(v) = var("S3_PUBLIC_BASE_URL") {
            self.storage.public_base_url = Some(v);
        }
        if let Some(v) = var("S3_ACCESS_KEY_ID") {
            self.storage.access_key_id = Some(v);
        }
        if let Some(v) = var("S3_SECRET_ACCESS_KEY") {
            self.storage.secret_access_key = Some(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_inches_to_meters() {
        assert!((Units::Inches.to_meters(39.37) - 1.0).abs() < 1e-6);
        assert!((Units::Inches.to_meters(0.25) - 0.00635).abs() < 1e-5);
        assert_eq!(Units::Millimeters.to_meters(1000.0), 1.0);
        assert_eq!(Units::Inches.abbrev(), "in");
    }

    #[test]
    fn test_part_url() {
        let a = AssetSettings {
            part_base_url: "https://cdn/glb/".into(),
            ..Default::default()
        };
        assert_eq!(a.part_url("Wheel_2"), "https://cdn/glb/Wheel_2.glb");
    }

    #[test]
    fn test_resolve_relative_urls() {
        let mut a = AssetSettings::default();
        assert_eq!(a.resolve("/models/RC/Truck.glb"), "/models/RC/Truck.glb");
        a.origin = Some("http://localhost:3000/".into());
        assert_eq!(
            a.resolve("/models/RC/Truck.glb"),
            "http://localhost:3000/models/RC/Truck.glb"
        );
        assert_eq!(a.resolve("https://cdn/x.glb"), "https://cdn/x.glb");
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("S3_ENDPOINT", "http://localhost:9000"),
            ("S3_BUCKET", "assets"),
            ("S3_FORCE_PATH_STYLE", "1"),
            ("CONFIGURATOR_BIND", "127.0.0.1:8080"),
            ("S3_ACCESS_KEY_ID", "minio"),
            ("S3_SECRET_ACCESS_KEY", "minio123"),
        ]
        .into_iter()
        .collect();
        let mut s = Settings::default();
        s.apply_env(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(s.storage.endpoint.as_deref(), Some("http://localhost:9000"));
        assert_eq!(s.storage.bucket, "assets");
        assert!(s.storage.force_path_style);
        assert_eq!(s.server.bind, "127.0.0.1:8080");
        assert_eq!(s.storage.region, "us-east-1");
        assert_eq!(s.storage.access_key_id.as_deref(), Some("minio"));
        assert_eq!(s.storage.secret_access_key.as_deref(), Some("minio123"));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r##"{ "vehicle": { "body_node": "Cab", "reference_part": "wheel", "default_color": "#ffffff", "units": "Inches", "clearance": 0.5, "height_step": 0.5 } }"##;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.vehicle.body_node, "Cab");
        assert_eq!(s.storage.glb_folder, "rough-country-glb");
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let mut s = Settings::default();
        s.storage.bucket = "custom".into();
        s.save(&path).unwrap();
        let back = Settings::from_file(&path).unwrap();
        assert_eq!(back.storage.bucket, "custom");
    }
}
