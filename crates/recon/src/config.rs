use serde::{Deserialize, Deserializer};

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Everything the engine reads from configuration. Every section is optional;
/// an empty TOML document yields [`ReconConfig::default`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconConfig {
    pub ai: AiCodes,
    pub matching: MatchingConfig,
    pub expiry: ExpiryConfig,
    pub scan: ScanConfig,
    pub messages: MessageConfig,
    pub sloc: SlocConfig,
}

// ---------------------------------------------------------------------------
// Barcode
// ---------------------------------------------------------------------------

/// GS1 Application Identifiers tried first for each field.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AiCodes {
    pub material: String,
    pub batch: String,
    pub serial: String,
}

impl Default for AiCodes {
    fn default() -> Self {
        Self {
            material: "240".into(),
            batch: "10".into(),
            serial: "21".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchingConfig {
    /// Index numeric materials under their leading-zero-free form as well.
    pub smart_zero: bool,
    /// Retry pass 1 with `batch + delimiter + serial` as the serial.
    pub enable_concat: bool,
    pub concat_delimiter: String,
    /// Preferred plants, most preferred first. Accepts a list or a
    /// comma-separated string.
    #[serde(deserialize_with = "deserialize_plant_list")]
    pub plant_priority: Vec<String>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            smart_zero: false,
            enable_concat: true,
            concat_delimiter: String::new(),
            plant_priority: Vec::new(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PlantList {
    List(Vec<String>),
    Csv(String),
}

fn deserialize_plant_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match PlantList::deserialize(deserializer)? {
        PlantList::List(items) => items,
        PlantList::Csv(s) => s.split(',').map(str::to_string).collect(),
    };
    Ok(normalize_plants(raw))
}

/// Trim, uppercase and drop blanks.
pub fn normalize_plants<I, S>(plants: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    plants
        .into_iter()
        .map(|p| p.as_ref().trim().to_uppercase())
        .filter(|p| !p.is_empty())
        .collect()
}

// ---------------------------------------------------------------------------
// Expiry + Scan sheet
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExpiryConfig {
    pub near_expiry_months: u32,
    pub short_expiry_months: u32,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            near_expiry_months: 5,
            short_expiry_months: 12,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    /// Prefer a quantity column in the scan sheet over the barcode's AI quantity.
    pub use_scan_qty: bool,
}

// ---------------------------------------------------------------------------
// Output texts
// ---------------------------------------------------------------------------

/// Detail texts attached to result rows.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MessageConfig {
    pub matched: String,
    pub batch: String,
    pub material: String,
    pub variance: String,
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            matched: "Serial verified".into(),
            batch: "Batch verified, serial differs".into(),
            material: "Material only, batch differs".into(),
            variance: "Not found in system".into(),
        }
    }
}

/// Storage location assignment for result rows.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SlocConfig {
    /// Assign `good` to GOOD STOCK scans and `damage` to everything else.
    /// When off, rows carry the matched record's own storage location.
    pub auto: bool,
    pub good: String,
    pub damage: String,
}

impl Default for SlocConfig {
    fn default() -> Self {
        Self {
            auto: true,
            good: "RT01".into(),
            damage: "DMG1".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        for (field, code) in [
            ("ai.material", &self.ai.material),
            ("ai.batch", &self.ai.batch),
            ("ai.serial", &self.ai.serial),
        ] {
            if code.is_empty() || !code.chars().all(|c| c.is_ascii_digit()) {
                return Err(ReconError::ConfigValidation(format!(
                    "{field} must be a numeric AI code, got '{code}'"
                )));
            }
        }

        if self.expiry.near_expiry_months > self.expiry.short_expiry_months {
            return Err(ReconError::ConfigValidation(format!(
                "expiry.near_expiry_months ({}) exceeds expiry.short_expiry_months ({})",
                self.expiry.near_expiry_months, self.expiry.short_expiry_months
            )));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
