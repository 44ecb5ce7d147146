use serde::Deserialize;

/// Top-level spidi configuration.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct SpidiConfig {
    /// SPI fitting settings.
    #[serde(default)]
    pub spi: SpiToml,

    /// Field-file output settings.
    #[serde(default)]
    pub io: IoToml,

    /// Bias-correction settings.
    #[serde(default)]
    pub bias: BiasToml,

    /// Forecast field-file conventions.
    #[serde(default)]
    pub forecast: ForecastToml,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpiToml {
    #[serde(default = "default_min_precip")]
    pub min_precip: f64,
    #[serde(default = "default_zero_max")]
    pub zero_max: f64,
    #[serde(default = "default_max_shape")]
    pub max_shape: f64,
    #[serde(default = "default_prob_floor")]
    pub prob_floor: f64,
    #[serde(default = "default_prob_ceil")]
    pub prob_ceil: f64,
    #[serde(default = "default_max_chunk")]
    pub max_chunk: usize,
}

impl Default for SpiToml {
    fn default() -> Self {
        Self {
            min_precip: default_min_precip(),
            zero_max: default_zero_max(),
            max_shape: default_max_shape(),
            prob_floor: default_prob_floor(),
            prob_ceil: default_prob_ceil(),
            max_chunk: default_max_chunk(),
        }
    }
}

fn default_min_precip() -> f64 {
    0.03
}
fn default_zero_max() -> f64 {
    1.0 / 3.0
}
fn default_max_shape() -> f64 {
    1000.0
}
fn default_prob_floor() -> f64 {
    0.001
}
fn default_prob_ceil() -> f64 {
    0.999
}
fn default_max_chunk() -> usize {
    50_000
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IoToml {
    #[serde(default = "default_compression")]
    pub compression: String,
    #[serde(default = "default_missing_value")]
    pub missing_value: f64,
    #[serde(default = "default_true")]
    pub bitmap: bool,
    #[serde(default = "default_row_group_size")]
    pub row_group_size: usize,
}

impl Default for IoToml {
    fn default() -> Self {
        Self {
            compression: default_compression(),
            missing_value: default_missing_value(),
            bitmap: true,
            row_group_size: default_row_group_size(),
        }
    }
}

fn default_compression() -> String {
    "snappy".to_string()
}
fn default_missing_value() -> f64 {
    -99.0
}
fn default_true() -> bool {
    true
}
fn default_row_group_size() -> usize {
    256
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BiasToml {
    #[serde(default = "default_bias_floor")]
    pub floor: f64,
    #[serde(default = "default_min_factor")]
    pub min_factor: f64,
    #[serde(default = "default_max_factor")]
    pub max_factor: f64,
    /// Metadata key of the lead in hindcast and ensemble files.
    #[serde(default = "default_lead_key")]
    pub lead_key: String,
}

impl Default for BiasToml {
    fn default() -> Self {
        Self {
            floor: default_bias_floor(),
            min_factor: default_min_factor(),
            max_factor: default_max_factor(),
            lead_key: default_lead_key(),
        }
    }
}

fn default_bias_floor() -> f64 {
    0.03
}
fn default_min_factor() -> f64 {
    0.2
}
fn default_max_factor() -> f64 {
    5.0
}
fn default_lead_key() -> String {
    "forecastMonth".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForecastToml {
    /// Forecast system name used in parameter and output file names.
    #[serde(default = "default_ftype")]
    pub ftype: String,
    /// Ensemble product (`ENS` members or `ENM` ensemble mean).
    #[serde(default = "default_fortype")]
    pub fortype: String,
    /// Metadata key of the 1-based lead.
    #[serde(default = "default_lead_key")]
    pub lead_key: String,
    /// Metadata key of the ensemble member.
    #[serde(default = "default_member_key")]
    pub member_key: String,
}

impl Default for ForecastToml {
    fn default() -> Self {
        Self {
            ftype: default_ftype(),
            fortype: default_fortype(),
            lead_key: default_lead_key(),
            member_key: default_member_key(),
        }
    }
}

fn default_ftype() -> String {
    "SEAS5".to_string()
}
fn default_fortype() -> String {
    "ENS".to_string()
}
fn default_member_key() -> String {
    "number".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg: SpidiConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.spi.max_chunk, 50_000);
        assert_eq!(cfg.io.compression, "snappy");
        assert!(cfg.io.bitmap);
        assert_eq!(cfg.bias.lead_key, "forecastMonth");
        assert_eq!(cfg.forecast.fortype, "ENS");
        assert_eq!(cfg.forecast.member_key, "number");
    }

    #[test]
    fn forecast_section_overrides_keys() {
        let cfg: SpidiConfig = toml::from_str(
            r#"
            [forecast]
            fortype = "ENM"
            lead_key = "lead"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.forecast.fortype, "ENM");
        assert_eq!(cfg.forecast.lead_key, "lead");
        assert_eq!(cfg.forecast.ftype, "SEAS5");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg: SpidiConfig = toml::from_str(
            r#"
            [spi]
            zero_max = 0.5

            [io]
            compression = "zstd"
            "#,
        )
        .unwrap();
        assert!((cfg.spi.zero_max - 0.5).abs() < f64::EPSILON);
        assert!((cfg.spi.min_precip - 0.03).abs() < f64::EPSILON);
        assert_eq!(cfg.io.compression, "zstd");
        assert_eq!(cfg.io.row_group_size, 256);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(toml::from_str::<SpidiConfig>("[spi]\nwindow = 3\n").is_err());
        assert!(toml::from_str::<SpidiConfig>("[output]\n").is_err());
    }
}
