//! JSON configuration of the scraper commands.
//!
//! The file holds one section per command:
//!
//! ```json
//! {
//!   "libor": {
//!     "url": "https://www.bcra.gob.ar/PublicacionesEstadisticas/libor.asp",
//!     "rates": { "30": "libor_30_dias", "60": "libor_60_dias" }
//!   },
//!   "tce": {
//!     "url": "https://www.bcra.gob.ar/PublicacionesEstadisticas/Tipo_de_cambio_minorista.asp",
//!     "coins": { "dolar": "Dolar Estadounidense" },
//!     "entities": { "bna": "NACION" },
//!     "tries": 3,
//!     "timeout": 30
//!   }
//! }
//! ```
//!
//! Map order is significant: it is the output column order.

use std::{path::Path, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_json::{Map, Value};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

use crate::SourceError;

/// The scraper commands.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, EnumIter,
)]
#[strum(serialize_all = "kebab-case")]
pub enum DriverKind {
    /// Libor rates by tenor.
    Libor,
    /// Pass and local exchange rates per coin.
    ExchangeRates,
    /// Local currency payment system (SML) rates.
    Sml,
    /// Retail exchange rates by banking entity (TCE).
    Tce,
}

impl DriverKind {
    /// Default location of the command's intermediate panel.
    #[must_use]
    pub const fn default_panel_file(self) -> &'static str {
        match self {
            Self::Libor => "libor-intermediate-panel.csv",
            Self::ExchangeRates => "exchange-rates-intermediate-panel.csv",
            Self::Sml => "sml-intermediate-panel.csv",
            Self::Tce => "tce-intermediate-panel.csv",
        }
    }

    /// Name of the instrument map in the command's section.
    const fn instruments_key(self) -> &'static str {
        match self {
            Self::Libor => "rates",
            Self::ExchangeRates | Self::Sml | Self::Tce => "coins",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawSection {
    url: Option<String>,
    rates: Option<Map<String, Value>>,
    coins: Option<Map<String, Value>>,
    entities: Option<Map<String, Value>>,
    tries: Option<u32>,
    timeout: Option<u64>,
    intermediate_panel_path: Option<PathBuf>,
}

/// A validated command section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// The command this section configures.
    pub kind: DriverKind,
    /// Page URL.
    pub url: String,
    /// `rates` (Libor) or `coins` entries as `(key, label)`, in file order.
    pub instruments: Vec<(String, String)>,
    /// `entities` entries as `(key, label)`, in file order. TCE only.
    pub entities: Vec<(String, String)>,
    /// Attempts per page.
    pub tries: u32,
    /// Per-request timeout.
    pub timeout: Option<Duration>,
    /// Location of the intermediate panel.
    pub intermediate_panel_path: PathBuf,
}

impl DriverConfig {
    /// Reads the section for `kind` from the JSON file at `path`.
    ///
    /// # Errors
    ///
    /// * [`SourceError::Io`] if the file cannot be read
    /// * [`SourceError::InvalidConfiguration`] if the file is not valid JSON
    ///   or the section fails validation
    pub fn load(path: &Path, kind: DriverKind) -> Result<Self, SourceError> {
        let text = std::fs::read_to_string(path)?;
        log::debug!("Loaded configuration from {}", path.display());
        Self::from_json(&text, kind)
    }

    /// Parses and validates the section for `kind` from JSON text.
    ///
    /// # Errors
    ///
    /// * [`SourceError::InvalidConfiguration`] if the text is not valid JSON,
    ///   has no section for `kind`, or the section fails validation
    pub fn from_json(text: &str, kind: DriverKind) -> Result<Self, SourceError> {
        let mut root: Map<String, Value> = serde_json::from_str(text)
            .map_err(|_| invalid("The configuration file format is invalid"))?;
        let name: &str = kind.as_ref();
        let section = root
            .remove(name)
            .ok_or_else(|| invalid(format!("The configuration has no '{kind}' section")))?;
        let raw: RawSection = serde_json::from_value(section)
            .map_err(|e| invalid(format!("The '{kind}' section is invalid: {e}")))?;

        Self::validate(raw, kind)
    }

    fn validate(raw: RawSection, kind: DriverKind) -> Result<Self, SourceError> {
        let url = raw.url.ok_or_else(|| invalid("The url key does not exist"))?;
        if url.trim().is_empty() {
            return Err(invalid("The url is not valid"));
        }

        let key = kind.instruments_key();
        let instruments = match kind {
            DriverKind::Libor => raw.rates,
            DriverKind::ExchangeRates | DriverKind::Sml | DriverKind::Tce => raw.coins,
        };
        let instruments = required_map(instruments, key)?;

        let entities = if kind == DriverKind::Tce {
            required_map(raw.entities, "entities")?
        } else {
            Vec::new()
        };

        let tries = raw.tries.unwrap_or(1);
        if tries == 0 {
            return Err(invalid("The tries value must be at least 1"));
        }

        Ok(Self {
            kind,
            url,
            instruments,
            entities,
            tries,
            timeout: raw.timeout.map(Duration::from_secs),
            intermediate_panel_path: raw
                .intermediate_panel_path
                .unwrap_or_else(|| PathBuf::from(kind.default_panel_file())),
        })
    }

    /// Instrument keys in file order.
    pub fn instrument_keys(&self) -> impl Iterator<Item = &str> {
        self.instruments.iter().map(|(key, _)| key.as_str())
    }
}

fn required_map(
    map: Option<Map<String, Value>>,
    key: &str,
) -> Result<Vec<(String, String)>, SourceError> {
    let map = map.ok_or_else(|| invalid(format!("The {key} key does not exist")))?;
    if map.is_empty() {
        return Err(invalid(format!("There are no values for {key}")));
    }
    map.into_iter()
        .map(|(k, v)| match v {
            Value::String(label) => Ok((k, label)),
            other => Err(invalid(format!(
                "The {key} entry '{k}' must be a string, found {other}"
            ))),
        })
        .collect()
}

fn invalid(message: impl Into<String>) -> SourceError {
    SourceError::InvalidConfiguration {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr as _;

    use strum::IntoEnumIterator as _;

    use super::*;

    fn message(result: Result<DriverConfig, SourceError>) -> String {
        match result {
            Err(SourceError::InvalidConfiguration { message }) => message,
            other => panic!("expected a configuration error, got {other:?}"),
        }
    }

    #[test]
    fn command_names_are_kebab_case() {
        let names: Vec<String> = DriverKind::iter().map(|k| k.to_string()).collect();
        assert_eq!(names, vec!["libor", "exchange-rates", "sml", "tce"]);
        assert_eq!(DriverKind::from_str("exchange-rates").unwrap(), DriverKind::ExchangeRates);
    }

    #[test]
    fn reads_a_libor_section_in_file_order() {
        let config = DriverConfig::from_json(
            r#"{"libor": {"url": "http://bcra", "rates": {"360": "libor_360_dias", "30": "libor_30_dias"}}}"#,
            DriverKind::Libor,
        )
        .unwrap();

        assert_eq!(config.url, "http://bcra");
        assert_eq!(config.instrument_keys().collect::<Vec<_>>(), vec!["360", "30"]);
        assert_eq!(config.tries, 1);
        assert_eq!(config.timeout, None);
        assert_eq!(
            config.intermediate_panel_path,
            PathBuf::from("libor-intermediate-panel.csv")
        );
    }

    #[test]
    fn reads_optional_keys() {
        let config = DriverConfig::from_json(
            r#"{"tce": {"url": "http://bcra", "coins": {"dolar": "Dolar"}, "entities": {"bna": "NACION"},
                "tries": 3, "timeout": 20, "intermediate_panel_path": "/tmp/tce.csv"}}"#,
            DriverKind::Tce,
        )
        .unwrap();

        assert_eq!(config.tries, 3);
        assert_eq!(config.timeout, Some(Duration::from_secs(20)));
        assert_eq!(config.entities, vec![("bna".to_string(), "NACION".to_string())]);
        assert_eq!(config.intermediate_panel_path, PathBuf::from("/tmp/tce.csv"));
    }

    #[test]
    fn validation_messages() {
        let cases = [
            ("not json", DriverKind::Sml, "The configuration file format is invalid"),
            (r#"{"sml": {}}"#, DriverKind::Libor, "The configuration has no 'libor' section"),
            (r#"{"sml": {"coins": {"real": "Real"}}}"#, DriverKind::Sml, "The url key does not exist"),
            (r#"{"sml": {"url": "", "coins": {"real": "Real"}}}"#, DriverKind::Sml, "The url is not valid"),
            (r#"{"libor": {"url": "http://bcra"}}"#, DriverKind::Libor, "The rates key does not exist"),
            (r#"{"libor": {"url": "http://bcra", "rates": {}}}"#, DriverKind::Libor, "There are no values for rates"),
            (r#"{"exchange-rates": {"url": "http://bcra"}}"#, DriverKind::ExchangeRates, "The coins key does not exist"),
            (r#"{"sml": {"url": "http://bcra", "coins": {}}}"#, DriverKind::Sml, "There are no values for coins"),
            (r#"{"tce": {"url": "http://bcra", "coins": {"dolar": "Dolar"}}}"#, DriverKind::Tce, "The entities key does not exist"),
            (r#"{"tce": {"url": "http://bcra", "coins": {"dolar": "Dolar"}, "entities": {}}}"#, DriverKind::Tce, "There are no values for entities"),
            (r#"{"sml": {"url": "http://bcra", "coins": {"real": "Real"}, "tries": 0}}"#, DriverKind::Sml, "The tries value must be at least 1"),
        ];

        for (json, kind, expected) in cases {
            assert_eq!(message(DriverConfig::from_json(json, kind)), expected, "{json}");
        }
    }

    #[test]
    fn non_string_labels_are_rejected() {
        let result = DriverConfig::from_json(
            r#"{"sml": {"url": "http://bcra", "coins": {"real": 1}}}"#,
            DriverKind::Sml,
        );
        assert!(message(result).contains("'real' must be a string"));
    }
}
