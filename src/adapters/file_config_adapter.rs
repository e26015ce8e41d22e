//! INI file configuration adapter.

use crate::domain::error::SiglabError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SiglabError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config.load(path).map_err(|reason| SiglabError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, SiglabError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| SiglabError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_config() {
        let content = r#"
[gateway]
data_dir = /var/lib/siglab/data

[backtest]
instrument = BTC
date = 2024-06-03
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("gateway", "data_dir"),
            Some("/var/lib/siglab/data".to_string())
        );
        assert_eq!(
            adapter.get_string("backtest", "instrument"),
            Some("BTC".to_string())
        );
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter = FileConfigAdapter::from_string("[backtest]\ninstrument = BTC\n").unwrap();
        assert_eq!(adapter.get_string("backtest", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn get_int_returns_value_or_default() {
        let adapter = FileConfigAdapter::from_string("[server]\nport = 9000\nbad = abc\n").unwrap();
        assert_eq!(adapter.get_int("server", "port", 0), 9000);
        assert_eq!(adapter.get_int("server", "missing", 42), 42);
        assert_eq!(adapter.get_int("server", "bad", 42), 42);
    }

    #[test]
    fn get_bool_parses_common_spellings() {
        let adapter =
            FileConfigAdapter::from_string("[predict]\na = true\nb = yes\nc = 0\nd = Off\ne = maybe\n").unwrap();
        assert!(adapter.get_bool("predict", "a", false));
        assert!(adapter.get_bool("predict", "b", false));
        assert!(!adapter.get_bool("predict", "c", true));
        assert!(!adapter.get_bool("predict", "d", true));
        assert!(adapter.get_bool("predict", "e", true));
        assert!(!adapter.get_bool("predict", "missing", false));
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[predict]\ndata_kind = live\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(adapter.get_string("predict", "data_kind"), Some("live".to_string()));
    }

    #[test]
    fn from_file_missing_is_config_parse_error() {
        let err = FileConfigAdapter::from_file("/nonexistent/path/config.ini").err().unwrap();
        assert!(matches!(err, SiglabError::ConfigParse { ref file, .. } if file.contains("config.ini")));
    }
}
