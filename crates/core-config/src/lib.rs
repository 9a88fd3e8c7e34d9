//! Configuration loading and parsing.
//!
//! Reads `vintage.toml` (or an override path provided by the binary). The
//! `[input]` table tunes the input engine; `[[mappings]]` entries are user
//! key mappings installed at session start. Mapping notation is not checked
//! here: the session validates every entry when it is built so errors can
//! name the offending mapping.
//!
//! Unknown fields are ignored to allow forward evolution. A file that fails to
//! parse yields the defaults and a WARN record under the `config` target.

use anyhow::{Context, Result};
use core_events::Mode;
use serde::Deserialize;
use std::{fs, io, path::PathBuf};
use tracing::{info, warn};

pub const CONFIG_FILE_NAME: &str = "vintage.toml";

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct InputConfig {
    /// Flush a held user-mapping prefix after `timeoutlen` (Vim default: enabled).
    #[serde(default = "InputConfig::default_timeout")]
    pub timeout: bool,
    #[serde(default = "InputConfig::default_timeoutlen")]
    pub timeoutlen: u32,
    #[serde(default = "InputConfig::default_max_mapping_depth")]
    pub max_mapping_depth: u32,
    #[serde(default = "InputConfig::default_max_macro_depth")]
    pub max_macro_depth: u32,
    /// Install the built-in remaps (`D`, `C`, `Y`, `S`, `s`, `x`, `X`).
    #[serde(default = "InputConfig::default_mappings")]
    pub default_mappings: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            timeout: Self::default_timeout(),
            timeoutlen: Self::default_timeoutlen(),
            max_mapping_depth: Self::default_max_mapping_depth(),
            max_macro_depth: Self::default_max_macro_depth(),
            default_mappings: Self::default_mappings(),
        }
    }
}

impl InputConfig {
    const fn default_timeout() -> bool {
        true
    }
    const fn default_timeoutlen() -> u32 {
        1000
    }
    const fn default_max_mapping_depth() -> u32 {
        100
    }
    const fn default_max_macro_depth() -> u32 {
        20
    }
    const fn default_mappings() -> bool {
        true
    }
}

/// One `[[mappings]]` entry.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct MappingConfig {
    #[serde(default)]
    pub mode: Mode,
    pub lhs: String,
    pub rhs: String,
    #[serde(default)]
    pub recursive: bool,
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub mappings: Vec<MappingConfig>,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>,
    pub path: Option<PathBuf>,
    pub file: ConfigFile,
}

/// Best-effort config path following platform conventions (XDG / AppData Roaming).
pub fn discover() -> PathBuf {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("vintage").join(CONFIG_FILE_NAME);
    }
    PathBuf::from(CONFIG_FILE_NAME)
}

/// Load configuration from `path` (or the discovered location).
///
/// A missing file is not an error. Any other read failure is.
pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!(target: "config", path = %path.display(), "config_absent_using_defaults");
            return Ok(Config::default());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("reading config {}", path.display()));
        }
    };
    match toml::from_str::<ConfigFile>(&content) {
        Ok(file) => {
            info!(
                target: "config",
                path = %path.display(),
                mappings = file.mappings.len(),
                "config_loaded"
            );
            Ok(Config {
                raw: Some(content),
                path: Some(path),
                file,
            })
        }
        Err(e) => {
            warn!(
                target: "config",
                path = %path.display(),
                error = %e,
                "config_parse_failed_using_defaults"
            );
            Ok(Config::default())
        }
    }
}

impl Config {
    pub fn input(&self) -> &InputConfig {
        &self.file.input
    }

    pub fn mappings(&self) -> &[MappingConfig] {
        &self.file.mappings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex, MutexGuard};
    use tracing::Level;
    use tracing::subscriber::with_default;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone)]
    struct BufferWriter {
        inner: Arc<Mutex<Vec<u8>>>,
    }

    impl BufferWriter {
        fn new() -> (Self, Arc<Mutex<Vec<u8>>>) {
            let buf = Arc::new(Mutex::new(Vec::new()));
            (Self { inner: buf.clone() }, buf)
        }
    }

    struct LockedWriter<'a> {
        guard: MutexGuard<'a, Vec<u8>>,
    }

    impl<'a> Write for LockedWriter<'a> {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.guard.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for BufferWriter {
        type Writer = LockedWriter<'a>;

        fn make_writer(&'a self) -> Self::Writer {
            LockedWriter {
                guard: self.inner.lock().expect("log buffer poisoned"),
            }
        }
    }

    fn write_config(text: &str) -> tempfile::NamedTempFile {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), text).unwrap();
        tmp
    }

    #[test]
    fn default_config_when_missing_file() {
        let cfg = load_from(Some(PathBuf::from("__nonexistent_hopefully__.toml"))).unwrap();
        assert_eq!(cfg.file, ConfigFile::default());
        assert!(cfg.raw.is_none());
    }

    #[test]
    fn input_defaults_present() {
        let cfg = load_from(Some(PathBuf::from("__nonexistent_timeouts__.toml"))).unwrap();
        let input = cfg.input();
        assert!(input.timeout);
        assert_eq!(input.timeoutlen, 1000);
        assert_eq!(input.max_mapping_depth, 100);
        assert_eq!(input.max_macro_depth, 20);
        assert!(input.default_mappings);
    }

    #[test]
    fn parses_input_fields() {
        let tmp = write_config(
            "[input]\ntimeout = false\ntimeoutlen = 250\nmax_mapping_depth = 7\ndefault_mappings = false\n",
        );
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert!(!cfg.input().timeout);
        assert_eq!(cfg.input().timeoutlen, 250);
        assert_eq!(cfg.input().max_mapping_depth, 7);
        assert_eq!(cfg.input().max_macro_depth, 20);
        assert!(!cfg.input().default_mappings);
        assert_eq!(cfg.path.as_deref(), Some(tmp.path()));
    }

    #[test]
    fn parses_mapping_entries() {
        let tmp = write_config(
            r#"
[[mappings]]
mode = "insert"
lhs = "jk"
rhs = "<esc>"

[[mappings]]
lhs = "<leader>w"
rhs = ":w<cr>"
recursive = true
"#,
        );
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        let maps = cfg.mappings();
        assert_eq!(maps.len(), 2);
        assert_eq!(maps[0].mode, Mode::Insert);
        assert_eq!(maps[0].lhs, "jk");
        assert!(!maps[0].recursive);
        assert_eq!(maps[1].mode, Mode::Normal);
        assert!(maps[1].recursive);
    }

    #[test]
    fn malformed_file_warns_and_uses_defaults() {
        let tmp = write_config("[input\ntimeoutlen = ");
        let (writer, buffer) = BufferWriter::new();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::INFO)
            .with_target(true)
            .with_ansi(false)
            .without_time()
            .with_writer(writer)
            .finish();

        let cfg = with_default(subscriber, || load_from(Some(tmp.path().to_path_buf())).unwrap());

        let log_output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(log_output.contains("WARN config:"));
        assert!(log_output.contains("config_parse_failed_using_defaults"));
        assert_eq!(cfg.file, ConfigFile::default());
    }

    #[test]
    fn unknown_mode_is_a_parse_failure() {
        let tmp = write_config("[[mappings]]\nmode = \"sideways\"\nlhs = \"a\"\nrhs = \"b\"\n");
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert!(cfg.mappings().is_empty());
    }
}
