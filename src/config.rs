use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_RENDER_TIMEOUT_SECONDS: u64 = 30;

const CONFIG_DIR_NAME: &str = "vischat";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Effective settings after merging `config.toml`, `.env` and the process
/// environment (environment wins).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub config_path: PathBuf,
    pub config_is_explicit: bool,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub plot_dir: Option<PathBuf>,
    /// Zero disables the limit.
    pub render_timeout_seconds: u64,
    pub startup_file: Option<PathBuf>,
    pub datasets: Vec<DatasetSource>,
    pub theme: ThemeConfig,
}

/// A dataset preloaded at startup under a fixed name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetSource {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThemeConfig {
    #[serde(rename = "name")]
    pub preset: ThemePreset,
    pub styles: HashMap<ThemeToken, StyleOverride>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThemePreset {
    #[default]
    Default,
    Light,
    HighContrast,
}

/// A styled region of REPL output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum ThemeToken {
    UserPrompt,
    AssistantText,
    PlotCaption,
    Notice,
    CodeBlock,
    SystemInfo,
    SystemError,
}

impl ThemeToken {
    pub fn all() -> &'static [ThemeToken] {
        &[
            Self::UserPrompt,
            Self::AssistantText,
            Self::PlotCaption,
            Self::Notice,
            Self::CodeBlock,
            Self::SystemInfo,
            Self::SystemError,
        ]
    }

    fn key(self) -> &'static str {
        match self {
            Self::UserPrompt => "user_prompt",
            Self::AssistantText => "assistant_text",
            Self::PlotCaption => "plot_caption",
            Self::Notice => "notice",
            Self::CodeBlock => "code_block",
            Self::SystemInfo => "system_info",
            Self::SystemError => "system_error",
        }
    }
}

impl FromStr for ThemeToken {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|token| token.key() == value)
            .ok_or_else(|| format!("unknown token '{value}'"))
    }
}

impl TryFrom<String> for ThemeToken {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Per-token override; unset fields keep the preset's value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StyleOverride {
    pub fg: Option<HexColor>,
    pub bg: Option<HexColor>,
    pub modifiers: Option<Vec<ThemeModifier>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct HexColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl FromStr for HexColor {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("invalid hex color '{value}', expected #RRGGBB");
        let digits = value
            .strip_prefix('#')
            .filter(|digits| digits.len() == 6 && digits.bytes().all(|b| b.is_ascii_hexdigit()))
            .ok_or_else(invalid)?;
        let rgb = u32::from_str_radix(digits, 16).map_err(|_| invalid())?;
        let [_, r, g, b] = rgb.to_be_bytes();
        Ok(Self { r, g, b })
    }
}

impl TryFrom<String> for HexColor {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThemeModifier {
    Bold,
    Dim,
    Italic,
    Underlined,
    Reversed,
    CrossedOut,
}

/// On-disk shape of `config.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    openai_api_key: Option<String>,
    openai_model: Option<String>,
    openai_base_url: Option<String>,
    plot_dir: Option<PathBuf>,
    render_timeout_seconds: Option<u64>,
    startup_file: Option<PathBuf>,
    datasets: Vec<DatasetSource>,
    theme: ThemeConfig,
}

impl AppConfig {
    /// An explicit path must exist; the discovered default path may be absent.
    pub fn load_with_path(explicit_path: Option<&Path>) -> Result<Self> {
        let config_is_explicit = explicit_path.is_some();
        let config_path = match explicit_path {
            Some(path) if !path.is_file() => bail!(
                "Failed to load config {}: file does not exist",
                path.display()
            ),
            Some(path) => path.to_path_buf(),
            None => default_config_path()?,
        };

        let file = read_file_config(&config_path)?;
        dotenvy::dotenv().ok();

        let base_dir = config_path.parent().unwrap_or(Path::new(""));
        let datasets = checked_datasets(&file.datasets, base_dir, &config_path)?;

        Ok(Self {
            openai_api_key: setting("OPENAI_API_KEY", file.openai_api_key),
            openai_model: setting("OPENAI_MODEL", file.openai_model)
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            openai_base_url: setting("OPENAI_BASE_URL", file.openai_base_url)
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            plot_dir: file.plot_dir.map(|dir| base_dir.join(dir)),
            render_timeout_seconds: file
                .render_timeout_seconds
                .unwrap_or(DEFAULT_RENDER_TIMEOUT_SECONDS),
            startup_file: file.startup_file.map(|path| base_dir.join(path)),
            datasets,
            theme: file.theme,
            config_path,
            config_is_explicit,
        })
    }
}

/// `$XDG_CONFIG_HOME/vischat/config.toml`, else `~/.config/vischat/config.toml`.
fn default_config_path() -> Result<PathBuf> {
    let xdg = env::var("XDG_CONFIG_HOME").ok();
    let base = match xdg.as_deref().map(str::trim) {
        Some("") => bail!("Failed to resolve config path: XDG_CONFIG_HOME is set but empty"),
        Some(dir) => PathBuf::from(dir),
        None => dirs::home_dir()
            .ok_or_else(|| anyhow!("Failed to resolve config path: HOME directory is unavailable"))?
            .join(".config"),
    };
    Ok(base.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    if !path.is_file() {
        return Ok(FileConfig::default());
    }
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to load config {}", path.display()))?;
    toml::from_str(&text).map_err(|err| anyhow!("Failed to load config {}: {err}", path.display()))
}

/// Names are trimmed and must be unique; relative paths resolve against the
/// config directory.
fn checked_datasets(
    entries: &[DatasetSource],
    base_dir: &Path,
    config_path: &Path,
) -> Result<Vec<DatasetSource>> {
    let mut seen = HashSet::new();
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let name = entry.name.trim();
            let reject = |reason: &str| {
                anyhow!(
                    "Failed to load config {}: datasets[{index}].name: {reason}",
                    config_path.display()
                )
            };
            if name.is_empty() {
                return Err(reject("must not be empty"));
            }
            if !seen.insert(name) {
                return Err(reject(&format!("duplicate dataset name '{name}'")));
            }
            Ok(DatasetSource {
                name: name.to_string(),
                path: base_dir.join(&entry.path),
            })
        })
        .collect()
}

/// First non-blank value of the environment variable, then the file value.
fn setting(env_key: &str, file_value: Option<String>) -> Option<String> {
    [env::var(env_key).ok(), file_value]
        .into_iter()
        .flatten()
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{
        AppConfig, DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL, DEFAULT_RENDER_TIMEOUT_SECONDS,
        DatasetSource, HexColor, ThemeConfig, ThemeModifier, ThemePreset, ThemeToken,
    };
    use serial_test::serial;
    use std::env;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    const VARS: [&str; 4] = [
        "OPENAI_API_KEY",
        "OPENAI_MODEL",
        "OPENAI_BASE_URL",
        "XDG_CONFIG_HOME",
    ];

    /// A fake XDG config home, also used as the working directory so that a
    /// stray `.env` in the repository cannot leak in.
    struct Fixture {
        root: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                root: tempfile::tempdir().expect("tempdir"),
            }
        }

        fn with_config(contents: &str) -> Self {
            let fixture = Self::new();
            let dir = fixture.config_dir();
            fs::create_dir_all(&dir).expect("create config dir");
            fs::write(dir.join("config.toml"), contents).expect("write config");
            fixture
        }

        fn config_dir(&self) -> PathBuf {
            self.root.path().join("vischat")
        }

        fn load(&self, vars: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
            unsafe {
                for key in VARS {
                    env::remove_var(key);
                }
                env::set_var("XDG_CONFIG_HOME", self.root.path());
                for (key, value) in vars {
                    env::set_var(key, value);
                }
            }
            in_dir(self.root.path(), || AppConfig::load_with_path(None))
        }
    }

    fn in_dir<T>(dir: &Path, f: impl FnOnce() -> T) -> T {
        let previous = env::current_dir().expect("current dir");
        env::set_current_dir(dir).expect("enter dir");
        let result = f();
        env::set_current_dir(previous).expect("leave dir");
        result
    }

    #[test]
    #[serial]
    fn missing_file_yields_defaults() {
        let fixture = Fixture::new();
        let cfg = fixture.load(&[]).expect("load config");

        assert_eq!(cfg.openai_api_key, None);
        assert_eq!(cfg.openai_model, DEFAULT_OPENAI_MODEL);
        assert_eq!(cfg.openai_base_url, DEFAULT_OPENAI_BASE_URL);
        assert_eq!(cfg.render_timeout_seconds, DEFAULT_RENDER_TIMEOUT_SECONDS);
        assert_eq!(cfg.plot_dir, None);
        assert!(cfg.datasets.is_empty());
        assert_eq!(cfg.theme, ThemeConfig::default());
        assert!(!cfg.config_is_explicit);
        assert_eq!(cfg.config_path, fixture.config_dir().join("config.toml"));
    }

    #[test]
    #[serial]
    fn environment_beats_file_values() {
        let fixture = Fixture::with_config(
            r#"
openai_api_key = "sk-from-file"
openai_model = "gpt-from-file"
openai_base_url = "https://proxy.internal"
"#,
        );
        let cfg = fixture
            .load(&[("OPENAI_API_KEY", "sk-from-env"), ("OPENAI_MODEL", "gpt-4o")])
            .expect("load config");

        assert_eq!(cfg.openai_api_key.as_deref(), Some("sk-from-env"));
        assert_eq!(cfg.openai_model, "gpt-4o");
        assert_eq!(cfg.openai_base_url, "https://proxy.internal");
    }

    #[test]
    #[serial]
    fn blank_values_fall_through() {
        let fixture = Fixture::with_config("openai_api_key = \"   \"\nopenai_model = \"\"\n");
        let cfg = fixture
            .load(&[("OPENAI_BASE_URL", "  "), ("OPENAI_API_KEY", "")])
            .expect("load config");

        assert_eq!(cfg.openai_api_key, None);
        assert_eq!(cfg.openai_model, DEFAULT_OPENAI_MODEL);
        assert_eq!(cfg.openai_base_url, DEFAULT_OPENAI_BASE_URL);
    }

    #[test]
    #[serial]
    fn dotenv_never_overrides_process_environment() {
        let fixture = Fixture::new();
        fs::write(
            fixture.root.path().join(".env"),
            "OPENAI_API_KEY=sk-dotenv\nOPENAI_MODEL=gpt-dotenv\n",
        )
        .expect("write .env");

        let cfg = fixture
            .load(&[("OPENAI_MODEL", "gpt-process")])
            .expect("load config");
        assert_eq!(cfg.openai_model, "gpt-process");
        assert_eq!(cfg.openai_api_key.as_deref(), Some("sk-dotenv"));
    }

    #[test]
    #[serial]
    fn relative_paths_resolve_against_config_dir() {
        let fixture = Fixture::with_config(
            r#"
plot_dir = "plots"
startup_file = "/opt/vischat/startup.py"
render_timeout_seconds = 0

[[datasets]]
name = " Energy Production "
path = "data/energy.csv"

[[datasets]]
name = "Movies"
path = "/srv/movies.csv"
"#,
        );
        let config_dir = fixture.config_dir();
        let cfg = fixture.load(&[]).expect("load config");

        assert_eq!(cfg.plot_dir, Some(config_dir.join("plots")));
        assert_eq!(
            cfg.startup_file,
            Some(PathBuf::from("/opt/vischat/startup.py"))
        );
        assert_eq!(cfg.render_timeout_seconds, 0);
        assert_eq!(
            cfg.datasets,
            vec![
                DatasetSource {
                    name: "Energy Production".to_string(),
                    path: config_dir.join("data/energy.csv"),
                },
                DatasetSource {
                    name: "Movies".to_string(),
                    path: PathBuf::from("/srv/movies.csv"),
                },
            ]
        );
    }

    #[test]
    #[serial]
    fn dataset_names_must_be_present_and_unique() {
        let duplicate = Fixture::with_config(
            "[[datasets]]\nname = \"Cars\"\npath = \"a.csv\"\n\n[[datasets]]\nname = \"Cars\"\npath = \"b.csv\"\n",
        );
        let err = duplicate.load(&[]).expect_err("duplicate names");
        assert!(
            err.to_string()
                .contains("datasets[1].name: duplicate dataset name 'Cars'")
        );

        let blank = Fixture::with_config("[[datasets]]\nname = \" \"\npath = \"a.csv\"\n");
        let err = blank.load(&[]).expect_err("blank name");
        assert!(err.to_string().contains("datasets[0].name: must not be empty"));
    }

    #[test]
    #[serial]
    fn explicit_path_must_exist_and_is_flagged() {
        let fixture = Fixture::new();
        let missing = fixture.root.path().join("nope.toml");
        let err = AppConfig::load_with_path(Some(&missing)).expect_err("missing explicit file");
        assert!(err.to_string().contains("file does not exist"));

        let custom = fixture.root.path().join("custom.toml");
        fs::write(&custom, "openai_model = \"custom\"\n").expect("write config");
        let cfg = in_dir(fixture.root.path(), || {
            AppConfig::load_with_path(Some(&custom)).expect("load config")
        });
        assert!(cfg.config_is_explicit);
        assert_eq!(cfg.config_path, custom);
    }

    #[test]
    #[serial]
    fn blank_xdg_config_home_is_an_error() {
        let fixture = Fixture::new();
        let err = fixture
            .load(&[("XDG_CONFIG_HOME", "   ")])
            .expect_err("blank xdg");
        assert!(
            err.to_string()
                .contains("Failed to resolve config path: XDG_CONFIG_HOME is set but empty")
        );
    }

    #[test]
    #[serial]
    fn malformed_files_are_rejected_with_reason() {
        let cases = [
            ("unknown_key = 1", "unknown field"),
            ("[theme.styles.python_prompt]\nfg = \"#ffffff\"\n", "unknown token 'python_prompt'"),
            ("[theme.styles.notice]\nfg = \"red\"\n", "invalid hex color 'red'"),
            ("[theme.styles.user_prompt]\nmodifiers = [\"sparkly\"]\n", "sparkly"),
            ("[theme]\nname = \"neon\"\n", "neon"),
        ];
        for (contents, reason) in cases {
            let err = Fixture::with_config(contents)
                .load(&[])
                .expect_err("malformed config");
            let message = err.to_string();
            assert!(message.contains("Failed to load config"), "{message}");
            assert!(message.contains(reason), "{message}");
        }
    }

    #[test]
    #[serial]
    fn theme_section_parses_into_typed_overrides() {
        let fixture = Fixture::with_config(
            r##"
[theme]
name = "high-contrast"

[theme.styles.plot_caption]
fg = "#A0B1C2"
modifiers = ["italic", "crossed_out"]
"##,
        );
        let cfg = fixture.load(&[]).expect("load config");

        assert_eq!(cfg.theme.preset, ThemePreset::HighContrast);
        let style = &cfg.theme.styles[&ThemeToken::PlotCaption];
        assert_eq!(
            style.fg,
            Some(HexColor {
                r: 0xA0,
                g: 0xB1,
                b: 0xC2
            })
        );
        assert_eq!(style.bg, None);
        assert_eq!(
            style.modifiers,
            Some(vec![ThemeModifier::Italic, ThemeModifier::CrossedOut])
        );
    }

    #[test]
    fn theme_tokens_parse_from_their_keys() {
        for token in ThemeToken::all() {
            assert_eq!(token.key().parse::<ThemeToken>(), Ok(*token));
        }
        assert!("python_prompt".parse::<ThemeToken>().is_err());
    }

    #[test]
    fn hex_color_rejects_malformed_values() {
        for value in ["", "#fff", "ffffff", "#gggggg", "#ffffff0", "#ffé12", "#+fffff"] {
            assert!(value.parse::<HexColor>().is_err(), "{value} should fail");
        }
        assert_eq!(
            "#0a0B0c".parse::<HexColor>(),
            Ok(HexColor {
                r: 10,
                g: 11,
                b: 12
            })
        );
    }
}
