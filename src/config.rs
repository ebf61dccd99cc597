//! Color-scheme configuration.
//!
//! The renderer maps display attributes to ANSI colors through a scheme that
//! can be overridden from a small YAML file:
//!
//! ```yaml
//! matched: green
//! not-matched: red
//! not-visited: yellow
//! not-visitable: cyan
//! ```

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::visualize::Attribute;

/// Default config file looked up in the working directory.
const DEFAULT_CONFIG_FILE: &str = ".patscope.yml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ColorScheme {
    pub matched: String,
    pub not_matched: String,
    pub not_visited: String,
    pub not_visitable: String,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            matched: "green".to_string(),
            not_matched: "red".to_string(),
            not_visited: "yellow".to_string(),
            not_visitable: "cyan".to_string(),
        }
    }
}

impl ColorScheme {
    /// ANSI SGR code for an attribute's configured color.
    pub fn code(&self, attr: Attribute) -> &'static str {
        let name = match attr {
            Attribute::Matched => &self.matched,
            Attribute::Failed => &self.not_matched,
            Attribute::NotVisited => &self.not_visited,
            Attribute::NotVisitable => &self.not_visitable,
        };
        // Validated at load time; default to no color if somehow not.
        ansi_code(name).unwrap_or("39")
    }

    fn validate(&self) -> Result<()> {
        for (key, name) in [
            ("matched", &self.matched),
            ("not-matched", &self.not_matched),
            ("not-visited", &self.not_visited),
            ("not-visitable", &self.not_visitable),
        ] {
            if ansi_code(name).is_none() {
                bail!("unknown color `{name}` for `{key}` (expected one of: {})", COLOR_NAMES.join(", "));
            }
        }
        Ok(())
    }
}

const COLOR_NAMES: &[&str] = &[
    "black", "red", "green", "yellow", "blue", "magenta", "cyan", "white", "default",
    "bright-black", "bright-red", "bright-green", "bright-yellow", "bright-blue",
    "bright-magenta", "bright-cyan", "bright-white",
];

fn ansi_code(name: &str) -> Option<&'static str> {
    match name {
        "black" => Some("30"),
        "red" => Some("31"),
        "green" => Some("32"),
        "yellow" => Some("33"),
        "blue" => Some("34"),
        "magenta" => Some("35"),
        "cyan" => Some("36"),
        "white" => Some("37"),
        "default" => Some("39"),
        "bright-black" => Some("90"),
        "bright-red" => Some("91"),
        "bright-green" => Some("92"),
        "bright-yellow" => Some("93"),
        "bright-blue" => Some("94"),
        "bright-magenta" => Some("95"),
        "bright-cyan" => Some("96"),
        "bright-white" => Some("97"),
        _ => None,
    }
}

/// Load the color scheme from the given path, or look for `.patscope.yml`
/// in the working directory. Missing files yield the default scheme.
pub fn load_scheme(path: Option<&Path>) -> Result<ColorScheme> {
    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => Path::new(DEFAULT_CONFIG_FILE).to_path_buf(),
    };

    if !config_path.exists() {
        return Ok(ColorScheme::default());
    }

    let contents = std::fs::read_to_string(&config_path)
        .with_context(|| format!("failed to read config {}", config_path.display()))?;
    let scheme: ColorScheme = serde_yml::from_str(&contents)
        .with_context(|| format!("failed to parse config {}", config_path.display()))?;
    scheme.validate()?;
    Ok(scheme)
}
