use serde::Deserialize;
use std::collections::HashMap;
use std::error::Error;
use std::fs;
use std::path::Path;

/// Contents of `Lambda.toml`.
#[derive(Deserialize, Debug, Default)]
pub struct Config {
    /// Function ARNs by short key, e.g. `dev = "arn:aws:lambda:..."`
    #[serde(default)]
    pub arns: HashMap<String, String>,
}

impl Config {
    pub fn parse(contents: &str) -> Result<Config, Box<dyn Error>> {
        Ok(toml::from_str(contents)?)
    }

    pub fn load(path: &Path) -> Result<Config, Box<dyn Error>> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Can't read {}: {}", path.display(), e))?;
        Config::parse(&contents).map_err(|e| format!("Invalid {}: {}", path.display(), e).into())
    }
}
