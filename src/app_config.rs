use crate::jobs::{DEFAULT_VISIBILITY, TEST_DEFINITIONS};
use config::{Config, ConfigError};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    jobs: Jobs,
}

impl AppConfig {
    /// Built-in defaults, then an optional `tuxlava.{toml,yaml,json}` file, then `TUXLAVA__*` variables.
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("jobs.test_definitions", TEST_DEFINITIONS)?
            .set_default("jobs.default_visibility", DEFAULT_VISIBILITY)?
            .add_source(config::File::with_name("tuxlava").required(false))
            .add_source(config::Environment::with_prefix("TUXLAVA").separator("__"))
            .build()?
            .try_deserialize()
    }

    pub fn jobs(&self) -> &Jobs {
        &self.jobs
    }
}

#[derive(Debug, Deserialize)]
pub struct Jobs {
    test_definitions: String,
    default_visibility: String,
}

impl Jobs {
    pub fn test_definitions(&self) -> &str {
        &self.test_definitions
    }

    pub fn default_visibility(&self) -> &str {
        &self.default_visibility
    }
}

#[cfg(test)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

#[cfg(test)]
impl AppConfigBuilder {
    pub fn new() -> Self {
        AppConfigBuilder {
            config: AppConfig {
                jobs: Jobs {
                    test_definitions: TEST_DEFINITIONS.to_string(),
                    default_visibility: DEFAULT_VISIBILITY.to_string(),
                },
            },
        }
    }

    pub fn test_definitions(mut self, url: &str) -> Self {
        self.config.jobs.test_definitions = url.to_string();
        self
    }

    pub fn default_visibility(mut self, visibility: &str) -> Self {
        self.config.jobs.default_visibility = visibility.to_string();
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::Job;
    use crate::request::Request;
    use pretty_assertions::assert_eq;

    #[test]
    fn loads_the_built_in_defaults() {
        let config = AppConfig::load().unwrap();
        assert_eq!(config.jobs().test_definitions(), TEST_DEFINITIONS);
        assert_eq!(config.jobs().default_visibility(), "public");
    }

    #[test]
    fn configures_jobs() {
        let config = AppConfigBuilder::new()
            .test_definitions("https://example.com/defs.tar.zst")
            .default_visibility("personal")
            .build();

        let request = Request {
            tests: vec!["ltp-smoke".to_string()],
            ..Request::new("qemu-arm64")
        };
        let output = Job::new(request)
            .with_test_definitions(config.jobs().test_definitions())
            .with_visibility(config.jobs().default_visibility())
            .render()
            .unwrap();

        assert!(output.contains("visibility: 'personal'"), "{}", output);
        assert!(output.contains("repository: https://example.com/defs.tar.zst"), "{}", output);
    }
}
