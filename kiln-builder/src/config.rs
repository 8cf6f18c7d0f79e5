//! Builder configuration
//!
//! Defines where builds happen (temp root, plugin directory), how long a
//! compile may take, and which commands each toolchain runs.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Temp folder where working directories live during a build
pub const TMP_FOLDER: &str = "tmp";

/// Folder where compiled plugins are published
pub const PLUGIN_FOLDER: &str = "plugins";

/// Ceiling for the execute stage: 60 minutes
pub const DEFAULT_BUILD_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Placeholder expanded to the absolute path of the expected binary
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Placeholder expanded to the pipeline name
pub const NAME_PLACEHOLDER: &str = "{name}";

/// One toolchain invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandStep {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandStep {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns a copy with `{output}` and `{name}` substituted in every argument
    pub fn expand(&self, output: &Path, name: &str) -> CommandStep {
        let output = output.to_string_lossy();
        CommandStep {
            program: self.program.clone(),
            args: self
                .args
                .iter()
                .map(|arg| {
                    arg.replace(OUTPUT_PLACEHOLDER, &output)
                        .replace(NAME_PLACEHOLDER, name)
                })
                .collect(),
        }
    }
}

impl std::fmt::Display for CommandStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Commands and environment for one toolchain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolchainConfig {
    /// Steps run in order inside the workspace; all share one deadline
    pub steps: Vec<CommandStep>,

    /// Extra environment variables for every step
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl ToolchainConfig {
    pub fn new(steps: Vec<CommandStep>) -> Self {
        Self {
            steps,
            env: HashMap::new(),
        }
    }

    /// Default Go toolchain: `<go> build -o {output}`
    pub fn golang(go_binary: impl Into<String>) -> Self {
        Self::new(vec![CommandStep::new(
            go_binary,
            ["build", "-o", OUTPUT_PLACEHOLDER],
        )])
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Builder configuration
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Root directory for temp and plugin folders
    pub home: PathBuf,

    /// Where per-build working directories are created
    pub tmp_root: PathBuf,

    /// Shared directory receiving compiled artifacts
    pub plugin_dir: PathBuf,

    /// Maximum time the execute stage may take
    pub build_timeout: Duration,

    /// Toolchain used for golang pipelines
    pub golang: ToolchainConfig,
}

impl BuildConfig {
    /// Creates a configuration rooted at `home` with defaults
    pub fn new(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            tmp_root: home.join(TMP_FOLDER),
            plugin_dir: home.join(PLUGIN_FOLDER),
            home,
            build_timeout: DEFAULT_BUILD_TIMEOUT,
            golang: ToolchainConfig::golang("go"),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - KILN_HOME (optional, default: ".")
    /// - KILN_TMP_DIR (optional, default: "$KILN_HOME/tmp")
    /// - KILN_PLUGIN_DIR (optional, default: "$KILN_HOME/plugins")
    /// - KILN_BUILD_TIMEOUT (optional, seconds, default: 3600)
    /// - KILN_GO_BINARY (optional, default: "go")
    ///
    /// The result is validated before it is returned.
    pub fn from_env() -> anyhow::Result<Self> {
        let home = std::env::var("KILN_HOME").unwrap_or_else(|_| ".".to_string());
        let mut config = Self::new(home);

        if let Ok(dir) = std::env::var("KILN_TMP_DIR") {
            config.tmp_root = PathBuf::from(dir);
        }

        if let Ok(dir) = std::env::var("KILN_PLUGIN_DIR") {
            config.plugin_dir = PathBuf::from(dir);
        }

        if let Ok(raw) = std::env::var("KILN_BUILD_TIMEOUT") {
            let secs = raw
                .parse::<u64>()
                .map_err(|e| anyhow::anyhow!("KILN_BUILD_TIMEOUT must be seconds: {}", e))?;
            config.build_timeout = Duration::from_secs(secs);
        }

        if let Ok(go) = std::env::var("KILN_GO_BINARY") {
            config.golang = ToolchainConfig::golang(go);
        }

        config.validate()?;
        Ok(config)
    }

    /// Overrides the execute stage ceiling
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.build_timeout = timeout;
        self
    }

    /// Overrides the golang toolchain
    pub fn with_golang(mut self, toolchain: ToolchainConfig) -> Self {
        self.golang = toolchain;
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.tmp_root.as_os_str().is_empty() {
            anyhow::bail!("tmp_root cannot be empty");
        }

        if self.plugin_dir.as_os_str().is_empty() {
            anyhow::bail!("plugin_dir cannot be empty");
        }

        if self.build_timeout.is_zero() {
            anyhow::bail!("build_timeout must be greater than 0");
        }

        if self.golang.steps.is_empty() {
            anyhow::bail!("golang toolchain needs at least one command step");
        }

        if self.golang.steps.iter().any(|s| s.program.trim().is_empty()) {
            anyhow::bail!("toolchain command program cannot be empty");
        }

        Ok(())
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self::new(".")
    }
}
