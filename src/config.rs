//! Configuration.
//!
//! The configuration is assembled from three layers: built-in defaults, an
//! optional TOML config file, and the command line. Later layers override
//! earlier ones.

use std::{fmt, fs, io};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use clap::{
    Arg, ArgAction, ArgMatches, Command, crate_version, value_parser,
};
use hyper::Uri;
use kurbo::Size;
use serde::Deserialize;
use crate::projection::Viewport;
use crate::stream::StreamConfig;
use crate::transform::FitTransform;


//------------ Configurable Constants ----------------------------------------

/// The config file used if none is given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/transitmap.conf";

/// The default base URI of the backend.
pub const DEFAULT_API: &str = "http://localhost:4567";

/// The default address of the viewer.
pub const DEFAULT_LISTEN: &str = "127.0.0.1:8080";

/// The default size of the rendered map.
pub const DEFAULT_CANVAS: Size = Size::new(1280., 1024.);

/// The default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";


//------------ Config --------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Config {
    /// The base URI of the backend.
    pub api: Uri,

    /// The address the viewer listens on.
    pub listen: SocketAddr,

    /// The size of the projection surface.
    pub viewport: Viewport,

    /// The transformation from projected to canvas coordinates.
    pub fit: FitTransform,

    /// The size of the rendered map.
    pub canvas: Size,

    /// How to deal with the vehicle stream.
    pub stream: StreamConfig,

    /// The log level if `RUST_LOG` isn’t set.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api: Uri::from_static(DEFAULT_API),
            listen: SocketAddr::from(([127, 0, 0, 1], 8080)),
            viewport: Viewport::default(),
            fit: FitTransform::default(),
            canvas: DEFAULT_CANVAS,
            stream: StreamConfig::default(),
            log_level: DEFAULT_LOG_LEVEL.into(),
        }
    }
}

impl Config {
    /// Creates the config from the process’s command line.
    pub fn get() -> Result<Self, ConfigError> {
        Self::from_matches(Self::command().get_matches())
    }

    /// Creates the config from parsed command line arguments.
    pub fn from_matches(mut matches: ArgMatches) -> Result<Self, ConfigError> {
        let (config_path, insist) = match matches.remove_one::<PathBuf>(
            "config"
        ) {
            Some(path) => (path, true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };

        let mut config = Config::default();
        if let Some(file) = ConfigFile::load(&config_path, insist)? {
            config.apply_toml(file)?;
        }
        config.apply_matches(matches);
        config.check()?;
        Ok(config)
    }

    /// Returns the command line parser.
    pub fn command() -> Command {
        Command::new("transitmap")
            .version(crate_version!())
            .about("shows transit vehicles on a live map")
            .arg(Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("the configuration file")
                .action(ArgAction::Set)
            )
            .arg(Arg::new("api")
                .short('a')
                .long("api")
                .value_name("URI")
                .value_parser(value_parser!(Uri))
                .help("the base URI of the backend")
                .action(ArgAction::Set)
            )
            .arg(Arg::new("listen")
                .short('l')
                .long("listen")
                .value_name("ADDR")
                .value_parser(value_parser!(SocketAddr))
                .help("the addr to listen on")
                .action(ArgAction::Set)
            )
            .arg(Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("the log level if RUST_LOG isn't set")
                .action(ArgAction::Set)
            )
    }

    fn apply_matches(&mut self, mut matches: ArgMatches) {
        if let Some(api) = matches.remove_one("api") {
            self.api = api;
        }
        if let Some(addr) = matches.remove_one("listen") {
            self.listen = addr;
        }
        if let Some(level) = matches.remove_one("log-level") {
            self.log_level = level;
        }
    }

    fn apply_toml(&mut self, toml: ConfigFile) -> Result<(), ConfigError> {
        if let Some(api) = toml.api {
            self.api = Uri::from_str(&api).map_err(|_| {
                ConfigError::InvalidUri(api)
            })?;
        }
        if let Some(listen) = toml.listen {
            self.listen = listen;
        }
        if let Some(viewport) = toml.viewport {
            self.viewport = Viewport::new(
                viewport.width.unwrap_or(self.viewport.width),
                viewport.height.unwrap_or(self.viewport.height),
            );
        }
        if let Some(fit) = toml.fit {
            self.fit = FitTransform::new(
                fit.min_x.unwrap_or(self.fit.min().x),
                fit.min_y.unwrap_or(self.fit.min().y),
                fit.scale.unwrap_or(self.fit.scale()),
            );
        }
        if let Some(canvas) = toml.canvas {
            self.canvas = Size::new(
                canvas.width.unwrap_or(self.canvas.width),
                canvas.height.unwrap_or(self.canvas.height),
            );
        }
        if let Some(stream) = toml.stream {
            if let Some(delay) = stream.reconnect_delay {
                self.stream.reconnect_delay = seconds(delay)?;
            }
            if let Some(delay) = stream.max_reconnect_delay {
                self.stream.max_reconnect_delay = seconds(delay)?;
            }
        }
        if let Some(level) = toml.log_level {
            self.log_level = level;
        }
        Ok(())
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.api.scheme_str() != Some("http") {
            return Err(ConfigError::UnsupportedScheme(self.api.clone()))
        }
        let sizes = [
            self.viewport.width, self.viewport.height,
            self.canvas.width, self.canvas.height, self.fit.scale(),
        ];
        if sizes.iter().any(|size| !size.is_finite() || *size <= 0.) {
            return Err(ConfigError::InvalidSize)
        }
        Ok(())
    }
}

fn seconds(value: f64) -> Result<Duration, ConfigError> {
    if value.is_finite() && value > 0. {
        Ok(Duration::from_secs_f64(value))
    }
    else {
        Err(ConfigError::InvalidDelay(value))
    }
}


//------------ ConfigFile ----------------------------------------------------

/// The content of the config file.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct ConfigFile {
    api: Option<String>,
    listen: Option<SocketAddr>,
    viewport: Option<SizeSection>,
    fit: Option<FitSection>,
    canvas: Option<SizeSection>,
    stream: Option<StreamSection>,
    log_level: Option<String>,
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SizeSection {
    width: Option<f64>,
    height: Option<f64>,
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct FitSection {
    min_x: Option<f64>,
    min_y: Option<f64>,
    scale: Option<f64>,
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct StreamSection {
    /// In seconds.
    reconnect_delay: Option<f64>,

    /// In seconds.
    max_reconnect_delay: Option<f64>,
}

impl ConfigFile {
    /// Loads the config file.
    ///
    /// A missing file is only an error if `insist` is true.
    fn load(path: &Path, insist: bool) -> Result<Option<Self>, ConfigError> {
        match fs::read_to_string(path) {
            Ok(content) => {
                Self::parse(&content).map(Some).map_err(|err| {
                    ConfigError::Parse(path.into(), err)
                })
            }
            Err(err) => {
                if !matches!(err.kind(), io::ErrorKind::NotFound) || insist {
                    Err(ConfigError::Read(path.into(), err))
                }
                else {
                    Ok(None)
                }
            }
        }
    }

    fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}


//------------ ConfigError ---------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    Read(PathBuf, io::Error),
    Parse(PathBuf, toml::de::Error),
    InvalidUri(String),
    UnsupportedScheme(Uri),
    InvalidSize,
    InvalidDelay(f64),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ConfigError::Read(ref path, ref err) => {
                write!(
                    f, "Failed to read config file {}: {}",
                    path.display(), err
                )
            }
            ConfigError::Parse(ref path, ref err) => {
                write!(
                    f, "Failed to parse config file {}: {}",
                    path.display(), err
                )
            }
            ConfigError::InvalidUri(ref uri) => {
                write!(f, "Invalid backend URI '{}'.", uri)
            }
            ConfigError::UnsupportedScheme(ref uri) => {
                write!(f, "Backend URI {} must use plain http.", uri)
            }
            ConfigError::InvalidSize => {
                f.write_str("Sizes and scale must be positive.")
            }
            ConfigError::InvalidDelay(delay) => {
                write!(f, "Invalid reconnect delay {}.", delay)
            }
        }
    }
}

impl std::error::Error for ConfigError { }


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    fn config(toml: &str) -> Result<Config, ConfigError> {
        let mut config = Config::default();
        config.apply_toml(ConfigFile::parse(toml).unwrap())?;
        config.check()?;
        Ok(config)
    }

    #[test]
    fn defaults() {
        let config = config("").unwrap();
        assert_eq!(config.api, Uri::from_static("http://localhost:4567"));
        assert_eq!(config.listen.to_string(), DEFAULT_LISTEN);
        assert_eq!(config.viewport, Viewport::new(496., 496.));
        assert_eq!(config.fit.scale(), 2300.);
        assert_eq!(config.stream, StreamConfig::default());
    }

    #[test]
    fn full_file() {
        let config = config(r#"
            api = "http://backend:4567/"
            listen = "0.0.0.0:9000"
            log-level = "debug"

            [viewport]
            width = 1000

            [fit]
            min-x = 1.5
            scale = 10

            [canvas]
            height = 600

            [stream]
            reconnect-delay = 0.5
            max-reconnect-delay = 60
        "#).unwrap();
        assert_eq!(config.api.host(), Some("backend"));
        assert_eq!(config.listen.port(), 9000);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.viewport, Viewport::new(1000., 496.));
        assert_eq!(config.fit.min().x, 1.5);
        assert_eq!(config.fit.min().y, crate::transform::DEFAULT_MIN_Y);
        assert_eq!(config.fit.scale(), 10.);
        assert_eq!(config.canvas, Size::new(1280., 600.));
        assert_eq!(config.stream.reconnect_delay, Duration::from_millis(500));
        assert_eq!(config.stream.max_reconnect_delay, Duration::from_secs(60));
    }

    #[test]
    fn rejects() {
        assert!(ConfigFile::parse("colour = 1").is_err());
        assert!(matches!(
            config("api = \"https://example.com\""),
            Err(ConfigError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            config("[fit]\nscale = 0"), Err(ConfigError::InvalidSize)
        ));
        assert!(matches!(
            config("[stream]\nreconnect-delay = -1"),
            Err(ConfigError::InvalidDelay(_))
        ));
        assert!(matches!(
            config("[stream]\nreconnect-delay = 0"),
            Err(ConfigError::InvalidDelay(_))
        ));
        assert!(matches!(
            config("[stream]\nmax-reconnect-delay = 0.0"),
            Err(ConfigError::InvalidDelay(_))
        ));
    }

    #[test]
    fn command_line_wins() {
        let matches = Config::command().try_get_matches_from([
            "transitmap", "--config", "/nonexistent/transitmap.conf",
        ]).unwrap();
        assert!(matches!(
            Config::from_matches(matches), Err(ConfigError::Read(..))
        ));

        let mut config = Config::default();
        config.apply_matches(Config::command().try_get_matches_from([
            "transitmap", "-a", "http://other:1234", "-l", "[::1]:80",
            "--log-level", "warn",
        ]).unwrap());
        assert_eq!(config.api.port_u16(), Some(1234));
        assert_eq!(config.listen.port(), 80);
        assert_eq!(config.log_level, "warn");
    }
}
