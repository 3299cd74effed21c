use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tuff-native-server")]
#[command(about = "Native OCR and Everything file search over HTTP")]
#[command(version)]
pub struct Args {
    /// Host address to bind to
    #[arg(long, env = "TUFF_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "TUFF_PORT", default_value = "9393")]
    pub port: u16,

    /// Maximum accepted image size in bytes (default: 20MB)
    #[arg(long, env = "TUFF_MAX_IMAGE_SIZE", default_value = "20971520")]
    pub max_image_size: usize,

    /// Explicit path to the Everything SDK DLL, tried before the standard locations
    #[arg(long, env = "TALEX_EVERYTHING_DLL_PATH")]
    pub everything_dll: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub max_image_size: usize,
    pub everything_dll: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9393,
            max_image_size: 20 * 1024 * 1024,
            everything_dll: None,
        }
    }
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            host: args.host,
            port: args.port,
            max_image_size: args.max_image_size,
            // an empty override behaves like no override
            everything_dll: args.everything_dll.filter(|p| !p.as_os_str().is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_to_config() {
        let args = Args::parse_from([
            "tuff-native-server",
            "--host",
            "0.0.0.0",
            "--port",
            "9500",
            "--max-image-size",
            "1024",
            "--everything-dll",
            "D:\\sdk\\Everything64.dll",
        ]);
        let config = Config::from(args);

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9500);
        assert_eq!(config.max_image_size, 1024);
        assert_eq!(
            config.everything_dll,
            Some(PathBuf::from("D:\\sdk\\Everything64.dll"))
        );
    }

    #[test]
    fn test_empty_dll_flag_rejected_by_cli() {
        let parsed = Args::try_parse_from(["tuff-native-server", "--everything-dll", ""]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_empty_dll_override_ignored() {
        let args = Args {
            host: "127.0.0.1".to_string(),
            port: 9393,
            max_image_size: 1024,
            everything_dll: Some(PathBuf::new()),
            log_level: "info".to_string(),
        };
        assert_eq!(Config::from(args).everything_dll, None);
    }
}
