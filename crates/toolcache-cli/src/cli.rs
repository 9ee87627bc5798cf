//! Command-line interface definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// toolcache - offline asset cache for the tool inventory app.
#[derive(Parser, Debug)]
#[command(name = "toolcache")]
#[command(
    author,
    version,
    about,
    long_about = r#"toolcache pre-caches the tool inventory app's static assets and serves
them when the app cannot be reached.

Lifecycle:
- install: fetch every manifest asset into the cache named by the version tag
- activate: delete every cache whose name differs from the version tag
- update: install, then activate

Examples:
    toolcache update --origin http://127.0.0.1:5000
    toolcache fetch /static/style.css
    toolcache serve --listen 127.0.0.1:8080
"#
)]
pub struct Cli {
    /// Origin of the tool inventory app.
    #[arg(long, global = true, env = "TOOLCACHE_ORIGIN", value_name = "URL")]
    pub origin: Option<String>,

    /// Root directory of the cache storage.
    #[arg(long, global = true, env = "TOOLCACHE_CACHE_DIR", value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Version tag naming the current cache generation.
    #[arg(long, global = true, env = "TOOLCACHE_CACHE_NAME", value_name = "TAG")]
    pub cache_name: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch every manifest asset into the current cache.
    Install,

    /// Delete caches left behind by previous version tags.
    Activate,

    /// Install, then activate.
    Update,

    /// Run one GET through the fetch handler.
    Fetch {
        /// Root-relative path or absolute URL on the origin.
        path: String,

        /// Write the body to a file instead of stdout.
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// List caches with entry counts and ages.
    Status,

    /// Serve the app through the fetch handler.
    Serve {
        /// Address to listen on.
        #[arg(long, value_name = "ADDR")]
        listen: Option<String>,
    },

    /// Print the effective configuration.
    Config {
        /// Persist the effective configuration to the config file.
        #[arg(long)]
        save: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fetch_with_globals() {
        let cli = Cli::try_parse_from([
            "toolcache",
            "fetch",
            "/static/style.css",
            "--origin",
            "http://inventory.local",
            "-o",
            "style.css",
        ])
        .expect("parse");

        assert_eq!(cli.origin.as_deref(), Some("http://inventory.local"));
        match cli.command {
            Command::Fetch { path, output } => {
                assert_eq!(path, "/static/style.css");
                assert_eq!(output, Some(PathBuf::from("style.css")));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_serve_listen() {
        let cli = Cli::try_parse_from(["toolcache", "serve", "--listen", "0.0.0.0:9000"])
            .expect("parse");
        assert!(matches!(
            cli.command,
            Command::Serve { listen: Some(ref addr) } if addr == "0.0.0.0:9000"
        ));
    }

    #[test]
    fn test_command_required() {
        assert!(Cli::try_parse_from(["toolcache"]).is_err());
    }
}
