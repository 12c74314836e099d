//! Server configuration: defaults, then environment variables, then command-line flags.

use std::env;
use std::net::IpAddr;
use std::path::PathBuf;

pub const DEFAULT_HTTP_PORT: u16 = 17310;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_ROOT: &str = ".";
pub const DEFAULT_ADB: &str = "adb";

pub const ENV_HTTP_PORT: &str = "CONTENTD_HTTP_PORT";
pub const ENV_BIND: &str = "CONTENTD_BIND";
pub const ENV_ROOT: &str = "CONTENTD_ROOT";
pub const ENV_ADB: &str = "CONTENTD_ADB";

pub const USAGE: &str = "contentd server\n\nUSAGE:\n  contentd_server [PORT] [--http-port N] [--bind ADDR] [--root PATH] [--adb PATH] [-q]\n\nOPTIONS:\n  PORT / --http-port N  HTTP port (env: CONTENTD_HTTP_PORT, default 17310)\n  --bind ADDR           Listen address (env: CONTENTD_BIND, default 0.0.0.0)\n  --root PATH           Directory exposed through the contents API (env: CONTENTD_ROOT, default .)\n  --adb PATH            adb binary used for device screenshots and UI dumps (env: CONTENTD_ADB, default adb)\n  -q, --quiet           Accepted and ignored; use RUST_LOG to tune logging\n  -h, --help            Print this help\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub http_port: u16,
    pub bind_addr: IpAddr,
    /// Confined root served by the contents API.
    pub root: PathBuf,
    pub adb_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            bind_addr: IpAddr::from([0, 0, 0, 0]),
            root: PathBuf::from(DEFAULT_ROOT),
            adb_path: DEFAULT_ADB.to_string(),
        }
    }
}

impl ServerConfig {
    /// Apply environment overrides on top of the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|k| env::var(k).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();
        if let Some(p) = lookup(ENV_HTTP_PORT).and_then(|v| v.trim().parse::<u16>().ok()) {
            cfg.http_port = p;
        }
        if let Some(a) = lookup(ENV_BIND).and_then(|v| v.trim().parse::<IpAddr>().ok()) {
            cfg.bind_addr = a;
        }
        if let Some(r) = lookup(ENV_ROOT).filter(|v| !v.trim().is_empty()) {
            cfg.root = PathBuf::from(r);
        }
        if let Some(a) = lookup(ENV_ADB).filter(|v| !v.trim().is_empty()) {
            cfg.adb_path = a;
        }
        cfg
    }

    /// CLI arguments override environment. `args` excludes the program name.
    pub fn apply_args(mut self, args: &[String]) -> anyhow::Result<Self> {
        let mut i = 0;
        while i < args.len() {
            let a = args[i].as_str();
            match a {
                "--http-port" | "--port" => {
                    let v = take_value(args, &mut i, a)?;
                    self.http_port = v.parse().map_err(|_| anyhow::anyhow!("invalid port: {}", v))?;
                }
                "--bind" => {
                    let v = take_value(args, &mut i, a)?;
                    self.bind_addr = v.parse().map_err(|_| anyhow::anyhow!("invalid bind address: {}", v))?;
                }
                "--root" => self.root = PathBuf::from(take_value(args, &mut i, a)?),
                "--adb" => self.adb_path = take_value(args, &mut i, a)?.to_string(),
                // accepted for older launch scripts; logging is driven by RUST_LOG
                "-q" | "--quiet" => {}
                _ if !a.starts_with('-') => {
                    // bare positional port
                    self.http_port = a.parse().map_err(|_| anyhow::anyhow!("invalid port: {}", a))?;
                }
                _ => anyhow::bail!("unknown option: {}", a),
            }
            i += 1;
        }
        Ok(self)
    }
}

fn take_value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> anyhow::Result<&'a str> {
    *i += 1;
    args.get(*i).map(|s| s.as_str()).ok_or_else(|| anyhow::anyhow!("{} expects a value", flag))
}

pub fn wants_help(args: &[String]) -> bool {
    args.iter().any(|a| a == "--help" || a == "-h")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults() {
        let cfg = ServerConfig::from_lookup(|_| None);
        assert_eq!(cfg, ServerConfig::default());
        assert_eq!(cfg.http_port, 17310);
        assert_eq!(cfg.bind_addr.to_string(), DEFAULT_BIND);
    }

    #[test]
    fn env_overrides_defaults_and_ignores_garbage() {
        let env: HashMap<&str, &str> = [(ENV_HTTP_PORT, "8080"), (ENV_ROOT, "/srv/work"), (ENV_BIND, "not-an-ip")].into_iter().collect();
        let cfg = ServerConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.root, PathBuf::from("/srv/work"));
        assert_eq!(cfg.bind_addr.to_string(), DEFAULT_BIND);
    }

    #[test]
    fn args_override_env() {
        let env: HashMap<&str, &str> = [(ENV_HTTP_PORT, "8080")].into_iter().collect();
        let cfg = ServerConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()))
            .apply_args(&args(&["--http-port", "9000", "--bind", "127.0.0.1", "--root", "work", "--adb", "/opt/adb"]))
            .unwrap();
        assert_eq!(cfg.http_port, 9000);
        assert_eq!(cfg.bind_addr.to_string(), "127.0.0.1");
        assert_eq!(cfg.root, PathBuf::from("work"));
        assert_eq!(cfg.adb_path, "/opt/adb");
    }

    #[test]
    fn positional_port() {
        let cfg = ServerConfig::default().apply_args(&args(&["17999"])).unwrap();
        assert_eq!(cfg.http_port, 17999);
    }

    #[test]
    fn quiet_flag_is_accepted() {
        let cfg = ServerConfig::default().apply_args(&args(&["-q", "17999", "--quiet"])).unwrap();
        assert_eq!(cfg.http_port, 17999);
    }

    #[test]
    fn bad_args_are_errors() {
        assert!(ServerConfig::default().apply_args(&args(&["--http-port"])).is_err());
        assert!(ServerConfig::default().apply_args(&args(&["--http-port", "x"])).is_err());
        assert!(ServerConfig::default().apply_args(&args(&["--frobnicate"])).is_err());
        assert!(wants_help(&args(&["--root", ".", "-h"])));
    }
}
