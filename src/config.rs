use anyhow::{Context, Result};
use clap::Parser;
use std::{env, str::FromStr};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// How many preview jobs may run at once.
    pub workers: usize,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Open Graph preview service")]
pub struct Args {
    /// Host to bind to (overrides OG_PREVIEW_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides OG_PREVIEW_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides OG_PREVIEW_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Concurrent preview jobs (overrides OG_PREVIEW_WORKERS)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        Ok((Self::merge(args, |key: &str| env::var(key))?, migrate))
    }

    /// CLI values win over the environment, which wins over defaults.
    fn merge<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let env_host = lookup("OG_PREVIEW_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_var(&lookup, "OG_PREVIEW_PORT", 3000)?;
        let env_db = lookup("OG_PREVIEW_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/og_preview.db".into());
        let env_workers = parse_var(&lookup, "OG_PREVIEW_WORKERS", 4)?;

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            workers: args.workers.unwrap_or(env_workers).max(1),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Result<String, env::VarError>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(
        vars: &[(&str, &str)],
    ) -> impl Fn(&str) -> Result<String, env::VarError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned().ok_or(env::VarError::NotPresent)
    }

    #[test]
    fn defaults_apply_without_env_or_args() {
        let cfg = AppConfig::merge(Args::default(), lookup_from(&[])).unwrap();
        assert_eq!(cfg.addr(), "0.0.0.0:3000");
        assert_eq!(cfg.database_url, "sqlite://./data/og_preview.db");
        assert_eq!(cfg.workers, 4);
    }

    #[test]
    fn args_override_env() {
        let args = Args {
            port: Some(8080),
            ..Default::default()
        };
        let cfg = AppConfig::merge(
            args,
            lookup_from(&[("OG_PREVIEW_PORT", "9000"), ("OG_PREVIEW_HOST", "127.0.0.1")]),
        )
        .unwrap();
        assert_eq!(cfg.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn bad_port_is_reported() {
        let err = AppConfig::merge(
            Args::default(),
            lookup_from(&[("OG_PREVIEW_PORT", "nope")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("OG_PREVIEW_PORT"));
    }

    #[test]
    fn workers_never_drop_to_zero() {
        let cfg = AppConfig::merge(
            Args::default(),
            lookup_from(&[("OG_PREVIEW_WORKERS", "0")]),
        )
        .unwrap();
        assert_eq!(cfg.workers, 1);
    }
}
