//! Values substituted into the image's configuration templates.

use std::process::Command;

use crate::config::Layout;
use crate::environment::ProcessEnv;
use crate::error::{EntrypointError, Result};
use crate::render::Context;

const DEFAULT_UWSGI_WORKERS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceContext {
    pub django_config_path: String,
    pub python_version: String,
    pub project_name: String,
    pub uwsgi_plugin_name: String,
    pub uwsgi_workers: u32,
    pub rsyslog_host: String,
    pub venv: String,
    pub http_proxy: String,
    pub https_proxy: String,
    pub no_proxy: String,
}

impl ServiceContext {
    pub fn from_env(env: &ProcessEnv, layout: &Layout) -> Result<Self> {
        let python_version = env.require("PYTHON_VERSION")?.to_string();
        let project_name = env.require("PROJECT_NAME")?.to_string();
        let rsyslog_host = match env.get("RSYSLOG_HOST") {
            Some(host) => host.to_string(),
            None => gateway_ip()?,
        };
        let proxy = |key: &str| env.get(key).unwrap_or_default().to_string();

        Ok(Self {
            django_config_path: layout.app_config().display().to_string(),
            uwsgi_plugin_name: uwsgi_plugin_name(&python_version),
            uwsgi_workers: uwsgi_workers(env.get("UWSGI_WORKERS")),
            python_version,
            project_name,
            rsyslog_host,
            venv: layout.venv().display().to_string(),
            http_proxy: proxy("http_proxy"),
            https_proxy: proxy("https_proxy"),
            no_proxy: proxy("no_proxy"),
        })
    }

    pub fn to_context(&self) -> Context {
        [
            ("django_config_path", self.django_config_path.clone()),
            ("python_version", self.python_version.clone()),
            ("project_name", self.project_name.clone()),
            ("project_name_upper", self.project_name.to_uppercase()),
            ("uwsgi_plugin_name", self.uwsgi_plugin_name.clone()),
            ("uwsgi_workers", self.uwsgi_workers.to_string()),
            ("rsyslog_host", self.rsyslog_host.clone()),
            ("venv", self.venv.clone()),
            ("http_proxy", self.http_proxy.clone()),
            ("https_proxy", self.https_proxy.clone()),
            ("no_proxy", self.no_proxy.clone()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }
}

/// uWSGI names its Python 3 plugin `python3`; everything else uses `python`.
fn uwsgi_plugin_name(python_version: &str) -> String {
    match python_version.split('.').next() {
        Some("3") => "python3".into(),
        _ => "python".into(),
    }
}

fn uwsgi_workers(raw: Option<&str>) -> u32 {
    raw.and_then(|v| v.trim().parse().ok())
        .unwrap_or(DEFAULT_UWSGI_WORKERS)
}

/// Address of the default gateway, i.e. the container host.
pub fn gateway_ip() -> Result<String> {
    let output = Command::new("ip")
        .args(["route", "show", "0.0.0.0/0"])
        .output()
        .map_err(|e| EntrypointError::Config(format!("ip route: {e}")))?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_gateway(&stdout)
        .ok_or_else(|| EntrypointError::Config(format!("no default route in {:?}", stdout.trim())))
}

fn parse_gateway(route: &str) -> Option<String> {
    let mut tokens = route.split_whitespace();
    tokens.find(|t| *t == "via")?;
    let addr = tokens.next()?;
    let valid = !addr.is_empty() && addr.chars().all(|c| c.is_ascii_digit() || c == '.');
    valid.then(|| addr.to_string())
}
