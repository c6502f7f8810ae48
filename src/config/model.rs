//! The wire format of `config/keter.yaml`, deserialized as-is before
//! normalization. Field names follow the kebab-case keys in the document.

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    pub host: Option<String>,
    pub exec: Option<String>,
    pub args: Vec<String>,
    pub postgres: bool,
    pub ssl: bool,
    #[serde(rename = "extra-hosts")]
    pub extra_hosts: Vec<String>,
    #[serde(rename = "static-hosts")]
    pub static_hosts: Vec<RawStaticHost>,
    pub redirects: Vec<RawRedirect>,
}

#[derive(Debug, Deserialize)]
pub struct RawStaticHost {
    pub host: String,
    pub root: String,
}

#[derive(Debug, Deserialize)]
pub struct RawRedirect {
    pub from: String,
    pub to: String,
}
