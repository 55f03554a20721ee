// src/download/site.rs

//! Download sites: the unit of per-destination admission

use crate::error::{Error, Result};
use std::fmt;
use url::Url;

/// Destination of a transfer: scheme, host and port (with the scheme default filled in)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Site {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl Site {
    pub fn from_url(url: &Url) -> Result<Self> {
        let scheme = url.scheme().to_string();
        let host = url.host_str().unwrap_or_default().to_lowercase();
        if host.is_empty() && scheme != "file" {
            return Err(Error::DownloadError(format!("URL has no host: {}", url)));
        }
        let port = url.port_or_known_default().unwrap_or(0);
        Ok(Self { scheme, host, port })
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}
