//! robots.txt rendering from a static rule table.
//!
//! The file is regenerated after every successful full rebuild so its `Sitemap:`
//! directive always points at the sitemap that was just published.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// One user-agent group of allow/deny rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RobotsRule {
    /// Crawler the group applies to; `*` for all.
    pub user_agent: String,
    /// Paths explicitly allowed.
    #[serde(default)]
    pub allow: Vec<String>,
    /// Paths disallowed.
    #[serde(default)]
    pub disallow: Vec<String>,
}

/// robots.txt rule table plus the published sitemap location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotsConfig {
    /// Absolute URL of the published primary sitemap.
    pub sitemap_url: String,
    /// Rule groups in output order.
    pub rules: Vec<RobotsRule>,
}

impl Default for RobotsConfig {
    fn default() -> Self {
        Self {
            sitemap_url: "https://www.example.com/sitemap.xml".to_string(),
            rules: vec![RobotsRule {
                user_agent: "*".to_string(),
                allow: vec!["/".to_string()],
                disallow: Vec::new(),
            }],
        }
    }
}

impl RobotsConfig {
    /// Render robots.txt.
    ///
    /// Groups appear in table order separated by blank lines, followed by a
    /// `Sitemap:` directive.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();

        for rule in &self.rules {
            let _ = writeln!(out, "User-agent: {}", rule.user_agent);
            for path in &rule.allow {
                let _ = writeln!(out, "Allow: {path}");
            }
            for path in &rule.disallow {
                let _ = writeln!(out, "Disallow: {path}");
            }
            out.push('\n');
        }

        let _ = writeln!(out, "Sitemap: {}", self.sitemap_url);
        out
    }
}
