#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

#[allow(dead_code)]
pub const CMD_TIMEOUT: Duration = Duration::from_secs(15);

/// A temp workspace with a config file and a local store root.
pub struct Workspace {
    pub dir: TempDir,
}

#[allow(dead_code)]
impl Workspace {
    /// Config pointing the search backend at `search_url`.
    pub fn new(search_url: &str) -> Self {
        let dir = tempfile::tempdir().expect("failed to create workspace");
        let root = dir.path().join("public");
        let config = format!(
            r#"
[search]
url = "{search_url}"
index = "ons"
page_size = 2
request_timeout = 5

[languages.primary]
lang = "en"
host = "https://www.example.com"

[languages.alternate]
lang = "cy"
host = "https://cy.example.com"

[store]
root = "{}"

[robots]
sitemap_url = "https://www.example.com/sitemap_en.xml"

[[robots.rules]]
user_agent = "*"
allow = ["/"]
disallow = ["/search"]
"#,
            root.display()
        );
        std::fs::write(dir.path().join("config.toml"), config).expect("failed to write config");
        Self { dir }
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("config.toml")
    }

    pub fn store_root(&self) -> PathBuf {
        self.dir.path().join("public")
    }

    pub fn read(&self, name: &str) -> String {
        std::fs::read_to_string(self.store_root().join(name))
            .unwrap_or_else(|e| panic!("failed to read {name}: {e}"))
    }

    /// `sitemapper --config <this workspace>`.
    pub fn cmd(&self) -> Command {
        let mut cmd = sitemapper_cmd();
        cmd.arg("--config").arg(self.config_path());
        cmd
    }
}

/// A `sitemapper` command isolated from the caller's environment.
pub fn sitemapper_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("sitemapper"));
    cmd.timeout(CMD_TIMEOUT);
    cmd.env_remove("SITEMAPPER_CONFIG");
    cmd.env_remove("SITEMAPPER_SEARCH_URL");
    cmd.env_remove("SITEMAPPER_STORE_ROOT");
    cmd.env("NO_COLOR", "1");
    cmd
}
