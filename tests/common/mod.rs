#![allow(dead_code)]

use gem_harvester::config::Config;
use gem_harvester::testing::work_item;
use gem_harvester::WorkItem;
use std::path::Path;

pub mod test_helpers {
    use super::*;

    /// Config rooted at `dir` with a fixed concurrency limit
    pub fn create_test_config(dir: &Path, concurrency: usize) -> Config {
        let mut config = Config::new(dir.to_path_buf());
        config.fetch.concurrency = concurrency;
        config.index.concurrency = concurrency;
        config
    }

    pub fn item_with_checksum(name: &str, version: &str, checksum: &str) -> WorkItem {
        let mut item = work_item(name, version, "2022-03-01", true);
        item.checksum = Some(checksum.to_string());
        item
    }

    /// A versions page with one row per `(version, yanked)` pair
    pub fn versions_page(name: &str, rows: &[(&str, bool)]) -> String {
        let mut html = String::from(r#"<html><body><ul class="t-list__items">"#);
        for (version, yanked) in rows {
            let marker = if *yanked {
                r#"<span class="gem__version__date">yanked</span>"#
            } else {
                ""
            };
            html.push_str(&format!(
                r#"<li class="gem__version-wrap">
                     <a class="t-list__item" href="/gems/{name}/versions/{version}">{version}</a>
                     <small class="gem__version__date">January 3, 2023</small>
                     <span class="gem__version__date">(20.5 KB)</span>
                     {marker}
                   </li>"#
            ));
        }
        html.push_str("</ul></body></html>");
        html
    }

    pub fn detail_page(description: &str, checksum: &str) -> String {
        format!(
            r#"<html><body>
                 <div id="markup"><p>{description}</p></div>
                 <div class="gem__sha">{checksum}</div>
               </body></html>"#
        )
    }

    pub fn setup_test_logger() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_test_writer()
            .try_init();
    }
}
