//! Markdown index of the published files.

use chrono::Utc;

use crate::provider::Descriptor;
use crate::timestamp::Timestamp;

/// Name of the index in the working tree.
pub const INDEX_FILENAME: &str = "README.md";

pub const INDEX_COMMIT_MESSAGE: &str = "update index";

const TEMPLATE: &str = "# IP ranges

Address ranges published by well-known providers, refreshed by
[ip-fetcher](https://github.com/ip-fetcher/ip-fetcher).

Last updated: {{date}}

| File | Provider | Category | Source |
|---|---|---|---|
{{rows}}";

/// One table row per descriptor, in the given order.
pub fn index_rows(descriptors: &[&Descriptor]) -> String {
    let mut rows = String::new();
    for d in descriptors {
        let Some(file) = d.filename else {
            continue;
        };
        rows.push_str(&format!(
            "| [{file}]({file}) | {} | {} | [source]({}) |\n",
            d.full_name, d.category, d.source_url
        ));
    }
    rows
}

/// Render the index for the providers that ran.
pub fn render_index(descriptors: &[&Descriptor], date: &Timestamp) -> String {
    TEMPLATE
        .replace(
            "{{date}}",
            &date.with_timezone(&Utc).format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        )
        .replace("{{rows}}", &index_rows(descriptors))
}
