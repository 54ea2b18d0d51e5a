use std::env;
use std::sync::OnceLock;

static KESTREL_PASS_STATS: OnceLock<bool> = OnceLock::new();
static KESTREL_SUBGRAPH_CACHE_DIR: OnceLock<Option<String>> = OnceLock::new();

fn parse_bool(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    matches!(normalized.as_str(), "1" | "true" | "yes" | "on")
}

pub(crate) fn pass_stats_enabled() -> bool {
    *KESTREL_PASS_STATS.get_or_init(|| match env::var("KESTREL_PASS_STATS") {
        Ok(value) if !value.trim().is_empty() => parse_bool(&value),
        _ => false,
    })
}

pub(crate) fn subgraph_cache_dir() -> Option<&'static str> {
    KESTREL_SUBGRAPH_CACHE_DIR
        .get_or_init(|| match env::var("KESTREL_SUBGRAPH_CACHE_DIR") {
            Ok(value) if !value.trim().is_empty() => Some(value),
            _ => None,
        })
        .as_deref()
}
