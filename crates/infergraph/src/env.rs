use std::env;
use std::sync::OnceLock;

use tracing::warn;

pub(crate) const DEFAULT_MAX_PASSES: usize = 16;

static OPT_MAX_PASSES: OnceLock<usize> = OnceLock::new();
static OPT_PASS_STATS: OnceLock<bool> = OnceLock::new();

fn parse_bool(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    matches!(normalized.as_str(), "1" | "true" | "yes" | "on")
}

fn parse_passes(value: &str) -> Option<usize> {
    value.trim().parse::<usize>().ok().map(|passes| passes.max(1))
}

/// Pass budget for the fixed-point driver (`INFERGRAPH_OPT_MAX_PASSES`).
pub(crate) fn opt_max_passes() -> usize {
    *OPT_MAX_PASSES.get_or_init(|| match env::var("INFERGRAPH_OPT_MAX_PASSES") {
        Ok(value) if !value.trim().is_empty() => parse_passes(&value).unwrap_or_else(|| {
            warn!(
                value = %value,
                "ignoring unparsable INFERGRAPH_OPT_MAX_PASSES, using {DEFAULT_MAX_PASSES}"
            );
            DEFAULT_MAX_PASSES
        }),
        _ => DEFAULT_MAX_PASSES,
    })
}

/// Per-pass optimizer statistics at info level (`INFERGRAPH_OPT_PASS_STATS`).
pub(crate) fn opt_pass_stats_enabled() -> bool {
    *OPT_PASS_STATS.get_or_init(|| match env::var("INFERGRAPH_OPT_PASS_STATS") {
        Ok(value) if !value.trim().is_empty() => parse_bool(&value),
        _ => false,
    })
}
