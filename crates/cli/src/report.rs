use textvar_engine::ScanReport;
use textvar_protocol::{ClearResult, CollectionSummary, GhostBinding, GhostEvidence, ProcessingStats};

const PREVIEW_WIDTH: usize = 48;

pub fn render_scan(report: &ScanReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{} groups from {} eligible text layers ({} ineligible, mode: {})\n",
        report.grouping.groups.len(),
        report.eligible_count(),
        report.ineligible_count(),
        report.mode
    ));
    for group in &report.grouping.groups {
        out.push_str(&format!(
            "  {:<32} x{:<3} {}\n",
            group.variable_name,
            group.len(),
            one_line(&group.content, PREVIEW_WIDTH)
        ));
    }
    for (reason, count) in &report.ineligible {
        out.push_str(&format!("  skipped {count}: {reason}\n"));
    }
    for (source, err) in &report.grouping.rejected {
        out.push_str(&format!("  rejected {}: {err}\n", source.node_id));
    }
    out
}

pub fn render_stats(stats: &ProcessingStats) -> String {
    let mut out = format!(
        "{} created, {} connected, {} skipped, {} errored ({} groups, {} with duplicates) in {}ms\n",
        stats.created,
        stats.connected,
        stats.skipped,
        stats.errored,
        stats.group_count,
        stats.duplicate_group_count,
        stats.elapsed_ms
    );
    if stats.cancelled {
        out.push_str(&format!(
            "cancelled after {} of {} groups\n",
            stats.processed_groups, stats.group_count
        ));
    }
    for failure in &stats.failures {
        let target = failure
            .node_id
            .as_deref()
            .or(failure.variable_name.as_deref())
            .unwrap_or("-");
        out.push_str(&format!("  {target}: {}\n", failure.message));
    }
    out
}

pub fn render_ghosts(ghosts: &[GhostBinding]) -> String {
    if ghosts.is_empty() {
        return "No ghost bindings found\n".to_string();
    }
    let mut out = format!("{} ghost bindings\n", ghosts.len());
    for ghost in ghosts {
        let evidence = match &ghost.evidence {
            GhostEvidence::Missing => "missing".to_string(),
            GhostEvidence::ResolutionError { message } => format!("lookup failed: {message}"),
        };
        out.push_str(&format!(
            "  {} ({}) {} -> {} [{evidence}]\n",
            ghost.node_id,
            one_line(&ghost.node_name, PREVIEW_WIDTH),
            ghost.kind,
            ghost.variable_id
        ));
    }
    out
}

pub fn render_clear(result: &ClearResult) -> String {
    let mut out = format!(
        "Cleared {} of {} nodes ({} failed)\n",
        result.successfully_cleared, result.requested, result.failed
    );
    for failure in &result.failures {
        out.push_str(&format!("  {}: {}\n", failure.node_id, failure.reason));
    }
    out
}

pub fn render_collections(collections: &[CollectionSummary]) -> String {
    if collections.is_empty() {
        return "No collections\n".to_string();
    }
    collections
        .iter()
        .map(|c| format!("{}  {} ({} variables)\n", c.id, c.name, c.variable_count))
        .collect()
}

fn one_line(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let mut cut: String = flat.chars().take(max_chars.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}
