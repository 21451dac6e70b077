use crate::eligibility::{classify, Eligibility, EligibilityRules, Ineligible};
use crate::port::{DocumentPort, HostResult};
use crate::source::TextSource;
use std::collections::{BTreeMap, HashSet};

/// Eligible sources plus a tally of everything that was left out.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub sources: Vec<TextSource>,
    pub ineligible: BTreeMap<Ineligible, usize>,
}

impl ScanOutcome {
    pub fn ineligible_count(&self) -> usize {
        self.ineligible.values().sum()
    }

    fn reject(&mut self, reason: Ineligible) {
        *self.ineligible.entry(reason).or_insert(0) += 1;
    }
}

/// Snapshot eligible text sources, either from `node_ids` or the whole document.
///
/// Only the initial listing may fail the call; a node that cannot be read is
/// counted as ineligible.
pub async fn collect_sources(
    document: &dyn DocumentPort,
    node_ids: Option<&[String]>,
    rules: &EligibilityRules,
) -> HostResult<ScanOutcome> {
    let ids = match node_ids {
        Some(ids) => ids.to_vec(),
        None => document.text_node_ids().await?,
    };

    let mut outcome = ScanOutcome::default();
    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(id.clone()) {
            continue;
        }
        let node = match document.node(&id).await {
            Ok(Some(node)) => node,
            Ok(None) => {
                outcome.reject(Ineligible::Removed);
                continue;
            }
            Err(err) => {
                log::warn!("Skipping node {id}: {err}");
                outcome.reject(Ineligible::InspectionFailed);
                continue;
            }
        };
        match classify(&node, rules) {
            Eligibility::Eligible => match TextSource::from_snapshot(&node) {
                Some(source) => outcome.sources.push(source),
                None => outcome.reject(Ineligible::EmptyText),
            },
            Eligibility::Ineligible(reason) => {
                log::trace!("Node {id} ineligible: {reason}");
                outcome.reject(reason);
            }
        }
    }

    log::debug!(
        "Scanned {} eligible text sources ({} ineligible)",
        outcome.sources.len(),
        outcome.ineligible_count()
    );
    Ok(outcome)
}
