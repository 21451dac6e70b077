use crate::config::NamingConfig;
use crate::error::{NamingError, Result};
use crate::normalize::{normalize, normalize_with, CaseMode, FALLBACK_FRAGMENT};
use crate::truncate::truncate_name;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use textvar_protocol::NamingMode;

const PATH_SEPARATOR_STR: &str = "/";

/// Container labels that carry no meaning on their own (`frame_12`, `group`, `var_3`).
static GENERIC_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:(?:frame|group|rectangle|rect|vector|layer|ellipse|polygon|line|container|auto_layout|text)(?:_?\d+)?|(?:var_)?\d+)$",
    )
    .expect("generic label pattern compiles")
});

/// One ancestor of a text node, as seen from the naming side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralAncestor {
    pub label: String,
    /// Reusable-component container (component, component set, instance)
    #[serde(default)]
    pub is_boundary: bool,
}

impl StructuralAncestor {
    pub fn new(label: impl Into<String>, is_boundary: bool) -> Self {
        Self {
            label: label.into(),
            is_boundary,
        }
    }
}

/// Everything a strategy may look at to name one text source.
#[derive(Debug, Clone, Copy)]
pub struct NamingSubject<'a> {
    pub content: &'a str,
    pub label: &'a str,
    /// Nearest ancestor first
    pub ancestors: &'a [StructuralAncestor],
}

/// Derives variable names and grouping keys for one naming mode.
pub trait NamingStrategy: Send + Sync {
    fn mode(&self) -> NamingMode;

    /// Case handling for grouping keys and content fragments
    fn case_mode(&self) -> CaseMode;

    fn max_name_len(&self) -> usize;

    /// Equivalence key: sources with equal keys share one variable.
    fn group_key(&self, content: &str) -> String {
        let trimmed = content.trim();
        match self.case_mode() {
            CaseMode::Insensitive => trimmed.to_lowercase(),
            CaseMode::Preserve => trimmed.to_string(),
        }
    }

    /// Full, length-bounded variable name for `subject`.
    fn compose(&self, subject: &NamingSubject<'_>) -> Result<String>;
}

pub fn strategy_for(mode: NamingMode, config: NamingConfig) -> Box<dyn NamingStrategy> {
    match mode {
        NamingMode::Simple => Box::new(SimpleNaming::new(config)),
        NamingMode::Hierarchical => Box::new(HierarchicalNaming::new(config)),
    }
}

/// Name straight from the content, capitalization kept.
#[derive(Debug, Clone, Default)]
pub struct SimpleNaming {
    config: NamingConfig,
}

impl SimpleNaming {
    pub fn new(config: NamingConfig) -> Self {
        Self { config }
    }
}

impl NamingStrategy for SimpleNaming {
    fn mode(&self) -> NamingMode {
        NamingMode::Simple
    }

    fn case_mode(&self) -> CaseMode {
        CaseMode::Preserve
    }

    fn max_name_len(&self) -> usize {
        self.config.max_name_len
    }

    fn compose(&self, subject: &NamingSubject<'_>) -> Result<String> {
        ensure_text(subject.content)?;
        let fragment = normalize_with(subject.content, self.case_mode());
        Ok(truncate_name(&fragment, self.max_name_len()))
    }
}

/// `root/meaningfulParent/ownLabel` built from the layer tree.
#[derive(Debug, Clone, Default)]
pub struct HierarchicalNaming {
    config: NamingConfig,
}

impl HierarchicalNaming {
    pub fn new(config: NamingConfig) -> Self {
        Self { config }
    }

    fn own_fragment(&self, subject: &NamingSubject<'_>) -> String {
        let content = normalize_with(subject.content, self.case_mode());
        if subject.label.trim().is_empty() {
            return content;
        }
        let own = normalize_with(subject.label, self.case_mode());
        if own == content {
            return own;
        }
        // Siblings with identical labels but different text must not collide.
        format!("{own}_{}", content.trim_start_matches('_'))
    }
}

impl NamingStrategy for HierarchicalNaming {
    fn mode(&self) -> NamingMode {
        NamingMode::Hierarchical
    }

    fn case_mode(&self) -> CaseMode {
        CaseMode::Insensitive
    }

    fn max_name_len(&self) -> usize {
        self.config.max_name_len
    }

    fn compose(&self, subject: &NamingSubject<'_>) -> Result<String> {
        ensure_text(subject.content)?;

        let meaningful_parent = subject
            .ancestors
            .iter()
            .map(|ancestor| normalize(&ancestor.label))
            .find(|fragment| !is_generic_label(fragment))
            .unwrap_or_default();
        let root = subject
            .ancestors
            .iter()
            .find(|ancestor| ancestor.is_boundary)
            .map(|ancestor| normalize(&ancestor.label))
            .unwrap_or_default();
        let own = self.own_fragment(subject);

        let mut segments: Vec<String> = Vec::with_capacity(3);
        for segment in [root, meaningful_parent, own] {
            if segment.is_empty() || segments.last() == Some(&segment) {
                continue;
            }
            segments.push(segment);
        }

        let name = segments.join(PATH_SEPARATOR_STR);
        log::trace!("hierarchical name for {:?}: {name}", subject.label);
        Ok(truncate_name(&name, self.max_name_len()))
    }
}

/// Whether a normalized label is a placeholder container name.
pub fn is_generic_label(fragment: &str) -> bool {
    fragment == FALLBACK_FRAGMENT || GENERIC_LABEL.is_match(fragment)
}

fn ensure_text(content: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(NamingError::invalid_text(
            "cannot derive a variable name from empty content",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn subject<'a>(
        content: &'a str,
        label: &'a str,
        ancestors: &'a [StructuralAncestor],
    ) -> NamingSubject<'a> {
        NamingSubject {
            content,
            label,
            ancestors,
        }
    }

    #[test]
    fn simple_mode_preserves_case() {
        let naming = SimpleNaming::default();
        let name = naming.compose(&subject("Sign Up", "Button label", &[])).unwrap();
        assert_eq!(name, "Sign_Up");
    }

    #[test]
    fn empty_content_is_invalid_text() {
        for naming in [
            strategy_for(NamingMode::Simple, NamingConfig::default()),
            strategy_for(NamingMode::Hierarchical, NamingConfig::default()),
        ] {
            let err = naming.compose(&subject("   ", "Title", &[])).unwrap_err();
            assert!(matches!(err, NamingError::InvalidText(_)));
        }
    }

    #[test]
    fn group_keys_follow_case_mode() {
        let simple = SimpleNaming::default();
        assert_ne!(simple.group_key("Sign up"), simple.group_key("Sign Up"));
        assert_eq!(simple.group_key("  Sign Up "), "Sign Up");

        let hierarchical = HierarchicalNaming::default();
        assert_eq!(
            hierarchical.group_key("Sign up"),
            hierarchical.group_key("Sign Up")
        );
    }

    #[test]
    fn hierarchical_uses_root_parent_and_label() {
        let ancestors = vec![
            StructuralAncestor::new("Frame 12", false),
            StructuralAncestor::new("Pricing Card", false),
            StructuralAncestor::new("Plan", true),
            StructuralAncestor::new("Page 1", false),
        ];
        let naming = HierarchicalNaming::default();
        let name = naming
            .compose(&subject("Pro plan", "Title", &ancestors))
            .unwrap();
        assert_eq!(name, "plan/pricing_card/title_pro_plan");
    }

    #[test]
    fn hierarchical_skips_repeated_segments() {
        let ancestors = vec![
            StructuralAncestor::new("Group 3", false),
            StructuralAncestor::new("Button", true),
        ];
        let naming = HierarchicalNaming::default();
        let name = naming
            .compose(&subject("Submit", "Submit", &ancestors))
            .unwrap();
        assert_eq!(name, "button/submit");
    }

    #[test]
    fn hierarchical_without_context_falls_back_to_content() {
        let naming = HierarchicalNaming::default();
        let ancestors = vec![StructuralAncestor::new("Frame", false)];
        let name = naming.compose(&subject("Hello World", "", &ancestors)).unwrap();
        assert_eq!(name, "hello_world");
    }

    #[test]
    fn identical_structure_different_content_stays_unique() {
        let ancestors = vec![StructuralAncestor::new("Card", true)];
        let naming = HierarchicalNaming::default();
        let a = naming.compose(&subject("Monthly", "Label", &ancestors)).unwrap();
        let b = naming.compose(&subject("Yearly", "Label", &ancestors)).unwrap();
        assert_ne!(a, b);
        assert_eq!(a, "card/label_monthly");
    }

    #[test]
    fn hierarchical_names_respect_budget() {
        let ancestors = vec![
            StructuralAncestor::new("Checkout summary panel", false),
            StructuralAncestor::new("Order confirmation component", true),
        ];
        let naming = HierarchicalNaming::default();
        let name = naming
            .compose(&subject(
                "Your order has shipped",
                "Status message",
                &ancestors,
            ))
            .unwrap();
        assert!(name.chars().count() <= 50, "{name}");
        assert!(name.ends_with("/status_message_your_order_has_shipped"), "{name}");
    }

    #[test]
    fn generic_labels_are_detected() {
        for label in ["frame", "frame_12", "group3", "rectangle", "var_42", "layer_1"] {
            assert!(is_generic_label(label), "{label}");
        }
        for label in ["pricing_card", "framework", "header", "text_block"] {
            assert!(!is_generic_label(label), "{label}");
        }
    }
}
