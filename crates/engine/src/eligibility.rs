use crate::port::{NodeKind, NodeSnapshot};
use serde::Serialize;
use std::fmt;
use textvar_protocol::BindingKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EligibilityRules {
    /// Ceiling on trimmed content length, in chars
    pub max_text_len: usize,
}

impl Default for EligibilityRules {
    fn default() -> Self {
        Self {
            max_text_len: 5_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Ineligible {
    NotText,
    Removed,
    AlreadyBound,
    Locked,
    Hidden,
    HiddenAncestor,
    EmptyText,
    TooLong,
    InspectionFailed,
}

impl Ineligible {
    pub const fn describe(self) -> &'static str {
        match self {
            Ineligible::NotText => "node is not a text node",
            Ineligible::Removed => "node was removed",
            Ineligible::AlreadyBound => "node is already bound to a variable",
            Ineligible::Locked => "node is locked",
            Ineligible::Hidden => "node is hidden",
            Ineligible::HiddenAncestor => "node is inside a hidden layer",
            Ineligible::EmptyText => "node has no text",
            Ineligible::TooLong => "text exceeds the length ceiling",
            Ineligible::InspectionFailed => "node could not be inspected",
        }
    }
}

impl fmt::Display for Ineligible {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    Ineligible(Ineligible),
}

impl Eligibility {
    pub fn is_eligible(self) -> bool {
        matches!(self, Eligibility::Eligible)
    }
}

/// Classify a node against the current document state.
pub fn classify(node: &NodeSnapshot, rules: &EligibilityRules) -> Eligibility {
    if node.kind != NodeKind::Text {
        return Eligibility::Ineligible(Ineligible::NotText);
    }
    if node.removed {
        return Eligibility::Ineligible(Ineligible::Removed);
    }
    if node.binding(BindingKind::Characters).is_some() {
        return Eligibility::Ineligible(Ineligible::AlreadyBound);
    }
    if node.locked {
        return Eligibility::Ineligible(Ineligible::Locked);
    }
    if !node.visible {
        return Eligibility::Ineligible(Ineligible::Hidden);
    }
    if node.has_hidden_ancestor() {
        return Eligibility::Ineligible(Ineligible::HiddenAncestor);
    }
    let Some(text) = node.characters.as_deref().map(str::trim) else {
        return Eligibility::Ineligible(Ineligible::EmptyText);
    };
    if text.is_empty() {
        return Eligibility::Ineligible(Ineligible::EmptyText);
    }
    if text.chars().count() > rules.max_text_len {
        return Eligibility::Ineligible(Ineligible::TooLong);
    }
    Eligibility::Eligible
}

pub fn is_eligible(node: &NodeSnapshot, rules: &EligibilityRules) -> bool {
    classify(node, rules).is_eligible()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::AncestorSnapshot;
    use std::collections::BTreeMap;

    fn text_node(content: &str) -> NodeSnapshot {
        NodeSnapshot {
            id: "1:1".to_string(),
            name: "Label".to_string(),
            kind: NodeKind::Text,
            visible: true,
            locked: false,
            removed: false,
            characters: Some(content.to_string()),
            bindings: BTreeMap::new(),
            ancestors: Vec::new(),
        }
    }

    #[test]
    fn plain_visible_text_is_eligible() {
        assert!(is_eligible(&text_node("Sign Up"), &EligibilityRules::default()));
    }

    #[test]
    fn excludes_state_based_cases() {
        let rules = EligibilityRules::default();

        let mut bound = text_node("Hi");
        bound
            .bindings
            .insert(BindingKind::Characters, "VariableID:1".to_string());
        assert_eq!(
            classify(&bound, &rules),
            Eligibility::Ineligible(Ineligible::AlreadyBound)
        );

        let mut locked = text_node("Hi");
        locked.locked = true;
        assert_eq!(
            classify(&locked, &rules),
            Eligibility::Ineligible(Ineligible::Locked)
        );

        let mut hidden = text_node("Hi");
        hidden.visible = false;
        assert_eq!(
            classify(&hidden, &rules),
            Eligibility::Ineligible(Ineligible::Hidden)
        );

        let mut nested = text_node("Hi");
        nested.ancestors.push(AncestorSnapshot {
            id: "0:9".to_string(),
            name: "Drafts".to_string(),
            kind: NodeKind::Frame,
            visible: false,
        });
        assert_eq!(
            classify(&nested, &rules),
            Eligibility::Ineligible(Ineligible::HiddenAncestor)
        );

        let mut frame = text_node("Hi");
        frame.kind = NodeKind::Frame;
        assert_eq!(
            classify(&frame, &rules),
            Eligibility::Ineligible(Ineligible::NotText)
        );
    }

    #[test]
    fn other_property_bindings_do_not_block() {
        let mut node = text_node("Hi");
        node.bindings
            .insert(BindingKind::FontSize, "VariableID:2".to_string());
        assert!(is_eligible(&node, &EligibilityRules::default()));
    }

    #[test]
    fn excludes_empty_and_oversized_text() {
        let rules = EligibilityRules { max_text_len: 5 };
        assert_eq!(
            classify(&text_node("   "), &rules),
            Eligibility::Ineligible(Ineligible::EmptyText)
        );
        assert_eq!(
            classify(&text_node("  hello  "), &rules),
            Eligibility::Eligible
        );
        assert_eq!(
            classify(&text_node("hello!"), &rules),
            Eligibility::Ineligible(Ineligible::TooLong)
        );
    }
}
