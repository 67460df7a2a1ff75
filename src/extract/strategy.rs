//! Declarative field lookups
//!
//! A field is described by the column it fills and an ordered list of lookup
//! strategies. Strategies are tried in order against a parsed detail page and
//! the first non-empty match wins.

use crate::browser::Locator;
use crate::extract::page::{normalize_text, DetailPage};
use crate::model::Column;
use scraper::{ElementRef, Selector};
use serde::{Deserialize, Serialize};

/// One way of locating a field's value on a detail page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum LookupStrategy {
    /// Text of the first element matching a CSS selector
    Selector { selector: String },

    /// Text of the first following sibling of a labelled element
    ///
    /// The label element is a `label_tag` whose own text contains `label`;
    /// the value is the first later sibling named `value_tag` (optionally
    /// carrying `value_class`) with non-empty text.
    #[serde(rename_all = "kebab-case")]
    LabelSibling {
        label_tag: String,
        label: String,
        value_tag: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value_class: Option<String>,
    },
}

impl LookupStrategy {
    /// Table-cell lookup: `<td>label</td><td>value</td>`
    pub fn cell(label: &str) -> Self {
        Self::LabelSibling {
            label_tag: "td".to_string(),
            label: label.to_string(),
            value_tag: "td".to_string(),
            value_class: None,
        }
    }

    /// Applies the strategy to a page, returning the matched text
    pub fn apply(&self, page: &DetailPage) -> Option<String> {
        match self {
            Self::Selector { selector } => {
                let selector = Selector::parse(selector).ok()?;
                page.document()
                    .select(&selector)
                    .map(|element| normalize_text(element.text()))
                    .find(|text| !text.is_empty())
            }
            Self::LabelSibling {
                label_tag,
                label,
                value_tag,
                value_class,
            } => {
                let label_selector = Selector::parse(label_tag).ok()?;
                page.document()
                    .select(&label_selector)
                    .filter(|element| own_text(element).contains(label.as_str()))
                    .find_map(|element| sibling_value(&element, value_tag, value_class.as_deref()))
            }
        }
    }

    /// Short description for log lines
    pub fn describe(&self) -> String {
        match self {
            Self::Selector { selector } => format!("selector `{}`", selector),
            Self::LabelSibling {
                label_tag,
                label,
                value_tag,
                ..
            } => format!("{} `{}` -> {}", label_tag, label, value_tag),
        }
    }
}

/// Concatenated direct text children of an element
fn own_text(element: &ElementRef<'_>) -> String {
    element
        .children()
        .filter_map(|child| child.value().as_text().map(|text| &**text))
        .collect()
}

fn sibling_value(
    label: &ElementRef<'_>,
    value_tag: &str,
    value_class: Option<&str>,
) -> Option<String> {
    label
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .filter(|sibling| sibling.value().name() == value_tag)
        .filter(|sibling| match value_class {
            Some(class) => sibling.value().classes().any(|c| c == class),
            None => true,
        })
        .map(|sibling| normalize_text(sibling.text()))
        .find(|text| !text.is_empty())
}

/// Extraction recipe for one column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub column: Column,

    /// Control that must be clicked before the field is visible
    ///
    /// Attempted once per page; a missing trigger means the section is
    /// already expanded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expand: Option<Locator>,

    /// Lookups tried in order
    pub strategies: Vec<LookupStrategy>,
}

impl FieldSpec {
    pub fn new(column: Column, strategies: Vec<LookupStrategy>) -> Self {
        Self {
            column,
            expand: None,
            strategies,
        }
    }

    /// Requires an expand trigger before the lookups run
    pub fn expanding(mut self, trigger: Locator) -> Self {
        self.expand = Some(trigger);
        self
    }
}
