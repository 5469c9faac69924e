//! Locator table: logical element roles mapped to ordered selector variants.
//!
//! Page markup differs slightly between deployments, so every role carries
//! one or more CSS selectors. Single-element lookups take the first variant
//! that matches; multi-element lookups union all variants in declared order.

use crate::types::{ScribeError, ScribeResult};
use scraper::Selector;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Logical element roles the pipeline looks up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Interstitial login overlay.
    Modal,
    /// Close button inside the overlay.
    ModalClose,
    PromptInput,
    SubmitButton,
    /// Container holding one part of the rendered answer.
    ContentBlock,
    ImageContainer,
    ImageCaption,
    /// Dedicated scroll container of the virtualized reference list.
    ReferenceScroller,
    /// One rendered row of the reference list.
    ReferenceBlock,
    ReferenceIndex,
    ReferenceTitle,
    ReferenceAuthor,
    ReferenceJournal,
    ReferenceDate,
    /// Shown while the page hydrates after a reload. Optional.
    LoadingIndicator,
}

impl Role {
    pub const ALL: [Role; 15] = [
        Role::Modal,
        Role::ModalClose,
        Role::PromptInput,
        Role::SubmitButton,
        Role::ContentBlock,
        Role::ImageContainer,
        Role::ImageCaption,
        Role::ReferenceScroller,
        Role::ReferenceBlock,
        Role::ReferenceIndex,
        Role::ReferenceTitle,
        Role::ReferenceAuthor,
        Role::ReferenceJournal,
        Role::ReferenceDate,
        Role::LoadingIndicator,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Modal => "modal",
            Role::ModalClose => "modal_close",
            Role::PromptInput => "prompt_input",
            Role::SubmitButton => "submit_button",
            Role::ContentBlock => "content_block",
            Role::ImageContainer => "image_container",
            Role::ImageCaption => "image_caption",
            Role::ReferenceScroller => "reference_scroller",
            Role::ReferenceBlock => "reference_block",
            Role::ReferenceIndex => "reference_index",
            Role::ReferenceTitle => "reference_title",
            Role::ReferenceAuthor => "reference_author",
            Role::ReferenceJournal => "reference_journal",
            Role::ReferenceDate => "reference_date",
            Role::LoadingIndicator => "loading_indicator",
        }
    }
}

/// Role → selector variants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocatorTable {
    roles: BTreeMap<Role, Vec<String>>,
}

impl LocatorTable {
    /// An empty table; every role resolves to no variants.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Selectors for the Bohrium answer page.
    pub fn bohrium() -> Self {
        let mut t = Self::empty();
        t.set(Role::Modal, ["div._modal_7bdw1_1"]);
        t.set(Role::ModalClose, ["div._close_7bdw1_31"]);
        t.set(Role::PromptInput, ["textarea"]);
        t.set(
            Role::SubmitButton,
            ["button[type='submit'][class*='_buttons-send-wrapper_']"],
        );
        t.set(
            Role::ContentBlock,
            [
                "div._content_1k32x_12",
                "div._container_q86iu_1",
                "div[data-testid='virtuoso-item-list'] > div",
                "div._content_6r4i1_29 div._container_q86iu_1",
            ],
        );
        t.set(Role::ImageContainer, ["div._img_1k32x_74"]);
        t.set(Role::ImageCaption, ["div._img-title_1k32x_79"]);
        t.set(Role::ReferenceScroller, ["div._virtuoso_6r4i1_26"]);
        t.set(
            Role::ReferenceBlock,
            [
                "div[data-index] div._container_q86iu_1",
                "div[data-item-index] div._container_q86iu_1",
                "div._container_q86iu_1",
                "div[data-testid='virtuoso-item-list'] > div",
                "div._content_6r4i1_29 div._container_q86iu_1",
            ],
        );
        t.set(Role::ReferenceIndex, ["div._index_q86iu_12"]);
        t.set(Role::ReferenceTitle, ["div._title-paragraph_1doxh_4 p"]);
        t.set(Role::ReferenceAuthor, ["div._author_name_1fn6n_38"]);
        t.set(Role::ReferenceJournal, ["span._name_niu8h_11"]);
        t.set(Role::ReferenceDate, ["div._journal-date_q86iu_51"]);
        t
    }

    /// Replace the variants of one role.
    pub fn set<I, S>(&mut self, role: Role, variants: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let variants: Vec<String> = variants.into_iter().map(Into::into).collect();
        if variants.is_empty() {
            self.roles.remove(&role);
        } else {
            self.roles.insert(role, variants);
        }
    }

    /// Variants of a role, in the order they should be tried.
    pub fn variants(&self, role: Role) -> &[String] {
        self.roles.get(&role).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has(&self, role: Role) -> bool {
        !self.variants(role).is_empty()
    }

    /// Overlay every role present in `other` onto this table.
    pub fn merge(&mut self, other: LocatorTable) {
        for (role, variants) in other.roles {
            self.set(role, variants);
        }
    }

    /// Parse a JSON object of `role -> [selector, ...]` (a bare string is
    /// accepted for single-variant roles).
    pub fn from_json_str(json: &str) -> ScribeResult<Self> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Variants {
            One(String),
            Many(Vec<String>),
        }

        let raw: BTreeMap<Role, Variants> = serde_json::from_str(json)
            .map_err(|e| ScribeError::Config(format!("invalid locator file: {e}")))?;
        let mut table = Self::empty();
        for (role, v) in raw {
            match v {
                Variants::One(s) => table.set(role, [s]),
                Variants::Many(list) => table.set(role, list),
            }
        }
        Ok(table)
    }

    /// Built-in table with the roles from a JSON override file applied on top.
    pub fn load_overrides(path: &Path) -> ScribeResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            ScribeError::Config(format!("cannot read locator file {}: {e}", path.display()))
        })?;
        let mut table = Self::bohrium();
        table.merge(Self::from_json_str(&json)?);
        Ok(table)
    }

    /// Check that every selector parses. Returns one error per bad selector.
    pub fn validate(&self) -> Vec<ScribeError> {
        let mut errors = Vec::new();
        for (role, variants) in &self.roles {
            for selector in variants {
                if let Err(e) = Selector::parse(selector) {
                    errors.push(ScribeError::Selector {
                        selector: selector.clone(),
                        reason: format!("{} ({e:?})", role.as_str()),
                    });
                }
            }
        }
        errors
    }

    /// Compile the variants of a role for offline matching, skipping (and
    /// logging) any that fail to parse.
    pub fn compile(&self, role: Role) -> Vec<Selector> {
        self.variants(role)
            .iter()
            .filter_map(|s| match Selector::parse(s) {
                Ok(sel) => Some(sel),
                Err(e) => {
                    tracing::warn!("Skipping unparsable {} selector `{s}`: {e:?}", role.as_str());
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bohrium_table_is_valid() {
        let table = LocatorTable::bohrium();
        assert!(table.validate().is_empty());
        assert_eq!(table.variants(Role::ContentBlock).len(), 4);
        assert_eq!(table.variants(Role::ReferenceBlock).len(), 5);
        assert!(!table.has(Role::LoadingIndicator));
    }

    #[test]
    fn test_variants_keep_declared_order() {
        let table = LocatorTable::bohrium();
        let blocks = table.variants(Role::ContentBlock);
        assert_eq!(blocks[0], "div._content_1k32x_12");
        assert_eq!(blocks[3], "div._content_6r4i1_29 div._container_q86iu_1");
    }

    #[test]
    fn test_json_overrides_single_roles() {
        let json = r#"{
            "loading_indicator": "div.spinner",
            "content_block": ["article.answer", "section.answer"]
        }"#;
        let mut table = LocatorTable::bohrium();
        table.merge(LocatorTable::from_json_str(json).unwrap());

        assert_eq!(table.variants(Role::LoadingIndicator), ["div.spinner"]);
        assert_eq!(
            table.variants(Role::ContentBlock),
            ["article.answer", "section.answer"]
        );
        // Untouched roles survive the merge.
        assert_eq!(table.variants(Role::PromptInput), ["textarea"]);
    }

    #[test]
    fn test_unknown_role_rejected() {
        let err = LocatorTable::from_json_str(r#"{"sidebar": "div"}"#).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_validate_reports_bad_selectors() {
        let mut table = LocatorTable::empty();
        table.set(Role::ContentBlock, ["div.ok", "div[[broken"]);
        let errors = table.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(table.compile(Role::ContentBlock).len(), 1);
    }

    #[test]
    fn test_load_overrides_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locators.json");
        std::fs::write(&path, r#"{"reference_scroller": ["div.refs"]}"#).unwrap();

        let table = LocatorTable::load_overrides(&path).unwrap();
        assert_eq!(table.variants(Role::ReferenceScroller), ["div.refs"]);
        assert_eq!(table.variants(Role::ImageContainer), ["div._img_1k32x_74"]);

        assert!(LocatorTable::load_overrides(&dir.path().join("missing.json")).is_err());
    }
}
