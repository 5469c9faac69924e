//! Structured extractor: turn the final snapshot into typed, deduplicated
//! content elements.
//!
//! Content-block variants are unioned, so the same markup is often visited
//! more than once. A single dedup set shared by paragraphs, list items and
//! image URLs absorbs those repeats. Tables are never deduplicated.

use crate::locators::{LocatorTable, Role};
use crate::types::{ExtractedElement, ImageRef};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::debug;

/// Whitespace-collapsed, trimmed text of an element. Descendants hidden by
/// an inline style contribute nothing.
pub fn element_text(el: &ElementRef<'_>) -> String {
    let mut raw = String::new();
    push_visible_text(el, &mut raw);
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn push_visible_text(el: &ElementRef<'_>, out: &mut String) {
    for node in el.children() {
        if let Some(text) = node.value().as_text() {
            out.push_str(text);
        } else if let Some(child) = ElementRef::wrap(node) {
            if !is_hidden(&child) {
                push_visible_text(&child, out);
            }
        }
    }
}

/// An inline style hides the element.
pub fn is_hidden(el: &ElementRef<'_>) -> bool {
    let Some(style) = el.value().attr("style") else {
        return false;
    };
    let style = style
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    style.contains("display:none") || style.contains("visibility:hidden")
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Identity {
    Text(String),
    Image(String),
}

/// Content identities already emitted during one extraction run.
#[derive(Debug, Default)]
struct DedupSet {
    seen: HashSet<Identity>,
    suppressed: usize,
}

impl DedupSet {
    /// Returns `true` the first time an identity is offered.
    fn admit(&mut self, identity: Identity) -> bool {
        if self.seen.insert(identity) {
            true
        } else {
            self.suppressed += 1;
            false
        }
    }
}

/// Output of one extraction pass.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub elements: Vec<ExtractedElement>,
    /// Content blocks visited, counting repeats across variants.
    pub blocks_seen: usize,
    /// Paragraphs, list items and images dropped as duplicates.
    pub duplicates_skipped: usize,
}

/// Compiled selectors for one extraction configuration.
pub struct Extractor {
    blocks: Vec<Selector>,
    image_containers: Vec<Selector>,
    captions: Vec<Selector>,
    img: Selector,
    em: Selector,
    rows: Selector,
}

impl Extractor {
    pub fn new(locators: &LocatorTable) -> Self {
        Self {
            blocks: locators.compile(Role::ContentBlock),
            image_containers: locators.compile(Role::ImageContainer),
            captions: locators.compile(Role::ImageCaption),
            img: Selector::parse("img").unwrap(),
            em: Selector::parse("em").unwrap(),
            rows: Selector::parse("tr").unwrap(),
        }
    }

    /// Extract every content block of `markup` in document order.
    pub fn extract(&self, markup: &str) -> Extraction {
        let document = Html::parse_fragment(markup);
        let mut run = Run::default();

        let mut total = 0;
        for selector in &self.blocks {
            for block in document.select(selector) {
                total += 1;
                let before = run.elements.len();
                self.walk_block(block, &mut run);
                debug!(
                    "content block {total}: {} element(s)",
                    run.elements.len() - before
                );
            }
        }

        debug!(
            "extracted {} element(s) from {total} block(s), {} duplicate(s) skipped",
            run.elements.len(),
            run.dedup.suppressed
        );
        Extraction {
            elements: run.elements,
            blocks_seen: total,
            duplicates_skipped: run.dedup.suppressed,
        }
    }

    fn is_image_container(&self, el: &ElementRef<'_>) -> bool {
        self.image_containers.iter().any(|s| s.matches(el))
    }

    fn is_structural(&self, el: &ElementRef<'_>) -> bool {
        matches!(el.value().name(), "p" | "ul" | "ol" | "table" | "img")
            || self.is_image_container(el)
    }

    /// A visible paragraph, list, table or image somewhere below `el`.
    fn has_structure(&self, el: &ElementRef<'_>) -> bool {
        el.children()
            .filter_map(ElementRef::wrap)
            .filter(|c| !is_hidden(c))
            .any(|c| self.is_structural(&c) || self.has_structure(&c))
    }

    fn walk_block(&self, block: ElementRef<'_>, run: &mut Run) {
        if is_hidden(&block) {
            return;
        }
        let children: Vec<ElementRef<'_>> = block.children().filter_map(ElementRef::wrap).collect();

        if !self.has_structure(&block) {
            // Plain-text block.
            run.paragraph(element_text(&block));
            return;
        }

        let mut i = 0;
        while i < children.len() {
            let child = children[i];
            i += 1;
            if is_hidden(&child) {
                continue;
            }
            match child.value().name() {
                "p" => {
                    run.paragraph(element_text(&child));
                    for selector in &self.image_containers {
                        for container in child.select(selector) {
                            self.emit_images(container, run);
                        }
                    }
                    if let Some(next) = children.get(i) {
                        if self.is_image_container(next) && !is_hidden(next) {
                            self.emit_images(*next, run);
                            i += 1;
                        }
                    }
                }
                "ul" | "ol" => {
                    let items: Vec<String> = child
                        .children()
                        .filter_map(ElementRef::wrap)
                        .filter(|li| li.value().name() == "li" && !is_hidden(li))
                        .map(|li| element_text(&li))
                        .filter(|text| !text.is_empty())
                        .filter(|text| run.dedup.admit(Identity::Text(text.clone())))
                        .collect();
                    if !items.is_empty() {
                        run.elements.push(ExtractedElement::ListBlock { items });
                    }
                }
                "table" => {
                    let rows = self.table_rows(child);
                    if !rows.is_empty() {
                        run.elements.push(ExtractedElement::Table { rows });
                    }
                }
                _ if self.is_image_container(&child) => self.emit_images(child, run),
                // Wrapper around deeper content.
                _ if self.has_structure(&child) => self.walk_block(child, run),
                _ => {}
            }
        }
    }

    fn table_rows(&self, table: ElementRef<'_>) -> Vec<Vec<String>> {
        table
            .select(&self.rows)
            .map(|tr| {
                tr.children()
                    .filter_map(ElementRef::wrap)
                    .filter(|cell| matches!(cell.value().name(), "td" | "th"))
                    .map(|cell| element_text(&cell))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    fn emit_images(&self, container: ElementRef<'_>, run: &mut Run) {
        for image in self.images_in(container) {
            if run.dedup.admit(Identity::Image(image.url.clone())) {
                run.elements.push(ExtractedElement::ImageRef(image));
            }
        }
    }

    /// Images of a container: its direct `<img>` children plus the first
    /// image of every nested container. Falls back to the first descendant
    /// image when neither exists.
    fn images_in(&self, container: ElementRef<'_>) -> Vec<ImageRef> {
        let mut found: Vec<ImageRef> = container
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|c| c.value().name() == "img")
            .filter_map(|img| self.image_ref(container, img))
            .collect();

        for selector in &self.image_containers {
            for nested in container.select(selector) {
                if let Some(img) = nested.select(&self.img).next() {
                    found.extend(self.image_ref(nested, img));
                }
            }
        }

        if found.is_empty() {
            if let Some(img) = container.select(&self.img).next() {
                found.extend(self.image_ref(container, img));
            }
        }
        found
    }

    fn image_ref(&self, container: ElementRef<'_>, img: ElementRef<'_>) -> Option<ImageRef> {
        let url = img.value().attr("src").unwrap_or("").trim().to_string();
        if url.is_empty() {
            return None;
        }

        let mut caption = self
            .captions
            .iter()
            .find_map(|s| container.select(s).next())
            .map(|c| element_text(&c))
            .unwrap_or_default();
        if caption.is_empty() {
            caption = img.value().attr("alt").unwrap_or("").trim().to_string();
        }

        let source = container
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .find(|s| s.value().name() == "em")
            .or_else(|| {
                container
                    .parent()
                    .and_then(ElementRef::wrap)
                    .and_then(|p| p.select(&self.em).next())
            })
            .map(|em| element_text(&em))
            .unwrap_or_default();

        Some(ImageRef {
            url,
            caption,
            source,
        })
    }
}

#[derive(Default)]
struct Run {
    elements: Vec<ExtractedElement>,
    dedup: DedupSet,
}

impl Run {
    fn paragraph(&mut self, text: String) {
        if !text.is_empty() && self.dedup.admit(Identity::Text(text.clone())) {
            self.elements.push(ExtractedElement::Paragraph { text });
        }
    }
}
