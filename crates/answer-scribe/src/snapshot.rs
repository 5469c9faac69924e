//! Snapshot collector: combined markup of every matched content block.

use crate::locators::{LocatorTable, Role};
use crate::page::{union_all, LivePage};
use crate::types::{ScribeError, ScribeResult, Snapshot};

/// Concatenate the outer HTML of all content blocks currently on the page.
///
/// Variants that fail to query are skipped. If any matched element cannot be
/// serialized the whole sample fails: a partial snapshot would look like a
/// length change to the poller.
pub async fn collect_snapshot(
    page: &dyn LivePage,
    locators: &LocatorTable,
) -> ScribeResult<Snapshot> {
    let blocks = union_all(page, locators, Role::ContentBlock).await?;
    let mut markup = String::new();
    for block in &blocks {
        match block.outer_html().await {
            Ok(Some(html)) => markup.push_str(&html),
            Ok(None) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                return Err(ScribeError::Page(format!(
                    "failed to serialize content block: {e}"
                )))
            }
        }
    }
    tracing::debug!(
        "snapshot: {} content block(s), {} bytes",
        blocks.len(),
        markup.len()
    );
    Ok(Snapshot::new(markup))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::ReplayPage;

    #[tokio::test]
    async fn test_snapshot_concatenates_in_variant_order() {
        let mut locators = LocatorTable::empty();
        locators.set(Role::ContentBlock, ["div.b", "div.a"]);
        let page = ReplayPage::single(r#"<div class="a">A</div><div class="b">B</div>"#);

        let snap = collect_snapshot(&page, &locators).await.unwrap();
        assert_eq!(
            snap.as_str(),
            r#"<div class="b">B</div><div class="a">A</div>"#
        );
    }

    #[tokio::test]
    async fn test_overlapping_variants_repeat_markup() {
        let mut locators = LocatorTable::empty();
        locators.set(Role::ContentBlock, ["div.a", "div"]);
        let page = ReplayPage::single(r#"<div class="a">A</div>"#);

        let snap = collect_snapshot(&page, &locators).await.unwrap();
        assert_eq!(snap.len(), 2 * r#"<div class="a">A</div>"#.len());
    }

    #[tokio::test]
    async fn test_no_blocks_gives_empty_snapshot() {
        let page = ReplayPage::single("<p>nothing here</p>");
        let snap = collect_snapshot(&page, &LocatorTable::bohrium())
            .await
            .unwrap();
        assert!(snap.is_empty());
    }
}
