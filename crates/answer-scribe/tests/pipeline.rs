//! End-to-end capture over recorded pages: settle, citations, references,
//! extraction, assembly and emission.

use answer_scribe::{
    capture_answer, persist, CaptureConfig, DocxEmitter, ExtractedElement, JsonEmitter,
    LocatorTable, ReplayPage, ResolveStop, Role, Termination,
};

fn locators() -> LocatorTable {
    let mut t = LocatorTable::empty();
    t.set(Role::ContentBlock, ["div.answer"]);
    t.set(Role::ImageContainer, ["div.img"]);
    t.set(Role::ImageCaption, ["div.caption"]);
    t.set(Role::ReferenceScroller, ["div.scroller"]);
    t.set(Role::ReferenceBlock, ["div.ref"]);
    t.set(Role::ReferenceIndex, ["div.idx"]);
    t.set(Role::ReferenceTitle, ["div.title p"]);
    t.set(Role::ReferenceAuthor, ["div.author"]);
    t.set(Role::ReferenceDate, ["div.date"]);
    t.set(Role::ReferenceJournal, ["span.journal"]);
    t
}

const ANSWER_PAGE: &str = r#"
<main>
  <div class="answer">
    <p>Claim one [1] and three [3].</p>
    <p>Again [1].</p>
    <ul><li>Claim one [1] and three [3].</li><li>Point</li></ul>
    <div class="img"><img src="https://cdn.example/fig.png" alt="Diagram"></div>
  </div>
  <div class="answer"><p>Again [1].</p></div>
</main>
<div class="scroller">
  <div class="ref">
    <div class="idx">3.</div>
    <div class="title"><p>Third Paper</p></div>
    <div class="author">Ada Lovelace</div>
    <div class="date">2020</div>
    <span class="journal">Computing</span>
  </div>
</div>
"#;

#[tokio::test]
async fn test_capture_recorded_answer() {
    let page = ReplayPage::single(ANSWER_PAGE);
    let capture = capture_answer(&page, &locators(), "Explain things", &CaptureConfig::immediate())
        .await;

    assert_eq!(capture.termination, Termination::Stabilized);
    assert!(capture.reloaded);
    assert_eq!(page.reloads(), 1);

    assert_eq!(capture.citations.iter().collect::<Vec<_>>(), [1, 3]);
    assert_eq!(capture.resolve_stop, ResolveStop::AttemptsExhausted);
    assert_eq!(capture.unresolved(), [1]);

    let doc = &capture.document;
    assert_eq!(doc.heading, "Explain things");
    assert_eq!(
        doc.body,
        [
            ExtractedElement::Paragraph {
                text: "Claim one [1] and three [3].".into()
            },
            ExtractedElement::Paragraph {
                text: "Again [1].".into()
            },
            ExtractedElement::ListBlock {
                items: vec!["Point".into()]
            },
            ExtractedElement::ImageRef(answer_scribe::ImageRef {
                url: "https://cdn.example/fig.png".into(),
                caption: "Diagram".into(),
                source: String::new(),
            }),
        ]
    );
    assert_eq!(capture.blocks_seen, 2);
    assert_eq!(capture.duplicates_skipped, 2);

    let lines: Vec<String> = doc.references.iter().map(|r| r.render()).collect();
    assert_eq!(lines, ["[3] Ada Lovelace. 2020. Third Paper. Computing."]);
}

#[tokio::test]
async fn test_page_without_answer() {
    let page = ReplayPage::single("<main><p>Loading…</p></main>");
    let capture = capture_answer(&page, &locators(), "q", &CaptureConfig::immediate()).await;

    assert!(capture.citations.is_empty());
    assert_eq!(capture.resolve_stop, ResolveStop::Complete);
    assert!(capture.document.is_empty());
    // Nothing was cited, so the reference list is never scrolled.
    assert_eq!(page.scrolls(), 1);
}

#[tokio::test]
async fn test_capture_emits_both_formats() {
    let page = ReplayPage::single(ANSWER_PAGE);
    let capture = capture_answer(&page, &locators(), "Explain", &CaptureConfig::immediate()).await;
    let dir = tempfile::tempdir().unwrap();

    let docx = persist(&DocxEmitter, &capture.document, dir.path(), "answer").unwrap();
    let json = persist(&JsonEmitter, &capture.document, dir.path(), "answer").unwrap();
    assert_ne!(docx, json);

    assert_eq!(&std::fs::read(&docx).unwrap()[..2], b"PK");
    let value: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&json).unwrap()).unwrap();
    assert_eq!(value["references"][0]["number"], 3);
    assert_eq!(value["references"].as_array().unwrap().len(), 1);
}
