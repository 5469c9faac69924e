//! Offline runs over markup shaped like the Bohrium answer page, using the
//! built-in locator table.

use answer_scribe::{ExtractedElement, LocatorTable, Role};
use scribe_runtime::cli::output::{OutputFormat, OutputOptions};
use scribe_runtime::cli::replay_cmd;

const PAGE: &str = r#"
<div class="_content_1k32x_12">
  <p>Transformers [1] changed NLP; convolution [2] still matters.</p>
  <div class="_img_1k32x_74">
    <img src="https://cdn.example/attention.png" alt="attention">
    <div class="_img-title_1k32x_79">Figure 1. Attention map</div>
  </div>
  <em>Vaswani et al.</em>
  <ul><li>Self-attention</li><li>Positional encoding</li></ul>
  <table><tr><th>Model</th><th>Year</th></tr><tr><td>Transformer</td><td>2017</td></tr></table>
</div>
<div class="_virtuoso_6r4i1_26">
  <div data-testid="virtuoso-item-list">
    <div data-index="0">
      <div class="_container_q86iu_1">
        <div class="_index_q86iu_12">1</div>
        <div class="_title-paragraph_1doxh_4"><p>Attention Is All You Need</p></div>
        <div class="_author_name_1fn6n_38">A. Vaswani</div>
        <div class="_author_name_1fn6n_38">N. Shazeer</div>
        <div class="_journal-date_q86iu_51">2017</div>
        <span class="_name_niu8h_11">NeurIPS</span>
      </div>
    </div>
  </div>
</div>
"#;

fn output(dir: &std::path::Path, format: OutputFormat) -> OutputOptions {
    OutputOptions {
        format,
        dir: dir.to_path_buf(),
        prefix: "bohrium_ai_response".into(),
    }
}

#[tokio::test]
async fn test_bohrium_page_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let html = dir.path().join("page.html");
    std::fs::write(&html, PAGE).unwrap();

    let (capture, saved) = replay_cmd::run(
        &[html],
        "How did transformers change NLP?",
        &LocatorTable::bohrium(),
        &output(dir.path(), OutputFormat::Json),
    )
    .await
    .unwrap();

    assert_eq!(capture.citations.iter().collect::<Vec<_>>(), [1, 2]);
    let lines: Vec<String> = capture
        .document
        .references
        .iter()
        .map(|r| r.render())
        .collect();
    assert_eq!(
        lines,
        ["[1] A. Vaswani, N. Shazeer. 2017. Attention Is All You Need. NeurIPS."]
    );
    assert_eq!(capture.unresolved(), [2]);

    // Reference rows are content-block variants too; the title paragraph
    // nested in the row is picked up once, after the answer block.
    let body = &capture.document.body;
    assert_eq!(body.len(), 5);
    assert!(matches!(&body[0], ExtractedElement::Paragraph { text } if text.starts_with("Transformers [1]")));
    match &body[1] {
        ExtractedElement::ImageRef(img) => {
            assert_eq!(img.caption, "Figure 1. Attention map");
            assert_eq!(img.source, "Vaswani et al.");
        }
        other => panic!("expected an image, got {other:?}"),
    }
    assert!(matches!(&body[2], ExtractedElement::ListBlock { items } if items.len() == 2));
    assert!(matches!(&body[3], ExtractedElement::Table { rows } if rows.len() == 2));
    assert_eq!(
        body[4],
        ExtractedElement::Paragraph {
            text: "Attention Is All You Need".into()
        }
    );

    let saved = saved.expect("document saved");
    let name = saved.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("bohrium_ai_response_"));
    assert!(name.ends_with(".json"));
}

#[tokio::test]
async fn test_locator_override_file() {
    let dir = tempfile::tempdir().unwrap();
    let html = dir.path().join("page.html");
    std::fs::write(&html, r#"<section class="answer-v2"><p>Moved markup</p></section>"#).unwrap();
    let overrides = dir.path().join("locators.json");
    std::fs::write(&overrides, r#"{ "content_block": "section.answer-v2" }"#).unwrap();

    let locators = LocatorTable::load_overrides(&overrides).unwrap();
    assert_eq!(locators.variants(Role::ContentBlock), ["section.answer-v2"]);
    assert_eq!(locators.variants(Role::PromptInput), ["textarea"]);

    let (capture, saved) = replay_cmd::run(
        &[html],
        "q",
        &locators,
        &output(&dir.path().join("out"), OutputFormat::Docx),
    )
    .await
    .unwrap();
    assert_eq!(
        capture.document.body,
        [ExtractedElement::Paragraph {
            text: "Moved markup".into()
        }]
    );
    assert!(saved.is_some());
}
