//! Document emitters: render a [`Document`] and persist it under a fresh,
//! timestamped filename.

use crate::document::{image_lines, table_width, Document, BULLET, REFERENCES_HEADING};
use crate::types::{ExtractedElement, ScribeError, ScribeResult};
use docx_rs::{
    BreakType, Docx, Paragraph, Run, Style, StyleType, Table, TableCell, TableRow,
};
use std::fs::OpenOptions;
use std::io::{Cursor, ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Filename prefix for saved answers.
pub const DEFAULT_PREFIX: &str = "bohrium_ai_response";

/// Attempts at reserving a fresh filename before giving up.
const RESERVE_ATTEMPTS: usize = 8;

/// Width of one table column in twentieths of a point.
const COLUMN_WIDTH: usize = 2000;

/// Serializes a document into one output format.
pub trait DocumentEmitter: Send + Sync {
    /// File extension without the dot.
    fn extension(&self) -> &'static str;

    /// Render the whole document into bytes.
    fn render(&self, doc: &Document) -> ScribeResult<Vec<u8>>;
}

/// Word document output.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocxEmitter;

impl DocxEmitter {
    fn text_paragraph(text: &str) -> Paragraph {
        Paragraph::new().add_run(Run::new().add_text(text))
    }

    fn heading(text: &str, style: &str) -> Paragraph {
        Self::text_paragraph(text).style(style)
    }

    /// One paragraph with a line break between each line.
    fn multiline(lines: &[String]) -> Paragraph {
        let mut run = Run::new();
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                run = run.add_break(BreakType::TextWrapping);
            }
            run = run.add_text(line);
        }
        Paragraph::new().add_run(run)
    }

    /// A grid exactly as wide as the widest row; short rows are padded.
    fn table(rows: &[Vec<String>]) -> Table {
        let width = table_width(rows);
        let rows = rows
            .iter()
            .map(|row| {
                let cells = (0..width)
                    .map(|c| {
                        let text = row.get(c).map(String::as_str).unwrap_or("");
                        TableCell::new().add_paragraph(Self::text_paragraph(text))
                    })
                    .collect();
                TableRow::new(cells)
            })
            .collect();
        Table::new(rows).set_grid(vec![COLUMN_WIDTH; width])
    }
}

impl DocumentEmitter for DocxEmitter {
    fn extension(&self) -> &'static str {
        "docx"
    }

    fn render(&self, doc: &Document) -> ScribeResult<Vec<u8>> {
        let mut docx = Docx::new()
            .add_style(
                Style::new("Heading1", StyleType::Paragraph)
                    .name("Heading 1")
                    .size(32)
                    .bold(),
            )
            .add_style(
                Style::new("Heading2", StyleType::Paragraph)
                    .name("Heading 2")
                    .size(28)
                    .bold(),
            )
            .add_paragraph(Self::heading(&doc.heading, "Heading1"));

        for element in &doc.body {
            docx = match element {
                ExtractedElement::Paragraph { text } => {
                    docx.add_paragraph(Self::text_paragraph(text))
                }
                ExtractedElement::ListBlock { items } => items.iter().fold(docx, |d, item| {
                    d.add_paragraph(Self::text_paragraph(&format!("{BULLET}{item}")))
                }),
                ExtractedElement::Table { rows } if table_width(rows) > 0 => {
                    docx.add_table(Self::table(rows))
                }
                ExtractedElement::Table { .. } => docx,
                ExtractedElement::ImageRef(img) => docx.add_paragraph(Self::multiline(
                    &image_lines(&img.url, &img.caption, &img.source),
                )),
            };
        }

        if !doc.references.is_empty() {
            docx = docx.add_paragraph(Self::heading(REFERENCES_HEADING, "Heading2"));
            for line in &doc.references {
                docx = docx.add_paragraph(Self::text_paragraph(&line.render()));
            }
        }

        let mut buf = Cursor::new(Vec::new());
        docx.build()
            .pack(&mut buf)
            .map_err(|e| ScribeError::Persist(format!("docx packaging failed: {e}")))?;
        Ok(buf.into_inner())
    }
}

/// Machine-readable output of the same model.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonEmitter;

impl DocumentEmitter for JsonEmitter {
    fn extension(&self) -> &'static str {
        "json"
    }

    fn render(&self, doc: &Document) -> ScribeResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(doc)?)
    }
}

/// `<prefix>_<YYYYMMDD_HHMMSS>_<6 hex>.<ext>`
pub fn output_filename(prefix: &str, extension: &str) -> String {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let tag = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}_{stamp}_{}.{extension}", &tag[..6])
}

/// Render `doc` and write it to a newly created file in `dir`.
///
/// The file is created with create-new semantics; a name that already
/// exists is retried with a fresh disambiguator.
pub fn persist(
    emitter: &dyn DocumentEmitter,
    doc: &Document,
    dir: &Path,
    prefix: &str,
) -> ScribeResult<PathBuf> {
    let bytes = emitter.render(doc)?;
    std::fs::create_dir_all(dir)?;

    for _ in 0..RESERVE_ATTEMPTS {
        let path = dir.join(output_filename(prefix, emitter.extension()));
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                tracing::debug!("{} exists, retrying", path.display());
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        if let Err(e) = file.write_all(&bytes).and_then(|_| file.sync_all()) {
            let _ = std::fs::remove_file(&path);
            return Err(ScribeError::Persist(format!(
                "writing {} failed: {e}",
                path.display()
            )));
        }
        return Ok(path);
    }

    Err(ScribeError::Persist(format!(
        "no free filename in {} after {RESERVE_ATTEMPTS} attempts",
        dir.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ReferenceLine;
    use crate::types::ImageRef;
    use std::collections::HashSet;

    fn sample() -> Document {
        Document {
            heading: "Explain X".into(),
            body: vec![
                ExtractedElement::Paragraph {
                    text: "Intro [1]".into(),
                },
                ExtractedElement::ListBlock {
                    items: vec!["a".into(), "b".into()],
                },
                ExtractedElement::Table {
                    rows: vec![
                        vec!["h1".into(), "h2".into()],
                        vec!["only one".into()],
                    ],
                },
                ExtractedElement::Table { rows: vec![] },
                ExtractedElement::ImageRef(ImageRef {
                    url: "https://x/i.png".into(),
                    caption: "Fig".into(),
                    source: String::new(),
                }),
            ],
            references: vec![ReferenceLine {
                number: 1,
                text: "Smith. 2020. Title.".into(),
            }],
        }
    }

    #[test]
    fn test_docx_is_a_zip_package() {
        let bytes = DocxEmitter.render(&sample()).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn test_json_carries_every_element() {
        let bytes = JsonEmitter.render(&sample()).unwrap();
        let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(v["heading"], "Explain X");
        assert_eq!(v["body"].as_array().unwrap().len(), 5);
        assert_eq!(v["body"][1]["type"], "list_block");
        assert_eq!(v["body"][4]["type"], "image_ref");
        assert_eq!(v["references"][0]["number"], 1);
    }

    #[test]
    fn test_filename_shape() {
        let name = output_filename(DEFAULT_PREFIX, "docx");
        let re = regex::Regex::new(r"^bohrium_ai_response_\d{8}_\d{6}_[0-9a-f]{6}\.docx$").unwrap();
        assert!(re.is_match(&name), "{name}");
    }

    #[test]
    fn test_persist_never_reuses_a_name() {
        let dir = tempfile::tempdir().unwrap();
        let doc = sample();
        let paths: HashSet<PathBuf> = (0..5)
            .map(|_| persist(&JsonEmitter, &doc, dir.path(), "run").unwrap())
            .collect();
        assert_eq!(paths.len(), 5);
        for p in &paths {
            assert!(p.starts_with(dir.path()));
            assert!(std::fs::metadata(p).unwrap().len() > 0);
        }
    }

    #[test]
    fn test_persist_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("out").join("docs");
        let path = persist(&DocxEmitter, &sample(), &nested, DEFAULT_PREFIX).unwrap();
        assert_eq!(path.extension().unwrap(), "docx");
        let head = std::fs::read(&path).unwrap();
        assert_eq!(&head[..2], b"PK");
    }

    #[test]
    fn test_persist_reports_unwritable_target() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let err = persist(&JsonEmitter, &sample(), &blocker, "run").unwrap_err();
        assert!(!err.is_fatal());
    }
}
