use std::fs;
use std::io::{Cursor, Write};

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document as PdfDocument, Object, Stream};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use ragbot_core::loader::{load_all, Loader, LoaderConfig};
use ragbot_core::types::keys;
use ragbot_core::Error;

fn pdf_bytes(pages: &[&str]) -> Vec<u8> {
    let mut doc = PdfDocument::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! { "Font" => dictionary! { "F1" => font_id } });
    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![100.into(), 600.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }
    let count = kids.len() as i64;
    doc.objects.insert(pages_id, Object::Dictionary(dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    }));
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);
    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

fn docx_bytes(document_xml: &str) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file("word/document.xml", SimpleFileOptions::default()).unwrap();
    zip.write_all(document_xml.as_bytes()).unwrap();
    zip.finish().unwrap().into_inner()
}

const DOCX_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>
<w:p><w:pPr><w:pStyle w:val="Title"/></w:pPr><w:r><w:t>Water </w:t></w:r><w:r><w:t xml:space="preserve">&amp; fire</w:t></w:r></w:p>
<w:p><w:r><w:tab/><w:t>Boil for one minute.</w:t></w:r></w:p>
<w:p></w:p>
</w:body></w:document>"#;

#[test]
fn pdf_pages_are_marked_and_counted() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("manual.pdf");
    fs::write(&path, pdf_bytes(&["Hello World", "Second page"])).unwrap();

    let d = Loader::new(&LoaderConfig::default()).load_file(&path).unwrap();

    assert_eq!(d.metadata[keys::FILE_TYPE], "pdf");
    assert_eq!(d.metadata[keys::TOTAL_PAGES], "2");
    assert!(d.raw_text.starts_with("--- Page 1 ---\n"), "got {:?}", d.raw_text);
    assert!(d.raw_text.contains("Hello World"));
    assert!(d.raw_text.contains("--- Page 2 ---\n"));
    assert!(d.raw_text.contains("Second page"));
}

#[test]
fn docx_paragraphs_become_lines() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("notes.docx");
    fs::write(&path, docx_bytes(DOCX_XML)).unwrap();

    let d = Loader::new(&LoaderConfig::default()).load_file(&path).unwrap();

    assert_eq!(d.metadata[keys::FILE_TYPE], "docx");
    assert_eq!(d.metadata[keys::TOTAL_PARAGRAPHS], "3");
    assert_eq!(d.raw_text, "Water & fire\nBoil for one minute.\n");
}

#[test]
fn corrupt_binary_document_is_io_error() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("broken.pdf"), "not a pdf").unwrap();
    fs::write(tmp.path().join("broken.docx"), "not a zip").unwrap();
    let loader = Loader::new(&LoaderConfig::default());

    assert!(matches!(loader.load_file(&tmp.path().join("broken.pdf")), Err(Error::Io { .. })));
    assert!(matches!(loader.load_file(&tmp.path().join("broken.docx")), Err(Error::Io { .. })));
}

#[test]
fn directory_walk_mixes_text_and_binary_formats() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("a.txt"), "plain").unwrap();
    fs::write(tmp.path().join("b.docx"), docx_bytes(DOCX_XML)).unwrap();
    fs::write(tmp.path().join("c.pdf"), pdf_bytes(&["Hello World"])).unwrap();

    let docs = load_all(&Loader::new(&LoaderConfig::default()), tmp.path()).unwrap();
    let kinds: Vec<&str> = docs.iter().map(|d| d.metadata[keys::FILE_TYPE].as_str()).collect();
    assert_eq!(kinds, vec!["txt", "docx", "pdf"]);
}

#[test]
fn discover_lists_supported_paths_without_reading() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("b.md"), "b").unwrap();
    fs::write(tmp.path().join("a.txt"), "a").unwrap();
    fs::write(tmp.path().join("c.exe"), "c").unwrap();

    let paths: Vec<_> = Loader::new(&LoaderConfig::default()).discover(tmp.path()).unwrap().collect::<Result<_, _>>().unwrap();
    assert_eq!(paths, vec![tmp.path().join("a.txt"), tmp.path().join("b.md")]);
}

#[tokio::test]
async fn load_file_async_matches_load_file() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("a.txt");
    fs::write(&path, "same text").unwrap();
    let loader = Loader::new(&LoaderConfig::default());

    assert_eq!(loader.load_file_async(&path).await.unwrap(), loader.load_file(&path).unwrap());
    assert!(matches!(loader.load_file_async(&tmp.path().join("gone.txt")).await, Err(Error::Io { .. })));
}
