//! Property tests for the multipart builder.
//!
//! Every generated document is parsed back and checked for part count,
//! ordering, header content and byte-exact attachment payloads.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use mailpost_mime::{BOUNDARY_PREFIX, ContentType, MessageBuilder, ParsedMessage};
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::PathBuf;
use tempfile::TempDir;

const EXTENSIONS: &[&str] = &["txt", "pdf", "png", "bin", "weird", ""];

/// Writes each payload into its own file and returns the paths in order.
fn write_attachments(dir: &TempDir, files: &[(Vec<u8>, usize)]) -> Vec<PathBuf> {
    files
        .iter()
        .enumerate()
        .map(|(i, (data, ext))| {
            let ext = EXTENSIONS[*ext % EXTENSIONS.len()];
            let name = if ext.is_empty() {
                format!("file{i}")
            } else {
                format!("file{i}.{ext}")
            };
            let path = dir.path().join(name);
            std::fs::write(&path, data).unwrap();
            path
        })
        .collect()
}

fn boundary_of(parsed: &ParsedMessage) -> String {
    let ct = ContentType::parse(parsed.headers.get("Content-Type").unwrap()).unwrap();
    ct.boundary().unwrap().to_string()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn built_document_round_trips(
        subject in "([!-~]([ -~]{0,38}[!-~])?)?",
        body in "[a-zA-Z0-9 .,!?\r\n-]{0,200}",
        files in prop::collection::vec(
            (prop::collection::vec(any::<u8>(), 0..400), 0usize..6),
            0..4,
        ),
        seed in any::<u64>(),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_attachments(&dir, &files);

        let raw = MessageBuilder::new()
            .from("sender@example.com")
            .to("recipient@example.com")
            .subject(subject.clone())
            .text_body(body.clone())
            .attach_all(paths.iter().cloned())
            .build_with_rng(&mut StdRng::seed_from_u64(seed))
            .unwrap();

        let parsed = ParsedMessage::parse(&raw).unwrap();

        // N attachments produce N + 1 parts, text first.
        prop_assert_eq!(parsed.parts.len(), files.len() + 1);
        prop_assert!(!parsed.parts[0].is_attachment());
        prop_assert_eq!(parsed.parts[0].content_type().unwrap().essence(), "text/plain");

        prop_assert_eq!(parsed.to(), Some("recipient@example.com"));
        prop_assert_eq!(parsed.subject(), Some(subject));
        prop_assert_eq!(parsed.text_body().unwrap(), body);

        for ((part, path), (data, _)) in parsed.parts[1..].iter().zip(&paths).zip(&files) {
            let expected_name = path.file_name().unwrap().to_string_lossy().into_owned();
            prop_assert!(part.is_attachment());
            prop_assert_eq!(part.filename(), Some(expected_name));
            prop_assert_eq!(&part.decode_body().unwrap(), data);
        }

        if files.is_empty() {
            prop_assert!(!String::from_utf8_lossy(&raw).contains("Content-Disposition"));
        }
    }

    #[test]
    fn boundary_never_prefixes_part_content(
        body in "[ -~]{0,200}",
        data in prop::collection::vec(any::<u8>(), 0..600),
        seed in any::<u64>(),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_attachments(&dir, &[(data, 3)]);

        let raw = MessageBuilder::new()
            .from("sender@example.com")
            .to("recipient@example.com")
            .text_body(body)
            .attach_all(paths)
            .build_with_rng(&mut StdRng::seed_from_u64(seed))
            .unwrap();

        let parsed = ParsedMessage::parse(&raw).unwrap();
        let boundary = boundary_of(&parsed);
        prop_assert!(boundary.starts_with(BOUNDARY_PREFIX));

        for part in &parsed.parts {
            let content = String::from_utf8_lossy(&part.body);
            prop_assert!(!content.starts_with(boundary.as_str()));
            prop_assert!(!content.contains(boundary.as_str()));
        }
    }
}

#[test]
fn attachments_keep_caller_order() {
    let dir = tempfile::tempdir().unwrap();
    let files = vec![
        (b"zebra".to_vec(), 0),
        (b"apple".to_vec(), 1),
        (b"mango".to_vec(), 4),
    ];
    let paths = write_attachments(&dir, &files);

    let raw = MessageBuilder::new()
        .from("sender@example.com")
        .to("recipient@example.com")
        .attach_all(paths)
        .build()
        .unwrap();

    let parsed = ParsedMessage::parse(&raw).unwrap();
    let names: Vec<String> = parsed
        .attachments()
        .map(|p| p.filename().unwrap())
        .collect();
    assert_eq!(names, vec!["file0.txt", "file1.pdf", "file2.weird"]);

    let types: Vec<String> = parsed
        .attachments()
        .map(|p| p.content_type().unwrap().essence())
        .collect();
    assert_eq!(
        types,
        vec!["text/plain", "application/pdf", "application/octet-stream"]
    );
}
