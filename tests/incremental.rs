use pdfgraph::{parse_document, Object, ParseOptions, XrefEntry};

/// A document with one incremental update appended: the catalog is revised,
/// the info dictionary is only present in the first revision.
fn layered_document() -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(
        b"%PDF-1.4
1 0 obj
<</Type /Catalog>>
endobj
2 0 obj
<</Producer (original revision)>>
endobj
xref
0 3
0000000000 65535 f
0000000009 00000 n
0000000044 00000 n
trailer
<</Size 3 /Root 1 0 R /Info 2 0 R>>
startxref
100
%%EOF
",
    );
    bytes.extend_from_slice(
        b"1 0 obj
<</Type /Catalog /PageMode /UseOutlines>>
endobj
xref
1 1
0000000200 00000 n
trailer
<</Size 3 /Root 1 0 R>>
startxref
230
%%EOF
",
    );
    bytes
}

#[test]
fn newer_revision_wins_for_objects() {
    let context = parse_document(&layered_document(), &ParseOptions::default()).unwrap();
    let catalog = context.get_object((1, 0)).unwrap().as_dict().unwrap();
    assert!(catalog.has(b"PageMode"));
}

#[test]
fn trailer_entries_layer_across_revisions() {
    let context = parse_document(&layered_document(), &ParseOptions::default()).unwrap();
    // Root comes from the newest trailer, Info falls back to the older one.
    assert_eq!(
        context.trailer.get(b"Root").unwrap(),
        &Object::Reference((1, 0))
    );
    assert_eq!(
        context.trailer.get(b"Info").unwrap(),
        &Object::Reference((2, 0))
    );
}

#[test]
fn last_startxref_pointer_is_recorded() {
    let context = parse_document(&layered_document(), &ParseOptions::default()).unwrap();
    assert_eq!(context.xref_start, Some(230));
}

#[test]
fn classic_table_entries_are_recorded_advisory() {
    let context = parse_document(&layered_document(), &ParseOptions::default()).unwrap();
    // The update's subsection replaced the entry for object 1.
    assert_eq!(
        context.reference_table.get(1),
        Some(&XrefEntry::Normal {
            offset: 200,
            generation: 0
        })
    );
    assert_eq!(context.reference_table.get(0), Some(&XrefEntry::Free));
    assert_eq!(
        context.reference_table.get(2),
        Some(&XrefEntry::Normal {
            offset: 44,
            generation: 0
        })
    );
}

#[test]
fn version_comes_from_the_header() {
    let context = parse_document(&layered_document(), &ParseOptions::default()).unwrap();
    assert_eq!(context.version, "1.4");
    assert_eq!(context.max_id(), 2);
}
