use pdfgraph::{parse_document, Error, Object, ParseOptions};

fn strict() -> ParseOptions {
    ParseOptions {
        fail_on_invalid_objects: true,
        ..ParseOptions::default()
    }
}

/// One good object, one with an unparsable body, one more good object.
const MIXED_DOCUMENT: &[u8] = b"%PDF-1.7
1 0 obj
<</Type /Catalog>>
endobj
2 0 obj
<</Broken ?not-an-object>>
endobj
3 0 obj
(still fine)
endobj
trailer
<</Root 1 0 R>>
";

#[test]
fn best_effort_substitutes_an_opaque_placeholder() {
    let context = parse_document(MIXED_DOCUMENT, &ParseOptions::default()).unwrap();
    assert_eq!(context.len(), 3);

    match context.get_object((2, 0)).unwrap() {
        Object::Opaque(span) => {
            assert!(span.starts_with(b"<</Broken"));
        }
        other => panic!("expected an opaque placeholder, got {:?}", other),
    }
    // Neighbours are unaffected.
    assert_eq!(
        context.get_object((3, 0)).unwrap(),
        &Object::string_literal("still fine")
    );
}

#[test]
fn strict_mode_fails_on_the_first_invalid_object() {
    let err = parse_document(MIXED_DOCUMENT, &strict());
    assert!(matches!(err, Err(Error::ObjectParse { .. })));
}

#[test]
fn missing_header_is_fatal() {
    let err = parse_document(b"1 0 obj null endobj", &ParseOptions::default());
    assert!(matches!(err, Err(Error::MissingHeader)));
}

#[test]
fn header_anywhere_in_leading_garbage_is_found() {
    let mut bytes = b"garbage garbage\n".to_vec();
    bytes.extend_from_slice(b"%PDF-1.4\n1 0 obj <</Type /Catalog>> endobj\n");
    let context = parse_document(&bytes, &ParseOptions::default()).unwrap();
    assert_eq!(context.version, "1.4");
    assert_eq!(context.len(), 1);
}

#[test]
fn filler_between_objects_is_skipped() {
    let bytes = b"%PDF-1.7
1 0 obj <</Type /Catalog>> endobj
@@@ not part of any object @@@
2 0 obj 42 endobj
";
    let context = parse_document(bytes, &ParseOptions::default()).unwrap();
    assert_eq!(context.len(), 2);
    assert_eq!(context.get_object((2, 0)).unwrap(), &Object::Integer(42));
}

#[test]
fn object_body_running_past_the_end_is_fatal_even_in_best_effort() {
    let bytes = b"%PDF-1.7\n1 0 obj (never closed";
    let err = parse_document(bytes, &ParseOptions::default());
    assert!(matches!(err, Err(Error::InvalidObject { .. })));
}

#[test]
fn wrong_stream_length_recovers_identical_content() {
    let with_length = |length: usize| {
        format!(
            "%PDF-1.7\n1 0 obj <</Type /Catalog>> endobj\n2 0 obj\n<</Length {}>>\nstream\nsome raw payload!\nendstream\nendobj\n",
            length
        )
    };
    // 17 is correct for "some raw payload!"; 16 misses the keyword check.
    let good = parse_document(with_length(17).as_bytes(), &ParseOptions::default()).unwrap();
    let fixed = parse_document(with_length(16).as_bytes(), &ParseOptions::default()).unwrap();

    let good_stream = good.get_object((2, 0)).unwrap().as_stream().unwrap();
    let fixed_stream = fixed.get_object((2, 0)).unwrap().as_stream().unwrap();
    assert_eq!(good_stream.content, b"some raw payload!");
    assert_eq!(good_stream.content, fixed_stream.content);
}

#[test]
fn root_is_recovered_by_catalog_scan() {
    // The trailer points at a non-catalog object.
    let bytes = b"%PDF-1.7
1 0 obj <</Type /Page>> endobj
2 0 obj <</Type /Catalog>> endobj
trailer
<</Root 1 0 R>>
";
    let context = parse_document(bytes, &ParseOptions::default()).unwrap();
    assert_eq!(
        context.trailer.get(b"Root").unwrap(),
        &Object::Reference((2, 0))
    );
}

#[test]
fn conventional_null_object_is_dropped() {
    let bytes = b"%PDF-1.7
0 0 obj null endobj
1 0 obj <</Type /Catalog>> endobj
";
    let context = parse_document(bytes, &ParseOptions::default()).unwrap();
    assert!(!context.has_object((0, 0)));
    assert!(context.has_object((1, 0)));
}

#[test]
fn yield_callback_fires_at_configured_granularity() {
    let mut bytes = b"%PDF-1.7\n".to_vec();
    for id in 1..=7 {
        bytes.extend_from_slice(format!("{} 0 obj {} endobj\n", id, id).as_bytes());
    }
    let options = ParseOptions {
        objects_per_yield: 3,
        ..ParseOptions::default()
    };
    let mut yields = 0;
    let context =
        pdfgraph::parse_document_with(&bytes, &options, &mut || yields += 1).unwrap();
    assert_eq!(context.len(), 7);
    assert_eq!(yields, 2);
}
