use pdfgraph::{
    dictionary, parse_document, Context, Object, ParseOptions, SaveOptions, Stream, XrefEntry,
};

fn compressed(objects_per_stream: usize) -> SaveOptions {
    SaveOptions {
        use_object_streams: true,
        objects_per_stream,
        ..SaveOptions::default()
    }
}

fn count_occurrences(haystack: &[u8], needle: &[u8]) -> usize {
    haystack
        .windows(needle.len())
        .filter(|window| *window == needle)
        .count()
}

#[test]
fn five_objects_at_two_per_stream_make_three_streams() {
    let mut context = Context::new();
    let catalog = context.register(dictionary! {"Type" => "Catalog"});
    for n in 2..=5 {
        context.register(dictionary! {"N" => n});
    }
    context.trailer.set("Root", catalog);

    let bytes = context.save_to_bytes(&compressed(2)).unwrap();
    assert_eq!(count_occurrences(&bytes, b"/ObjStm"), 3);

    // Containers take numbers 6..8, the cross-reference stream number 9.
    let reloaded = parse_document(&bytes, &ParseOptions::default()).unwrap();
    assert_eq!(reloaded.len(), 5);
    let expected = [
        (1, (6, 0)),
        (2, (6, 1)),
        (3, (7, 0)),
        (4, (7, 1)),
        (5, (8, 0)),
    ];
    for (id, (container, index)) in expected {
        assert_eq!(
            reloaded.reference_table.get(id),
            Some(&XrefEntry::Compressed { container, index }),
            "wrong hosting entry for object {}",
            id
        );
    }
    assert!(matches!(
        reloaded.reference_table.get(9),
        Some(XrefEntry::Normal { .. })
    ));
}

#[test]
fn streams_and_nonzero_generations_stay_inline() {
    let mut context = Context::new();
    let catalog = context.register(dictionary! {"Type" => "Catalog"});
    let stream_id = context.register(Stream::new(dictionary! {}, b"inline bytes".to_vec()));
    context.assign((7, 3), Object::string_literal("old generation"));
    context.trailer.set("Root", catalog);

    let bytes = context.save_to_bytes(&compressed(50)).unwrap();
    let text = String::from_utf8_lossy(&bytes);
    // The raw stream and the generation-3 object are framed inline.
    assert!(text.contains("2 0 obj"));
    assert!(text.contains("7 3 obj"));

    let reloaded = parse_document(&bytes, &ParseOptions::default()).unwrap();
    assert_eq!(
        reloaded.get_object(stream_id).unwrap().as_stream().unwrap().content,
        b"inline bytes"
    );
    assert_eq!(
        reloaded.get_object((7, 3)).unwrap(),
        &Object::string_literal("old generation")
    );
    assert!(matches!(
        reloaded.reference_table.get(7),
        Some(XrefEntry::Normal { generation: 3, .. })
    ));
}

#[test]
fn cross_reference_stream_is_not_kept_as_an_object() {
    let mut context = Context::new();
    let catalog = context.register(dictionary! {"Type" => "Catalog"});
    context.trailer.set("Root", catalog);

    let bytes = context.save_to_bytes(&compressed(50)).unwrap();
    let reloaded = parse_document(&bytes, &ParseOptions::default()).unwrap();

    // Only the catalog survives as a graph object; the container and the
    // cross-reference stream dissolve into table entries.
    assert_eq!(reloaded.len(), 1);
    assert!(reloaded.get_object(catalog).is_ok());
}

#[test]
fn encode_streams_off_leaves_containers_readable() {
    let mut context = Context::new();
    let catalog = context.register(dictionary! {"Type" => "Catalog"});
    context.register(Object::string_literal("payload"));
    context.trailer.set("Root", catalog);

    let options = SaveOptions {
        encode_streams: false,
        ..compressed(50)
    };
    let bytes = context.save_to_bytes(&options).unwrap();
    // Without encoding the packed catalog is visible in the raw bytes.
    assert!(count_occurrences(&bytes, b"/Type /Catalog") > 0
        || count_occurrences(&bytes, b"/Type/Catalog") > 0);

    let reloaded = parse_document(&bytes, &ParseOptions::default()).unwrap();
    assert_eq!(reloaded.len(), 2);
    assert_eq!(
        reloaded.get_object((2, 0)).unwrap(),
        &Object::string_literal("payload")
    );
}

#[test]
fn trailer_metadata_moves_through_the_stream_dictionary() {
    let mut context = Context::new();
    let catalog = context.register(dictionary! {"Type" => "Catalog"});
    let info = context.register(dictionary! {"Producer" => Object::string_literal("pdfgraph")});
    context.trailer.set("Root", catalog);
    context.trailer.set("Info", info);

    let bytes = context.save_to_bytes(&compressed(50)).unwrap();
    let reloaded = parse_document(&bytes, &ParseOptions::default()).unwrap();
    assert_eq!(
        reloaded.trailer.get(b"Root").unwrap(),
        &Object::Reference(catalog)
    );
    assert_eq!(
        reloaded.trailer.get(b"Info").unwrap(),
        &Object::Reference(info)
    );
}
