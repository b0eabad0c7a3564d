use image::Rgb;

use super::*;

fn sample_page(texts: Vec<PlacedText>) -> OverlayPage {
    let mut image = RgbImage::new(6, 4);
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        *pixel = Rgb([x as u8 * 40, y as u8 * 60, 200]);
    }

    OverlayPage {
        width: 300.0,
        height: 200.0,
        image,
        texts,
    }
}

fn pixel_bytes(stream: &Stream) -> Vec<u8> {
    stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone())
}

fn operators(content: &Content) -> Vec<&str> {
    content
        .operations
        .iter()
        .map(|operation| operation.operator.as_str())
        .collect()
}

#[test]
fn content_draws_image_then_one_invisible_text_object() {
    let page = sample_page(vec![PlacedText {
        text: "Report".to_string(),
        x: 50.0,
        y: 40.0,
        font_size: 12.0,
    }]);

    let content = page.content();

    assert_eq!(
        operators(&content),
        vec!["q", "cm", "Do", "Q", "BT", "Tf", "Tr", "Td", "Tj", "ET"]
    );

    let render_mode = &content.operations[6];
    assert_eq!(render_mode.operands[0].as_i64().expect("render mode"), 3);

    let position = &content.operations[7];
    assert_eq!(position.operands[0].as_float().expect("x"), 50.0);
    assert_eq!(position.operands[1].as_float().expect("y"), 160.0);

    let shown = &content.operations[8];
    assert_eq!(shown.operands[0].as_str().expect("text"), b"Report");
}

#[test]
fn content_without_text_only_paints_the_image() {
    let content = sample_page(Vec::new()).content();
    assert_eq!(operators(&content), vec!["q", "cm", "Do", "Q"]);
}

#[test]
fn win_ansi_replaces_characters_outside_latin1() {
    assert_eq!(encode_win_ansi("Café"), vec![b'C', b'a', b'f', 0xE9]);
    assert_eq!(encode_win_ansi("a→b"), b"a?b".to_vec());
}

#[test]
fn win_ansi_keeps_typographic_punctuation() {
    assert_eq!(
        encode_win_ansi("\u{2018}it\u{2019}s\u{2026}"),
        vec![0x91, b'i', b't', 0x92, b's', 0x85]
    );
    assert_eq!(
        encode_win_ansi("\u{201C}\u{20AC}5\u{201D} \u{2013} \u{2014}"),
        vec![0x93, 0x80, b'5', 0x94, b' ', 0x96, b' ', 0x97]
    );
    assert_eq!(encode_win_ansi("\u{4E2D}"), b"?".to_vec());
}

#[test]
fn image_xobject_carries_unmodified_pixels() {
    let page = sample_page(Vec::new());
    let stream = image_xobject(page.image.clone());

    assert_eq!(stream.content, page.image.as_raw().clone());
    assert_eq!(stream.dict.get(b"Width").and_then(Object::as_i64).expect("width"), 6);
    assert_eq!(stream.dict.get(b"Height").and_then(Object::as_i64).expect("height"), 4);
}

#[test]
fn finished_document_lists_pages_in_order() {
    let mut overlay = OverlayDocument::new();
    let first = overlay.add_page(sample_page(Vec::new())).expect("page");
    let second = overlay.add_page(sample_page(Vec::new())).expect("page");
    assert_eq!(overlay.page_count(), 2);

    let document = overlay.finish();
    let pages = document.get_pages();

    assert_eq!(pages.len(), 2);
    assert_eq!(pages.get(&1), Some(&first));
    assert_eq!(pages.get(&2), Some(&second));
}

#[test]
fn page_resources_reference_the_embedded_raster() {
    let page = sample_page(Vec::new());
    let mut overlay = OverlayDocument::new();
    let page_id = overlay.add_page(page.clone()).expect("page");
    let document = overlay.finish();

    let image_id = document
        .get_dictionary(page_id)
        .and_then(|dict| dict.get(b"Resources"))
        .and_then(Object::as_dict)
        .and_then(|resources| resources.get(b"XObject"))
        .and_then(Object::as_dict)
        .and_then(|xobjects| xobjects.get(IMAGE_RESOURCE.as_bytes()))
        .and_then(Object::as_reference)
        .expect("image reference");
    let stream = document
        .get_object(image_id)
        .and_then(Object::as_stream)
        .expect("image stream");

    assert_eq!(&pixel_bytes(stream), page.image.as_raw());
}

#[test]
fn added_raster_is_held_compressed() {
    let mut overlay = OverlayDocument::new();
    let page = OverlayPage {
        width: 612.0,
        height: 792.0,
        image: RgbImage::from_pixel(128, 128, Rgb([250, 250, 245])),
        texts: Vec::new(),
    };
    let raw = page.image.as_raw().clone();
    let page_id = overlay.add_page(page).expect("page");
    let document = overlay.finish();

    let image_id = document
        .get_dictionary(page_id)
        .and_then(|dict| dict.get(b"Resources"))
        .and_then(Object::as_dict)
        .and_then(|resources| resources.get(b"XObject"))
        .and_then(Object::as_dict)
        .and_then(|xobjects| xobjects.get(IMAGE_RESOURCE.as_bytes()))
        .and_then(Object::as_reference)
        .expect("image reference");
    let stream = document
        .get_object(image_id)
        .and_then(Object::as_stream)
        .expect("image stream");

    assert_eq!(
        stream.dict.get(b"Filter").and_then(Object::as_name).expect("filter"),
        b"FlateDecode"
    );
    assert!(stream.content.len() < raw.len() / 10);
    assert_eq!(stream.decompressed_content().expect("inflate"), raw);
}

#[test]
fn save_writes_a_pdf_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("out.pdf");
    let mut overlay = OverlayDocument::new();
    overlay.add_page(sample_page(Vec::new())).expect("page");

    overlay.save(&path).expect("save");

    let bytes = std::fs::read(&path).expect("read");
    assert!(bytes.starts_with(b"%PDF-1.5"));
}
