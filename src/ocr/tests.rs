use super::tesseract::parse_tsv;
use super::vision::parse_annotate_response;
use super::*;

#[test]
fn normalize_quad_reorders_rotated_vertices() {
    let rotated = [(110, 40), (110, 60), (20, 60), (20, 40)];
    let quad = normalize_quad(&rotated).expect("quad");

    assert_eq!(quad[0], Vertex::new(20, 40));
    assert_eq!(quad[1], Vertex::new(110, 40));
    assert_eq!(quad[2], Vertex::new(110, 60));
    assert_eq!(quad[3], Vertex::new(20, 60));
}

#[test]
fn word_from_raw_drops_non_quadrilaterals() {
    assert!(word_from_raw("x", &[(0, 0), (1, 0), (1, 1)]).is_none());
    assert!(word_from_raw("", &[(0, 0), (1, 0), (1, 1), (0, 1)]).is_none());
    assert!(word_from_raw("x", &[(0, 0), (1, 0), (1, 1), (0, 1)]).is_some());
}

#[test]
fn vision_response_is_flattened_per_paragraph() {
    let raw = r#"{
      "responses": [{
        "fullTextAnnotation": {
          "pages": [{
            "blocks": [{
              "paragraphs": [
                {"words": [
                  {"boundingBox": {"vertices": [{"x": 10, "y": 20}, {"x": 60, "y": 20}, {"x": 60, "y": 40}, {"x": 10, "y": 40}]},
                   "symbols": [{"text": "H"}, {"text": "i"}]},
                  {"boundingBox": {"vertices": [{"y": 20}, {"x": 4, "y": 20}, {"x": 4, "y": 40}, {"y": 40}]},
                   "symbols": [{"text": "!"}]}
                ]},
                {"words": [
                  {"boundingBox": {"vertices": [{"x": 1, "y": 1}, {"x": 2, "y": 1}]},
                   "symbols": [{"text": "bad"}]}
                ]}
              ]
            }]
          }]
        }
      }]
    }"#;

    let page = parse_annotate_response(raw).expect("parse");

    assert_eq!(page.blocks.len(), 1);
    let paragraphs: Vec<&DetectedParagraph> = page.paragraphs().collect();
    assert_eq!(paragraphs.len(), 2);
    assert_eq!(paragraphs[0].words[0].text, "Hi");
    assert_eq!(paragraphs[0].words[1].polygon[0], Vertex::new(0, 20));
    assert!(paragraphs[1].words.is_empty());
    assert_eq!(page.word_count(), 2);
}

#[test]
fn vision_response_without_text_is_an_empty_page() {
    let page = parse_annotate_response(r#"{"responses": [{}]}"#).expect("parse");
    assert_eq!(page.word_count(), 0);
}

#[test]
fn vision_error_payload_is_reported() {
    let raw = r#"{"responses": [{"error": {"code": 3, "message": "Bad image data."}}]}"#;
    let err = parse_annotate_response(raw).expect_err("error");
    assert!(err.to_string().contains("Bad image data."));
}

#[test]
fn tesseract_tsv_groups_words_by_block_and_paragraph() {
    let raw = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext\n\
1\t1\t0\t0\t0\t0\t0\t0\t1000\t1000\t-1\t\n\
2\t1\t1\t0\t0\t0\t10\t10\t200\t40\t-1\t\n\
5\t1\t1\t1\t1\t1\t10\t10\t80\t20\t96.1\tHello\n\
5\t1\t1\t1\t1\t2\t90\t10\t5\t20\t91.0\t,\n\
5\t1\t1\t2\t1\t1\t10\t40\t60\t20\t90.2\tworld\n\
5\t1\t2\t1\t1\t1\t10\t90\t60\t20\t88.0\t \n\
5\t1\t2\t1\t1\t2\t70\t90\t60\t20\t88.0\tend\n";

    let page = parse_tsv(raw).expect("parse");

    assert_eq!(page.blocks.len(), 2);
    assert_eq!(page.blocks[0].paragraphs.len(), 2);
    assert_eq!(page.blocks[0].paragraphs[0].words.len(), 2);
    assert_eq!(
        page.blocks[0].paragraphs[0].words[0].polygon[2],
        Vertex::new(90, 30)
    );
    assert_eq!(page.blocks[1].paragraphs[0].words[0].text, "end");
}

#[test]
fn tesseract_tsv_rejects_truncated_lines() {
    assert!(parse_tsv("5\t1\t1\n").is_err());
}
