mod common;

use common::{json_fixture, read_fixture};
use pretty_assertions::assert_eq;
use serde_json::json;
use xshape_core::{
    Check, ErrorKind, PrettyPrintOptions, TransformOptions, Transformer, pretty_print, to_json,
    transform,
};

#[test]
fn feed_fixture_matches_expected_output() {
    let xml = read_fixture("feed.xml");
    let template = json_fixture("feed.template.json");
    let expected = json_fixture("feed.expected.json");

    let options = TransformOptions::default().with_check(Check::ValidXml);
    let output = transform(&xml, &template, &options).unwrap();
    assert_eq!(output, expected);
}

#[test]
fn output_keys_follow_template_order() {
    let xml = read_fixture("feed.xml");
    let template = json_fixture("feed.template.json");
    let output = transform(&xml, &template, &TransformOptions::default()).unwrap();
    let keys: Vec<_> = output.as_object().unwrap().keys().cloned().collect();
    assert_eq!(
        keys,
        vec!["title", "link", "version", "releases", "hasMedia", "items", "source"]
    );
}

#[tokio::test]
async fn async_and_sync_agree() {
    let xml = read_fixture("feed.xml");
    let template = json_fixture("feed.template.json");
    let sync = transform(&xml, &template, &TransformOptions::default()).unwrap();
    let transformer = Transformer::default();
    let awaited = transformer
        .transform(xml.clone(), template.clone(), TransformOptions::default())
        .await
        .unwrap();
    assert_eq!(sync, awaited);
}

#[test]
fn to_json_describes_the_whole_feed() {
    let xml = read_fixture("feed.xml");
    let output = to_json(&xml, &TransformOptions::default()).unwrap();
    let channel = &output["rss"][0]["channel"][0];
    assert_eq!(output["rss"][0]["$"], json!({ "version": "2.0" }));
    assert_eq!(channel["title"], json!([{ "#text": "Release notes" }]));
    assert_eq!(channel["item"].as_array().map(Vec::len), Some(3));
    assert_eq!(
        channel["item"][0]["media:content"][0]["$"],
        json!({ "url": "https://example.org/1.2.0.png", "width": "640" })
    );
}

#[test]
fn pretty_print_reindents_the_feed() {
    let xml = read_fixture("feed.xml");
    let pretty = pretty_print(&xml, &PrettyPrintOptions::new(1), &TransformOptions::default())
        .unwrap();
    let lines: Vec<_> = pretty.lines().collect();
    assert_eq!(
        lines[0],
        r#"<rss xmlns:media="http://search.yahoo.com/mrss/" version="2.0">"#
    );
    assert_eq!(lines[1], " <channel>");
    assert_eq!(lines[2], "  <title>Release notes</title>");
    assert!(lines.contains(&"   <title>v1.1.2 &amp; hotfix</title>"));
    assert_eq!(lines.last(), Some(&"</rss>"));

    let reparsed = xshape_core::document::parse_document(&pretty);
    assert!(reparsed.is_ok(), "pretty output must stay well-formed");
}

#[test]
fn indentation_text_is_not_part_of_the_tree() {
    let xml = "<a>\n  <b>x</b>\n  <c>y</c>\n</a>";
    let template = json!({
        "v": "/a",
        "n": "count(/a/node())",
        "first": "name(/a/node()[1])",
        "last": "name(/a/node()[last()])",
        "texts": "count(//text())",
        "after": "count(/a/b/following-sibling::node())",
    });
    let output = transform(xml, &template, &TransformOptions::default()).unwrap();
    assert_eq!(
        output,
        json!({"v": "xy", "n": 2, "first": "b", "last": "c", "texts": 2, "after": 1})
    );
}

#[test]
fn undeclared_prefixes_make_a_document_malformed() {
    let xml = "<a><x:b>1</x:b></a>";
    let template = json!({"b": "/a"});

    let output = transform(xml, &template, &TransformOptions::default()).unwrap();
    assert_eq!(output, json!({}));

    let options = TransformOptions::default().with_check(Check::ValidXml);
    let err = transform(xml, &template, &options).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
}
