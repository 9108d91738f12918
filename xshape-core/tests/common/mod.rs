use std::path::PathBuf;

use serde_json::Value;

#[allow(dead_code)]
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[allow(dead_code)]
pub fn read_fixture(name: &str) -> String {
    std::fs::read_to_string(fixture_path(name))
        .unwrap_or_else(|e| panic!("failed to read fixture {name}: {e}"))
}

#[allow(dead_code)]
pub fn json_fixture(name: &str) -> Value {
    serde_json::from_str(&read_fixture(name))
        .unwrap_or_else(|e| panic!("fixture {name} is not valid json: {e}"))
}

/// Inputs that are not well-formed XML.
#[allow(dead_code)]
pub const MALFORMED: &[&str] = &[
    "Too Many Requests",
    "<tag>invalid xml<ta/>",
    "",
    "   ",
    "<a>",
    "<a></b>",
    "<a/><b/>",
    "text<a/>",
    "<a x='1' x='2'/>",
    "<p:a/>",
    "<a>&undefined;</a>",
];
