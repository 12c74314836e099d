//! Parse uiautomator hierarchy dumps into a node tree.
//!
//! The dump is a flat run of `<node .../>` and `<node ...>...</node>` tags wrapped
//! in `<hierarchy>`; anything else (the XML prolog, the trailing "UI hierchary
//! dumped to" banner printed by the tool) is ignored.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;

use super::{DeviceError, DeviceResult};

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"<(/?)node\b((?:[^>"]|"[^"]*")*?)(/?)>"#).expect("tag regex"));
static ATTR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"([A-Za-z_][\w:.-]*)\s*=\s*"([^"]*)""#).expect("attr regex"));
static BOUNDS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[(-?\d+),(-?\d+)\]\[(-?\d+),(-?\d+)\]$").expect("bounds regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Bounds {
    /// Parse uiautomator's `[l,t][r,b]` notation.
    pub fn parse(s: &str) -> Option<Self> {
        let caps = BOUNDS_RE.captures(s.trim())?;
        let n = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<i32>().ok());
        Some(Bounds { left: n(1)?, top: n(2)?, right: n(3)?, bottom: n(4)? })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UiNode {
    pub index: usize,
    pub text: String,
    pub resource_id: String,
    pub class_name: String,
    pub package: String,
    pub description: String,
    pub checkable: bool,
    pub checked: bool,
    pub clickable: bool,
    pub enabled: bool,
    pub focusable: bool,
    pub focused: bool,
    pub scrollable: bool,
    pub selected: bool,
    pub bounds: Option<Bounds>,
    pub children: Vec<UiNode>,
}

impl UiNode {
    fn from_attrs(raw: &str) -> Self {
        let attrs: HashMap<&str, String> = ATTR_RE
            .captures_iter(raw)
            .filter_map(|c| Some((c.get(1)?.as_str(), unescape(c.get(2)?.as_str()))))
            .collect();
        let s = |k: &str| attrs.get(k).cloned().unwrap_or_default();
        let b = |k: &str| attrs.get(k).map(|v| v == "true").unwrap_or(false);
        UiNode {
            index: attrs.get("index").and_then(|v| v.parse().ok()).unwrap_or(0),
            text: s("text"),
            resource_id: s("resource-id"),
            class_name: s("class"),
            package: s("package"),
            description: s("content-desc"),
            checkable: b("checkable"),
            checked: b("checked"),
            clickable: b("clickable"),
            enabled: b("enabled"),
            focusable: b("focusable"),
            focused: b("focused"),
            scrollable: b("scrollable"),
            selected: b("selected"),
            bounds: attrs.get("bounds").and_then(|v| Bounds::parse(v)),
            children: Vec::new(),
        }
    }
}

fn unescape(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#10;", "\n")
        .replace("&#13;", "\r")
        .replace("&amp;", "&")
}

/// Build the node tree from a hierarchy dump.
pub fn parse_hierarchy(xml: &str) -> DeviceResult<Vec<UiNode>> {
    let mut roots: Vec<UiNode> = Vec::new();
    let mut stack: Vec<UiNode> = Vec::new();

    for caps in TAG_RE.captures_iter(xml) {
        let closing = caps.get(1).map(|m| !m.as_str().is_empty()).unwrap_or(false);
        let self_closing = caps.get(3).map(|m| !m.as_str().is_empty()).unwrap_or(false);
        if closing {
            let node = stack
                .pop()
                .ok_or_else(|| DeviceError::MalformedDump("closing </node> without an open node".into()))?;
            match stack.last_mut() {
                Some(parent) => parent.children.push(node),
                None => roots.push(node),
            }
            continue;
        }
        let node = UiNode::from_attrs(caps.get(2).map(|m| m.as_str()).unwrap_or(""));
        if self_closing {
            match stack.last_mut() {
                Some(parent) => parent.children.push(node),
                None => roots.push(node),
            }
        } else {
            stack.push(node);
        }
    }

    if !stack.is_empty() {
        return Err(DeviceError::MalformedDump(format!("{} unclosed node(s)", stack.len())));
    }
    Ok(roots)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = r#"<?xml version='1.0' encoding='UTF-8' standalone='yes' ?><hierarchy rotation="0"><node index="0" text="" resource-id="" class="android.widget.FrameLayout" package="com.example" content-desc="" checkable="false" checked="false" clickable="false" enabled="true" focusable="false" focused="false" scrollable="false" long-clickable="false" password="false" selected="false" bounds="[0,0][1080,1920]"><node index="0" text="Save &amp; exit" resource-id="com.example:id/save" class="android.widget.Button" package="com.example" content-desc="a &gt; b" checkable="false" checked="false" clickable="true" enabled="true" focusable="true" focused="false" scrollable="false" long-clickable="false" password="false" selected="false" bounds="[40,100][1040,220]" /><node index="1" text="" resource-id="" class="android.widget.LinearLayout" package="com.example" content-desc="" checkable="false" checked="false" clickable="false" enabled="true" focusable="false" focused="false" scrollable="true" long-clickable="false" password="false" selected="false" bounds="[0,240][1080,1920]"></node></node></hierarchy>UI hierchary dumped to: /dev/tty"#;

    #[test]
    fn parses_nested_nodes() {
        let roots = parse_hierarchy(DUMP).unwrap();
        assert_eq!(roots.len(), 1);
        let frame = &roots[0];
        assert_eq!(frame.class_name, "android.widget.FrameLayout");
        assert_eq!(frame.bounds, Some(Bounds { left: 0, top: 0, right: 1080, bottom: 1920 }));
        assert_eq!(frame.children.len(), 2);

        let button = &frame.children[0];
        assert_eq!(button.text, "Save & exit");
        assert_eq!(button.description, "a > b");
        assert_eq!(button.resource_id, "com.example:id/save");
        assert!(button.clickable);
        assert!(button.focusable);
        assert!(button.children.is_empty());

        let list = &frame.children[1];
        assert_eq!(list.index, 1);
        assert!(list.scrollable);
    }

    #[test]
    fn serializes_camel_case() {
        let roots = parse_hierarchy(DUMP).unwrap();
        let v = serde_json::to_value(&roots[0].children[0]).unwrap();
        assert_eq!(v["resourceId"], "com.example:id/save");
        assert_eq!(v["className"], "android.widget.Button");
        assert_eq!(v["bounds"]["right"], 1040);
    }

    #[test]
    fn unbalanced_dump_is_malformed() {
        assert!(matches!(parse_hierarchy(r#"<node index="0">"#), Err(DeviceError::MalformedDump(_))));
        assert!(matches!(parse_hierarchy("</node>"), Err(DeviceError::MalformedDump(_))));
    }

    #[test]
    fn bounds_parsing() {
        assert_eq!(Bounds::parse("[1,2][3,4]"), Some(Bounds { left: 1, top: 2, right: 3, bottom: 4 }));
        assert_eq!(Bounds::parse("garbage"), None);
    }
}
