//! Stylesheets embedded in `<style>` elements and `style` attributes.

use lightningcss::media_query::{MediaList, MediaQuery, MediaType, Qualifier};
use lightningcss::printer::PrinterOptions;
use lightningcss::rules::{CssRule, CssRuleList};
use lightningcss::stylesheet::{ParserOptions, StyleSheet};
use lightningcss::traits::ToCss;
use tracing::{debug, warn};

use crate::assets::{Fetcher, resolve_url};

const MAX_IMPORT_DEPTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub value: String,
}

/// Declarations that apply to one element, split by importance and kept in
/// cascade order (specificity, then source order).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchedDeclarations {
    pub normal: Vec<Declaration>,
    pub important: Vec<Declaration>,
}

impl MatchedDeclarations {
    pub fn is_empty(&self) -> bool {
        self.normal.is_empty() && self.important.is_empty()
    }

    fn extend(&mut self, other: MatchedDeclarations) {
        self.normal.extend(other.normal);
        self.important.extend(other.important);
    }
}

/// Resolves the style rules that match an element (and optional pseudo-element).
pub trait StyleMatcher {
    fn match_element(
        &self,
        node: roxmltree::Node<'_, '_>,
        pseudo: Option<&str>,
    ) -> MatchedDeclarations;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Specificity(u16, u16, u16);

#[derive(Debug, Clone)]
struct SimpleSelector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

#[derive(Debug, Clone)]
struct Selector {
    parts: Vec<SimpleSelector>,
    specificity: Specificity,
}

#[derive(Debug, Clone)]
struct StyleRule {
    selector: Selector,
    declarations: MatchedDeclarations,
    order: usize,
}

/// Rules collected from a document's `<style>` elements (and the sheets they
/// `@import`). Supports type, class, id, universal and descendant selectors.
#[derive(Debug, Clone, Default)]
pub struct SvgStylesheet {
    rules: Vec<StyleRule>,
    order: usize,
}

impl SvgStylesheet {
    pub fn from_document(
        doc: &roxmltree::Document<'_>,
        base_url: Option<&str>,
        fetcher: &dyn Fetcher,
    ) -> Self {
        let mut sheet = SvgStylesheet::default();
        for node in doc
            .descendants()
            .filter(|n| n.is_element() && n.tag_name().name().eq_ignore_ascii_case("style"))
        {
            let css: String = node
                .children()
                .filter_map(|child| child.text())
                .collect();
            sheet.add_css(css.trim(), base_url, fetcher, 0);
        }
        sheet
    }

    pub fn parse(css: &str) -> Self {
        struct NoFetch;
        impl Fetcher for NoFetch {
            fn fetch(&self, url: &str) -> Result<Vec<u8>, crate::error::SvgError> {
                Err(crate::error::SvgError::fetch(url, "imports disabled"))
            }
        }
        let mut sheet = SvgStylesheet::default();
        sheet.add_css(css, None, &NoFetch, 0);
        sheet
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn add_css(&mut self, css: &str, base_url: Option<&str>, fetcher: &dyn Fetcher, depth: usize) {
        if css.is_empty() {
            return;
        }
        match StyleSheet::parse(css, ParserOptions::default()) {
            Ok(parsed) => self.collect(parsed.rules, base_url, fetcher, depth),
            Err(err) => debug!(error = %err, "skipping unparsable stylesheet"),
        }
    }

    fn collect(
        &mut self,
        rules: CssRuleList<'_>,
        base_url: Option<&str>,
        fetcher: &dyn Fetcher,
        depth: usize,
    ) {
        for rule in rules.0 {
            match rule {
                CssRule::Style(style_rule) => {
                    let selectors = style_rule
                        .selectors
                        .to_css_string(PrinterOptions::default())
                        .unwrap_or_default();
                    let declarations = style_rule
                        .declarations
                        .to_css_string(PrinterOptions::default())
                        .unwrap_or_default();
                    let declarations = parse_declarations(&declarations);
                    if !declarations.is_empty() {
                        for raw in selectors.split(',') {
                            if let Some(selector) = parse_selector(raw) {
                                self.rules.push(StyleRule {
                                    selector,
                                    declarations: declarations.clone(),
                                    order: self.order,
                                });
                            }
                        }
                    }
                    self.order += 1;
                }
                CssRule::Media(media) => {
                    if media_list_matches(&media.query) {
                        self.collect(media.rules, base_url, fetcher, depth);
                    } else {
                        debug!("media rule skipped");
                    }
                }
                CssRule::Import(import) => {
                    let href: &str = &import.url;
                    if depth >= MAX_IMPORT_DEPTH {
                        warn!(url = href, "stylesheet import nesting too deep");
                        continue;
                    }
                    let url = resolve_url(base_url, href);
                    match fetcher.fetch(&url) {
                        Ok(bytes) => {
                            let css = String::from_utf8_lossy(&bytes).into_owned();
                            self.add_css(css.trim(), Some(&url), fetcher, depth + 1);
                        }
                        Err(err) => warn!(%url, error = %err, "cannot fetch imported stylesheet"),
                    }
                }
                _ => {}
            }
        }
    }
}

/// Documents are drawn for print. Media types and `not` are evaluated;
/// feature conditions count as satisfied.
fn media_list_matches(list: &MediaList) -> bool {
    list.media_queries.is_empty() || list.media_queries.iter().any(media_query_matches)
}

fn media_query_matches(query: &MediaQuery) -> bool {
    let matches = matches!(query.media_type, MediaType::All | MediaType::Print);
    if matches!(query.qualifier, Some(Qualifier::Not)) {
        !matches
    } else {
        matches
    }
}

impl StyleMatcher for SvgStylesheet {
    fn match_element(
        &self,
        node: roxmltree::Node<'_, '_>,
        pseudo: Option<&str>,
    ) -> MatchedDeclarations {
        let mut out = MatchedDeclarations::default();
        if pseudo.is_some() || self.rules.is_empty() {
            return out;
        }
        let mut matched: Vec<&StyleRule> = self
            .rules
            .iter()
            .filter(|rule| selector_matches(node, &rule.selector))
            .collect();
        matched.sort_by(|a, b| {
            a.selector
                .specificity
                .cmp(&b.selector.specificity)
                .then(a.order.cmp(&b.order))
        });
        for rule in matched {
            out.extend(rule.declarations.clone());
        }
        out
    }
}

/// Splits a declaration list (`a: b; c: d !important`). Semicolons inside
/// quotes or parentheses do not end a declaration.
pub fn parse_declarations(input: &str) -> MatchedDeclarations {
    let mut out = MatchedDeclarations::default();
    for raw in split_top_level(input) {
        let Some((name, value)) = raw.split_once(':') else {
            continue;
        };
        let name = name.trim().to_string();
        let mut value = value.trim();
        if name.is_empty() {
            continue;
        }
        let important = match value.rfind('!') {
            Some(bang) if value[bang + 1..].trim().eq_ignore_ascii_case("important") => {
                value = value[..bang].trim_end();
                true
            }
            _ => false,
        };
        let declaration = Declaration {
            name,
            value: value.to_string(),
        };
        if important {
            out.important.push(declaration);
        } else {
            out.normal.push(declaration);
        }
    }
    out
}

fn split_top_level(input: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0usize;
    for (idx, ch) in input.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                parts.push(&input[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts.into_iter().filter(|part| !part.trim().is_empty()).collect()
}

fn parse_selector(raw: &str) -> Option<Selector> {
    let selector = raw.trim();
    if selector.is_empty() {
        return None;
    }

    let mut parts = Vec::new();
    let mut specificity = Specificity(0, 0, 0);
    for token in selector.split_whitespace() {
        let part = parse_simple_selector(token)?;
        if part.id.is_some() {
            specificity.0 += 1;
        }
        specificity.1 += part.classes.len() as u16;
        if part.tag.is_some() {
            specificity.2 += 1;
        }
        parts.push(part);
    }
    if parts.is_empty() {
        return None;
    }
    Some(Selector { parts, specificity })
}

fn parse_simple_selector(token: &str) -> Option<SimpleSelector> {
    if token.is_empty()
        || token.contains([':', '[', ']', '>', '+', '~'])
    {
        return None;
    }

    let bytes = token.as_bytes();
    let len = bytes.len();
    let mut i = 0usize;
    let mut tag = None;
    let mut id = None;
    let mut classes = Vec::new();
    let mut universal = false;

    if bytes[0] == b'*' {
        universal = true;
        i = 1;
    } else if is_ident_start(bytes[0]) {
        i += 1;
        while i < len && is_ident_char(bytes[i]) {
            i += 1;
        }
        tag = Some(token[..i].to_string());
    }

    while i < len {
        let marker = bytes[i];
        i += 1;
        let start = i;
        while i < len && is_ident_char(bytes[i]) {
            i += 1;
        }
        if start == i {
            return None;
        }
        let name = token[start..i].to_string();
        match marker {
            b'.' => classes.push(name),
            b'#' if id.is_none() => id = Some(name),
            _ => return None,
        }
    }

    if !universal && tag.is_none() && id.is_none() && classes.is_empty() {
        return None;
    }
    Some(SimpleSelector { tag, id, classes })
}

fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_ident_char(ch: u8) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, b'_' | b'-')
}

fn parent_element<'a, 'input>(
    node: roxmltree::Node<'a, 'input>,
) -> Option<roxmltree::Node<'a, 'input>> {
    node.ancestors().skip(1).find(|ancestor| ancestor.is_element())
}

fn simple_selector_matches(node: roxmltree::Node<'_, '_>, selector: &SimpleSelector) -> bool {
    if let Some(tag) = &selector.tag {
        if !node.tag_name().name().eq_ignore_ascii_case(tag) {
            return false;
        }
    }
    if let Some(id) = &selector.id {
        if node.attribute("id") != Some(id.as_str()) {
            return false;
        }
    }
    let classes = node.attribute("class").unwrap_or_default();
    selector
        .classes
        .iter()
        .all(|class_name| classes.split_whitespace().any(|candidate| candidate == class_name))
}

fn selector_matches(node: roxmltree::Node<'_, '_>, selector: &Selector) -> bool {
    let Some(last) = selector.parts.last() else {
        return false;
    };
    if !simple_selector_matches(node, last) {
        return false;
    }

    let mut anchor = parent_element(node);
    for part in selector.parts.iter().rev().skip(1) {
        let mut ancestor = anchor;
        let mut matched = None;
        while let Some(candidate) = ancestor {
            if simple_selector_matches(candidate, part) {
                matched = Some(candidate);
                break;
            }
            ancestor = parent_element(candidate);
        }
        let Some(candidate) = matched else {
            return false;
        };
        anchor = parent_element(candidate);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find<'a, 'input>(
        doc: &'a roxmltree::Document<'input>,
        id: &str,
    ) -> roxmltree::Node<'a, 'input> {
        doc.descendants()
            .find(|n| n.attribute("id") == Some(id))
            .expect("element")
    }

    #[test]
    fn declarations_split_importance_and_respect_parentheses() {
        let parsed = parse_declarations(
            "fill: red; stroke: url(\"data:a;b\") !important;; opacity:0.5 ! important",
        );
        assert_eq!(parsed.normal.len(), 1);
        assert_eq!(parsed.normal[0].value, "red");
        assert_eq!(parsed.important.len(), 2);
        assert_eq!(parsed.important[0].value, "url(\"data:a;b\")");
        assert_eq!(parsed.important[1].name, "opacity");
    }

    #[test]
    fn rules_are_ordered_by_specificity_then_source() {
        let sheet = SvgStylesheet::parse(
            "#a { fill: blue } rect { fill: red } .c { fill: green } rect { stroke: black }",
        );
        let xml = r#"<svg xmlns="http://www.w3.org/2000/svg"><rect id="a" class="c"/></svg>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let matched = sheet.match_element(find(&doc, "a"), None);
        let fills: Vec<&str> = matched
            .normal
            .iter()
            .filter(|d| d.name == "fill")
            .map(|d| d.value.as_str())
            .collect();
        assert_eq!(fills, vec!["red", "green", "blue"]);
        assert!(sheet.match_element(find(&doc, "a"), Some("before")).is_empty());
    }

    #[test]
    fn descendant_and_universal_selectors_match() {
        let sheet = SvgStylesheet::parse("g.outer circle { fill: red } * { stroke: blue }");
        let xml = r#"<svg xmlns="http://www.w3.org/2000/svg"><g class="outer"><g><circle id="c"/></g></g><circle id="d"/></svg>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let inner = sheet.match_element(find(&doc, "c"), None);
        assert!(inner.normal.iter().any(|d| d.name == "fill"));
        let outer = sheet.match_element(find(&doc, "d"), None);
        assert!(!outer.normal.iter().any(|d| d.name == "fill"));
        assert!(outer.normal.iter().any(|d| d.name == "stroke"));
    }

    #[test]
    fn media_rules_are_flattened_and_important_kept() {
        let sheet = SvgStylesheet::parse("@media print { rect { fill: red !important } }");
        assert_eq!(sheet.len(), 1);
        let sheet = SvgStylesheet::parse(
            "@media screen { a { fill: red } } @media not all { b { fill: red } } \
             @media not screen { c { fill: red } } @media (min-width: 10px) { d { fill: red } }",
        );
        assert_eq!(sheet.len(), 2);
        let xml = r#"<svg xmlns="http://www.w3.org/2000/svg"><rect id="r"/></svg>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let matched = sheet.match_element(find(&doc, "r"), None);
        assert_eq!(matched.important.len(), 1);
    }

    #[test]
    fn imports_are_fetched_through_the_fetcher() {
        use crate::assets::{Asset, AssetBundle, AssetKind};
        let mut bundle = AssetBundle::default();
        bundle.add(Asset::new(
            "https://x.test/extra.css",
            AssetKind::Css,
            b"circle { fill: red }".to_vec(),
        ));
        let xml = r#"<svg xmlns="http://www.w3.org/2000/svg"><style>@import "extra.css";</style><circle id="c"/></svg>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let sheet = SvgStylesheet::from_document(&doc, Some("https://x.test/a.svg"), &bundle);
        let matched = sheet.match_element(find(&doc, "c"), None);
        assert_eq!(matched.normal[0].value, "red");
    }

    #[test]
    fn unsupported_selectors_are_dropped() {
        assert!(parse_selector("a > b").is_none());
        assert!(parse_selector("rect:hover").is_none());
        assert_eq!(parse_selector("g .x #y").unwrap().specificity, Specificity(1, 1, 1));
    }
}
