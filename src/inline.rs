use crate::debug::DebugLogger;
use crate::dom;
use crate::error::TablexlError;
use crate::style::parse_style_declarations;
use kuchiki::{NodeRef, Selector, Specificity};
use lightningcss::rules::{CssRule, CssRuleList};
use lightningcss::printer::PrinterOptions;
use lightningcss::stylesheet::{ParserOptions, StyleSheet};
use lightningcss::traits::ToCss;
use url::Url;

const IMPORTANT: &str = "!important";

struct RuleEntry {
    selector: Selector,
    specificity: Specificity,
    order: usize,
    normal: Vec<(String, String)>,
    important: Vec<(String, String)>,
}

#[derive(Clone, Default)]
pub struct CssInliner {
    base_url: Option<Url>,
    stylesheets: Vec<String>,
    debug: Option<DebugLogger>,
}

impl CssInliner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Base for relative `<link rel="stylesheet">` hrefs. Accepts a URL or an
    /// absolute filesystem path (a trailing `/` marks a directory).
    pub fn base_url(mut self, base: &str) -> Result<Self, TablexlError> {
        self.base_url = Some(parse_base_url(base)?);
        Ok(self)
    }

    /// CSS applied before any stylesheet found in the document.
    pub fn stylesheet(mut self, css: impl Into<String>) -> Self {
        self.stylesheets.push(css.into());
        self
    }

    pub(crate) fn with_debug(mut self, debug: Option<DebugLogger>) -> Self {
        self.debug = debug;
        self
    }

    pub fn inline(&self, html: &str) -> String {
        let document = dom::parse_document(html);
        self.inline_document(&document);
        document.to_string()
    }

    /// Rewrites `style` attributes of `document` in place.
    pub fn inline_document(&self, document: &NodeRef) {
        let rules = self.collect_rules(document);
        if rules.is_empty() {
            return;
        }

        for element in document
            .descendants()
            .filter_map(|node| node.into_element_ref())
        {
            let mut matched: Vec<&RuleEntry> = rules
                .iter()
                .filter(|rule| rule.selector.matches(&element))
                .collect();
            if matched.is_empty() {
                continue;
            }
            matched.sort_by(|a, b| {
                a.specificity
                    .cmp(&b.specificity)
                    .then_with(|| a.order.cmp(&b.order))
            });

            let node = element.as_node();
            let own = dom::attribute(node, "style").unwrap_or_default();
            let (own_normal, own_important) = split_important(parse_style_declarations(&own));

            let mut merged: Vec<(String, String)> = Vec::new();
            for rule in &matched {
                merge_into(&mut merged, &rule.normal);
            }
            merge_into(&mut merged, &own_normal);
            for rule in &matched {
                merge_into(&mut merged, &rule.important);
            }
            merge_into(&mut merged, &own_important);

            dom::set_attribute(node, "style", serialize_declarations(&merged));
        }
    }

    fn collect_rules(&self, document: &NodeRef) -> Vec<RuleEntry> {
        let mut rules = Vec::new();
        let mut order = 0usize;
        for css in &self.stylesheets {
            self.append_stylesheet(css, &mut rules, &mut order);
        }
        for node in document.descendants() {
            if dom::is_tag(&node, "style") {
                let css = node.text_contents();
                self.append_stylesheet(&css, &mut rules, &mut order);
            } else if dom::is_tag(&node, "link") && is_stylesheet_link(&node) {
                if let Some(css) = self.load_link(&node) {
                    self.append_stylesheet(&css, &mut rules, &mut order);
                }
            }
        }
        rules
    }

    fn append_stylesheet(&self, css: &str, rules: &mut Vec<RuleEntry>, order: &mut usize) {
        if css.trim().is_empty() {
            return;
        }
        let Ok(sheet) = StyleSheet::parse(css, ParserOptions::default()) else {
            log::warn!("skipping stylesheet that failed to parse");
            return;
        };
        self.append_rule_list(sheet.rules, rules, order);
    }

    fn append_rule_list(&self, list: CssRuleList, rules: &mut Vec<RuleEntry>, order: &mut usize) {
        for rule in list.0 {
            let CssRule::Style(style_rule) = rule else {
                continue;
            };
            let selectors = style_rule
                .selectors
                .to_css_string(PrinterOptions::default())
                .unwrap_or_default();
            let declarations = style_rule
                .declarations
                .to_css_string(PrinterOptions::default())
                .unwrap_or_default();
            let (normal, important) = split_important(parse_style_declarations(&declarations));
            if normal.is_empty() && important.is_empty() {
                *order += 1;
                continue;
            }
            for selector_raw in selectors.split(',') {
                let selector_raw = selector_raw.trim();
                let compiled = kuchiki::Selectors::compile(selector_raw).ok();
                if let Some(logger) = &self.debug {
                    let parsed = if compiled.is_some() { "true" } else { "false" };
                    logger.log_event(
                        "css.rule",
                        &[("selector", selector_raw), ("parsed", parsed)],
                    );
                }
                let Some(compiled) = compiled else {
                    continue;
                };
                for selector in compiled.0 {
                    rules.push(RuleEntry {
                        specificity: selector.specificity(),
                        selector,
                        order: *order,
                        normal: normal.clone(),
                        important: important.clone(),
                    });
                }
            }
            *order += 1;
        }
    }

    fn load_link(&self, node: &NodeRef) -> Option<String> {
        let href = dom::attribute(node, "href")?;
        let resolved = match &self.base_url {
            Some(base) => base.join(&href).ok(),
            None => Url::parse(&href).ok(),
        };
        let path = resolved
            .as_ref()
            .filter(|url| url.scheme() == "file")
            .and_then(|url| url.to_file_path().ok());
        let Some(path) = path else {
            self.skip_link(&href, "only local stylesheets are loaded");
            return None;
        };
        match std::fs::read_to_string(&path) {
            Ok(css) => Some(css),
            Err(err) => {
                self.skip_link(&href, &err.to_string());
                None
            }
        }
    }

    fn skip_link(&self, href: &str, reason: &str) {
        log::warn!("skipping stylesheet link {href}: {reason}");
        if let Some(logger) = &self.debug {
            logger.log_event("css.link_skipped", &[("href", href), ("reason", reason)]);
            logger.increment("css.link_skipped", 1);
        }
    }
}

/// Inlines `<style>` blocks and local stylesheet links of `html`.
pub fn inline_styles(html: &str, base_url: Option<&str>) -> Result<String, TablexlError> {
    let mut inliner = CssInliner::new();
    if let Some(base) = base_url {
        inliner = inliner.base_url(base)?;
    }
    Ok(inliner.inline(html))
}

pub(crate) fn parse_base_url(base: &str) -> Result<Url, TablexlError> {
    if let Ok(url) = Url::parse(base) {
        return Ok(url);
    }
    let path = std::path::Path::new(base);
    let url = if base.ends_with('/') || base.ends_with(std::path::MAIN_SEPARATOR) {
        Url::from_directory_path(path)
    } else {
        Url::from_file_path(path)
    };
    url.map_err(|_| TablexlError::InvalidConfiguration(format!("invalid base url {base:?}")))
}

fn is_stylesheet_link(node: &NodeRef) -> bool {
    dom::attribute(node, "rel")
        .map(|rel| {
            rel.split_whitespace()
                .any(|token| token.eq_ignore_ascii_case("stylesheet"))
        })
        .unwrap_or(false)
}

fn split_important(
    declarations: Vec<(String, String)>,
) -> (Vec<(String, String)>, Vec<(String, String)>) {
    let mut normal = Vec::new();
    let mut important = Vec::new();
    for (name, value) in declarations {
        match strip_important(&value) {
            Some(stripped) => important.push((name, stripped.to_string())),
            None => normal.push((name, value)),
        }
    }
    (normal, important)
}

/// Value without a trailing `!important` marker, if it carries one.
fn strip_important(value: &str) -> Option<&str> {
    let trimmed = value.trim_end();
    let cut = trimmed.len().checked_sub(IMPORTANT.len())?;
    if !trimmed.is_char_boundary(cut) || !trimmed[cut..].eq_ignore_ascii_case(IMPORTANT) {
        return None;
    }
    Some(trimmed[..cut].trim_end())
}

fn merge_into(target: &mut Vec<(String, String)>, declarations: &[(String, String)]) {
    for (name, value) in declarations {
        match target.iter_mut().find(|(existing, _)| existing == name) {
            Some(slot) => slot.1 = value.clone(),
            None => target.push((name.clone(), value.clone())),
        }
    }
}

fn serialize_declarations(declarations: &[(String, String)]) -> String {
    declarations
        .iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .collect::<Vec<_>>()
        .join("; ")
}
