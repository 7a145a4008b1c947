use crate::debug::DebugLogger;
use crate::style::{StyleKey, StyleMapping};
use std::collections::HashMap;
use std::sync::Arc;

pub const FILL_SOLID: &str = "solid";
pub const DEFAULT_HORIZONTAL_ALIGNMENT: &str = "general";

const BORDER_SIDES: [&str; 6] = ["left", "right", "top", "bottom", "diagonal", "outline"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Font {
    pub bold: bool,
    /// Hex RGB without the leading `#`.
    pub color: Option<String>,
    /// Points.
    pub size: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    pub horizontal: String,
    pub vertical: Option<String>,
    pub wrap_text: bool,
}

impl Default for Alignment {
    fn default() -> Self {
        Self {
            horizontal: DEFAULT_HORIZONTAL_ALIGNMENT.to_string(),
            vertical: None,
            wrap_text: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub pattern: String,
    pub start_color: String,
    pub end_color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BorderSide {
    pub style: Option<String>,
    pub color: Option<String>,
}

impl BorderSide {
    pub fn is_set(&self) -> bool {
        self.style.is_some() || self.color.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Border {
    pub left: BorderSide,
    pub right: BorderSide,
    pub top: BorderSide,
    pub bottom: BorderSide,
    pub diagonal: BorderSide,
    pub outline: BorderSide,
}

impl Border {
    fn side_mut(&mut self, name: &str) -> Option<&mut BorderSide> {
        match name {
            "left" => Some(&mut self.left),
            "right" => Some(&mut self.right),
            "top" => Some(&mut self.top),
            "bottom" => Some(&mut self.bottom),
            "diagonal" => Some(&mut self.diagonal),
            "outline" => Some(&mut self.outline),
            _ => None,
        }
    }
}

/// Compiled, immutable cell appearance. Shared through [`StyleCache`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStyle {
    /// Fingerprint of the effective cascade this style was compiled from.
    pub name: String,
    pub font: Font,
    pub alignment: Alignment,
    pub fill: Option<Fill>,
    pub border: Border,
}

impl ResolvedStyle {
    pub fn compile(mapping: &StyleMapping) -> Self {
        Self::from_key(&mapping.effective())
    }

    pub(crate) fn from_key(key: &StyleKey) -> Self {
        let color = |property: &str| -> Option<String> {
            key.get(property)
                .map(|value| value.strip_prefix('#').unwrap_or(value))
                .and_then(colormap)
        };

        let font = Font {
            bold: key.get("font-weight").map(is_bold_weight).unwrap_or(false),
            color: color("color"),
            size: key.get("font-size").and_then(parse_font_size),
        };

        let alignment = Alignment {
            horizontal: key
                .get("text-align")
                .unwrap_or(DEFAULT_HORIZONTAL_ALIGNMENT)
                .to_string(),
            vertical: key.get("vertical-align").map(str::to_string),
            wrap_text: key.get("white-space").unwrap_or("nowrap") == "normal",
        };

        let fill = color("background-color").map(|start_color| Fill {
            pattern: key.get("fill-type").unwrap_or(FILL_SOLID).to_string(),
            start_color,
            end_color: color("foreground-color"),
        });

        let mut border = Border::default();
        for side_name in BORDER_SIDES {
            if let Some(side) = border.side_mut(side_name) {
                side.style = key
                    .get(&format!("border-{side_name}-style"))
                    .map(str::to_string);
                side.color = color(&format!("border-{side_name}-color"));
            }
        }

        Self {
            name: key.fingerprint(),
            font,
            alignment,
            fill,
            border,
        }
    }
}

/// Maps known color names to hex and expands three-digit hex colors.
///
/// Input and output carry no leading `#`. Unknown values pass through unchanged.
pub fn colormap(color: &str) -> Option<String> {
    let color = color.trim();
    if color.is_empty() {
        return None;
    }
    let lower = color.to_ascii_lowercase();
    let named = match lower.as_str() {
        "black" => Some("000000"),
        "white" => Some("FFFFFF"),
        "red" => Some("FF0000"),
        "lime" => Some("00FF00"),
        "green" => Some("008000"),
        "blue" => Some("0000FF"),
        "yellow" => Some("FFFF00"),
        "cyan" | "aqua" => Some("00FFFF"),
        "magenta" | "fuchsia" => Some("FF00FF"),
        "silver" => Some("C0C0C0"),
        "gray" | "grey" => Some("808080"),
        "maroon" => Some("800000"),
        "olive" => Some("808000"),
        "purple" => Some("800080"),
        "teal" => Some("008080"),
        "navy" => Some("000080"),
        "orange" => Some("FFA500"),
        _ => None,
    };
    if let Some(hex) = named {
        return Some(hex.to_string());
    }
    if color.len() == 3 && color.chars().all(|c| c.is_ascii_hexdigit()) {
        return Some(color.chars().flat_map(|c| [c, c]).collect());
    }
    Some(color.to_string())
}

fn is_bold_weight(raw: &str) -> bool {
    let raw = raw.trim();
    raw.eq_ignore_ascii_case("bold")
        || raw.eq_ignore_ascii_case("bolder")
        || raw.parse::<u32>().map(|weight| weight >= 600).unwrap_or(false)
}

fn parse_font_size(raw: &str) -> Option<f64> {
    let raw = raw.trim().to_ascii_lowercase();
    let (number, scale) = if let Some(value) = raw.strip_suffix("px") {
        (value, 0.75)
    } else if let Some(value) = raw.strip_suffix("pt") {
        (value, 1.0)
    } else {
        (raw.as_str(), 1.0)
    };
    let size = number.trim().parse::<f64>().ok()? * scale;
    (size.is_finite() && size > 0.0).then_some(size)
}

/// Interns [`ResolvedStyle`]s by effective cascade for one conversion run.
///
/// Two mappings whose effective cascades are equal get the same `Arc`.
#[derive(Default)]
pub struct StyleCache {
    known: HashMap<StyleKey, Arc<ResolvedStyle>>,
    hits: u64,
    debug: Option<DebugLogger>,
}

impl StyleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_debug(debug: Option<DebugLogger>) -> Self {
        Self {
            debug,
            ..Self::default()
        }
    }

    pub fn compile(&mut self, mapping: &StyleMapping) -> Arc<ResolvedStyle> {
        let key = mapping.effective();
        if let Some(style) = self.known.get(&key) {
            self.hits += 1;
            if let Some(logger) = &self.debug {
                logger.increment("style.cache_hit", 1);
            }
            return Arc::clone(style);
        }
        let style = Arc::new(ResolvedStyle::from_key(&key));
        if let Some(logger) = &self.debug {
            logger.increment("style.cache_miss", 1);
            let cascade = key.to_string();
            logger.log_event(
                "style.compiled",
                &[("name", style.name.as_str()), ("cascade", cascade.as_str())],
            );
        }
        self.known.insert(key, Arc::clone(&style));
        style
    }

    /// Number of distinct styles compiled so far.
    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }
}
