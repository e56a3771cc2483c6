//! Property classification and value normalization for `attribute_equals`.
//!
//! Colours are compared in a canonical `rgb(r,g,b)` / `rgba(r,g,b,a)` form
//! without spaces, so `green`, `#008000` and `rgb(0, 128, 0)` are equal.

/// CSS properties recognised without a hyphen in their name
const PLAIN_PROPERTIES: &[&str] = &[
    "color",
    "display",
    "visibility",
    "opacity",
    "width",
    "height",
    "position",
    "top",
    "bottom",
    "left",
    "right",
    "padding",
    "margin",
    "border",
    "outline",
    "cursor",
    "float",
    "clear",
    "overflow",
    "transform",
    "transition",
    "animation",
    "gap",
    "order",
    "flex",
    "grid",
    "content",
];

/// Hyphenated names that are HTML attributes, not CSS
const HYPHENATED_ATTRIBUTES: &[&str] = &["accept-charset", "http-equiv"];

const NAMED_COLORS: &[(&str, &str)] = &[
    ("black", "rgb(0,0,0)"),
    ("white", "rgb(255,255,255)"),
    ("red", "rgb(255,0,0)"),
    ("green", "rgb(0,128,0)"),
    ("lime", "rgb(0,255,0)"),
    ("blue", "rgb(0,0,255)"),
    ("yellow", "rgb(255,255,0)"),
    ("cyan", "rgb(0,255,255)"),
    ("aqua", "rgb(0,255,255)"),
    ("magenta", "rgb(255,0,255)"),
    ("fuchsia", "rgb(255,0,255)"),
    ("gray", "rgb(128,128,128)"),
    ("grey", "rgb(128,128,128)"),
    ("silver", "rgb(192,192,192)"),
    ("maroon", "rgb(128,0,0)"),
    ("olive", "rgb(128,128,0)"),
    ("navy", "rgb(0,0,128)"),
    ("teal", "rgb(0,128,128)"),
    ("purple", "rgb(128,0,128)"),
    ("orange", "rgb(255,165,0)"),
    ("pink", "rgb(255,192,203)"),
    ("brown", "rgb(165,42,42)"),
    ("gold", "rgb(255,215,0)"),
    ("lightblue", "rgb(173,216,230)"),
    ("lightgreen", "rgb(144,238,144)"),
    ("lightgray", "rgb(211,211,211)"),
    ("lightgrey", "rgb(211,211,211)"),
    ("darkgray", "rgb(169,169,169)"),
    ("darkgrey", "rgb(169,169,169)"),
    ("darkblue", "rgb(0,0,139)"),
    ("darkgreen", "rgb(0,100,0)"),
    ("darkred", "rgb(139,0,0)"),
    ("transparent", "rgba(0,0,0,0)"),
];

/// Computed-style property to read for an attribute name, or `None` when
/// the name is a plain HTML attribute
pub fn css_property_for(attribute_name: &str) -> Option<String> {
    let name = attribute_name.trim().to_ascii_lowercase();
    if name == "background" {
        return Some("background-color".to_string());
    }
    is_css_property(&name).then_some(name)
}

pub fn is_css_property(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    if PLAIN_PROPERTIES.contains(&name.as_str()) {
        return true;
    }
    name.contains('-')
        && !name.starts_with("data-")
        && !name.starts_with("aria-")
        && !HYPHENATED_ATTRIBUTES.contains(&name.as_str())
}

/// Colour-valued properties are normalized through [`normalize_color`]
pub fn is_color_property(property: &str) -> bool {
    property.contains("color") || property.contains("background")
}

/// Normalize a computed or expected value for comparison
pub fn normalize_value(property: &str, value: &str) -> String {
    if is_color_property(property) {
        normalize_color(value)
    } else {
        value.trim().replace(['"', '\''], "")
    }
}

pub fn normalize_color(value: &str) -> String {
    let compact: String = value
        .to_ascii_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    if let Some((_, rgb)) = NAMED_COLORS.iter().find(|(name, _)| *name == compact) {
        return rgb.to_string();
    }
    if let Some(hex) = compact.strip_prefix('#') {
        if let Some(rgb) = hex_to_rgb(hex) {
            return rgb;
        }
    }
    if let Some(inner) = compact
        .strip_prefix("rgba(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        let parts: Vec<&str> = inner.split(',').collect();
        if parts.len() == 4 && matches!(parts[3], "1" | "1.0") {
            return format!("rgb({},{},{})", parts[0], parts[1], parts[2]);
        }
    }
    compact
}

fn hex_to_rgb(hex: &str) -> Option<String> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let expanded: String = match hex.len() {
        3 | 4 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 | 8 => hex.to_string(),
        _ => return None,
    };

    let channel = |i: usize| u8::from_str_radix(&expanded[i..i + 2], 16).ok();
    let (r, g, b) = (channel(0)?, channel(2)?, channel(4)?);

    if expanded.len() == 8 {
        let a = channel(6)?;
        if a == 255 {
            return Some(format!("rgb({},{},{})", r, g, b));
        }
        let alpha = (a as f64 / 255.0 * 100.0).round() / 100.0;
        return Some(format!("rgba({},{},{},{})", r, g, b, alpha));
    }
    Some(format!("rgb({},{},{})", r, g, b))
}
