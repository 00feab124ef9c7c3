//! Swap specs
//!
//! Parses `hw-swap` attribute text: a style name followed by
//! space-separated `name:value` modifiers.

use crate::{SyntaxWarning, parse_interval};

/// DOM patch strategy
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SwapStyle {
    /// No mutation
    None,
    /// Replace all children of the target
    #[default]
    InnerHtml,
    /// Replace the target itself
    OuterHtml,
    /// Insert before the target
    BeforeBegin,
    /// Insert as first child
    AfterBegin,
    /// Insert as last child
    BeforeEnd,
    /// Insert after the target
    AfterEnd,
    /// Remove the target, ignore the fragment
    Delete,
    /// Named extension style, resolved through the registry
    Extension(String),
}

impl SwapStyle {
    /// Parse a style name; unknown names become extension styles
    pub fn parse(name: &str) -> SwapStyle {
        match name {
            "none" => SwapStyle::None,
            "innerHTML" => SwapStyle::InnerHtml,
            "outerHTML" => SwapStyle::OuterHtml,
            "beforebegin" => SwapStyle::BeforeBegin,
            "afterbegin" => SwapStyle::AfterBegin,
            "beforeend" => SwapStyle::BeforeEnd,
            "afterend" => SwapStyle::AfterEnd,
            "delete" => SwapStyle::Delete,
            other => SwapStyle::Extension(other.to_string()),
        }
    }
}

/// `scroll:`/`show:` directive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirective {
    Top,
    Bottom,
}

impl ScrollDirective {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "top" => Some(ScrollDirective::Top),
            "bottom" => Some(ScrollDirective::Bottom),
            _ => None,
        }
    }
}

/// How to apply response content relative to the target
#[derive(Debug, Clone, PartialEq)]
pub struct SwapSpec {
    pub style: SwapStyle,
    pub swap_delay_ms: u64,
    pub settle_delay_ms: u64,
    pub scroll: Option<ScrollDirective>,
    pub scroll_target: Option<String>,
    pub show: Option<ScrollDirective>,
    pub show_target: Option<String>,
    pub focus_scroll: Option<bool>,
}

impl SwapSpec {
    /// A spec with the given style and default delays
    pub fn with_style(style: SwapStyle, settle_delay_ms: u64) -> Self {
        Self {
            style,
            swap_delay_ms: 0,
            settle_delay_ms,
            scroll: None,
            scroll_target: None,
            show: None,
            show_target: None,
            focus_scroll: None,
        }
    }
}

/// Parse a `hw-swap` value on top of configured defaults
pub fn parse_swap(
    source: &str,
    default_style: SwapStyle,
    default_swap_delay_ms: u64,
    default_settle_delay_ms: u64,
) -> (SwapSpec, Vec<SyntaxWarning>) {
    let mut spec = SwapSpec {
        style: default_style,
        swap_delay_ms: default_swap_delay_ms,
        settle_delay_ms: default_settle_delay_ms,
        scroll: None,
        scroll_target: None,
        show: None,
        show_target: None,
        focus_scroll: None,
    };
    let mut warnings = Vec::new();

    for (i, token) in source.split_whitespace().enumerate() {
        match token.split_once(':') {
            None => {
                if i == 0 {
                    spec.style = SwapStyle::parse(token);
                } else {
                    warnings.push(SyntaxWarning::new(source, format!("unknown swap modifier '{token}'")));
                }
            }
            Some(("swap", value)) => match parse_interval(value) {
                Some(ms) => spec.swap_delay_ms = ms,
                None => warnings.push(SyntaxWarning::new(source, "bad swap delay")),
            },
            Some(("settle", value)) => match parse_interval(value) {
                Some(ms) => spec.settle_delay_ms = ms,
                None => warnings.push(SyntaxWarning::new(source, "bad settle delay")),
            },
            Some(("scroll", value)) => {
                let (target, dir) = split_scroll_value(value);
                match dir {
                    Some(d) => {
                        spec.scroll = Some(d);
                        spec.scroll_target = target;
                    }
                    None => warnings.push(SyntaxWarning::new(source, format!("bad scroll value '{value}'"))),
                }
            }
            Some(("show", value)) => {
                let (target, dir) = split_scroll_value(value);
                match dir {
                    Some(d) => {
                        spec.show = Some(d);
                        spec.show_target = target;
                    }
                    None => warnings.push(SyntaxWarning::new(source, format!("bad show value '{value}'"))),
                }
            }
            Some(("focus-scroll", value)) => match value {
                "true" => spec.focus_scroll = Some(true),
                "false" => spec.focus_scroll = Some(false),
                _ => warnings.push(SyntaxWarning::new(source, "focus-scroll must be true or false")),
            },
            Some((name, _)) => {
                warnings.push(SyntaxWarning::new(source, format!("unknown swap modifier '{name}'")));
            }
        }
    }
    (spec, warnings)
}

/// `scroll:bottom` vs `scroll:#list:bottom` — the direction is the last
/// segment, anything before it is a target selector
fn split_scroll_value(value: &str) -> (Option<String>, Option<ScrollDirective>) {
    match value.rsplit_once(':') {
        Some((target, dir)) => (Some(target.to_string()), ScrollDirective::parse(dir)),
        None => (None, ScrollDirective::parse(value)),
    }
}
