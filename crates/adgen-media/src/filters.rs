//! Typed FFmpeg filter graphs.
//!
//! Filter arguments are kept as structured values and only serialized when
//! the command line is built. Serialization applies both FFmpeg escaping
//! levels: option values escape `\ ' :`, then the filter's argument string
//! escapes `\ ' [ ] , ;` for the graph parser. Arbitrary text (captions,
//! paths) therefore cannot break out of its option.

use std::fmt;

use adgen_models::{CaptionStyle, RenderProfile};

use crate::command::format_seconds;

/// Escape a single option value (first level).
pub fn escape_option_value(value: &str) -> String {
    escape_chars(value, &['\\', '\'', ':'])
}

/// Escape a filter argument string for the graph parser (second level).
pub fn escape_graph_args(args: &str) -> String {
    escape_chars(args, &['\\', '\'', '[', ']', ',', ';'])
}

fn escape_chars(value: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
enum FilterArg {
    Positional(String),
    Named(String, String),
}

/// A single filter with its options.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    name: String,
    args: Vec<FilterArg>,
}

impl Filter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Add an unnamed option value.
    pub fn positional(mut self, value: impl ToString) -> Self {
        self.args.push(FilterArg::Positional(value.to_string()));
        self
    }

    /// Add a `key=value` option.
    pub fn arg(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.args.push(FilterArg::Named(key.into(), value.to_string()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw (unescaped) value of a named option.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.args.iter().find_map(|arg| match arg {
            FilterArg::Named(k, v) if k == key => Some(v.as_str()),
            _ => None,
        })
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if self.args.is_empty() {
            return Ok(());
        }

        let joined = self
            .args
            .iter()
            .map(|arg| match arg {
                FilterArg::Positional(v) => escape_option_value(v),
                FilterArg::Named(k, v) => format!("{}={}", k, escape_option_value(v)),
            })
            .collect::<Vec<_>>()
            .join(":");

        write!(f, "={}", escape_graph_args(&joined))
    }
}

/// A linear chain of filters with optional input and output pad labels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterChain {
    inputs: Vec<String>,
    filters: Vec<Filter>,
    outputs: Vec<String>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(mut self, label: impl Into<String>) -> Self {
        self.inputs.push(label.into());
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn output(mut self, label: impl Into<String>) -> Self {
        self.outputs.push(label.into());
        self
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl fmt::Display for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for label in &self.inputs {
            write!(f, "[{label}]")?;
        }
        for (i, filter) in self.filters.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{filter}")?;
        }
        for label in &self.outputs {
            write!(f, "[{label}]")?;
        }
        Ok(())
    }
}

/// A set of chains separated by `;`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterGraph {
    chains: Vec<FilterChain>,
}

impl FilterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chain(mut self, chain: FilterChain) -> Self {
        self.chains.push(chain);
        self
    }

    pub fn chains(&self) -> &[FilterChain] {
        &self.chains
    }
}

impl fmt::Display for FilterGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.chains.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join(";"))
    }
}

/// Output label of the normalized video stream.
pub const NORMALIZED_LABEL: &str = "vout";

/// Conform one input to the render profile and cut it to `slot` seconds.
pub fn conform_chain(input_index: usize, slot: f64, profile: &RenderProfile) -> FilterChain {
    FilterChain::new()
        .input(format!("{input_index}:v"))
        .filter(
            Filter::new("scale")
                .arg("w", profile.width)
                .arg("h", profile.height)
                .arg("force_original_aspect_ratio", "decrease"),
        )
        .filter(
            Filter::new("pad")
                .arg("w", profile.width)
                .arg("h", profile.height)
                .arg("x", "(ow-iw)/2")
                .arg("y", "(oh-ih)/2")
                .arg("color", &profile.pad_color),
        )
        .filter(Filter::new("setsar").positional(1))
        .filter(Filter::new("fps").positional(profile.fps))
        .filter(Filter::new("format").positional("yuv420p"))
        .filter(Filter::new("trim").arg("duration", format_seconds(slot)))
        .filter(Filter::new("setpts").positional("PTS-STARTPTS"))
        .output(format!("v{input_index}"))
}

/// Build the normalize graph: conform every slot, concatenate in order and
/// cut the result to `total` seconds.
pub fn normalize_graph(slots: &[f64], total: f64, profile: &RenderProfile) -> FilterGraph {
    let mut graph = FilterGraph::new();
    for (i, slot) in slots.iter().enumerate() {
        graph = graph.chain(conform_chain(i, *slot, profile));
    }

    let mut concat = FilterChain::new();
    for i in 0..slots.len() {
        concat = concat.input(format!("v{i}"));
    }
    let concat = concat
        .filter(
            Filter::new("concat")
                .arg("n", slots.len())
                .arg("v", 1)
                .arg("a", 0),
        )
        .filter(Filter::new("trim").arg("duration", format_seconds(total)))
        .filter(Filter::new("setpts").positional("PTS-STARTPTS"))
        .output(NORMALIZED_LABEL);

    graph.chain(concat)
}

/// `drawtext` burning `text` in bottom-center during `[start, end]`.
///
/// `text` must already be sanitized; expansion is disabled so `%` stays
/// literal.
pub fn drawtext_filter(text: &str, start: f64, end: f64, style: &CaptionStyle) -> Filter {
    let mut filter = Filter::new("drawtext");
    if let Some(font) = &style.font_file {
        filter = filter.arg("fontfile", font);
    }
    filter
        .arg("text", text)
        .arg("expansion", "none")
        .arg("fontsize", style.font_size)
        .arg("fontcolor", &style.font_color)
        .arg("box", 1)
        .arg("boxcolor", &style.box_color)
        .arg("boxborderw", 16)
        .arg("x", "(w-text_w)/2")
        .arg("y", format!("h-text_h-{}", style.bottom_margin))
        .arg(
            "enable",
            format!("between(t,{},{})", format_seconds(start), format_seconds(end)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_value_escaping() {
        assert_eq!(escape_option_value("a:b"), "a\\:b");
        assert_eq!(escape_option_value("it's"), "it\\'s");
        assert_eq!(escape_option_value("c:\\x"), "c\\:\\\\x");
    }

    #[test]
    fn test_two_level_escaping() {
        let filter = Filter::new("drawtext").arg("text", "Sale: 50% off, today");
        // Level one escapes ':' once; level two escapes that backslash and ','
        assert_eq!(filter.to_string(), "drawtext=text=Sale\\\\: 50% off\\, today");
    }

    #[test]
    fn test_graph_metacharacters_escaped() {
        let filter = Filter::new("drawtext").arg("text", "[0:v];x");
        let s = filter.to_string();
        assert!(s.contains("\\["));
        assert!(s.contains("\\]"));
        assert!(s.contains("\\;"));
    }

    #[test]
    fn test_enable_expression_commas_escaped() {
        let filter = drawtext_filter("Hi", 1.0, 2.5, &CaptionStyle::default());
        let s = filter.to_string();
        assert!(s.contains("enable=between(t\\,1.000000\\,2.500000)"));
        assert!(s.contains("expansion=none"));
        assert_eq!(filter.get("text"), Some("Hi"));
    }

    #[test]
    fn test_chain_labels() {
        let chain = FilterChain::new()
            .input("0:v")
            .filter(Filter::new("setsar").positional(1))
            .filter(Filter::new("fps").positional(30))
            .output("v0");
        assert_eq!(chain.to_string(), "[0:v]setsar=1,fps=30[v0]");
    }

    #[test]
    fn test_normalize_graph_shape() {
        let profile = RenderProfile::default();
        let graph = normalize_graph(&[4.0, 4.0, 4.0], 12.0, &profile);
        assert_eq!(graph.chains().len(), 4);

        let s = graph.to_string();
        assert!(s.starts_with("[0:v]scale=w=1080:h=1920:force_original_aspect_ratio=decrease,pad="));
        assert!(s.contains("[v0][v1][v2]concat=n=3:v=1:a=0,trim=duration=12.000000"));
        assert!(s.ends_with("[vout]"));
        assert_eq!(s.matches("setsar=1").count(), 3);
    }

    #[test]
    fn test_font_file_path_escaped() {
        let style = CaptionStyle {
            font_file: Some("C:/fonts/a.ttf".to_string()),
            ..Default::default()
        };
        let s = drawtext_filter("x", 0.0, 1.0, &style).to_string();
        assert!(s.starts_with("drawtext=fontfile=C\\\\:/fonts/a.ttf:"));
    }
}
