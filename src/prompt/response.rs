/// Call the model sometimes emits to reload the data it was already given.
pub const DATA_LOADING_CALL: &str = "read_csv";

/// Call whose presence marks a reply as renderable plotting code.
pub const PLOT_DISPLAY_CALL: &str = "plt.show()";

/// Removes the single line holding the first data-loading call.
///
/// Matching is a plain substring search, so the call embedded in a longer
/// identifier also counts. Text without the call is returned unchanged.
pub fn strip_data_loading_line(script: &str) -> String {
    let Some(pos) = script.find(DATA_LOADING_CALL) else {
        return script.to_string();
    };

    let line_start = script[..pos].rfind('\n');
    let line_end = script[pos..].find('\n').map(|offset| pos + offset);

    match (line_start, line_end) {
        (Some(start), Some(end)) => format!("{}{}", &script[..start], &script[end..]),
        (Some(start), None) => script[..start].to_string(),
        (None, Some(end)) => script[end + 1..].to_string(),
        (None, None) => String::new(),
    }
}

pub fn is_renderable(reply: &str) -> bool {
    reply.contains(PLOT_DISPLAY_CALL)
}
