use once_cell::sync::Lazy;

/// Attribute the recorder sets on the element an action targeted.
pub const TARGET_ATTRIBUTE: &str = "__playwright_target__";
pub const SHADOW_ROOT_ATTRIBUTE: &str = "__playwright_shadow_root_";
pub const SCROLL_TOP_ATTRIBUTE: &str = "__playwright_scroll_top_";
pub const SCROLL_LEFT_ATTRIBUTE: &str = "__playwright_scroll_left_";
pub const STYLE_SHEET_ATTRIBUTE: &str = "__playwright_style_sheet_";

const BOOTSTRAP_SOURCE: &str = include_str!("bootstrap.js");

static BOOTSTRAP: Lazy<String> = Lazy::new(|| {
    format!(
        "\n({})('{}', '{}', '{}', '{}')",
        BOOTSTRAP_SOURCE.trim_end(),
        SHADOW_ROOT_ATTRIBUTE,
        SCROLL_TOP_ATTRIBUTE,
        SCROLL_LEFT_ATTRIBUTE,
        STYLE_SHEET_ATTRIBUTE
    )
});

/// Inline script that rehydrates scroll offsets, iframes, shadow roots and
/// adopted stylesheets inside a rendered snapshot.
pub fn snapshot_script() -> &'static str {
    BOOTSTRAP.as_str()
}

/// Style and script appended after the snapshot body.
pub fn snapshot_trailer(call_id: &str) -> String {
    format!(
        "\n<style>*[{}=\"{}\"] {{ background-color: #6fa8dc7f; }}</style>\n<script>{}</script>\n",
        TARGET_ATTRIBUTE,
        call_id,
        snapshot_script()
    )
}
