//! SVG sprite composition for icon favicons.

use sigil_model::Icon;

/// Canvas size the sprite is rasterised at.
const SPRITE_SIZE: u32 = 1_000;

/// View box every pack's symbols are authored against.
const VIEW_BOX: &str = "0 0 512 512";

/// Default styling rules keyed by icon-pack identity.
///
/// Pack symbols rely on class-based styling that lives in the pack's own
/// stylesheet; the sprite has to carry an equivalent inline so the icon
/// survives rasterisation outside the pack's pages.
fn pack_default_style(pack_name: &str) -> Option<&'static str> {
    match pack_name {
        "Ionicons" => Some(
            ".ionicon { fill: currentColor; stroke: currentColor; } \
             .ionicon-fill-none { fill: none; } \
             .ionicon-stroke-width { stroke-width: 32px; }",
        ),
        "Font_Awesome" => Some(".Font_Awesome { fill: currentColor; stroke: currentColor; }"),
        "Lucide" => Some(
            ".Lucide { stroke: currentColor; fill: none; stroke-width: 2; \
             stroke-linecap: round; stroke-linejoin: round; }",
        ),
        _ => None,
    }
}

/// Compose a standalone SVG sprite for an icon.
///
/// The sprite embeds the icon's `<symbol>` fragment, references it via
/// `<use>`, prepends the pack's default style block, and applies the
/// theme foreground color (consumed by `currentColor` in the pack rules)
/// inline on the root. `color: None` leaves the pack's own colors
/// untouched.
#[must_use]
pub fn favicon_sprite(icon: &Icon, color: Option<&str>) -> String {
    let style_attr = color.map_or_else(String::new, |color| format!(" style=\"color: {color}\""));
    let style_block = pack_default_style(&icon.icon_pack_name)
        .map_or_else(String::new, |rules| format!("<style>{rules}</style>"));

    format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"{VIEW_BOX}\" \
         icon-id=\"{id}\" width=\"{SPRITE_SIZE}\" height=\"{SPRITE_SIZE}\"{style_attr}>\
         {style_block}<use href=\"#{id}\"/>{symbol}</svg>",
        id = icon.id,
        symbol = icon.symbol,
    )
}
