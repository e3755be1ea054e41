use lazy_static::lazy_static;
use std::collections::HashSet;
use std::io::BufRead;

/// Marker shape names a `marker` column may carry, in full or one-letter
/// short form.
pub(crate) const RECOGNIZED_MARKER_TYPES: [&str; 6] =
    ["rectangle", "ellipse", "circle", "r", "e", "c"];

/// The `tab:` palette names of the recognized color vocabulary.
pub(crate) const TABLEAU_COLORS: [&str; 10] = [
    "tab:blue",
    "tab:orange",
    "tab:green",
    "tab:red",
    "tab:purple",
    "tab:brown",
    "tab:pink",
    "tab:gray",
    "tab:olive",
    "tab:cyan",
];

/// CSS4 named colors. Together with the `tab:` palette and the literal
/// `default` these form the vocabulary the `window` detector accepts as a
/// color name without further parsing.
pub(crate) const CSS4_COLORS: [&str; 148] = [
    "aliceblue",
    "antiquewhite",
    "aqua",
    "aquamarine",
    "azure",
    "beige",
    "bisque",
    "black",
    "blanchedalmond",
    "blue",
    "blueviolet",
    "brown",
    "burlywood",
    "cadetblue",
    "chartreuse",
    "chocolate",
    "coral",
    "cornflowerblue",
    "cornsilk",
    "crimson",
    "cyan",
    "darkblue",
    "darkcyan",
    "darkgoldenrod",
    "darkgray",
    "darkgreen",
    "darkgrey",
    "darkkhaki",
    "darkmagenta",
    "darkolivegreen",
    "darkorange",
    "darkorchid",
    "darkred",
    "darksalmon",
    "darkseagreen",
    "darkslateblue",
    "darkslategray",
    "darkslategrey",
    "darkturquoise",
    "darkviolet",
    "deeppink",
    "deepskyblue",
    "dimgray",
    "dimgrey",
    "dodgerblue",
    "firebrick",
    "floralwhite",
    "forestgreen",
    "fuchsia",
    "gainsboro",
    "ghostwhite",
    "gold",
    "goldenrod",
    "gray",
    "green",
    "greenyellow",
    "grey",
    "honeydew",
    "hotpink",
    "indianred",
    "indigo",
    "ivory",
    "khaki",
    "lavender",
    "lavenderblush",
    "lawngreen",
    "lemonchiffon",
    "lightblue",
    "lightcoral",
    "lightcyan",
    "lightgoldenrodyellow",
    "lightgray",
    "lightgreen",
    "lightgrey",
    "lightpink",
    "lightsalmon",
    "lightseagreen",
    "lightskyblue",
    "lightslategray",
    "lightslategrey",
    "lightsteelblue",
    "lightyellow",
    "lime",
    "limegreen",
    "linen",
    "magenta",
    "maroon",
    "mediumaquamarine",
    "mediumblue",
    "mediumorchid",
    "mediumpurple",
    "mediumseagreen",
    "mediumslateblue",
    "mediumspringgreen",
    "mediumturquoise",
    "mediumvioletred",
    "midnightblue",
    "mintcream",
    "mistyrose",
    "moccasin",
    "navajowhite",
    "navy",
    "oldlace",
    "olive",
    "olivedrab",
    "orange",
    "orangered",
    "orchid",
    "palegoldenrod",
    "palegreen",
    "paleturquoise",
    "palevioletred",
    "papayawhip",
    "peachpuff",
    "peru",
    "pink",
    "plum",
    "powderblue",
    "purple",
    "rebeccapurple",
    "red",
    "rosybrown",
    "royalblue",
    "saddlebrown",
    "salmon",
    "sandybrown",
    "seagreen",
    "seashell",
    "sienna",
    "silver",
    "skyblue",
    "slateblue",
    "slategray",
    "slategrey",
    "snow",
    "springgreen",
    "steelblue",
    "tan",
    "teal",
    "thistle",
    "tomato",
    "turquoise",
    "violet",
    "wheat",
    "white",
    "whitesmoke",
    "yellow",
    "yellowgreen",
];

lazy_static! {
    /// The recognized color-name vocabulary of the `window` detector.
    pub(crate) static ref RECOGNIZED_COLOR_NAMES: HashSet<&'static str> = {
        let mut set: HashSet<&'static str> = CSS4_COLORS.iter().copied().collect();
        set.extend(TABLEAU_COLORS.iter().copied());
        set.insert("default");
        set
    };
}

/// Returns `true` if `name` is in the recognized color-name vocabulary.
pub fn is_recognized_color_name(name: &str) -> bool {
    RECOGNIZED_COLOR_NAMES.contains(name)
}

/// Parses a single color specification into RGBA components.
///
/// Accepted forms are a recognized color name, a hex code (`#rgb`, `#rgba`,
/// `#rrggbb` or `#rrggbbaa`) and a grayscale value written as a float in
/// `[0, 1]`. Returns [`None`] for anything else.
pub fn parse_color_spec(spec: &str) -> Option<[f32; 4]> {
    let spec = spec.trim();
    if is_recognized_color_name(spec) {
        // named colors resolve downstream in the plotting layer; the decoder
        // only needs to accept them
        return Some([0.0, 0.0, 0.0, 1.0]);
    }
    if let Some(hex) = spec.strip_prefix('#') {
        return parse_hex_color(hex);
    }
    if let Ok(gray) = spec.parse::<f32>() {
        if (0.0..=1.0).contains(&gray) {
            return Some([gray, gray, gray, 1.0]);
        }
    }
    None
}

fn parse_hex_color(hex: &str) -> Option<[f32; 4]> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let component = |s: &str| u8::from_str_radix(s, 16).ok().map(|v| v as f32 / 255.0);
    let short = |s: &str| {
        u8::from_str_radix(s, 16)
            .ok()
            .map(|v| (v * 16 + v) as f32 / 255.0)
    };
    match hex.len() {
        3 | 4 => {
            let mut rgba = [0.0, 0.0, 0.0, 1.0];
            for (i, c) in hex.char_indices() {
                rgba[i] = short(&c.to_string())?;
            }
            Some(rgba)
        }
        6 | 8 => {
            let mut rgba = [0.0, 0.0, 0.0, 1.0];
            for i in 0..hex.len() / 2 {
                rgba[i] = component(&hex[i * 2..i * 2 + 2])?;
            }
            Some(rgba)
        }
        _ => None,
    }
}

/// Tests if the stream underlying the [`BufRead`] `reader` is gzipped or not
/// by examining the first 2 bytes for the magic header. This function
/// *requires*, but does not check, that none of the stream has yet been
/// consumed. It will fill the buffer to examine the first two bytes, but will
/// not consume them.
///
/// If the first 2 bytes could be succesfully read, this returns
/// [Ok]`(true)` if the stream is gzipped and [Ok]`(false)` if it is not.
/// Otherwise it returns the relevant [`std::io::Error`].
pub fn is_gzipped<T: BufRead>(reader: &mut T) -> std::io::Result<bool> {
    const GZIP_MAGIC_NUMBER: [u8; 2] = [0x1f, 0x8b];

    let src = reader.fill_buf()?;
    if src.get(..2) == Some(&GZIP_MAGIC_NUMBER) {
        Ok(true)
    } else {
        Ok(false)
    }
}
