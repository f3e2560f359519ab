use std::path::{Path, PathBuf};

/// One rasterized glyph: a coverage bitmap plus placement metrics.
///
/// `ymin` follows the fontdue convention: offset of the bitmap's bottom edge
/// relative to the baseline (negative for descenders).
#[derive(Clone, Debug)]
pub struct RasterGlyph {
    pub width: usize,
    pub height: usize,
    pub ymin: i32,
    pub advance: f32,
    pub coverage: Vec<u8>,
}

/// A face the atlas builder can rasterize from.
///
/// `Builtin` is the last-resort fallback: a scalable 5x7 pixel face covering
/// exactly the clock alphabet, so glyph rasterization can never fail.
pub enum FontFace {
    Outline(fontdue::Font),
    Builtin(BuiltinFace),
}

impl FontFace {
    pub fn is_builtin(&self) -> bool {
        matches!(self, Self::Builtin(_))
    }

    pub fn rasterize(&self, ch: char, px: f32) -> RasterGlyph {
        match self {
            Self::Outline(font) => {
                let (metrics, coverage) = font.rasterize(ch, px);
                RasterGlyph {
                    width: metrics.width,
                    height: metrics.height,
                    ymin: metrics.ymin,
                    advance: metrics.advance_width,
                    coverage,
                }
            }
            Self::Builtin(face) => face.rasterize(ch, px),
        }
    }
}

impl std::fmt::Debug for FontFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Outline(_) => f.write_str("FontFace::Outline"),
            Self::Builtin(_) => f.write_str("FontFace::Builtin"),
        }
    }
}

/// Resolve a face for `family`, searching `extra_dirs` then the platform
/// font directories. Never fails: unresolvable families degrade to any
/// loadable sans-serif face and finally to the built-in pixel face.
pub fn resolve_face(family: &str, extra_dirs: &[PathBuf]) -> FontFace {
    let mut candidates = Vec::new();
    for dir in extra_dirs {
        collect_font_files(dir, 0, &mut candidates);
    }
    for dir in platform_font_dirs() {
        collect_font_files(&dir, 0, &mut candidates);
    }

    let wanted = normalize_name(family);
    let mut matches: Vec<&PathBuf> = candidates
        .iter()
        .filter(|p| stem_of(p).contains(&wanted) && !wanted.is_empty())
        .collect();
    // The clock face is set bold; prefer a bold cut, then the shortest stem
    // (usually the plain style over Italic/Condensed variants).
    matches.sort_by_key(|p| {
        let stem = stem_of(p);
        (!stem.contains("bold") as u8, stem.len())
    });

    for path in &matches {
        if let Some(face) = load_outline(path) {
            return FontFace::Outline(face);
        }
    }

    tracing::warn!(family, "font family not found, falling back to a default face");

    const KNOWN_DEFAULTS: [&str; 6] = [
        "dejavusans",
        "liberationsans",
        "notosans",
        "roboto",
        "arial",
        "freesans",
    ];
    let mut fallbacks: Vec<&PathBuf> = candidates
        .iter()
        .filter(|p| {
            let stem = stem_of(p);
            KNOWN_DEFAULTS.iter().any(|d| stem.contains(d))
        })
        .collect();
    fallbacks.sort_by_key(|p| stem_of(p).len());

    for path in fallbacks.iter().copied().chain(candidates.iter().take(32)) {
        if let Some(face) = load_outline(path) {
            return FontFace::Outline(face);
        }
    }

    tracing::warn!("no usable system font, using the built-in pixel face");
    FontFace::Builtin(BuiltinFace)
}

fn load_outline(path: &Path) -> Option<fontdue::Font> {
    let bytes = std::fs::read(path).ok()?;
    let font = fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default()).ok()?;
    // A face that cannot shape the clock alphabet is useless here.
    for ch in "0123456789:".chars() {
        if font.lookup_glyph_index(ch) == 0 {
            return None;
        }
    }
    Some(font)
}

fn platform_font_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![
        PathBuf::from("/usr/share/fonts"),
        PathBuf::from("/usr/local/share/fonts"),
        PathBuf::from("/Library/Fonts"),
        PathBuf::from("/System/Library/Fonts"),
        PathBuf::from("C:\\Windows\\Fonts"),
    ];
    if let Ok(home) = std::env::var("HOME") {
        dirs.push(PathBuf::from(&home).join(".fonts"));
        dirs.push(PathBuf::from(&home).join(".local/share/fonts"));
        dirs.push(PathBuf::from(&home).join("Library/Fonts"));
    }
    dirs
}

fn collect_font_files(dir: &Path, depth: usize, out: &mut Vec<PathBuf>) {
    const MAX_DEPTH: usize = 4;
    const MAX_FILES: usize = 2048;
    if depth > MAX_DEPTH || out.len() >= MAX_FILES {
        return;
    }
    let Ok(rd) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in rd.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_font_files(&path, depth + 1, out);
            continue;
        }
        let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
            continue;
        };
        let ext = ext.to_ascii_lowercase();
        if ext == "ttf" || ext == "otf" {
            out.push(path);
        }
        if out.len() >= MAX_FILES {
            return;
        }
    }
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(normalize_name)
        .unwrap_or_default()
}

fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Scalable 5x7 pixel face for `0`-`9` and `:`.
pub struct BuiltinFace;

const GLYPH_ROWS: usize = 7;
const GLYPH_COLS: usize = 5;

fn builtin_rows(ch: char) -> [u8; GLYPH_ROWS] {
    match ch {
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        _ => [0x1F, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1F],
    }
}

impl BuiltinFace {
    fn rasterize(&self, ch: char, px: f32) -> RasterGlyph {
        // Scale so the 7-row cap height lands near 70% of the em, like a
        // typical digit cap height.
        let factor = ((px * 0.1).round() as usize).max(1);
        let rows = builtin_rows(ch);

        let width = GLYPH_COLS * factor;
        let height = GLYPH_ROWS * factor;
        let mut coverage = vec![0u8; width * height];
        for (r, bits) in rows.iter().enumerate() {
            for c in 0..GLYPH_COLS {
                if bits & (1 << (GLYPH_COLS - 1 - c)) == 0 {
                    continue;
                }
                for dy in 0..factor {
                    let y = r * factor + dy;
                    let start = y * width + c * factor;
                    coverage[start..start + factor].fill(255);
                }
            }
        }

        RasterGlyph {
            width,
            height,
            ymin: 0,
            advance: ((GLYPH_COLS + 1) * factor) as f32,
            coverage,
        }
    }
}
