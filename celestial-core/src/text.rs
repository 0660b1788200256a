//! 文本渲染（字体栅格化 → RGBA 像素）。
//!
//! 界面层的标签与按钮标题在这里被排版并栅格化为一张与元素同尺寸的 RGBA 图像，
//! 再由渲染路径上传为纹理。
//!
//! - 字体可来自系统字体（按家族名 + 字重查找，找不到时依次回退到常见无衬线字体）或资源包内的字体文件
//! - 支持按宽度自动换行、水平对齐、最大行数；文本块在元素高度内垂直居中

use std::{collections::HashMap, sync::Arc};

use anyhow::{Context, anyhow};
use fontdue::layout::{
    CoordinateSystem, HorizontalAlign, Layout, LayoutSettings, TextStyle, VerticalAlign,
    WrapStyle,
};
use parking_lot::Mutex;

use crate::{
    color::Color,
    resource::{ResourceHandle, load_bytes},
};

/// 字体查找失败时依次尝试的家族名。
const FALLBACK_FAMILIES: [&str; 5] = [
    "Helvetica Neue",
    "Helvetica",
    "DejaVu Sans",
    "Liberation Sans",
    "Noto Sans",
];

/// 字体来源。
///
/// - [`Font::System`]：按字体描述（家族名、字重）查找系统字体。
/// - [`Font::Resource`]：使用资源句柄指向的字体文件（ttf/otf/ttc），并用名称从字体集里选中具体字体。
#[derive(Debug, Clone)]
pub enum Font {
    System(FontDescriptor),
    Resource(ResourceHandle, String),
}

/// 系统字体描述。
#[derive(Debug, Clone, PartialEq)]
pub struct FontDescriptor {
    pub family: String,
    /// CSS 风格字重：100 = Thin，400 = Regular，700 = Bold。
    pub weight: u16,
}

impl FontDescriptor {
    pub fn new(family: impl Into<String>, weight: u16) -> Self {
        Self {
            family: family.into(),
            weight,
        }
    }

    /// 细体无衬线（Helvetica Neue Thin）。
    pub fn thin() -> Self {
        Self::new("Helvetica Neue", 100)
    }

    /// 常规字重的系统无衬线字体。
    pub fn system() -> Self {
        Self::new("Helvetica Neue", 400)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlignment {
    #[default]
    Left,
    Center,
    Right,
}

/// 标签排版参数。
#[derive(Debug, Clone)]
pub struct TextStyleOptions {
    pub font: Font,
    /// 字号（点）。
    pub size: f32,
    pub color: Color,
    /// 最大行数，0 表示不限。
    pub lines: usize,
    pub alignment: TextAlignment,
}

/// 栅格化结果：非预乘 RGBA8。
#[derive(Debug, Clone)]
pub struct RasterizedText {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// 在 `width_px × height_px` 的区域内排版并栅格化文本。
///
/// `scale` 为点到像素的比例，会同时作用于字号。
pub fn rasterize_label(
    text: &str,
    options: &TextStyleOptions,
    (width_px, height_px): (u32, u32),
    scale: f32,
) -> anyhow::Result<RasterizedText> {
    let width = width_px.max(1);
    let height = height_px.max(1);
    let mut rgba = vec![0u8; width as usize * height as usize * 4];

    if text.is_empty() {
        return Ok(RasterizedText {
            width,
            height,
            rgba,
        });
    }

    let font = load_font(&options.font)?;
    let fonts = [font.as_ref()];

    let mut layout = Layout::new(CoordinateSystem::PositiveYDown);
    layout.reset(&LayoutSettings {
        max_width: Some(width as f32),
        horizontal_align: match options.alignment {
            TextAlignment::Left => HorizontalAlign::Left,
            TextAlignment::Center => HorizontalAlign::Center,
            TextAlignment::Right => HorizontalAlign::Right,
        },
        vertical_align: VerticalAlign::Top,
        wrap_style: WrapStyle::Word,
        ..LayoutSettings::default()
    });
    layout.append(&fonts, &TextStyle::new(text, options.size * scale, 0));

    let (glyph_limit, block_height) = visible_block(&layout, options.lines);
    let offset_y = ((height as f32 - block_height) * 0.5).max(0.0).round() as i32;

    let mut target = DrawRgbaTarget {
        rgba: &mut rgba,
        width,
        height,
    };
    draw_glyphs(
        &layout.glyphs()[..glyph_limit],
        font.as_ref(),
        &mut target,
        (0, offset_y),
        options.color.to_rgba8(),
    );

    Ok(RasterizedText {
        width,
        height,
        rgba,
    })
}

/// 计算行数限制内可见的字形数量，以及这些行的总高度。
fn visible_block(layout: &Layout, max_lines: usize) -> (usize, f32) {
    let glyph_count = layout.glyphs().len();
    let Some(lines) = layout.lines() else {
        return (glyph_count, layout.height());
    };
    if lines.is_empty() {
        return (glyph_count, layout.height());
    }

    let kept = if max_lines == 0 {
        lines.len()
    } else {
        lines.len().min(max_lines)
    };
    let last = &lines[kept - 1];
    let glyph_limit = (last.glyph_end + 1).min(glyph_count);
    // max_descent 为负值
    let block_height = (last.baseline_y - last.min_descent).max(0.0);
    (glyph_limit, block_height)
}

struct DrawRgbaTarget<'a> {
    rgba: &'a mut [u8],
    width: u32,
    height: u32,
}

fn draw_glyphs(
    glyphs: &[fontdue::layout::GlyphPosition],
    font: &fontdue::Font,
    target: &mut DrawRgbaTarget<'_>,
    (origin_x, origin_y): (i32, i32),
    color: [u8; 4],
) {
    for g in glyphs {
        if g.width == 0 || g.height == 0 {
            continue;
        }

        let (metrics, bitmap) = font.rasterize_config(g.key);
        if metrics.width == 0 || metrics.height == 0 {
            continue;
        }

        let start_x = g.x.round() as i32 + origin_x;
        let start_y = g.y.round() as i32 + origin_y;

        for y in 0..metrics.height as i32 {
            let dst_y = start_y + y;
            if dst_y < 0 || dst_y >= target.height as i32 {
                continue;
            }

            for x in 0..metrics.width as i32 {
                let dst_x = start_x + x;
                if dst_x < 0 || dst_x >= target.width as i32 {
                    continue;
                }

                let coverage = bitmap[(y as usize) * metrics.width + (x as usize)];
                let idx = ((dst_y as u32 * target.width + dst_x as u32) as usize) * 4;
                blend_over(&mut target.rgba[idx..idx + 4], color, coverage);
            }
        }
    }
}

/// 非预乘 alpha 的 “over” 混合：把 `color`（乘以覆盖率）叠加到 `dst` 上。
fn blend_over(dst: &mut [u8], color: [u8; 4], coverage: u8) {
    let sa = coverage as f32 / 255.0 * color[3] as f32 / 255.0;
    if sa <= 0.0 {
        return;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    for channel in 0..3 {
        let src = color[channel] as f32;
        let existing = dst[channel] as f32;
        dst[channel] = ((src * sa + existing * da * (1.0 - sa)) / out_a).round() as u8;
    }
    dst[3] = (out_a * 255.0).round() as u8;
}

fn load_font(font: &Font) -> anyhow::Result<Arc<fontdue::Font>> {
    match font {
        Font::System(descriptor) => load_system_font(descriptor),
        Font::Resource(handle, face_name) => {
            let bytes = load_bytes(handle).context("failed to read font resource")?;
            let index = find_face_index_in_bytes(bytes.as_ref(), face_name)?;
            parse_font(bytes.as_ref(), index).map(Arc::new)
        }
    }
}

fn parse_font(bytes: &[u8], collection_index: u32) -> anyhow::Result<fontdue::Font> {
    let settings = fontdue::FontSettings {
        collection_index,
        ..fontdue::FontSettings::default()
    };
    fontdue::Font::from_bytes(bytes, settings)
        .map_err(|err| anyhow!(err))
        .context("failed to parse font bytes")
}

struct SystemFontCache {
    db: fontdb::Database,
    by_descriptor: HashMap<(String, u16), Arc<fontdue::Font>>,
}

fn system_font_cache() -> &'static Mutex<SystemFontCache> {
    use std::sync::OnceLock;

    static CACHE: OnceLock<Mutex<SystemFontCache>> = OnceLock::new();
    CACHE.get_or_init(|| {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        Mutex::new(SystemFontCache {
            db,
            by_descriptor: HashMap::new(),
        })
    })
}

fn load_system_font(descriptor: &FontDescriptor) -> anyhow::Result<Arc<fontdue::Font>> {
    use fontdb::{Family, Query, Weight};

    let key = (descriptor.family.clone(), descriptor.weight);
    let mut cache = system_font_cache().lock();
    if let Some(font) = cache.by_descriptor.get(&key) {
        return Ok(Arc::clone(font));
    }

    let mut families = vec![Family::Name(descriptor.family.as_str())];
    families.extend(FALLBACK_FAMILIES.iter().map(|name| Family::Name(name)));
    families.push(Family::SansSerif);

    let query = Query {
        families: &families,
        weight: Weight(descriptor.weight),
        ..Query::default()
    };

    let id = cache
        .db
        .query(&query)
        .ok_or_else(|| anyhow!("system font not found: {}", descriptor.family))?;

    let parsed = cache
        .db
        .with_face_data(id, |data, face_index| parse_font(data, face_index))
        .ok_or_else(|| anyhow!("failed to read system font data: {}", descriptor.family))??;

    let font = Arc::new(parsed);
    cache.by_descriptor.insert(key, Arc::clone(&font));
    Ok(font)
}

fn find_face_index_in_bytes(bytes: &[u8], face_name: &str) -> anyhow::Result<u32> {
    // ttf-parser 支持 TTC collection。
    let face_count = ttf_parser::fonts_in_collection(bytes).unwrap_or(1);

    let mut available = Vec::new();

    for index in 0..face_count {
        let face = ttf_parser::Face::parse(bytes, index)
            .map_err(|_| anyhow!("failed to parse font face at index {index}"))?;

        for name in face.names() {
            if let Some(s) = name.to_string()
                && !s.is_empty()
            {
                if s.eq_ignore_ascii_case(face_name) {
                    return Ok(index);
                }
                if available.len() < 64 {
                    available.push(s);
                }
            }
        }
    }

    Err(anyhow!(
        "font face not found in font bytes: {face_name} (available names sample: {:?})",
        available
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_over_transparent_keeps_text_color() {
        let mut pixel = [0u8, 0, 0, 0];
        blend_over(&mut pixel, [255, 255, 255, 255], 128);
        assert_eq!(&pixel[..3], &[255, 255, 255], "透明底上不应出现变暗的边缘");
        assert_eq!(pixel[3], 128);
    }

    #[test]
    fn blend_over_accumulates_alpha() {
        let mut pixel = [255u8, 255, 255, 128];
        blend_over(&mut pixel, [255, 255, 255, 255], 128);
        assert!(pixel[3] > 128);
        assert_eq!(&pixel[..3], &[255, 255, 255]);
    }

    #[test]
    fn zero_coverage_is_noop() {
        let mut pixel = [10u8, 20, 30, 40];
        blend_over(&mut pixel, [255, 0, 0, 255], 0);
        assert_eq!(pixel, [10, 20, 30, 40]);
    }

    #[test]
    fn empty_text_yields_transparent_area_without_font_lookup() {
        let options = TextStyleOptions {
            font: Font::System(FontDescriptor::thin()),
            size: 25.0,
            color: Color::WHITE,
            lines: 1,
            alignment: TextAlignment::Center,
        };
        let raster = rasterize_label("", &options, (30, 10), 1.0).expect("空文本应成功");
        assert_eq!((raster.width, raster.height), (30, 10));
        assert!(raster.rgba.iter().all(|b| *b == 0));
    }
}
