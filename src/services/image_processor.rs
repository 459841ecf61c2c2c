use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, ImageEncoder, Rgba, RgbaImage};
use std::sync::OnceLock;
use thiserror::Error;
use usvg::{TreeParsing, TreeTextToPath};

/// A4 portrait at 300 DPI
pub const PRINT_WIDTH: u32 = 2480;
pub const PRINT_HEIGHT: u32 = 3508;
pub const THUMBNAIL_SIZE: u32 = 400;

#[derive(Debug, Error)]
pub enum ImageProcessingError {
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error("failed to render watermark: {0}")]
    Render(String),
    #[error("no images to compose")]
    NothingToCompose,
}

pub type Result<T> = std::result::Result<T, ImageProcessingError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Jpeg,
    WebP,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimizeOptions {
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
    // 1-100, used by JPEG; PNG always uses best compression, WebP is lossless
    pub quality: u8,
}

impl OptimizeOptions {
    pub fn print() -> Self {
        Self {
            width: PRINT_WIDTH,
            height: PRINT_HEIGHT,
            format: OutputFormat::Png,
            quality: 90,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatermarkPosition {
    BottomRight,
    BottomLeft,
    TopRight,
    TopLeft,
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatermarkOptions {
    pub opacity: f32,
    pub position: WatermarkPosition,
}

impl Default for WatermarkOptions {
    fn default() -> Self {
        Self {
            opacity: 0.3,
            position: WatermarkPosition::BottomRight,
        }
    }
}

fn decode(bytes: &[u8]) -> Result<DynamicImage> {
    Ok(image::load_from_memory(bytes)?)
}

/// Shrink to fit inside the box, keeping the aspect ratio. Never upscales.
fn fit_within(image: DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
    let (width, height) = image.dimensions();
    if width <= max_width && height <= max_height {
        return image;
    }
    image.resize(max_width, max_height, FilterType::Lanczos3)
}

fn flatten_on_white(image: &DynamicImage) -> RgbaImage {
    let mut rgba = image.to_rgba8();
    for pixel in rgba.pixels_mut() {
        let alpha = pixel[3] as f32 / 255.0;
        for channel in 0..3 {
            let value = pixel[channel] as f32 * alpha + 255.0 * (1.0 - alpha);
            pixel[channel] = value.round() as u8;
        }
        pixel[3] = 255;
    }
    rgba
}

fn encode(image: &RgbaImage, format: OutputFormat, quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    match format {
        OutputFormat::Png => {
            let encoder = PngEncoder::new_with_quality(
                &mut buffer,
                CompressionType::Best,
                PngFilterType::Adaptive,
            );
            encoder.write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgba8,
            )?;
        }
        OutputFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
            let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
            encoder.write_image(
                rgb.as_raw(),
                rgb.width(),
                rgb.height(),
                image::ColorType::Rgb8,
            )?;
        }
        OutputFormat::WebP => {
            image.write_to(
                &mut std::io::Cursor::new(&mut buffer),
                image::ImageOutputFormat::WebP,
            )?;
        }
    }
    Ok(buffer)
}

fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    encode(image, OutputFormat::Png, 100)
}

/// Resize into the bounding box without upscaling, flatten onto white and
/// re-encode in the requested format.
pub fn optimize(bytes: &[u8], options: &OptimizeOptions) -> Result<Vec<u8>> {
    let image = fit_within(decode(bytes)?, options.width, options.height);
    let flattened = flatten_on_white(&image);
    encode(&flattened, options.format, options.quality)
}

/// PNG thumbnail fitting in a `max_size` square. Never upscales.
pub fn create_thumbnail(bytes: &[u8], max_size: u32) -> Result<Vec<u8>> {
    let image = fit_within(decode(bytes)?, max_size, max_size);
    encode_png(&image.to_rgba8())
}

pub fn dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    Ok(decode(bytes)?.dimensions())
}

fn font_database() -> &'static usvg::fontdb::Database {
    static FONTS: OnceLock<usvg::fontdb::Database> = OnceLock::new();
    FONTS.get_or_init(|| {
        let mut fontdb = usvg::fontdb::Database::new();
        fontdb.load_system_fonts();
        log::info!("Loaded {} font faces for watermark rendering", fontdb.len());
        fontdb
    })
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn watermark_svg(text: &str, width: u32, height: u32, options: &WatermarkOptions) -> String {
    // Label scales with the page so it reads the same on prints and previews
    let font_size = ((width as f32) * 0.03).max(12.0);
    let margin = font_size;
    let (x, y, anchor) = match options.position {
        WatermarkPosition::BottomRight => (width as f32 - margin, height as f32 - margin, "end"),
        WatermarkPosition::BottomLeft => (margin, height as f32 - margin, "start"),
        WatermarkPosition::TopRight => (width as f32 - margin, margin + font_size, "end"),
        WatermarkPosition::TopLeft => (margin, margin + font_size, "start"),
        WatermarkPosition::Center => (width as f32 / 2.0, height as f32 / 2.0, "middle"),
    };

    format!(
        r##"<svg width="{w}" height="{h}" viewBox="0 0 {w} {h}" xmlns="http://www.w3.org/2000/svg"><text x="{x}" y="{y}" font-family="DejaVu Sans, sans-serif" font-size="{size}" fill="#000000" fill-opacity="{opacity}" text-anchor="{anchor}">{text}</text></svg>"##,
        w = width,
        h = height,
        x = x,
        y = y,
        size = font_size,
        opacity = options.opacity.clamp(0.0, 1.0),
        anchor = anchor,
        text = escape_xml(text),
    )
}

/// Overlay a semi-transparent text label. Output is PNG with the input's dimensions.
pub fn add_watermark(bytes: &[u8], text: &str, options: &WatermarkOptions) -> Result<Vec<u8>> {
    let mut base = decode(bytes)?.to_rgba8();
    let (width, height) = base.dimensions();

    let svg = watermark_svg(text, width, height, options);
    let mut tree = usvg::Tree::from_data(svg.as_bytes(), &usvg::Options::default())
        .map_err(|e| ImageProcessingError::Render(e.to_string()))?;
    tree.convert_text(font_database());

    let mut pixmap = tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| ImageProcessingError::Render("invalid overlay size".to_string()))?;
    resvg::Tree::from_usvg(&tree).render(tiny_skia::Transform::identity(), &mut pixmap.as_mut());

    // The pixmap is premultiplied RGBA: out = src + dst * (1 - src_alpha)
    for (pixel, overlay) in base.pixels_mut().zip(pixmap.data().chunks_exact(4)) {
        let src_alpha = overlay[3] as f32 / 255.0;
        if src_alpha == 0.0 {
            continue;
        }
        for channel in 0..3 {
            let blended = overlay[channel] as f32 + pixel[channel] as f32 * (1.0 - src_alpha);
            pixel[channel] = blended.round().min(255.0) as u8;
        }
        let dst_alpha = pixel[3] as f32 / 255.0;
        pixel[3] = ((src_alpha + dst_alpha * (1.0 - src_alpha)) * 255.0).round() as u8;
    }

    encode_png(&base)
}

pub fn grayscale(bytes: &[u8]) -> Result<Vec<u8>> {
    let gray = decode(bytes)?.grayscale();
    encode_png(&gray.to_rgba8())
}

/// Positive values increase contrast, negative values decrease it.
pub fn adjust_contrast(bytes: &[u8], contrast: f32) -> Result<Vec<u8>> {
    let adjusted = decode(bytes)?.adjust_contrast(contrast);
    encode_png(&adjusted.to_rgba8())
}

/// Binarize: pixels brighter than `level` become white, the rest black.
pub fn threshold(bytes: &[u8], level: u8) -> Result<Vec<u8>> {
    let gray = flatten_on_white(&decode(bytes)?);
    let luma = DynamicImage::ImageRgba8(gray).to_luma8();
    let binary = imageproc::contrast::threshold(&luma, level);
    encode_png(&DynamicImage::ImageLuma8(binary).to_rgba8())
}

/// Surround the image with a solid frame `border` pixels wide.
pub fn add_border(bytes: &[u8], border: u32, color: Rgba<u8>) -> Result<Vec<u8>> {
    let image = decode(bytes)?.to_rgba8();
    let (width, height) = image.dimensions();
    let mut canvas = RgbaImage::from_pixel(width + border * 2, height + border * 2, color);
    imageops::overlay(&mut canvas, &image, border as i64, border as i64);
    encode_png(&canvas)
}

/// Lay images out on a white canvas, `columns` per row, each scaled to fit a
/// `cell_width` x `cell_height` cell and centered in it.
pub fn compose_grid(
    images: &[Vec<u8>],
    columns: u32,
    cell_width: u32,
    cell_height: u32,
    gap: u32,
) -> Result<Vec<u8>> {
    if images.is_empty() {
        return Err(ImageProcessingError::NothingToCompose);
    }
    let columns = columns.clamp(1, images.len() as u32);
    let rows = (images.len() as u32 + columns - 1) / columns;

    let canvas_width = columns * cell_width + (columns + 1) * gap;
    let canvas_height = rows * cell_height + (rows + 1) * gap;
    let mut canvas = RgbaImage::from_pixel(canvas_width, canvas_height, Rgba([255, 255, 255, 255]));

    for (index, bytes) in images.iter().enumerate() {
        let cell = fit_within(decode(bytes)?, cell_width, cell_height);
        let cell = flatten_on_white(&cell);
        let column = index as u32 % columns;
        let row = index as u32 / columns;
        let x = gap + column * (cell_width + gap) + (cell_width - cell.width()) / 2;
        let y = gap + row * (cell_height + gap) + (cell_height - cell.height()) / 2;
        imageops::overlay(&mut canvas, &cell, x as i64, y as i64);
    }

    encode_png(&canvas)
}

pub fn compose_row(images: &[Vec<u8>], cell_width: u32, cell_height: u32, gap: u32) -> Result<Vec<u8>> {
    compose_grid(images, images.len() as u32, cell_width, cell_height, gap)
}

pub fn compose_column(
    images: &[Vec<u8>],
    cell_width: u32,
    cell_height: u32,
    gap: u32,
) -> Result<Vec<u8>> {
    compose_grid(images, 1, cell_width, cell_height, gap)
}

#[cfg(test)]
pub(crate) fn sample_png(width: u32, height: u32, color: Rgba<u8>) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, color);
    encode_png(&image).expect("encode sample png")
}
