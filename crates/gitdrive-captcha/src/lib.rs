//! SVG CAPTCHA generator.
//!
//! Pure string assembly over an `Rng`, no raster or font dependencies.
//! Each glyph gets its own jittered `<text>` element and noise lines are
//! drawn over the top.

use rand::Rng;

const CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const FONT_FAMILY: &str = "'Segment', 'Inter', 'sans-serif'";
const CHAR_SPACING: f64 = 35.0;

/// A generated challenge: the answer text and the rendered SVG.
#[derive(Debug, Clone)]
pub struct Captcha {
    pub text: String,
    pub svg: String,
}

#[derive(Debug, Clone)]
pub struct CaptchaOptions {
    /// Number of characters.
    pub size: usize,
    /// Number of noise lines.
    pub noise: usize,
    pub width: u32,
    pub height: u32,
    pub background: String,
    /// Random dark glyph colors instead of a fixed gray.
    pub color: bool,
}

impl Default for CaptchaOptions {
    fn default() -> Self {
        Self {
            size: 4,
            noise: 4,
            width: 150,
            height: 50,
            background: "#ffffff".to_string(),
            color: false,
        }
    }
}

/// Dark colors only, so glyphs and noise stay readable on the light
/// background.
fn random_color(rng: &mut impl Rng) -> String {
    let r: u8 = rng.gen_range(0..128);
    let g: u8 = rng.gen_range(0..128);
    let b: u8 = rng.gen_range(0..128);
    format!("rgb({r}, {g}, {b})")
}

fn random_text(rng: &mut impl Rng, size: usize) -> String {
    (0..size)
        .map(|_| CHARS[rng.gen_range(0..CHARS.len())] as char)
        .collect()
}

pub fn create_captcha(options: &CaptchaOptions, rng: &mut impl Rng) -> Captcha {
    let CaptchaOptions {
        size,
        noise,
        width,
        height,
        background,
        color,
    } = options;
    let (width, height) = (*width as f64, *height as f64);
    let text = random_text(rng, *size);

    let mut svg = format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" \
         viewBox=\"0,0,{width},{height}\">"
    );
    svg.push_str(&format!(
        "<rect width=\"100%\" height=\"100%\" fill=\"{background}\"/>"
    ));

    let text_x = (width - (*size as f64 * CHAR_SPACING)) / 2.0 + 10.0;
    let text_y = height / 2.0 + 10.0;
    for (i, ch) in text.chars().enumerate() {
        let char_x = text_x + i as f64 * CHAR_SPACING;
        let char_y = text_y + rng.gen_range(-4.0..4.0);
        let rotate = rng.gen_range(-10.0..10.0);
        let fill = if *color {
            random_color(rng)
        } else {
            "#333333".to_string()
        };
        svg.push_str(&format!(
            "<text x=\"{char_x}\" y=\"{char_y}\" \
             transform=\"rotate({rotate}, {char_x}, {char_y})\" \
             font-family=\"{FONT_FAMILY}\" font-size=\"36\" font-weight=\"bold\" \
             fill=\"{fill}\">{ch}</text>"
        ));
    }

    for _ in 0..*noise {
        let x1 = rng.gen_range(0.0..width);
        let y1 = rng.gen_range(0.0..height);
        let x2 = rng.gen_range(0.0..width);
        let y2 = rng.gen_range(0.0..height);
        let stroke = random_color(rng);
        svg.push_str(&format!(
            "<line x1=\"{x1}\" y1=\"{y1}\" x2=\"{x2}\" y2=\"{y2}\" \
             stroke=\"{stroke}\" stroke-width=\"1.5\"/>"
        ));
    }
    svg.push_str("</svg>");

    Captcha { text, svg }
}
