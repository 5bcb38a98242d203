use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use anyhow::{Context, Result};
use facegate_vision::FaceBox;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use minifb::{Key, KeyRepeat, Window, WindowOptions};

pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
pub const RED: Rgb<u8> = Rgb([255, 0, 0]);

const LABEL_SCALE: f32 = 24.0;

/// Operator input polled once per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Save,
    Quit,
}

/// Where annotated frames go, and where key presses come from.
pub trait View {
    fn show(&mut self, frame: &RgbImage) -> Result<Option<Input>>;
}

/// Live preview in a native window. Space saves, Esc or closing quits.
pub struct PreviewWindow {
    title: String,
    window: Option<Window>,
    buffer: Vec<u32>,
}

impl PreviewWindow {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            window: None,
            buffer: Vec::new(),
        }
    }

    fn window_for(&mut self, width: usize, height: usize) -> Result<&mut Window> {
        let stale = match &self.window {
            Some(w) => w.get_size() != (width, height),
            None => true,
        };
        if stale {
            let window = Window::new(&self.title, width, height, WindowOptions::default())
                .context("opening preview window")?;
            self.window = Some(window);
        }
        self.window
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("preview window missing"))
    }
}

impl View for PreviewWindow {
    fn show(&mut self, frame: &RgbImage) -> Result<Option<Input>> {
        let (w, h) = (frame.width() as usize, frame.height() as usize);
        let mut buffer = std::mem::take(&mut self.buffer);
        buffer.clear();
        buffer.extend(frame.pixels().map(pack_rgb));

        let window = self.window_for(w, h)?;
        window
            .update_with_buffer(&buffer, w, h)
            .context("updating preview window")?;

        let input = if !window.is_open() || window.is_key_down(Key::Escape) {
            Some(Input::Quit)
        } else if window.is_key_pressed(Key::Space, KeyRepeat::No) {
            Some(Input::Save)
        } else {
            None
        };
        self.buffer = buffer;
        Ok(input)
    }
}

/// `0RGB` word as minifb expects it.
fn pack_rgb(p: &Rgb<u8>) -> u32 {
    ((p[0] as u32) << 16) | ((p[1] as u32) << 8) | p[2] as u32
}

/// Box and label drawing on preview frames.
pub struct Overlay {
    font: Option<FontVec>,
}

impl Overlay {
    pub fn new() -> Self {
        Self { font: None }
    }

    /// Load a label font. A missing or broken font only disables labels.
    pub fn with_font(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::new();
        };
        match load_font(path) {
            Ok(font) => Self { font: Some(font) },
            Err(e) => {
                log::warn!(
                    "Label font {} unusable, labels disabled: {:#}",
                    path.display(),
                    e
                );
                Self::new()
            }
        }
    }

    /// Two-pixel rectangle around `face`.
    pub fn draw_box(&self, frame: &mut RgbImage, face: &FaceBox, color: Rgb<u8>) {
        for inset in 0..2i32 {
            let (w, h) = (face.width as i32 - 2 * inset, face.height as i32 - 2 * inset);
            if w <= 0 || h <= 0 {
                break;
            }
            let rect = Rect::at(face.x + inset, face.y + inset).of_size(w as u32, h as u32);
            draw_hollow_rect_mut(frame, rect, color);
        }
    }

    /// Text just above `face`. No-op without a font.
    pub fn draw_label(&self, frame: &mut RgbImage, face: &FaceBox, text: &str, color: Rgb<u8>) {
        if let Some(font) = &self.font {
            let y = (face.y - LABEL_SCALE as i32 - 4).max(0);
            let scale = PxScale::from(LABEL_SCALE);
            draw_text_mut(frame, color, face.x, y, scale, font, text);
        }
    }
}

fn load_font(path: &Path) -> Result<FontVec> {
    let bytes = std::fs::read(path)?;
    Ok(FontVec::try_from_vec(bytes)?)
}

impl Default for Overlay {
    fn default() -> Self {
        Self::new()
    }
}
