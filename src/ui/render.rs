use tiny_skia::{Color, Paint, PathBuilder, PixmapMut, PixmapPaint, Rect, Stroke, Transform};
use cosmic_text::{Attrs, Buffer, FontSystem, Metrics, SwashCache};
use quickrun::config::ThemeConfig;
use crate::ui::icons::IconCache;
use crate::ui::view::{Layout, View, ROW_HEIGHT};

const LABEL_SIZE: f32 = 16.0;
const SUB_SIZE: f32 = 12.0;
const KEY_SIZE: f32 = 13.0;
const KEY_COLUMN: f32 = 20.0;
const ACCENT_WIDTH: f32 = 3.0;

pub struct Renderer {
    font_system: FontSystem,
    swash_cache: SwashCache,
    icon_cache: IconCache,
    placeholder: String,
}

struct Palette {
    text: Color,
    sub_text: Color,
    selection_background: Color,
    selection_text: Color,
    label: Color,
}

impl Renderer {
    pub fn new(icon_cache: IconCache, placeholder: Option<String>) -> Self {
        Self {
            font_system: FontSystem::new(),
            swash_cache: SwashCache::new(),
            icon_cache,
            placeholder: placeholder.unwrap_or_else(|| "Search...".to_string()),
        }
    }

    pub fn insert_icon(&mut self, key: String, pixmap: Option<tiny_skia::Pixmap>) {
        self.icon_cache.insert(key, pixmap);
    }

    pub fn draw(&mut self, pixmap: &mut PixmapMut, view: &View, theme: &ThemeConfig) {
        let palette = Palette {
            text: ThemeConfig::parse_color(&theme.text),
            sub_text: ThemeConfig::parse_color(&theme.sub_text),
            selection_background: ThemeConfig::parse_color(&theme.selection_background),
            selection_text: ThemeConfig::parse_color(&theme.selection_text),
            label: ThemeConfig::parse_color(&theme.label_color),
        };

        // The selected row's class tints the window frame.
        let chrome = view.chrome_class.as_deref().and_then(|c| theme.class_style(c));
        let background = chrome
            .and_then(|s| s.background.as_deref())
            .map_or_else(|| ThemeConfig::parse_color(&theme.background), ThemeConfig::parse_color);
        let border = chrome
            .and_then(|s| s.accent.as_deref())
            .map_or_else(|| ThemeConfig::parse_color(&theme.border_color), ThemeConfig::parse_color);

        pixmap.fill(Color::TRANSPARENT);
        let width = pixmap.width() as f32;
        let height = pixmap.height() as f32;

        if let Some(rect) = Rect::from_xywh(0.0, 0.0, width, height) {
            self.draw_rounded_rect(pixmap, rect, theme.border_radius, background, Some(border));
        }

        let (search_text, search_color) = if view.query.is_empty() {
            (self.placeholder.clone(), palette.label)
        } else {
            (format!("> {}", view.query), palette.text)
        };
        self.draw_text(pixmap, &search_text, theme.padding, theme.padding, 20.0, search_color);
        if view.busy {
            self.draw_text(pixmap, "…", width - theme.padding - 12.0, theme.padding, 20.0, palette.label);
        }

        if !view.list_visible {
            return;
        }

        let layout = Layout::new(theme, pixmap.width(), pixmap.height(), view.rows.len(), view.selected);
        if view.rows.is_empty() {
            self.draw_text(pixmap, "No results", theme.padding, layout.list_top, LABEL_SIZE, palette.sub_text);
            return;
        }

        for index in layout.visible(view.rows.len()) {
            self.draw_row(pixmap, view, index, &layout, theme, &palette);
        }
    }

    fn draw_row(&mut self, pixmap: &mut PixmapMut, view: &View, index: usize, layout: &Layout, theme: &ThemeConfig, palette: &Palette) {
        let row = &view.rows[index];
        let entry = &row.entry;
        let y = layout.row_top(index);
        let style = theme.class_style(&entry.class);
        let selected = view.selected == Some(index);

        let mut text_color = palette.text;
        if selected {
            let fill = style
                .and_then(|s| s.background.as_deref())
                .map_or(palette.selection_background, ThemeConfig::parse_color);
            if let Some(rect) = Rect::from_xywh(theme.padding / 2.0, y, layout.width - theme.padding, ROW_HEIGHT) {
                self.draw_rounded_rect(pixmap, rect, theme.border_radius / 2.0, fill, None);
            }
            text_color = palette.selection_text;
        }

        if let Some(accent) = style.and_then(|s| s.accent.as_deref()) {
            if let Some(bar) = Rect::from_xywh(theme.padding / 2.0, y + 6.0, ACCENT_WIDTH, ROW_HEIGHT - 12.0) {
                let mut paint = Paint::default();
                paint.set_color(ThemeConfig::parse_color(accent));
                pixmap.fill_rect(bar, &paint, Transform::identity(), None);
            }
        }

        let mut x = theme.padding;
        if let Some(key) = &row.quick_key {
            let color = if view.quick_mode { palette.selection_text } else { palette.label };
            self.draw_text(pixmap, key, x, y + (ROW_HEIGHT - KEY_SIZE) / 2.0, KEY_SIZE, color);
            x += KEY_COLUMN;
        }

        let picture = entry.image.as_deref().or(entry.icon.as_deref());
        if let Some(name) = picture {
            let size = theme.icon_size;
            if let Some(icon) = self.icon_cache.get(name, size) {
                let top = y + (ROW_HEIGHT - size as f32) / 2.0;
                pixmap.draw_pixmap(x as i32, top as i32, icon.as_ref(), &PixmapPaint::default(), Transform::identity(), None);
            }
            x += size as f32 + theme.spacing;
        }

        if entry.hide_text {
            return;
        }

        match &entry.sub {
            Some(sub) => {
                self.draw_text(pixmap, &entry.label, x, y + 5.0, LABEL_SIZE, text_color);
                self.draw_text(pixmap, sub, x, y + 8.0 + LABEL_SIZE, SUB_SIZE, palette.sub_text);
            }
            None => {
                self.draw_text(pixmap, &entry.label, x, y + (ROW_HEIGHT - LABEL_SIZE) / 2.0, LABEL_SIZE, text_color);
            }
        }
    }

    fn draw_rounded_rect(&self, pixmap: &mut PixmapMut, rect: Rect, radius: f32, fill: Color, stroke: Option<Color>) {
        let mut pb = PathBuilder::new();
        let x = rect.left();
        let y = rect.top();
        let w = rect.width();
        let h = rect.height();

        pb.move_to(x + radius, y);
        pb.line_to(x + w - radius, y);
        pb.quad_to(x + w, y, x + w, y + radius);
        pb.line_to(x + w, y + h - radius);
        pb.quad_to(x + w, y + h, x + w - radius, y + h);
        pb.line_to(x + radius, y + h);
        pb.quad_to(x, y + h, x, y + h - radius);
        pb.line_to(x, y + radius);
        pb.quad_to(x, y, x + radius, y);
        pb.close();

        let Some(path) = pb.finish() else {
            return;
        };

        let mut paint = Paint::default();
        paint.set_color(fill);
        paint.anti_alias = true;
        pixmap.fill_path(&path, &paint, tiny_skia::FillRule::Winding, Transform::identity(), None);

        if let Some(color) = stroke {
            let mut stroke_paint = Paint::default();
            stroke_paint.set_color(color);
            stroke_paint.anti_alias = true;
            let stroke = Stroke { width: 1.5, ..Default::default() };
            pixmap.stroke_path(&path, &stroke_paint, &stroke, Transform::identity(), None);
        }
    }

    fn draw_text(&mut self, pixmap: &mut PixmapMut, text: &str, x: f32, y: f32, size: f32, color: Color) {
        let mut buffer = Buffer::new(&mut self.font_system, Metrics::new(size, size));
        buffer.set_size(&mut self.font_system, Some(pixmap.width() as f32 - x), None);
        buffer.set_text(&mut self.font_system, text, Attrs::new(), cosmic_text::Shaping::Advanced);
        buffer.shape_until_scroll(&mut self.font_system, false);

        let text_color = cosmic_text::Color::rgba(
            (color.red() * 255.0) as u8,
            (color.green() * 255.0) as u8,
            (color.blue() * 255.0) as u8,
            (color.alpha() * 255.0) as u8,
        );

        let (max_x, max_y) = (pixmap.width() as i32, pixmap.height() as i32);
        buffer.draw(&mut self.font_system, &mut self.swash_cache, text_color, |draw_x, draw_y, w, h, color| {
            let draw_x = draw_x + x as i32;
            let draw_y = draw_y + y as i32;
            if w == 0 || h == 0 || draw_x < 0 || draw_y < 0 || draw_x >= max_x || draw_y >= max_y {
                return;
            }
            let paint = Paint {
                shader: tiny_skia::Shader::SolidColor(Color::from_rgba8(color.r(), color.g(), color.b(), color.a())),
                ..Paint::default()
            };
            if let Some(rect) = Rect::from_xywh(draw_x as f32, draw_y as f32, w as f32, h as f32) {
                pixmap.fill_rect(rect, &paint, Transform::identity(), None);
            }
        });
    }
}
