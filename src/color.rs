//! 颜色模块

/// RGBA 颜色
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    pub const fn from_hex(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xFF) as u8,
            g: ((hex >> 8) & 0xFF) as u8,
            b: (hex & 0xFF) as u8,
            a: 255,
        }
    }

    /// 0xAARRGGBB
    pub const fn from_argb(argb: u32) -> Self {
        Self {
            r: ((argb >> 16) & 0xFF) as u8,
            g: ((argb >> 8) & 0xFF) as u8,
            b: (argb & 0xFF) as u8,
            a: ((argb >> 24) & 0xFF) as u8,
        }
    }

    /// 解析 `#RRGGBB` / `#AARRGGBB` / 颜色名
    pub fn parse(value: &str) -> Option<Color> {
        let value = value.trim();
        if let Some(hex) = value.strip_prefix('#') {
            if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return None;
            }
            let raw = u32::from_str_radix(hex, 16).ok()?;
            return match hex.len() {
                6 => Some(Color::from_hex(raw)),
                8 => Some(Color::from_argb(raw)),
                _ => None,
            };
        }
        named_color(&value.to_ascii_lowercase())
    }

    /// 解析失败时返回完全透明
    pub fn parse_or_transparent(value: &str) -> Color {
        Self::parse(value).unwrap_or(Color::TRANSPARENT)
    }

    pub fn is_transparent(&self) -> bool {
        self.a == 0
    }

    /// `#AARRGGBB` 形式，用于调试输出
    pub fn to_hex_string(&self) -> String {
        format!("#{:02X}{:02X}{:02X}{:02X}", self.a, self.r, self.g, self.b)
    }

    // 预定义颜色
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const RED: Color = Color::rgb(255, 0, 0);
    pub const GREEN: Color = Color::rgb(0, 255, 0);
    pub const BLUE: Color = Color::rgb(0, 0, 255);
    pub const TRANSPARENT: Color = Color::new(0, 0, 0, 0);
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

fn named_color(name: &str) -> Option<Color> {
    let argb = match name {
        "black" => 0xFF000000,
        "darkgray" | "darkgrey" => 0xFF444444,
        "gray" | "grey" => 0xFF888888,
        "lightgray" | "lightgrey" => 0xFFCCCCCC,
        "white" => 0xFFFFFFFF,
        "red" => 0xFFFF0000,
        "green" => 0xFF00FF00,
        "blue" => 0xFF0000FF,
        "yellow" => 0xFFFFFF00,
        "cyan" | "aqua" => 0xFF00FFFF,
        "magenta" | "fuchsia" => 0xFFFF00FF,
        "lime" => 0xFF00FF00,
        "maroon" => 0xFF800000,
        "navy" => 0xFF000080,
        "olive" => 0xFF808000,
        "purple" => 0xFF800080,
        "silver" => 0xFFC0C0C0,
        "teal" => 0xFF008080,
        "transparent" => 0x00000000,
        _ => return None,
    };
    Some(Color::from_argb(argb))
}
