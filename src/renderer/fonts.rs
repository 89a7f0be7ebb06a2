//! 字体资源 - 按名称加载并沿回退链解析

use crate::native::FontFace;
use fontdue::{Font, FontSettings};
use once_cell::unsync::OnceCell;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::debug;

/// 默认字体回退链
pub const DEFAULT_FONT_CHAIN: &[&str] = &["myfont", "ibm_plex_sans"];
/// 图标字体回退链
pub const ICON_FONT_CHAIN: &[&str] = &["font_awesome_6_free_solid_900", "font_awesome", "fontawesome"];

const FONT_EXTENSIONS: &[&str] = &["ttf", "otf"];

/// 已加载的字体
pub struct Typeface {
    pub name: String,
    pub font: Font,
}

impl fmt::Debug for Typeface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Typeface").field("name", &self.name).finish()
    }
}

impl Typeface {
    /// 文本宽度和行高（像素）
    pub fn measure(&self, text: &str, px: f32) -> (f32, f32) {
        let width = text.chars().map(|c| self.font.metrics(c, px).advance_width).sum();
        let height = self
            .font
            .horizontal_line_metrics(px)
            .map_or(px * 1.2, |m| m.new_line_size);
        (width, height)
    }
}

/// 字体注册表，每个引擎实例一份
pub struct FontRegistry {
    font_dir: Option<PathBuf>,
    loaded: RefCell<HashMap<String, Option<Rc<Typeface>>>>,
    default_face: OnceCell<FontFace>,
    icon_face: OnceCell<FontFace>,
}

impl fmt::Debug for FontRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontRegistry")
            .field("font_dir", &self.font_dir)
            .field("loaded", &self.loaded.borrow().len())
            .finish()
    }
}

impl FontRegistry {
    pub fn new(font_dir: Option<PathBuf>) -> Self {
        Self {
            font_dir,
            loaded: RefCell::new(HashMap::new()),
            default_face: OnceCell::new(),
            icon_face: OnceCell::new(),
        }
    }

    /// 资源名规范化："Font Awesome 6" -> "font_awesome_6"
    pub fn normalize_resource_name(name: &str) -> String {
        let mut out = String::with_capacity(name.len());
        for c in name.trim().chars().flat_map(char::to_lowercase) {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
                out.push(c);
            } else if !out.ends_with('_') {
                out.push('_');
            }
        }
        let mut collapsed = String::with_capacity(out.len());
        for c in out.chars() {
            if c == '_' && collapsed.ends_with('_') {
                continue;
            }
            collapsed.push(c);
        }
        collapsed.trim_matches('_').to_string()
    }

    /// 按资源名加载，结果（包括失败）会被缓存
    pub fn load(&self, name: &str) -> Option<Rc<Typeface>> {
        let resource = Self::normalize_resource_name(name);
        if resource.is_empty() {
            return None;
        }
        if let Some(cached) = self.loaded.borrow().get(&resource) {
            return cached.clone();
        }
        let typeface = self.read_font(&resource).map(Rc::new);
        self.loaded.borrow_mut().insert(resource, typeface.clone());
        typeface
    }

    fn read_font(&self, resource: &str) -> Option<Typeface> {
        let dir = self.font_dir.as_ref()?;
        for ext in FONT_EXTENSIONS {
            let path = dir.join(format!("{resource}.{ext}"));
            let Ok(bytes) = std::fs::read(&path) else {
                continue;
            };
            match Font::from_bytes(bytes, FontSettings::default()) {
                Ok(font) => {
                    debug!(font = resource, path = %path.display(), "loaded font resource");
                    return Some(Typeface { name: resource.to_string(), font });
                }
                Err(err) => debug!(font = resource, %err, "font resource is not a valid font"),
            }
        }
        None
    }

    fn load_chain(&self, names: &[&str]) -> Option<FontFace> {
        names
            .iter()
            .find_map(|name| self.load(name))
            .map(|tf| FontFace::Named(tf.name.clone()))
    }

    /// 默认字体；回退链都缺失时为系统默认
    pub fn default_face(&self) -> FontFace {
        self.default_face
            .get_or_init(|| self.load_chain(DEFAULT_FONT_CHAIN).unwrap_or(FontFace::SystemDefault))
            .clone()
    }

    /// 图标字体；缺失时退回默认字体
    pub fn icon_face(&self) -> FontFace {
        self.icon_face
            .get_or_init(|| self.load_chain(ICON_FONT_CHAIN).unwrap_or_else(|| self.default_face()))
            .clone()
    }

    /// fontFamily -> 字体
    pub fn resolve(&self, family: Option<&str>) -> FontFace {
        let family = family.map(str::trim).unwrap_or_default();
        if is_icon_family(family) {
            return self.icon_face();
        }
        if family.is_empty() {
            return self.default_face();
        }
        match self.load(family) {
            Some(tf) => FontFace::Named(tf.name.clone()),
            None => self.default_face(),
        }
    }

    /// 用于测量
    pub fn typeface(&self, face: &FontFace) -> Option<Rc<Typeface>> {
        match face {
            FontFace::Named(name) => self.load(name),
            FontFace::SystemDefault => None,
        }
    }
}

fn is_icon_family(family: &str) -> bool {
    ["font awesome", "font awesome 6 free", "fontawesome"]
        .iter()
        .any(|alias| family.eq_ignore_ascii_case(alias))
}
