use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Sender};
use std::thread;
use image::ImageReader;
use tiny_skia::{Pixmap, Transform};

/// Loaded pixmap for a requested icon key; `None` if nothing was found.
pub type IconReply = (String, Option<Pixmap>);

const THEME_SUBDIRS: [&str; 7] = [
    "hicolor/48x48/apps",
    "hicolor/scalable/apps",
    "hicolor/32x32/apps",
    "hicolor/64x64/apps",
    "Adwaita/48x48/apps",
    "Adwaita/scalable/apps",
    "",
];
const EXTENSIONS: [&str; 3] = ["png", "svg", "xpm"];

/// Icons and row images, decoded off the UI thread.
///
/// `get` never blocks: a miss queues a load and the loader thread answers on
/// the calloop channel, after which the caller redraws.
pub struct IconCache {
    cache: HashMap<String, Option<Pixmap>>,
    pending: HashSet<String>,
    request_tx: Sender<(String, u32)>,
}

impl IconCache {
    pub fn new(response_tx: calloop::channel::Sender<IconReply>) -> Self {
        let (request_tx, request_rx) = channel::<(String, u32)>();

        let spawned = thread::Builder::new().name("icon-loader".into()).spawn(move || {
            let loader = IconLoader::new(default_roots());
            while let Ok((key, size)) = request_rx.recv() {
                let (name, _) = split_key(&key);
                let pixmap = loader.find(name).and_then(|path| load_from_path(&path, size));
                if response_tx.send((key, pixmap)).is_err() {
                    break;
                }
            }
        });
        if let Err(e) = spawned {
            log::warn!("Icon loader unavailable: {}", e);
        }

        Self {
            cache: HashMap::new(),
            pending: HashSet::new(),
            request_tx,
        }
    }

    /// Cached pixmap for `name` at `size`, queueing a load on a miss.
    pub fn get(&mut self, name: &str, size: u32) -> Option<&Pixmap> {
        let key = cache_key(name, size);
        if !self.cache.contains_key(&key) {
            if self.pending.insert(key.clone()) && self.request_tx.send((key.clone(), size)).is_err() {
                self.cache.insert(key.clone(), None);
            }
            return None;
        }
        self.cache.get(&key).and_then(Option::as_ref)
    }

    pub fn insert(&mut self, key: String, pixmap: Option<Pixmap>) {
        if pixmap.is_none() {
            log::debug!("No icon for '{}'", key);
        }
        self.pending.remove(&key);
        self.cache.insert(key, pixmap);
    }
}

fn cache_key(name: &str, size: u32) -> String {
    format!("{}@{}", name, size)
}

fn split_key(key: &str) -> (&str, &str) {
    key.rsplit_once('@').unwrap_or((key, ""))
}

fn default_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Some(home) = directories::BaseDirs::new() {
        roots.push(home.data_dir().join("icons"));
    }
    roots.push(PathBuf::from("/usr/share/icons"));
    roots.push(PathBuf::from("/usr/share/pixmaps"));
    roots
}

struct IconLoader {
    roots: Vec<PathBuf>,
}

impl IconLoader {
    fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    /// Resolves a themed icon name, or passes an absolute picture path through.
    fn find(&self, name: &str) -> Option<PathBuf> {
        let path = Path::new(name);
        if path.is_absolute() {
            return path.exists().then(|| path.to_path_buf());
        }

        self.roots
            .iter()
            .filter(|root| root.exists())
            .flat_map(|root| THEME_SUBDIRS.iter().map(move |sub| root.join(sub)))
            .flat_map(|dir| EXTENSIONS.iter().map(move |ext| dir.join(format!("{}.{}", name, ext))))
            .find(|candidate| candidate.exists())
    }
}

fn load_from_path(path: &Path, size: u32) -> Option<Pixmap> {
    match path.extension().and_then(|s| s.to_str()) {
        Some("svg") => load_svg(path, size),
        _ => load_raster(path, size),
    }
}

fn load_raster(path: &Path, size: u32) -> Option<Pixmap> {
    let img = ImageReader::open(path).ok()?.with_guessed_format().ok()?.decode().ok()?;
    let img = img.resize(size, size, image::imageops::FilterType::Lanczos3);
    let mut rgba = img.into_rgba8();

    // tiny-skia wants premultiplied alpha
    for pixel in rgba.chunks_exact_mut(4) {
        let a = pixel[3] as f32 / 255.0;
        pixel[0] = (pixel[0] as f32 * a) as u8;
        pixel[1] = (pixel[1] as f32 * a) as u8;
        pixel[2] = (pixel[2] as f32 * a) as u8;
    }

    let (width, height) = rgba.dimensions();
    Pixmap::from_vec(rgba.into_vec(), tiny_skia::IntSize::from_wh(width, height)?)
}

fn load_svg(path: &Path, size: u32) -> Option<Pixmap> {
    let data = fs::read(path).ok()?;
    let tree = resvg::usvg::Tree::from_data(&data, &resvg::usvg::Options::default()).ok()?;

    let mut pixmap = Pixmap::new(size, size)?;
    let transform = Transform::from_scale(
        size as f32 / tree.size().width(),
        size as f32 / tree.size().height(),
    );
    resvg::render(&tree, transform, &mut pixmap.as_mut());
    Some(pixmap)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="16" height="16"><rect width="16" height="16" fill="red"/></svg>"#;

    #[test]
    fn finds_themed_icon_in_first_matching_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let scalable = tmp.path().join("hicolor/scalable/apps");
        fs::create_dir_all(&scalable).unwrap();
        fs::write(scalable.join("firefox.svg"), SQUARE).unwrap();
        fs::write(tmp.path().join("firefox.png"), b"not reached").unwrap();

        let loader = IconLoader::new(vec![PathBuf::from("/nonexistent"), tmp.path().to_path_buf()]);
        assert_eq!(loader.find("firefox"), Some(scalable.join("firefox.svg")));
        assert_eq!(loader.find("missing"), None);
    }

    #[test]
    fn absolute_paths_bypass_theme_lookup() {
        let tmp = tempfile::tempdir().unwrap();
        let picture = tmp.path().join("shot.svg");
        fs::write(&picture, SQUARE).unwrap();

        let loader = IconLoader::new(Vec::new());
        let found = loader.find(picture.to_str().unwrap()).unwrap();
        let pixmap = load_from_path(&found, 24).unwrap();
        assert_eq!((pixmap.width(), pixmap.height()), (24, 24));
    }

    #[test]
    fn cache_keys_carry_size() {
        assert_eq!(split_key(&cache_key("/tmp/a@b.png", 32)), ("/tmp/a@b.png", "32"));
    }
}
