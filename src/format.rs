use {
    ahash::AHashMap,
    std::{
        fmt::{Debug, Display, Formatter, Write},
        sync::LazyLock,
    },
};

#[derive(Copy, Clone, Debug)]
pub struct Format {
    pub name: &'static str,
    pub drm: u32,
    pub has_alpha: bool,
    pub yuv: bool,
    pub planes: usize,
    pub bits_per_component: u32,
}

impl PartialEq for Format {
    fn eq(&self, other: &Self) -> bool {
        self.drm == other.drm
    }
}

impl Eq for Format {}

static FORMATS_MAP: LazyLock<AHashMap<u32, &'static Format>> = LazyLock::new(|| {
    let mut map = AHashMap::new();
    for format in FORMATS {
        assert!(map.insert(format.drm, format).is_none());
    }
    map
});

static FORMATS_NAMES: LazyLock<AHashMap<&'static str, &'static Format>> = LazyLock::new(|| {
    let mut map = AHashMap::new();
    for format in FORMATS {
        assert!(map.insert(format.name, format).is_none());
    }
    map
});

#[test]
fn formats_dont_panic() {
    formats();
    named_formats();
}

#[test]
fn nv12_fourcc() {
    assert_eq!(NV12.drm, 0x3231564e);
    assert_eq!(formats().get(&NV12.drm).map(|f| f.name), Some("nv12"));
    assert_eq!(fourcc(P010.drm).to_string(), "P010");
}

pub fn formats() -> &'static AHashMap<u32, &'static Format> {
    &FORMATS_MAP
}

pub fn named_formats() -> &'static AHashMap<&'static str, &'static Format> {
    &FORMATS_NAMES
}

/// Looks up a format by name, ignoring case.
pub fn format_by_name(name: &str) -> Option<&'static Format> {
    named_formats().get(name.to_ascii_lowercase().as_str()).copied()
}

const fn fourcc_code(a: char, b: char, c: char, d: char) -> u32 {
    (a as u32) | ((b as u32) << 8) | ((c as u32) << 16) | ((d as u32) << 24)
}

pub struct Fourcc(u32);

pub fn fourcc(fourcc: u32) -> Fourcc {
    Fourcc(fourcc)
}

impl Display for Fourcc {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for shift in [0, 8, 16, 24] {
            f.write_char((self.0 >> shift) as u8 as char)?;
        }
        Ok(())
    }
}

impl Debug for Fourcc {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

const fn rgb(name: &'static str, drm: u32, has_alpha: bool, bits: u32) -> Format {
    Format {
        name,
        drm,
        has_alpha,
        yuv: false,
        planes: 1,
        bits_per_component: bits,
    }
}

const fn yuv(name: &'static str, drm: u32, planes: usize, bits: u32) -> Format {
    Format {
        name,
        drm,
        has_alpha: false,
        yuv: true,
        planes,
        bits_per_component: bits,
    }
}

pub static FORMATS: &[Format] = &[
    yuv("nv12", fourcc_code('N', 'V', '1', '2'), 2, 8),
    yuv("p010", fourcc_code('P', '0', '1', '0'), 2, 10),
    yuv("yuyv", fourcc_code('Y', 'U', 'Y', 'V'), 1, 8),
    rgb("argb8888", fourcc_code('A', 'R', '2', '4'), true, 8),
    rgb("xrgb8888", fourcc_code('X', 'R', '2', '4'), false, 8),
    rgb("abgr8888", fourcc_code('A', 'B', '2', '4'), true, 8),
    rgb("xbgr8888", fourcc_code('X', 'B', '2', '4'), false, 8),
    rgb("argb2101010", fourcc_code('A', 'R', '3', '0'), true, 10),
    rgb("xrgb2101010", fourcc_code('X', 'R', '3', '0'), false, 10),
];

pub static NV12: &Format = &FORMATS[0];
pub static P010: &Format = &FORMATS[1];
pub static YUYV: &Format = &FORMATS[2];
pub static ARGB8888: &Format = &FORMATS[3];
pub static XRGB8888: &Format = &FORMATS[4];
pub static ABGR8888: &Format = &FORMATS[5];
pub static XBGR8888: &Format = &FORMATS[6];
pub static ARGB2101010: &Format = &FORMATS[7];
pub static XRGB2101010: &Format = &FORMATS[8];
