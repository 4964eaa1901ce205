use core::fmt;

use crate::index::{Cluster, MAX_ZOOM};

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
    }
}

pub const FILL_ALPHA: f32 = 0.8;
pub const BORDER_ALPHA: f32 = 0.5;

/// Member-count bucket of a multi-member cluster marker.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SizeBucket {
    Small,
    Medium,
    Large,
}

impl SizeBucket {
    pub const fn of(member_count: u32) -> Self {
        if member_count < 100 {
            SizeBucket::Small
        } else if member_count < 1000 {
            SizeBucket::Medium
        } else {
            SizeBucket::Large
        }
    }

    pub const fn base_color(self) -> Rgba {
        match self {
            SizeBucket::Small => Rgba::new(102, 194, 164, 1.0),
            SizeBucket::Medium => Rgba::new(44, 162, 95, 1.0),
            SizeBucket::Large => Rgba::new(0, 109, 44, 1.0),
        }
    }
}

/// Icon for a single-point marker.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum PointIcon {
    Dot { fill: Rgba },
    Star,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MarkerStyle {
    Point {
        icon: PointIcon,
        size_px: u32,
        border_px: u32,
    },
    Cluster {
        bucket: SizeBucket,
        fill: Rgba,
        border: Rgba,
        label: String,
        badge: Option<&'static str>,
        size_px: u32,
        border_px: u32,
        clickable: bool,
    },
}

impl MarkerStyle {
    pub fn is_clickable(&self) -> bool {
        match self {
            MarkerStyle::Point { .. } => true,
            MarkerStyle::Cluster { clickable, .. } => *clickable,
        }
    }
}

pub const POINT_COLOR: Rgba = Rgba::new(212, 0, 0, 1.0);

/// Marker appearance of `cluster` drawn at map zoom `zoom`.
pub fn marker_style(cluster: &Cluster, zoom: u8) -> MarkerStyle {
    if cluster.is_single() {
        let icon = if cluster.has_digital_member {
            PointIcon::Star
        } else {
            PointIcon::Dot { fill: POINT_COLOR }
        };
        return MarkerStyle::Point {
            icon,
            size_px: 18,
            border_px: 2,
        };
    }

    let bucket = SizeBucket::of(cluster.member_count);
    let base = bucket.base_color();
    MarkerStyle::Cluster {
        bucket,
        fill: base.with_alpha(FILL_ALPHA),
        border: base.with_alpha(BORDER_ALPHA),
        label: cluster.member_count.to_string(),
        badge: cluster.has_digital_member.then_some("!"),
        size_px: 40,
        border_px: 5,
        clickable: zoom == MAX_ZOOM,
    }
}
