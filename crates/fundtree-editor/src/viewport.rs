//! Pan and zoom of the rendering surface.
//!
//! The transform is held as a structured [`Transform`] and only converted to
//! the CSS `matrix(...)` / `matrix3d(...)` text at the render boundary. Every
//! gesture that would make the scale leave the configured band is refused or
//! clamped, so zero, negative and non-finite scales are unreachable.

use std::fmt;
use std::str::FromStr;

use fundtree_core::EditorSettings;
use thiserror::Error;

/// Which CSS matrix function the transform serialises to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatrixForm {
    #[default]
    Flat,
    Volumetric,
}

/// Uniform scale about the origin followed by a translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    pub scale: f64,
    pub translate_x: f64,
    pub translate_y: f64,
    pub form: MatrixForm,
}

impl Affine {
    pub const IDENTITY: Affine = Affine {
        scale: 1.0,
        translate_x: 0.0,
        translate_y: 0.0,
        form: MatrixForm::Flat,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Transform {
    #[default]
    Identity,
    Matrix(Affine),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformParseError {
    #[error("unrecognised transform function in '{0}'")]
    UnknownFunction(String),
    #[error("expected {expected} matrix components, found {found}")]
    WrongArity { expected: usize, found: usize },
    #[error("invalid matrix component '{0}'")]
    BadComponent(String),
    #[error("matrix scale must be positive, got {0}")]
    NonPositiveScale(f64),
}

impl Transform {
    pub fn scale(&self) -> f64 {
        match self {
            Transform::Identity => 1.0,
            Transform::Matrix(m) => m.scale,
        }
    }

    pub fn translation(&self) -> (f64, f64) {
        match self {
            Transform::Identity => (0.0, 0.0),
            Transform::Matrix(m) => (m.translate_x, m.translate_y),
        }
    }

    fn form(&self) -> MatrixForm {
        match self {
            Transform::Identity => MatrixForm::Flat,
            Transform::Matrix(m) => m.form,
        }
    }

    fn affine(&self) -> Affine {
        match self {
            Transform::Identity => Affine::IDENTITY,
            Transform::Matrix(m) => *m,
        }
    }

    /// CSS text for the rendering layer; `none` for identity.
    pub fn to_css(&self) -> String {
        self.to_string()
    }

    /// Parse CSS transform text, falling back to identity when it is malformed.
    pub fn parse_or_identity(raw: &str) -> Transform {
        raw.parse().unwrap_or_else(|e: TransformParseError| {
            tracing::warn!(transform = raw, error = %e, "malformed transform, resetting to identity");
            Transform::Identity
        })
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transform::Identity => f.write_str("none"),
            Transform::Matrix(Affine {
                scale: s,
                translate_x: tx,
                translate_y: ty,
                form: MatrixForm::Flat,
            }) => write!(f, "matrix({s}, 0, 0, {s}, {tx}, {ty})"),
            Transform::Matrix(Affine {
                scale: s,
                translate_x: tx,
                translate_y: ty,
                form: MatrixForm::Volumetric,
            }) => write!(
                f,
                "matrix3d({s}, 0, 0, 0, 0, {s}, 0, 0, 0, 0, 1, 0, {tx}, {ty}, 0, 1)"
            ),
        }
    }
}

impl FromStr for Transform {
    type Err = TransformParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let text = raw.trim();
        if text.is_empty() || text == "none" {
            return Ok(Transform::Identity);
        }
        let (form, body) = if let Some(body) = text.strip_prefix("matrix3d(") {
            (MatrixForm::Volumetric, body)
        } else if let Some(body) = text.strip_prefix("matrix(") {
            (MatrixForm::Flat, body)
        } else {
            return Err(TransformParseError::UnknownFunction(text.to_string()));
        };
        let body = body
            .strip_suffix(')')
            .ok_or_else(|| TransformParseError::UnknownFunction(text.to_string()))?;
        let values = body
            .split(',')
            .map(|part| {
                let part = part.trim();
                part.parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| TransformParseError::BadComponent(part.to_string()))
            })
            .collect::<Result<Vec<f64>, _>>()?;
        // Non-uniform or skewed matrices are read from their x scale.
        let (expected, scale, tx, ty) = match form {
            MatrixForm::Flat => (6, 0, 4, 5),
            MatrixForm::Volumetric => (16, 0, 12, 13),
        };
        if values.len() != expected {
            return Err(TransformParseError::WrongArity {
                expected,
                found: values.len(),
            });
        }
        let scale = values[scale];
        if scale <= 0.0 {
            return Err(TransformParseError::NonPositiveScale(scale));
        }
        Ok(Transform::Matrix(Affine {
            scale,
            translate_x: values[tx],
            translate_y: values[ty],
            form,
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Pointer input driving a pan gesture.
#[derive(Debug, Clone, PartialEq)]
pub enum Pointer {
    Mouse(Point),
    /// Every active touch point of the gesture.
    Touch(Vec<Point>),
}

impl Pointer {
    /// Position of a single-pointer gesture. Multi-touch, empty touch lists
    /// and non-finite coordinates yield `None`.
    pub fn single(&self) -> Option<Point> {
        let point = match self {
            Pointer::Mouse(p) => *p,
            Pointer::Touch(points) => match points.as_slice() {
                [p] => *p,
                _ => return None,
            },
        };
        (point.x.is_finite() && point.y.is_finite()).then_some(point)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomLimits {
    pub zoom_out: f64,
    pub zoom_in: f64,
}

impl ZoomLimits {
    pub fn from_settings(settings: &EditorSettings) -> Self {
        let settings = settings.clone().sanitized();
        Self {
            zoom_out: settings.zoom_out_limit,
            zoom_in: settings.zoom_in_limit,
        }
    }

    /// Strictly inside the band; used to accept or refuse zoom steps.
    pub fn admits(&self, scale: f64) -> bool {
        scale > self.zoom_out && scale < self.zoom_in
    }

    pub fn clamp(&self, scale: f64) -> f64 {
        scale.clamp(self.zoom_out, self.zoom_in)
    }
}

impl Default for ZoomLimits {
    fn default() -> Self {
        Self::from_settings(&EditorSettings::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PanAnchor {
    pointer: Point,
    translate: (f64, f64),
}

/// Result of a fit-to-screen solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fit {
    pub scale: f64,
    /// Horizontal scroll offset that centres the scaled content in the viewport.
    pub scroll_x: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    transform: Transform,
    limits: ZoomLimits,
    wheel_zoom_in: f64,
    wheel_zoom_out: f64,
    pan: Option<PanAnchor>,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(&EditorSettings::default())
    }
}

impl Viewport {
    pub fn new(settings: &EditorSettings) -> Self {
        let settings = settings.clone().sanitized();
        Self {
            transform: Transform::Identity,
            limits: ZoomLimits::from_settings(&settings),
            wheel_zoom_in: settings.wheel_zoom_in_factor,
            wheel_zoom_out: settings.wheel_zoom_out_factor,
            pan: None,
        }
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn limits(&self) -> ZoomLimits {
        self.limits
    }

    pub fn scale(&self) -> f64 {
        self.transform.scale()
    }

    pub fn css(&self) -> String {
        self.transform.to_css()
    }

    /// Restore a transform from its CSS text; malformed text resets to identity.
    ///
    /// A scale outside the zoom band is clamped into it. The translation is kept.
    pub fn restore(&mut self, raw: &str) {
        self.transform = match Transform::parse_or_identity(raw) {
            Transform::Matrix(m) => {
                let scale = self.limits.clamp(m.scale);
                if scale != m.scale {
                    tracing::debug!(restored = m.scale, clamped = scale, "restored scale clamped");
                }
                Transform::Matrix(Affine { scale, ..m })
            }
            Transform::Identity => Transform::Identity,
        };
        self.pan = None;
    }

    pub fn reset(&mut self) {
        self.transform = Transform::Identity;
        self.pan = None;
    }

    /// Multiply the scale by `factor`, keeping the translation.
    ///
    /// Returns `false` (and leaves the transform alone) when the factor is not
    /// a positive finite number or the result would leave the zoom band.
    pub fn zoom(&mut self, factor: f64) -> bool {
        if !factor.is_finite() || factor <= 0.0 {
            tracing::debug!(factor, "ignoring invalid zoom factor");
            return false;
        }
        let target = self.scale() * factor;
        if !self.limits.admits(target) {
            tracing::debug!(target, "zoom outside limits refused");
            return false;
        }
        self.transform = Transform::Matrix(Affine {
            scale: target,
            ..self.transform.affine()
        });
        true
    }

    /// Scroll down zooms out, scroll up zooms in, by the configured step.
    pub fn wheel(&mut self, delta_y: f64) -> bool {
        if delta_y > 0.0 {
            self.zoom(self.wheel_zoom_out)
        } else if delta_y < 0.0 {
            self.zoom(self.wheel_zoom_in)
        } else {
            false
        }
    }

    /// Set an absolute scale that fits `content_width` into `viewport_width`,
    /// clamped into the zoom band, with the translation reset to the origin.
    pub fn fit_to_screen(&mut self, content_width: f64, viewport_width: f64) -> Option<Fit> {
        let valid = |w: f64| w.is_finite() && w > 0.0;
        if !valid(content_width) || !valid(viewport_width) {
            tracing::debug!(content_width, viewport_width, "fit-to-screen needs positive widths");
            return None;
        }
        let scale = self.limits.clamp(viewport_width / content_width);
        self.transform = Transform::Matrix(Affine {
            scale,
            translate_x: 0.0,
            translate_y: 0.0,
            form: self.transform.form(),
        });
        self.pan = None;
        let scroll_x = ((content_width * scale - viewport_width) / 2.0).max(0.0);
        Some(Fit { scale, scroll_x })
    }

    /// Capture the anchor of a pan. Multi-touch gestures are ignored.
    pub fn pan_start(&mut self, pointer: &Pointer) -> bool {
        let Some(at) = pointer.single() else {
            return false;
        };
        if self.transform == Transform::Identity {
            self.transform = Transform::Matrix(Affine::IDENTITY);
        }
        self.pan = Some(PanAnchor {
            pointer: at,
            translate: self.transform.translation(),
        });
        true
    }

    /// Translate to the anchor translation plus the pointer travel since `pan_start`.
    pub fn pan_move(&mut self, pointer: &Pointer) -> bool {
        let (Some(anchor), Some(at)) = (self.pan, pointer.single()) else {
            return false;
        };
        let next = Affine {
            translate_x: anchor.translate.0 + (at.x - anchor.pointer.x),
            translate_y: anchor.translate.1 + (at.y - anchor.pointer.y),
            ..self.transform.affine()
        };
        self.transform = Transform::Matrix(next);
        true
    }

    pub fn pan_end(&mut self) {
        self.pan = None;
    }

    pub fn is_panning(&self) -> bool {
        self.pan.is_some()
    }
}
