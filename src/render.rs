//! Conversion of planar pixel data to interleaved 8-bit RGBA.
//!
//! Every supported color mode funnels through [`render_planar_rgba8`]: the
//! caller lines up the planes for the mode (base channels first, alpha
//! appended when present) and gets back non-premultiplied RGBA8. Lab goes
//! through a D50 to D65 Bradford-adapted path into sRGB; everything else is
//! arithmetic per pixel.

use thiserror::Error;

use crate::psd_channel::scanline_len;
use crate::sections::color_mode_data_section::PALETTE_LEN;
use crate::sections::file_header_section::{ColorMode, PsdDepth};

/// An error while rendering pixels to RGBA.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The output buffer cannot hold the rendered image.
    #[error("output buffer is {provided} bytes but {required} are required")]
    BufferTooSmall {
        /// Bytes the render needs
        required: usize,
        /// Bytes the caller provided
        provided: usize,
    },
    /// The color mode has no RGBA conversion.
    #[error("color mode {mode} cannot be converted to RGBA")]
    UnsupportedColorMode {
        /// The numeric color mode
        mode: u16,
    },
    /// A required plane is absent or shorter than the dimensions demand.
    #[error("plane data is missing or too short for the image dimensions")]
    MissingPlaneData,
    /// The document carries no composite image.
    #[error("no composite image is present in this document")]
    NoComposite,
    /// The image dimensions overflow the platform's size type.
    #[error("image dimensions overflow the platform's size type")]
    SizeOverflow,
}

/// Bytes an RGBA8 render of `width x height` occupies.
pub(crate) fn rgba8_len(width: u32, height: u32) -> Result<usize, RenderError> {
    let required = u64::from(width) * u64::from(height) * 4;
    usize::try_from(required).map_err(|_| RenderError::SizeOverflow)
}

/// Read one sample as 8 bits.
///
/// Depth 8 takes the byte; 16 and 32 take the most significant byte of the
/// big-endian sample.
///
/// TODO: a float-aware path for 32-bit documents; MSB truncation keeps
/// behavioral parity with existing consumers until the mapping is settled.
fn sample_to_u8(plane: &[u8], index: usize, bytes_per_sample: usize) -> u8 {
    plane[index * bytes_per_sample]
}

/// Read one big-endian 16-bit sample.
fn sample_to_u16(plane: &[u8], index: usize) -> u16 {
    u16::from_be_bytes([plane[index * 2], plane[index * 2 + 1]])
}

fn clamp01(v: f32) -> f32 {
    v.clamp(0.0, 1.0)
}

fn f32_to_u8(v: f32) -> u8 {
    (clamp01(v) * 255.0).round() as u8
}

/// sRGB companding of a linear value.
fn srgb_compand(v: f32) -> f32 {
    let v = clamp01(v);
    if v <= 0.0031308 {
        12.92 * v
    } else {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    }
}

/// Bradford cone response matrix.
const BRADFORD: [[f32; 3]; 3] = [
    [0.8951, 0.2664, -0.1614],
    [-0.7502, 1.7135, 0.0367],
    [0.0389, -0.0685, 1.0296],
];
/// Inverse of the Bradford matrix.
const BRADFORD_INV: [[f32; 3]; 3] = [
    [0.9869929, -0.1470543, 0.1599627],
    [0.4323053, 0.5183603, 0.0492912],
    [-0.0085287, 0.0400428, 0.9684867],
];
/// ICC D50 reference white.
const WHITE_D50: [f32; 3] = [0.96422, 1.0, 0.82521];
/// D65 reference white.
const WHITE_D65: [f32; 3] = [0.95047, 1.0, 1.08883];

/// The plane at `index`, when the caller supplied one.
fn plane_at<'a>(planes: &[Option<&'a [u8]>], index: usize) -> Option<&'a [u8]> {
    planes.get(index).copied().flatten()
}

fn mat_mul(m: &[[f32; 3]; 3], v: [f32; 3]) -> [f32; 3] {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

/// Convert one CIE Lab (D50) color to 8-bit sRGB.
///
/// Lab -> XYZ uses the CIE piecewise inverse with eps = 216/24389 and
/// kappa = 24389/27; chromatic adaptation D50 -> D65 uses the Bradford
/// transform; XYZ -> linear sRGB uses the standard matrix.
pub(crate) fn lab_d50_to_srgb_u8(l: f32, a: f32, b: f32) -> [u8; 3] {
    let fy = (l + 16.0) / 116.0;
    let fx = fy + a / 500.0;
    let fz = fy - b / 200.0;

    let eps = 216.0 / 24389.0;
    let kappa = 24389.0 / 27.0;

    let fx3 = fx * fx * fx;
    let fy3 = fy * fy * fy;
    let fz3 = fz * fz * fz;

    let xr = if fx3 > eps { fx3 } else { (116.0 * fx - 16.0) / kappa };
    let yr = if l > kappa * eps { fy3 } else { l / kappa };
    let zr = if fz3 > eps { fz3 } else { (116.0 * fz - 16.0) / kappa };

    let xyz_d50 = [xr * WHITE_D50[0], yr * WHITE_D50[1], zr * WHITE_D50[2]];

    // Scale cone responses by the ratio of the adapted whites
    let lms_white_d50 = mat_mul(&BRADFORD, WHITE_D50);
    let lms_white_d65 = mat_mul(&BRADFORD, WHITE_D65);
    let mut lms = mat_mul(&BRADFORD, xyz_d50);
    for i in 0..3 {
        if lms_white_d50[i] != 0.0 {
            lms[i] *= lms_white_d65[i] / lms_white_d50[i];
        }
    }
    let xyz_d65 = mat_mul(&BRADFORD_INV, lms);

    let [x, y, z] = xyz_d65;
    let rl = 3.2406 * x - 1.5372 * y - 0.4986 * z;
    let gl = -0.9689 * x + 1.8758 * y + 0.0415 * z;
    let bl = 0.0557 * x - 0.2040 * y + 1.0570 * z;

    [
        f32_to_u8(srgb_compand(rl)),
        f32_to_u8(srgb_compand(gl)),
        f32_to_u8(srgb_compand(bl)),
    ]
}

/// Convert planar pixel data to interleaved non-premultiplied RGBA8.
///
/// `planes` holds the mode's base channels in order with an optional alpha
/// plane appended (the caller is responsible for that ordering). Missing
/// trailing planes degrade per mode: a grayscale image without alpha is
/// opaque, an RGB image missing green and blue renders as its red plane, and
/// so on.
pub(crate) fn render_planar_rgba8(
    mode: ColorMode,
    depth: PsdDepth,
    width: u32,
    height: u32,
    planes: &[Option<&[u8]>],
    color_mode_data: &[u8],
    rgba: &mut [u8],
) -> Result<(), RenderError> {
    let required = rgba8_len(width, height)?;
    if rgba.len() < required {
        return Err(RenderError::BufferTooSmall {
            required,
            provided: rgba.len(),
        });
    }
    if width == 0 || height == 0 {
        return Ok(());
    }

    // Every present plane must span the whole image.
    let plane_len = usize::try_from(scanline_len(width, depth) * u64::from(height))
        .map_err(|_| RenderError::SizeOverflow)?;
    for plane in planes.iter().flatten() {
        if plane.len() < plane_len {
            return Err(RenderError::MissingPlaneData);
        }
    }

    if depth == PsdDepth::One {
        // Bitmap: one bit per pixel, most significant bit first
        let plane0 = plane_at(planes, 0).ok_or(RenderError::MissingPlaneData)?;
        let row_bytes = (width as usize + 7) / 8;
        for y in 0..height as usize {
            for x in 0..width as usize {
                let byte = plane0[y * row_bytes + x / 8];
                let bit = (byte >> (7 - (x % 8))) & 1;
                let v = if bit == 1 { 255 } else { 0 };
                let out = (y * width as usize + x) * 4;
                rgba[out] = v;
                rgba[out + 1] = v;
                rgba[out + 2] = v;
                rgba[out + 3] = 255;
            }
        }
        return Ok(());
    }

    let bps = depth.bytes_per_sample() as usize;
    let pixel_count = width as usize * height as usize;

    for idx in 0..pixel_count {
        let (r, g, b, a) = match mode {
            ColorMode::Rgb => {
                let r = plane_at(planes, 0).map_or(0, |p| sample_to_u8(p, idx, bps));
                let g = plane_at(planes, 1).map_or(r, |p| sample_to_u8(p, idx, bps));
                let b = plane_at(planes, 2).map_or(r, |p| sample_to_u8(p, idx, bps));
                let a = plane_at(planes, 3).map_or(255, |p| sample_to_u8(p, idx, bps));
                (r, g, b, a)
            }
            ColorMode::Grayscale | ColorMode::Duotone => {
                let v = plane_at(planes, 0).map_or(0, |p| sample_to_u8(p, idx, bps));
                let a = plane_at(planes, 1).map_or(255, |p| sample_to_u8(p, idx, bps));
                (v, v, v, a)
            }
            ColorMode::Indexed => {
                let index = plane_at(planes, 0).map_or(0, |p| sample_to_u8(p, idx, bps));
                let a = plane_at(planes, 1).map_or(255, |p| sample_to_u8(p, idx, bps));
                if color_mode_data.len() >= PALETTE_LEN {
                    let i = usize::from(index);
                    (
                        color_mode_data[i],
                        color_mode_data[256 + i],
                        color_mode_data[512 + i],
                        a,
                    )
                } else {
                    // No palette: show the index itself as grey
                    (index, index, index, a)
                }
            }
            ColorMode::Cmyk => {
                // Stored subtractive: 0 = full ink
                let c = plane_at(planes, 0).map_or(0, |p| sample_to_u8(p, idx, bps));
                let m = plane_at(planes, 1).map_or(0, |p| sample_to_u8(p, idx, bps));
                let y = plane_at(planes, 2).map_or(0, |p| sample_to_u8(p, idx, bps));
                let k = plane_at(planes, 3).map_or(0, |p| sample_to_u8(p, idx, bps));
                let a = plane_at(planes, 4).map_or(255, |p| sample_to_u8(p, idx, bps));
                let r = 255 - (u16::from(c) + u16::from(k)).min(255) as u8;
                let g = 255 - (u16::from(m) + u16::from(k)).min(255) as u8;
                let b = 255 - (u16::from(y) + u16::from(k)).min(255) as u8;
                (r, g, b, a)
            }
            ColorMode::Lab => {
                let (p0, p1, p2) = match (plane_at(planes, 0), plane_at(planes, 1), plane_at(planes, 2)) {
                    (Some(p0), Some(p1), Some(p2)) => (p0, p1, p2),
                    _ => return Err(RenderError::MissingPlaneData),
                };
                let (l, a_star, b_star) = if depth == PsdDepth::Eight {
                    (
                        f32::from(p0[idx]) * 100.0 / 255.0,
                        f32::from(p1[idx]) - 128.0,
                        f32::from(p2[idx]) - 128.0,
                    )
                } else {
                    (
                        f32::from(sample_to_u16(p0, idx)) * 100.0 / 65535.0,
                        (f32::from(sample_to_u16(p1, idx)) - 32768.0) / 256.0,
                        (f32::from(sample_to_u16(p2, idx)) - 32768.0) / 256.0,
                    )
                };
                let [r, g, b] = lab_d50_to_srgb_u8(l, a_star, b_star);
                let a = plane_at(planes, 3).map_or(255, |p| sample_to_u8(p, idx, bps));
                (r, g, b, a)
            }
            other => {
                return Err(RenderError::UnsupportedColorMode {
                    mode: other.as_u16(),
                })
            }
        };

        let out = idx * 4;
        rgba[out] = r;
        rgba[out + 1] = g;
        rgba[out + 2] = b;
        rgba[out + 3] = a;
    }

    Ok(())
}
