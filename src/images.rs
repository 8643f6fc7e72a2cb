use pdf_writer::{Filter, Pdf, Ref};

use crate::error::Error;
use crate::model::{EmbeddedImage, ImageData, LogoSource};

const BUILTIN_LOGO_PX: u32 = 64;

/// Resolve a logo to a decoded image sized `width`×`height` points on the page.
pub(crate) fn load_logo(
    source: &LogoSource,
    width: f32,
    height: f32,
) -> Result<EmbeddedImage, Error> {
    let (data, pixel_width, pixel_height) = match source {
        LogoSource::Builtin => {
            let img = builtin_logo();
            let (w, h) = img.dimensions();
            (ImageData::Rgba(img), w, h)
        }
        LogoSource::Path(path) => {
            let bytes = std::fs::read(path)
                .map_err(|e| Error::ResourceLoad(format!("{}: {e}", path.display())))?;
            decode(&bytes)?
        }
        LogoSource::Url(url) => decode(&fetch_url(url)?)?,
        LogoSource::Bytes(bytes) => decode(bytes)?,
    };

    log::debug!("logo {pixel_width}x{pixel_height}px drawn at {width}x{height}pt");

    Ok(EmbeddedImage {
        data,
        pixel_width,
        pixel_height,
        display_width: width,
        display_height: height,
    })
}

/// Three-component JPEGs are passed through untouched; everything else is decoded to RGBA.
///
/// The decoder reports CMYK and YCCK JPEGs as `Rgb8` after converting them, so the
/// component count comes from the frame header instead.
fn decode(bytes: &[u8]) -> Result<(ImageData, u32, u32), Error> {
    let format = image::guess_format(bytes)
        .map_err(|e| Error::ResourceLoad(format!("logo: unrecognised image format: {e}")))?;
    let decoded = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| Error::ResourceLoad(format!("logo: {e}")))?;
    let (w, h) = (decoded.width(), decoded.height());

    if format == image::ImageFormat::Jpeg && jpeg_components(bytes) == Some(3) {
        return Ok((ImageData::Jpeg(bytes.to_vec()), w, h));
    }
    log::debug!("logo {format:?} re-encoded from {:?}", decoded.color());
    Ok((ImageData::Rgba(decoded.to_rgba8()), w, h))
}

/// Number of colour components declared by the first SOFn segment of a JPEG stream.
fn jpeg_components(bytes: &[u8]) -> Option<u8> {
    if !bytes.starts_with(&[0xFF, 0xD8]) {
        return None;
    }
    let mut pos = 2;
    loop {
        if *bytes.get(pos)? != 0xFF {
            return None;
        }
        // Fill bytes may pad a marker.
        while *bytes.get(pos + 1)? == 0xFF {
            pos += 1;
        }
        let marker = *bytes.get(pos + 1)?;
        pos += 2;
        match marker {
            0x01 | 0xD0..=0xD7 => continue,
            0xD9 | 0xDA => return None,
            _ => {}
        }
        let len = u16::from_be_bytes([*bytes.get(pos)?, *bytes.get(pos + 1)?]) as usize;
        if len < 2 {
            return None;
        }
        // SOF0..SOF15 minus DHT (C4), JPG (C8) and DAC (CC)
        if matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC) {
            // length(2) precision(1) height(2) width(2) components(1)
            return bytes.get(pos + 7).copied();
        }
        pos += len;
    }
}

#[cfg(feature = "remote-logo")]
fn fetch_url(url: &str) -> Result<Vec<u8>, Error> {
    use std::io::Read;

    let response = ureq::get(url)
        .call()
        .map_err(|e| Error::ResourceLoad(format!("{url}: {e}")))?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut bytes)
        .map_err(|e| Error::ResourceLoad(format!("{url}: {e}")))?;
    log::debug!("fetched logo {url} ({} bytes)", bytes.len());
    Ok(bytes)
}

#[cfg(not(feature = "remote-logo"))]
fn fetch_url(url: &str) -> Result<Vec<u8>, Error> {
    Err(Error::ResourceLoad(format!(
        "{url}: remote logos need the `remote-logo` feature"
    )))
}

/// Slate square with three white bars rising left to right.
fn builtin_logo() -> image::RgbaImage {
    let n = BUILTIN_LOGO_PX;
    let slate = image::Rgba([0x42, 0x6B, 0x8E, 0xFF]);
    let white = image::Rgba([0xFF, 0xFF, 0xFF, 0xFF]);
    image::RgbaImage::from_fn(n, n, |x, y| {
        let bar = (x.saturating_sub(10)) / 16;
        let in_bar = x >= 10 && (x - 10) % 16 < 10 && bar < 3;
        // y grows downwards; bar heights 18, 30, 42 px above the baseline at 54
        let top = 54 - 18 - 12 * bar;
        if in_bar && y >= top && y < 54 { white } else { slate }
    })
}

/// Write `img` as an image XObject (plus soft mask when it has transparency).
pub(crate) fn write_image_xobject(
    pdf: &mut Pdf,
    alloc: &mut impl FnMut() -> Ref,
    img: &EmbeddedImage,
) -> Ref {
    let xobj_ref = alloc();
    match &img.data {
        ImageData::Jpeg(bytes) => {
            let mut xobj = pdf.image_xobject(xobj_ref, bytes);
            xobj.filter(Filter::DctDecode);
            xobj.width(img.pixel_width as i32);
            xobj.height(img.pixel_height as i32);
            xobj.color_space().device_rgb();
            xobj.bits_per_component(8);
        }
        ImageData::Rgba(rgba) => {
            let (w, h) = (rgba.width(), rgba.height());
            let has_alpha = rgba.pixels().any(|p| p.0[3] < 255);

            let rgb_data: Vec<u8> = rgba
                .pixels()
                .flat_map(|p| [p.0[0], p.0[1], p.0[2]])
                .collect();
            let compressed_rgb = miniz_oxide::deflate::compress_to_vec_zlib(&rgb_data, 6);

            let smask_ref = if has_alpha {
                let alpha_data: Vec<u8> = rgba.pixels().map(|p| p.0[3]).collect();
                let compressed_alpha = miniz_oxide::deflate::compress_to_vec_zlib(&alpha_data, 6);
                let mask_ref = alloc();
                let mut mask = pdf.image_xobject(mask_ref, &compressed_alpha);
                mask.filter(Filter::FlateDecode);
                mask.width(w as i32);
                mask.height(h as i32);
                mask.color_space().device_gray();
                mask.bits_per_component(8);
                Some(mask_ref)
            } else {
                None
            };

            let mut xobj = pdf.image_xobject(xobj_ref, &compressed_rgb);
            xobj.filter(Filter::FlateDecode);
            xobj.width(w as i32);
            xobj.height(h as i32);
            xobj.color_space().device_rgb();
            xobj.bits_per_component(8);
            if let Some(mask_ref) = smask_ref {
                xobj.s_mask(mask_ref);
            }
        }
    }
    xobj_ref
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(img: &image::RgbaImage) -> Vec<u8> {
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png)
            .expect("encode png");
        out.into_inner()
    }

    #[test]
    fn builtin_logo_is_deterministic_and_opaque() {
        let a = builtin_logo();
        let b = builtin_logo();
        assert_eq!(a.as_raw(), b.as_raw());
        assert!(a.pixels().all(|p| p.0[3] == 255));
        // Some bar pixels are white
        assert!(a.pixels().any(|p| p.0 == [0xFF, 0xFF, 0xFF, 0xFF]));
    }

    #[test]
    fn png_bytes_decode_to_rgba() {
        let src = image::RgbaImage::from_pixel(4, 2, image::Rgba([10, 20, 30, 128]));
        let logo = load_logo(&LogoSource::Bytes(png_bytes(&src)), 40.0, 20.0).expect("decode");
        assert_eq!((logo.pixel_width, logo.pixel_height), (4, 2));
        assert_eq!(logo.display_width, 40.0);
        assert!(matches!(logo.data, ImageData::Rgba(_)));
    }

    fn jpeg_bytes(img: &image::RgbImage) -> Vec<u8> {
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Jpeg)
            .expect("encode jpeg");
        out.into_inner()
    }

    /// SOI, an Adobe APP14 segment, then a baseline frame header with `components`.
    fn frame_header(components: u8) -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xD8];
        bytes.extend_from_slice(&[0xFF, 0xEE, 0x00, 0x0E]);
        bytes.extend_from_slice(b"Adobe");
        bytes.extend_from_slice(&[0x00, 0x64, 0x00, 0x00, 0x00, 0x00, 0x02]);
        // Fill byte before the marker
        bytes.extend_from_slice(&[0xFF, 0xFF, 0xC0]);
        let len = 8 + 3 * components as u16;
        bytes.extend_from_slice(&len.to_be_bytes());
        bytes.extend_from_slice(&[8, 0x00, 0x10, 0x00, 0x10, components]);
        for id in 1..=components {
            bytes.extend_from_slice(&[id, 0x11, 0x00]);
        }
        bytes.extend_from_slice(&[0xFF, 0xD9]);
        bytes
    }

    #[test]
    fn frame_header_component_count_is_read() {
        assert_eq!(jpeg_components(&frame_header(4)), Some(4));
        assert_eq!(jpeg_components(&frame_header(3)), Some(3));
        assert_eq!(jpeg_components(&frame_header(1)), Some(1));
        assert_eq!(jpeg_components(b"\x89PNG\r\n"), None);
        assert_eq!(jpeg_components(&[0xFF, 0xD8, 0xFF, 0xC0, 0x00]), None);
    }

    #[test]
    fn rgb_jpeg_is_passed_through() {
        let bytes = jpeg_bytes(&image::RgbImage::from_pixel(8, 8, image::Rgb([10, 120, 200])));
        assert_eq!(jpeg_components(&bytes), Some(3));
        let logo = load_logo(&LogoSource::Bytes(bytes.clone()), 40.0, 40.0).expect("decode");
        assert!(matches!(&logo.data, ImageData::Jpeg(b) if *b == bytes));
    }

    #[test]
    fn grey_jpeg_is_decoded_to_rgba() {
        let img = image::GrayImage::from_pixel(8, 8, image::Luma([90]));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Jpeg)
            .expect("encode jpeg");
        let bytes = out.into_inner();
        assert_eq!(jpeg_components(&bytes), Some(1));
        let logo = load_logo(&LogoSource::Bytes(bytes), 40.0, 40.0).expect("decode");
        assert!(matches!(logo.data, ImageData::Rgba(_)));
    }

    #[test]
    fn cmyk_jpeg_is_decoded_to_rgba() {
        let pixels: Vec<u8> = [0u8, 160, 255, 20].repeat(8 * 8);
        let mut bytes = Vec::new();
        jpeg_encoder::Encoder::new(&mut bytes, 90)
            .encode(&pixels, 8, 8, jpeg_encoder::ColorType::Cmyk)
            .expect("encode cmyk jpeg");
        assert_eq!(jpeg_components(&bytes), Some(4));

        let logo = load_logo(&LogoSource::Bytes(bytes), 40.0, 40.0).expect("decode");
        assert_eq!((logo.pixel_width, logo.pixel_height), (8, 8));
        assert!(matches!(logo.data, ImageData::Rgba(_)));
    }

    #[test]
    fn garbage_bytes_are_resource_error() {
        let err = load_logo(&LogoSource::Bytes(b"not an image".to_vec()), 80.0, 80.0)
            .err()
            .expect("garbage must fail");
        assert!(matches!(err, Error::ResourceLoad(_)));
    }

    #[test]
    fn missing_path_is_resource_error() {
        let err = load_logo(&LogoSource::Path("/nonexistent/logo.png".into()), 80.0, 80.0)
            .err()
            .expect("missing file must fail");
        assert!(matches!(err, Error::ResourceLoad(_)));
    }

    #[cfg(not(feature = "remote-logo"))]
    #[test]
    fn url_without_feature_is_resource_error() {
        let err = load_logo(&LogoSource::from_reference("https://example.com/logo.png"), 80.0, 80.0)
            .err()
            .expect("url needs the feature");
        assert!(matches!(err, Error::ResourceLoad(_)));
    }
}
