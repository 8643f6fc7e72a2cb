use std::collections::{HashMap, HashSet};
use std::path::Path;

use memmap2::Mmap;
use pdf_writer::{Name, Pdf, Rect, Ref};
use ttf_parser::Face;

use crate::error::Error;
use crate::style::{FontFace, FontSource};

/// Ascender of the base-14 Helvetica family, in em.
const HELVETICA_ASCENDER: f32 = 0.718;

#[derive(Clone)]
pub(crate) struct FontEntry {
    pub(crate) pdf_name: String,
    pub(crate) font_ref: Ref,
    widths_1000: Vec<f32>,
    pub(crate) ascender_ratio: f32,
    char_to_gid: Option<HashMap<char, u16>>,
    char_widths_1000: Option<HashMap<char, f32>>,
}

impl FontEntry {
    /// Width of a single character in 1000-units. Uses the per-char cache (covers
    /// every char the report uses), falls back to the WinAnsi table.
    pub(crate) fn char_width_1000(&self, ch: char) -> f32 {
        if let Some(ref map) = self.char_widths_1000
            && let Some(&w) = map.get(&ch)
        {
            return w;
        }
        let byte = char_to_winansi(ch);
        if byte >= 32 {
            self.widths_1000[(byte - 32) as usize]
        } else {
            0.0
        }
    }

    pub(crate) fn text_width(&self, text: &str, font_size: f32) -> f32 {
        text.chars()
            .map(|ch| self.char_width_1000(ch) * font_size / 1000.0)
            .sum()
    }

    pub(crate) fn space_width(&self, font_size: f32) -> f32 {
        self.char_width_1000(' ') * font_size / 1000.0
    }

    /// Bytes for a `Tj` operand in this font's encoding.
    pub(crate) fn encode(&self, text: &str) -> Vec<u8> {
        match &self.char_to_gid {
            Some(map) => encode_as_gids(text, map),
            None => to_winansi_bytes(text),
        }
    }
}

/// The fonts registered for one document, addressed by face.
pub(crate) struct FontSet {
    entries: Vec<FontEntry>,
    regular: usize,
    bold: usize,
    bold_oblique: usize,
}

impl FontSet {
    pub(crate) fn get(&self, face: FontFace) -> &FontEntry {
        let idx = match face {
            FontFace::Regular => self.regular,
            FontFace::Bold => self.bold,
            FontFace::BoldOblique => self.bold_oblique,
        };
        &self.entries[idx]
    }

    pub(crate) fn resource_pairs(&self) -> Vec<(String, Ref)> {
        self.entries
            .iter()
            .map(|e| (e.pdf_name.clone(), e.font_ref))
            .collect()
    }
}

/// Windows-1252 (WinAnsi) byte to Unicode char mapping.
/// Bytes 0x80-0x9F are remapped; all others map directly to their Unicode codepoint.
fn winansi_to_char(byte: u8) -> char {
    match byte {
        0x80 => '\u{20AC}',
        0x82 => '\u{201A}',
        0x83 => '\u{0192}',
        0x84 => '\u{201E}',
        0x85 => '\u{2026}',
        0x86 => '\u{2020}',
        0x87 => '\u{2021}',
        0x88 => '\u{02C6}',
        0x89 => '\u{2030}',
        0x8A => '\u{0160}',
        0x8B => '\u{2039}',
        0x8C => '\u{0152}',
        0x8E => '\u{017D}',
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '\u{2022}',
        0x96 => '\u{2013}',
        0x97 => '\u{2014}',
        0x98 => '\u{02DC}',
        0x99 => '\u{2122}',
        0x9A => '\u{0161}',
        0x9B => '\u{203A}',
        0x9C => '\u{0153}',
        0x9E => '\u{017E}',
        0x9F => '\u{0178}',
        _ => byte as char,
    }
}

/// Map a single Unicode char to its WinAnsi byte, or 0 if unmappable.
fn char_to_winansi(c: char) -> u8 {
    match c as u32 {
        0x0020..=0x007F => c as u8,
        0x00A0..=0x00FF => c as u8,
        0x20AC => 0x80,
        0x201A => 0x82,
        0x0192 => 0x83,
        0x201E => 0x84,
        0x2026 => 0x85,
        0x2020 => 0x86,
        0x2021 => 0x87,
        0x02C6 => 0x88,
        0x2030 => 0x89,
        0x0160 => 0x8A,
        0x2039 => 0x8B,
        0x0152 => 0x8C,
        0x017D => 0x8E,
        0x2018 => 0x91,
        0x2019 => 0x92,
        0x201C => 0x93,
        0x201D => 0x94,
        0x2022 => 0x95,
        0x2013 => 0x96,
        0x2014 => 0x97,
        0x02DC => 0x98,
        0x2122 => 0x99,
        0x0161 => 0x9A,
        0x203A => 0x9B,
        0x0153 => 0x9C,
        0x017E => 0x9E,
        0x0178 => 0x9F,
        _ => 0,
    }
}

/// Convert a UTF-8 string to WinAnsi (Windows-1252) bytes for PDF Str encoding.
/// Characters outside the code page are dropped.
pub(crate) fn to_winansi_bytes(s: &str) -> Vec<u8> {
    s.chars()
        .filter_map(|c| match char_to_winansi(c) {
            0 => None,
            b => Some(b),
        })
        .collect()
}

/// Encode UTF-8 text as big-endian 2-byte glyph IDs for CIDFont content streams.
pub(crate) fn encode_as_gids(text: &str, char_to_gid: &HashMap<char, u16>) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() * 2);
    for ch in text.chars() {
        let gid = char_to_gid.get(&ch).copied().unwrap_or(0);
        out.push((gid >> 8) as u8);
        out.push((gid & 0xFF) as u8);
    }
    out
}

// Helvetica AFM advance widths for ASCII 32..=126.
#[rustfmt::skip]
const HELVETICA_ASCII: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD_ASCII: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

/// Unaccented ASCII letter used to approximate the width of a Latin-1 letter.
fn latin_base(c: char) -> Option<char> {
    Some(match c {
        'À'..='Å' => 'A',
        'Ç' => 'C',
        'È'..='Ë' => 'E',
        'Ì'..='Ï' => 'I',
        'Ð' => 'D',
        'Ñ' => 'N',
        'Ò'..='Ö' | 'Ø' => 'O',
        'Ù'..='Ü' => 'U',
        'Ý' | 'Ÿ' => 'Y',
        'Š' => 'S',
        'Ž' => 'Z',
        'à'..='å' => 'a',
        'ç' => 'c',
        'è'..='ë' => 'e',
        'ì'..='ï' => 'i',
        'ñ' => 'n',
        'ò'..='ö' | 'ø' => 'o',
        'ù'..='ü' => 'u',
        'ý' | 'ÿ' => 'y',
        'š' => 's',
        'ž' => 'z',
        '\u{A0}' => ' ',
        _ => return None,
    })
}

/// Helvetica widths at 1000 units/em for WinAnsi chars 32..=255.
fn helvetica_widths(bold: bool) -> Vec<f32> {
    let ascii = if bold {
        &HELVETICA_BOLD_ASCII
    } else {
        &HELVETICA_ASCII
    };
    let lookup = |c: char| -> Option<f32> {
        let b = c as u32;
        (32..=126)
            .contains(&b)
            .then(|| ascii[(b - 32) as usize] as f32)
    };
    (32u8..=255u8)
        .map(|b| {
            let c = winansi_to_char(b);
            lookup(c)
                .or_else(|| latin_base(c).and_then(lookup))
                .unwrap_or(556.0)
        })
        .collect()
}

struct TrueTypeMetrics {
    widths_1000: Vec<f32>,
    ascender_ratio: f32,
    char_to_gid: HashMap<char, u16>,
    char_widths_1000: HashMap<char, f32>,
}

/// Embed a TrueType/OpenType font as a CIDFont (Type0 composite) with Identity-H encoding.
/// The font data is subsetted to only include glyphs used in the document.
fn embed_truetype(
    pdf: &mut Pdf,
    font_ref: Ref,
    font_name: &str,
    font_data: &[u8],
    used_chars: &HashSet<char>,
    alloc: &mut impl FnMut() -> Ref,
) -> Option<TrueTypeMetrics> {
    let face = Face::parse(font_data, 0).ok()?;
    let descriptor_ref = alloc();
    let data_ref = alloc();

    let units = face.units_per_em() as f32;
    let ascent = face.ascender() as f32 / units * 1000.0;
    let descent = face.descender() as f32 / units * 1000.0;
    let cap_height = face
        .capital_height()
        .map(|h| h as f32 / units * 1000.0)
        .unwrap_or(700.0);

    let bb = face.global_bounding_box();
    let bbox = Rect::new(
        bb.x_min as f32 / units * 1000.0,
        bb.y_min as f32 / units * 1000.0,
        bb.x_max as f32 / units * 1000.0,
        bb.y_max as f32 / units * 1000.0,
    );

    let widths_1000: Vec<f32> = (32u8..=255u8)
        .map(|byte| {
            face.glyph_index(winansi_to_char(byte))
                .and_then(|gid| face.glyph_hor_advance(gid))
                .map(|adv| adv as f32 / units * 1000.0)
                .unwrap_or(0.0)
        })
        .collect();

    let mut remapper = subsetter::GlyphRemapper::new();
    let mut char_to_gid = HashMap::new();
    let mut char_widths_1000 = HashMap::new();
    let mut used: Vec<char> = used_chars.iter().copied().collect();
    // Stable glyph numbering keeps the output byte-identical between runs.
    used.sort_unstable();
    for ch in used {
        if let Some(gid) = face.glyph_index(ch) {
            let new_gid = remapper.remap(gid.0);
            char_to_gid.insert(ch, new_gid);
            let w = face
                .glyph_hor_advance(gid)
                .map(|adv| adv as f32 / units * 1000.0)
                .unwrap_or(0.0);
            char_widths_1000.insert(ch, w);
        }
    }

    let subset_data = subsetter::subset(font_data, 0, &remapper).unwrap_or_else(|e| {
        log::warn!("Font subsetting failed for {font_name}: {e}, embedding full font");
        font_data.to_vec()
    });

    let data_len = i32::try_from(subset_data.len()).ok()?;
    pdf.stream(data_ref, &subset_data)
        .pair(Name(b"Length1"), data_len);

    let ps_name: String = font_name.chars().filter(|c| !c.is_whitespace()).collect();

    pdf.font_descriptor(descriptor_ref)
        .name(Name(ps_name.as_bytes()))
        .flags(pdf_writer::types::FontFlags::NON_SYMBOLIC)
        .bbox(bbox)
        .italic_angle(0.0)
        .ascent(ascent)
        .descent(descent)
        .cap_height(cap_height)
        .stem_v(80.0)
        .font_file2(data_ref);

    let cid_font_ref = alloc();
    let system_info = pdf_writer::types::SystemInfo {
        registry: pdf_writer::Str(b"Adobe"),
        ordering: pdf_writer::Str(b"Identity"),
        supplement: 0,
    };
    {
        let mut cid = pdf.cid_font(cid_font_ref);
        cid.subtype(pdf_writer::types::CidFontType::Type2);
        cid.base_font(Name(ps_name.as_bytes()));
        cid.system_info(system_info);
        cid.font_descriptor(descriptor_ref);
        cid.default_width(0.0);
        cid.cid_to_gid_map_predefined(Name(b"Identity"));
        let mut gid_widths: Vec<(u16, f32)> = char_to_gid
            .iter()
            .map(|(ch, &new_gid)| (new_gid, char_widths_1000.get(ch).copied().unwrap_or(0.0)))
            .collect();
        gid_widths.sort_by_key(|&(gid, _)| gid);
        if !gid_widths.is_empty() {
            let mut w = cid.widths();
            for &(gid, width) in &gid_widths {
                w.consecutive(gid, [width]);
            }
        }
    }

    let tounicode_ref = alloc();
    let cmap_name = format!("{}-UTF16", ps_name);
    let mut cmap = pdf_writer::types::UnicodeCmap::new(
        Name(cmap_name.as_bytes()),
        pdf_writer::types::SystemInfo {
            registry: pdf_writer::Str(b"Adobe"),
            ordering: pdf_writer::Str(b"Identity"),
            supplement: 0,
        },
    );
    let mut mappings: Vec<(u16, char)> = char_to_gid.iter().map(|(&ch, &g)| (g, ch)).collect();
    mappings.sort_unstable();
    for (new_gid, ch) in mappings {
        cmap.pair(new_gid, ch);
    }
    let cmap_data = cmap.finish();
    pdf.stream(tounicode_ref, cmap_data.as_slice());

    pdf.type0_font(font_ref)
        .base_font(Name(ps_name.as_bytes()))
        .encoding_predefined(Name(b"Identity-H"))
        .descendant_font(cid_font_ref)
        .to_unicode(tounicode_ref);

    Some(TrueTypeMetrics {
        widths_1000,
        ascender_ratio: face.ascender() as f32 / units,
        char_to_gid,
        char_widths_1000,
    })
}

fn register_truetype(
    pdf: &mut Pdf,
    path: &Path,
    pdf_name: String,
    alloc: &mut impl FnMut() -> Ref,
    used_chars: &HashSet<char>,
) -> Result<FontEntry, Error> {
    let t0 = std::time::Instant::now();
    let file = std::fs::File::open(path)
        .map_err(|e| Error::ResourceLoad(format!("{}: {e}", path.display())))?;
    let data = unsafe { Mmap::map(&file) }
        .map_err(|e| Error::ResourceLoad(format!("{}: {e}", path.display())))?;

    let font_name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("EmbeddedFont");
    let font_ref = alloc();
    let metrics = embed_truetype(pdf, font_ref, font_name, &data, used_chars, alloc)
        .ok_or_else(|| {
            Error::ResourceLoad(format!("{}: not a usable TrueType font", path.display()))
        })?;

    log::debug!(
        "register_truetype: {} as {pdf_name} ({} glyphs) in {:.1}ms",
        path.display(),
        metrics.char_to_gid.len(),
        t0.elapsed().as_secs_f64() * 1000.0,
    );

    Ok(FontEntry {
        pdf_name,
        font_ref,
        widths_1000: metrics.widths_1000,
        ascender_ratio: metrics.ascender_ratio,
        char_to_gid: Some(metrics.char_to_gid),
        char_widths_1000: Some(metrics.char_widths_1000),
    })
}

fn register_builtin(
    pdf: &mut Pdf,
    base_font: &str,
    bold: bool,
    pdf_name: String,
    alloc: &mut impl FnMut() -> Ref,
) -> FontEntry {
    let font_ref = alloc();
    pdf.type1_font(font_ref)
        .base_font(Name(base_font.as_bytes()))
        .encoding_predefined(Name(b"WinAnsiEncoding"));
    FontEntry {
        pdf_name,
        font_ref,
        widths_1000: helvetica_widths(bold),
        ascender_ratio: HELVETICA_ASCENDER,
        char_to_gid: None,
        char_widths_1000: None,
    }
}

/// Write the font dictionaries for `source` and return the metrics used by layout.
/// `used_chars` bounds the glyph subset of embedded fonts.
pub(crate) fn register_fonts(
    pdf: &mut Pdf,
    source: &FontSource,
    alloc: &mut impl FnMut() -> Ref,
    used_chars: &HashSet<char>,
) -> Result<FontSet, Error> {
    match source {
        FontSource::Builtin => {
            let entries = vec![
                register_builtin(pdf, "Helvetica", false, "F1".into(), alloc),
                register_builtin(pdf, "Helvetica-Bold", true, "F2".into(), alloc),
                register_builtin(pdf, "Helvetica-BoldOblique", true, "F3".into(), alloc),
            ];
            Ok(FontSet {
                entries,
                regular: 0,
                bold: 1,
                bold_oblique: 2,
            })
        }
        FontSource::TrueType { regular, bold } => {
            let mut entries = vec![register_truetype(
                pdf,
                regular,
                "F1".into(),
                alloc,
                used_chars,
            )?];
            let bold_idx = match bold {
                Some(path) if path != regular => {
                    entries.push(register_truetype(pdf, path, "F2".into(), alloc, used_chars)?);
                    1
                }
                _ => {
                    log::warn!(
                        "No bold font configured for {}, headings use the regular face",
                        regular.display()
                    );
                    0
                }
            };
            Ok(FontSet {
                entries,
                regular: 0,
                bold: bold_idx,
                bold_oblique: bold_idx,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builtin_set() -> FontSet {
        let mut pdf = Pdf::new();
        let mut next = 1;
        let mut alloc = || {
            let r = Ref::new(next);
            next += 1;
            r
        };
        register_fonts(&mut pdf, &FontSource::Builtin, &mut alloc, &HashSet::new())
            .expect("builtin fonts register")
    }

    #[test]
    fn helvetica_widths_match_afm() {
        let fonts = builtin_set();
        let regular = fonts.get(FontFace::Regular);
        assert_eq!(regular.char_width_1000('A'), 667.0);
        assert_eq!(regular.char_width_1000('i'), 222.0);
        assert_eq!(regular.char_width_1000('á'), 556.0);
        let bold = fonts.get(FontFace::Bold);
        assert_eq!(bold.char_width_1000('b'), 611.0);
        assert_eq!(bold.char_width_1000(' '), 278.0);
    }

    #[test]
    fn winansi_encoding_keeps_latin1() {
        assert_eq!(to_winansi_bytes("Página"), b"P\xe1gina".to_vec());
        assert_eq!(to_winansi_bytes("€"), vec![0x80]);
        // Outside the code page
        assert_eq!(to_winansi_bytes("a\u{4e2d}b"), b"ab".to_vec());
    }

    #[test]
    fn bold_oblique_is_distinct_builtin_face() {
        let fonts = builtin_set();
        assert_eq!(fonts.get(FontFace::Regular).pdf_name, "F1");
        assert_eq!(fonts.get(FontFace::BoldOblique).pdf_name, "F3");
        assert_eq!(fonts.resource_pairs().len(), 3);
    }

    #[test]
    fn missing_truetype_file_is_resource_error() {
        let mut pdf = Pdf::new();
        let mut next = 1;
        let mut alloc = || {
            let r = Ref::new(next);
            next += 1;
            r
        };
        let source = FontSource::TrueType {
            regular: "/nonexistent/font.ttf".into(),
            bold: None,
        };
        let err = register_fonts(&mut pdf, &source, &mut alloc, &HashSet::new())
            .err()
            .expect("missing font must fail");
        assert!(matches!(err, Error::ResourceLoad(_)));
    }
}
