//! Drawing surfaces handed to the layout engine.
//!
//! The engine draws into [`PageCanvas::content`] and calls [`PageCanvas::show_page`] at every
//! page boundary, including after the last page, then [`PageCanvas::save`]. A
//! [`DirectCanvas`] commits each page to the document as soon as it ends. A
//! [`PaginatingCanvas`] wraps another canvas and holds every ended page back until `save`,
//! when the total is known, then replays them in order with a "page X of Y" label.

use std::collections::HashSet;

use pdf_writer::{Content, Filter, Name, Pdf, Rect, Ref, Str, TextStr};

use crate::error::Error;
use crate::fonts::{FontEntry, FontSet, register_fonts};
use crate::images::write_image_xobject;
use crate::model::EmbeddedImage;
use crate::style::{FontSource, PageStamp};

pub(crate) trait PageCanvas {
    /// Drawing operations of the page currently being built.
    fn content(&mut self) -> &mut Content;

    /// End the current page and start a fresh one.
    fn show_page(&mut self) -> Result<(), Error>;

    /// Pages ended so far.
    fn page_count(&self) -> usize;

    /// Finish the document. A page with drawing that was never ended is ended first.
    fn save(self: Box<Self>) -> Result<Vec<u8>, Error>;
}

/// Owns the PDF being written: object ids, shared resources and committed pages.
pub(crate) struct DocumentWriter {
    pdf: Pdf,
    next_id: i32,
    catalog_id: Ref,
    pages_id: Ref,
    page_size: (f32, f32),
    title: String,
    font_resources: Vec<(String, Ref)>,
    image_resources: Vec<(String, Ref)>,
    page_ids: Vec<Ref>,
}

impl DocumentWriter {
    pub(crate) fn new(page_size: (f32, f32), title: &str) -> Self {
        Self {
            pdf: Pdf::new(),
            next_id: 3,
            catalog_id: Ref::new(1),
            pages_id: Ref::new(2),
            page_size,
            title: title.to_string(),
            font_resources: Vec::new(),
            image_resources: Vec::new(),
            page_ids: Vec::new(),
        }
    }

    fn alloc(&mut self) -> Ref {
        let r = Ref::new(self.next_id);
        self.next_id += 1;
        r
    }

    /// Register the document fonts. Must happen before the first page is committed.
    pub(crate) fn register_fonts(
        &mut self,
        source: &FontSource,
        used_chars: &HashSet<char>,
    ) -> Result<FontSet, Error> {
        let next_id = &mut self.next_id;
        let mut alloc = || {
            let r = Ref::new(*next_id);
            *next_id += 1;
            r
        };
        let fonts = register_fonts(&mut self.pdf, source, &mut alloc, used_chars)?;
        self.font_resources = fonts.resource_pairs();
        Ok(fonts)
    }

    /// Embed an image and return the resource name to draw it with.
    pub(crate) fn embed_image(&mut self, img: &EmbeddedImage) -> String {
        let next_id = &mut self.next_id;
        let mut alloc = || {
            let r = Ref::new(*next_id);
            *next_id += 1;
            r
        };
        let xobj_ref = write_image_xobject(&mut self.pdf, &mut alloc, img);
        let name = format!("Im{}", self.image_resources.len() + 1);
        self.image_resources.push((name.clone(), xobj_ref));
        name
    }

    /// Write one finished page: its compressed content stream and page dictionary.
    pub(crate) fn commit_page(&mut self, content: Content) {
        let page_id = self.alloc();
        let content_id = self.alloc();

        let raw = content.finish();
        let compressed = miniz_oxide::deflate::compress_to_vec_zlib(raw.as_slice(), 6);
        self.pdf
            .stream(content_id, &compressed)
            .filter(Filter::FlateDecode);

        let (w, h) = self.page_size;
        let mut page = self.pdf.page(page_id);
        page.media_box(Rect::new(0.0, 0.0, w, h))
            .parent(self.pages_id)
            .contents(content_id);
        {
            let mut resources = page.resources();
            {
                let mut fonts = resources.fonts();
                for (name, font_ref) in &self.font_resources {
                    fonts.pair(Name(name.as_bytes()), *font_ref);
                }
            }
            if !self.image_resources.is_empty() {
                let mut xobjects = resources.x_objects();
                for (name, xobj_ref) in &self.image_resources {
                    xobjects.pair(Name(name.as_bytes()), *xobj_ref);
                }
            }
        }
        drop(page);

        self.page_ids.push(page_id);
    }

    pub(crate) fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Write the page tree, catalog and info dictionary and return the document bytes.
    pub(crate) fn finish(mut self) -> Vec<u8> {
        if self.page_ids.is_empty() {
            // A PDF needs at least one page.
            self.commit_page(Content::new());
        }
        let info_id = self.alloc();
        let n = self.page_ids.len();

        self.pdf.catalog(self.catalog_id).pages(self.pages_id);
        self.pdf
            .pages(self.pages_id)
            .kids(self.page_ids.iter().copied())
            .count(n as i32);
        self.pdf
            .document_info(info_id)
            .title(TextStr(&self.title))
            .producer(TextStr(concat!("report-pdf ", env!("CARGO_PKG_VERSION"))));

        self.pdf.finish()
    }
}

/// Commits every page the moment it ends.
pub(crate) struct DirectCanvas {
    writer: DocumentWriter,
    current: Content,
    page_open: bool,
}

impl DirectCanvas {
    pub(crate) fn new(writer: DocumentWriter) -> Self {
        Self {
            writer,
            current: Content::new(),
            page_open: false,
        }
    }
}

impl PageCanvas for DirectCanvas {
    fn content(&mut self) -> &mut Content {
        self.page_open = true;
        &mut self.current
    }

    fn show_page(&mut self) -> Result<(), Error> {
        let content = std::mem::replace(&mut self.current, Content::new());
        self.writer.commit_page(content);
        self.page_open = false;
        Ok(())
    }

    fn page_count(&self) -> usize {
        self.writer.page_count()
    }

    fn save(mut self: Box<Self>) -> Result<Vec<u8>, Error> {
        if self.page_open {
            self.show_page()?;
        }
        Ok(self.writer.finish())
    }
}

/// Terminal drawing state of an ended page, held until the page count is known.
pub(crate) struct RenderedPage {
    content: Content,
}

/// Buffers every page and stamps "page X of Y" on replay.
pub(crate) struct PaginatingCanvas<C: PageCanvas> {
    inner: C,
    current: Content,
    page_open: bool,
    saved_pages: Vec<RenderedPage>,
    stamp: PageStamp,
    stamp_at: (f32, f32),
    font: FontEntry,
}

impl<C: PageCanvas> PaginatingCanvas<C> {
    fn new(inner: C, stamp: PageStamp, font: FontEntry, landscape: bool) -> Self {
        let stamp_at = stamp.position(landscape);
        Self {
            inner,
            current: Content::new(),
            page_open: false,
            saved_pages: Vec::new(),
            stamp,
            stamp_at,
            font,
        }
    }

    pub(crate) fn portrait(inner: C, stamp: PageStamp, font: FontEntry) -> Self {
        Self::new(inner, stamp, font, false)
    }

    pub(crate) fn landscape(inner: C, stamp: PageStamp, font: FontEntry) -> Self {
        Self::new(inner, stamp, font, true)
    }

    /// Right-aligned label ending at the stamp position.
    fn draw_page_number(&mut self, page: usize, total: usize) {
        let label = self.stamp.label(page, total);
        let size = self.stamp.font_size;
        let width = self.font.text_width(&label, size);
        let bytes = self.font.encode(&label);
        let (right, baseline) = self.stamp_at;

        let content = self.inner.content();
        content.save_state();
        content.set_fill_gray(0.0);
        content.begin_text();
        content.set_font(Name(self.font.pdf_name.as_bytes()), size);
        content.next_line(right - width, baseline);
        content.show(Str(&bytes));
        content.end_text();
        content.restore_state();
    }
}

impl<C: PageCanvas> PageCanvas for PaginatingCanvas<C> {
    fn content(&mut self) -> &mut Content {
        self.page_open = true;
        &mut self.current
    }

    fn show_page(&mut self) -> Result<(), Error> {
        let content = std::mem::replace(&mut self.current, Content::new());
        self.saved_pages.push(RenderedPage { content });
        self.page_open = false;
        Ok(())
    }

    fn page_count(&self) -> usize {
        self.saved_pages.len()
    }

    fn save(mut self: Box<Self>) -> Result<Vec<u8>, Error> {
        if self.page_open {
            self.show_page()?;
        }
        let total = self.saved_pages.len();
        log::debug!("replaying {total} buffered pages with page numbers");

        let pages = std::mem::take(&mut self.saved_pages);
        for (i, page) in pages.into_iter().enumerate() {
            *self.inner.content() = page.content;
            self.draw_page_number(i + 1, total);
            self.inner.show_page()?;
        }
        let this = *self;
        Box::new(this.inner).save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Keeps each committed page's raw (uncompressed) operators.
    struct RecordingCanvas {
        current: Content,
        committed: std::rc::Rc<std::cell::RefCell<Vec<Vec<u8>>>>,
    }

    impl PageCanvas for RecordingCanvas {
        fn content(&mut self) -> &mut Content {
            &mut self.current
        }

        fn show_page(&mut self) -> Result<(), Error> {
            let content = std::mem::replace(&mut self.current, Content::new());
            self.committed
                .borrow_mut()
                .push(content.finish().as_slice().to_vec());
            Ok(())
        }

        fn page_count(&self) -> usize {
            self.committed.borrow().len()
        }

        fn save(self: Box<Self>) -> Result<Vec<u8>, Error> {
            Ok(Vec::new())
        }
    }

    fn helvetica() -> FontEntry {
        let mut writer = DocumentWriter::new((595.0, 842.0), "t");
        let fonts = writer
            .register_fonts(&FontSource::Builtin, &HashSet::new())
            .expect("builtin fonts");
        fonts.get(crate::style::FontFace::Regular).clone()
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    fn recording() -> (
        RecordingCanvas,
        std::rc::Rc<std::cell::RefCell<Vec<Vec<u8>>>>,
    ) {
        let committed = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        (
            RecordingCanvas {
                current: Content::new(),
                committed: committed.clone(),
            },
            committed,
        )
    }

    #[test]
    fn nothing_is_committed_before_save() {
        let (inner, committed) = recording();
        let stamp = PageStamp {
            template: "Page {page} of {total}".into(),
            ..PageStamp::default()
        };
        let mut canvas = Box::new(PaginatingCanvas::portrait(inner, stamp, helvetica()));
        for _ in 0..3 {
            canvas.content().rect(10.0, 10.0, 5.0, 5.0);
            canvas.show_page().expect("show_page");
        }
        assert_eq!(canvas.page_count(), 3);
        assert!(committed.borrow().is_empty());

        canvas.save().expect("save");
        let pages = committed.borrow();
        assert_eq!(pages.len(), 3);
        for (i, page) in pages.iter().enumerate() {
            let label = format!("(Page {} of 3)", i + 1);
            assert!(contains(page, label.as_bytes()), "page {i} lacks {label}");
            // Original drawing survives the replay
            assert!(contains(page, b"re"));
        }
    }

    #[test]
    fn unfinished_page_is_flushed_on_save() {
        let (inner, committed) = recording();
        let stamp = PageStamp {
            template: "{page}/{total}".into(),
            ..PageStamp::default()
        };
        let mut canvas = Box::new(PaginatingCanvas::landscape(inner, stamp, helvetica()));
        canvas.show_page().expect("show_page");
        canvas.content().rect(0.0, 0.0, 1.0, 1.0);
        canvas.save().expect("save");
        let pages = committed.borrow();
        assert_eq!(pages.len(), 2);
        assert!(contains(&pages[1], b"(2/2)"));
    }

    #[test]
    fn stamp_is_right_aligned_at_position() {
        let (inner, committed) = recording();
        let stamp = PageStamp {
            template: "X".into(),
            font_size: 1000.0,
            portrait: (1000.0, 20.0),
            landscape: (3000.0, 20.0),
        };
        let mut canvas = Box::new(PaginatingCanvas::portrait(inner, stamp, helvetica()));
        canvas.show_page().expect("show_page");
        canvas.save().expect("save");
        // "X" is 667/1000 em wide in Helvetica
        let page = &committed.borrow()[0];
        assert!(contains(page, b"333 20 Td"));
    }

    #[test]
    fn direct_canvas_writes_one_page_per_boundary() {
        let writer = DocumentWriter::new((595.0, 842.0), "DIRECT");
        let mut canvas: Box<dyn PageCanvas> = Box::new(DirectCanvas::new(writer));
        canvas.content().rect(1.0, 1.0, 1.0, 1.0);
        canvas.show_page().expect("show_page");
        canvas.content().rect(1.0, 1.0, 1.0, 1.0);
        canvas.show_page().expect("show_page");
        assert_eq!(canvas.page_count(), 2);
        let bytes = canvas.save().expect("save");
        assert!(bytes.starts_with(b"%PDF-"));
        assert!(contains(&bytes, b"/Count 2"));
    }
}
