#![allow(dead_code)]

use report_pdf::{Align, ReportRequest};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Four body rows, a totals footer and one filter line.
pub fn sample_request() -> ReportRequest {
    ReportRequest::new("Acme", "Sales Report")
        .column(40.0, Align::Left)
        .column(30.0, Align::Center)
        .column(30.0, Align::Right)
        .header(["Item", "Qty", "Amount"])
        .row(["Widget", "2", "10.00"])
        .row(["Gadget", "1", "25.50"])
        .row(["Doohickey", "5", "7.25"])
        .row(["Thingamajig", "3", "12.00"])
        .footer(["Total", "11", "54.75"])
        .header_line("Period: Q1 2024")
}

/// A report long enough to need several pages.
pub fn long_request(rows: usize) -> ReportRequest {
    let mut req = ReportRequest::new("Acme", "Inventory")
        .column(60.0, Align::Left)
        .column(40.0, Align::Right)
        .header(["Item", "Amount"]);
    for i in 0..rows {
        req = req.row([format!("Widget {i}"), format!("{}.00", i * 3)]);
    }
    req
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

pub fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    find(haystack, needle, 0).is_some()
}

/// Decoded content streams of every page, in page order. Image and font streams are
/// skipped.
pub fn content_streams(pdf: &[u8]) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    let mut pos = 0;
    while let Some(at) = find(pdf, b"stream", pos) {
        pos = at + b"stream".len();
        // Skip "endstream" and anything not directly following a dictionary.
        let before = pdf[..at].trim_ascii_end();
        if !before.ends_with(b">>") {
            continue;
        }
        let dict_start = pdf[..at]
            .windows(3)
            .rposition(|w| w == b"obj")
            .unwrap_or(0);
        let dict = &pdf[dict_start..at];
        let len_at = find(dict, b"/Length ", 0).expect("stream has a length") + b"/Length ".len();
        let len = leading_number(&dict[len_at..]);

        let mut start = pos;
        if pdf[start] == b'\r' {
            start += 1;
        }
        if pdf[start] == b'\n' {
            start += 1;
        }
        pos = start + len;
        if contains(dict, b"/Subtype") || contains(dict, b"/Length1") {
            continue;
        }
        let data = &pdf[start..start + len];
        let decoded = if contains(dict, b"/FlateDecode") {
            miniz_oxide::inflate::decompress_to_vec_zlib(data).expect("inflate content stream")
        } else {
            data.to_vec()
        };
        out.push(decoded);
    }
    out
}

/// Every string operand in a content stream, decoded as single-byte text.
pub fn strings_in(content: &[u8]) -> Vec<String> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < content.len() {
        match content[i] {
            b'(' => {
                let mut depth = 1;
                let mut bytes = Vec::new();
                i += 1;
                while i < content.len() {
                    match content[i] {
                        b'\\' => {
                            i += 1;
                            let esc = content[i];
                            if (b'0'..=b'7').contains(&esc) {
                                let digits: Vec<u8> = content[i..]
                                    .iter()
                                    .take(3)
                                    .take_while(|b| (b'0'..=b'7').contains(b))
                                    .copied()
                                    .collect();
                                let value = digits.iter().fold(0u32, |acc, d| acc * 8 + (d - b'0') as u32);
                                bytes.push(value as u8);
                                i += digits.len() - 1;
                            } else {
                                bytes.push(match esc {
                                    b'n' => b'\n',
                                    b'r' => b'\r',
                                    b't' => b'\t',
                                    other => other,
                                });
                            }
                        }
                        b'(' => {
                            depth += 1;
                            bytes.push(b'(');
                        }
                        b')' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                            bytes.push(b')');
                        }
                        other => bytes.push(other),
                    }
                    i += 1;
                }
                out.push(bytes.iter().map(|&b| b as char).collect());
            }
            b'<' if content.get(i + 1) != Some(&b'<') => {
                let end = find(content, b">", i).expect("unterminated hex string");
                let hex: Vec<u8> = content[i + 1..end]
                    .iter()
                    .copied()
                    .filter(|b| b.is_ascii_hexdigit())
                    .collect();
                let text = hex
                    .chunks(2)
                    .map(|pair| {
                        let s = std::str::from_utf8(pair).expect("hex digits");
                        u8::from_str_radix(s, 16).expect("hex byte") as char
                    })
                    .collect();
                out.push(text);
                i = end;
            }
            _ => {}
        }
        i += 1;
    }
    out
}

/// Shown strings per page.
pub fn page_texts(pdf: &[u8]) -> Vec<Vec<String>> {
    content_streams(pdf).iter().map(|c| strings_in(c)).collect()
}

/// Width and height of every `/MediaBox`, in document order.
pub fn media_boxes(pdf: &[u8]) -> Vec<(f32, f32)> {
    let mut out = Vec::new();
    let mut pos = 0;
    while let Some(at) = find(pdf, b"/MediaBox", pos) {
        let open = find(pdf, b"[", at).expect("media box array");
        let close = find(pdf, b"]", open).expect("media box array end");
        let nums: Vec<f32> = std::str::from_utf8(&pdf[open + 1..close])
            .expect("ascii")
            .split_whitespace()
            .filter_map(|s| s.parse().ok())
            .collect();
        assert_eq!(nums.len(), 4, "malformed media box");
        out.push((nums[2] - nums[0], nums[3] - nums[1]));
        pos = close;
    }
    out
}

fn leading_number(bytes: &[u8]) -> usize {
    bytes
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .fold(0, |acc, &b| acc * 10 + (b - b'0') as usize)
}

/// Value of `/Count` in the page tree.
pub fn page_count(pdf: &[u8]) -> usize {
    let at = find(pdf, b"/Count ", 0).expect("page tree count") + b"/Count ".len();
    leading_number(&pdf[at..])
}

/// Operands of the last `Td` in a content stream: where the last text run on the page
/// starts.
pub fn last_text_origin(content: &[u8]) -> (f32, f32) {
    let at = content
        .windows(4)
        .rposition(|w| w == b" Td\n")
        .expect("content has a Td operator");
    let line_start = content[..at]
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |p| p + 1);
    let operands: Vec<f32> = std::str::from_utf8(&content[line_start..at])
        .expect("ascii operands")
        .split_whitespace()
        .map(|s| s.parse().expect("numeric operand"))
        .collect();
    assert_eq!(operands.len(), 2, "Td takes two operands");
    (operands[0], operands[1])
}
