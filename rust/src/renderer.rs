use html_escape::{encode_double_quoted_attribute, encode_text};
use serde::Serialize;

use crate::proposal::ProposalPayload;

/// Static company block printed at the top right of every proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Letterhead {
    pub name: String,
    pub tel: String,
    pub fax: String,
    pub mail: String,
}

/// Everything the proposal template needs, already borrowed from the session.
#[derive(Debug, Clone, Copy)]
pub struct ProposalView<'a> {
    pub payload: &'a ProposalPayload,
    pub image_url: &'a str,
    pub letterhead: &'a Letterhead,
}

/// Class of the element whose `<img>` is swapped when the selection changes.
pub const HERO_CLASS: &str = "product-image";

pub fn render_proposal(view: &ProposalView<'_>) -> String {
    let payload = view.payload;
    let mut out = String::new();

    out.push_str(&render_letterhead(view.letterhead));
    out.push_str("<h1 class=\"proposal-title\" contenteditable=\"true\">商品提案書</h1>\n");

    out.push_str(&format!(
        "<div class=\"hero-section\"><div class=\"{}\"><img src=\"{}\" alt=\"{}\"></div></div>\n",
        HERO_CLASS,
        encode_double_quoted_attribute(view.image_url),
        encode_double_quoted_attribute(&payload.product_name)
    ));

    out.push_str(&format!(
        "<div class=\"catch-copy\" contenteditable=\"true\">{}</div>\n",
        encode_text(&payload.catch_copy)
    ));

    out.push_str("<div class=\"info-grid\">\n<div>\n");
    out.push_str(&format!(
        "<div class=\"section-title\">お客様への{}つのベネフィット</div>\n",
        payload.benefits.len()
    ));
    for benefit in &payload.benefits {
        out.push_str(&format!(
            "<div class=\"benefit-card\"><div class=\"benefit-title\" contenteditable=\"true\">{}</div><div class=\"benefit-detail\" contenteditable=\"true\">{}</div></div>\n",
            encode_text(&benefit.title),
            encode_text(&benefit.detail)
        ));
    }
    out.push_str("</div>\n");

    out.push_str("<div>\n<div class=\"section-title\">商品情報</div>\n<div class=\"specs-box\">\n");
    out.push_str(&format!(
        "<h3 class=\"specs-name\" contenteditable=\"true\">{}</h3>\n",
        encode_text(&payload.product_name)
    ));
    out.push_str("<ul class=\"specs-list\">");
    for spec in &payload.product_specs {
        out.push_str(&format!(
            "<li contenteditable=\"true\">{}</li>",
            encode_text(spec)
        ));
    }
    out.push_str("</ul>\n");
    out.push_str(&format!(
        "<div class=\"price-target-box\"><div><span contenteditable=\"true\">{}</span>　<span class=\"price-group\"><span class=\"price-label\">納品価格</span> <span class=\"price-val\" contenteditable=\"true\">{}</span><span class=\"tax-label\">(税別)</span></span></div><div class=\"target-val\" contenteditable=\"true\">ターゲット: {}</div></div>\n",
        encode_text(&payload.capacity),
        encode_text(&payload.price),
        encode_text(&payload.target)
    ));
    out.push_str("</div>\n</div>\n</div>\n");

    out.push_str(&format!(
        "<div class=\"comment-section\"><div class=\"comment-text\" contenteditable=\"true\">\"{}\"</div></div>\n",
        encode_text(&payload.comment)
    ));

    out
}

/// Candidate tiles. `data-index` is what the page posts back on click.
pub fn render_image_grid(candidates: &[String], selected: Option<usize>) -> String {
    candidates
        .iter()
        .enumerate()
        .map(|(index, url)| {
            let class = if selected == Some(index) {
                "image-item selected"
            } else {
                "image-item"
            };
            format!(
                "<div class=\"{}\" data-index=\"{}\"><img src=\"{}\" loading=\"lazy\" alt=\"\"></div>",
                class,
                index,
                encode_double_quoted_attribute(url)
            )
        })
        .collect::<Vec<String>>()
        .join("\n")
}

/// Standalone A4 document for printing or saving as PDF.
pub fn render_document(view: &ProposalView<'_>) -> String {
    let mut output = String::new();
    output.push_str("<!doctype html>\n<html lang=\"ja\">\n<head>\n");
    output.push_str("  <meta charset=\"utf-8\" />\n");
    output.push_str(
        "  <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\" />\n",
    );
    output.push_str("  <title>商品提案書: ");
    output.push_str(&encode_text(&view.payload.product_name));
    output.push_str("</title>\n  <style>\n");
    output.push_str(DOCUMENT_STYLE);
    output.push_str(PROPOSAL_STYLE);
    output.push_str("  </style>\n</head>\n<body>\n");
    output.push_str("  <div class=\"print-btn-container no-print\"><button class=\"print-btn\" onclick=\"window.print()\">印刷 / PDF保存</button></div>\n");
    output.push_str("  <div class=\"container proposal\">\n");
    output.push_str(&render_proposal(view));
    output.push_str("  </div>\n</body>\n</html>\n");
    output
}

/// File name offered when the document is downloaded.
pub fn document_file_name(product_name: &str) -> String {
    let stem: String = product_name
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '　' | '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if stem.is_empty() {
        "proposal.html".to_string()
    } else {
        format!("proposal_{stem}.html")
    }
}

fn render_letterhead(letterhead: &Letterhead) -> String {
    let mut lines = vec![format!(
        "<div class=\"company-name\">{}</div>",
        encode_text(&letterhead.name)
    )];
    for (label, value) in [
        ("TEL ", &letterhead.tel),
        ("FAX ", &letterhead.fax),
        ("Mail: ", &letterhead.mail),
    ] {
        if !value.trim().is_empty() {
            lines.push(format!("<div>{}{}</div>", label, encode_text(value)));
        }
    }
    format!("<div class=\"company-header\">{}</div>\n", lines.join(""))
}

const DOCUMENT_STYLE: &str = r#"
    @page { size: A4 portrait; margin: 0; }
    body {
      font-family: 'Noto Sans JP', sans-serif;
      color: #333;
      background-color: #f4f6f8;
      margin: 0;
      padding: 20px;
      display: flex;
      justify-content: center;
      -webkit-print-color-adjust: exact;
      min-width: 210mm;
    }
    .container {
      width: 210mm;
      height: 296mm;
      box-sizing: border-box;
      background: #fff;
      padding: 35mm 20mm 20mm 20mm;
      margin: 0 auto;
      box-shadow: 0 10px 30px rgba(0,0,0,0.08);
      overflow: hidden;
    }
    @media print {
      body { background-color: #fff; padding: 0; }
      .container { width: 100%; height: 100%; margin: 0; box-shadow: none; }
      .no-print { display: none !important; }
    }
    .print-btn-container { position: fixed; top: 20px; right: 20px; z-index: 1000; }
    .print-btn {
      background-color: #3498db;
      color: white;
      border: none;
      padding: 10px 20px;
      border-radius: 5px;
      font-weight: bold;
      cursor: pointer;
      font-size: 14px;
    }
    .print-btn:hover { background-color: #2980b9; }
"#;

/// Proposal template styles, shared by the page preview and the export.
pub const PROPOSAL_STYLE: &str = r#"
    .proposal {
      position: relative;
      display: flex;
      flex-direction: column;
      line-height: 1.4;
      color: #333;
    }
    .proposal h1 {
      color: #2c3e50;
      font-size: 24px;
      border-bottom: 2px solid #eee;
      padding-bottom: 10px;
      margin: 0 0 15px;
      text-align: center;
      letter-spacing: 0.05em;
    }
    .hero-section { display: flex; flex-direction: column; align-items: center; margin-bottom: 10px; }
    .product-image img {
      max-width: 100%;
      height: 225px;
      object-fit: contain;
      border-radius: 8px;
      box-shadow: 0 4px 12px rgba(0,0,0,0.1);
    }
    .catch-copy {
      font-size: 20px;
      font-weight: bold;
      color: #c0392b;
      text-align: center;
      margin: 25px 0 35px;
      padding: 0 5px;
    }
    .info-grid { display: grid; grid-template-columns: 1fr 1fr; gap: 25px; margin-bottom: 25px; }
    .section-title {
      font-size: 15px;
      color: #34495e;
      border-left: 4px solid #3498db;
      padding-left: 10px;
      margin-bottom: 10px;
      font-weight: bold;
    }
    .benefit-card {
      background: #f8fbff;
      border-radius: 6px;
      padding: 12px;
      margin-bottom: 12px;
      border: 1px solid #e1e8ed;
      page-break-inside: avoid;
    }
    .benefit-title { color: #2980b9; font-weight: bold; font-size: 13px; margin-bottom: 4px; }
    .benefit-title::before { content: '✓'; margin-right: 6px; }
    .benefit-detail { font-size: 11px; color: #555; }
    .specs-box { background: #fafafa; padding: 15px; border-radius: 8px; border: 1px solid #eee; }
    .specs-name { margin-top: 0; font-size: 16px; }
    .specs-list { list-style: none; padding: 0; margin: 0; }
    .specs-list li { margin-bottom: 6px; padding-bottom: 6px; border-bottom: 1px dashed #ddd; font-size: 11px; }
    .specs-list li:last-child { border-bottom: none; }
    .price-target-box {
      background: #2c3e50;
      color: white;
      padding: 12px;
      border-radius: 6px;
      margin-top: 15px;
      text-align: center;
    }
    .price-group { color: #f1c40f; font-weight: bold; }
    .price-label { font-size: 13px; }
    .price-val { font-size: 20px; margin: 0 2px; }
    .tax-label { font-size: 11px; }
    .target-val { font-size: 11px; opacity: 0.9; margin-top: 4px; }
    .comment-section {
      background: #fffbe6;
      padding: 20px;
      border-radius: 8px;
      position: relative;
      border: 1px solid #fae588;
      page-break-inside: avoid;
      margin-top: auto;
    }
    .comment-section::before {
      content: 'RECOMMEND';
      position: absolute;
      top: -10px;
      left: 20px;
      background: #f1c40f;
      color: #fff;
      padding: 3px 10px;
      font-size: 11px;
      font-weight: bold;
      border-radius: 4px;
    }
    .comment-text { font-style: italic; color: #5d5d5d; line-height: 1.6; font-size: 13px; }
    .company-header {
      position: absolute;
      top: 0;
      right: 0;
      text-align: right;
      font-size: 9px;
      color: #555;
      line-height: 1.2;
    }
    .company-name { font-size: 11px; font-weight: bold; color: #333; margin-bottom: 2px; }
"#;

#[cfg(test)]
mod tests {
    use super::{
        document_file_name, render_document, render_image_grid, render_proposal, Letterhead,
        ProposalView,
    };
    use crate::proposal::{Benefit, ProposalPayload};

    fn letterhead() -> Letterhead {
        Letterhead {
            name: "株式会社テスト".to_string(),
            tel: "000-000-0000".to_string(),
            fax: String::new(),
            mail: "info@example.com".to_string(),
        }
    }

    fn payload() -> ProposalPayload {
        ProposalPayload {
            product_name: "緑茶".to_string(),
            catch_copy: "香りが違う".to_string(),
            benefits: vec![
                Benefit {
                    title: "一番目".to_string(),
                    detail: "詳細A".to_string(),
                },
                Benefit {
                    title: "二番目".to_string(),
                    detail: "詳細B".to_string(),
                },
            ],
            product_specs: vec!["500ml".to_string(), "国産".to_string()],
            price: "1,200円".to_string(),
            capacity: "24本".to_string(),
            target: "30代".to_string(),
            comment: "おすすめです".to_string(),
        }
    }

    #[test]
    fn proposal_contains_every_field_in_order() {
        let payload = payload();
        let letterhead = letterhead();
        let html = render_proposal(&ProposalView {
            payload: &payload,
            image_url: "https://img.example/a.png",
            letterhead: &letterhead,
        });

        for needle in [
            "緑茶",
            "香りが違う",
            "1,200円",
            "24本",
            "ターゲット: 30代",
            "\"おすすめです\"",
            "株式会社テスト",
            "TEL 000-000-0000",
            "お客様への2つのベネフィット",
        ] {
            assert!(html.contains(needle), "missing {needle}");
        }
        assert!(!html.contains("FAX"));
        assert!(html.contains("<img src=\"https://img.example/a.png\" alt=\"緑茶\">"));

        let order: Vec<usize> = ["一番目", "詳細A", "二番目", "詳細B", "500ml", "国産"]
            .iter()
            .map(|needle| html.find(needle).expect("present"))
            .collect();
        assert!(order.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(html.matches("class=\"benefit-card\"").count(), 2);
    }

    #[test]
    fn payload_text_is_escaped() {
        let mut payload = payload();
        payload.catch_copy = "<script>alert(1)</script>".to_string();
        payload.product_name = "\"quoted\"".to_string();
        let letterhead = letterhead();
        let html = render_proposal(&ProposalView {
            payload: &payload,
            image_url: "x.png\" onerror=\"alert(1)",
            letterhead: &letterhead,
        });

        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("onerror=\"alert"));
        assert!(!html.contains("alt=\"\"quoted\"\""));
    }

    #[test]
    fn grid_marks_only_selected_tile() {
        let urls = vec!["a.png".to_string(), "b.png".to_string(), "c.png".to_string()];
        let none = render_image_grid(&urls, None);
        assert_eq!(none.matches("class=\"image-item\"").count(), 3);
        assert!(!none.contains("selected"));

        let one = render_image_grid(&urls, Some(1));
        assert_eq!(one.matches("image-item selected").count(), 1);
        assert!(one.contains("<div class=\"image-item selected\" data-index=\"1\">"));
        assert!(render_image_grid(&[], None).is_empty());
    }

    #[test]
    fn document_wraps_fragment() {
        let payload = payload();
        let letterhead = letterhead();
        let doc = render_document(&ProposalView {
            payload: &payload,
            image_url: "a.png",
            letterhead: &letterhead,
        });
        assert!(doc.starts_with("<!doctype html>"));
        assert!(doc.contains("<title>商品提案書: 緑茶</title>"));
        assert!(doc.contains("window.print()"));
        assert!(doc.contains("class=\"catch-copy\""));
    }

    #[test]
    fn file_name_replaces_separators() {
        assert_eq!(document_file_name("伊右衛門 特茶"), "proposal_伊右衛門_特茶.html");
        assert_eq!(document_file_name("a/b"), "proposal_a_b.html");
        assert_eq!(document_file_name("  "), "proposal.html");
    }
}
