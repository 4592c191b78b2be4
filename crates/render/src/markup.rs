//! Self-contained HTML documents for each visual mode. Nothing is fetched over the network.

use model::render::{Mode, RenderRequest, Row};
use std::fmt::Write;

const STYLE: &str = "\
*{box-sizing:border-box;margin:0;padding:0}\
body{background:transparent;font-family:'Noto Sans','DejaVu Sans',sans-serif;color:#f2f3f5}\
#root{display:inline-block;width:640px;padding:24px;border-radius:12px;background:#2b2d31}\
h1{font-size:24px;margin-bottom:6px;overflow-wrap:anywhere}\
.desc{font-size:15px;color:#b5bac1;margin-bottom:14px;overflow-wrap:anywhere}\
.row{position:relative;margin:8px 0;padding:10px 12px;border-radius:8px;background:#1e1f22;overflow:hidden}\
.bar{position:absolute;left:0;top:0;bottom:0;background:#5865f2;opacity:.35}\
.row.winner{outline:2px solid #f0b232}\
.row.winner .bar{background:#f0b232}\
.line{position:relative;display:flex;justify-content:space-between;gap:12px;font-size:16px}\
.label{overflow-wrap:anywhere}\
.stat{white-space:nowrap;color:#dbdee1}\
.crown{margin-right:6px}\
.foot{margin-top:14px;font-size:13px;color:#949ba4;display:flex;justify-content:space-between}\
.grid{display:grid;grid-template-columns:1fr 1fr;gap:10px;margin-top:12px}\
.panel{position:relative;padding:12px;border-radius:8px;background:#1e1f22;overflow:hidden}\
.panel.winner{outline:2px solid #f0b232}\
.panel .big{font-size:28px;font-weight:700}\
.panel .small{font-size:13px;color:#949ba4}\
.summary{grid-column:1/-1}";

/// Escapes text for use in element content and quoted attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn status(req: &RenderRequest) -> &'static str {
    if req.closed {
        "Closed"
    } else {
        "Open"
    }
}

fn stat(row: &Row) -> String {
    match (row.count, row.percent) {
        (Some(count), Some(percent)) => format!("{count} ({percent}%)"),
        _ => String::new(),
    }
}

fn header(out: &mut String, req: &RenderRequest) {
    let _ = write!(out, "<h1>{}</h1>", escape(&req.title));
    if let Some(desc) = req.description.as_deref().filter(|desc| !desc.is_empty()) {
        let _ = write!(out, r#"<p class="desc">{}</p>"#, escape(desc));
    }
}

fn card(out: &mut String, req: &RenderRequest) {
    header(out, req);
    for row in req.rows() {
        let class = if row.winner { "row winner" } else { "row" };
        let _ = write!(out, r#"<div class="{class}">"#);
        if let Some(percent) = row.percent {
            let _ = write!(out, r#"<div class="bar" style="width:{percent}%"></div>"#);
        }
        let crown = if row.winner { r#"<span class="crown">&#128081;</span>"# } else { "" };
        let _ = write!(
            out,
            r#"<div class="line"><span class="label">{crown}{}. {}</span><span class="stat">{}</span></div></div>"#,
            row.index + 1,
            escape(row.label),
            stat(&row),
        );
    }

    let total = if req.counts.is_some() { format!("{} votes", req.total) } else { String::from("Results hidden") };
    let _ = write!(
        out,
        r#"<div class="foot"><span>{} &#183; {total}</span><span>by {}</span></div>"#,
        status(req),
        escape(&req.creator),
    );
}

fn detailed(out: &mut String, req: &RenderRequest) {
    header(out, req);
    out.push_str(r#"<div class="grid">"#);
    let _ = write!(
        out,
        r#"<div class="panel summary"><div class="big">{}</div><div class="small">total weight &#183; {} &#183; by {}</div></div>"#,
        req.total,
        status(req),
        escape(&req.creator),
    );

    for row in req.rows() {
        let class = if row.winner { "panel winner" } else { "panel" };
        let _ = write!(out, r#"<div class="{class}">"#);
        if let Some(percent) = row.percent {
            let _ = write!(out, r#"<div class="bar" style="width:{percent}%"></div>"#);
        }
        let _ = write!(
            out,
            r#"<div class="line"><span class="label">{}. {}</span></div><div class="line"><span class="big">{}</span><span class="small">{}</span></div></div>"#,
            row.index + 1,
            escape(row.label),
            row.count.map(|count| count.to_string()).unwrap_or_else(|| String::from("?")),
            row.percent.map(|percent| format!("{percent}%")).unwrap_or_default(),
        );
    }
    out.push_str("</div>");
}

/// Builds the full document for a render request. The captured element has the id `root`.
pub fn document(req: &RenderRequest) -> String {
    let mut out = String::with_capacity(4096);
    let _ = write!(
        out,
        r#"<!DOCTYPE html><html lang="{}"><head><meta charset="utf-8"><style>{STYLE}</style></head><body><div id="root">"#,
        escape(&req.locale),
    );
    match req.mode {
        Mode::Card => card(&mut out, req),
        Mode::Detailed => detailed(&mut out, req),
    }
    out.push_str("</div></body></html>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(counts: Option<Vec<u64>>, closed: bool, mode: Mode) -> RenderRequest {
        let total = counts.as_ref().map_or(0, |counts| counts.iter().sum());
        RenderRequest {
            title: "Lunch <today>".to_string(),
            description: Some("Pick one & go".to_string()),
            options: vec!["Tea".to_string(), "Coffee".to_string()],
            counts,
            total,
            creator: "Alice".to_string(),
            closed,
            mode,
            locale: "en-US".to_string(),
        }
    }

    #[test]
    fn escapes_user_text() {
        assert_eq!(escape(r#"<b>"x" & 'y'</b>"#), "&lt;b&gt;&quot;x&quot; &amp; &#39;y&#39;&lt;/b&gt;");
        let html = document(&request(None, false, Mode::Card));
        assert!(html.contains("Lunch &lt;today&gt;"));
        assert!(html.contains("Pick one &amp; go"));
        assert!(!html.contains("<today>"));
    }

    #[test]
    fn open_card_keeps_order_without_winners() {
        let html = document(&request(Some(vec![3, 5]), false, Mode::Card));
        assert!(html.contains(r#"id="root""#));
        let tea = html.find("1. Tea").unwrap();
        let coffee = html.find("2. Coffee").unwrap();
        assert!(tea < coffee);
        assert!(!html.contains("row winner"));
        assert!(html.contains("Open"));
    }

    #[test]
    fn closed_card_highlights_winner_first() {
        let html = document(&request(Some(vec![3, 5]), true, Mode::Card));
        let coffee = html.find("2. Coffee").unwrap();
        let tea = html.find("1. Tea").unwrap();
        assert!(coffee < tea);
        assert_eq!(html.matches("row winner").count(), 1);
        assert!(html.contains("5 (62%)"));
        assert!(html.contains("Closed"));
    }

    #[test]
    fn hidden_results_show_no_counts() {
        let html = document(&request(None, false, Mode::Card));
        assert!(html.contains("Results hidden"));
        assert!(!html.contains("class=\"bar\""));
    }

    #[test]
    fn detailed_has_one_panel_per_option() {
        let html = document(&request(Some(vec![4, 4]), true, Mode::Detailed));
        assert!(html.contains("panel summary"));
        assert_eq!(html.matches("panel winner").count(), 2);
        assert!(html.contains("total weight"));
    }
}
