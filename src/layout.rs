// Page layout of the production report.
//
// Layout is computed as plain drawing operations per page, in millimetres
// from the top-left corner of an A4 sheet. `output::render_pdf` turns them
// into a PDF; keeping the two apart lets the pagination be checked without
// parsing PDF bytes.
use crate::types::{GroupKind, ProductionRecord, Statistics};
use crate::util::{display_date, format_clock, format_day, month_name, non_empty};
use chrono::{DateTime, Local};
use linked_hash_map::LinkedHashMap;

pub const PAGE_WIDTH: f32 = 210.0;
pub const PAGE_HEIGHT: f32 = 297.0;
/// No table row starts below this line.
pub const BOTTOM_LIMIT: f32 = 270.0;
/// Rows listed in the detail section.
pub const DETAIL_LIMIT: usize = 20;
pub const FOOTER_LABEL: &str = "Sistema de Monitoreo Energético";

const GROUPED_TOP: f32 = 20.0;
const DETAIL_TOP: f32 = 30.0;
// Title gap + rule gap + header gap of a grouped section.
const SECTION_HEAD: f32 = 10.0 + 6.0 + 6.0 + 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

pub const PRIMARY: Rgb = Rgb(33, 150, 243);
pub const SECONDARY: Rgb = Rgb(55, 71, 79);
pub const ZEBRA: Rgb = Rgb(245, 247, 250);
pub const DETAIL_ZEBRA: Rgb = Rgb(248, 250, 252);
pub const WHITE: Rgb = Rgb(255, 255, 255);
pub const BLACK: Rgb = Rgb(0, 0, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    FillRect { x: f32, y: f32, w: f32, h: f32, color: Rgb },
    StrokeRect { x: f32, y: f32, w: f32, h: f32, color: Rgb, width: f32 },
    Line { x1: f32, y1: f32, x2: f32, y2: f32, color: Rgb, width: f32 },
    Text { text: String, x: f32, y: f32, size: f32, font: Font, color: Rgb, align: Align },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub ops: Vec<DrawOp>,
}

#[cfg(test)]
impl Page {
    pub fn texts(&self) -> impl Iterator<Item = &str> + '_ {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn contains_text(&self, needle: &str) -> bool {
        self.texts().any(|t| t == needle)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportDocument {
    pub pages: Vec<Page>,
}

impl ReportDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

// Pages under construction plus the running cursor.
struct Canvas {
    pages: Vec<Page>,
    y: f32,
}

impl Canvas {
    fn new() -> Self {
        Canvas { pages: vec![Page::default()], y: 0.0 }
    }

    fn add_page(&mut self, top: f32) {
        self.pages.push(Page::default());
        self.y = top;
    }

    fn push(&mut self, op: DrawOp) {
        if let Some(page) = self.pages.last_mut() {
            page.ops.push(op);
        }
    }

    fn text(&mut self, text: impl Into<String>, x: f32, y: f32, size: f32, font: Font, color: Rgb) {
        self.text_aligned(text, x, y, size, font, color, Align::Left);
    }

    #[allow(clippy::too_many_arguments)]
    fn text_aligned(
        &mut self,
        text: impl Into<String>,
        x: f32,
        y: f32,
        size: f32,
        font: Font,
        color: Rgb,
        align: Align,
    ) {
        self.push(DrawOp::Text { text: text.into(), x, y, size, font, color, align });
    }

    fn line(&mut self, x1: f32, x2: f32, y: f32, color: Rgb, width: f32) {
        self.push(DrawOp::Line { x1, y1: y, x2, y2: y, color, width });
    }

    fn finish(self) -> ReportDocument {
        ReportDocument { pages: self.pages }
    }
}

struct Column {
    label: &'static str,
    x: f32,
}

/// How a table is drawn and how it continues after a page break.
struct TableStyle {
    columns: Vec<Column>,
    header_size: f32,
    row_size: f32,
    row_height: f32,
    /// Cursor advance after the header row.
    header_gap: f32,
    /// Rule under the header: (x1, x2, offset below the header baseline).
    header_rule: Option<(f32, f32, f32)>,
    /// Zebra stripe on even rows: (x, width, offset above baseline, height).
    stripe: (f32, f32, f32, f32),
    stripe_color: Rgb,
    continuation_top: f32,
    repeat_header: bool,
}

impl TableStyle {
    fn grouped(kind: GroupKind) -> Self {
        TableStyle {
            columns: vec![
                Column { label: kind.column_label(), x: 25.0 },
                Column { label: "Producción (MWh)", x: 130.0 },
            ],
            header_size: 11.0,
            row_size: 11.0,
            row_height: 6.0,
            header_gap: 5.0,
            header_rule: None,
            stripe: (20.0, 170.0, 4.0, 6.0),
            stripe_color: ZEBRA,
            continuation_top: GROUPED_TOP,
            repeat_header: false,
        }
    }

    fn detail() -> Self {
        TableStyle {
            columns: vec![
                Column { label: "Fecha", x: 20.0 },
                Column { label: "Departamento", x: 55.0 },
                Column { label: "Tecnología", x: 95.0 },
                Column { label: "Producción (MWh)", x: 135.0 },
                Column { label: "Año", x: 170.0 },
                Column { label: "Mes", x: 185.0 },
            ],
            header_size: 10.0,
            row_size: 8.0,
            row_height: 8.0,
            header_gap: 10.0,
            header_rule: Some((15.0, 195.0, 2.0)),
            stripe: (15.0, 180.0, 3.0, 8.0),
            stripe_color: DETAIL_ZEBRA,
            continuation_top: DETAIL_TOP,
            repeat_header: true,
        }
    }
}

fn draw_table_header(canvas: &mut Canvas, style: &TableStyle) {
    let y = canvas.y;
    for col in &style.columns {
        canvas.text(col.label, col.x, y, style.header_size, Font::Bold, BLACK);
    }
    if let Some((x1, x2, offset)) = style.header_rule {
        canvas.line(x1, x2, y + offset, PRIMARY, 0.5);
    }
    canvas.y += style.header_gap;
}

// Shared by the grouped and the detail tables.
fn draw_table(canvas: &mut Canvas, style: &TableStyle, rows: &[Vec<String>]) {
    draw_table_header(canvas, style);
    for (i, row) in rows.iter().enumerate() {
        if canvas.y > BOTTOM_LIMIT {
            canvas.add_page(style.continuation_top);
            if style.repeat_header {
                draw_table_header(canvas, style);
            }
        }
        let y = canvas.y;
        if i % 2 == 0 {
            let (x, w, above, h) = style.stripe;
            canvas.push(DrawOp::FillRect { x, y: y - above, w, h, color: style.stripe_color });
        }
        for (col, cell) in style.columns.iter().zip(row) {
            canvas.text(cell.clone(), col.x, y, style.row_size, Font::Regular, BLACK);
        }
        canvas.y += style.row_height;
    }
}

fn cover_page(canvas: &mut Canvas, now: &DateTime<Local>) {
    canvas.push(DrawOp::FillRect { x: 0.0, y: 0.0, w: PAGE_WIDTH, h: PAGE_HEIGHT, color: PRIMARY });
    let center = PAGE_WIDTH / 2.0;
    canvas.text_aligned("REPORTE DE PRODUCCIÓN ENERGÉTICA", center, 90.0, 26.0, Font::Regular, WHITE, Align::Center);
    canvas.text_aligned("Sistema de Monitoreo y Reporte", center, 110.0, 14.0, Font::Regular, WHITE, Align::Center);
    let stamp = format!(
        "Generado el {} a las {}",
        format_day(now.date_naive()),
        format_clock(now)
    );
    canvas.text_aligned(stamp, center, 130.0, 12.0, Font::Regular, WHITE, Align::Center);
}

fn join_or_na(items: &[String]) -> String {
    if items.is_empty() {
        "N/A".to_string()
    } else {
        items.join(", ")
    }
}

pub fn summary_lines(stats: &Statistics) -> Vec<String> {
    vec![
        format!("Total registros: {}", stats.total_records),
        format!("Producción total: {:.2} MWh", stats.total_production),
        format!("Producción promedio: {:.2} MWh", stats.average_production),
        format!("Departamentos: {}", join_or_na(&stats.departments)),
        format!("Tecnologías: {}", join_or_na(&stats.technologies)),
    ]
}

// At most five lines, so no page break is checked here.
fn executive_summary(canvas: &mut Canvas, stats: &Statistics) {
    canvas.text("Resumen Ejecutivo", 20.0, 20.0, 20.0, Font::Regular, PRIMARY);
    canvas.line(20.0, 190.0, 22.0, PRIMARY, 0.8);
    canvas.y = 35.0;
    for line in summary_lines(stats) {
        let y = canvas.y;
        canvas.push(DrawOp::StrokeRect { x: 20.0, y: y - 6.0, w: 170.0, h: 10.0, color: PRIMARY, width: 0.8 });
        canvas.text(line, 25.0, y + 1.0, 12.0, Font::Regular, SECONDARY);
        canvas.y += 14.0;
    }
}

/// Row labels and values of one grouped table, months already named.
///
/// Raw keys that name the same month ("7" and "07") share one row, placed
/// where the first of them appeared.
pub fn grouped_rows(kind: GroupKind, stats: &Statistics) -> Vec<(String, f64)> {
    let mut rows: LinkedHashMap<String, f64> = LinkedHashMap::new();
    for (key, value) in kind.mapping(stats).iter() {
        let label = match kind {
            GroupKind::Month => month_name(key),
            _ => key.clone(),
        };
        *rows.entry(label).or_insert(0.0) += *value;
    }
    rows.into_iter().collect()
}

fn grouped_section(canvas: &mut Canvas, kind: GroupKind, stats: &Statistics) {
    // Keep the section heading on the same page as its first row.
    if canvas.y + SECTION_HEAD > BOTTOM_LIMIT {
        canvas.add_page(GROUPED_TOP);
    }
    canvas.y += 10.0;
    canvas.text(kind.title(), 20.0, canvas.y, 16.0, Font::Regular, PRIMARY);
    canvas.y += 6.0;
    canvas.line(20.0, 190.0, canvas.y, PRIMARY, 0.5);
    canvas.y += 6.0;

    let rows: Vec<Vec<String>> = grouped_rows(kind, stats)
        .into_iter()
        .map(|(label, value)| vec![label, format!("{:.2}", value)])
        .collect();
    draw_table(canvas, &TableStyle::grouped(kind), &rows);
}

/// The last `DETAIL_LIMIT` records by fetch order.
pub fn detail_records(records: &[ProductionRecord]) -> &[ProductionRecord] {
    &records[records.len().saturating_sub(DETAIL_LIMIT)..]
}

fn cell(value: Option<&str>, render: impl Fn(&str) -> String) -> String {
    match non_empty(value) {
        Some(v) => render(v),
        None => "N/A".to_string(),
    }
}

pub fn detail_row(record: &ProductionRecord) -> Vec<String> {
    vec![
        cell(record.date.as_deref(), display_date),
        cell(record.department.as_deref(), str::to_string),
        cell(record.technology.as_deref(), str::to_string),
        cell(record.production_mwh.as_deref(), str::to_string),
        cell(record.year.as_deref(), str::to_string),
        cell(record.month.as_deref(), month_name),
    ]
}

fn detail_section(canvas: &mut Canvas, records: &[ProductionRecord], total: usize) {
    canvas.add_page(DETAIL_TOP);
    canvas.text("DATOS DETALLADOS DE PRODUCCIÓN", 20.0, 30.0, 18.0, Font::Regular, PRIMARY);
    let shown = detail_records(records);
    canvas.text(
        format!("Mostrando los últimos {} registros de {} totales", shown.len(), total),
        20.0,
        45.0,
        10.0,
        Font::Regular,
        SECONDARY,
    );
    canvas.y = 60.0;
    let rows: Vec<Vec<String>> = shown.iter().map(detail_row).collect();
    draw_table(canvas, &TableStyle::detail(), &rows);
}

/// Stamp every page with its number; needs the final page count.
pub fn add_footers(doc: &mut ReportDocument, generated: &str) {
    let total = doc.pages.len();
    for (i, page) in doc.pages.iter_mut().enumerate() {
        page.ops.push(DrawOp::Line { x1: 20.0, y1: 285.0, x2: 190.0, y2: 285.0, color: PRIMARY, width: 0.5 });
        let footer = [
            (format!("Página {} de {}", i + 1, total), 20.0, Align::Left),
            (FOOTER_LABEL.to_string(), 105.0, Align::Center),
            (format!("Generado: {}", generated), 190.0, Align::Right),
        ];
        for (text, x, align) in footer {
            page.ops.push(DrawOp::Text { text, x, y: 292.0, size: 8.0, font: Font::Regular, color: SECONDARY, align });
        }
    }
}

/// Lay out the whole report: cover, summary, grouped tables, detail table,
/// then footers.
pub fn build_report(stats: &Statistics, records: &[ProductionRecord], now: &DateTime<Local>) -> ReportDocument {
    let mut canvas = Canvas::new();
    cover_page(&mut canvas, now);
    canvas.add_page(GROUPED_TOP);
    executive_summary(&mut canvas, stats);
    for kind in GroupKind::ALL {
        grouped_section(&mut canvas, kind, stats);
    }
    detail_section(&mut canvas, records, stats.total_records);

    let mut doc = canvas.finish();
    add_footers(&mut doc, &format_day(now.date_naive()));
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::record;
    use crate::reports::aggregate;
    use chrono::{Duration, NaiveDate, TimeZone};

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, 19, 9, 30, 5).unwrap()
    }

    fn dated_records(n: usize) -> Vec<ProductionRecord> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..n)
            .map(|i| {
                let date = (start + Duration::days(i as i64)).format("%Y-%m-%d").to_string();
                record("Cesar", "Solar", "1.5", &date)
            })
            .collect()
    }

    fn detail_start(doc: &ReportDocument) -> usize {
        doc.pages
            .iter()
            .position(|p| p.contains_text("DATOS DETALLADOS DE PRODUCCIÓN"))
            .unwrap()
    }

    fn text_ops(page: &Page) -> Vec<(&str, f32)> {
        page.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, y, .. } => Some((text.as_str(), *y)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn empty_dataset_still_produces_all_sections() {
        let doc = build_report(&Statistics::default(), &[], &now());
        assert_eq!(doc.page_count(), 3);
        assert!(doc.pages[0].contains_text("REPORTE DE PRODUCCIÓN ENERGÉTICA"));
        assert!(doc.pages[0].contains_text("Generado el 19/10/2026 a las 09:30:05"));
        assert!(doc.pages[1].contains_text("Total registros: 0"));
        assert!(doc.pages[1].contains_text("Departamentos: N/A"));
        assert!(doc.pages[2].contains_text("Mostrando los últimos 0 registros de 0 totales"));
    }

    #[test]
    fn cover_is_a_single_full_bleed_page() {
        let doc = build_report(&Statistics::default(), &[], &now());
        assert_eq!(
            doc.pages[0].ops[0],
            DrawOp::FillRect { x: 0.0, y: 0.0, w: PAGE_WIDTH, h: PAGE_HEIGHT, color: PRIMARY }
        );
        assert!(doc.pages[1].contains_text("Resumen Ejecutivo"));
    }

    #[test]
    fn detail_lists_only_the_last_twenty() {
        let records = dated_records(25);
        let doc = build_report(&aggregate(&records), &records, &now());
        let start = detail_start(&doc);
        let detail_texts: Vec<&str> = doc.pages[start..].iter().flat_map(|p| p.texts()).collect();

        assert!(detail_texts.contains(&"Mostrando los últimos 20 registros de 25 totales"));
        // 2024-01-01 .. 2024-01-05 are the first five and must be left out.
        for day in 1..=5 {
            assert!(!detail_texts.contains(&format!("{}/1/2024", day).as_str()));
        }
        for day in 6..=25 {
            let shown = format!("{}/1/2024", day);
            assert_eq!(detail_texts.iter().filter(|t| **t == shown).count(), 1, "{shown}");
        }
    }

    #[test]
    fn small_dataset_is_listed_entirely() {
        let records = dated_records(5);
        let doc = build_report(&aggregate(&records), &records, &now());
        let page = &doc.pages[detail_start(&doc)];
        assert!(page.contains_text("Mostrando los últimos 5 registros de 5 totales"));
        assert_eq!(page.texts().filter(|t| t.ends_with("/1/2024")).count(), 5);
    }

    #[test]
    fn missing_fields_render_as_na_per_cell() {
        let mut rec = record("Cesar", "Solar", "12.5", "2024-07-15");
        rec.department = None;
        rec.month = Some(String::new());
        assert_eq!(detail_row(&rec), vec!["15/7/2024", "N/A", "Solar", "12.5", "2024", "N/A"]);
    }

    #[test]
    fn month_table_uses_names() {
        let mut a = record("Cesar", "Solar", "1", "2024-07-01");
        a.month = Some("7".into());
        let mut b = record("Cesar", "Solar", "2", "2024-07-01");
        b.month = Some("13".into());
        let stats = aggregate(&[a, b]);
        let rows = grouped_rows(GroupKind::Month, &stats);
        assert_eq!(rows, vec![("Julio".to_string(), 1.0), ("Mes 13".to_string(), 2.0)]);

        let doc = build_report(&stats, &[], &now());
        assert!(doc.pages[1].contains_text("Julio"));
        assert!(doc.pages[1].contains_text("Mes"));
    }

    #[test]
    fn month_keys_naming_the_same_month_share_a_row() {
        let mut a = record("Cesar", "Solar", "1", "2024-07-01");
        a.month = Some("7".into());
        let mut b = record("Meta", "Solar", "4", "2024-03-01");
        b.month = Some("3".into());
        let mut c = record("Cesar", "Solar", "2", "2024-07-02");
        c.month = Some("07".into());
        let stats = aggregate(&[a, b, c]);

        assert_eq!(stats.production_by_month.len(), 3);
        let rows = grouped_rows(GroupKind::Month, &stats);
        assert_eq!(rows, vec![("Julio".to_string(), 3.0), ("Marzo".to_string(), 4.0)]);
    }

    #[test]
    fn grouped_overflow_continues_without_losing_rows() {
        let records: Vec<_> = (0..80)
            .map(|i| record(&format!("Dept {:02}", i), "Solar", "1", "2024-01-01"))
            .collect();
        let stats = aggregate(&records);
        let doc = build_report(&stats, &[], &now());
        let start = detail_start(&doc);
        assert!(start > 2, "grouped tables should spill onto more pages");

        let grouped: Vec<&str> = doc.pages[1..start].iter().flat_map(|p| p.texts()).collect();
        for i in 0..80 {
            let label = format!("Dept {:02}", i);
            assert_eq!(grouped.iter().filter(|t| **t == label).count(), 1, "{label}");
        }
        // The grouped header is not repeated on continuation pages.
        let headers = grouped.iter().filter(|t| **t == "Departamento").count();
        assert_eq!(headers, 1);
    }

    #[test]
    fn no_row_is_drawn_below_the_bottom_limit() {
        let records: Vec<_> = (0..150)
            .map(|i| record(&format!("D{}", i), &format!("T{}", i), "2", "2024-03-01"))
            .collect();
        let doc = build_report(&aggregate(&records), &records, &now());
        for page in &doc.pages[1..] {
            for (text, y) in text_ops(page) {
                if y < 285.0 {
                    assert!(y <= BOTTOM_LIMIT, "{text} drawn at {y}");
                }
            }
        }
    }

    #[test]
    fn section_heading_near_the_bottom_moves_to_a_new_page() {
        let stats = aggregate(&[record("Cesar", "Solar", "1", "2024-01-01")]);
        let mut canvas = Canvas::new();
        canvas.y = 250.0;
        grouped_section(&mut canvas, GroupKind::Department, &stats);
        let doc = canvas.finish();

        assert_eq!(doc.page_count(), 2);
        assert!(!doc.pages[0].contains_text("Producción por Departamento"));
        let texts = text_ops(&doc.pages[1]);
        assert_eq!(texts[0], ("Producción por Departamento", GROUPED_TOP + 10.0));
        assert!(doc.pages[1].contains_text("Cesar"));
    }

    #[test]
    fn repeating_table_header_on_every_continuation_page() {
        let mut canvas = Canvas::new();
        canvas.y = 60.0;
        let rows: Vec<Vec<String>> = (0..100)
            .map(|i| vec![format!("r{}", i), "a".into(), "b".into(), "c".into(), "d".into(), "e".into()])
            .collect();
        draw_table(&mut canvas, &TableStyle::detail(), &rows);
        let doc = canvas.finish();

        assert!(doc.page_count() >= 3);
        for page in &doc.pages {
            assert!(page.contains_text("Fecha"));
        }
        let continuation = text_ops(&doc.pages[1]);
        assert_eq!(continuation[0], ("Fecha", DETAIL_TOP));
        let all: Vec<&str> = doc.pages.iter().flat_map(|p| p.texts()).collect();
        for i in 0..100 {
            let label = format!("r{}", i);
            assert_eq!(all.iter().filter(|t| **t == label).count(), 1);
        }
    }

    #[test]
    fn every_page_gets_a_numbered_footer() {
        let records: Vec<_> = (0..80)
            .map(|i| record(&format!("Dept {:02}", i), "Solar", "1", "2024-01-01"))
            .collect();
        let doc = build_report(&aggregate(&records), &records, &now());
        let total = doc.page_count();
        for (i, page) in doc.pages.iter().enumerate() {
            assert!(page.contains_text(&format!("Página {} de {}", i + 1, total)));
            assert!(page.contains_text(FOOTER_LABEL));
            assert!(page.contains_text("Generado: 19/10/2026"));
        }
    }
}
