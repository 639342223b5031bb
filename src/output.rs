use crate::error::{AppError, Result};
use crate::layout::{grouped_rows, summary_lines, Align, DrawOp, Font, ReportDocument, Rgb, PAGE_HEIGHT, PAGE_WIDTH};
use crate::types::{GroupKind, GroupRow, Statistics, SummaryRow};
use crate::util::{format_int, format_number};
use chrono::NaiveDate;
use printpdf::path::PaintMode;
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfLayerReference, Point, Rect,
};
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

const LAYER: &str = "Contenido";
const PT_PER_MM: f32 = 72.0 / 25.4;
// Helvetica averages roughly half an em per glyph.
const AVG_GLYPH_EM: f32 = 0.5;

pub fn report_file_name(date: NaiveDate) -> String {
    format!("reporte_energia_{}.pdf", date.format("%Y-%m-%d"))
}

fn pdf_error(e: impl std::fmt::Display) -> AppError {
    AppError::Pdf(e.to_string())
}

fn color(c: Rgb) -> Color {
    Color::Rgb(printpdf::Rgb::new(
        c.0 as f32 / 255.0,
        c.1 as f32 / 255.0,
        c.2 as f32 / 255.0,
        None,
    ))
}

/// Approximate width of `text` in millimetres at `size` points.
pub fn text_width_mm(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * AVG_GLYPH_EM / PT_PER_MM
}

fn aligned_x(text: &str, x: f32, size: f32, align: Align) -> f32 {
    match align {
        Align::Left => x,
        Align::Center => x - text_width_mm(text, size) / 2.0,
        Align::Right => x - text_width_mm(text, size),
    }
}

// Layout measures y downwards from the top; PDF measures upwards.
fn flip(y: f32) -> Mm {
    Mm(PAGE_HEIGHT - y)
}

fn draw(layer: &PdfLayerReference, op: &DrawOp, regular: &IndirectFontRef, bold: &IndirectFontRef) {
    match op {
        DrawOp::FillRect { x, y, w, h, color: c } => {
            layer.set_fill_color(color(*c));
            let rect = Rect::new(Mm(*x), flip(y + h), Mm(x + w), flip(*y)).with_mode(PaintMode::Fill);
            layer.add_rect(rect);
        }
        DrawOp::StrokeRect { x, y, w, h, color: c, width } => {
            layer.set_outline_color(color(*c));
            layer.set_outline_thickness(width * PT_PER_MM);
            let rect = Rect::new(Mm(*x), flip(y + h), Mm(x + w), flip(*y)).with_mode(PaintMode::Stroke);
            layer.add_rect(rect);
        }
        DrawOp::Line { x1, y1, x2, y2, color: c, width } => {
            layer.set_outline_color(color(*c));
            layer.set_outline_thickness(width * PT_PER_MM);
            layer.add_line(Line {
                points: vec![
                    (Point::new(Mm(*x1), flip(*y1)), false),
                    (Point::new(Mm(*x2), flip(*y2)), false),
                ],
                is_closed: false,
            });
        }
        DrawOp::Text { text, x, y, size, font, color: c, align } => {
            layer.set_fill_color(color(*c));
            let face = match font {
                Font::Regular => regular,
                Font::Bold => bold,
            };
            let x = aligned_x(text, *x, *size, *align);
            layer.use_text(text.as_str(), *size, Mm(x), flip(*y), face);
        }
    }
}

/// Render the laid-out report to PDF bytes, A4 portrait.
pub fn render_pdf(doc: &ReportDocument) -> Result<Vec<u8>> {
    let (pdf, first_page, first_layer) = PdfDocument::new(
        "Reporte de Producción Energética",
        Mm(PAGE_WIDTH),
        Mm(PAGE_HEIGHT),
        LAYER,
    );
    let regular = pdf.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_error)?;
    let bold = pdf.add_builtin_font(BuiltinFont::HelveticaBold).map_err(pdf_error)?;

    let mut layer = pdf.get_page(first_page).get_layer(first_layer);
    for (i, page) in doc.pages.iter().enumerate() {
        if i > 0 {
            let (page_idx, layer_idx) = pdf.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), LAYER);
            layer = pdf.get_page(page_idx).get_layer(layer_idx);
        }
        for op in &page.ops {
            draw(&layer, op, &regular, &bold);
        }
    }
    pdf.save_to_bytes().map_err(pdf_error)
}

pub fn write_pdf(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes)?;
    Ok(())
}

fn print_table<T>(rows: Vec<T>)
where
    T: Tabled,
{
    if rows.is_empty() {
        println!("(sin datos)\n");
        return;
    }
    let table_str = Table::new(rows).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

/// Console stand-in for the dashboard: summary plus the grouped tables.
pub fn preview_statistics(stats: &Statistics) {
    println!("Resumen Ejecutivo\n");
    let summary: Vec<SummaryRow> = summary_lines(stats)
        .into_iter()
        .filter_map(|line| {
            line.split_once(": ").map(|(metric, value)| SummaryRow {
                metric: metric.to_string(),
                value: value.to_string(),
            })
        })
        .collect();
    print_table(summary);

    for kind in GroupKind::ALL {
        println!("{}\n", kind.title());
        let rows: Vec<GroupRow> = grouped_rows(kind, stats)
            .into_iter()
            .map(|(label, value)| GroupRow { label, production: format_number(value, 2) })
            .collect();
        print_table(rows);
    }
    println!(
        "({} registros, {} MWh en total)\n",
        format_int(stats.total_records),
        format_number(stats.total_production, 2)
    );
}
