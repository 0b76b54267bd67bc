//! PDF rendering of customs invoices, customs declarations and manifests.

use chrono::{DateTime, Utc};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use rust_decimal::Decimal;
use thiserror::Error;

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 50;
const FONT_SIZE: i64 = 9;
const TITLE_SIZE: i64 = 14;
const LEADING: i64 = 13;
const WRAP_AT: usize = 95;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("PDF generation failed: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("PDF output failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid document input: {0}")]
    InvalidInput(String),
}

/// Shipment and goods data printed on customs paperwork.
#[derive(Debug, Clone, Default)]
pub struct CustomsDocumentData {
    pub shipment_id: i32,
    pub sender_customer_code: String,
    pub numeric_reference: i64,
    pub alphanumeric_reference: Option<String>,
    pub consignee_name: String,
    pub consignee_address: String,
    pub consignee_zip: String,
    pub consignee_city: String,
    pub consignee_country: String,
    pub number_of_parcels: i32,
    pub weight_kg: f64,
    pub category: String,
    pub goods_description: String,
    pub goods_value: Decimal,
    pub goods_currency: String,
    pub goods_origin_country: String,
    pub hs_code: Option<String>,
    pub incoterm: String,
    pub sender_vat: Option<String>,
    pub sender_eori: Option<String>,
    pub receiver_vat: Option<String>,
    pub receiver_eori: Option<String>,
    pub notes: Option<String>,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct ManifestRow {
    pub numeric_reference: i64,
    pub alphanumeric_reference: Option<String>,
    pub consignee_name: String,
    pub consignee_city: String,
    pub consignee_country: String,
    pub parcels: i32,
    pub weight_kg: f64,
    pub volume_m3: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ManifestDocumentData {
    pub reference: String,
    pub sender_customer_code: String,
    pub departure_depot: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub rows: Vec<ManifestRow>,
    pub total_parcels: i32,
    pub total_weight_kg: f64,
    pub total_volume_m3: f64,
}

pub trait DocumentRenderer: Send + Sync {
    fn render_invoice(&self, data: &CustomsDocumentData) -> Result<Vec<u8>, DocumentError>;
    fn render_declaration(&self, data: &CustomsDocumentData) -> Result<Vec<u8>, DocumentError>;
    fn render_manifest(&self, data: &ManifestDocumentData) -> Result<Vec<u8>, DocumentError>;
}

/// Plain text layout on A4 pages with a monospaced core font.
#[derive(Debug, Clone, Default)]
pub struct PdfDocumentRenderer;

impl PdfDocumentRenderer {
    pub fn new() -> Self {
        Self
    }

    fn render(&self, title: &str, lines: &[String]) -> Result<Vec<u8>, DocumentError> {
        if title.trim().is_empty() {
            return Err(DocumentError::InvalidInput("document title is empty".into()));
        }

        let wrapped: Vec<String> = lines.iter().flat_map(|l| wrap(l, WRAP_AT)).collect();
        let first_page_lines = ((PAGE_HEIGHT - 2 * MARGIN - 2 * LEADING) / LEADING) as usize;
        let other_page_lines = ((PAGE_HEIGHT - 2 * MARGIN) / LEADING) as usize;

        let mut chunks: Vec<&[String]> = Vec::new();
        let (first, mut rest) = wrapped.split_at(first_page_lines.min(wrapped.len()));
        chunks.push(first);
        while !rest.is_empty() {
            let (page, tail) = rest.split_at(other_page_lines.min(rest.len()));
            chunks.push(page);
            rest = tail;
        }

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let bold_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier-Bold",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id, "F2" => bold_id },
        });

        let total_pages = chunks.len();
        let mut kids: Vec<Object> = Vec::with_capacity(total_pages);
        for (index, chunk) in chunks.into_iter().enumerate() {
            let top = PAGE_HEIGHT - MARGIN;
            let mut ops = vec![
                Operation::new("BT", vec![]),
                Operation::new("Td", vec![MARGIN.into(), top.into()]),
            ];
            if index == 0 {
                ops.push(Operation::new("Tf", vec!["F2".into(), TITLE_SIZE.into()]));
                ops.push(Operation::new("Tj", vec![Object::string_literal(to_pdf_text(title))]));
                ops.push(Operation::new("Td", vec![0.into(), (-2 * LEADING).into()]));
            }
            ops.push(Operation::new("Tf", vec!["F1".into(), FONT_SIZE.into()]));
            for line in chunk {
                ops.push(Operation::new("Tj", vec![Object::string_literal(to_pdf_text(line))]));
                ops.push(Operation::new("Td", vec![0.into(), (-LEADING).into()]));
            }
            ops.push(Operation::new("ET", vec![]));

            // page footer
            ops.push(Operation::new("BT", vec![]));
            ops.push(Operation::new("Tf", vec!["F1".into(), 8.into()]));
            ops.push(Operation::new("Td", vec![(PAGE_WIDTH - MARGIN - 60).into(), (MARGIN / 2).into()]));
            ops.push(Operation::new(
                "Tj",
                vec![Object::string_literal(format!("Page {}/{}", index + 1, total_pages))],
            ));
            ops.push(Operation::new("ET", vec![]));

            let content = Content { operations: ops };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => total_pages as i64,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.compress();

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer)?;
        Ok(buffer)
    }
}

impl DocumentRenderer for PdfDocumentRenderer {
    fn render_invoice(&self, data: &CustomsDocumentData) -> Result<Vec<u8>, DocumentError> {
        let mut lines = header_lines(data);
        lines.push(String::new());
        lines.push("GOODS".into());
        lines.push(format!("Description:        {}", data.goods_description));
        lines.push(format!("Category:           {}", data.category));
        if let Some(hs) = &data.hs_code {
            lines.push(format!("HS code:            {}", hs));
        }
        lines.push(format!("Country of origin:  {}", data.goods_origin_country));
        lines.push(format!(
            "Value:              {} {}",
            data.goods_value.round_dp(2),
            data.goods_currency
        ));
        lines.push(format!("Incoterm:           {}", data.incoterm));
        lines.push(format!(
            "Parcels / weight:   {} / {:.2} kg",
            data.number_of_parcels, data.weight_kg
        ));
        if let Some(notes) = &data.notes {
            lines.push(String::new());
            lines.push(format!("Notes: {}", notes));
        }
        lines.push(String::new());
        lines.push(format!(
            "TOTAL INVOICE VALUE: {} {}",
            data.goods_value.round_dp(2),
            data.goods_currency
        ));
        self.render("COMMERCIAL INVOICE", &lines)
    }

    fn render_declaration(&self, data: &CustomsDocumentData) -> Result<Vec<u8>, DocumentError> {
        let mut lines = header_lines(data);
        lines.push(String::new());
        lines.push(format!(
            "We declare that the goods described as \"{}\" ({}) originate from {} \
             and have a total value of {} {}.",
            data.goods_description,
            data.category,
            data.goods_origin_country,
            data.goods_value.round_dp(2),
            data.goods_currency
        ));
        if let Some(hs) = &data.hs_code {
            lines.push(format!("Tariff classification (HS): {}", hs));
        }
        lines.push(format!("Delivery terms: {}", data.incoterm));
        lines.push(String::new());
        lines.push("Signature: ______________________".into());
        self.render("CUSTOMS DECLARATION", &lines)
    }

    fn render_manifest(&self, data: &ManifestDocumentData) -> Result<Vec<u8>, DocumentError> {
        if data.rows.is_empty() {
            return Err(DocumentError::InvalidInput("manifest has no shipments".into()));
        }
        let mut lines = vec![
            format!("Reference:  {}", data.reference),
            format!("Sender:     {}", data.sender_customer_code),
            format!(
                "Depot:      {}",
                data.departure_depot.as_deref().unwrap_or("-")
            ),
            format!("Generated:  {}", data.generated_at.format("%Y-%m-%d %H:%M")),
            String::new(),
            format!(
                "{:<10} {:<16} {:<28} {:<16} {:>3} {:>5} {:>9} {:>8}",
                "Ref", "Alpha ref", "Consignee", "City", "Cty", "Parc", "Kg", "m3"
            ),
        ];
        for row in &data.rows {
            lines.push(format!(
                "{:<10} {:<16} {:<28} {:<16} {:>3} {:>5} {:>9.2} {:>8.3}",
                row.numeric_reference,
                clip(row.alphanumeric_reference.as_deref().unwrap_or(""), 16),
                clip(&row.consignee_name, 28),
                clip(&row.consignee_city, 16),
                row.consignee_country,
                row.parcels,
                row.weight_kg,
                row.volume_m3
            ));
        }
        lines.push(String::new());
        lines.push(format!(
            "Shipments: {}   Parcels: {}   Weight: {:.2} kg   Volume: {:.3} m3",
            data.rows.len(),
            data.total_parcels,
            data.total_weight_kg,
            data.total_volume_m3
        ));
        self.render("BRT SHIPMENT MANIFEST", &lines)
    }
}

fn header_lines(data: &CustomsDocumentData) -> Vec<String> {
    let mut lines = vec![
        format!("Date:       {}", data.issued_at.format("%Y-%m-%d")),
        format!(
            "Shipment:   {} / {}{}",
            data.sender_customer_code,
            data.numeric_reference,
            data.alphanumeric_reference
                .as_deref()
                .map(|a| format!(" ({})", a))
                .unwrap_or_default()
        ),
        String::new(),
        "SENDER".into(),
        format!("Customer code: {}", data.sender_customer_code),
    ];
    if let Some(vat) = &data.sender_vat {
        lines.push(format!("VAT: {}", vat));
    }
    if let Some(eori) = &data.sender_eori {
        lines.push(format!("EORI: {}", eori));
    }
    lines.push(String::new());
    lines.push("RECEIVER".into());
    lines.push(data.consignee_name.clone());
    lines.push(data.consignee_address.clone());
    lines.push(format!(
        "{} {} ({})",
        data.consignee_zip, data.consignee_city, data.consignee_country
    ));
    if let Some(vat) = &data.receiver_vat {
        lines.push(format!("VAT: {}", vat));
    }
    if let Some(eori) = &data.receiver_eori {
        lines.push(format!("EORI: {}", eori));
    }
    lines
}

fn clip(value: &str, width: usize) -> String {
    value.chars().take(width).collect()
}

fn wrap(line: &str, width: usize) -> Vec<String> {
    if line.chars().count() <= width {
        return vec![line.to_string()];
    }
    let mut out = Vec::new();
    let mut current = String::new();
    for word in line.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > width {
            out.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// Core fonts use a single-byte encoding; fold accents and drop the rest.
fn to_pdf_text(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'à' | 'á' | 'â' | 'ä' => 'a',
            'è' | 'é' | 'ê' | 'ë' => 'e',
            'ì' | 'í' | 'î' | 'ï' => 'i',
            'ò' | 'ó' | 'ô' | 'ö' => 'o',
            'ù' | 'ú' | 'û' | 'ü' => 'u',
            'À' | 'Á' => 'A',
            'È' | 'É' => 'E',
            'Ì' | 'Í' => 'I',
            'Ò' | 'Ó' => 'O',
            'Ù' | 'Ú' => 'U',
            'ç' => 'c',
            '’' | '‘' => '\'',
            '“' | '”' => '"',
            c if c.is_ascii() => c,
            _ => '?',
        })
        .collect()
}
