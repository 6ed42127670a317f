use printpdf::{
    image_crate, BuiltinFont, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerReference,
};

use super::{
    format_date, ClientBlock, CompanyHeader, InformeDocument, ProformaDocument,
    TERMS_AND_CONDITIONS,
};
use crate::errors::ServiceError;
use crate::money::{format_money, percent_label};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN_LEFT: f32 = 15.0;
const MARGIN_TOP: f32 = 280.0;
const MARGIN_BOTTOM: f32 = 20.0;
const ROW_HEIGHT: f32 = 5.5;

fn render_error<E: std::fmt::Debug>(e: E) -> ServiceError {
    ServiceError::RenderError(format!("{:?}", e))
}

/// Builtin PDF fonts only cover Latin-1 via WinAnsi; fold to ASCII instead.
fn pdf_text(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'Á' | 'À' | 'Ä' | 'Â' => 'A',
            'É' | 'È' | 'Ë' | 'Ê' => 'E',
            'Í' | 'Ì' | 'Ï' | 'Î' => 'I',
            'Ó' | 'Ò' | 'Ö' | 'Ô' => 'O',
            'Ú' | 'Ù' | 'Ü' | 'Û' => 'U',
            'ñ' => 'n',
            'Ñ' => 'N',
            '°' | 'º' => 'o',
            c if c.is_ascii() => c,
            _ => '?',
        })
        .collect()
}

/// Cuts `text` to roughly fit `width` mm at `size` pt.
fn fit(text: &str, width: f32, size: f32) -> String {
    let max_chars = ((width / (size * 0.19)).floor() as usize).max(3);
    let folded = pdf_text(text);
    if folded.chars().count() <= max_chars {
        folded
    } else {
        let mut cut: String = folded.chars().take(max_chars - 2).collect();
        cut.push_str("..");
        cut
    }
}

/// Page cursor over a printpdf document
struct PageWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    y: f32,
    pages: usize,
}

impl PageWriter {
    fn new(title: &str) -> Result<Self, ServiceError> {
        let (doc, page, layer) =
            PdfDocument::new(pdf_text(title), Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1".to_string());
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(render_error)?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(render_error)?;
        let layer = doc.get_page(page).get_layer(layer);
        Ok(Self {
            doc,
            layer,
            regular,
            bold,
            y: MARGIN_TOP,
            pages: 1,
        })
    }

    fn ensure_space(&mut self, height: f32) {
        if self.y - height < MARGIN_BOTTOM {
            self.pages += 1;
            let (page, layer) = self.doc.add_page(
                Mm(PAGE_WIDTH),
                Mm(PAGE_HEIGHT),
                format!("Layer {}", self.pages),
            );
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = MARGIN_TOP;
        }
    }

    fn text_at(&self, x: f32, size: f32, bold: bool, text: &str) {
        let font = if bold { &self.bold } else { &self.regular };
        self.layer
            .use_text(pdf_text(text), size, Mm(x), Mm(self.y), font);
    }

    fn line(&mut self, size: f32, bold: bool, text: &str) {
        self.ensure_space(ROW_HEIGHT);
        self.text_at(MARGIN_LEFT, size, bold, text);
        self.y -= ROW_HEIGHT;
    }

    fn gap(&mut self, height: f32) {
        self.y -= height;
    }

    /// One table row; `columns` pairs an x offset and width with the cell text
    fn row(&mut self, size: f32, bold: bool, columns: &[(f32, f32, &str)]) {
        self.ensure_space(ROW_HEIGHT);
        for (x, width, text) in columns {
            self.text_at(MARGIN_LEFT + x, size, bold, &fit(text, *width, size));
        }
        self.y -= ROW_HEIGHT;
    }

    fn logo(&mut self, bytes: &[u8]) -> Result<(), ServiceError> {
        let decoded = image_crate::load_from_memory(bytes).map_err(render_error)?;
        let image = Image::from_dynamic_image(&decoded);
        image.add_to_layer(
            self.layer.clone(),
            ImageTransform {
                translate_x: Some(Mm(PAGE_WIDTH - 60.0)),
                translate_y: Some(Mm(MARGIN_TOP - 15.0)),
                dpi: Some(300.0),
                ..Default::default()
            },
        );
        Ok(())
    }

    fn finish(self) -> Result<Vec<u8>, ServiceError> {
        self.doc.save_to_bytes().map_err(render_error)
    }
}

fn company_header(
    writer: &mut PageWriter,
    company: &CompanyHeader,
    logo: Option<&[u8]>,
) -> Result<(), ServiceError> {
    if let Some(bytes) = logo {
        writer.logo(bytes)?;
    }
    writer.line(14.0, true, &company.name);
    writer.line(9.0, false, &company.address);
    writer.line(
        9.0,
        false,
        &format!("Tel: {}  |  {}  |  RUC: {}", company.phone, company.email, company.ruc),
    );
    writer.gap(4.0);
    Ok(())
}

fn client_block(writer: &mut PageWriter, client: &ClientBlock, date_label: &str, date: &str) {
    writer.line(11.0, true, "DATOS DEL CLIENTE");
    for (label, value) in [
        ("Cliente:", client.name.as_str()),
        ("RUC:", client.ruc.as_str()),
        ("Dirección:", client.address.as_str()),
        ("Teléfono:", client.phone.as_str()),
        ("Email:", client.email.as_str()),
        ("Contacto:", client.contact.as_str()),
        (date_label, date),
    ] {
        writer.row(9.0, false, &[(0.0, 30.0, label), (32.0, 145.0, value)]);
    }
    writer.gap(3.0);
}

/// Column layout: x offset and width in mm from the left margin
const SERVICE_COLUMNS: [(f32, f32); 7] = [
    (0.0, 44.0),
    (45.0, 18.0),
    (64.0, 34.0),
    (99.0, 26.0),
    (126.0, 12.0),
    (139.0, 20.0),
    (160.0, 20.0),
];

pub(super) fn render_proforma(
    doc: &ProformaDocument,
    logo: Option<&[u8]>,
) -> Result<Vec<u8>, ServiceError> {
    let mut writer = PageWriter::new(&format!("Proforma {}", doc.number))?;
    company_header(&mut writer, &doc.company, logo)?;

    writer.line(13.0, true, &format!("PROFORMA N° {}", doc.number));
    writer.gap(2.0);
    client_block(&mut writer, &doc.client, "Fecha:", &format_date(doc.date));

    writer.line(11.0, true, "DETALLE DE SERVICIOS");
    let header = [
        "PARÁMETRO",
        "UNIDAD",
        "MÉTODO/REF.",
        "TÉCNICA",
        "CANT.",
        "P. UNIT.",
        "SUBTOTAL",
    ];
    let cells: Vec<(f32, f32, &str)> = SERVICE_COLUMNS
        .iter()
        .zip(header.iter())
        .map(|((x, w), text)| (*x, *w, *text))
        .collect();
    writer.row(8.0, true, &cells);

    for group in doc.groups() {
        writer.line(9.0, true, &group.title);
        for line in group.lines {
            let quantity = line.quantity.to_string();
            let unit_price = format_money(line.unit_price);
            let subtotal = format_money(line.subtotal);
            let values = [
                line.parameter.as_str(),
                line.unit.as_str(),
                line.method.as_str(),
                line.technique.as_str(),
                quantity.as_str(),
                unit_price.as_str(),
                subtotal.as_str(),
            ];
            let cells: Vec<(f32, f32, &str)> = SERVICE_COLUMNS
                .iter()
                .zip(values.iter())
                .map(|((x, w), text)| (*x, *w, *text))
                .collect();
            writer.row(8.0, false, &cells);
        }
    }

    writer.gap(3.0);
    let tax_label = format!("IVA ({}%):", percent_label(doc.tax_rate));
    for (label, amount, bold) in [
        ("SUBTOTAL:", doc.totals.subtotal, false),
        (tax_label.as_str(), doc.totals.tax_amount, false),
        ("TOTAL:", doc.totals.total, true),
    ] {
        let amount = format_money(amount);
        writer.row(
            10.0,
            bold,
            &[(120.0, 38.0, label), (160.0, 25.0, amount.as_str())],
        );
    }

    writer.gap(4.0);
    writer.line(10.0, true, "TÉRMINOS Y CONDICIONES");
    for term in TERMS_AND_CONDITIONS {
        writer.line(8.0, false, &format!("- {}", term));
    }

    writer.finish()
}

const RESULT_COLUMNS: [(f32, f32); 5] = [
    (0.0, 22.0),
    (24.0, 48.0),
    (74.0, 34.0),
    (110.0, 34.0),
    (146.0, 34.0),
];

pub(super) fn render_informe(
    doc: &InformeDocument,
    logo: Option<&[u8]>,
) -> Result<Vec<u8>, ServiceError> {
    let mut writer = PageWriter::new(&format!("Informe INF-{}", doc.proforma_number))?;
    company_header(&mut writer, &doc.company, logo)?;

    writer.line(
        13.0,
        true,
        &format!("INFORME DE RESULTADOS N° INF-{}", doc.proforma_number),
    );
    writer.gap(2.0);
    client_block(
        &mut writer,
        &doc.client,
        "Emisión:",
        &format_date(doc.fecha_emision.date_naive()),
    );

    writer.line(11.0, true, "DATOS DEL MUESTREO");
    for (label, value) in [
        ("Tomado por:", doc.tomado_por.as_str()),
        ("Procedimiento:", doc.procedimiento.as_str()),
        ("Analizado por:", doc.analizado_por.as_str()),
    ] {
        writer.row(9.0, false, &[(0.0, 30.0, label), (32.0, 145.0, value)]);
    }
    writer.gap(3.0);

    writer.line(11.0, true, "RESULTADOS");
    let header = ["UNIDAD", "MÉTODO", "RESULTADO", "LÍMITE", "INCERTIDUMBRE"];
    let cells: Vec<(f32, f32, &str)> = RESULT_COLUMNS
        .iter()
        .zip(header.iter())
        .map(|((x, w), text)| (*x, *w, *text))
        .collect();
    writer.row(8.0, true, &cells);

    for (parameter, rows) in doc.groups() {
        writer.line(9.0, true, parameter);
        for row in rows {
            let values = [
                row.unit.as_str(),
                row.method.as_str(),
                row.resultados.as_str(),
                row.limite.as_str(),
                row.incertidumbre.as_str(),
            ];
            let cells: Vec<(f32, f32, &str)> = RESULT_COLUMNS
                .iter()
                .zip(values.iter())
                .map(|((x, w), text)| (*x, *w, *text))
                .collect();
            writer.row(8.0, false, &cells);
        }
    }

    writer.finish()
}
