//! Proforma and informe documents.
//!
//! Services assemble a [`ProformaDocument`] or [`InformeDocument`] from the
//! database (or, for previews, from an unsaved request) and hand it to the
//! [`DocumentRenderer`], which produces HTML through askama templates or PDF
//! bytes through printpdf, and writes PDFs under the configured output dir.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::{info, instrument};

use crate::entities::{client, company_settings, Category, ProformaStatus};
use crate::errors::ServiceError;
use crate::money::Totals;

mod html;
mod pdf;

/// Conditions printed at the bottom of every proforma
pub const TERMS_AND_CONDITIONS: [&str; 5] = [
    "Esta proforma tiene una validez de 30 días a partir de la fecha de emisión.",
    "Los precios están expresados en dólares de los Estados Unidos de América.",
    "Los resultados se entregarán en un plazo de 5 a 10 días hábiles.",
    "El pago se realizará contra entrega de los resultados.",
    "Los análisis se realizan según métodos normalizados.",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyHeader {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub ruc: String,
    pub logo: Option<String>,
}

impl From<&company_settings::Model> for CompanyHeader {
    fn from(settings: &company_settings::Model) -> Self {
        Self {
            name: settings.company_name.clone(),
            address: settings.company_address.clone(),
            phone: settings.company_phone.clone(),
            email: settings.company_email.clone(),
            ruc: settings.company_ruc.clone(),
            logo: settings.company_logo.clone(),
        }
    }
}

/// Client data as printed; absent values are empty strings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientBlock {
    pub name: String,
    pub ruc: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub contact: String,
}

impl From<&client::Model> for ClientBlock {
    fn from(client: &client::Model) -> Self {
        Self {
            name: client.name.clone(),
            ruc: client.ruc.clone().unwrap_or_default(),
            address: client.address.clone().unwrap_or_default(),
            phone: client.phone.clone().unwrap_or_default(),
            email: client.email.clone().unwrap_or_default(),
            contact: client.contact_person.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProformaLine {
    pub category: Category,
    pub parameter: String,
    pub unit: String,
    pub method: String,
    pub technique: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

/// A proforma ready to render. Built from stored rows or, for previews,
/// from an unsaved request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProformaDocument {
    pub company: CompanyHeader,
    pub number: String,
    pub date: NaiveDate,
    pub status: ProformaStatus,
    pub created_by: Option<String>,
    pub client: ClientBlock,
    pub lines: Vec<ProformaLine>,
    pub totals: Totals,
    pub tax_rate: Decimal,
}

/// Lines sharing a category, in category order
#[derive(Debug)]
pub struct LineGroup<'a> {
    pub title: String,
    pub lines: Vec<&'a ProformaLine>,
}

impl ProformaDocument {
    pub fn groups(&self) -> Vec<LineGroup<'_>> {
        Category::ALL
            .iter()
            .filter_map(|category| {
                let lines: Vec<&ProformaLine> = self
                    .lines
                    .iter()
                    .filter(|line| line.category == *category)
                    .collect();
                (!lines.is_empty()).then(|| LineGroup {
                    title: category.label().to_uppercase(),
                    lines,
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultadoLine {
    pub parameter: String,
    pub unit: String,
    pub method: String,
    pub resultados: String,
    pub limite: String,
    pub incertidumbre: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InformeDocument {
    pub company: CompanyHeader,
    pub proforma_number: String,
    pub fecha_emision: DateTime<Utc>,
    pub client: ClientBlock,
    pub tomado_por: String,
    pub procedimiento: String,
    pub analizado_por: String,
    pub resultados: Vec<ResultadoLine>,
}

impl InformeDocument {
    /// Results grouped by parameter, keeping first-appearance order
    pub fn groups(&self) -> Vec<(&str, Vec<&ResultadoLine>)> {
        let mut groups: Vec<(&str, Vec<&ResultadoLine>)> = Vec::new();
        for line in &self.resultados {
            match groups.iter_mut().find(|(name, _)| *name == line.parameter) {
                Some((_, rows)) => rows.push(line),
                None => groups.push((line.parameter.as_str(), vec![line])),
            }
        }
        groups
    }
}

/// `dd/mm/YYYY`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// Renders documents and stores generated PDFs.
#[derive(Debug, Clone)]
pub struct DocumentRenderer {
    output_dir: PathBuf,
}

impl DocumentRenderer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn proforma_html(&self, doc: &ProformaDocument) -> Result<String, ServiceError> {
        html::render_proforma(doc)
    }

    pub fn informe_html(&self, doc: &InformeDocument) -> Result<String, ServiceError> {
        html::render_informe(doc)
    }

    pub async fn proforma_pdf(&self, doc: &ProformaDocument) -> Result<Vec<u8>, ServiceError> {
        let logo = load_logo(doc.company.logo.as_deref()).await?;
        let doc = doc.clone();
        tokio::task::spawn_blocking(move || pdf::render_proforma(&doc, logo.as_deref()))
            .await
            .map_err(|e| ServiceError::RenderError(format!("render task failed: {}", e)))?
    }

    pub async fn informe_pdf(&self, doc: &InformeDocument) -> Result<Vec<u8>, ServiceError> {
        let logo = load_logo(doc.company.logo.as_deref()).await?;
        let doc = doc.clone();
        tokio::task::spawn_blocking(move || pdf::render_informe(&doc, logo.as_deref()))
            .await
            .map_err(|e| ServiceError::RenderError(format!("render task failed: {}", e)))?
    }

    /// Writes `{output_dir}/{number}.pdf` and returns its path
    #[instrument(skip(self, doc), fields(number = %doc.number))]
    pub async fn write_proforma_pdf(&self, doc: &ProformaDocument) -> Result<PathBuf, ServiceError> {
        let bytes = self.proforma_pdf(doc).await?;
        let path = self.output_dir.join(pdf_file_name(&doc.number));
        self.write_file(&path, &bytes).await?;
        info!(path = %path.display(), "proforma PDF written");
        Ok(path)
    }

    /// Writes `{output_dir}/INF-{proforma_number}.pdf` and returns its path
    #[instrument(skip(self, doc), fields(number = %doc.proforma_number))]
    pub async fn write_informe_pdf(&self, doc: &InformeDocument) -> Result<PathBuf, ServiceError> {
        let bytes = self.informe_pdf(doc).await?;
        let path = self
            .output_dir
            .join(pdf_file_name(&format!("INF-{}", doc.proforma_number)));
        self.write_file(&path, &bytes).await?;
        info!(path = %path.display(), "informe PDF written");
        Ok(path)
    }

    async fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<(), ServiceError> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| ServiceError::RenderError(format!("cannot create output dir: {}", e)))?;
        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| ServiceError::RenderError(format!("cannot write {}: {}", path.display(), e)))
    }
}

async fn load_logo(logo: Option<&str>) -> Result<Option<Vec<u8>>, ServiceError> {
    match logo.map(str::trim).filter(|path| !path.is_empty()) {
        Some(path) => tokio::fs::read(path)
            .await
            .map(Some)
            .map_err(|e| ServiceError::RenderError(format!("logo {} unreadable: {}", path, e))),
        None => Ok(None),
    }
}

/// Document numbers come from a configurable prefix; keep file names tame.
fn pdf_file_name(stem: &str) -> String {
    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}.pdf", cleaned)
}
