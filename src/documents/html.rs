use askama::Template;

use super::{format_date, ClientBlock, CompanyHeader, InformeDocument, ProformaDocument, TERMS_AND_CONDITIONS};
use crate::errors::ServiceError;
use crate::money::{format_money, percent_label};

struct RowView {
    parameter: String,
    unit: String,
    method: String,
    technique: String,
    quantity: String,
    unit_price: String,
    subtotal: String,
}

struct GroupView {
    title: String,
    rows: Vec<RowView>,
}

#[derive(Template)]
#[template(path = "proforma.html")]
struct ProformaTemplate<'a> {
    company: &'a CompanyHeader,
    logo: &'a str,
    has_logo: bool,
    number: &'a str,
    date: String,
    status: &'static str,
    created_by: &'a str,
    client: &'a ClientBlock,
    groups: Vec<GroupView>,
    has_lines: bool,
    subtotal: String,
    tax_percent: String,
    tax_amount: String,
    total: String,
    terms: &'a [&'a str],
}

struct ResultRowView {
    unit: String,
    method: String,
    resultados: String,
    limite: String,
    incertidumbre: String,
}

struct ResultGroupView {
    parameter: String,
    rows: Vec<ResultRowView>,
}

#[derive(Template)]
#[template(path = "informe.html")]
struct InformeTemplate<'a> {
    company: &'a CompanyHeader,
    logo: &'a str,
    has_logo: bool,
    proforma_number: &'a str,
    fecha_emision: String,
    client: &'a ClientBlock,
    tomado_por: &'a str,
    procedimiento: &'a str,
    analizado_por: &'a str,
    groups: Vec<ResultGroupView>,
    has_results: bool,
}

pub(super) fn render_proforma(doc: &ProformaDocument) -> Result<String, ServiceError> {
    let groups = doc
        .groups()
        .into_iter()
        .map(|group| GroupView {
            title: group.title,
            rows: group
                .lines
                .into_iter()
                .map(|line| RowView {
                    parameter: line.parameter.clone(),
                    unit: line.unit.clone(),
                    method: line.method.clone(),
                    technique: line.technique.clone(),
                    quantity: line.quantity.to_string(),
                    unit_price: format_money(line.unit_price),
                    subtotal: format_money(line.subtotal),
                })
                .collect(),
        })
        .collect::<Vec<_>>();

    let logo = doc.company.logo.as_deref().unwrap_or("");
    ProformaTemplate {
        company: &doc.company,
        logo,
        has_logo: !logo.is_empty(),
        number: &doc.number,
        date: format_date(doc.date),
        status: doc.status.label(),
        created_by: doc.created_by.as_deref().unwrap_or(""),
        client: &doc.client,
        has_lines: !groups.is_empty(),
        groups,
        subtotal: format_money(doc.totals.subtotal),
        tax_percent: percent_label(doc.tax_rate),
        tax_amount: format_money(doc.totals.tax_amount),
        total: format_money(doc.totals.total),
        terms: &TERMS_AND_CONDITIONS,
    }
    .render()
    .map_err(|e| ServiceError::RenderError(e.to_string()))
}

pub(super) fn render_informe(doc: &InformeDocument) -> Result<String, ServiceError> {
    let groups = doc
        .groups()
        .into_iter()
        .map(|(parameter, rows)| ResultGroupView {
            parameter: parameter.to_string(),
            rows: rows
                .into_iter()
                .map(|row| ResultRowView {
                    unit: row.unit.clone(),
                    method: row.method.clone(),
                    resultados: row.resultados.clone(),
                    limite: row.limite.clone(),
                    incertidumbre: row.incertidumbre.clone(),
                })
                .collect(),
        })
        .collect::<Vec<_>>();

    let logo = doc.company.logo.as_deref().unwrap_or("");
    InformeTemplate {
        company: &doc.company,
        logo,
        has_logo: !logo.is_empty(),
        proforma_number: &doc.proforma_number,
        fecha_emision: format_date(doc.fecha_emision.date_naive()),
        client: &doc.client,
        tomado_por: &doc.tomado_por,
        procedimiento: &doc.procedimiento,
        analizado_por: &doc.analizado_por,
        has_results: !groups.is_empty(),
        groups,
    }
    .render()
    .map_err(|e| ServiceError::RenderError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::super::tests::sample_proforma;
    use super::*;

    #[test]
    fn proforma_html_has_fixed_sections() {
        let html = render_proforma(&sample_proforma()).unwrap();
        assert!(html.contains("PROFORMA N° PRF-0001"));
        assert!(html.contains("DATOS DEL CLIENTE"));
        assert!(html.contains("DETALLE DE SERVICIOS"));
        assert!(html.contains("05/03/2024"));
        assert!(html.contains("SUBTOTAL:"));
        assert!(html.contains("IVA (12%):"));
        assert!(html.contains("$280.00"));
        assert!(html.contains("$30.00"));
        assert!(html.contains("TÉRMINOS Y CONDICIONES"));
    }

    #[test]
    fn proforma_html_escapes_client_data() {
        let html = render_proforma(&sample_proforma()).unwrap();
        assert!(html.contains("Acme &lt;S.A.&gt;"));
        assert!(!html.contains("Acme <S.A.>"));
    }

    #[test]
    fn empty_proforma_still_renders_totals() {
        let mut doc = sample_proforma();
        doc.lines.clear();
        doc.totals = crate::money::Totals::compute(Vec::new(), doc.tax_rate).unwrap();
        let html = render_proforma(&doc).unwrap();
        assert!(html.contains("$0.00"));
    }
}
