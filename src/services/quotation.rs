//! Proformas and their analysis lines.
//!
//! Every write that touches a line runs in a transaction that ends with
//! [`recalculate_totals`], so a committed proforma always satisfies
//! `subtotal = Σ line subtotals`, `tax_amount = round(subtotal × rate)` and
//! `total = subtotal + tax_amount`. When document generation on write is
//! enabled the stored PDF is regenerated after commit; a rendering failure is
//! logged and clears `pdf_path` but never fails the write.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::{non_blank, settings};
use crate::db::DbPool;
use crate::documents::{ClientBlock, CompanyHeader, DocumentRenderer, ProformaDocument, ProformaLine};
use crate::entities::{
    analysis, client, informe, method, parameter, proforma, resultado, technique, Category,
    ProformaStatus,
};
use crate::errors::{flatten_validation_errors, ServiceError};
use crate::money::{line_subtotal, round_money, round_rate, Totals, MAX_UNIT_PRICE};

const PROFORMA_NOT_FOUND: &str = "Proforma no encontrada";
const ANALYSIS_NOT_FOUND: &str = "Análisis no encontrado";

fn validate_unit_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() {
        let mut err = ValidationError::new("negative_price");
        err.message = Some("El precio unitario no puede ser negativo".into());
        return Err(err);
    }
    if *price > MAX_UNIT_PRICE {
        let mut err = ValidationError::new("price_too_large");
        err.message = Some("El precio unitario excede el máximo admitido".into());
        return Err(err);
    }
    Ok(())
}

/// One requested analysis line. Unit and price fall back to the
/// parameter's defaults; quantity defaults to 1.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LineItemInput {
    pub parameter_id: Uuid,
    pub method_id: Uuid,
    pub technique_id: Option<Uuid>,
    #[validate(length(max = 50, message = "La unidad admite máximo 50 caracteres"))]
    pub unit: Option<String>,
    #[validate(custom = "validate_unit_price")]
    #[schema(value_type = Option<String>, example = "25.00")]
    pub unit_price: Option<Decimal>,
    #[validate(range(min = 1, max = 1000000, message = "La cantidad debe estar entre 1 y 1000000"))]
    pub quantity: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateProformaRequest {
    pub client_id: Uuid,
    /// Defaults to today
    pub date: Option<NaiveDate>,
    pub status: Option<ProformaStatus>,
    #[serde(default)]
    pub analyses: Vec<LineItemInput>,
}

/// Partial update of a stored line
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateLineItemRequest {
    pub parameter_id: Option<Uuid>,
    pub method_id: Option<Uuid>,
    pub technique_id: Option<Uuid>,
    /// Drops the line's technique; ignored when `technique_id` is given
    #[serde(default)]
    pub clear_technique: bool,
    #[validate(length(max = 50, message = "La unidad admite máximo 50 caracteres"))]
    pub unit: Option<String>,
    #[validate(custom = "validate_unit_price")]
    #[schema(value_type = Option<String>)]
    pub unit_price: Option<Decimal>,
    #[validate(range(min = 1, max = 1000000, message = "La cantidad debe estar entre 1 y 1000000"))]
    pub quantity: Option<i32>,
}

/// Body of `POST /analysis`
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewAnalysisRequest {
    pub proforma_id: Uuid,
    #[serde(flatten)]
    pub item: LineItemInput,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AnalysisOrder {
    pub id: Uuid,
    pub order: i32,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ReorderRequest {
    pub analysis_orders: Vec<AnalysisOrder>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct StatusRequest {
    pub status: ProformaStatus,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProformaListQuery {
    pub client_id: Option<Uuid>,
    pub status: Option<ProformaStatus>,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LineItemListQuery {
    pub proforma_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnalysisResponse {
    pub id: Uuid,
    pub proforma_id: Uuid,
    pub parameter_id: Uuid,
    pub parameter_name: String,
    pub category: Category,
    pub category_display: String,
    pub method_id: Uuid,
    pub method_name: String,
    pub technique_id: Option<Uuid>,
    pub technique_name: Option<String>,
    pub unit: Option<String>,
    #[schema(value_type = String)]
    pub unit_price: Decimal,
    pub quantity: i32,
    #[schema(value_type = String)]
    pub subtotal: Decimal,
    pub order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProformaSummary {
    pub id: Uuid,
    pub proforma_number: String,
    pub client_id: Uuid,
    pub client_name: String,
    pub date: NaiveDate,
    pub status: ProformaStatus,
    pub status_display: String,
    #[schema(value_type = String)]
    pub subtotal: Decimal,
    #[schema(value_type = String)]
    pub tax_amount: Decimal,
    #[schema(value_type = String)]
    pub total: Decimal,
    pub created_by: Option<String>,
    pub pdf_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProformaSummary {
    fn new(model: proforma::Model, client_name: String) -> Self {
        Self {
            id: model.id,
            proforma_number: model.proforma_number,
            client_id: model.client_id,
            client_name,
            date: model.date,
            status_display: model.status.label().to_string(),
            status: model.status,
            subtotal: round_money(model.subtotal),
            tax_amount: round_money(model.tax_amount),
            total: round_money(model.total),
            created_by: model.created_by,
            pdf_path: model.pdf_path,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProformaDetail {
    #[serde(flatten)]
    pub proforma: ProformaSummary,
    #[schema(value_type = String)]
    pub tax_rate: Decimal,
    pub analyses: Vec<AnalysisResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InformeAnalysisData {
    pub parameter: String,
    pub unit: Option<String>,
    pub method: String,
}

/// Data a user needs to start writing an informe for a proforma
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InformeSummaryResponse {
    pub proforma_id: Uuid,
    pub proforma_number: String,
    pub date: NaiveDate,
    pub created_by: Option<String>,
    pub client_name: String,
    pub client_ruc: Option<String>,
    pub client_address: Option<String>,
    pub client_email: Option<String>,
    pub client_contact: Option<String>,
    pub analysis_data: Vec<InformeAnalysisData>,
}

/// Stored PDF ready to stream
#[derive(Debug, Clone)]
pub struct PdfFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// A line with the catalog entries it points at
#[derive(Debug, Clone)]
struct LineRecord {
    line: analysis::Model,
    parameter: parameter::Model,
    method: method::Model,
    technique: Option<technique::Model>,
}

impl LineRecord {
    fn to_response(&self) -> AnalysisResponse {
        AnalysisResponse {
            id: self.line.id,
            proforma_id: self.line.proforma_id,
            parameter_id: self.parameter.id,
            parameter_name: self.parameter.name.clone(),
            category: self.parameter.category,
            category_display: self.parameter.category.label().to_string(),
            method_id: self.method.id,
            method_name: self.method.name.clone(),
            technique_id: self.technique.as_ref().map(|t| t.id),
            technique_name: self.technique.as_ref().map(|t| t.name.clone()),
            unit: self.line.unit.clone(),
            unit_price: round_money(self.line.unit_price),
            quantity: self.line.quantity,
            subtotal: round_money(self.line.subtotal),
            order: self.line.position,
        }
    }

    fn to_document_line(&self) -> ProformaLine {
        ProformaLine {
            category: self.parameter.category,
            parameter: self.parameter.name.clone(),
            unit: self.line.unit.clone().unwrap_or_default(),
            method: self.method.name.clone(),
            technique: self
                .technique
                .as_ref()
                .map(|t| t.name.clone())
                .unwrap_or_default(),
            quantity: self.line.quantity,
            unit_price: round_money(self.line.unit_price),
            subtotal: round_money(self.line.subtotal),
        }
    }
}

/// A requested line checked against the catalog
#[derive(Debug, Clone)]
struct ResolvedLine {
    parameter: parameter::Model,
    method: method::Model,
    technique: Option<technique::Model>,
    unit: Option<String>,
    unit_price: Decimal,
    quantity: i32,
}

impl ResolvedLine {
    fn to_document_line(&self) -> Result<ProformaLine, ServiceError> {
        Ok(ProformaLine {
            category: self.parameter.category,
            parameter: self.parameter.name.clone(),
            unit: self.unit.clone().unwrap_or_default(),
            method: self.method.name.clone(),
            technique: self
                .technique
                .as_ref()
                .map(|t| t.name.clone())
                .unwrap_or_default(),
            quantity: self.quantity,
            unit_price: self.unit_price,
            subtotal: line_subtotal(self.unit_price, self.quantity)?,
        })
    }
}

/// Validates each requested line, prefixing problems with the line index
fn validate_items(items: &[LineItemInput]) -> Result<(), ServiceError> {
    let problems: Vec<String> = items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| item.validate().err().map(|errors| (index, errors)))
        .flat_map(|(index, errors)| {
            flatten_validation_errors(&errors)
                .into_iter()
                .map(move |message| format!("analyses[{}].{}", index, message))
        })
        .collect();

    if problems.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::FieldErrors(problems))
    }
}

fn category_mismatch(what: &str) -> ServiceError {
    ServiceError::ValidationError(format!(
        "{} no corresponde a la categoría del parámetro",
        what
    ))
}

async fn load_parameter<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<parameter::Model, ServiceError> {
    parameter::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::ValidationError(format!("Parámetro inexistente: {}", id)))
}

async fn load_method<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    category: Category,
) -> Result<method::Model, ServiceError> {
    let method = method::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::ValidationError(format!("Método inexistente: {}", id)))?;
    if method.category != category {
        return Err(category_mismatch("El método"));
    }
    Ok(method)
}

async fn load_technique<C: ConnectionTrait>(
    conn: &C,
    id: Option<Uuid>,
    category: Category,
) -> Result<Option<technique::Model>, ServiceError> {
    let Some(id) = id else {
        return Ok(None);
    };
    let technique = technique::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::ValidationError(format!("Técnica inexistente: {}", id)))?;
    if technique.category != category {
        return Err(category_mismatch("La técnica"));
    }
    Ok(Some(technique))
}

async fn resolve_line<C: ConnectionTrait>(
    conn: &C,
    item: &LineItemInput,
) -> Result<ResolvedLine, ServiceError> {
    let parameter = load_parameter(conn, item.parameter_id).await?;
    let method = load_method(conn, item.method_id, parameter.category).await?;
    let technique = load_technique(conn, item.technique_id, parameter.category).await?;

    let unit_price = item
        .unit_price
        .or(parameter.default_price)
        .map(round_money)
        .ok_or_else(|| {
            ServiceError::ValidationError(format!(
                "Precio unitario requerido para {}",
                parameter.name
            ))
        })?;
    let unit = non_blank(item.unit.clone()).or_else(|| parameter.default_unit.clone());

    Ok(ResolvedLine {
        unit,
        unit_price,
        quantity: item.quantity.unwrap_or(1),
        parameter,
        method,
        technique,
    })
}

async fn insert_line<C: ConnectionTrait>(
    conn: &C,
    proforma_id: Uuid,
    position: i32,
    line: &ResolvedLine,
) -> Result<analysis::Model, ServiceError> {
    // subtotal and timestamps are filled in by before_save
    let model = analysis::ActiveModel {
        id: Set(Uuid::new_v4()),
        proforma_id: Set(proforma_id),
        parameter_id: Set(line.parameter.id),
        method_id: Set(line.method.id),
        technique_id: Set(line.technique.as_ref().map(|t| t.id)),
        unit: Set(line.unit.clone()),
        unit_price: Set(line.unit_price),
        quantity: Set(line.quantity),
        position: Set(position),
        ..Default::default()
    }
    .insert(conn)
    .await?;
    Ok(model)
}

async fn find_proforma<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<proforma::Model, ServiceError> {
    proforma::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(PROFORMA_NOT_FOUND.to_string()))
}

async fn find_client<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<client::Model, ServiceError> {
    client::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Cliente no encontrado".to_string()))
}

/// Lines matching `condition`, joined with their catalog entries and
/// ordered by position within each proforma.
async fn load_line_records<C: ConnectionTrait>(
    conn: &C,
    condition: Condition,
) -> Result<Vec<LineRecord>, ServiceError> {
    let lines = analysis::Entity::find()
        .filter(condition)
        .order_by_asc(analysis::Column::ProformaId)
        .order_by_asc(analysis::Column::Position)
        .order_by_asc(analysis::Column::CreatedAt)
        .all(conn)
        .await?;
    if lines.is_empty() {
        return Ok(Vec::new());
    }

    let parameter_ids: HashSet<Uuid> = lines.iter().map(|l| l.parameter_id).collect();
    let method_ids: HashSet<Uuid> = lines.iter().map(|l| l.method_id).collect();
    let technique_ids: HashSet<Uuid> = lines.iter().filter_map(|l| l.technique_id).collect();

    let parameters: HashMap<Uuid, parameter::Model> = parameter::Entity::find()
        .filter(parameter::Column::Id.is_in(parameter_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();
    let methods: HashMap<Uuid, method::Model> = method::Entity::find()
        .filter(method::Column::Id.is_in(method_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|m| (m.id, m))
        .collect();
    let techniques: HashMap<Uuid, technique::Model> = if technique_ids.is_empty() {
        HashMap::new()
    } else {
        technique::Entity::find()
            .filter(technique::Column::Id.is_in(technique_ids))
            .all(conn)
            .await?
            .into_iter()
            .map(|t| (t.id, t))
            .collect()
    };

    lines
        .into_iter()
        .map(|line| {
            let parameter = parameters.get(&line.parameter_id).cloned().ok_or_else(|| {
                ServiceError::InternalError(format!("analysis {} lost its parameter", line.id))
            })?;
            let method = methods.get(&line.method_id).cloned().ok_or_else(|| {
                ServiceError::InternalError(format!("analysis {} lost its method", line.id))
            })?;
            let technique = line.technique_id.and_then(|id| techniques.get(&id).cloned());
            Ok(LineRecord {
                line,
                parameter,
                method,
                technique,
            })
        })
        .collect()
}

async fn lines_of<C: ConnectionTrait>(
    conn: &C,
    proforma_id: Uuid,
) -> Result<Vec<LineRecord>, ServiceError> {
    load_line_records(
        conn,
        Condition::all().add(analysis::Column::ProformaId.eq(proforma_id)),
    )
    .await
}

async fn line_response<C: ConnectionTrait>(
    conn: &C,
    analysis_id: Uuid,
) -> Result<AnalysisResponse, ServiceError> {
    load_line_records(conn, Condition::all().add(analysis::Column::Id.eq(analysis_id)))
        .await?
        .first()
        .map(LineRecord::to_response)
        .ok_or_else(|| ServiceError::NotFound(ANALYSIS_NOT_FOUND.to_string()))
}

/// Recomputes and stores the proforma totals from its current lines using
/// the tax rate in effect.
pub async fn recalculate_totals<C: ConnectionTrait>(
    conn: &C,
    proforma_id: Uuid,
) -> Result<proforma::Model, ServiceError> {
    let proforma = find_proforma(conn, proforma_id).await?;
    let subtotals: Vec<Decimal> = analysis::Entity::find()
        .filter(analysis::Column::ProformaId.eq(proforma_id))
        .all(conn)
        .await?
        .into_iter()
        .map(|line| line.subtotal)
        .collect();
    let rate = settings::current_tax_rate(conn).await?;
    let totals = Totals::compute(subtotals, rate)?;

    let mut active: proforma::ActiveModel = proforma.into();
    active.subtotal = Set(totals.subtotal);
    active.tax_amount = Set(totals.tax_amount);
    active.total = Set(totals.total);
    let updated = active.update(conn).await?;
    debug!(%proforma_id, total = %totals.total, "proforma totals recalculated");
    Ok(updated)
}

/// Assembles the printable document for a stored proforma
pub async fn build_document<C: ConnectionTrait>(
    conn: &C,
    proforma: &proforma::Model,
) -> Result<ProformaDocument, ServiceError> {
    let client = find_client(conn, proforma.client_id).await?;
    let company = settings::get_or_create(conn).await?;
    let lines = lines_of(conn, proforma.id).await?;

    Ok(ProformaDocument {
        company: CompanyHeader::from(&company),
        number: proforma.proforma_number.clone(),
        date: proforma.date,
        status: proforma.status,
        created_by: proforma.created_by.clone(),
        client: ClientBlock::from(&client),
        lines: lines.iter().map(LineRecord::to_document_line).collect(),
        totals: Totals {
            subtotal: round_money(proforma.subtotal),
            tax_amount: round_money(proforma.tax_amount),
            total: round_money(proforma.total),
        },
        tax_rate: round_rate(company.tax_rate),
    })
}

/// Service for proformas and their analysis lines
#[derive(Clone)]
pub struct QuotationService {
    db_pool: Arc<DbPool>,
    renderer: DocumentRenderer,
    generate_on_write: bool,
}

impl QuotationService {
    pub fn new(db_pool: Arc<DbPool>, renderer: DocumentRenderer, generate_on_write: bool) -> Self {
        Self {
            db_pool,
            renderer,
            generate_on_write,
        }
    }

    /// Creates a proforma with its lines. The number is claimed inside the
    /// same transaction, so a failed creation does not consume it.
    #[instrument(skip(self, request), fields(client_id = %request.client_id))]
    pub async fn create_proforma(
        &self,
        request: CreateProformaRequest,
        created_by: Option<String>,
    ) -> Result<ProformaDetail, ServiceError> {
        validate_items(&request.analyses)?;

        let txn = self.db_pool.begin().await?;
        let client = client::Entity::find_by_id(request.client_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::ValidationError("Cliente inexistente".to_string()))?;

        let mut resolved = Vec::with_capacity(request.analyses.len());
        for item in &request.analyses {
            resolved.push(resolve_line(&txn, item).await?);
        }

        let number = settings::claim_proforma_number(&txn).await?;
        let proforma = proforma::ActiveModel {
            id: Set(Uuid::new_v4()),
            client_id: Set(client.id),
            proforma_number: Set(number),
            date: Set(request.date.unwrap_or_else(|| Utc::now().date_naive())),
            status: Set(request.status.unwrap_or_default()),
            subtotal: Set(Decimal::ZERO),
            tax_amount: Set(Decimal::ZERO),
            total: Set(Decimal::ZERO),
            created_by: Set(created_by),
            pdf_path: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| ServiceError::from_unique_violation(e, "Número de proforma duplicado"))?;

        for (position, line) in resolved.iter().enumerate() {
            insert_line(&txn, proforma.id, position as i32, line).await?;
        }
        let proforma = recalculate_totals(&txn, proforma.id).await?;
        txn.commit().await?;

        info!(
            proforma_id = %proforma.id,
            number = %proforma.proforma_number,
            lines = resolved.len(),
            "proforma created"
        );
        self.refresh_pdf(proforma.id).await;
        self.get_proforma(proforma.id).await
    }

    #[instrument(skip(self))]
    pub async fn list_proformas(
        &self,
        query: ProformaListQuery,
    ) -> Result<Vec<ProformaSummary>, ServiceError> {
        let mut select = proforma::Entity::find()
            .find_also_related(client::Entity)
            .order_by_desc(proforma::Column::CreatedAt);
        if let Some(client_id) = query.client_id {
            select = select.filter(proforma::Column::ClientId.eq(client_id));
        }
        if let Some(status) = query.status {
            select = select.filter(proforma::Column::Status.eq(status));
        }

        let rows = select.all(&*self.db_pool).await?;
        Ok(rows
            .into_iter()
            .map(|(proforma, client)| {
                ProformaSummary::new(proforma, client.map(|c| c.name).unwrap_or_default())
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn get_proforma(&self, id: Uuid) -> Result<ProformaDetail, ServiceError> {
        let conn = &*self.db_pool;
        let proforma = find_proforma(conn, id).await?;
        let client = find_client(conn, proforma.client_id).await?;
        let lines = lines_of(conn, id).await?;
        let tax_rate = settings::current_tax_rate(conn).await?;

        Ok(ProformaDetail {
            proforma: ProformaSummary::new(proforma, client.name),
            tax_rate: round_rate(tax_rate),
            analyses: lines.iter().map(LineRecord::to_response).collect(),
        })
    }

    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        id: Uuid,
        status: ProformaStatus,
    ) -> Result<ProformaSummary, ServiceError> {
        let conn = &*self.db_pool;
        let proforma = find_proforma(conn, id).await?;
        let client = find_client(conn, proforma.client_id).await?;

        let mut active: proforma::ActiveModel = proforma.into();
        active.status = Set(status);
        let updated = active.update(conn).await?;
        info!(proforma_id = %id, status = status.label(), "proforma status changed");

        self.refresh_pdf(id).await;
        Ok(ProformaSummary::new(updated, client.name))
    }

    /// Deletes a proforma with its lines and informe, then removes the
    /// generated files.
    #[instrument(skip(self))]
    pub async fn delete_proforma(&self, id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db_pool.begin().await?;
        let proforma = find_proforma(&txn, id).await?;
        let informe = informe::Entity::find()
            .filter(informe::Column::ProformaId.eq(id))
            .one(&txn)
            .await?;

        if let Some(informe) = &informe {
            resultado::Entity::delete_many()
                .filter(resultado::Column::InformeId.eq(informe.id))
                .exec(&txn)
                .await?;
            informe::Entity::delete_by_id(informe.id).exec(&txn).await?;
        }
        analysis::Entity::delete_many()
            .filter(analysis::Column::ProformaId.eq(id))
            .exec(&txn)
            .await?;
        proforma::Entity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;

        let files = proforma
            .pdf_path
            .iter()
            .chain(informe.iter().flat_map(|i| i.pdf_path.iter()));
        for path in files {
            if let Err(e) = tokio::fs::remove_file(path).await {
                debug!(%path, error = %e, "generated file not removed");
            }
        }
        info!(proforma_id = %id, number = %proforma.proforma_number, "proforma deleted");
        Ok(())
    }

    /// Appends a line with `order` equal to the current line count
    #[instrument(skip(self, item))]
    pub async fn add_line_item(
        &self,
        proforma_id: Uuid,
        item: LineItemInput,
    ) -> Result<AnalysisResponse, ServiceError> {
        item.validate()?;

        let txn = self.db_pool.begin().await?;
        find_proforma(&txn, proforma_id).await?;
        let resolved = resolve_line(&txn, &item).await?;
        let position = analysis::Entity::find()
            .filter(analysis::Column::ProformaId.eq(proforma_id))
            .count(&txn)
            .await?;
        let line = insert_line(&txn, proforma_id, position as i32, &resolved).await?;
        recalculate_totals(&txn, proforma_id).await?;
        txn.commit().await?;

        info!(%proforma_id, analysis_id = %line.id, "analysis line added");
        self.refresh_pdf(proforma_id).await;
        line_response(&*self.db_pool, line.id).await
    }

    /// Removes one line of a proforma and returns the updated proforma
    #[instrument(skip(self))]
    pub async fn remove_line_item(
        &self,
        proforma_id: Uuid,
        analysis_id: Option<Uuid>,
    ) -> Result<ProformaDetail, ServiceError> {
        let txn = self.db_pool.begin().await?;
        find_proforma(&txn, proforma_id).await?;
        let analysis_id = analysis_id
            .ok_or_else(|| ServiceError::ValidationError("analysis_id requerido".to_string()))?;
        let line = analysis::Entity::find_by_id(analysis_id)
            .one(&txn)
            .await?
            .filter(|line| line.proforma_id == proforma_id)
            .ok_or_else(|| ServiceError::NotFound(ANALYSIS_NOT_FOUND.to_string()))?;

        analysis::Entity::delete_by_id(line.id).exec(&txn).await?;
        recalculate_totals(&txn, proforma_id).await?;
        txn.commit().await?;

        info!(%proforma_id, %analysis_id, "analysis line removed");
        self.refresh_pdf(proforma_id).await;
        self.get_proforma(proforma_id).await
    }

    #[instrument(skip(self))]
    pub async fn list_line_items(
        &self,
        query: LineItemListQuery,
    ) -> Result<Vec<AnalysisResponse>, ServiceError> {
        let mut condition = Condition::all();
        if let Some(proforma_id) = query.proforma_id {
            condition = condition.add(analysis::Column::ProformaId.eq(proforma_id));
        }
        let lines = load_line_records(&*self.db_pool, condition).await?;
        Ok(lines.iter().map(LineRecord::to_response).collect())
    }

    #[instrument(skip(self))]
    pub async fn get_line_item(&self, analysis_id: Uuid) -> Result<AnalysisResponse, ServiceError> {
        line_response(&*self.db_pool, analysis_id).await
    }

    #[instrument(skip(self, request))]
    pub async fn create_line_item(
        &self,
        request: NewAnalysisRequest,
    ) -> Result<AnalysisResponse, ServiceError> {
        self.add_line_item(request.proforma_id, request.item).await
    }

    /// Partial update; the line's category rules are checked against the
    /// resulting parameter, method and technique.
    #[instrument(skip(self, request))]
    pub async fn update_line_item(
        &self,
        analysis_id: Uuid,
        request: UpdateLineItemRequest,
    ) -> Result<AnalysisResponse, ServiceError> {
        request.validate()?;

        let txn = self.db_pool.begin().await?;
        let line = analysis::Entity::find_by_id(analysis_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(ANALYSIS_NOT_FOUND.to_string()))?;
        let proforma_id = line.proforma_id;

        let parameter =
            load_parameter(&txn, request.parameter_id.unwrap_or(line.parameter_id)).await?;
        let method = load_method(
            &txn,
            request.method_id.unwrap_or(line.method_id),
            parameter.category,
        )
        .await?;
        let technique = load_technique(
            &txn,
            match (request.technique_id, request.clear_technique) {
                (Some(id), _) => Some(id),
                (None, true) => None,
                (None, false) => line.technique_id,
            },
            parameter.category,
        )
        .await?;

        let mut active: analysis::ActiveModel = line.into();
        active.parameter_id = Set(parameter.id);
        active.method_id = Set(method.id);
        active.technique_id = Set(technique.map(|t| t.id));
        if request.unit.is_some() {
            active.unit = Set(non_blank(request.unit));
        }
        if let Some(price) = request.unit_price {
            active.unit_price = Set(round_money(price));
        }
        if let Some(quantity) = request.quantity {
            active.quantity = Set(quantity);
        }
        active.update(&txn).await?;
        recalculate_totals(&txn, proforma_id).await?;
        txn.commit().await?;

        info!(%proforma_id, %analysis_id, "analysis line updated");
        self.refresh_pdf(proforma_id).await;
        line_response(&*self.db_pool, analysis_id).await
    }

    #[instrument(skip(self))]
    pub async fn delete_line_item(&self, analysis_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db_pool.begin().await?;
        let line = analysis::Entity::find_by_id(analysis_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(ANALYSIS_NOT_FOUND.to_string()))?;
        analysis::Entity::delete_by_id(analysis_id).exec(&txn).await?;
        recalculate_totals(&txn, line.proforma_id).await?;
        txn.commit().await?;

        self.refresh_pdf(line.proforma_id).await;
        Ok(())
    }

    /// Applies new `order` values. Unknown ids are skipped.
    #[instrument(skip(self, request), fields(entries = request.analysis_orders.len()))]
    pub async fn reorder_line_items(&self, request: ReorderRequest) -> Result<(), ServiceError> {
        let txn = self.db_pool.begin().await?;
        let mut touched = HashSet::new();

        for entry in &request.analysis_orders {
            let Some(line) = analysis::Entity::find_by_id(entry.id).one(&txn).await? else {
                debug!(analysis_id = %entry.id, "reorder skipped unknown analysis");
                continue;
            };
            touched.insert(line.proforma_id);
            let mut active: analysis::ActiveModel = line.into();
            active.position = Set(entry.order);
            active.update(&txn).await?;
        }
        txn.commit().await?;

        for proforma_id in touched {
            self.refresh_pdf(proforma_id).await;
        }
        Ok(())
    }

    /// Renders an unsaved proforma. The number shown is the next one the
    /// counter would hand out; nothing is claimed or stored.
    #[instrument(skip(self, request), fields(client_id = %request.client_id))]
    pub async fn preview_draft(&self, request: CreateProformaRequest) -> Result<String, ServiceError> {
        validate_items(&request.analyses)?;

        let conn = &*self.db_pool;
        let client = client::Entity::find_by_id(request.client_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::ValidationError("Cliente inexistente".to_string()))?;
        let company = settings::get_or_create(conn).await?;

        let mut lines = Vec::with_capacity(request.analyses.len());
        for item in &request.analyses {
            lines.push(resolve_line(conn, item).await?.to_document_line()?);
        }
        let totals = Totals::compute(lines.iter().map(|l| l.subtotal), company.tax_rate)?;

        let doc = ProformaDocument {
            company: CompanyHeader::from(&company),
            number: company.format_number(company.next_proforma_number),
            date: request.date.unwrap_or_else(|| Utc::now().date_naive()),
            status: request.status.unwrap_or_default(),
            created_by: None,
            client: ClientBlock::from(&client),
            lines,
            totals,
            tax_rate: round_rate(company.tax_rate),
        };
        self.renderer.proforma_html(&doc)
    }

    #[instrument(skip(self))]
    pub async fn preview_html(&self, id: Uuid) -> Result<String, ServiceError> {
        let conn = &*self.db_pool;
        let proforma = find_proforma(conn, id).await?;
        let doc = build_document(conn, &proforma).await?;
        self.renderer.proforma_html(&doc)
    }

    /// Serves the stored PDF, generating and storing it first when missing.
    #[instrument(skip(self))]
    pub async fn proforma_pdf(&self, id: Uuid) -> Result<PdfFile, ServiceError> {
        let proforma = find_proforma(&*self.db_pool, id).await?;
        let file_name = format!("{}.pdf", proforma.proforma_number);

        if let Some(path) = &proforma.pdf_path {
            match tokio::fs::read(path).await {
                Ok(bytes) => return Ok(PdfFile { file_name, bytes }),
                Err(e) => warn!(%path, error = %e, "stored PDF unreadable, regenerating"),
            }
        }

        let path = self.write_pdf(&proforma).await?;
        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            ServiceError::RenderError(format!("cannot read {}: {}", path.display(), e))
        })?;
        Ok(PdfFile { file_name, bytes })
    }

    #[instrument(skip(self))]
    pub async fn informe_summary(&self, id: Uuid) -> Result<InformeSummaryResponse, ServiceError> {
        let conn = &*self.db_pool;
        let proforma = find_proforma(conn, id).await?;
        let client = find_client(conn, proforma.client_id).await?;
        let lines = lines_of(conn, id).await?;

        Ok(InformeSummaryResponse {
            proforma_id: proforma.id,
            proforma_number: proforma.proforma_number,
            date: proforma.date,
            created_by: proforma.created_by,
            client_name: client.name,
            client_ruc: client.ruc,
            client_address: client.address,
            client_email: client.email,
            client_contact: client.contact_person,
            analysis_data: lines
                .into_iter()
                .map(|record| InformeAnalysisData {
                    parameter: record.parameter.name,
                    unit: record.line.unit,
                    method: record.method.name,
                })
                .collect(),
        })
    }

    async fn write_pdf(&self, proforma: &proforma::Model) -> Result<PathBuf, ServiceError> {
        let conn = &*self.db_pool;
        let doc = build_document(conn, proforma).await?;
        let path = self.renderer.write_proforma_pdf(&doc).await?;
        proforma::Entity::update_many()
            .col_expr(
                proforma::Column::PdfPath,
                Expr::value(path.to_string_lossy().into_owned()),
            )
            .filter(proforma::Column::Id.eq(proforma.id))
            .exec(conn)
            .await?;
        Ok(path)
    }

    /// Regenerates the stored PDF after a committed write
    async fn refresh_pdf(&self, proforma_id: Uuid) {
        if !self.generate_on_write {
            return;
        }
        let result = match find_proforma(&*self.db_pool, proforma_id).await {
            Ok(proforma) => self.write_pdf(&proforma).await.map(|_| ()),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(%proforma_id, error = %e, "proforma PDF regeneration failed");
            let cleared = proforma::Entity::update_many()
                .col_expr(proforma::Column::PdfPath, Expr::value(Option::<String>::None))
                .filter(proforma::Column::Id.eq(proforma_id))
                .exec(&*self.db_pool)
                .await;
            if let Err(e) = cleared {
                warn!(%proforma_id, error = %e, "stale pdf_path not cleared");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(quantity: Option<i32>, price: Option<Decimal>) -> LineItemInput {
        LineItemInput {
            parameter_id: Uuid::new_v4(),
            method_id: Uuid::new_v4(),
            technique_id: None,
            unit: None,
            unit_price: price,
            quantity,
        }
    }

    #[test]
    fn zero_quantity_is_rejected_with_index() {
        let items = vec![item(Some(1), None), item(Some(0), None)];
        match validate_items(&items) {
            Err(ServiceError::FieldErrors(problems)) => {
                assert_eq!(problems.len(), 1);
                assert!(problems[0].starts_with("analyses[1].quantity"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn negative_price_is_rejected() {
        assert!(validate_items(&[item(None, Some(dec!(-5)))]).is_err());
        assert!(validate_items(&[item(None, Some(dec!(5)))]).is_ok());
    }

    #[test]
    fn reorder_body_uses_order_field() {
        let body = serde_json::json!({
            "analysis_orders": [{ "id": Uuid::nil(), "order": 3 }]
        });
        let request: ReorderRequest = serde_json::from_value(body).unwrap();
        assert_eq!(request.analysis_orders[0].order, 3);
    }

    #[test]
    fn new_analysis_body_is_flat() {
        let body = serde_json::json!({
            "proforma_id": Uuid::nil(),
            "parameter_id": Uuid::nil(),
            "method_id": Uuid::nil(),
            "unit_price": "12.50",
            "quantity": 2
        });
        let request: NewAnalysisRequest = serde_json::from_value(body).unwrap();
        assert_eq!(request.item.unit_price, Some(dec!(12.50)));
        assert_eq!(request.item.quantity, Some(2));
    }
}
