//! Analysis reports ("informes"): at most one per proforma, with ordered
//! result rows and a generated PDF.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::quotation::PdfFile;
use super::{non_blank, settings};
use crate::db::DbPool;
use crate::documents::{ClientBlock, CompanyHeader, DocumentRenderer, InformeDocument, ResultadoLine};
use crate::entities::{client, informe, proforma, resultado};
use crate::errors::{flatten_validation_errors, ServiceError};

const INFORME_NOT_FOUND: &str = "Informe no encontrado";
const DUPLICATE_INFORME: &str = "Ya existe un informe para esta proforma";

fn parameter_present(parameter: &str) -> Result<(), ValidationError> {
    if parameter.trim().is_empty() {
        let mut err = ValidationError::new("required");
        err.message = Some("El parámetro es requerido".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct ResultadoInput {
    #[validate(
        custom = "parameter_present",
        length(max = 200, message = "El parámetro admite máximo 200 caracteres")
    )]
    pub parameter: String,
    #[validate(length(max = 50))]
    pub unit: Option<String>,
    #[validate(length(max = 200))]
    pub method: Option<String>,
    #[validate(length(max = 100))]
    pub resultados: Option<String>,
    #[validate(length(max = 100))]
    pub limite: Option<String>,
    #[validate(length(max = 100))]
    pub incertidumbre: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateInformeRequest {
    pub proforma_id: Uuid,
    /// Defaults to now
    pub fecha_emision: Option<DateTime<Utc>>,
    #[validate(length(max = 100))]
    pub tomado_por: Option<String>,
    pub procedimiento: Option<String>,
    #[validate(length(max = 100))]
    pub analizado_por: Option<String>,
    #[serde(default)]
    pub resultados: Vec<ResultadoInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResultadoResponse {
    pub id: Uuid,
    pub parameter: String,
    pub unit: Option<String>,
    pub method: Option<String>,
    pub resultados: Option<String>,
    pub limite: Option<String>,
    pub incertidumbre: Option<String>,
    pub order: i32,
}

impl From<resultado::Model> for ResultadoResponse {
    fn from(model: resultado::Model) -> Self {
        Self {
            id: model.id,
            parameter: model.parameter,
            unit: model.unit,
            method: model.method,
            resultados: model.resultados,
            limite: model.limite,
            incertidumbre: model.incertidumbre,
            order: model.position,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InformeResponse {
    pub id: Uuid,
    pub proforma_id: Uuid,
    pub proforma_number: String,
    pub client_name: String,
    pub fecha_emision: DateTime<Utc>,
    pub tomado_por: Option<String>,
    pub procedimiento: Option<String>,
    pub analizado_por: Option<String>,
    pub pdf_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resultados: Vec<ResultadoResponse>,
}

impl InformeResponse {
    fn new(
        informe: informe::Model,
        proforma_number: String,
        client_name: String,
        resultados: Vec<resultado::Model>,
    ) -> Self {
        Self {
            id: informe.id,
            proforma_id: informe.proforma_id,
            proforma_number,
            client_name,
            fecha_emision: informe.fecha_emision,
            tomado_por: informe.tomado_por,
            procedimiento: informe.procedimiento,
            analizado_por: informe.analizado_por,
            pdf_path: informe.pdf_path,
            created_at: informe.created_at,
            resultados: resultados.into_iter().map(Into::into).collect(),
        }
    }
}

fn validate_request(request: &CreateInformeRequest) -> Result<(), ServiceError> {
    let mut problems = match request.validate() {
        Ok(()) => Vec::new(),
        Err(errors) => flatten_validation_errors(&errors),
    };
    for (index, row) in request.resultados.iter().enumerate() {
        if let Err(errors) = row.validate() {
            problems.extend(
                flatten_validation_errors(&errors)
                    .into_iter()
                    .map(|message| format!("resultados[{}].{}", index, message)),
            );
        }
    }
    if problems.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::FieldErrors(problems))
    }
}

async fn find_informe<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<informe::Model, ServiceError> {
    informe::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(INFORME_NOT_FOUND.to_string()))
}

async fn resultados_of<C: ConnectionTrait>(
    conn: &C,
    informe_id: Uuid,
) -> Result<Vec<resultado::Model>, ServiceError> {
    Ok(resultado::Entity::find()
        .filter(resultado::Column::InformeId.eq(informe_id))
        .order_by_asc(resultado::Column::Position)
        .all(conn)
        .await?)
}

/// Proforma and client behind an informe
async fn owner_of<C: ConnectionTrait>(
    conn: &C,
    informe: &informe::Model,
) -> Result<(proforma::Model, client::Model), ServiceError> {
    let proforma = proforma::Entity::find_by_id(informe.proforma_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Proforma no encontrada".to_string()))?;
    let client = client::Entity::find_by_id(proforma.client_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Cliente no encontrado".to_string()))?;
    Ok((proforma, client))
}

pub async fn build_informe_document<C: ConnectionTrait>(
    conn: &C,
    informe: &informe::Model,
) -> Result<InformeDocument, ServiceError> {
    let (proforma, client) = owner_of(conn, informe).await?;
    let company = settings::get_or_create(conn).await?;
    let resultados = resultados_of(conn, informe.id).await?;

    Ok(InformeDocument {
        company: CompanyHeader::from(&company),
        proforma_number: proforma.proforma_number,
        fecha_emision: informe.fecha_emision,
        client: ClientBlock::from(&client),
        tomado_por: informe.tomado_por.clone().unwrap_or_default(),
        procedimiento: informe.procedimiento.clone().unwrap_or_default(),
        analizado_por: informe.analizado_por.clone().unwrap_or_default(),
        resultados: resultados
            .into_iter()
            .map(|row| ResultadoLine {
                parameter: row.parameter,
                unit: row.unit.unwrap_or_default(),
                method: row.method.unwrap_or_default(),
                resultados: row.resultados.unwrap_or_default(),
                limite: row.limite.unwrap_or_default(),
                incertidumbre: row.incertidumbre.unwrap_or_default(),
            })
            .collect(),
    })
}

/// Service for informes and their result rows
#[derive(Clone)]
pub struct ReportService {
    db_pool: Arc<DbPool>,
    renderer: DocumentRenderer,
    generate_on_write: bool,
}

impl ReportService {
    pub fn new(db_pool: Arc<DbPool>, renderer: DocumentRenderer, generate_on_write: bool) -> Self {
        Self {
            db_pool,
            renderer,
            generate_on_write,
        }
    }

    #[instrument(skip(self, request), fields(proforma_id = %request.proforma_id))]
    pub async fn create_informe(
        &self,
        request: CreateInformeRequest,
    ) -> Result<InformeResponse, ServiceError> {
        validate_request(&request)?;

        let txn = self.db_pool.begin().await?;
        proforma::Entity::find_by_id(request.proforma_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Proforma no encontrada".to_string()))?;

        let existing = informe::Entity::find()
            .filter(informe::Column::ProformaId.eq(request.proforma_id))
            .one(&txn)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::ValidationError(DUPLICATE_INFORME.to_string()));
        }

        let informe = informe::ActiveModel {
            id: Set(Uuid::new_v4()),
            proforma_id: Set(request.proforma_id),
            fecha_emision: Set(request.fecha_emision.unwrap_or_else(Utc::now)),
            tomado_por: Set(non_blank(request.tomado_por)),
            procedimiento: Set(non_blank(request.procedimiento)),
            analizado_por: Set(non_blank(request.analizado_por)),
            pdf_path: Set(None),
            created_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await
        .map_err(|e| ServiceError::from_unique_violation(e, DUPLICATE_INFORME))?;

        for (position, row) in request.resultados.into_iter().enumerate() {
            resultado::ActiveModel {
                id: Set(Uuid::new_v4()),
                informe_id: Set(informe.id),
                parameter: Set(row.parameter.trim().to_string()),
                unit: Set(non_blank(row.unit)),
                method: Set(non_blank(row.method)),
                resultados: Set(non_blank(row.resultados)),
                limite: Set(non_blank(row.limite)),
                incertidumbre: Set(non_blank(row.incertidumbre)),
                position: Set(position as i32),
            }
            .insert(&txn)
            .await?;
        }
        txn.commit().await?;
        info!(informe_id = %informe.id, "informe created");

        if self.generate_on_write {
            if let Err(e) = self.write_pdf(&informe).await {
                warn!(informe_id = %informe.id, error = %e, "informe PDF generation failed");
            }
        }
        self.get_informe(informe.id).await
    }

    #[instrument(skip(self))]
    pub async fn list_informes(&self) -> Result<Vec<InformeResponse>, ServiceError> {
        let conn = &*self.db_pool;
        let informes = informe::Entity::find()
            .order_by_desc(informe::Column::FechaEmision)
            .all(conn)
            .await?;
        if informes.is_empty() {
            return Ok(Vec::new());
        }

        let proformas: HashMap<Uuid, proforma::Model> = proforma::Entity::find()
            .filter(proforma::Column::Id.is_in(informes.iter().map(|i| i.proforma_id)))
            .all(conn)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        let clients: HashMap<Uuid, String> = client::Entity::find()
            .filter(client::Column::Id.is_in(proformas.values().map(|p| p.client_id)))
            .all(conn)
            .await?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();

        let mut responses = Vec::with_capacity(informes.len());
        for informe in informes {
            let resultados = resultados_of(conn, informe.id).await?;
            let proforma = proformas.get(&informe.proforma_id);
            let number = proforma.map(|p| p.proforma_number.clone()).unwrap_or_default();
            let client_name = proforma
                .and_then(|p| clients.get(&p.client_id).cloned())
                .unwrap_or_default();
            responses.push(InformeResponse::new(informe, number, client_name, resultados));
        }
        Ok(responses)
    }

    #[instrument(skip(self))]
    pub async fn get_informe(&self, id: Uuid) -> Result<InformeResponse, ServiceError> {
        let conn = &*self.db_pool;
        let informe = find_informe(conn, id).await?;
        let (proforma, client) = owner_of(conn, &informe).await?;
        let resultados = resultados_of(conn, id).await?;
        Ok(InformeResponse::new(
            informe,
            proforma.proforma_number,
            client.name,
            resultados,
        ))
    }

    #[instrument(skip(self))]
    pub async fn list_resultados(&self, informe_id: Uuid) -> Result<Vec<ResultadoResponse>, ServiceError> {
        let conn = &*self.db_pool;
        find_informe(conn, informe_id).await?;
        Ok(resultados_of(conn, informe_id)
            .await?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn preview_html(&self, id: Uuid) -> Result<String, ServiceError> {
        let conn = &*self.db_pool;
        let informe = find_informe(conn, id).await?;
        let doc = build_informe_document(conn, &informe).await?;
        self.renderer.informe_html(&doc)
    }

    /// PDF of the informe attached to a proforma
    #[instrument(skip(self))]
    pub async fn informe_pdf_for_proforma(&self, proforma_id: Uuid) -> Result<PdfFile, ServiceError> {
        let conn = &*self.db_pool;
        let proforma = proforma::Entity::find_by_id(proforma_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Proforma no encontrada".to_string()))?;
        let informe = informe::Entity::find()
            .filter(informe::Column::ProformaId.eq(proforma_id))
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(INFORME_NOT_FOUND.to_string()))?;
        let file_name = format!("INF-{}.pdf", proforma.proforma_number);

        if let Some(path) = &informe.pdf_path {
            match tokio::fs::read(path).await {
                Ok(bytes) => return Ok(PdfFile { file_name, bytes }),
                Err(e) => warn!(%path, error = %e, "stored informe PDF unreadable, regenerating"),
            }
        }

        let path = self.write_pdf(&informe).await?;
        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            ServiceError::RenderError(format!("cannot read {}: {}", path.display(), e))
        })?;
        Ok(PdfFile { file_name, bytes })
    }

    async fn write_pdf(&self, informe: &informe::Model) -> Result<PathBuf, ServiceError> {
        let conn = &*self.db_pool;
        let doc = build_informe_document(conn, informe).await?;
        let path = self.renderer.write_informe_pdf(&doc).await?;
        informe::Entity::update_many()
            .col_expr(
                informe::Column::PdfPath,
                Expr::value(path.to_string_lossy().into_owned()),
            )
            .filter(informe::Column::Id.eq(informe.id))
            .exec(conn)
            .await?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_parameter_is_reported_with_row_index() {
        let request = CreateInformeRequest {
            proforma_id: Uuid::new_v4(),
            fecha_emision: None,
            tomado_por: None,
            procedimiento: None,
            analizado_por: None,
            resultados: vec![
                ResultadoInput {
                    parameter: "pH".into(),
                    ..Default::default()
                },
                ResultadoInput::default(),
            ],
        };
        match validate_request(&request) {
            Err(ServiceError::FieldErrors(problems)) => {
                assert_eq!(problems, vec!["resultados[1].parameter: El parámetro es requerido"]);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn whitespace_parameter_counts_as_missing() {
        let row = ResultadoInput {
            parameter: "   ".into(),
            ..Default::default()
        };
        let errors = row.validate().unwrap_err();
        assert_eq!(
            flatten_validation_errors(&errors),
            vec!["parameter: El parámetro es requerido"]
        );
    }

    #[test]
    fn resultado_response_exposes_position_as_order() {
        let model = resultado::Model {
            id: Uuid::nil(),
            informe_id: Uuid::nil(),
            parameter: "DBO5".into(),
            unit: Some("mg/L".into()),
            method: None,
            resultados: Some("12".into()),
            limite: Some("100".into()),
            incertidumbre: None,
            position: 2,
        };
        let response = ResultadoResponse::from(model);
        assert_eq!(response.order, 2);
        assert_eq!(response.parameter, "DBO5");
    }
}
