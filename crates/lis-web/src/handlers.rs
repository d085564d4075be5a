//! HTTP处理器

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, Query, State,
    },
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use lis_admin::monitoring::{
    OUTCOME_ERROR, OUTCOME_INVALID, OUTCOME_NOT_FOUND, OUTCOME_OK, OUTCOME_REJECTED,
};
use lis_core::{
    CancelExamRequest, ConcludeExamRequest, CreateExamRequest, ExamResult, ExamStatus, LisError,
    RegisterPatientRequest, RegisterSiteRequest, ReportFilter,
};
use lis_workflow::{ExamDetail, Registration};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

type ApiResult<T> = std::result::Result<T, ApiError>;

/// API根路径处理器
pub async fn api_root() -> impl IntoResponse {
    Json(json!({
        "service": "LIS Exam Results API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": {
            "health": "/health",
            "metrics": "/metrics",
            "exams": "/api/exams",
            "patients": "/api/patients",
            "sites": "/api/sites",
            "methods": "/api/methods",
            "reports": "/api/reports"
        }
    }))
}

/// 健康检查处理器
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Prometheus指标
pub async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(body) => {
            let mut response = body.into_response();
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            response
        }
        Err(err) => ApiError(LisError::Internal(format!("metrics unavailable: {}", err))).into_response(),
    }
}

// ========== 检验 ==========

#[derive(Debug, Deserialize)]
pub struct ExamListParams {
    pub procedure_id: Option<String>,
}

/// 按项目列出检验
pub async fn list_exams(
    State(state): State<AppState>,
    Query(params): Query<ExamListParams>,
) -> ApiResult<Json<Value>> {
    let procedure_id = parse_id_param(params.procedure_id.as_deref());
    let exams = state.engine.list(procedure_id).await?;

    Ok(Json(json!({
        "exams": exams,
        "total": exams.len()
    })))
}

/// 登记检验
pub async fn create_exam(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CreateExamRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ExamResult>)> {
    let result = match payload {
        Ok(Json(request)) => state.engine.create(request).await,
        Err(rejection) => Err(ApiError::from(rejection).0),
    };
    track_transition(&state, "create", &result);

    Ok((StatusCode::CREATED, Json(result?)))
}

/// 读取检验，已出结果时附带参考区间判读
pub async fn get_exam(
    State(state): State<AppState>,
    path: std::result::Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<ExamDetail>> {
    let Path(exam_id) = path?;
    let detail = state.engine.detail(exam_id).await?;

    if detail.exam.status == ExamStatus::Concluded {
        let verdict = detail
            .classification
            .kind
            .map(|kind| kind.as_str())
            .unwrap_or("no_verdict");
        state.metrics.record_classification(verdict);
    }

    Ok(Json(detail))
}

/// 录入检验结果
pub async fn conclude_exam(
    State(state): State<AppState>,
    path: std::result::Result<Path<Uuid>, PathRejection>,
    payload: std::result::Result<Json<ConcludeExamRequest>, JsonRejection>,
) -> ApiResult<Json<ExamResult>> {
    let Path(exam_id) = path?;
    let result = match payload {
        Ok(Json(request)) => state.engine.conclude(exam_id, request).await,
        Err(rejection) => Err(ApiError::from(rejection).0),
    };
    track_transition(&state, "conclude", &result);

    Ok(Json(result?))
}

/// 取消检验
pub async fn cancel_exam(
    State(state): State<AppState>,
    path: std::result::Result<Path<Uuid>, PathRejection>,
    payload: std::result::Result<Json<CancelExamRequest>, JsonRejection>,
) -> ApiResult<Json<ExamResult>> {
    let Path(exam_id) = path?;
    let result = match payload {
        Ok(Json(request)) => state.engine.cancel(exam_id, request).await,
        Err(rejection) => Err(ApiError::from(rejection).0),
    };
    track_transition(&state, "cancel", &result);

    Ok(Json(result?))
}

// ========== 患者 ==========

#[derive(Debug, Deserialize)]
pub struct PatientQueryParams {
    pub cpf: Option<String>,
}

/// 登记患者，新建返回201，已存在返回200
pub async fn register_patient(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RegisterPatientRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = payload?;
    let registration = state.registry.register_patient(request).await?;
    Ok(registration_response(registration))
}

/// 按CPF查找患者
pub async fn find_patient(
    State(state): State<AppState>,
    Query(params): Query<PatientQueryParams>,
) -> ApiResult<Response> {
    let cpf = params
        .cpf
        .ok_or_else(|| LisError::validation("cpf query parameter is required"))?;
    let patient = state.registry.find_patient_by_cpf(&cpf).await?;
    Ok(Json(patient).into_response())
}

/// 按ID读取患者
pub async fn get_patient(
    State(state): State<AppState>,
    path: std::result::Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Response> {
    let Path(patient_id) = path?;
    let patient = state.registry.get_patient(patient_id).await?;
    Ok(Json(patient).into_response())
}

// ========== 目录 ==========

/// 采集点列表
pub async fn list_sites(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let sites = state.registry.list_sites().await?;
    Ok(Json(json!({
        "sites": sites,
        "total": sites.len()
    })))
}

/// 登记采集点，新建返回201，已存在返回200
pub async fn register_site(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RegisterSiteRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = payload?;
    let registration = state.registry.register_site(request).await?;
    Ok(registration_response(registration))
}

#[derive(Debug, Deserialize)]
pub struct MethodQueryParams {
    pub procedure_id: Option<String>,
}

/// 项目的方法学列表
pub async fn list_methods(
    State(state): State<AppState>,
    Query(params): Query<MethodQueryParams>,
) -> ApiResult<Json<Value>> {
    let procedure_id = parse_id_param(params.procedure_id.as_deref());
    let methods = state.registry.list_methods(procedure_id).await?;
    Ok(Json(json!({
        "methods": methods,
        "total": methods.len()
    })))
}

// ========== 报表 ==========

#[derive(Debug, Deserialize)]
pub struct ReportQueryParams {
    pub procedures: Option<String>,
    pub sites: Option<String>,
}

/// 检验报表
pub async fn report(
    State(state): State<AppState>,
    Query(params): Query<ReportQueryParams>,
) -> ApiResult<Json<Value>> {
    let filter = ReportFilter::parse(params.procedures.as_deref(), params.sites.as_deref());
    info!("Building report for {:?}", filter);

    let rows = state.registry.report(filter).await?;
    Ok(Json(json!({
        "rows": rows,
        "total": rows.len()
    })))
}

fn registration_response<T: serde::Serialize>(registration: Registration<T>) -> Response {
    let status = if registration.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    (status, Json(registration.record)).into_response()
}

/// 查询参数中的项目代码，无法解析时视为缺失，由下游统一报告校验错误
fn parse_id_param(raw: Option<&str>) -> Option<i32> {
    raw.and_then(|value| value.trim().parse::<i32>().ok())
}

fn track_transition<T>(state: &AppState, transition: &str, result: &lis_core::Result<T>) {
    let outcome = match result {
        Ok(_) => OUTCOME_OK,
        Err(LisError::Validation(_)) => OUTCOME_INVALID,
        Err(LisError::InvalidState { .. }) => OUTCOME_REJECTED,
        Err(LisError::NotFound(_)) => OUTCOME_NOT_FOUND,
        Err(_) => OUTCOME_ERROR,
    };
    state.metrics.record_transition(transition, outcome);
}
