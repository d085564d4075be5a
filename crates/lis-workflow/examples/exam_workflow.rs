//! 检验工作流演示程序
//!
//! 展示患者登记、检验登记、出结果、取消以及参考区间判读

use lis_core::procedures::{BLOOD_TYPING, GLUCOSE};
use lis_core::{
    CancelExamRequest, ConcludeExamRequest, CreateExamRequest, RegisterPatientRequest,
    RegisterSiteRequest, ReportFilter,
};
use lis_workflow::{
    ExamWorkflowEngine, InMemoryCatalog, InMemoryExamStore, InMemoryPatientStore,
    InMemoryReferenceTable, RegistryService,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志
    tracing_subscriber::fmt::init();

    let exams = Arc::new(InMemoryExamStore::new());
    let catalog = Arc::new(InMemoryCatalog::with_defaults());
    let engine = ExamWorkflowEngine::new(exams.clone(), Arc::new(InMemoryReferenceTable::with_default_bands()));
    let registry = RegistryService::new(
        Arc::new(InMemoryPatientStore::new()),
        catalog,
        exams,
        vec![GLUCOSE, BLOOD_TYPING],
    );

    println!("🧪 检验工作流演示\n");

    // 1. 登记患者与采集点
    let patient = registry
        .register_patient(RegisterPatientRequest {
            cpf: Some("12345678901".to_string()),
            name: Some("Maria Oliveira".to_string()),
            sex: Some("F".to_string()),
            ..Default::default()
        })
        .await?
        .record;
    let site = registry
        .register_site(RegisterSiteRequest {
            description: Some("UBS Centro".to_string()),
        })
        .await?
        .record;
    println!("✅ 患者 {} / 采集点 {}", patient.name, site.description);

    // 2. 登记空腹血糖检验并出结果
    let glucose = engine
        .create(CreateExamRequest {
            procedure_id: Some(GLUCOSE),
            subject_id: Some(patient.id),
            collection_site_id: Some(site.id),
            fasting: Some(true),
            ..Default::default()
        })
        .await?;
    let method = registry.list_methods(Some(GLUCOSE)).await?.remove(0);
    engine
        .conclude(glucose.id, ConcludeExamRequest::new("112", method.id))
        .await?;

    let detail = engine.detail(glucose.id).await?;
    println!("\n📋 血糖 {} mg/dL ({})", detail.exam.value.as_deref().unwrap_or("-"), method.name);
    for band in &detail.classification.bands {
        println!("   {:<28} {:>6.1} - {:<6.1}", band.label, band.min, band.max);
    }
    println!("   判读: {}", detail.classification.verdict.as_deref().unwrap_or("-"));

    // 3. 登记血型检验后取消
    let typing = engine
        .create(CreateExamRequest {
            procedure_id: Some(BLOOD_TYPING),
            subject_id: Some(patient.id),
            collection_site_id: Some(site.id),
            ..Default::default()
        })
        .await?;
    let canceled = engine
        .cancel(typing.id, CancelExamRequest::new("hemolyzed sample"))
        .await?;
    println!("\n❌ 血型检验已取消: {}", canceled.cancel_reason.as_deref().unwrap_or("-"));

    // 4. 已取消的检验不能再出结果
    if let Err(e) = engine
        .conclude(typing.id, ConcludeExamRequest::new("A+", method.id))
        .await
    {
        println!("   预期的拒绝: {}", e);
    }

    // 5. 报表
    let rows = registry.report(ReportFilter::default()).await?;
    println!("\n📊 报表 ({} 条):", rows.len());
    for row in rows {
        println!(
            "   {} {:<14} {:<10} {:?}",
            row.exam_id,
            row.procedure_description.unwrap_or_default(),
            row.value.unwrap_or_default(),
            row.status
        );
    }

    Ok(())
}
