//! PostgreSQL存储测试，未设置 `DATABASE_URL` 时跳过

use lis_core::procedures::GLUCOSE;
use lis_core::{
    CancelExamRequest, ConcludeExamRequest, CreateExamRequest, ExamResult, ExamStatus, LisError,
    NewPatient,
};
use lis_database::{DatabasePool, PgStore, PoolSettings};
use lis_workflow::{CatalogStore, ExamStore, ExamWorkflowEngine, PatientStore};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

async fn connect() -> Option<Arc<PgStore>> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("DATABASE_URL not set, skipping PostgreSQL test");
            return None;
        }
    };

    let settings = PoolSettings {
        url,
        max_connections: 4,
        min_connections: 1,
        connect_timeout: Duration::from_secs(10),
    };
    let store = PgStore::new(DatabasePool::connect(&settings).await.expect("connect"));
    store.prepare().await.expect("prepare schema");
    Some(Arc::new(store))
}

/// 每次调用登记一个新患者，避免与库中已有数据冲突
async fn subject(store: &PgStore) -> Uuid {
    let cpf = format!("{:011}", Uuid::new_v4().as_u128() % 100_000_000_000);
    let (patient, _) = store
        .upsert_patient(NewPatient {
            cpf,
            name: "Ana Souza".to_string(),
            birth_date: None,
            sex: None,
            rg: None,
            rg_uf: None,
            phone: None,
        })
        .await
        .expect("patient");
    patient.id
}

async fn glucose_method(store: &PgStore) -> Uuid {
    store.list_methods(GLUCOSE).await.expect("methods")[0].id
}

fn glucose_request(subject_id: Uuid) -> CreateExamRequest {
    CreateExamRequest {
        procedure_id: Some(GLUCOSE),
        subject_id: Some(subject_id),
        fasting: Some(true),
        ..Default::default()
    }
}

#[tokio::test]
async fn update_if_status_rejects_stale_expectation() {
    let Some(store) = connect().await else { return };
    let exam = ExamResult::pending(glucose_request(subject(&store).await).validate().unwrap());
    store.insert_exam(&exam).await.unwrap();

    let mut canceled = exam.clone();
    canceled.status = ExamStatus::Canceled;
    canceled.cancel_reason = Some("duplicate".to_string());
    assert!(store.update_if_status(ExamStatus::Pending, &canceled).await.unwrap());

    let mut concluded = exam.clone();
    concluded.status = ExamStatus::Concluded;
    concluded.value = Some("85".to_string());
    concluded.method_id = Some(glucose_method(&store).await);
    assert!(!store.update_if_status(ExamStatus::Pending, &concluded).await.unwrap());

    let stored = store.get_exam(exam.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ExamStatus::Canceled);
    assert_eq!(stored.cancel_reason.as_deref(), Some("duplicate"));
    assert!(stored.value.is_none());
}

#[tokio::test]
async fn update_if_status_on_missing_exam_is_not_found() {
    let Some(store) = connect().await else { return };
    let mut exam = ExamResult::pending(glucose_request(subject(&store).await).validate().unwrap());
    exam.status = ExamStatus::Canceled;
    exam.cancel_reason = Some("never stored".to_string());

    let result = store.update_if_status(ExamStatus::Pending, &exam).await;
    assert!(matches!(result, Err(LisError::NotFound(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_cancel_and_conclude_single_winner() {
    let Some(store) = connect().await else { return };
    let engine = ExamWorkflowEngine::new(store.clone(), store.clone());
    let subject_id = subject(&store).await;
    let method_id = glucose_method(&store).await;

    for _ in 0..20 {
        let exam_id = engine.create(glucose_request(subject_id)).await.unwrap().id;

        let concluding = {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .conclude(exam_id, ConcludeExamRequest::new("85", method_id))
                    .await
            })
        };
        let canceling = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.cancel(exam_id, CancelExamRequest::new("race")).await })
        };

        let concluded = concluding.await.unwrap();
        let canceled = canceling.await.unwrap();
        assert!(concluded.is_ok() ^ canceled.is_ok());

        let stored = engine.get(exam_id).await.unwrap();
        match (concluded, canceled) {
            (Ok(_), Err(LisError::InvalidState { from, .. })) => {
                assert_eq!(from, ExamStatus::Concluded.to_string());
                assert_eq!(stored.status, ExamStatus::Concluded);
                assert_eq!(stored.value.as_deref(), Some("85"));
                assert!(stored.cancel_reason.is_none());
            }
            (Err(LisError::InvalidState { from, .. }), Ok(_)) => {
                assert_eq!(from, ExamStatus::Canceled.to_string());
                assert_eq!(stored.status, ExamStatus::Canceled);
                assert_eq!(stored.cancel_reason.as_deref(), Some("race"));
                assert!(stored.value.is_none());
            }
            other => panic!("unexpected race outcome: {:?}", other),
        }
    }
}
