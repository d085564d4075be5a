//! 数据库查询操作

use crate::connection::DatabasePool;
use crate::models::*;
use lis_core::{
    CollectionSite, ExamMethod, ExamResult, ExamStatus, LisError, NewPatient, Patient, Procedure,
    ReferenceBand, Result,
};
use lis_workflow::memory::default_glucose_bands;
use sqlx::Row;
use uuid::Uuid;

/// 数据库查询操作接口
pub struct DatabaseQueries<'a> {
    pool: &'a DatabasePool,
}

impl<'a> DatabaseQueries<'a> {
    pub fn new(pool: &'a DatabasePool) -> Self {
        Self { pool }
    }

    /// 创建数据库表
    pub async fn create_tables(&self) -> Result<()> {
        let pool = self.pool.pool();

        // 检验项目表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS procedures (
                code INTEGER PRIMARY KEY,
                description VARCHAR(255) NOT NULL
            )
        "#).execute(pool).await?;

        // 患者表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS patients (
                id UUID PRIMARY KEY,
                cpf VARCHAR(11) UNIQUE NOT NULL,
                name VARCHAR(255) NOT NULL,
                birth_date DATE,
                sex VARCHAR(1),
                rg VARCHAR(32),
                rg_uf VARCHAR(8),
                phone VARCHAR(32),
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(pool).await?;

        // 采集点表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS collection_sites (
                id UUID PRIMARY KEY,
                description VARCHAR(255) NOT NULL,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(pool).await?;

        // 方法学表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS exam_methods (
                id UUID PRIMARY KEY,
                procedure_id INTEGER NOT NULL REFERENCES procedures(code),
                name VARCHAR(255) NOT NULL,
                description TEXT
            )
        "#).execute(pool).await?;

        // 检验结果表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS exam_results (
                id UUID PRIMARY KEY,
                procedure_id INTEGER NOT NULL,
                subject_id UUID NOT NULL REFERENCES patients(id),
                collection_site_id UUID REFERENCES collection_sites(id),
                collected_at TIMESTAMP WITH TIME ZONE NOT NULL,
                fasting BOOLEAN,
                pregnant BOOLEAN,
                observation TEXT,
                value TEXT,
                method_id UUID REFERENCES exam_methods(id),
                status VARCHAR(4) NOT NULL DEFAULT 'PEND',
                cancel_reason TEXT,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                CHECK (status IN ('PEND', 'CONC', 'CANC')),
                CHECK ((status = 'CANC') = (cancel_reason IS NOT NULL)),
                CHECK (status <> 'CONC' OR (value IS NOT NULL AND method_id IS NOT NULL))
            )
        "#).execute(pool).await?;

        // 参考区间表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS reference_bands (
                id BIGSERIAL PRIMARY KEY,
                procedure_id INTEGER NOT NULL,
                fasting BOOLEAN NOT NULL DEFAULT FALSE,
                pregnant BOOLEAN NOT NULL DEFAULT FALSE,
                label VARCHAR(255) NOT NULL,
                min_value DOUBLE PRECISION NOT NULL,
                max_value DOUBLE PRECISION NOT NULL,
                note TEXT,
                CHECK (min_value <= max_value)
            )
        "#).execute(pool).await?;

        // 创建索引以优化查询性能
        self.create_indexes().await?;

        tracing::info!("Database tables created successfully");
        Ok(())
    }

    /// 创建数据库索引
    async fn create_indexes(&self) -> Result<()> {
        let pool = self.pool.pool();

        let indexes = vec![
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_collection_sites_description ON collection_sites (UPPER(description))",
            "CREATE INDEX IF NOT EXISTS idx_exam_methods_procedure_id ON exam_methods(procedure_id)",
            "CREATE INDEX IF NOT EXISTS idx_exam_results_procedure_id ON exam_results(procedure_id, collected_at DESC)",
            "CREATE INDEX IF NOT EXISTS idx_exam_results_subject_id ON exam_results(subject_id)",
            "CREATE INDEX IF NOT EXISTS idx_exam_results_collection_site_id ON exam_results(collection_site_id)",
            "CREATE INDEX IF NOT EXISTS idx_reference_bands_key ON reference_bands(procedure_id, fasting, pregnant, min_value)",
        ];

        for index_sql in indexes {
            sqlx::query(index_sql).execute(pool).await?;
        }

        tracing::info!("Database indexes created successfully");
        Ok(())
    }

    /// 写入内置的检验项目、方法学与血糖参考区间（仅在表为空时）
    pub async fn seed_reference_data(&self) -> Result<()> {
        let pool = self.pool.pool();

        for (code, description) in [
            (lis_core::procedures::GLUCOSE, "Glucose"),
            (lis_core::procedures::BLOOD_TYPING, "Blood typing"),
        ] {
            sqlx::query("INSERT INTO procedures (code, description) VALUES ($1, $2) ON CONFLICT (code) DO NOTHING")
                .bind(code)
                .bind(description)
                .execute(pool)
                .await?;
        }

        let method_count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM exam_methods")
            .fetch_one(pool)
            .await
            .map(|row| row.get("n"))?;
        if method_count == 0 {
            let methods = [
                (lis_core::procedures::GLUCOSE, "Glucose oxidase", "Enzymatic colorimetric assay (GOD-PAP)"),
                (lis_core::procedures::GLUCOSE, "Capillary glucometer", "Point-of-care capillary measurement"),
                (lis_core::procedures::BLOOD_TYPING, "Tube hemagglutination", "ABO/Rh typing by tube agglutination"),
                (lis_core::procedures::BLOOD_TYPING, "Gel column agglutination", "ABO/Rh typing by gel centrifugation"),
            ];
            for (procedure_id, name, description) in methods {
                sqlx::query("INSERT INTO exam_methods (id, procedure_id, name, description) VALUES ($1, $2, $3, $4)")
                    .bind(Uuid::new_v4())
                    .bind(procedure_id)
                    .bind(name)
                    .bind(description)
                    .execute(pool)
                    .await?;
            }
        }

        let band_count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM reference_bands")
            .fetch_one(pool)
            .await
            .map(|row| row.get("n"))?;
        if band_count == 0 {
            for band in default_glucose_bands() {
                self.insert_reference_band(&band).await?;
            }
            tracing::info!("Seeded default glucose reference bands");
        }

        Ok(())
    }

    // ========== 检验结果相关操作 ==========

    /// 创建新检验
    pub async fn insert_exam(&self, exam: &ExamResult) -> Result<()> {
        let pool = self.pool.pool();

        sqlx::query(r#"
            INSERT INTO exam_results (id, procedure_id, subject_id, collection_site_id, collected_at,
                                      fasting, pregnant, observation, value, method_id, status,
                                      cancel_reason, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        "#)
        .bind(exam.id)
        .bind(exam.procedure_id)
        .bind(exam.subject_id)
        .bind(exam.collection_site_id)
        .bind(exam.collected_at)
        .bind(exam.fasting)
        .bind(exam.pregnant)
        .bind(&exam.observation)
        .bind(&exam.value)
        .bind(exam.method_id)
        .bind(exam.status.code())
        .bind(&exam.cancel_reason)
        .bind(exam.created_at)
        .bind(exam.updated_at)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// 根据ID查找检验
    pub async fn get_exam_by_id(&self, id: &Uuid) -> Result<Option<ExamResult>> {
        let pool = self.pool.pool();

        let result = sqlx::query_as::<_, DbExamResult>(
            "SELECT * FROM exam_results WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        result.map(ExamResult::try_from).transpose()
    }

    /// 根据项目获取所有检验
    pub async fn get_exams_by_procedure(&self, procedure_id: i32) -> Result<Vec<ExamResult>> {
        let pool = self.pool.pool();

        let results = sqlx::query_as::<_, DbExamResult>(
            "SELECT * FROM exam_results WHERE procedure_id = $1 ORDER BY collected_at DESC"
        )
        .bind(procedure_id)
        .fetch_all(pool)
        .await?;

        exams_from_rows(results)
    }

    /// 按项目和采集点过滤检验
    pub async fn get_exams_filtered(&self, procedures: &[i32], sites: &[Uuid]) -> Result<Vec<ExamResult>> {
        let pool = self.pool.pool();

        let results = sqlx::query_as::<_, DbExamResult>(r#"
            SELECT * FROM exam_results
             WHERE procedure_id = ANY($1)
               AND (cardinality($2::uuid[]) = 0 OR collection_site_id = ANY($2))
             ORDER BY collected_at DESC
        "#)
        .bind(procedures)
        .bind(sites)
        .fetch_all(pool)
        .await?;

        exams_from_rows(results)
    }

    /// 条件更新：仅当当前状态等于 `expected` 时写入
    pub async fn update_exam_if_status(&self, expected: ExamStatus, exam: &ExamResult) -> Result<bool> {
        let pool = self.pool.pool();

        let updated = sqlx::query(r#"
            UPDATE exam_results
               SET value = $3,
                   method_id = $4,
                   status = $5,
                   cancel_reason = $6,
                   updated_at = $7
             WHERE id = $1
               AND status = $2
        "#)
        .bind(exam.id)
        .bind(expected.code())
        .bind(&exam.value)
        .bind(exam.method_id)
        .bind(exam.status.code())
        .bind(&exam.cancel_reason)
        .bind(exam.updated_at)
        .execute(pool)
        .await?
        .rows_affected();

        if updated == 1 {
            return Ok(true);
        }

        let exists: bool = sqlx::query("SELECT EXISTS(SELECT 1 FROM exam_results WHERE id = $1) AS found")
            .bind(exam.id)
            .fetch_one(pool)
            .await
            .map(|row| row.get("found"))?;

        if exists {
            Ok(false)
        } else {
            Err(LisError::not_found(format!("exam {} not found", exam.id)))
        }
    }

    // ========== 参考区间相关操作 ==========

    /// 插入参考区间
    pub async fn insert_reference_band(&self, band: &ReferenceBand) -> Result<i64> {
        let pool = self.pool.pool();

        sqlx::query(r#"
            INSERT INTO reference_bands (procedure_id, fasting, pregnant, label, min_value, max_value, note)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
        "#)
        .bind(band.procedure_id)
        .bind(band.fasting)
        .bind(band.pregnant)
        .bind(&band.label)
        .bind(band.min)
        .bind(band.max)
        .bind(&band.note)
        .fetch_one(pool)
        .await
        .map(|row| row.get("id"))
        .map_err(LisError::from)
    }

    /// 按 (项目, 空腹, 妊娠) 查询参考区间，下限升序，相同下限按插入顺序
    pub async fn get_reference_bands(&self, procedure_id: i32, fasting: bool, pregnant: bool) -> Result<Vec<ReferenceBand>> {
        let pool = self.pool.pool();

        let results = sqlx::query_as::<_, DbReferenceBand>(r#"
            SELECT * FROM reference_bands
             WHERE procedure_id = $1 AND fasting = $2 AND pregnant = $3
             ORDER BY min_value, id
        "#)
        .bind(procedure_id)
        .bind(fasting)
        .bind(pregnant)
        .fetch_all(pool)
        .await?;

        Ok(results.into_iter().map(ReferenceBand::from).collect())
    }

    // ========== 患者相关操作 ==========

    /// 根据ID查找患者
    pub async fn get_patient_by_id(&self, id: &Uuid) -> Result<Option<Patient>> {
        let pool = self.pool.pool();

        let result = sqlx::query_as::<_, DbPatient>(
            "SELECT * FROM patients WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(result.map(Patient::from))
    }

    /// 根据CPF查找患者
    pub async fn get_patient_by_cpf(&self, cpf: &str) -> Result<Option<Patient>> {
        let pool = self.pool.pool();

        let result = sqlx::query_as::<_, DbPatient>(
            "SELECT * FROM patients WHERE cpf = $1"
        )
        .bind(cpf)
        .fetch_optional(pool)
        .await?;

        Ok(result.map(Patient::from))
    }

    /// 按CPF登记患者，已存在时仅更新电话
    pub async fn upsert_patient(&self, new_patient: &NewPatient) -> Result<(Patient, bool)> {
        let pool = self.pool.pool();
        let patient = Patient::from_new(new_patient.clone());

        let inserted = sqlx::query_as::<_, DbPatient>(r#"
            INSERT INTO patients (id, cpf, name, birth_date, sex, rg, rg_uf, phone, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (cpf) DO NOTHING
            RETURNING *
        "#)
        .bind(patient.id)
        .bind(&patient.cpf)
        .bind(&patient.name)
        .bind(patient.birth_date)
        .bind(patient.sex.map(|s| s.code()))
        .bind(&patient.rg)
        .bind(&patient.rg_uf)
        .bind(&patient.phone)
        .bind(patient.created_at)
        .bind(patient.updated_at)
        .fetch_optional(pool)
        .await?;

        if let Some(row) = inserted {
            return Ok((Patient::from(row), true));
        }

        let existing = match &new_patient.phone {
            Some(phone) => {
                sqlx::query_as::<_, DbPatient>(
                    "UPDATE patients SET phone = $2, updated_at = NOW() WHERE cpf = $1 RETURNING *"
                )
                .bind(&new_patient.cpf)
                .bind(phone)
                .fetch_one(pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, DbPatient>("SELECT * FROM patients WHERE cpf = $1")
                    .bind(&new_patient.cpf)
                    .fetch_one(pool)
                    .await?
            }
        };

        Ok((Patient::from(existing), false))
    }

    // ========== 目录相关操作 ==========

    /// 所有采集点，按描述排序
    pub async fn get_collection_sites(&self) -> Result<Vec<CollectionSite>> {
        let pool = self.pool.pool();

        let results = sqlx::query_as::<_, DbCollectionSite>(
            "SELECT * FROM collection_sites ORDER BY description"
        )
        .fetch_all(pool)
        .await?;

        Ok(results.into_iter().map(CollectionSite::from).collect())
    }

    /// 登记采集点，描述忽略大小写去重
    pub async fn register_collection_site(&self, description: &str) -> Result<(CollectionSite, bool)> {
        let pool = self.pool.pool();
        let site = CollectionSite::new(description.to_string());

        let inserted = sqlx::query_as::<_, DbCollectionSite>(r#"
            INSERT INTO collection_sites (id, description, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT ((UPPER(description))) DO NOTHING
            RETURNING *
        "#)
        .bind(site.id)
        .bind(&site.description)
        .bind(site.created_at)
        .fetch_optional(pool)
        .await?;

        if let Some(row) = inserted {
            return Ok((CollectionSite::from(row), true));
        }

        let existing = sqlx::query_as::<_, DbCollectionSite>(
            "SELECT * FROM collection_sites WHERE UPPER(description) = UPPER($1) LIMIT 1"
        )
        .bind(description)
        .fetch_one(pool)
        .await?;

        Ok((CollectionSite::from(existing), false))
    }

    /// 项目的方法学，按名称排序
    pub async fn get_methods_by_procedure(&self, procedure_id: i32) -> Result<Vec<ExamMethod>> {
        let pool = self.pool.pool();

        let results = sqlx::query_as::<_, DbExamMethod>(
            "SELECT * FROM exam_methods WHERE procedure_id = $1 ORDER BY name"
        )
        .bind(procedure_id)
        .fetch_all(pool)
        .await?;

        Ok(results.into_iter().map(ExamMethod::from).collect())
    }

    /// 所有检验项目
    pub async fn get_procedures(&self) -> Result<Vec<Procedure>> {
        let pool = self.pool.pool();

        let results = sqlx::query_as::<_, DbProcedure>(
            "SELECT * FROM procedures ORDER BY code"
        )
        .fetch_all(pool)
        .await?;

        Ok(results.into_iter().map(Procedure::from).collect())
    }
}
