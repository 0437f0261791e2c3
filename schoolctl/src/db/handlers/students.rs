//! Database repository for enrolled students, their parents, and lead conversion.

use std::collections::HashMap;

use crate::db::{
    errors::{DbError, Result},
    models::{
        leads::{ENROLLED_LEAD_STATUS, LeadDBResponse, LeadParentDBResponse, LeadStudentDBResponse},
        students::{ACTIVE_STUDENT_STATUS, ConversionResult, ParentDBResponse, StudentDBResponse},
    },
};
use crate::types::{LeadId, ParentId, StudentId};
use chrono::{NaiveDate, Utc};
use sqlx::{Connection, FromRow, PgConnection};
use tracing::instrument;

#[derive(Debug, Clone, FromRow)]
struct Student {
    id: StudentId,
    first_name: String,
    last_name: String,
    date_of_birth: Option<NaiveDate>,
    grade_level: Option<String>,
    enrollment_date: NaiveDate,
    status: String,
    lead_id: Option<LeadId>,
}

#[derive(Debug, Clone, FromRow)]
struct LinkedParent {
    student_id: StudentId,
    #[sqlx(flatten)]
    parent: ParentDBResponse,
}

/// Why a lead could not be converted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionError {
    AlreadyConverted,
    MissingStudentOrParent,
}

pub struct Students<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Students<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    async fn attach_parents(&mut self, students: Vec<Student>) -> Result<Vec<StudentDBResponse>> {
        let ids: Vec<StudentId> = students.iter().map(|s| s.id).collect();
        let links = sqlx::query_as::<_, LinkedParent>(
            r#"
            SELECT sp.student_id, p.id, p.first_name, p.last_name, p.email, p.phone
            FROM student_parents sp
            JOIN parents p ON p.id = sp.parent_id
            WHERE sp.student_id = ANY($1)
            ORDER BY p.id
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *self.db)
        .await?;

        let mut parents_by_student: HashMap<StudentId, Vec<ParentDBResponse>> = HashMap::new();
        for link in links {
            parents_by_student.entry(link.student_id).or_default().push(link.parent);
        }

        Ok(students
            .into_iter()
            .map(|s| StudentDBResponse {
                parents: parents_by_student.remove(&s.id).unwrap_or_default(),
                id: s.id,
                first_name: s.first_name,
                last_name: s.last_name,
                date_of_birth: s.date_of_birth,
                grade_level: s.grade_level,
                enrollment_date: s.enrollment_date,
                status: s.status,
                lead_id: s.lead_id,
            })
            .collect())
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_id(&mut self, id: StudentId) -> Result<Option<StudentDBResponse>> {
        let student = sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        match student {
            Some(student) => Ok(self.attach_parents(vec![student]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Active students sorted by last name, then first name
    #[instrument(skip(self), err)]
    pub async fn list_active(&mut self) -> Result<Vec<StudentDBResponse>> {
        let students = sqlx::query_as::<_, Student>(
            "SELECT * FROM students WHERE status = $1 ORDER BY last_name, first_name, id",
        )
        .bind(ACTIVE_STUDENT_STATUS)
        .fetch_all(&mut *self.db)
        .await?;

        self.attach_parents(students).await
    }

    #[instrument(skip(self), err)]
    pub async fn count(&mut self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM students")
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count)
    }

    #[instrument(skip(self), err)]
    pub async fn exists_for_lead(&mut self, lead_id: LeadId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM students WHERE lead_id = $1)")
            .bind(lead_id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(exists)
    }

    /// Promote a lead's first student and first parent into permanent records.
    ///
    /// Reuses an existing parent with the same email, opens the student's financial account and
    /// marks the lead `Enrolled`. Run this inside a transaction; a concurrent second conversion
    /// loses on the `students.lead_id` unique constraint.
    #[instrument(skip(self, lead), fields(lead_id = lead.id), err)]
    pub async fn convert_lead(&mut self, lead: &LeadDBResponse) -> Result<std::result::Result<ConversionResult, ConversionError>> {
        if self.exists_for_lead(lead.id).await? {
            return Ok(Err(ConversionError::AlreadyConverted));
        }
        let (Some(lead_student), Some(lead_parent)) = (lead.students.first(), lead.parents.first()) else {
            return Ok(Err(ConversionError::MissingStudentOrParent));
        };

        // A savepoint keeps a lost race from aborting the caller's transaction
        let mut savepoint = self.db.begin().await?;
        let student_id = match insert_conversion(&mut savepoint, lead.id, lead_student, lead_parent).await {
            Ok(id) => {
                savepoint.commit().await?;
                id
            }
            Err(DbError::UniqueViolation { constraint, .. }) if constraint.as_deref() == Some(STUDENT_LEAD_CONSTRAINT) => {
                savepoint.rollback().await?;
                return Ok(Err(ConversionError::AlreadyConverted));
            }
            Err(e) => return Err(e),
        };

        Ok(Ok(ConversionResult {
            student_id,
            student_name: lead_student.full_name(),
        }))
    }
}

/// Unique constraint that makes a lead convert at most once
const STUDENT_LEAD_CONSTRAINT: &str = "students_lead_id_key";

/// Parent upsert, student insert, links, account and lead status for one conversion
async fn insert_conversion(
    conn: &mut PgConnection,
    lead_id: LeadId,
    lead_student: &LeadStudentDBResponse,
    lead_parent: &LeadParentDBResponse,
) -> Result<StudentId> {
    // Waits out a concurrent insert of the same email instead of failing on it
    let parent_id: ParentId = sqlx::query_scalar(
        r#"
        INSERT INTO parents (first_name, last_name, email, phone)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email
        RETURNING id
        "#,
    )
    .bind(&lead_parent.first_name)
    .bind(&lead_parent.last_name)
    .bind(&lead_parent.email)
    .bind(&lead_parent.phone)
    .fetch_one(&mut *conn)
    .await?;

    let student_id: StudentId = sqlx::query_scalar(
        r#"
        INSERT INTO students (first_name, last_name, date_of_birth, grade_level, enrollment_date, lead_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(&lead_student.first_name)
    .bind(&lead_student.last_name)
    .bind(lead_student.date_of_birth)
    .bind(&lead_student.grade_level)
    .bind(Utc::now().date_naive())
    .bind(lead_id)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query("INSERT INTO student_parents (student_id, parent_id) VALUES ($1, $2)")
        .bind(student_id)
        .bind(parent_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query("INSERT INTO student_financial_accounts (student_id) VALUES ($1) ON CONFLICT (student_id) DO NOTHING")
        .bind(student_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query("UPDATE leads SET status = $2, updated_at = NOW() WHERE id = $1")
        .bind(lead_id)
        .bind(ENROLLED_LEAD_STATUS)
        .execute(&mut *conn)
        .await?;

    Ok(student_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::Leads;
    use crate::db::models::leads::{LeadCreateDBRequest, LeadParentFields, LeadStudentFields};
    use sqlx::PgPool;

    async fn create_lead(pool: &PgPool, first_name: &str, parent_email: &str) -> LeadDBResponse {
        let mut conn = pool.acquire().await.unwrap();
        Leads::new(&mut conn)
            .create(&LeadCreateDBRequest {
                expected_start_date: None,
                amount: None,
                policy_agreed: true,
                students: vec![LeadStudentFields {
                    first_name: first_name.to_string(),
                    last_name: "Zed".to_string(),
                    date_of_birth: None,
                    city_state: None,
                    grade_level: Some("2".to_string()),
                }],
                parents: vec![LeadParentFields {
                    first_name: "Pat".to_string(),
                    last_name: "Zed".to_string(),
                    email: parent_email.to_string(),
                    phone: None,
                }],
            })
            .await
            .unwrap()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_convert_lead_once(pool: PgPool) {
        let lead = create_lead(&pool, "Sam", "pat@example.com").await;

        let mut tx = pool.begin().await.unwrap();
        let mut repo = Students::new(&mut tx);
        let result = repo.convert_lead(&lead).await.unwrap().unwrap();
        assert_eq!(result.student_name, "Sam Zed");

        let again = repo.convert_lead(&lead).await.unwrap();
        assert_eq!(again.unwrap_err(), ConversionError::AlreadyConverted);
        tx.commit().await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let student = Students::new(&mut conn).get_by_id(result.student_id).await.unwrap().unwrap();
        assert_eq!(student.status, ACTIVE_STUDENT_STATUS);
        assert_eq!(student.lead_id, Some(lead.id));
        assert_eq!(student.enrollment_date, Utc::now().date_naive());
        assert_eq!(student.parents.len(), 1);

        let lead = Leads::new(&mut conn).get_by_id(lead.id).await.unwrap().unwrap();
        assert_eq!(lead.status, ENROLLED_LEAD_STATUS);

        let accounts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM student_financial_accounts WHERE student_id = $1")
            .bind(result.student_id)
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(accounts, 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_siblings_share_a_parent(pool: PgPool) {
        let first = create_lead(&pool, "Amy", "shared@example.com").await;
        let second = create_lead(&pool, "Ben", "shared@example.com").await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Students::new(&mut conn);
        let a = repo.convert_lead(&first).await.unwrap().unwrap();
        let b = repo.convert_lead(&second).await.unwrap().unwrap();

        let a = repo.get_by_id(a.student_id).await.unwrap().unwrap();
        let b = repo.get_by_id(b.student_id).await.unwrap().unwrap();
        assert_eq!(a.parents[0].id, b.parents[0].id);

        let listed = repo.list_active().await.unwrap();
        let names: Vec<_> = listed.iter().map(|s| s.first_name.as_str()).collect();
        assert_eq!(names, ["Amy", "Ben"]);
        assert_eq!(repo.count().await.unwrap(), 2);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_lead_without_parent_is_rejected(pool: PgPool) {
        let mut lead = create_lead(&pool, "Sam", "pat@example.com").await;
        lead.parents.clear();

        let mut conn = pool.acquire().await.unwrap();
        let result = Students::new(&mut conn).convert_lead(&lead).await.unwrap();
        assert_eq!(result.unwrap_err(), ConversionError::MissingStudentOrParent);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_concurrent_conversion_leaves_loser_transaction_usable(pool: PgPool) {
        let lead = create_lead(&pool, "Sam", "race@example.com").await;

        let mut winner = pool.begin().await.unwrap();
        Students::new(&mut winner).convert_lead(&lead).await.unwrap().unwrap();

        let loser = {
            let pool = pool.clone();
            let lead = lead.clone();
            tokio::spawn(async move {
                let mut tx = pool.begin().await.unwrap();
                // Blocks on the winner's uncommitted rows, then hits the lead_id constraint
                let result = Students::new(&mut tx).convert_lead(&lead).await.unwrap();
                let alive: i32 = sqlx::query_scalar("SELECT 1").fetch_one(&mut *tx).await.unwrap();
                tx.commit().await.unwrap();
                (result, alive)
            })
        };

        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        winner.commit().await.unwrap();

        let (result, alive) = loser.await.unwrap();
        assert_eq!(result.unwrap_err(), ConversionError::AlreadyConverted);
        assert_eq!(alive, 1);

        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(Students::new(&mut conn).count().await.unwrap(), 1);
        let parents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM parents WHERE email = 'race@example.com'")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(parents, 1);
    }
}
