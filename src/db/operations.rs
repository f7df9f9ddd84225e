use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::DatabaseConfig;
use crate::db::models::{round2, validate_score, Grade, Student, StudentReport, SubjectTopper};
use crate::error::{AppError, DatabaseError};
use crate::Result;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS students (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        roll_number TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS grades (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        student_id INTEGER NOT NULL,
        subject TEXT NOT NULL,
        grade REAL NOT NULL,
        FOREIGN KEY (student_id) REFERENCES students (id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_grades_student ON grades(student_id)",
    "CREATE INDEX IF NOT EXISTS idx_grades_subject ON grades(subject)",
];

pub struct DbOperations {
    pool: Arc<SqlitePool>,
}

impl DbOperations {
    pub async fn new_with_options(
        url: &str,
        max_connections: u32,
        busy_timeout: Duration,
    ) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        Ok(Self { pool: Arc::new(pool) })
    }

    /// Opens the store described by `config` and makes sure both tables exist.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let db = Self::new_with_options(
            &config.url,
            config.max_connections,
            Duration::from_secs(config.busy_timeout_secs),
        )
        .await?;
        db.init_schema().await?;
        info!("Database ready at {}", config.url);
        Ok(db)
    }

    pub async fn init_schema(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        for statement in SCHEMA {
            sqlx::query(*statement).execute(&mut *conn).await?;
        }
        Ok(())
    }

    pub fn get_pool_status(&self) -> DbPoolStatus {
        let size = self.pool.size();
        let idle = self.pool.num_idle() as u32;
        let active = size.saturating_sub(idle);

        DbPoolStatus {
            total_connections: size,
            active_connections: active,
            idle_connections: idle,
        }
    }

    pub async fn begin_transaction(&self) -> Result<Transaction<'_, Sqlite>> {
        Ok(self.pool.as_ref().begin().await?)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn create_student(&self, name: &str, roll_number: &str) -> Result<Student> {
        let mut conn = self.pool.acquire().await?;

        let result = sqlx::query("INSERT INTO students (name, roll_number) VALUES (?, ?)")
            .bind(name)
            .bind(roll_number)
            .execute(&mut *conn)
            .await;

        match result {
            Ok(done) => {
                let student = Student {
                    id: done.last_insert_rowid(),
                    name: name.to_string(),
                    roll_number: roll_number.to_string(),
                };
                info!("Created student {} with roll number {}", student.id, roll_number);
                Ok(student)
            }
            Err(e) => match DatabaseError::from(e) {
                DatabaseError::Duplicate(_) => {
                    warn!("Rejected duplicate roll number {}", roll_number);
                    Err(DatabaseError::Duplicate(format!(
                        "roll number '{}' already exists",
                        roll_number
                    ))
                    .into())
                }
                other => Err(other.into()),
            },
        }
    }

    pub async fn list_students(&self) -> Result<Vec<Student>> {
        let students = sqlx::query_as::<_, Student>("SELECT id, name, roll_number FROM students")
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(students)
    }

    pub async fn get_student(&self, id: i64) -> Result<Option<Student>> {
        let mut conn = self.pool.acquire().await?;
        Ok(find_student(&mut *conn, id).await?)
    }

    pub async fn get_student_by_roll(&self, roll_number: &str) -> Result<Option<Student>> {
        let student = sqlx::query_as::<_, Student>(
            "SELECT id, name, roll_number FROM students WHERE roll_number = ?",
        )
        .bind(roll_number)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(student)
    }

    /// Removes a student and every grade it owns. Returns how many grade rows
    /// went with it.
    pub async fn delete_student(&self, id: i64) -> Result<u64> {
        let mut transaction = self.begin_transaction().await?;

        let result = Self::delete_student_with_transaction(id, &mut transaction).await;

        match result {
            Ok(removed) => {
                transaction.commit().await?;
                info!("Deleted student {} and {} grade(s)", id, removed);
                Ok(removed)
            }
            Err(e) => {
                transaction.rollback().await?;
                Err(e)
            }
        }
    }

    async fn delete_student_with_transaction(
        id: i64,
        transaction: &mut Transaction<'_, Sqlite>,
    ) -> Result<u64> {
        if find_student(&mut **transaction, id).await?.is_none() {
            return Err(AppError::not_found(format!("Student {}", id)));
        }

        // grades first: foreign keys are enforced
        let removed = sqlx::query("DELETE FROM grades WHERE student_id = ?")
            .bind(id)
            .execute(&mut **transaction)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM students WHERE id = ?")
            .bind(id)
            .execute(&mut **transaction)
            .await?;

        Ok(removed)
    }

    /// Records `score` for the student in `subject`, replacing any earlier
    /// grade for the same pair.
    pub async fn upsert_grade(&self, student_id: i64, subject: &str, score: f64) -> Result<Grade> {
        validate_score(score)?;

        let mut transaction = self.begin_transaction().await?;

        let result =
            Self::upsert_grade_with_transaction(student_id, subject, score, &mut transaction).await;

        match result {
            Ok(grade) => {
                transaction.commit().await?;
                info!(
                    "Recorded grade {} for student {} in {}",
                    grade.grade, student_id, subject
                );
                Ok(grade)
            }
            Err(e) => {
                transaction.rollback().await?;
                Err(e)
            }
        }
    }

    async fn upsert_grade_with_transaction(
        student_id: i64,
        subject: &str,
        score: f64,
        transaction: &mut Transaction<'_, Sqlite>,
    ) -> Result<Grade> {
        if find_student(&mut **transaction, student_id).await?.is_none() {
            return Err(AppError::not_found(format!("Student {}", student_id)));
        }

        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM grades WHERE student_id = ? AND subject = ? ORDER BY id LIMIT 1",
        )
        .bind(student_id)
        .bind(subject)
        .fetch_optional(&mut **transaction)
        .await?;

        let id = match existing {
            Some(id) => {
                debug!("Updating grade {} in place", id);
                sqlx::query("UPDATE grades SET grade = ? WHERE student_id = ? AND subject = ?")
                    .bind(score)
                    .bind(student_id)
                    .bind(subject)
                    .execute(&mut **transaction)
                    .await?;
                id
            }
            None => sqlx::query("INSERT INTO grades (student_id, subject, grade) VALUES (?, ?, ?)")
                .bind(student_id)
                .bind(subject)
                .bind(score)
                .execute(&mut **transaction)
                .await?
                .last_insert_rowid(),
        };

        Ok(Grade {
            id,
            student_id,
            subject: subject.to_string(),
            grade: score,
        })
    }

    pub async fn grades_for_student(&self, student_id: i64) -> Result<Vec<Grade>> {
        let mut conn = self.pool.acquire().await?;
        Ok(find_grades(&mut *conn, student_id).await?)
    }

    pub async fn all_grades(&self) -> Result<Vec<Grade>> {
        let grades = sqlx::query_as::<_, Grade>(
            "SELECT id, student_id, subject, grade FROM grades ORDER BY id",
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(grades)
    }

    /// Mean of the student's grades, or `None` when there are none.
    pub async fn student_average(&self, student_id: i64) -> Result<Option<f64>> {
        let mut conn = self.pool.acquire().await?;
        Ok(average_for_student(&mut *conn, student_id).await?)
    }

    /// Student, grades and average read over one connection.
    pub async fn student_report(&self, student_id: i64) -> Result<Option<StudentReport>> {
        let mut conn = self.pool.acquire().await?;

        let student = match find_student(&mut *conn, student_id).await? {
            Some(student) => student,
            None => return Ok(None),
        };
        let grades = find_grades(&mut *conn, student_id).await?;
        let average = average_for_student(&mut *conn, student_id).await?;

        Ok(Some(StudentReport {
            student,
            grades,
            average,
        }))
    }

    /// Highest grade in `subject`. Ties go to the lowest student id, then to
    /// the earliest grade row.
    pub async fn subject_topper(&self, subject: &str) -> Result<Option<SubjectTopper>> {
        let topper = sqlx::query_as::<_, SubjectTopper>(
            r#"
            SELECT s.id AS student_id, s.name, s.roll_number, g.grade
            FROM grades g
            JOIN students s ON g.student_id = s.id
            WHERE g.subject = ?
            ORDER BY g.grade DESC, s.id ASC, g.id ASC
            LIMIT 1
            "#,
        )
        .bind(subject)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(topper)
    }

    /// Mean grade in `subject` across every student, or `None` when nobody
    /// has a grade in it.
    pub async fn class_average(&self, subject: &str) -> Result<Option<f64>> {
        let avg: Option<f64> = sqlx::query_scalar("SELECT AVG(grade) FROM grades WHERE subject = ?")
            .bind(subject)
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(avg.map(round2))
    }
}

async fn find_student(conn: &mut SqliteConnection, id: i64) -> std::result::Result<Option<Student>, sqlx::Error> {
    sqlx::query_as::<_, Student>("SELECT id, name, roll_number FROM students WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

async fn find_grades(conn: &mut SqliteConnection, student_id: i64) -> std::result::Result<Vec<Grade>, sqlx::Error> {
    sqlx::query_as::<_, Grade>(
        "SELECT id, student_id, subject, grade FROM grades WHERE student_id = ? ORDER BY id",
    )
    .bind(student_id)
    .fetch_all(&mut *conn)
    .await
}

async fn average_for_student(conn: &mut SqliteConnection, student_id: i64) -> std::result::Result<Option<f64>, sqlx::Error> {
    let avg: Option<f64> = sqlx::query_scalar("SELECT AVG(grade) FROM grades WHERE student_id = ?")
        .bind(student_id)
        .fetch_one(&mut *conn)
        .await?;

    Ok(avg.map(round2))
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DbPoolStatus {
    pub total_connections: u32,
    pub active_connections: u32,
    pub idle_connections: u32,
}
