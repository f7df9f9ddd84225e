//! Console module for the student tracker
//!
//! A numbered text menu over the same data operations the web
//! surface uses. The session borrows its `DbOperations`; every
//! menu action acquires and releases its own connection.

use std::io::{BufRead, Write};
use std::ops::ControlFlow;

use tracing::error;

use crate::db::models::{format_score, parse_score};
use crate::db::DbOperations;
use crate::error::{AppError, DatabaseError};
use crate::Result;

const MENU: &str = "\n========== Student Performance Tracker ==========\n\
                    1. Add Student\n\
                    2. Add Grade\n\
                    3. View Student Details\n\
                    4. Calculate Class Average\n\
                    5. Exit";

const RULE: &str = "-----------------------------";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    AddStudent,
    AddGrade,
    ViewStudent,
    ClassAverage,
    Exit,
}

impl MenuChoice {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(MenuChoice::AddStudent),
            "2" => Some(MenuChoice::AddGrade),
            "3" => Some(MenuChoice::ViewStudent),
            "4" => Some(MenuChoice::ClassAverage),
            "5" => Some(MenuChoice::Exit),
            _ => None,
        }
    }
}

pub struct Console<'a, R, W> {
    db: &'a DbOperations,
    input: R,
    output: W,
}

impl<'a, R: BufRead, W: Write> Console<'a, R, W> {
    pub fn new(db: &'a DbOperations, input: R, output: W) -> Self {
        Self { db, input, output }
    }

    /// Runs the menu until the user exits or input ends.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            writeln!(self.output, "{}", MENU)?;
            let Some(line) = self.prompt("Enter your choice (1-5): ")? else {
                break;
            };

            let Some(choice) = MenuChoice::parse(&line) else {
                writeln!(self.output, "Invalid choice! Please try again.")?;
                continue;
            };

            match self.dispatch(choice).await {
                Ok(ControlFlow::Continue(())) => {}
                Ok(ControlFlow::Break(())) => break,
                Err(e) if e.is_user_facing() => writeln!(self.output, "{}", e)?,
                Err(e @ AppError::DatabaseError(_)) => {
                    error!("Console operation failed: {}", e);
                    writeln!(self.output, "Error: {}", e)?;
                }
                Err(e) => return Err(e),
            }
        }

        writeln!(self.output, "Exiting Student Tracker. Goodbye!")?;
        self.output.flush()?;
        Ok(())
    }

    /// `Break` when the user chose to exit or input ran out mid-action.
    async fn dispatch(&mut self, choice: MenuChoice) -> Result<ControlFlow<()>> {
        match choice {
            MenuChoice::AddStudent => self.add_student().await,
            MenuChoice::AddGrade => self.add_grade().await,
            MenuChoice::ViewStudent => self.view_student().await,
            MenuChoice::ClassAverage => self.class_average().await,
            MenuChoice::Exit => Ok(ControlFlow::Break(())),
        }
    }

    async fn add_student(&mut self) -> Result<ControlFlow<()>> {
        let Some(name) = self.prompt("Enter student name: ")? else {
            return Ok(ControlFlow::Break(()));
        };
        let Some(roll) = self.prompt("Enter roll number: ")? else {
            return Ok(ControlFlow::Break(()));
        };

        match self.db.create_student(&name, &roll).await {
            Ok(student) => writeln!(self.output, "Student '{}' added successfully!", student.name)?,
            Err(AppError::DatabaseError(DatabaseError::Duplicate(_))) => {
                writeln!(self.output, "Roll number already exists!")?
            }
            Err(e) => return Err(e),
        }
        Ok(ControlFlow::Continue(()))
    }

    async fn add_grade(&mut self) -> Result<ControlFlow<()>> {
        let Some(roll) = self.prompt("Enter roll number: ")? else {
            return Ok(ControlFlow::Break(()));
        };
        let Some(subject) = self.prompt("Enter subject: ")? else {
            return Ok(ControlFlow::Break(()));
        };
        let Some(raw) = self.prompt("Enter grade (0-100): ")? else {
            return Ok(ControlFlow::Break(()));
        };

        let score = match parse_score(&raw) {
            Ok(score) => score,
            Err(AppError::ValidationError(reason)) => {
                writeln!(self.output, "Invalid grade! {}", reason)?;
                return Ok(ControlFlow::Continue(()));
            }
            Err(e) => return Err(e),
        };

        let Some(student) = self.db.get_student_by_roll(&roll).await? else {
            writeln!(self.output, "Student not found!")?;
            return Ok(ControlFlow::Continue(()));
        };

        match self.db.upsert_grade(student.id, &subject, score).await {
            Ok(grade) => writeln!(
                self.output,
                "Grade added/updated for {} in {}: {}",
                roll,
                grade.subject,
                format_score(grade.grade)
            )?,
            // deleted between lookup and write
            Err(AppError::DatabaseError(DatabaseError::NotFound(_))) => {
                writeln!(self.output, "Student not found!")?
            }
            Err(e) => return Err(e),
        }
        Ok(ControlFlow::Continue(()))
    }

    async fn view_student(&mut self) -> Result<ControlFlow<()>> {
        let Some(roll) = self.prompt("Enter roll number: ")? else {
            return Ok(ControlFlow::Break(()));
        };

        let Some(student) = self.db.get_student_by_roll(&roll).await? else {
            writeln!(self.output, "Student not found!")?;
            return Ok(ControlFlow::Continue(()));
        };
        let Some(report) = self.db.student_report(student.id).await? else {
            writeln!(self.output, "Student not found!")?;
            return Ok(ControlFlow::Continue(()));
        };

        writeln!(self.output, "\n{}", RULE)?;
        writeln!(self.output, "Name: {}", report.student.name)?;
        writeln!(self.output, "Roll Number: {}", report.student.roll_number)?;
        writeln!(self.output, "Grades:")?;
        if report.grades.is_empty() {
            writeln!(self.output, "  No grades added yet.")?;
        } else {
            for grade in &report.grades {
                writeln!(self.output, "  {}: {}", grade.subject, format_score(grade.grade))?;
            }
        }
        if let Some(average) = report.average {
            writeln!(self.output, "Average: {:.2}", average)?;
        }
        writeln!(self.output, "{}\n", RULE)?;
        Ok(ControlFlow::Continue(()))
    }

    async fn class_average(&mut self) -> Result<ControlFlow<()>> {
        let Some(subject) = self.prompt("Enter subject name: ")? else {
            return Ok(ControlFlow::Break(()));
        };

        match self.db.class_average(&subject).await? {
            Some(avg) => writeln!(self.output, "Class average in {}: {:.2}", subject, avg)?,
            None => writeln!(self.output, "No grades entered for {} yet.", subject)?,
        }
        Ok(ControlFlow::Continue(()))
    }

    /// Prints `label` and reads one trimmed line. `None` at end of input.
    fn prompt(&mut self, label: &str) -> Result<Option<String>> {
        write!(self.output, "{}", label)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn setup_test_db() -> (DbOperations, TempDir) {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let url = format!("sqlite:{}", dir.path().join("console.db").display());
        let db = DbOperations::new_with_options(&url, 1, Duration::from_secs(5))
            .await
            .expect("Failed to open test database");
        db.init_schema().await.expect("Failed to create schema");
        (db, dir)
    }

    async fn run_script(db: &DbOperations, script: &str) -> String {
        let mut out = Vec::new();
        Console::new(db, Cursor::new(script.to_string()), &mut out)
            .run()
            .await
            .expect("console session failed");
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_menu_choice_parse() {
        assert_eq!(MenuChoice::parse(" 1 "), Some(MenuChoice::AddStudent));
        assert_eq!(MenuChoice::parse("5"), Some(MenuChoice::Exit));
        assert_eq!(MenuChoice::parse("6"), None);
        assert_eq!(MenuChoice::parse("one"), None);
    }

    #[tokio::test]
    async fn test_add_and_view_student() {
        let (db, _dir) = setup_test_db().await;

        let out = run_script(
            &db,
            "1\nAlice\nR1\n2\nR1\nMath\n90\n2\nR1\nPhysics\n75\n3\nR1\n5\n",
        )
        .await;

        assert!(out.contains("Student 'Alice' added successfully!"));
        assert!(out.contains("Grade added/updated for R1 in Math: 90.0"));
        assert!(out.contains("Name: Alice"));
        assert!(out.contains("Roll Number: R1"));
        assert!(out.contains("  Math: 90.0"));
        assert!(out.contains("  Physics: 75.0"));
        assert!(out.contains("Average: 82.50"));
        assert!(out.ends_with("Exiting Student Tracker. Goodbye!\n"));
    }

    #[tokio::test]
    async fn test_duplicate_and_missing_students() {
        let (db, _dir) = setup_test_db().await;

        let out = run_script(
            &db,
            "1\nAlice\nR1\n1\nBob\nR1\n2\nR9\nMath\n50\n3\nR9\n5\n",
        )
        .await;

        assert!(out.contains("Roll number already exists!"));
        assert_eq!(out.matches("Student not found!").count(), 2);
        assert_eq!(db.list_students().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_grade_validation_and_upsert() {
        let (db, _dir) = setup_test_db().await;

        let out = run_script(
            &db,
            "1\nAlice\nR1\n2\nR1\nMath\nabc\n2\nR1\nMath\n120\n2\nR1\nMath\n90\n2\nR1\nMath\n70\n5\n",
        )
        .await;

        assert_eq!(out.matches("Invalid grade!").count(), 2);

        let alice = db.get_student_by_roll("R1").await.unwrap().unwrap();
        let grades = db.grades_for_student(alice.id).await.unwrap();
        assert_eq!(grades.len(), 1);
        assert_eq!(grades[0].grade, 70.0);
    }

    #[tokio::test]
    async fn test_view_student_without_grades() {
        let (db, _dir) = setup_test_db().await;

        let out = run_script(&db, "1\nAlice\nR1\n3\nR1\n5\n").await;

        assert!(out.contains("  No grades added yet."));
        assert!(!out.contains("Average:"));
    }

    #[tokio::test]
    async fn test_class_average() {
        let (db, _dir) = setup_test_db().await;

        let out = run_script(
            &db,
            "1\nA\nR1\n1\nB\nR2\n1\nC\nR3\n\
             2\nR1\nMath\n100\n2\nR2\nMath\n80\n2\nR3\nMath\n60\n\
             4\nMath\n4\nArt\n5\n",
        )
        .await;

        assert!(out.contains("Class average in Math: 80.00"));
        assert!(out.contains("No grades entered for Art yet."));
    }

    #[tokio::test]
    async fn test_invalid_choice_and_end_of_input() {
        let (db, _dir) = setup_test_db().await;

        let out = run_script(&db, "9\n1\nAlice\n").await;

        assert!(out.contains("Invalid choice! Please try again."));
        assert!(out.ends_with("Exiting Student Tracker. Goodbye!\n"));
        assert!(db.list_students().await.unwrap().is_empty());
    }
}
