//! Plain-text export of every student and their grades.
//!
//! The dump is meant for people, not for re-import.

use std::fmt::Write;

use crate::db::{format_score, DbOperations, Grade, Student};
use crate::Result;

pub const BACKUP_FILENAME: &str = "student_backup.txt";

const HEADER: &str = "Student Data Backup\n------------------------\n";

pub fn render_backup(students: &[Student], grades: &[Grade]) -> String {
    let mut content = String::from(HEADER);

    for student in students {
        // writing into a String cannot fail
        let _ = writeln!(
            content,
            "Name: {} | Roll No: {}",
            student.name, student.roll_number
        );
        for grade in grades.iter().filter(|g| g.student_id == student.id) {
            let _ = writeln!(content, "   - {}: {}", grade.subject, format_score(grade.grade));
        }
        content.push('\n');
    }

    content
}

/// Reads students and grades concurrently and renders the dump.
pub async fn export(db: &DbOperations) -> Result<String> {
    let (students, grades) = futures::try_join!(db.list_students(), db.all_grades())?;
    Ok(render_backup(&students, &grades))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(id: i64, name: &str, roll: &str) -> Student {
        Student {
            id,
            name: name.to_string(),
            roll_number: roll.to_string(),
        }
    }

    fn grade(id: i64, student_id: i64, subject: &str, value: f64) -> Grade {
        Grade {
            id,
            student_id,
            subject: subject.to_string(),
            grade: value,
        }
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render_backup(&[], &[]), HEADER);
    }

    #[test]
    fn test_render_nests_grades_under_owner() {
        let students = vec![student(1, "Alice", "R1"), student(2, "Bob", "R2")];
        let grades = vec![
            grade(1, 2, "Math", 70.0),
            grade(2, 1, "Math", 90.0),
            grade(3, 1, "Physics", 88.5),
        ];

        let expected = "Student Data Backup\n\
                        ------------------------\n\
                        Name: Alice | Roll No: R1\n   - Math: 90.0\n   - Physics: 88.5\n\n\
                        Name: Bob | Roll No: R2\n   - Math: 70.0\n\n";
        assert_eq!(render_backup(&students, &grades), expected);
    }

    #[test]
    fn test_render_student_without_grades() {
        let out = render_backup(&[student(5, "Dana", "R5")], &[grade(1, 9, "Art", 50.0)]);
        assert_eq!(out, format!("{}Name: Dana | Roll No: R5\n\n", HEADER));
    }
}
