//! services/api/src/office/students.rs
//!
//! Student lookup by representative cédula. A representative may have
//! several children enrolled, so every match is returned.

use oficina_core::domain::StudentLink;

use super::OfficeService;
use crate::error::OfficeError;

impl OfficeService {
    pub(crate) async fn students_for(&self, cedula: &str) -> Result<Vec<StudentLink>, OfficeError> {
        let cedula = cedula.trim();
        let students = if cedula.is_empty() {
            Vec::new()
        } else {
            self.store.students_for_representative(cedula).await?
        };
        if students.is_empty() {
            return Err(OfficeError::NotFound(format!(
                "No se encontraron estudiantes asociados a la cédula {}.",
                cedula
            )));
        }
        Ok(students)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::adapters::MemoryLedger;
    use std::sync::Arc;

    #[tokio::test]
    async fn returns_every_linked_student() {
        let ledger = Arc::new(MemoryLedger::new());
        ledger.insert_student(student("2024-001", "Ana", "12345678", None)).await;
        ledger.insert_student(student("2024-002", "Beto", "12345678", None)).await;
        ledger.insert_student(student("2024-003", "Carla", "87654321", None)).await;
        let office = office(ledger, Arc::default());

        let matriculas: Vec<_> = office
            .students_for("12345678")
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.matricula)
            .collect();
        assert_eq!(matriculas, vec!["2024-001", "2024-002"]);
    }

    #[tokio::test]
    async fn no_match_is_not_found() {
        let office = office(Arc::new(MemoryLedger::new()), Arc::default());
        assert!(matches!(office.students_for("1").await, Err(OfficeError::NotFound(_))));
        assert!(matches!(office.students_for("").await, Err(OfficeError::NotFound(_))));
    }
}
