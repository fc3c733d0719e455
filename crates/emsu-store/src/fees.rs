//! [`FeeStructure`]s and [`FeePayment`]s.
//!
//! Payment status is derived by the caller from the cumulative amount paid
//! (see `emsu_shared::fees`); this module only persists it.

use rusqlite::{params, OptionalExtension};
use rust_decimal::Decimal;
use uuid::Uuid;

use emsu_shared::constants::MAX_FEE_AMOUNT;
use emsu_shared::{FeeStatus, Term};

use crate::codec::{
    decimal_at, enum_at, now, opt_enum_at, opt_id, opt_ts, opt_ts_at, opt_uuid_at, ts, ts_at,
    uuid_at,
};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{FeePayment, FeeStructure, NewFeePayment, NewFeeStructure};

const STRUCTURE_COLUMNS: &str =
    "id, name, amount, class_id, academic_session_id, term, is_optional, created_at";

const PAYMENT_COLUMNS: &str = "id, student_id, fee_structure_id, amount_paid, payment_method,
     transaction_ref, status, paid_at, created_at";

impl Database {
    // ------------------------------------------------------------------
    // Structures
    // ------------------------------------------------------------------

    pub fn create_fee_structure(&self, new: &NewFeeStructure) -> Result<FeeStructure> {
        if new.amount <= Decimal::ZERO {
            return Err(StoreError::Validation("fee amount must be positive".into()));
        }
        check_ceiling(new.amount)?;

        let structure = FeeStructure {
            id: Uuid::new_v4(),
            name: new.name.clone(),
            amount: new.amount,
            class_id: new.class_id,
            academic_session_id: new.academic_session_id,
            term: new.term,
            is_optional: new.is_optional,
            created_at: now(),
        };

        self.conn().execute(
            "INSERT INTO fee_structures (id, name, amount, class_id, academic_session_id, term,
                                         is_optional, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                structure.id.to_string(),
                structure.name,
                structure.amount.to_string(),
                opt_id(structure.class_id),
                opt_id(structure.academic_session_id),
                structure.term.map(|t| t.as_str()),
                structure.is_optional,
                ts(&structure.created_at),
            ],
        )?;
        Ok(structure)
    }

    pub fn get_fee_structure(&self, id: Uuid) -> Result<Option<FeeStructure>> {
        let structure = self
            .conn()
            .query_row(
                &format!("SELECT {STRUCTURE_COLUMNS} FROM fee_structures WHERE id = ?1"),
                params![id.to_string()],
                row_to_structure,
            )
            .optional()?;
        Ok(structure)
    }

    /// Fees charged to a class, by name. With a term, structures bound to
    /// that term plus those without a term.
    pub fn list_fee_structures_by_class(&self, class_id: Uuid, term: Option<Term>) -> Result<Vec<FeeStructure>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {STRUCTURE_COLUMNS} FROM fee_structures
             WHERE class_id = ?1 AND (?2 IS NULL OR term IS NULL OR term = ?2)
             ORDER BY name ASC, rowid ASC"
        ))?;
        let rows = stmt.query_map(
            params![class_id.to_string(), term.map(|t| t.as_str())],
            row_to_structure,
        )?;

        let mut structures = Vec::new();
        for row in rows {
            structures.push(row?);
        }
        Ok(structures)
    }

    // ------------------------------------------------------------------
    // Payments
    // ------------------------------------------------------------------

    /// Persist a payment with an already derived status.
    pub fn insert_fee_payment(&self, new: &NewFeePayment, status: FeeStatus) -> Result<FeePayment> {
        if new.amount_paid <= Decimal::ZERO {
            return Err(StoreError::Validation("payment amount must be positive".into()));
        }
        check_ceiling(new.amount_paid)?;

        let now = now();
        let payment = FeePayment {
            id: Uuid::new_v4(),
            student_id: new.student_id,
            fee_structure_id: new.fee_structure_id,
            amount_paid: new.amount_paid,
            payment_method: new.payment_method.clone(),
            transaction_ref: new.transaction_ref.clone(),
            status,
            paid_at: Some(now),
            created_at: now,
        };

        self.conn().execute(
            "INSERT INTO fee_payments (id, student_id, fee_structure_id, amount_paid,
                                       payment_method, transaction_ref, status, paid_at,
                                       created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                payment.id.to_string(),
                payment.student_id.to_string(),
                payment.fee_structure_id.to_string(),
                payment.amount_paid.to_string(),
                payment.payment_method,
                payment.transaction_ref,
                payment.status.as_str(),
                opt_ts(payment.paid_at.as_ref()),
                ts(&payment.created_at),
            ],
        )?;

        tracing::info!(
            payment = %payment.id,
            student = %payment.student_id,
            amount = %payment.amount_paid,
            status = %payment.status,
            "fee payment recorded"
        );
        Ok(payment)
    }

    /// A student's payments, newest first.
    pub fn list_fee_payments_by_student(&self, student_id: Uuid) -> Result<Vec<FeePayment>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM fee_payments
             WHERE student_id = ?1
             ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map(params![student_id.to_string()], row_to_payment)?;

        let mut payments = Vec::new();
        for row in rows {
            payments.push(row?);
        }
        Ok(payments)
    }

    /// Cumulative amount a student has paid against one structure.
    pub fn total_paid(&self, student_id: Uuid, fee_structure_id: Uuid) -> Result<Decimal> {
        let mut stmt = self.conn().prepare(
            "SELECT amount_paid FROM fee_payments
             WHERE student_id = ?1 AND fee_structure_id = ?2",
        )?;
        let rows = stmt.query_map(
            params![student_id.to_string(), fee_structure_id.to_string()],
            |row| decimal_at(row, 0),
        )?;

        let mut amounts = Vec::new();
        for row in rows {
            amounts.push(row?);
        }
        sum_amounts(amounts)
    }

    /// Sum of every payment made to structures of the given school's classes.
    pub fn total_revenue_for_school(&self, school_id: Uuid) -> Result<Decimal> {
        let mut stmt = self.conn().prepare(
            "SELECT p.amount_paid FROM fee_payments p
             JOIN fee_structures f ON f.id = p.fee_structure_id
             JOIN classes c ON c.id = f.class_id
             WHERE c.school_id = ?1",
        )?;
        let rows = stmt.query_map(params![school_id.to_string()], |row| decimal_at(row, 0))?;

        let mut amounts = Vec::new();
        for row in rows {
            amounts.push(row?);
        }
        sum_amounts(amounts)
    }
}

fn check_ceiling(amount: Decimal) -> Result<()> {
    if amount > Decimal::from(MAX_FEE_AMOUNT) {
        return Err(StoreError::Validation(format!(
            "amount exceeds the maximum of {MAX_FEE_AMOUNT}"
        )));
    }
    Ok(())
}

/// Exact sum of `amounts`; overflow is a validation failure, not a panic.
pub fn sum_amounts(amounts: impl IntoIterator<Item = Decimal>) -> Result<Decimal> {
    amounts.into_iter().try_fold(Decimal::ZERO, |total, amount| {
        total
            .checked_add(amount)
            .ok_or_else(|| StoreError::Validation("amount total overflows".into()))
    })
}

fn row_to_structure(row: &rusqlite::Row<'_>) -> rusqlite::Result<FeeStructure> {
    Ok(FeeStructure {
        id: uuid_at(row, 0)?,
        name: row.get(1)?,
        amount: decimal_at(row, 2)?,
        class_id: opt_uuid_at(row, 3)?,
        academic_session_id: opt_uuid_at(row, 4)?,
        term: opt_enum_at(row, 5)?,
        is_optional: row.get(6)?,
        created_at: ts_at(row, 7)?,
    })
}

fn row_to_payment(row: &rusqlite::Row<'_>) -> rusqlite::Result<FeePayment> {
    Ok(FeePayment {
        id: uuid_at(row, 0)?,
        student_id: uuid_at(row, 1)?,
        fee_structure_id: uuid_at(row, 2)?,
        amount_paid: decimal_at(row, 3)?,
        payment_method: row.get(4)?,
        transaction_ref: row.get(5)?,
        status: enum_at(row, 6)?,
        paid_at: opt_ts_at(row, 7)?,
        created_at: ts_at(row, 8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    fn structure(db: &Database, class_id: Uuid, name: &str, amount: i64, term: Option<Term>) -> FeeStructure {
        db.create_fee_structure(&NewFeeStructure {
            name: name.into(),
            amount: Decimal::from(amount),
            class_id: Some(class_id),
            academic_session_id: None,
            term,
            is_optional: false,
        })
        .unwrap()
    }

    fn pay(student_id: Uuid, fee_structure_id: Uuid, amount: i64) -> NewFeePayment {
        NewFeePayment {
            student_id,
            fee_structure_id,
            amount_paid: Decimal::from(amount),
            payment_method: Some("bank_transfer".into()),
            transaction_ref: None,
        }
    }

    #[test]
    fn structures_by_class_and_term() {
        let db = testutil::db();
        let school = testutil::school(&db, None, None);
        let class = testutil::class(&db, school.id, "JSS1");

        let tuition = structure(&db, class.id, "Tuition Fee", 80_000, Some(Term::First));
        let books = structure(&db, class.id, "Books", 10_000, None);
        structure(&db, class.id, "Excursion", 5_000, Some(Term::Second));

        let first: Vec<_> = db
            .list_fee_structures_by_class(class.id, Some(Term::First))
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(first, [books.id, tuition.id]);
        assert_eq!(db.list_fee_structures_by_class(class.id, None).unwrap().len(), 3);
        assert_eq!(db.get_fee_structure(tuition.id).unwrap(), Some(tuition));
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        let db = testutil::db();
        let school = testutil::school(&db, None, None);
        let class = testutil::class(&db, school.id, "JSS1");
        let err = db
            .create_fee_structure(&NewFeeStructure {
                name: "Free".into(),
                amount: Decimal::ZERO,
                class_id: Some(class.id),
                academic_session_id: None,
                term: None,
                is_optional: true,
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let fee = structure(&db, class.id, "Tuition Fee", 100, None);
        let (_, student) = testutil::student(&db, Some(school.id), Some(class.id), "S-1");
        assert!(matches!(
            db.insert_fee_payment(&pay(student.id, fee.id, 0), FeeStatus::Pending),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn payments_accumulate() {
        let db = testutil::db();
        let school = testutil::school(&db, None, None);
        let class = testutil::class(&db, school.id, "JSS1");
        let (_, student) = testutil::student(&db, Some(school.id), Some(class.id), "S-1");
        let fee = structure(&db, class.id, "Tuition Fee", 50_000, None);

        assert_eq!(db.total_paid(student.id, fee.id).unwrap(), Decimal::ZERO);

        let first = db
            .insert_fee_payment(&pay(student.id, fee.id, 20_000), FeeStatus::Partial)
            .unwrap();
        let second = db
            .insert_fee_payment(&pay(student.id, fee.id, 30_000), FeeStatus::Paid)
            .unwrap();

        assert_eq!(db.total_paid(student.id, fee.id).unwrap(), Decimal::from(50_000));
        assert_eq!(db.total_revenue_for_school(school.id).unwrap(), Decimal::from(50_000));

        let history = db.list_fee_payments_by_student(student.id).unwrap();
        assert_eq!(history, vec![second, first]);
    }

    #[test]
    fn amounts_above_ceiling_are_rejected() {
        let db = testutil::db();
        let school = testutil::school(&db, None, None);
        let class = testutil::class(&db, school.id, "JSS1");
        let (_, student) = testutil::student(&db, Some(school.id), Some(class.id), "S-1");
        let fee = structure(&db, class.id, "Tuition Fee", 100, None);

        let huge = NewFeePayment {
            amount_paid: Decimal::MAX,
            ..pay(student.id, fee.id, 1)
        };
        assert!(matches!(
            db.insert_fee_payment(&huge, FeeStatus::Paid),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            db.create_fee_structure(&NewFeeStructure {
                name: "Endowment".into(),
                amount: Decimal::from(MAX_FEE_AMOUNT) + Decimal::ONE,
                class_id: Some(class.id),
                academic_session_id: None,
                term: None,
                is_optional: false,
            }),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn overflowing_totals_are_validation_errors() {
        let db = testutil::db();
        let school = testutil::school(&db, None, None);
        let class = testutil::class(&db, school.id, "JSS1");
        let (_, student) = testutil::student(&db, Some(school.id), Some(class.id), "S-1");
        let fee = structure(&db, class.id, "Tuition Fee", 100, None);

        // rows written before the ceiling existed
        for _ in 0..2 {
            db.conn()
                .execute(
                    "INSERT INTO fee_payments (id, student_id, fee_structure_id, amount_paid,
                                               status, created_at)
                     VALUES (?1, ?2, ?3, ?4, 'paid', ?5)",
                    params![
                        Uuid::new_v4().to_string(),
                        student.id.to_string(),
                        fee.id.to_string(),
                        Decimal::MAX.to_string(),
                        ts(&now()),
                    ],
                )
                .unwrap();
        }

        assert!(matches!(
            db.total_paid(student.id, fee.id),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            db.total_revenue_for_school(school.id),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            sum_amounts([Decimal::MAX, Decimal::ONE]),
            Err(StoreError::Validation(_))
        ));
        assert_eq!(sum_amounts([Decimal::ONE, Decimal::from(2)]).unwrap(), Decimal::from(3));
    }
}
