//! Fee payments and per-student balances.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use emsu_shared::constants::MAX_FEE_AMOUNT;
use emsu_shared::fees::balance;
use emsu_shared::FeeStatus;
use emsu_store::fees::sum_amounts;
use emsu_store::{Database, FeePayment, FeeStructure, NewFeePayment};

use crate::error::ServerError;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPaymentRequest {
    pub student_id: Uuid,
    pub fee_structure_id: Uuid,
    pub amount_paid: Decimal,
    pub payment_method: Option<String>,
    pub transaction_ref: Option<String>,
}

/// Settlement of one fee structure for one student.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeLine {
    pub structure: FeeStructure,
    pub paid: Decimal,
    pub balance: Decimal,
    pub status: FeeStatus,
}

/// Record a payment. Its status reflects everything paid against the
/// structure so far, this payment included.
pub fn record_payment(db: &Database, req: RecordPaymentRequest) -> Result<FeePayment, ServerError> {
    if req.amount_paid <= Decimal::ZERO {
        return Err(ServerError::BadRequest("amountPaid must be positive".into()));
    }
    if req.amount_paid > Decimal::from(MAX_FEE_AMOUNT) {
        return Err(ServerError::BadRequest(format!(
            "amountPaid must not exceed {MAX_FEE_AMOUNT}"
        )));
    }
    let structure = db
        .get_fee_structure(req.fee_structure_id)?
        .ok_or_else(|| ServerError::NotFound("Fee structure".into()))?;
    db.get_student(req.student_id)?
        .ok_or_else(|| ServerError::NotFound("Student".into()))?;

    let paid = sum_amounts([db.total_paid(req.student_id, structure.id)?, req.amount_paid])?;
    let status = FeeStatus::derive(structure.amount, paid);

    let payment = db.insert_fee_payment(
        &NewFeePayment {
            student_id: req.student_id,
            fee_structure_id: structure.id,
            amount_paid: req.amount_paid,
            payment_method: req.payment_method,
            transaction_ref: req.transaction_ref,
        },
        status,
    )?;
    Ok(payment)
}

/// One line per fee structure of the student's class. A student without a
/// class owes nothing.
pub fn breakdown(db: &Database, student_id: Uuid) -> Result<Vec<FeeLine>, ServerError> {
    let student = db
        .get_student(student_id)?
        .ok_or_else(|| ServerError::NotFound("Student".into()))?;
    let Some(class_id) = student.class_id else {
        return Ok(Vec::new());
    };

    let mut lines = Vec::new();
    for structure in db.list_fee_structures_by_class(class_id, None)? {
        let paid = db.total_paid(student.id, structure.id)?;
        lines.push(FeeLine {
            status: FeeStatus::derive(structure.amount, paid),
            balance: balance(structure.amount, paid),
            paid,
            structure,
        });
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use emsu_store::NewFeeStructure;

    fn structure(db: &Database, class_id: Uuid, amount: i64) -> FeeStructure {
        db.create_fee_structure(&NewFeeStructure {
            name: "Tuition".into(),
            amount: Decimal::from(amount),
            class_id: Some(class_id),
            academic_session_id: None,
            term: None,
            is_optional: false,
        })
        .unwrap()
    }

    fn pay(student_id: Uuid, fee_structure_id: Uuid, amount: i64) -> RecordPaymentRequest {
        RecordPaymentRequest {
            student_id,
            fee_structure_id,
            amount_paid: Decimal::from(amount),
            payment_method: Some("transfer".into()),
            transaction_ref: None,
        }
    }

    #[test]
    fn full_payment_settles_structure() {
        let db = testutil::db();
        let school = testutil::school(&db, None, None);
        let class = testutil::class(&db, school.id, "JSS1");
        let (_, student) = testutil::student(&db, school.id, Some(class.id));
        let tuition = structure(&db, class.id, 80_000);

        let payment = record_payment(&db, pay(student.id, tuition.id, 80_000)).unwrap();
        assert_eq!(payment.status, FeeStatus::Paid);

        let lines = breakdown(&db, student.id).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].status, FeeStatus::Paid);
        assert_eq!(lines[0].balance, Decimal::ZERO);
    }

    #[test]
    fn payments_accumulate() {
        let db = testutil::db();
        let school = testutil::school(&db, None, None);
        let class = testutil::class(&db, school.id, "JSS1");
        let (_, student) = testutil::student(&db, school.id, Some(class.id));
        let tuition = structure(&db, class.id, 50_000);

        let first = record_payment(&db, pay(student.id, tuition.id, 20_000)).unwrap();
        assert_eq!(first.status, FeeStatus::Partial);
        let line = &breakdown(&db, student.id).unwrap()[0];
        assert_eq!(line.balance, Decimal::from(30_000));

        let second = record_payment(&db, pay(student.id, tuition.id, 30_000)).unwrap();
        assert_eq!(second.status, FeeStatus::Paid);
    }

    #[test]
    fn unpaid_structure_is_pending() {
        let db = testutil::db();
        let school = testutil::school(&db, None, None);
        let class = testutil::class(&db, school.id, "JSS1");
        let (_, student) = testutil::student(&db, school.id, Some(class.id));
        structure(&db, class.id, 10_000);

        let line = &breakdown(&db, student.id).unwrap()[0];
        assert_eq!(line.status, FeeStatus::Pending);
        assert_eq!(line.paid, Decimal::ZERO);
        assert_eq!(line.balance, Decimal::from(10_000));
    }

    #[test]
    fn classless_student_owes_nothing() {
        let db = testutil::db();
        let school = testutil::school(&db, None, None);
        let (_, student) = testutil::student(&db, school.id, None);
        assert!(breakdown(&db, student.id).unwrap().is_empty());
    }

    #[test]
    fn bad_payments_are_rejected() {
        let db = testutil::db();
        let school = testutil::school(&db, None, None);
        let class = testutil::class(&db, school.id, "JSS1");
        let (_, student) = testutil::student(&db, school.id, Some(class.id));
        let tuition = structure(&db, class.id, 1_000);

        assert!(matches!(
            record_payment(&db, pay(student.id, tuition.id, 0)),
            Err(ServerError::BadRequest(_))
        ));
        assert!(matches!(
            record_payment(&db, pay(Uuid::new_v4(), tuition.id, 10)),
            Err(ServerError::NotFound(_))
        ));
        assert!(matches!(
            record_payment(&db, pay(student.id, Uuid::new_v4(), 10)),
            Err(ServerError::NotFound(_))
        ));
    }

    #[test]
    fn oversized_payments_are_rejected_without_panicking() {
        let db = testutil::db();
        let school = testutil::school(&db, None, None);
        let class = testutil::class(&db, school.id, "JSS1");
        let (_, student) = testutil::student(&db, school.id, Some(class.id));
        let tuition = structure(&db, class.id, 1_000);

        for _ in 0..2 {
            let huge = RecordPaymentRequest {
                amount_paid: Decimal::MAX,
                ..pay(student.id, tuition.id, 1)
            };
            assert!(matches!(
                record_payment(&db, huge),
                Err(ServerError::BadRequest(_))
            ));
        }
        assert!(db.list_fee_payments_by_student(student.id).unwrap().is_empty());

        let capped = record_payment(&db, pay(student.id, tuition.id, MAX_FEE_AMOUNT)).unwrap();
        assert_eq!(capped.status, FeeStatus::Paid);
    }
}
