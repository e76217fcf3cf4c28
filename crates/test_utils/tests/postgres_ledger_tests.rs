//! Ledger engine against a real PostgreSQL container
//!
//! Run with `cargo test -p test_utils -- --ignored` on a machine with Docker.

use std::sync::Arc;

use rust_decimal_macros::dec;

use core_kernel::{AdapterHealth, HealthCheckable};
use domain_ledger::{
    ConversionRequest, LedgerError, LedgerStore, LedgerTx, NoteService, PaymentService,
    PmAdvanceLedger,
};
use test_utils::{
    assert_advance_within_bounds, assert_balance_identity, assert_note_converted, db_test,
    payment_at, ActorFixtures, InvoiceBuilder, NoteBuilder, TemporalFixtures, UnitFixtures,
};

db_test!(test_health_check_reports_healthy, |db| {
    let result = db.store().health_check().await;
    assert_eq!(result.status, AdapterHealth::Healthy);
    assert_eq!(result.adapter_id, "postgres-ledger-store");
});

db_test!(test_conversions_consolidate_on_one_claim_invoice, |db| {
    let unit = UnitFixtures::tower_a_1204();
    db.insert_unit(&unit).await.unwrap();
    let store = Arc::new(db.store());
    let notes = NoteService::new(store.clone());
    let actor = ActorFixtures::accountant();

    let first = notes
        .record_note(NoteBuilder::new().for_unit(unit.id).with_amount(dec!(250.00)).request())
        .await
        .unwrap();
    let second = notes
        .record_note(NoteBuilder::new().for_unit(unit.id).with_amount(dec!(100.00)).request())
        .await
        .unwrap();

    let a = notes.convert(first.id, ConversionRequest::default(), &actor).await.unwrap();
    let b = notes.convert(second.id, ConversionRequest::default(), &actor).await.unwrap();

    assert!(a.invoice_created);
    assert!(!b.invoice_created);
    assert_eq!(a.invoice.id, b.invoice.id);
    assert_eq!(b.invoice.amount, dec!(350.00));
    assert_balance_identity(&b.invoice);
    assert_note_converted(&b.note, &b.expense);

    let stored = store.get_expense(a.expense.id).await.unwrap().unwrap();
    assert_eq!(stored.converted_from_note_id, Some(first.id));
});

db_test!(test_concurrent_conversions_of_one_note_succeed_once, |db| {
    let unit = UnitFixtures::tower_a_1204();
    db.insert_unit(&unit).await.unwrap();
    let store = Arc::new(db.store());
    let notes = Arc::new(NoteService::new(store.clone()));

    let note = notes
        .record_note(NoteBuilder::new().for_unit(unit.id).with_amount(dec!(75.00)).request())
        .await
        .unwrap();
    let note_id = note.id;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let notes = notes.clone();
        handles.push(tokio::spawn(async move {
            notes
                .convert(note_id, ConversionRequest::default(), &ActorFixtures::accountant())
                .await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(LedgerError::AlreadyProcessed(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(successes, 1);

    let invoice_ids = store.list_invoice_ids(None).await.unwrap();
    assert_eq!(invoice_ids.len(), 1);
    let invoice = store.get_invoice(invoice_ids[0]).await.unwrap().unwrap();
    assert_eq!(invoice.amount, dec!(75.00));
});

db_test!(test_concurrent_draw_downs_never_overdraw, |db| {
    let unit = UnitFixtures::tower_a_1204();
    db.insert_unit(&unit).await.unwrap();
    let store = Arc::new(db.store());
    let notes = Arc::new(NoteService::new(store.clone()));
    let advances = PmAdvanceLedger::new(store.clone());

    let advance = advances
        .issue(
            ActorFixtures::project_manager().id,
            None,
            dec!(100.00),
            None,
            &ActorFixtures::accountant(),
        )
        .await
        .unwrap();
    let advance_id = advance.id;

    let mut handles = Vec::new();
    for _ in 0..5 {
        let note = notes
            .record_note(NoteBuilder::new().for_unit(unit.id).with_amount(dec!(30.00)).request())
            .await
            .unwrap();
        let notes = notes.clone();
        handles.push(tokio::spawn(async move {
            notes
                .convert(
                    note.id,
                    ConversionRequest::pm_advance(advance_id),
                    &ActorFixtures::accountant(),
                )
                .await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(LedgerError::PmAdvanceInsufficient { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(successes, 3);

    let advance = store.get_advance(advance_id).await.unwrap().unwrap();
    assert_eq!(advance.remaining_amount, dec!(10.00));
    assert_advance_within_bounds(&advance);
});

db_test!(test_second_open_claim_invoice_is_rejected, |db| {
    let unit = UnitFixtures::tower_a_1204();
    db.insert_unit(&unit).await.unwrap();
    let store = db.store();

    let mut tx = store.begin().await.unwrap();
    tx.insert_invoice(&InvoiceBuilder::claim(unit.id).build()).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let err = tx
        .insert_invoice(&InvoiceBuilder::claim(unit.id).build())
        .await
        .unwrap_err();
    assert!(err.is_conflict());
});

db_test!(test_payments_and_reconciliation, |db| {
    let unit = UnitFixtures::tower_b_0301();
    db.insert_unit(&unit).await.unwrap();
    let store = Arc::new(db.store());
    let payments = PaymentService::new(store.clone());
    let accountant = ActorFixtures::accountant();
    let admin = ActorFixtures::admin();

    let invoice = InvoiceBuilder::management(unit.id).with_amount(dec!(200.00)).build();
    let mut tx = store.begin().await.unwrap();
    tx.insert_invoice(&invoice).await.unwrap();
    tx.commit().await.unwrap();

    payments.apply_payment(invoice.id, dec!(50.00), &accountant).await.unwrap();
    let err = payments
        .apply_payment(invoice.id, dec!(200.00), &accountant)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Overpayment { max_allowed, .. } if max_allowed == dec!(150.00)
    ));

    sqlx::query("UPDATE invoices SET is_paid = TRUE, remaining_balance = 0 WHERE invoice_id = $1")
        .bind(uuid::Uuid::from(invoice.id))
        .execute(db.pool())
        .await
        .unwrap();

    let report = payments.reconcile_all(&admin).await.unwrap();
    assert_eq!(report.discrepancies().count(), 1);

    let repaired = store.get_invoice(invoice.id).await.unwrap().unwrap();
    assert_eq!(repaired.remaining_balance, dec!(150.00));
    assert!(!repaired.is_paid);
    assert_balance_identity(&repaired);

    assert!(payments.reconcile_all(&admin).await.unwrap().is_clean());
});

db_test!(test_repair_keeps_single_open_claim_per_unit, |db| {
    let unit = UnitFixtures::tower_a_1204();
    db.insert_unit(&unit).await.unwrap();
    let store = Arc::new(db.store());
    let payments = PaymentService::new(store.clone());

    let settled = InvoiceBuilder::claim(unit.id).with_amount(dec!(100.00)).build();
    let mut tx = store.begin().await.unwrap();
    tx.insert_invoice(&settled).await.unwrap();
    tx.commit().await.unwrap();
    payments
        .apply_payment(settled.id, dec!(100.00), &ActorFixtures::accountant())
        .await
        .unwrap();

    let newer = InvoiceBuilder::claim(unit.id).with_amount(dec!(40.00)).build();
    let imported = payment_at(settled.id, dec!(80.00), TemporalFixtures::year_start());
    let mut tx = store.begin().await.unwrap();
    tx.insert_invoice(&newer).await.unwrap();
    tx.insert_payment(&imported).await.unwrap();
    tx.commit().await.unwrap();

    let report = payments.repair_overpayments(&ActorFixtures::admin()).await.unwrap();
    let skipped: Vec<_> = report.unresolved().collect();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].invoice_id, settled.id);
    assert!(skipped[0].removed_payments.is_empty());

    assert!(store.get_invoice(settled.id).await.unwrap().unwrap().is_paid);
    assert_eq!(store.payments_for_invoice(settled.id).await.unwrap().len(), 2);
    assert!(!store.get_invoice(newer.id).await.unwrap().unwrap().is_paid);
});
