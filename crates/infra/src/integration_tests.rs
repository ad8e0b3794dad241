//! Integration tests for the full settlement pipeline.
//!
//! Command → EventStore → EventBus → ProjectionWorker → ReadModel
//!
//! Verifies the service-level contracts: collaborator validation, document
//! numbering under concurrency, settlement arithmetic, the void window,
//! and sweep idempotence.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;

use vetdesk_billing::sequence::{DocumentSeries, SequenceGenerator, format_number};
use vetdesk_billing::{
    InvoiceId, InvoiceStatus, LineItemKind, NewLineItem, PaymentId, PaymentMethod,
};
use vetdesk_core::{ConsultationId, Money, OwnerId, PatientId, ProductId, StaffId};
use vetdesk_events::{EventEnvelope, InMemoryEventBus};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::directory::InMemoryDirectory;
use crate::event_store::InMemoryEventStore;
use crate::projections::{
    InvoiceReadModel, InvoicesProjection, OpenInvoice, OpenInvoicesProjection, PaymentReadModel,
    ReceiptsProjection,
};
use crate::read_model::InMemoryReadModelStore;
use crate::sequences::InMemorySequenceStore;
use crate::services::{
    BillingDirectories, ExpirationSweeper, InvoiceService, NewInvoice, NewPayment, PaymentReceipt,
    PaymentService,
};
use crate::workers::{ProjectionWorker, WorkerHandle};

type Store = Arc<InMemoryEventStore>;
type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
type Seq = Arc<InMemorySequenceStore>;
type InvStore = Arc<InMemoryReadModelStore<InvoiceId, InvoiceReadModel>>;
type RecStore = Arc<InMemoryReadModelStore<PaymentId, PaymentReadModel>>;
type OpenStore = Arc<InMemoryReadModelStore<InvoiceId, OpenInvoice>>;

struct BackOffice {
    invoice_service: Arc<InvoiceService<Store, Bus, Seq, InvStore>>,
    payment_service: Arc<PaymentService<Store, Bus, Seq, RecStore>>,
    sweeper: ExpirationSweeper<Store, Bus, OpenStore>,
    open_invoices: Arc<OpenInvoicesProjection<OpenStore>>,
    directory: Arc<InMemoryDirectory>,
    patient_id: PatientId,
    owner_id: OwnerId,
    staff_id: StaffId,
    _workers: Vec<WorkerHandle>,
}

fn setup() -> BackOffice {
    let store: Store = Arc::new(InMemoryEventStore::new());
    let bus: Bus = Arc::new(InMemoryEventBus::new());
    let dispatcher = Arc::new(CommandDispatcher::new(store, bus.clone()));
    let sequences = Arc::new(SequenceGenerator::new(Arc::new(
        InMemorySequenceStore::new(),
    )));

    let invoices_proj = Arc::new(InvoicesProjection::new(Arc::new(
        InMemoryReadModelStore::new(),
    )));
    let receipts_proj = Arc::new(ReceiptsProjection::new(Arc::new(
        InMemoryReadModelStore::new(),
    )));
    let open_proj = Arc::new(OpenInvoicesProjection::new(Arc::new(
        InMemoryReadModelStore::new(),
    )));

    // Subscriptions are taken before any command is dispatched, so the
    // workers never miss early events.
    let workers = vec![
        ProjectionWorker::spawn("invoices", bus.clone(), {
            let proj = invoices_proj.clone();
            move |env: EventEnvelope<JsonValue>| proj.apply_envelope(&env)
        }),
        ProjectionWorker::spawn("receipts", bus.clone(), {
            let proj = receipts_proj.clone();
            move |env: EventEnvelope<JsonValue>| proj.apply_envelope(&env)
        }),
        ProjectionWorker::spawn("open-invoices", bus.clone(), {
            let proj = open_proj.clone();
            move |env: EventEnvelope<JsonValue>| proj.apply_envelope(&env)
        }),
    ];

    let directory = Arc::new(InMemoryDirectory::new());
    let patient_id = PatientId::new();
    let owner_id = OwnerId::new();
    let staff_id = StaffId::new();
    directory.add_patient(patient_id);
    directory.add_owner(owner_id);
    directory.add_staff(staff_id, "Sam Rivera");

    let directories = BillingDirectories {
        patients: directory.clone(),
        owners: directory.clone(),
        staff: directory.clone(),
        consultations: directory.clone(),
        products: directory.clone(),
    };

    BackOffice {
        invoice_service: Arc::new(InvoiceService::new(
            dispatcher.clone(),
            sequences.clone(),
            directories.clone(),
            invoices_proj,
        )),
        payment_service: Arc::new(PaymentService::new(
            dispatcher.clone(),
            sequences,
            directories,
            receipts_proj,
        )),
        sweeper: ExpirationSweeper::new(dispatcher, open_proj.clone()),
        open_invoices: open_proj,
        directory,
        patient_id,
        owner_id,
        staff_id,
        _workers: workers,
    }
}

/// Wait for the projection workers to drain the bus.
fn wait_for_processing() {
    std::thread::sleep(StdDuration::from_millis(50));
}

fn money(s: &str) -> Money {
    s.parse().unwrap()
}

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

/// Two lines (2 × 25.00, 1 × 50.00) at 19% tax: total 119.00.
fn checkup_invoice(office: &BackOffice, due_date: Option<NaiveDate>) -> NewInvoice {
    NewInvoice {
        patient_id: office.patient_id,
        owner_id: office.owner_id,
        consultation_id: None,
        issue_date: date("2026-08-01"),
        due_date,
        tax_percent: Some(Decimal::from(19)),
        discount: None,
        lines: vec![
            NewLineItem {
                kind: LineItemKind::Consultation,
                description: "General checkup".to_string(),
                product_id: None,
                quantity: 2,
                unit_price: money("25.00"),
                notes: None,
            },
            NewLineItem {
                kind: LineItemKind::Procedure,
                description: "Vaccination".to_string(),
                product_id: None,
                quantity: 1,
                unit_price: money("50.00"),
                notes: None,
            },
        ],
        notes: None,
        issued_by: office.staff_id,
    }
}

fn pay(
    office: &BackOffice,
    invoice_id: InvoiceId,
    amount: &str,
    paid_at: DateTime<Utc>,
) -> Result<PaymentReceipt, DispatchError> {
    office.payment_service.register_payment(NewPayment {
        invoice_id,
        amount: money(amount),
        method: PaymentMethod::Cash,
        paid_at,
        received_by: office.staff_id,
        reference: None,
        bank: None,
        notes: None,
    })
}

#[test]
fn created_invoice_flows_into_read_models() {
    let office = setup();

    let created = office
        .invoice_service
        .create_invoice(checkup_invoice(&office, Some(date("2026-08-31"))))
        .unwrap();

    assert_eq!(created.number, "INV-2026-000001");
    assert_eq!(created.subtotal, money("100.00"));
    assert_eq!(created.tax_amount, money("19.00"));
    assert_eq!(created.total, money("119.00"));
    assert_eq!(created.balance_due, money("119.00"));
    assert_eq!(created.status, InvoiceStatus::Pending);

    wait_for_processing();

    let by_id = office.invoice_service.get(created.invoice_id).unwrap();
    assert_eq!(by_id, created);
    let by_number = office
        .invoice_service
        .get_by_number("INV-2026-000001")
        .unwrap();
    assert_eq!(by_number.invoice_id, created.invoice_id);

    let summary = office.open_invoices.summary(date("2026-08-08"));
    assert_eq!(summary.count, 1);
    assert_eq!(summary.total_outstanding, money("119.00"));
}

#[test]
fn create_invoice_requires_known_collaborators() {
    let office = setup();

    let mut unknown_owner = checkup_invoice(&office, None);
    unknown_owner.owner_id = OwnerId::new();
    assert!(matches!(
        office.invoice_service.create_invoice(unknown_owner),
        Err(DispatchError::NotFound(resource)) if resource == "owner"
    ));

    let mut unknown_patient = checkup_invoice(&office, None);
    unknown_patient.patient_id = PatientId::new();
    assert!(matches!(
        office.invoice_service.create_invoice(unknown_patient),
        Err(DispatchError::NotFound(resource)) if resource == "patient"
    ));

    let mut unknown_issuer = checkup_invoice(&office, None);
    unknown_issuer.issued_by = StaffId::new();
    assert!(matches!(
        office.invoice_service.create_invoice(unknown_issuer),
        Err(DispatchError::NotFound(resource)) if resource == "staff member"
    ));

    let mut unknown_consultation = checkup_invoice(&office, None);
    unknown_consultation.consultation_id = Some(ConsultationId::new());
    assert!(matches!(
        office.invoice_service.create_invoice(unknown_consultation),
        Err(DispatchError::NotFound(resource)) if resource == "consultation"
    ));

    let mut unknown_product = checkup_invoice(&office, None);
    unknown_product.lines[0].product_id = Some(ProductId::new());
    assert!(matches!(
        office.invoice_service.create_invoice(unknown_product),
        Err(DispatchError::NotFound(resource)) if resource == "product"
    ));
}

#[test]
fn create_invoice_rejects_empty_lines() {
    let office = setup();
    let mut input = checkup_invoice(&office, None);
    input.lines.clear();

    assert!(matches!(
        office.invoice_service.create_invoice(input),
        Err(DispatchError::Validation(_))
    ));
}

#[test]
fn invoice_details_carry_display_names() {
    let office = setup();

    let product_id = ProductId::new();
    office.directory.add_product(product_id, "Flea shampoo");

    let mut input = checkup_invoice(&office, None);
    input.lines[0].product_id = Some(product_id);
    input.lines[0].kind = LineItemKind::Product;

    let created = office.invoice_service.create_invoice(input).unwrap();
    wait_for_processing();

    let details = office
        .invoice_service
        .get_details(created.invoice_id)
        .unwrap();
    assert_eq!(details.issued_by_name.as_deref(), Some("Sam Rivera"));
    assert_eq!(details.lines[0].product_name.as_deref(), Some("Flea shampoo"));
    assert_eq!(details.lines[1].product_name, None);
}

#[test]
fn full_payment_settles_the_invoice() {
    let office = setup();
    let created = office
        .invoice_service
        .create_invoice(checkup_invoice(&office, Some(date("2026-08-31"))))
        .unwrap();

    let paid_at = Utc::now();
    let receipt = pay(&office, created.invoice_id, "119.00", paid_at).unwrap();
    let expected_number = format_number(DocumentSeries::Receipt, paid_at.year(), 1);
    assert_eq!(receipt.receipt_number, expected_number);
    assert_eq!(receipt.new_paid_total, money("119.00"));
    assert_eq!(receipt.new_balance_due, Money::ZERO);

    wait_for_processing();

    let invoice = office.invoice_service.get(created.invoice_id).unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Paid);
    assert_eq!(invoice.balance_due, Money::ZERO);

    let payments = office.payment_service.list_for_invoice(created.invoice_id);
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].invoice_number, "INV-2026-000001");

    let by_receipt = office
        .payment_service
        .get_by_receipt(&expected_number)
        .unwrap();
    assert_eq!(by_receipt.payment_id, receipt.payment_id);
}

#[test]
fn overpayment_is_refused_and_invoice_is_unchanged() {
    let office = setup();
    let created = office
        .invoice_service
        .create_invoice(checkup_invoice(&office, None))
        .unwrap();

    let err = pay(&office, created.invoice_id, "130.00", Utc::now()).unwrap_err();
    match &err {
        DispatchError::InsufficientBalance { amount, balance } => {
            assert_eq!(*amount, money("130.00"));
            assert_eq!(*balance, money("119.00"));
        }
        other => panic!("expected InsufficientBalance, got {other:?}"),
    }
    let message = err.to_string();
    assert!(message.contains("130.00"));
    assert!(message.contains("119.00"));

    wait_for_processing();

    let invoice = office.invoice_service.get(created.invoice_id).unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Pending);
    assert_eq!(invoice.paid_total, Money::ZERO);
    assert!(office
        .payment_service
        .list_for_invoice(created.invoice_id)
        .is_empty());
}

#[test]
fn voiding_a_payment_restores_the_balance() {
    let office = setup();
    let created = office
        .invoice_service
        .create_invoice(checkup_invoice(&office, None))
        .unwrap();

    let receipt = pay(&office, created.invoice_id, "119.00", Utc::now()).unwrap();
    wait_for_processing();

    office
        .payment_service
        .void_payment(receipt.payment_id, "charged in error")
        .unwrap();
    wait_for_processing();

    let invoice = office.invoice_service.get(created.invoice_id).unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Pending);
    assert_eq!(invoice.paid_total, Money::ZERO);
    assert_eq!(invoice.balance_due, money("119.00"));

    let payment = office.payment_service.get(receipt.payment_id).unwrap();
    assert!(!payment.active);
    assert!(payment.notes.contains("VOIDED: charged in error"));

    // A voided payment no longer counts as collected.
    let today = Utc::now().date_naive();
    assert_eq!(
        office
            .payment_service
            .total_collected(today, today)
            .unwrap(),
        Money::ZERO
    );

    // Voiding it again reports the payment as gone.
    assert!(matches!(
        office
            .payment_service
            .void_payment(receipt.payment_id, "twice"),
        Err(DispatchError::NotFound(resource)) if resource == "payment"
    ));
}

#[test]
fn void_outside_the_window_is_refused() {
    let office = setup();
    let created = office
        .invoice_service
        .create_invoice(checkup_invoice(&office, None))
        .unwrap();

    let paid_at = Utc::now() - Duration::days(31);
    let receipt = pay(&office, created.invoice_id, "119.00", paid_at).unwrap();
    wait_for_processing();

    let err = office
        .payment_service
        .void_payment(receipt.payment_id, "too late")
        .unwrap_err();
    assert!(matches!(err, DispatchError::VoidWindowExpired { .. }));

    wait_for_processing();
    let invoice = office.invoice_service.get(created.invoice_id).unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Paid);
}

#[test]
fn void_then_identical_reregistration_round_trips() {
    let office = setup();
    let created = office
        .invoice_service
        .create_invoice(checkup_invoice(&office, None))
        .unwrap();

    let paid_at = Utc::now();
    let first = pay(&office, created.invoice_id, "119.00", paid_at).unwrap();
    wait_for_processing();
    let settled = office.invoice_service.get(created.invoice_id).unwrap();

    office
        .payment_service
        .void_payment(first.payment_id, "redo")
        .unwrap();
    let second = pay(&office, created.invoice_id, "119.00", paid_at).unwrap();
    wait_for_processing();

    // Equivalent modulo receipt number and payment identity.
    let resettled = office.invoice_service.get(created.invoice_id).unwrap();
    assert_eq!(resettled.status, settled.status);
    assert_eq!(resettled.paid_total, settled.paid_total);
    assert_eq!(resettled.balance_due, settled.balance_due);
    assert_ne!(second.receipt_number, first.receipt_number);
}

#[test]
fn sweep_marks_past_due_invoices_and_is_idempotent() {
    let office = setup();

    let past_due = office
        .invoice_service
        .create_invoice(checkup_invoice(&office, Some(date("2026-08-01"))))
        .unwrap();
    let current = office
        .invoice_service
        .create_invoice(checkup_invoice(&office, Some(date("2026-12-31"))))
        .unwrap();
    let paid = office
        .invoice_service
        .create_invoice(checkup_invoice(&office, Some(date("2026-08-01"))))
        .unwrap();
    pay(&office, paid.invoice_id, "119.00", Utc::now()).unwrap();
    wait_for_processing();

    let as_of = date("2026-08-08");
    assert_eq!(office.sweeper.sweep(as_of).unwrap(), 1);
    wait_for_processing();

    assert_eq!(
        office.invoice_service.get(past_due.invoice_id).unwrap().status,
        InvoiceStatus::Overdue
    );
    assert_eq!(
        office.invoice_service.get(current.invoice_id).unwrap().status,
        InvoiceStatus::Pending
    );
    assert_eq!(
        office.invoice_service.get(paid.invoice_id).unwrap().status,
        InvoiceStatus::Paid
    );

    // Re-running the sweep transitions nothing further.
    assert_eq!(office.sweeper.sweep(as_of).unwrap(), 0);
    wait_for_processing();
    assert_eq!(
        office.invoice_service.get(past_due.invoice_id).unwrap().status,
        InvoiceStatus::Overdue
    );
}

#[test]
fn overdue_is_only_restored_by_the_next_sweep_after_a_void() {
    let office = setup();
    let created = office
        .invoice_service
        .create_invoice(checkup_invoice(&office, Some(date("2026-08-01"))))
        .unwrap();

    let receipt = pay(&office, created.invoice_id, "119.00", Utc::now()).unwrap();
    wait_for_processing();

    let as_of = date("2026-08-08");
    // Fully paid: nothing to sweep.
    assert_eq!(office.sweeper.sweep(as_of).unwrap(), 0);

    office
        .payment_service
        .void_payment(receipt.payment_id, "charged in error")
        .unwrap();
    wait_for_processing();

    // The void leaves the invoice pending, not overdue, until a sweep
    // re-evaluates the due date.
    assert_eq!(
        office.invoice_service.get(created.invoice_id).unwrap().status,
        InvoiceStatus::Pending
    );
    assert_eq!(office.sweeper.sweep(as_of).unwrap(), 1);
    wait_for_processing();
    assert_eq!(
        office.invoice_service.get(created.invoice_id).unwrap().status,
        InvoiceStatus::Overdue
    );
}

#[test]
fn concurrent_payments_cannot_overdraw_the_invoice() {
    let office = setup();
    let created = office
        .invoice_service
        .create_invoice(checkup_invoice(&office, None))
        .unwrap();

    // 119.00 due; six concurrent 60.00 payments. Only one can fit — a
    // naive read-check-write would let several through.
    let results: Vec<Result<PaymentReceipt, DispatchError>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..6)
            .map(|_| {
                let service = office.payment_service.clone();
                let invoice_id = created.invoice_id;
                let staff_id = office.staff_id;
                scope.spawn(move || {
                    service.register_payment(NewPayment {
                        invoice_id,
                        amount: money("60.00"),
                        method: PaymentMethod::Cash,
                        paid_at: Utc::now(),
                        received_by: staff_id,
                        reference: None,
                        bank: None,
                        notes: None,
                    })
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
    for result in &results {
        if let Err(err) = result {
            assert!(
                matches!(
                    err,
                    DispatchError::InsufficientBalance { .. } | DispatchError::Concurrency(_)
                ),
                "unexpected error: {err:?}"
            );
        }
    }

    std::thread::sleep(StdDuration::from_millis(100));
    let invoice = office.invoice_service.get(created.invoice_id).unwrap();
    assert_eq!(invoice.paid_total, money("60.00"));
    assert_eq!(invoice.balance_due, money("59.00"));
    assert_eq!(invoice.status, InvoiceStatus::Partial);
    assert!(!invoice.balance_due.is_negative());
}

#[test]
fn concurrent_creation_yields_unique_monotonic_numbers() {
    let office = setup();

    let template = checkup_invoice(&office, None);
    let mut numbers: Vec<String> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let service = office.invoice_service.clone();
                let template = template.clone();
                scope.spawn(move || {
                    (0..5)
                        .map(|_| service.create_invoice(template.clone()).unwrap().number)
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect()
    });

    numbers.sort();
    let mut deduped = numbers.clone();
    deduped.dedup();
    assert_eq!(numbers.len(), 20);
    assert_eq!(deduped.len(), 20, "duplicate invoice numbers were issued");

    // The allocated suffixes are exactly 1..=20: dense and monotonic.
    let mut suffixes: Vec<u64> = numbers
        .iter()
        .map(|n| n.rsplit('-').next().unwrap().parse().unwrap())
        .collect();
    suffixes.sort_unstable();
    assert_eq!(suffixes, (1..=20).collect::<Vec<u64>>());
}

#[test]
fn date_ranges_are_validated_and_totals_reported() {
    let office = setup();

    assert!(matches!(
        office
            .invoice_service
            .list_issued_between(date("2026-08-31"), date("2026-08-01")),
        Err(DispatchError::Validation(_))
    ));
    assert!(matches!(
        office
            .payment_service
            .total_collected(date("2026-08-31"), date("2026-08-01")),
        Err(DispatchError::Validation(_))
    ));

    let first = office
        .invoice_service
        .create_invoice(checkup_invoice(&office, None))
        .unwrap();
    let second = office
        .invoice_service
        .create_invoice(checkup_invoice(&office, None))
        .unwrap();

    pay(&office, first.invoice_id, "119.00", Utc::now()).unwrap();
    office
        .payment_service
        .register_payment(NewPayment {
            invoice_id: second.invoice_id,
            amount: money("19.00"),
            method: PaymentMethod::Transfer,
            paid_at: Utc::now(),
            received_by: office.staff_id,
            reference: Some("TRX-5512".to_string()),
            bank: Some("Banco Central".to_string()),
            notes: None,
        })
        .unwrap();
    wait_for_processing();

    assert_eq!(
        office
            .invoice_service
            .total_invoiced(date("2026-08-01"), date("2026-08-31"))
            .unwrap(),
        money("238.00")
    );

    let today = Utc::now().date_naive();
    assert_eq!(
        office
            .payment_service
            .total_collected(today, today)
            .unwrap(),
        money("138.00")
    );
    assert_eq!(
        office
            .payment_service
            .total_collected_by_method(PaymentMethod::Transfer, today, today)
            .unwrap(),
        money("19.00")
    );
    assert_eq!(
        office
            .payment_service
            .list_by_method(PaymentMethod::Transfer)
            .len(),
        1
    );
    assert_eq!(office.payment_service.list_received_by(office.staff_id).len(), 2);

    // Cancelled invoices drop out of the invoiced total.
    let third = office
        .invoice_service
        .create_invoice(checkup_invoice(&office, None))
        .unwrap();
    office
        .invoice_service
        .cancel_invoice(third.invoice_id, "issued twice")
        .unwrap();
    wait_for_processing();
    assert_eq!(
        office
            .invoice_service
            .total_invoiced(date("2026-08-01"), date("2026-08-31"))
            .unwrap(),
        money("238.00")
    );

    let by_owner = office.invoice_service.list_by_owner(office.owner_id);
    assert_eq!(by_owner.len(), 3);
    let cancelled = office
        .invoice_service
        .list_by_status(InvoiceStatus::Cancelled);
    assert_eq!(cancelled.len(), 1);
    assert!(cancelled[0].notes.contains("CANCELLED: issued twice"));
}
