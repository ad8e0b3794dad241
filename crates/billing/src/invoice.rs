use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use vetdesk_core::{
    Aggregate, AggregateId, AggregateRoot, ConsultationId, DomainError, Money, OwnerId, PatientId,
    ProductId, StaffId,
};
use vetdesk_events::Event;

/// Days after `paid_at` during which a payment may still be voided.
pub const VOID_WINDOW_DAYS: i64 = 30;

/// Aggregate type tag on the invoice event stream.
pub const INVOICE_AGGREGATE_TYPE: &str = "billing.invoice";

/// Invoice identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(pub AggregateId);

impl InvoiceId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Payment identifier (payments live on the invoice stream).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(pub AggregateId);

impl PaymentId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PaymentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Invoice status lifecycle.
///
/// `Pending` → `Partial`/`Paid` through payments; a sweep may push a
/// non-paid, non-cancelled invoice past its due date to `Overdue`;
/// `Cancelled` is reachable only while nothing has been paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    Partial,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    /// Terminal for settlement purposes: the sweep skips these.
    pub fn is_settled(&self) -> bool {
        matches!(self, InvoiceStatus::Paid | InvoiceStatus::Cancelled)
    }
}

/// What a line item bills for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineItemKind {
    Consultation,
    Product,
    Service,
    Procedure,
    Lodging,
}

/// How a payment was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    DebitCard,
    CreditCard,
    Transfer,
    Check,
    Other,
}

/// Line item input as provided by the caller (subtotal not yet derived).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLineItem {
    pub kind: LineItemKind,
    pub description: String,
    pub product_id: Option<ProductId>,
    pub quantity: u32,
    pub unit_price: Money,
    pub notes: Option<String>,
}

/// Billed line on an issued invoice. `subtotal = quantity × unit_price`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub line_no: u32,
    pub kind: LineItemKind,
    pub description: String,
    pub product_id: Option<ProductId>,
    pub quantity: u32,
    pub unit_price: Money,
    pub subtotal: Money,
    pub notes: Option<String>,
}

/// A payment recorded against an invoice.
///
/// `active` flips to `false` when the payment is voided; only active
/// payments contribute to the invoice's `paid_total`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub payment_id: PaymentId,
    pub receipt_number: String,
    pub paid_at: DateTime<Utc>,
    pub amount: Money,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub bank: Option<String>,
    pub notes: String,
    pub received_by: StaffId,
    pub active: bool,
}

/// Aggregate root: Invoice.
///
/// The single writer of invoice totals and status. Payment records are part
/// of this aggregate's state, so a payment and the balance it changes are
/// always committed in one append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    id: InvoiceId,
    number: Option<String>,
    patient_id: Option<PatientId>,
    owner_id: Option<OwnerId>,
    consultation_id: Option<ConsultationId>,
    issued_by: Option<StaffId>,
    issue_date: Option<NaiveDate>,
    due_date: Option<NaiveDate>,
    status: InvoiceStatus,
    lines: Vec<LineItem>,
    tax_percent: Decimal,
    discount: Money,
    subtotal: Money,
    tax_amount: Money,
    total: Money,
    paid_total: Money,
    balance_due: Money,
    payments: Vec<PaymentRecord>,
    notes: String,
    active: bool,
    created_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Invoice {
    /// Create an empty, not-yet-issued aggregate instance for rehydration.
    pub fn empty(id: InvoiceId) -> Self {
        Self {
            id,
            number: None,
            patient_id: None,
            owner_id: None,
            consultation_id: None,
            issued_by: None,
            issue_date: None,
            due_date: None,
            status: InvoiceStatus::Pending,
            lines: Vec::new(),
            tax_percent: Decimal::ZERO,
            discount: Money::ZERO,
            subtotal: Money::ZERO,
            tax_amount: Money::ZERO,
            total: Money::ZERO,
            paid_total: Money::ZERO,
            balance_due: Money::ZERO,
            payments: Vec::new(),
            notes: String::new(),
            active: false,
            created_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> InvoiceId {
        self.id
    }

    pub fn number(&self) -> Option<&str> {
        self.number.as_deref()
    }

    pub fn status(&self) -> InvoiceStatus {
        self.status
    }

    pub fn issue_date(&self) -> Option<NaiveDate> {
        self.issue_date
    }

    pub fn due_date(&self) -> Option<NaiveDate> {
        self.due_date
    }

    pub fn lines(&self) -> &[LineItem] {
        &self.lines
    }

    pub fn payments(&self) -> &[PaymentRecord] {
        &self.payments
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub fn tax_amount(&self) -> Money {
        self.tax_amount
    }

    pub fn discount(&self) -> Money {
        self.discount
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn paid_total(&self) -> Money {
        self.paid_total
    }

    pub fn balance_due(&self) -> Money {
        self.balance_due
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Invariant: payments are refused on cancelled invoices, and a payment
    /// can never exceed the remaining balance.
    pub fn can_accept_payment(&self) -> bool {
        self.status != InvoiceStatus::Cancelled && self.balance_due.is_positive()
    }
}

impl AggregateRoot for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: IssueInvoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueInvoice {
    pub invoice_id: InvoiceId,
    pub number: String,
    pub patient_id: PatientId,
    pub owner_id: OwnerId,
    pub consultation_id: Option<ConsultationId>,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub tax_percent: Decimal,
    pub discount: Money,
    pub lines: Vec<NewLineItem>,
    pub notes: Option<String>,
    pub issued_by: StaffId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelInvoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelInvoice {
    pub invoice_id: InvoiceId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RegisterPayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterPayment {
    pub invoice_id: InvoiceId,
    pub payment_id: PaymentId,
    pub receipt_number: String,
    pub amount: Money,
    pub method: PaymentMethod,
    pub paid_at: DateTime<Utc>,
    pub reference: Option<String>,
    pub bank: Option<String>,
    pub notes: Option<String>,
    pub received_by: StaffId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: VoidPayment.
///
/// The 30-day window is evaluated against `occurred_at`, keeping the
/// decision deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoidPayment {
    pub invoice_id: InvoiceId,
    pub payment_id: PaymentId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkOverdue.
///
/// Emits nothing when the invoice has no due date, is not yet due, or is
/// already paid/cancelled/overdue — which is what makes the sweep
/// idempotent and safely re-runnable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkOverdue {
    pub invoice_id: InvoiceId,
    pub as_of: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceCommand {
    IssueInvoice(IssueInvoice),
    CancelInvoice(CancelInvoice),
    RegisterPayment(RegisterPayment),
    VoidPayment(VoidPayment),
    MarkOverdue(MarkOverdue),
}

impl vetdesk_events::Command for InvoiceCommand {
    fn target_aggregate_id(&self) -> AggregateId {
        match self {
            InvoiceCommand::IssueInvoice(c) => c.invoice_id.0,
            InvoiceCommand::CancelInvoice(c) => c.invoice_id.0,
            InvoiceCommand::RegisterPayment(c) => c.invoice_id.0,
            InvoiceCommand::VoidPayment(c) => c.invoice_id.0,
            InvoiceCommand::MarkOverdue(c) => c.invoice_id.0,
        }
    }
}

/// Event: InvoiceIssued. Carries the derived totals so projections never
/// recompute them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceIssued {
    pub invoice_id: InvoiceId,
    pub number: String,
    pub patient_id: PatientId,
    pub owner_id: OwnerId,
    pub consultation_id: Option<ConsultationId>,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub tax_percent: Decimal,
    pub discount: Money,
    pub lines: Vec<LineItem>,
    pub subtotal: Money,
    pub tax_amount: Money,
    pub total: Money,
    pub notes: Option<String>,
    pub issued_by: StaffId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceCancelled {
    pub invoice_id: InvoiceId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRegistered {
    pub invoice_id: InvoiceId,
    pub payment: PaymentRecord,
    pub new_paid_total: Money,
    pub new_balance_due: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentVoided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentVoided {
    pub invoice_id: InvoiceId,
    pub payment_id: PaymentId,
    pub reason: String,
    pub new_paid_total: Money,
    pub new_balance_due: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceMarkedOverdue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceMarkedOverdue {
    pub invoice_id: InvoiceId,
    pub as_of: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceEvent {
    InvoiceIssued(InvoiceIssued),
    InvoiceCancelled(InvoiceCancelled),
    PaymentRegistered(PaymentRegistered),
    PaymentVoided(PaymentVoided),
    InvoiceMarkedOverdue(InvoiceMarkedOverdue),
}

impl Event for InvoiceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InvoiceEvent::InvoiceIssued(_) => "billing.invoice.issued",
            InvoiceEvent::InvoiceCancelled(_) => "billing.invoice.cancelled",
            InvoiceEvent::PaymentRegistered(_) => "billing.invoice.payment_registered",
            InvoiceEvent::PaymentVoided(_) => "billing.invoice.payment_voided",
            InvoiceEvent::InvoiceMarkedOverdue(_) => "billing.invoice.marked_overdue",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InvoiceEvent::InvoiceIssued(e) => e.occurred_at,
            InvoiceEvent::InvoiceCancelled(e) => e.occurred_at,
            InvoiceEvent::PaymentRegistered(e) => e.occurred_at,
            InvoiceEvent::PaymentVoided(e) => e.occurred_at,
            InvoiceEvent::InvoiceMarkedOverdue(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Invoice {
    type Command = InvoiceCommand;
    type Event = InvoiceEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InvoiceEvent::InvoiceIssued(e) => {
                self.id = e.invoice_id;
                self.number = Some(e.number.clone());
                self.patient_id = Some(e.patient_id);
                self.owner_id = Some(e.owner_id);
                self.consultation_id = e.consultation_id;
                self.issued_by = Some(e.issued_by);
                self.issue_date = Some(e.issue_date);
                self.due_date = e.due_date;
                self.status = InvoiceStatus::Pending;
                self.lines = e.lines.clone();
                self.tax_percent = e.tax_percent;
                self.discount = e.discount;
                self.subtotal = e.subtotal;
                self.tax_amount = e.tax_amount;
                self.total = e.total;
                self.paid_total = Money::ZERO;
                self.balance_due = e.total;
                self.notes = e.notes.clone().unwrap_or_default();
                self.active = true;
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            InvoiceEvent::InvoiceCancelled(e) => {
                self.status = InvoiceStatus::Cancelled;
                append_note(&mut self.notes, "CANCELLED", &e.reason);
            }
            InvoiceEvent::PaymentRegistered(e) => {
                self.payments.push(e.payment.clone());
                self.paid_total = e.new_paid_total;
                self.balance_due = e.new_balance_due;
                self.status = if e.new_balance_due.is_positive() {
                    InvoiceStatus::Partial
                } else {
                    InvoiceStatus::Paid
                };
            }
            InvoiceEvent::PaymentVoided(e) => {
                if let Some(p) = self
                    .payments
                    .iter_mut()
                    .find(|p| p.payment_id == e.payment_id)
                {
                    p.active = false;
                    append_note(&mut p.notes, "VOIDED", &e.reason);
                }
                self.paid_total = e.new_paid_total;
                self.balance_due = e.new_balance_due;
                // Voiding does not restore a previous Overdue status; the
                // next sweep re-evaluates the due date.
                self.status = if e.new_paid_total.is_zero() {
                    InvoiceStatus::Pending
                } else {
                    InvoiceStatus::Partial
                };
            }
            InvoiceEvent::InvoiceMarkedOverdue(_) => {
                self.status = InvoiceStatus::Overdue;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InvoiceCommand::IssueInvoice(cmd) => self.handle_issue(cmd),
            InvoiceCommand::CancelInvoice(cmd) => self.handle_cancel(cmd),
            InvoiceCommand::RegisterPayment(cmd) => self.handle_register_payment(cmd),
            InvoiceCommand::VoidPayment(cmd) => self.handle_void_payment(cmd),
            InvoiceCommand::MarkOverdue(cmd) => self.handle_mark_overdue(cmd),
        }
    }
}

fn append_note(notes: &mut String, tag: &str, reason: &str) {
    if !notes.is_empty() {
        notes.push('\n');
    }
    notes.push_str(tag);
    notes.push_str(": ");
    notes.push_str(reason);
}

impl Invoice {
    fn handle_issue(&self, cmd: &IssueInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("invoice already exists"));
        }

        if cmd.lines.is_empty() {
            return Err(DomainError::validation(
                "cannot issue an invoice without line items",
            ));
        }
        if cmd.tax_percent < Decimal::ZERO {
            return Err(DomainError::validation("tax percent cannot be negative"));
        }
        if cmd.discount.is_negative() {
            return Err(DomainError::validation("discount cannot be negative"));
        }

        let mut lines = Vec::with_capacity(cmd.lines.len());
        let mut subtotal = Money::ZERO;
        for (idx, line) in cmd.lines.iter().enumerate() {
            let line_no = (idx + 1) as u32;
            if line.quantity < 1 {
                return Err(DomainError::validation(format!(
                    "line {line_no}: quantity must be at least 1"
                )));
            }
            if !line.unit_price.is_positive() {
                return Err(DomainError::validation(format!(
                    "line {line_no}: unit price must be positive"
                )));
            }

            let line_subtotal = line.unit_price.times(line.quantity);
            subtotal = subtotal
                .checked_add(line_subtotal)
                .ok_or_else(|| DomainError::invariant("invoice subtotal overflow"))?;

            lines.push(LineItem {
                line_no,
                kind: line.kind,
                description: line.description.clone(),
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
                subtotal: line_subtotal,
                notes: line.notes.clone(),
            });
        }

        let tax_amount = if cmd.tax_percent > Decimal::ZERO {
            subtotal.percent(cmd.tax_percent)
        } else {
            Money::ZERO
        };

        let total = subtotal
            .checked_add(tax_amount)
            .and_then(|t| t.checked_sub(cmd.discount))
            .ok_or_else(|| DomainError::invariant("invoice total overflow"))?;
        if total.is_negative() {
            return Err(DomainError::validation(
                "discount exceeds the taxed subtotal",
            ));
        }

        Ok(vec![InvoiceEvent::InvoiceIssued(InvoiceIssued {
            invoice_id: cmd.invoice_id,
            number: cmd.number.clone(),
            patient_id: cmd.patient_id,
            owner_id: cmd.owner_id,
            consultation_id: cmd.consultation_id,
            issue_date: cmd.issue_date,
            due_date: cmd.due_date,
            tax_percent: cmd.tax_percent,
            discount: cmd.discount,
            lines,
            subtotal,
            tax_amount,
            total,
            notes: cmd.notes.clone(),
            issued_by: cmd.issued_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found("invoice"));
        }
        if self.status == InvoiceStatus::Cancelled {
            return Err(DomainError::conflict("invoice is already cancelled"));
        }
        if self.status == InvoiceStatus::Paid {
            return Err(DomainError::validation("cannot cancel a paid invoice"));
        }
        if self.paid_total.is_positive() {
            return Err(DomainError::validation(
                "cannot cancel an invoice with registered payments",
            ));
        }

        Ok(vec![InvoiceEvent::InvoiceCancelled(InvoiceCancelled {
            invoice_id: cmd.invoice_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_register_payment(
        &self,
        cmd: &RegisterPayment,
    ) -> Result<Vec<InvoiceEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found("invoice"));
        }
        if self.status == InvoiceStatus::Cancelled {
            return Err(DomainError::validation(
                "cannot register a payment on a cancelled invoice",
            ));
        }
        if !cmd.amount.is_positive() {
            return Err(DomainError::validation("payment amount must be positive"));
        }
        if self
            .payments
            .iter()
            .any(|p| p.payment_id == cmd.payment_id)
        {
            return Err(DomainError::conflict("payment already registered"));
        }
        if cmd.amount > self.balance_due {
            return Err(DomainError::insufficient_balance(
                cmd.amount,
                self.balance_due,
            ));
        }

        let new_paid_total = self
            .paid_total
            .checked_add(cmd.amount)
            .ok_or_else(|| DomainError::invariant("paid total overflow"))?;
        let new_balance_due = self
            .total
            .checked_sub(new_paid_total)
            .ok_or_else(|| DomainError::invariant("balance due underflow"))?;

        Ok(vec![InvoiceEvent::PaymentRegistered(PaymentRegistered {
            invoice_id: cmd.invoice_id,
            payment: PaymentRecord {
                payment_id: cmd.payment_id,
                receipt_number: cmd.receipt_number.clone(),
                paid_at: cmd.paid_at,
                amount: cmd.amount,
                method: cmd.method,
                reference: cmd.reference.clone(),
                bank: cmd.bank.clone(),
                notes: cmd.notes.clone().unwrap_or_default(),
                received_by: cmd.received_by,
                active: true,
            },
            new_paid_total,
            new_balance_due,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_void_payment(&self, cmd: &VoidPayment) -> Result<Vec<InvoiceEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found("invoice"));
        }

        // A payment that was already voided is as gone as one that never
        // existed.
        let payment = self
            .payments
            .iter()
            .find(|p| p.payment_id == cmd.payment_id && p.active)
            .ok_or_else(|| DomainError::not_found("payment"))?;

        if cmd.occurred_at > payment.paid_at + Duration::days(VOID_WINDOW_DAYS) {
            return Err(DomainError::void_window_expired(payment.paid_at));
        }

        let new_paid_total = self
            .paid_total
            .checked_sub(payment.amount)
            .ok_or_else(|| DomainError::invariant("paid total underflow"))?;
        let new_balance_due = self
            .total
            .checked_sub(new_paid_total)
            .ok_or_else(|| DomainError::invariant("balance due underflow"))?;

        Ok(vec![InvoiceEvent::PaymentVoided(PaymentVoided {
            invoice_id: cmd.invoice_id,
            payment_id: cmd.payment_id,
            reason: cmd.reason.clone(),
            new_paid_total,
            new_balance_due,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_overdue(&self, cmd: &MarkOverdue) -> Result<Vec<InvoiceEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found("invoice"));
        }

        let Some(due_date) = self.due_date else {
            return Ok(vec![]);
        };
        if due_date >= cmd.as_of {
            return Ok(vec![]);
        }
        if self.status.is_settled() || self.status == InvoiceStatus::Overdue || !self.active {
            return Ok(vec![]);
        }

        Ok(vec![InvoiceEvent::InvoiceMarkedOverdue(
            InvoiceMarkedOverdue {
                invoice_id: cmd.invoice_id,
                as_of: cmd.as_of,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}
