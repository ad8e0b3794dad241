//! Invoice management service.

use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use vetdesk_billing::sequence::{DocumentSeries, SequenceGenerator, SequenceStore};
use vetdesk_billing::{
    CancelInvoice, INVOICE_AGGREGATE_TYPE, Invoice, InvoiceCommand, InvoiceEvent, InvoiceId,
    InvoiceIssued, InvoiceStatus, IssueInvoice, LineItem, NewLineItem,
};
use vetdesk_core::{AggregateId, ConsultationId, Money, OwnerId, PatientId, StaffId};
use vetdesk_events::{EventBus, EventEnvelope};

use super::{BillingDirectories, MAX_DISPATCH_RETRIES};
use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::{EventStore, StoredEvent};
use crate::projections::{InvoiceReadModel, InvoicesProjection};
use crate::read_model::ReadModelStore;

/// Input for creating an invoice.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub patient_id: PatientId,
    pub owner_id: OwnerId,
    pub consultation_id: Option<ConsultationId>,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub tax_percent: Option<Decimal>,
    pub discount: Option<Money>,
    pub lines: Vec<NewLineItem>,
    pub notes: Option<String>,
    pub issued_by: StaffId,
}

/// One line with its optional catalog enrichment.
#[derive(Debug, Clone)]
pub struct LineItemView {
    pub line: LineItem,
    pub product_name: Option<String>,
}

/// An invoice enriched with display data from the directories.
#[derive(Debug, Clone)]
pub struct InvoiceDetails {
    pub invoice: InvoiceReadModel,
    pub issued_by_name: Option<String>,
    pub lines: Vec<LineItemView>,
}

/// Invoice creation, cancellation and read access.
pub struct InvoiceService<S, B, Q, R>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
    Q: SequenceStore,
    R: ReadModelStore<InvoiceId, InvoiceReadModel>,
{
    dispatcher: Arc<CommandDispatcher<S, B>>,
    sequences: Arc<SequenceGenerator<Q>>,
    directories: BillingDirectories,
    invoices: Arc<InvoicesProjection<R>>,
}

impl<S, B, Q, R> InvoiceService<S, B, Q, R>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
    Q: SequenceStore,
    R: ReadModelStore<InvoiceId, InvoiceReadModel>,
{
    pub fn new(
        dispatcher: Arc<CommandDispatcher<S, B>>,
        sequences: Arc<SequenceGenerator<Q>>,
        directories: BillingDirectories,
        invoices: Arc<InvoicesProjection<R>>,
    ) -> Self {
        Self {
            dispatcher,
            sequences,
            directories,
            invoices,
        }
    }

    /// Create an invoice: validate collaborators, allocate a document
    /// number, dispatch `IssueInvoice`.
    ///
    /// A duplicate-number conflict from the persistence layer triggers a
    /// fresh number allocation rather than a silent overwrite.
    pub fn create_invoice(&self, input: NewInvoice) -> Result<InvoiceReadModel, DispatchError> {
        self.check_references(&input)?;

        let invoice_id = InvoiceId::new(AggregateId::new());
        let year = input.issue_date.year();

        let mut attempts = 0;
        loop {
            attempts += 1;
            let number = self
                .sequences
                .next_number(DocumentSeries::Invoice, year)
                .map_err(DispatchError::from)?;

            let command = InvoiceCommand::IssueInvoice(IssueInvoice {
                invoice_id,
                number,
                patient_id: input.patient_id,
                owner_id: input.owner_id,
                consultation_id: input.consultation_id,
                issue_date: input.issue_date,
                due_date: input.due_date,
                tax_percent: input.tax_percent.unwrap_or(Decimal::ZERO),
                discount: input.discount.unwrap_or(Money::ZERO),
                lines: input.lines.clone(),
                notes: input.notes.clone(),
                issued_by: input.issued_by,
                occurred_at: Utc::now(),
            });

            match self.dispatcher.dispatch(
                invoice_id.0,
                INVOICE_AGGREGATE_TYPE,
                command,
                |id| Invoice::empty(InvoiceId::new(id)),
            ) {
                Ok(committed) => {
                    let issued = issued_payload(&committed)?;
                    info!(invoice = %issued.number, patient = %issued.patient_id, total = %issued.total, "invoice issued");
                    return Ok(InvoiceReadModel::from_issued(&issued));
                }
                Err(err)
                    if (err.is_retryable() || matches!(err, DispatchError::Conflict(_)))
                        && attempts < MAX_DISPATCH_RETRIES =>
                {
                    warn!(error = %err, attempt = attempts, "invoice creation conflicted, reallocating number");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Cancel an invoice, appending the reason to its audit notes.
    pub fn cancel_invoice(&self, invoice_id: InvoiceId, reason: &str) -> Result<(), DispatchError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let command = InvoiceCommand::CancelInvoice(CancelInvoice {
                invoice_id,
                reason: reason.to_string(),
                occurred_at: Utc::now(),
            });

            match self.dispatcher.dispatch(
                invoice_id.0,
                INVOICE_AGGREGATE_TYPE,
                command,
                |id| Invoice::empty(InvoiceId::new(id)),
            ) {
                Ok(_) => {
                    info!(invoice = %invoice_id, "invoice cancelled");
                    return Ok(());
                }
                Err(err) if err.is_retryable() && attempts < MAX_DISPATCH_RETRIES => {
                    warn!(error = %err, attempt = attempts, "cancel lost a concurrency race, retrying");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Get an invoice by id.
    pub fn get(&self, invoice_id: InvoiceId) -> Option<InvoiceReadModel> {
        self.invoices.get(&invoice_id)
    }

    /// Get an invoice by document number.
    pub fn get_by_number(&self, number: &str) -> Option<InvoiceReadModel> {
        self.invoices.get_by_number(number)
    }

    /// Latest invoice attached to a consultation.
    pub fn get_by_consultation(&self, consultation_id: ConsultationId) -> Option<InvoiceReadModel> {
        self.invoices.get_by_consultation(consultation_id)
    }

    /// An invoice enriched with staff and product display names.
    pub fn get_details(&self, invoice_id: InvoiceId) -> Option<InvoiceDetails> {
        let invoice = self.invoices.get(&invoice_id)?;
        let issued_by_name = self.directories.staff.display_name(invoice.issued_by);
        let lines = invoice
            .lines
            .iter()
            .map(|line| LineItemView {
                product_name: line
                    .product_id
                    .and_then(|id| self.directories.products.lookup(id))
                    .map(|p| p.name),
                line: line.clone(),
            })
            .collect();

        Some(InvoiceDetails {
            invoice,
            issued_by_name,
            lines,
        })
    }

    /// All invoices for an owner, newest first.
    pub fn list_by_owner(&self, owner_id: OwnerId) -> Vec<InvoiceReadModel> {
        self.invoices.list_by_owner(owner_id)
    }

    /// All invoices for a patient, newest first.
    pub fn list_by_patient(&self, patient_id: PatientId) -> Vec<InvoiceReadModel> {
        self.invoices.list_by_patient(patient_id)
    }

    /// All invoices in a status, newest first.
    pub fn list_by_status(&self, status: InvoiceStatus) -> Vec<InvoiceReadModel> {
        self.invoices.list_by_status(status)
    }

    /// All invoices issued in `[from, to]`, newest first.
    pub fn list_issued_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<InvoiceReadModel>, DispatchError> {
        if from > to {
            return Err(DispatchError::Validation(
                "start date cannot be after end date".to_string(),
            ));
        }
        Ok(self.invoices.list_issued_between(from, to))
    }

    /// Σ total of active, non-cancelled invoices issued in `[from, to]`.
    pub fn total_invoiced(&self, from: NaiveDate, to: NaiveDate) -> Result<Money, DispatchError> {
        if from > to {
            return Err(DispatchError::Validation(
                "start date cannot be after end date".to_string(),
            ));
        }
        Ok(self.invoices.total_invoiced(from, to))
    }

    fn check_references(&self, input: &NewInvoice) -> Result<(), DispatchError> {
        if !self.directories.owners.exists(input.owner_id) {
            return Err(DispatchError::NotFound("owner".to_string()));
        }
        if !self.directories.patients.exists(input.patient_id) {
            return Err(DispatchError::NotFound("patient".to_string()));
        }
        if !self.directories.staff.exists(input.issued_by) {
            return Err(DispatchError::NotFound("staff member".to_string()));
        }
        if let Some(consultation_id) = input.consultation_id {
            if !self.directories.consultations.exists(consultation_id) {
                return Err(DispatchError::NotFound("consultation".to_string()));
            }
        }
        for line in &input.lines {
            if let Some(product_id) = line.product_id {
                if self.directories.products.lookup(product_id).is_none() {
                    return Err(DispatchError::NotFound("product".to_string()));
                }
            }
        }
        Ok(())
    }
}

fn issued_payload(committed: &[StoredEvent]) -> Result<InvoiceIssued, DispatchError> {
    let first = committed.first().ok_or_else(|| {
        DispatchError::InvariantViolation("issue committed no events".to_string())
    })?;
    let event: InvoiceEvent = serde_json::from_value(first.payload.clone())
        .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
    match event {
        InvoiceEvent::InvoiceIssued(issued) => Ok(issued),
        other => Err(DispatchError::InvariantViolation(format!(
            "expected InvoiceIssued, got {other:?}"
        ))),
    }
}
