//! `vetdesk-billing` — the invoice/payment settlement domain.
//!
//! Owns the `Invoice` aggregate (header, line items, payment records,
//! derived totals, status), document-number series, and the collaborator
//! directory traits the settlement core consumes.

pub mod directory;
pub mod invoice;
pub mod sequence;

pub use directory::{
    ConsultationDirectory, OwnerDirectory, PatientDirectory, ProductCatalog, ProductRef,
    StaffDirectory,
};
pub use invoice::{
    CancelInvoice, INVOICE_AGGREGATE_TYPE, Invoice, InvoiceCancelled, InvoiceCommand, InvoiceEvent,
    InvoiceId, InvoiceIssued, InvoiceMarkedOverdue, InvoiceStatus, IssueInvoice, LineItem,
    LineItemKind, MarkOverdue, NewLineItem, PaymentId, PaymentMethod, PaymentRecord,
    PaymentRegistered, PaymentVoided, RegisterPayment, VOID_WINDOW_DAYS, VoidPayment,
};
pub use sequence::{DocumentSeries, SequenceGenerator, SequenceStore, format_number};
