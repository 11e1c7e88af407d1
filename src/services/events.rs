//! Post-commit event dispatch.
//!
//! Services hand events to an [`EventSink`] only after the transaction that
//! produced them has committed. Delivery to mail or messaging systems is
//! the sink's concern.

use crate::domain::DomainEvent;

pub trait EventSink: Send + Sync {
    fn publish(&self, event: &DomainEvent);
}

/// Writes each event to the structured log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn publish(&self, event: &DomainEvent) {
        match event {
            DomainEvent::TenderPublished {
                tender_id,
                reference_number,
                closing_date,
                ..
            } => tracing::info!(
                event = event.name(),
                tender_id = %tender_id,
                reference_number = %reference_number,
                closing_date = %closing_date,
                "Tender published"
            ),
            DomainEvent::TenderAwarded {
                tender_id,
                winning_bid_id,
                ..
            } => tracing::info!(
                event = event.name(),
                tender_id = %tender_id,
                winning_bid_id = %winning_bid_id,
                "Tender awarded"
            ),
            DomainEvent::BidSubmitted {
                bid_id,
                tender_id,
                bidder_id,
                ..
            } => tracing::info!(
                event = event.name(),
                bid_id = %bid_id,
                tender_id = %tender_id,
                bidder_id = %bidder_id,
                "Bid submitted"
            ),
        }
    }
}

pub(crate) fn dispatch(sink: &dyn EventSink, events: Vec<DomainEvent>) {
    for event in &events {
        sink.publish(event);
    }
}
