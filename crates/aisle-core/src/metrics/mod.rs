//! Metrics infrastructure.
//!
//! - `InternalEvent`: one struct per measurable occurrence, emitted with `emit!`
//! - `server`: Prometheus recorder and the `/metrics` endpoint

mod server;

pub use server::init_global;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

/// Macro for emitting metric events.
///
/// ```ignore
/// use aisle_core::emit;
///
/// emit!(RowsInserted { table: "supermarkets.mercadona".into(), count: 100 });
/// ```
#[macro_export]
macro_rules! emit {
    ($event:expr) => {
        $crate::metrics::InternalEvent::emit($event)
    };
}
