//! Request mirroring: snapshot, per-destination dispatch, fan-out, and
//! translation of the primary's reply.

pub mod correlation;
pub mod dispatch;
pub mod events;
pub mod fanout;
pub mod snapshot;
pub mod translate;
