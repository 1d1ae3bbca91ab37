// tailbatch-core - priority model, request records, device state, policy
//
// Pure types and decision logic shared by the store and the batching
// engine. Nothing in this crate performs I/O.

mod classify;
mod device;
mod policy;
mod priority;
mod request;

pub use classify::DomainClassifier;
pub use device::{DeviceState, NetworkType};
pub use policy::{evaluate, evaluate_at, Decision, PolicyOptions, LOW_BATTERY_THRESHOLD};
pub use priority::{Priority, PriorityHint};
pub use request::{fresh_request_id, host_of, DeferredRequest, OutboundRequest, RequestId};
