#![forbid(unsafe_code)]

pub mod codec;
pub mod config;
pub mod errors;
pub mod payload;
pub mod report;
pub mod schema;
pub mod state;
pub mod templates;
pub mod traffic;
pub mod types;

pub use codec::{decode_request, decode_response, encode_request, encode_response};
pub use errors::PayloadError;
pub use payload::{
    Assessment, MetricsTraffic, Request, Response, SuccessCriterionOutput, Summary, Window,
    ANALYTICS_API_PATH,
};
pub use state::LastState;
pub use traffic::{SuccessCriterion, TrafficControl};
pub use types::{CriterionType, JsonNumber, ParamMap, ParamValue, Timestamp};
