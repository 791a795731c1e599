//! Transport-neutral JSON boundary: request bodies in, status-coded JSON out.
//!
//! An HTTP layer only has to route the three endpoints here and copy `status` and `body` onto its
//! response.

use serde::Serialize;
use serde_json::{Value, json};
use tracing::{error, warn};

use crate::demographic::Demographic;
use crate::error::{ErrorKind, NamecastError};
use crate::ml::CancelToken;
use crate::service::NameService;
use crate::training::{TrainRequest, TrainingOptions};

pub const STATUS_OK: u16 = 200;
pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_CONFLICT: u16 = 409;
pub const STATUS_UNPROCESSABLE: u16 = 422;
pub const STATUS_INTERNAL: u16 = 500;
pub const STATUS_UNAVAILABLE: u16 = 503;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    fn ok(body: impl Serialize) -> Self {
        match serde_json::to_value(body) {
            Ok(body) => Self {
                status: STATUS_OK,
                body,
            },
            Err(err) => Self::from_error(&NamecastError::from(err)),
        }
    }

    fn malformed(err: serde_json::Error) -> Self {
        Self {
            status: STATUS_BAD_REQUEST,
            body: json!({
                "error": format!("Malformed request: {err}"),
                "kind": "bad_request",
            }),
        }
    }

    /// Map an engine error onto a status and a body that carries no internal state.
    pub fn from_error(err: &NamecastError) -> Self {
        let kind = err.kind();
        let status = match kind {
            ErrorKind::Configuration => STATUS_BAD_REQUEST,
            ErrorKind::ShapeMismatch | ErrorKind::NoTrainableData => STATUS_UNPROCESSABLE,
            ErrorKind::NoTrainedModel => STATUS_CONFLICT,
            ErrorKind::Cancelled => STATUS_UNAVAILABLE,
            ErrorKind::Internal => STATUS_INTERNAL,
        };
        let message = if kind == ErrorKind::Internal {
            error!(error = %err, "request failed");
            "Internal error".to_string()
        } else {
            warn!(error = %err, kind = kind.as_str(), "request rejected");
            err.to_string()
        };
        Self {
            status,
            body: json!({ "error": message, "kind": kind.as_str() }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// `{age, gender, location, educationLevel, ethnicity}` → ranked names with metadata.
pub fn handle_predict(service: &NameService, body: &str) -> ApiResponse {
    let demographic: Demographic = match serde_json::from_str(body) {
        Ok(demographic) => demographic,
        Err(err) => return ApiResponse::malformed(err),
    };
    match service.predict(&demographic) {
        Ok(result) => ApiResponse::ok(result),
        Err(err) => ApiResponse::from_error(&err),
    }
}

/// `{modelType, trainTestSplit, featureEngineering, hyperparameters, seed?}` → model metrics.
pub fn handle_train(service: &NameService, body: &str, cancel: &CancelToken) -> ApiResponse {
    let request: TrainRequest = match serde_json::from_str(body) {
        Ok(request) => request,
        Err(err) => return ApiResponse::malformed(err),
    };
    let outcome =
        TrainingOptions::try_from(request).and_then(|options| service.train(&options, cancel));
    match outcome {
        Ok(metrics) => ApiResponse::ok(metrics),
        Err(err) => ApiResponse::from_error(&err),
    }
}

/// Dataset statistics; takes no input.
pub fn handle_stats(service: &NameService) -> ApiResponse {
    match service.stats() {
        Ok(stats) => ApiResponse::ok(stats),
        Err(err) => ApiResponse::from_error(&err),
    }
}
