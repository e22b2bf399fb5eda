//! axum adapter for [`RequestRouter`].
//!
//! Every method and path is forwarded; routing decisions stay in the
//! router so the same flows run behind any host.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, Uri};

use crate::request::{BotResponse, InboundRequest};
use crate::router::RequestRouter;

/// Build an axum router forwarding all requests to `router`.
pub fn routes(router: Arc<RequestRouter>) -> Router {
    Router::new().fallback(forward).with_state(router)
}

async fn forward(
    State(router): State<Arc<RequestRouter>>,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> BotResponse {
    let request = InboundRequest {
        path: uri.path().to_string(),
        query,
        headers,
        body,
    };
    router.handle(request).await
}
