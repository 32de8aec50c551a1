pub use api_shared::pb;

use alinea_core::formatter::ItemPayload;
use alinea_core::{AccessError, AccessRequestId, CoreServices, DataType, EntityId, ItemId, UserId};
use api_shared::auth;
use api_shared::pb::alinea_server::Alinea;
use api_shared::HealthService;
use std::sync::Arc;
use tonic::service::Interceptor;
use tonic::{Request, Response, Status};

/// Checks the `x-api-key` metadata header on every call.
#[derive(Clone)]
pub struct ApiKeyInterceptor {
    expected: Arc<str>,
}

impl ApiKeyInterceptor {
    pub fn new(expected: impl Into<Arc<str>>) -> Self {
        Self {
            expected: expected.into(),
        }
    }
}

impl Interceptor for ApiKeyInterceptor {
    fn call(&mut self, req: Request<()>) -> Result<Request<()>, Status> {
        let api_key = req
            .metadata()
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| Status::unauthenticated("Missing x-api-key header"))?;

        auth::validate_api_key(api_key, &self.expected)?;
        Ok(req)
    }
}

/// `alinea.v1.Alinea` backed by a shared [`CoreServices`].
///
/// Status changes made here go through the same dispatcher as the REST surface, so connected
/// dashboards see them.
#[derive(Clone)]
pub struct AlineaService {
    core: CoreServices,
}

impl AlineaService {
    pub fn new(core: CoreServices) -> Self {
        Self { core }
    }
}

fn to_status(err: AccessError) -> Status {
    if err.is_invalid_input() {
        Status::invalid_argument(err.to_string())
    } else if err.is_not_found() {
        Status::not_found(err.to_string())
    } else {
        tracing::error!("gRPC request failed: {:?}", err);
        Status::internal("Internal error")
    }
}

fn item_to_pb(item: &ItemPayload) -> pb::AccessRequestItem {
    pb::AccessRequestItem {
        id: item.id.0,
        access_request_id: item.access_request_id.0,
        data_type: item.data_type.as_str().to_string(),
        data_type_display: item.data_type_display.clone(),
        status: item.status.as_str().to_string(),
        status_set_at: item
            .status_set_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_default(),
        created_at: item.created_at.to_rfc3339(),
    }
}

async fn blocking<T, F>(f: F) -> Result<T, Status>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, AccessError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Status::internal(format!("task failed: {e}")))?
        .map_err(to_status)
}

#[tonic::async_trait]
impl Alinea for AlineaService {
    async fn health(&self, _req: Request<pb::HealthReq>) -> Result<Response<pb::HealthRes>, Status> {
        Ok(Response::new(HealthService::check_health()))
    }

    async fn create_access_request(
        &self,
        req: Request<pb::CreateAccessRequestReq>,
    ) -> Result<Response<pb::CreateAccessRequestRes>, Status> {
        let req = req.into_inner();
        let data_types = DataType::parse_all(&req.data_types).map_err(to_status)?;

        let access = self.core.access.clone();
        let created = blocking(move || {
            access.create_access_request(
                EntityId(req.entity_id),
                UserId(req.user_id),
                &req.purpose,
                &data_types,
            )
        })
        .await?;

        Ok(Response::new(pb::CreateAccessRequestRes {
            access_request_id: created.id.0,
            items: created.items.iter().map(item_to_pb).collect(),
        }))
    }

    async fn set_item_status(
        &self,
        req: Request<pb::SetItemStatusReq>,
    ) -> Result<Response<pb::SetItemStatusRes>, Status> {
        let req = req.into_inner();
        let access = self.core.access.clone();
        let item = blocking(move || access.set_item_status(ItemId(req.item_id), &req.status)).await?;

        Ok(Response::new(pb::SetItemStatusRes {
            item: Some(item_to_pb(&item)),
        }))
    }

    async fn list_request_items(
        &self,
        req: Request<pb::ListRequestItemsReq>,
    ) -> Result<Response<pb::ListRequestItemsRes>, Status> {
        let request_id = AccessRequestId(req.into_inner().access_request_id);
        let access = self.core.access.clone();
        let items = blocking(move || access.list_items(request_id)).await?;

        Ok(Response::new(pb::ListRequestItemsRes {
            items: items.iter().map(item_to_pb).collect(),
        }))
    }
}
