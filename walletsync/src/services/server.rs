// Copyright (c) WalletSync Contributors
// SPDX-License-Identifier: Apache-2.0

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::{error, info};

use super::{
    BusinessRegisterRequest, BusinessRegisterResponse, BusinessService, ExportAddressesRequest,
    ExportAddressesResponse, ReturnCode, SetTokenAddressRequest, SetTokenAddressResponse,
    SignTransactionRequest, SignTransactionResponse, UnsignTransactionRequest,
    UnsignTransactionResponse,
};
use crate::error::WalletError;

pub const BUSINESS_REGISTER_PATH: &str = "/v1/business/register";
pub const EXPORT_ADDRESSES_PATH: &str = "/v1/addresses/export";
pub const UNSIGN_TRANSACTION_PATH: &str = "/v1/transaction/unsigned";
pub const SIGN_TRANSACTION_PATH: &str = "/v1/transaction/signed";
pub const SET_TOKEN_ADDRESS_PATH: &str = "/v1/token/set";

pub fn run_server(
    socket_address: SocketAddr,
    service: BusinessService,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!(%socket_address, "business rpc server listening");
        let listener = tokio::net::TcpListener::bind(socket_address).await.unwrap();
        axum::serve(listener, make_router(Arc::new(service)).into_make_service())
            .await
            .unwrap();
    })
}

pub(crate) fn make_router(service: Arc<BusinessService>) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .route(BUSINESS_REGISTER_PATH, post(handle_business_register))
        .route(EXPORT_ADDRESSES_PATH, post(handle_export_addresses))
        .route(UNSIGN_TRANSACTION_PATH, post(handle_unsign_transaction))
        .route(SIGN_TRANSACTION_PATH, post(handle_sign_transaction))
        .route(SET_TOKEN_ADDRESS_PATH, post(handle_set_token_address))
        .with_state(service)
}

async fn health_check() -> StatusCode {
    StatusCode::OK
}

fn log_internal_error(operation: &str, err: &WalletError) {
    error!(operation, error = %err, "service operation failed");
}

async fn handle_business_register(
    State(service): State<Arc<BusinessService>>,
    Json(request): Json<BusinessRegisterRequest>,
) -> Json<BusinessRegisterResponse> {
    match service.business_register(request).await {
        Ok(response) => Json(response),
        Err(err) => {
            log_internal_error("business_register", &err);
            Json(BusinessRegisterResponse {
                code: ReturnCode::Error,
                msg: err.to_string(),
            })
        }
    }
}

async fn handle_export_addresses(
    State(service): State<Arc<BusinessService>>,
    Json(request): Json<ExportAddressesRequest>,
) -> Json<ExportAddressesResponse> {
    match service.export_addresses_by_public_keys(request).await {
        Ok(response) => Json(response),
        Err(err) => {
            log_internal_error("export_addresses_by_public_keys", &err);
            Json(ExportAddressesResponse {
                code: ReturnCode::Error,
                msg: err.to_string(),
                addresses: Vec::new(),
            })
        }
    }
}

async fn handle_unsign_transaction(
    State(service): State<Arc<BusinessService>>,
    Json(request): Json<UnsignTransactionRequest>,
) -> Json<UnsignTransactionResponse> {
    match service.create_unsign_transaction(request).await {
        Ok(response) => Json(response),
        Err(err) => {
            log_internal_error("create_unsign_transaction", &err);
            Json(UnsignTransactionResponse {
                code: ReturnCode::Error,
                msg: err.to_string(),
                transaction_id: String::new(),
                un_sign_tx: "0x00".into(),
            })
        }
    }
}

async fn handle_sign_transaction(
    State(service): State<Arc<BusinessService>>,
    Json(request): Json<SignTransactionRequest>,
) -> Json<SignTransactionResponse> {
    match service.build_signed_transaction(request).await {
        Ok(response) => Json(response),
        Err(err) => {
            log_internal_error("build_signed_transaction", &err);
            Json(SignTransactionResponse {
                code: ReturnCode::Error,
                msg: err.to_string(),
                signed_tx: String::new(),
            })
        }
    }
}

async fn handle_set_token_address(
    State(service): State<Arc<BusinessService>>,
    Json(request): Json<SetTokenAddressRequest>,
) -> Json<SetTokenAddressResponse> {
    match service.set_token_address(request).await {
        Ok(response) => Json(response),
        Err(err) => {
            log_internal_error("set_token_address", &err);
            Json(SetTokenAddressResponse {
                code: ReturnCode::Error,
                msg: err.to_string(),
            })
        }
    }
}
