pub mod client;

pub use client::{
    ApiError, CreateStoreRequest, CreateStoreResponse, DomainCheck, StoreApi, StoreApiClient,
};
