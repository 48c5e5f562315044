use std::fmt::Display;

use dispatch_engine::db_types::ShopOrderStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The envelope every API response is wrapped in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse<T = Value> {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string(), data: None }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string(), data: None }
    }
}

impl<T: Serialize> JsonResponse<T> {
    pub fn with_data<S: Display>(message: S, data: T) -> Self {
        Self { success: true, message: message.to_string(), data: Some(data) }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: ShopOrderStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffConfirmRequest {
    pub otp: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LocationUpdate {
    pub lat: f64,
    pub long: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NearbyQuery {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOpened {
    pub session_id: String,
    pub channels: Vec<String>,
}

/// A user's own view of their profile, as synced from the auth service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub mobile: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopUpdate {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
}
