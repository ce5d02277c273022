//! Settings field descriptors
//!
//! The integration never renders HTML. It exposes the list of
//! credential fields it needs — key, type, label, tooltip — and an
//! external settings layer decides how to display them. Field keys
//! carry the option prefix so submitted values land on the exact
//! options the `CredentialStore` reads.

use serde::Serialize;

/// Input type of a settings field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
}

/// One settings field as consumed by the rendering layer.
#[derive(Debug, Clone, Serialize)]
pub struct FieldDescriptor {
    pub key: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub label: &'static str,
    pub tooltip: &'static str,
}

/// The credential fields for the provider connection, in display order.
pub fn settings_fields(prefix: &str) -> Vec<FieldDescriptor> {
    let field = |name: &str, label, tooltip| FieldDescriptor {
        key: format!("{prefix}{name}"),
        kind: FieldKind::Text,
        label,
        tooltip,
    };

    vec![
        field(
            "app_id",
            "APP ID",
            "Enter the App ID from the application created in Zoom",
        ),
        field(
            "client_id",
            "Client ID",
            "Enter the Client ID from the application created in Zoom",
        ),
        field(
            "client_secret",
            "Client Secret",
            "Enter the Client Secret from the application created in Zoom",
        ),
        field(
            "user_id",
            "User ID",
            "Enter the Developer Account User ID for Zoom",
        ),
        field(
            "api_key",
            "API Key",
            "Enter the Developer Account API Key from the Developer Account in Zoom",
        ),
    ]
}
