//! Embedded app shell.
//!
//! Catch-all for every non-API path. The admin loads the app in an iframe
//! with `?shop=` and `?host=` query parameters; uninstalled shops and
//! requests without a host are bounced into the handshake instead of
//! being served.

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    http::header,
    response::{Html, IntoResponse, Response},
};
use tracing::instrument;

use memodeck_core::ShopDomain;

use crate::db::InstallationRepository;
use crate::error::{AppError, Result};
use crate::state::AppState;

/// GET /{*path} - serve the embedded app shell.
///
/// The response carries a `Content-Security-Policy` limiting frame
/// ancestors to the requesting shop's admin and the platform admin, as
/// embedded apps are required to.
#[instrument(skip(state, params))]
pub async fn serve(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response> {
    let raw_shop = params
        .get("shop")
        .ok_or_else(|| AppError::BadRequest("No shop provided".to_string()))?;
    let shop = ShopDomain::parse(raw_shop)?;

    let installed = InstallationRepository::new(state.pool())
        .includes(&shop)
        .await?;
    let host = params.get("host");

    // No host means the request did not come through the admin iframe;
    // restart the handshake so the app is re-entered properly.
    if !installed || host.is_none() {
        let mut target = format!("/api/auth?shop={}", urlencoding::encode(shop.as_str()));
        if let Some(host) = host {
            target.push_str(&format!("&host={}", urlencoding::encode(host)));
        }
        tracing::info!(shop = %shop, installed, "Shell bouncing into handshake");
        return Ok(super::found(&target));
    }

    let csp = format!("frame-ancestors https://{shop} https://admin.shopify.com;");
    let page = render_shell(&state.config().shopify.api_key);

    Ok(([(header::CONTENT_SECURITY_POLICY, csp)], Html(page)).into_response())
}

fn render_shell(api_key: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <meta name="shopify-api-key" content="{api_key}" />
    <script src="https://cdn.shopify.com/shopifycloud/app-bridge.js"></script>
    <title>MemoDeck</title>
  </head>
  <body>
    <div id="app"></div>
    <script type="module" src="/assets/index.js"></script>
  </body>
</html>
"#
    )
}
