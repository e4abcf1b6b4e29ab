//! HTTP request handlers for the browsing server

use axum::{
    extract::{Path, Query, State, rejection::QueryRejection},
    response::{Html, IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::browse::error::BrowseError;
use crate::browse::html;
use crate::browse::server::BrowseState;
use crate::config::ResponseFormat;
use crate::error::ModelError;
use crate::parser::parse_filter;

/// Welcome response
#[derive(Debug, Serialize)]
pub struct WelcomeResponse {
    pub message: String,
    pub status: u16,
}

/// Table list response
#[derive(Debug, Serialize)]
pub struct TablesResponse {
    pub tables: Vec<String>,
    pub count: usize,
}

/// Query parameters of `GET /tables/{name}`
#[derive(Debug, Default, Deserialize)]
pub struct RowsParams {
    pub limit: Option<u64>,
    /// Filter expression, e.g. `rating>=3,header='good'`
    #[serde(rename = "where")]
    pub filter: Option<String>,
}

pub async fn welcome(State(state): State<Arc<BrowseState>>) -> Response {
    match state.format {
        ResponseFormat::Json => Json(WelcomeResponse {
            message: "Welcome to litemodel".to_string(),
            status: 200,
        })
        .into_response(),
        ResponseFormat::Html => Html(html::welcome_page()).into_response(),
    }
}

pub async fn list_tables(State(state): State<Arc<BrowseState>>) -> Response {
    let result = state.catalog.table_names().await.map(|tables| match state.format {
        ResponseFormat::Json => Json(TablesResponse {
            count: tables.len(),
            tables,
        })
        .into_response(),
        ResponseFormat::Html => Html(html::tables_page(&tables)).into_response(),
    });
    render(&state, result.map_err(BrowseError::from))
}

pub async fn table_rows(
    State(state): State<Arc<BrowseState>>,
    Path(table): Path<String>,
    params: Result<Query<RowsParams>, QueryRejection>,
) -> Response {
    let result = match params {
        Ok(Query(params)) => fetch_table(&state, &table, params).await,
        Err(rejection) => Err(ModelError::Query(rejection.body_text()).into()),
    };
    render(&state, result)
}

async fn fetch_table(
    state: &BrowseState,
    table: &str,
    params: RowsParams,
) -> Result<Response, BrowseError> {
    let mut filter = parse_filter(params.filter.as_deref().unwrap_or(""))?;
    if let Some(limit) = params.limit.or(state.row_limit) {
        filter = filter.limit(limit);
    }

    let rows = state.catalog.fetch_rows(table, &filter).await?;
    tracing::debug!(table, count = rows.count, "served table rows");

    Ok(match state.format {
        ResponseFormat::Json => Json(rows).into_response(),
        ResponseFormat::Html => Html(html::table_page(&rows)).into_response(),
    })
}

/// Fallback for every path outside `/` and `/tables`.
pub async fn missing_tables(State(state): State<Arc<BrowseState>>) -> Response {
    render(&state, Err(BrowseError::MissingTables))
}

fn render(state: &BrowseState, result: Result<Response, BrowseError>) -> Response {
    match result {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(code = e.code(), "request failed: {}", e);
            match state.format {
                ResponseFormat::Json => e.into_response(),
                ResponseFormat::Html => e.into_html_response(),
            }
        }
    }
}
