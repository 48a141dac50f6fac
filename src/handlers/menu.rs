use axum::{
    extract::{Json, Query, State},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::handlers::AppState;
use crate::models::MenuItem;
use crate::ApiResponse;

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct MenuQuery {
    #[param(example = "Rolls")]
    pub category: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MenuResponse {
    pub categories: Vec<String>,
    pub items: Vec<MenuItem>,
}

pub fn menu_routes() -> Router<AppState> {
    Router::new().route("/menu", get(get_menu))
}

/// The restaurant menu, optionally narrowed to one category
#[utoipa::path(
    get,
    path = "/api/v1/menu",
    params(MenuQuery),
    responses(
        (status = 200, description = "Menu items", body = crate::ApiResponse<MenuResponse>)
    ),
    tag = "Menu"
)]
pub async fn get_menu(
    State(state): State<AppState>,
    Query(query): Query<MenuQuery>,
) -> Json<ApiResponse<MenuResponse>> {
    let menu = &state.services.menu;
    let items = match query.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(category) => menu.in_category(category).into_iter().cloned().collect(),
        None => menu.items().to_vec(),
    };

    Json(ApiResponse::success(MenuResponse {
        categories: menu.categories().into_iter().map(String::from).collect(),
        items,
    }))
}
