//! Props assembly for the presentation layer: list and detail views built
//! from the current query parameters and store contents.

use crate::payload::RecordId;
use crate::request::{ListQuery, SortDirection};
use crate::state::AdminState;
use crate::store::{Row, StoreError};
use serde::Serialize;

#[derive(Clone, Debug, Serialize)]
pub struct ListProps {
    pub rows: Vec<Row>,
    pub total: u64,
    pub page: u32,
    #[serde(rename = "itemsPerPage")]
    pub items_per_page: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(rename = "sortColumn", skip_serializing_if = "Option::is_none")]
    pub sort_column: Option<String>,
    #[serde(rename = "sortDirection")]
    pub sort_direction: SortDirection,
}

/// The uniform props object handed to the presentation layer. Exactly one
/// of `list`/`record` is set for a successful view; `form_values` echoes
/// the submitted payload back after a rejected mutation.
#[derive(Clone, Debug, Serialize)]
pub struct PageProps {
    pub resources: Vec<String>,
    pub resource: String,
    #[serde(rename = "basePath")]
    pub base_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list: Option<ListProps>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<Row>,
    #[serde(rename = "formValues", skip_serializing_if = "Option::is_none")]
    pub form_values: Option<serde_json::Value>,
}

impl PageProps {
    pub fn with_form_values(mut self, values: serde_json::Value) -> Self {
        self.form_values = Some(values);
        self
    }
}

fn base(state: &AdminState, resource: &crate::schema::Resource) -> PageProps {
    PageProps {
        resources: state.registry.resource_names(),
        resource: resource.name.clone(),
        base_path: state.options.base_path.clone(),
        list: None,
        record: None,
        form_values: None,
    }
}

/// Props for the create form: no store read, just the resource context.
pub fn form_props(state: &AdminState, resource: &crate::schema::Resource) -> PageProps {
    base(state, resource)
}

/// Read-only list view props for the current query. Always a fresh store
/// read so a re-render after a mutation reflects it.
pub async fn list_props(
    state: &AdminState,
    resource: &crate::schema::Resource,
    query: &ListQuery,
) -> Result<PageProps, StoreError> {
    let page = state.store.find(resource, query).await?;
    let mut props = base(state, resource);
    props.list = Some(ListProps {
        rows: page.rows,
        total: page.total,
        page: query.page,
        items_per_page: query.items_per_page,
        search: query.search.clone(),
        sort_column: query.sort_column.clone(),
        sort_direction: query.sort_direction,
    });
    Ok(props)
}

/// Detail view props; Ok(None) when the record does not exist.
pub async fn detail_props(
    state: &AdminState,
    resource: &crate::schema::Resource,
    id: &RecordId,
) -> Result<Option<PageProps>, StoreError> {
    let Some(row) = state.store.find_by_id(resource, id).await? else {
        return Ok(None);
    };
    let mut props = base(state, resource);
    props.record = Some(row);
    Ok(Some(props))
}
