use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::client::{html, CatalogClient};
use crate::config::{Config, SearchSettings, INVENTORY_PAGE_SIZE, WILDCARD};
use crate::error::{AppError, Result};
use crate::types::{Condition, InventoryItem, StoreCandidate, WantedItem};

/// Catalog client for the live marketplace. Session cookies from `login` are
/// kept on `session`; seller search goes through a cookie-less client because
/// the search endpoint redirects logged-in sessions.
pub struct HttpCatalogClient {
    session: reqwest::Client,
    anonymous: reqwest::Client,
    base_url: String,
    store_base_url: String,
    search: SearchSettings,
}

impl HttpCatalogClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        let session = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(cfg.request_timeout)
            .build()?;
        let anonymous = reqwest::Client::builder()
            .timeout(cfg.request_timeout)
            .build()?;
        Ok(Self {
            session,
            anonymous,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            store_base_url: cfg.store_base_url.trim_end_matches('/').to_string(),
            search: cfg.search.clone(),
        })
    }
}

fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        Err(AppError::Status {
            status: status.as_u16(),
            url: resp.url().to_string(),
        })
    }
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn login(&self, username: &str, password: &str) -> Result<bool> {
        let url = format!("{}/ajax/renovate/loginandout.ajax", self.base_url);
        let params = [
            ("userid", username),
            ("password", password),
            ("override", "false"),
            ("keepme_loggedin", "true"),
            ("pageid", "MAIN"),
        ];
        let resp = self.session.post(&url).form(&params).send().await?;
        let body: LoginResponse = ensure_success(resp)?.json().await?;
        Ok(body.return_code == 0)
    }

    async fn wanted_items(&self, list_id: &str) -> Result<Vec<WantedItem>> {
        let url = format!("{}/ajax/clone/wanted/search2.ajax", self.base_url);
        let params = [
            ("showStores", "0"),
            ("storeSort", "1"),
            ("showIncomplete", "1"),
            ("showSuperlots", "1"),
            ("wantedMoreID", list_id),
            ("pageSize", "10000"),
        ];
        let resp = self.session.post(&url).form(&params).send().await?;
        let body: WantedResponse = ensure_success(resp)?.json().await?;
        Ok(body.results.wanted_items.into_iter().map(WantedItem::from).collect())
    }

    async fn search(&self, item: &WantedItem) -> Result<HashMap<String, StoreCandidate>> {
        let url = format!("{}/searchAdvanced.asp", self.base_url);
        let color = match item.color.as_deref() {
            Some(c) if c != WILDCARD => c.to_string(),
            _ => String::new(),
        };
        let condition = match item.condition.as_deref() {
            Some(c) if !c.is_empty() && c != WILDCARD => c.to_string(),
            _ => "*".to_string(),
        };
        let min_qty = item.quantity.max(1).to_string();
        let page_size = self.search.page_size.to_string();
        let params = [
            ("a", "g"),
            ("colorID", color.as_str()),
            ("q", item.number.as_str()),
            ("qMin", min_qty.as_str()),
            ("invNew", condition.as_str()),
            ("regionID", self.search.region.as_str()),
            ("saleOff", "0"),
            ("searchSort", "P"),
            ("sellerCountryID", self.search.country.as_str()),
            ("sellerLoc", "C"),
            ("shipCountryID", self.search.country.as_str()),
            ("shipTo", "Y"),
            ("sz", page_size.as_str()),
        ];
        let resp = self.anonymous.post(&url).form(&params).send().await?;
        let page = ensure_success(resp)?.text().await?;

        let sellers = html::parse_search_results(&page);
        debug!(item = %item.key(), sellers = sellers.len(), "Search parsed");
        Ok(sellers
            .into_iter()
            .map(|s| (s.username.clone(), s))
            .collect())
    }

    async fn resolve_store_id(&self, username: &str) -> Result<String> {
        let url = format!("{}/{}", self.store_base_url, username);
        let resp = self.session.get(&url).send().await?;
        let page = ensure_success(resp)?.text().await?;
        html::parse_store_id(&page)
            .ok_or_else(|| AppError::Parse(format!("no store id on the store page of {username}")))
    }

    async fn fetch_page(
        &self,
        list_id: &str,
        store_id: &str,
        page: u32,
    ) -> Result<Vec<InventoryItem>> {
        let url = format!(
            "{}/ajax/clone/store/searchitems.ajax?sort=2&pgSize={}&wantedMoreArrayID={}&bOnWantedList=1&showHomeItems=0&sid={}&pg={}",
            self.store_base_url,
            INVENTORY_PAGE_SIZE,
            list_id,
            store_id,
            page.max(1),
        );
        let resp = self.session.get(&url).send().await?;
        let body: StoreItemsResponse = ensure_success(resp)?.json().await?;
        Ok(body
            .result
            .groups
            .into_iter()
            .next()
            .map(|g| g.items.into_iter().map(InventoryItem::from).collect())
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    return_code: i64,
}

#[derive(Deserialize)]
struct WantedResponse {
    results: WantedResults,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WantedResults {
    #[serde(default)]
    wanted_items: Vec<WantedItemDto>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WantedItemDto {
    item_no: String,
    #[serde(rename = "colorID", default)]
    color_id: Value,
    #[serde(default)]
    wanted_qty: u32,
    #[serde(default)]
    wanted_new: Value,
}

impl From<WantedItemDto> for WantedItem {
    fn from(dto: WantedItemDto) -> Self {
        WantedItem {
            number: dto.item_no,
            color: Some(value_or_wildcard(&dto.color_id)),
            quantity: dto.wanted_qty,
            condition: Some(value_or_wildcard(&dto.wanted_new)),
        }
    }
}

#[derive(Deserialize)]
struct StoreItemsResponse {
    result: StoreItemsResult,
}

#[derive(Deserialize)]
struct StoreItemsResult {
    #[serde(default)]
    groups: Vec<StoreItemsGroup>,
}

#[derive(Deserialize)]
struct StoreItemsGroup {
    #[serde(default)]
    items: Vec<StoreItemDto>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreItemDto {
    item_no: String,
    #[serde(rename = "colorID", default)]
    color_id: Value,
    #[serde(default)]
    inv_qty: u32,
    #[serde(default)]
    inv_new: String,
    #[serde(default)]
    raw_converted_price: f64,
}

impl From<StoreItemDto> for InventoryItem {
    fn from(dto: StoreItemDto) -> Self {
        InventoryItem {
            number: dto.item_no,
            color: value_to_attr(&dto.color_id),
            quantity: dto.inv_qty,
            condition: if dto.inv_new == " Used" {
                Condition::Used
            } else {
                Condition::New
            },
            price: dto.raw_converted_price,
        }
    }
}

/// Empty, zero or missing attribute → None.
fn value_to_attr(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() && s != "0" => Some(s.clone()),
        Value::Number(n) if n.as_i64() != Some(0) => Some(n.to_string()),
        _ => None,
    }
}

fn value_or_wildcard(v: &Value) -> String {
    value_to_attr(v).unwrap_or_else(|| WILDCARD.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wanted_items_default_to_wildcards() {
        let body: WantedResponse = serde_json::from_value(json!({
            "results": { "wantedItems": [
                { "itemNo": "3001", "colorID": 11, "wantedQty": 8, "wantedNew": "N" },
                { "itemNo": "3622", "colorID": 0, "wantedQty": 2, "wantedNew": "" }
            ]}
        }))
        .unwrap();
        let items: Vec<WantedItem> = body.results.wanted_items.into_iter().map(WantedItem::from).collect();
        assert_eq!(items[0].key(), "3001:11:N");
        assert_eq!(items[0].quantity, 8);
        assert_eq!(items[1].key(), "3622:X:X");
    }

    #[test]
    fn store_items_map_condition_and_price() {
        let body: StoreItemsResponse = serde_json::from_value(json!({
            "result": { "groups": [ { "items": [
                { "itemNo": "3001", "colorID": 5, "invQty": 40, "invNew": " Used", "rawConvertedPrice": 0.12 },
                { "itemNo": "3001", "invQty": 3, "invNew": "New", "rawConvertedPrice": 0.3 }
            ]}]}
        }))
        .unwrap();
        let group = body.result.groups.into_iter().next().unwrap();
        let items: Vec<InventoryItem> = group.items.into_iter().map(InventoryItem::from).collect();
        assert_eq!(items[0].condition, Condition::Used);
        assert_eq!(items[0].color.as_deref(), Some("5"));
        assert_eq!(items[1].condition, Condition::New);
        assert_eq!(items[1].color, None);
        assert!((items[1].price - 0.3).abs() < 1e-9);
    }
}
