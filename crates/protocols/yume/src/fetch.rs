//! Yume state discovery via the Sui read API
//!
//! An order book keeps its orders in a child table keyed by order id, so a
//! snapshot is one read of the book summary, a paginated walk of the table's
//! dynamic fields, then one read per entry. Records that fail to parse are
//! skipped and logged; transport failures abort the fetch so the caller keeps
//! its previous snapshot.

use futures::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use sui_rpc_client::{de, queries, DynamicFieldInfo, ReadApi, SuiObject};
use yume_core::{MarketDescriptor, ProtocolError};

use crate::constants::{self, ENTRY_FETCH_CONCURRENCY};
use crate::state::{LoanPosition, Order, OrderBookSnapshot, OrderSide, PoolState, PositionStatus};

/// Order book summary: the id bound and the child table holding orders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookSummary {
    pub book_id: String,
    /// Next id the book will assign; every existing order id is below it
    pub next_order_id: u64,
    pub orders_table_id: String,
}

/// Read the order book summary object.
pub async fn fetch_book_summary<R: ReadApi + ?Sized>(
    api: &R,
    market: &MarketDescriptor,
) -> Result<BookSummary, ProtocolError> {
    let book_id = market.orderbook_id.as_str();
    if market.orderbook_id.is_empty() {
        return Err(ProtocolError::MarketNotConfigured {
            market_id: market.id.clone(),
        });
    }

    let object = api
        .get_object(book_id)
        .await?
        .ok_or_else(|| ProtocolError::StateUnavailable {
            reason: format!("order book {} not found", book_id),
        })?;

    let raw: RawBook =
        serde_json::from_value(object.fields.clone()).map_err(|e| ProtocolError::RecordParse {
            object_id: book_id.to_string(),
            message: e.to_string(),
        })?;

    Ok(BookSummary {
        book_id: book_id.to_string(),
        next_order_id: raw.next_order_id,
        orders_table_id: de::value_as_string(&raw.orders),
    })
}

/// Rebuild the order book of a market.
///
/// Inactive orders are dropped. Asks are sorted by rate ascending and bids
/// descending, ties kept in fetch order.
pub async fn fetch_order_book<R: ReadApi + ?Sized>(
    api: &R,
    market: &MarketDescriptor,
    page_size: usize,
) -> Result<OrderBookSnapshot, ProtocolError> {
    let summary = fetch_book_summary(api, market).await?;
    if summary.next_order_id == 0 {
        return Ok(OrderBookSnapshot::empty(summary.book_id));
    }
    if summary.orders_table_id.is_empty() {
        return Err(ProtocolError::StateUnavailable {
            reason: format!("order book {} has no order table", summary.book_id),
        });
    }

    let entries =
        queries::collect_dynamic_fields(api, &summary.orders_table_id, page_size).await?;

    let pending: Vec<_> = entries
        .iter()
        .map(|info| async move { (info, api.get_object(&info.object_id).await) })
        .collect();
    let fetched: Vec<_> = stream::iter(pending)
        .buffered(ENTRY_FETCH_CONCURRENCY)
        .collect()
        .await;

    let mut orders = Vec::with_capacity(fetched.len());
    for (info, result) in fetched {
        let object = match result? {
            Some(object) => object,
            None => {
                tracing::debug!(entry_id = %info.object_id, "Order entry vanished, skipping");
                continue;
            }
        };
        match parse_order(info, &object) {
            Ok(order) => orders.push(order),
            Err(e) => {
                tracing::debug!(
                    entry_id = %info.object_id,
                    error = %e,
                    "Skipping unparseable order entry"
                );
            }
        }
    }

    tracing::debug!(
        book_id = %summary.book_id,
        entries = entries.len(),
        parsed = orders.len(),
        "Order book fetched"
    );

    Ok(OrderBookSnapshot::from_orders(
        summary.book_id,
        summary.next_order_id,
        orders,
    ))
}

/// Loan positions owned by `owner`, optionally limited to one order book.
///
/// An empty owner (no wallet connected) yields no positions without a request.
pub async fn fetch_positions<R: ReadApi + ?Sized>(
    api: &R,
    market: &MarketDescriptor,
    owner: &str,
    book_id: Option<&str>,
    page_size: usize,
) -> Result<Vec<LoanPosition>, ProtocolError> {
    if market.package_id.trim().is_empty() {
        return Err(ProtocolError::MarketNotConfigured {
            market_id: market.id.clone(),
        });
    }
    if owner.trim().is_empty() {
        return Ok(Vec::new());
    }

    let struct_type = constants::position_struct_type(&market.package_id);
    let objects = queries::collect_owned_objects(api, owner, &struct_type, page_size).await?;

    let mut positions = Vec::with_capacity(objects.len());
    for object in &objects {
        match parse_position(object) {
            Ok(position) => positions.push(position),
            Err(e) => {
                tracing::debug!(
                    object_id = %object.object_id,
                    error = %e,
                    "Skipping unparseable loan position"
                );
            }
        }
    }

    if let Some(book) = book_id.filter(|b| !b.trim().is_empty()) {
        positions.retain(|p| p.is_on_book(book));
    }

    Ok(positions)
}

/// Read a liquidity pool, resolving its available balance.
///
/// The balance is taken from an inline field when the pool renders one,
/// otherwise from the child record whose key names it. A missing child
/// record means nothing is available.
pub async fn fetch_pool<R: ReadApi + ?Sized>(
    api: &R,
    pool_id: &str,
    page_size: usize,
) -> Result<PoolState, ProtocolError> {
    if pool_id.trim().is_empty() {
        return Err(ProtocolError::StateUnavailable {
            reason: "pool address is empty".to_string(),
        });
    }

    let object = api
        .get_object(pool_id)
        .await?
        .ok_or_else(|| ProtocolError::StateUnavailable {
            reason: format!("pool {} not found", pool_id),
        })?;

    let raw: RawPool =
        serde_json::from_value(object.fields.clone()).map_err(|e| ProtocolError::RecordParse {
            object_id: pool_id.to_string(),
            message: e.to_string(),
        })?;

    let inline = raw.available.as_ref().or(raw.available_balance.as_ref());
    let available_balance = match inline {
        Some(value) => de::value_as_u64(value),
        None => fetch_available_balance(api, pool_id, page_size).await?,
    };

    Ok(PoolState {
        id: pool_id.to_string(),
        admin: raw.admin,
        book_id: raw.book_id,
        total_shares: raw.total_shares,
        available_balance,
        deployed_balance: raw.deployed_balance,
        min_rate: raw.min_rate,
        max_rate: raw.max_rate,
        num_buckets: raw.num_buckets,
        is_active: raw.is_active,
    })
}

async fn fetch_available_balance<R: ReadApi + ?Sized>(
    api: &R,
    pool_id: &str,
    page_size: usize,
) -> Result<u64, ProtocolError> {
    let children = queries::collect_dynamic_fields(api, pool_id, page_size).await?;
    let Some(slot) = children.iter().find(|info| is_available_slot(info)) else {
        tracing::debug!(pool_id, "Pool has no available balance record");
        return Ok(0);
    };

    let balance = match api.get_object(&slot.object_id).await? {
        Some(child) => child.field("value").map(de::value_as_u64).unwrap_or(0),
        None => 0,
    };
    Ok(balance)
}

fn is_available_slot(info: &DynamicFieldInfo) -> bool {
    let key_type = info.name.type_name.to_ascii_lowercase();
    let key_value = match &info.name.value {
        Value::String(s) => s.to_ascii_lowercase(),
        _ => String::new(),
    };
    key_type.contains("available") || key_value.contains("available")
}

// =============================================================================
// Record parsing
// =============================================================================

#[derive(Debug, Deserialize)]
struct RawBook {
    #[serde(default, deserialize_with = "de::u64_lenient")]
    next_order_id: u64,
    #[serde(default)]
    orders: Value,
}

#[derive(Debug, Deserialize)]
struct RawOrder {
    #[serde(default)]
    order_id: Option<Value>,
    #[serde(default, deserialize_with = "de::string_lenient")]
    owner: String,
    #[serde(default)]
    side: Option<Value>,
    #[serde(default, deserialize_with = "de::u64_lenient")]
    amount: u64,
    #[serde(default, deserialize_with = "de::u64_lenient")]
    rate: u64,
    #[serde(default, deserialize_with = "de::u64_lenient")]
    timestamp: u64,
    #[serde(default, deserialize_with = "de::bool_lenient")]
    is_active: bool,
}

#[derive(Debug, Deserialize)]
struct RawPosition {
    #[serde(default, deserialize_with = "de::string_lenient")]
    id: String,
    #[serde(default, deserialize_with = "de::string_lenient")]
    loan_id: String,
    #[serde(default, deserialize_with = "de::u8_lenient")]
    side: u8,
    #[serde(default, deserialize_with = "de::string_lenient")]
    lender: String,
    #[serde(default, deserialize_with = "de::string_lenient")]
    borrower: String,
    #[serde(default, deserialize_with = "de::u64_lenient")]
    principal: u64,
    #[serde(default, deserialize_with = "de::u64_lenient")]
    rate: u64,
    #[serde(default, deserialize_with = "de::u64_lenient")]
    duration: u64,
    #[serde(default, deserialize_with = "de::u64_lenient")]
    collateral_amount: u64,
    #[serde(default, deserialize_with = "de::u64_lenient")]
    start_time: u64,
    #[serde(default, deserialize_with = "de::u64_lenient")]
    maturity_time: u64,
    #[serde(default, deserialize_with = "de::u8_lenient")]
    status: u8,
    #[serde(default, deserialize_with = "de::string_lenient")]
    book_id: String,
}

#[derive(Debug, Deserialize)]
struct RawPool {
    #[serde(default, deserialize_with = "de::string_lenient")]
    admin: String,
    #[serde(default, deserialize_with = "de::string_lenient")]
    book_id: String,
    #[serde(default, deserialize_with = "de::u64_lenient")]
    total_shares: u64,
    #[serde(default, deserialize_with = "de::u64_lenient")]
    deployed_balance: u64,
    #[serde(default, deserialize_with = "de::u64_lenient")]
    min_rate: u64,
    #[serde(default, deserialize_with = "de::u64_lenient")]
    max_rate: u64,
    #[serde(default, deserialize_with = "de::u64_lenient")]
    num_buckets: u64,
    #[serde(default, deserialize_with = "de::bool_lenient")]
    is_active: bool,
    #[serde(default)]
    available: Option<Value>,
    #[serde(default)]
    available_balance: Option<Value>,
}

fn record_error(object_id: &str, message: impl Into<String>) -> ProtocolError {
    ProtocolError::RecordParse {
        object_id: object_id.to_string(),
        message: message.into(),
    }
}

/// Side is the one order field without a safe default.
fn parse_side(value: Option<&Value>) -> Option<OrderSide> {
    let raw = match value? {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    OrderSide::from_u8(u8::try_from(raw).ok()?)
}

/// Parse a table entry: `{ name, value: { fields: { order_id, .. } } }`.
fn parse_order(info: &DynamicFieldInfo, object: &SuiObject) -> Result<Order, ProtocolError> {
    let body = match object.field("value") {
        Some(value) => de::unwrap_struct(value),
        None => &object.fields,
    };
    if !body.is_object() {
        return Err(record_error(&object.object_id, "entry has no struct value"));
    }

    let raw: RawOrder = serde_json::from_value(body.clone())
        .map_err(|e| record_error(&object.object_id, e.to_string()))?;

    let side = parse_side(raw.side.as_ref())
        .ok_or_else(|| record_error(&object.object_id, format!("unknown order side {:?}", raw.side)))?;

    let order_id = match raw.order_id.as_ref() {
        Some(value) => de::value_as_u64(value),
        None => de::value_as_u64(&info.name.value),
    };

    Ok(Order {
        order_id,
        owner: raw.owner,
        side,
        amount: raw.amount,
        rate: raw.rate,
        timestamp: raw.timestamp,
        is_active: raw.is_active,
    })
}

fn parse_position(object: &SuiObject) -> Result<LoanPosition, ProtocolError> {
    if !object.fields.is_object() {
        return Err(record_error(&object.object_id, "object has no content"));
    }
    let raw: RawPosition = serde_json::from_value(object.fields.clone())
        .map_err(|e| record_error(&object.object_id, e.to_string()))?;

    let id = if raw.id.is_empty() {
        object.object_id.clone()
    } else {
        raw.id
    };

    Ok(LoanPosition {
        id,
        loan_id: raw.loan_id,
        side: OrderSide::from_u8(raw.side).unwrap_or(OrderSide::Lend),
        lender: raw.lender,
        borrower: raw.borrower,
        principal: raw.principal,
        rate: raw.rate,
        duration: raw.duration,
        collateral_amount: raw.collateral_amount,
        start_time: raw.start_time,
        maturity_time: raw.maturity_time,
        status: PositionStatus::from_u8(raw.status).unwrap_or_default(),
        book_id: raw.book_id,
    })
}
