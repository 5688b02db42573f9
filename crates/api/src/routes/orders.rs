//! Order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{Decimal, NewOrder, Order, OrderId, OrderStatus};
use domain::{EventPublisher, OrderService};
use order_store::OrderStore;
use serde::{Deserialize, Deserializer};
use serde_json::value::RawValue;

use crate::error::ApiError;

/// Lifecycle service over the store and publisher chosen at startup.
pub type AppOrderService = OrderService<Arc<dyn OrderStore>, Arc<dyn EventPublisher>>;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub order_service: AppOrderService,
}

/// Decimal places a stored price keeps.
const PRICE_SCALE: u32 = 2;

/// Prices must stay below this; the store holds at most ten integer digits.
const PRICE_LIMIT: i64 = 10_000_000_000;

// -- Request types --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub product_name: String,
    pub quantity: Option<i64>,
    #[serde(default, deserialize_with = "exact_price")]
    pub price: Option<Decimal>,
}

/// Reads a price written either as a JSON string or a JSON number, from its
/// literal text so numbers never pass through a float.
fn exact_price<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Decimal>, D::Error> {
    let Some(raw) = Option::<Box<RawValue>>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let text = raw.get().trim();
    let text = text
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text);

    Decimal::from_str_exact(text)
        .or_else(|_| Decimal::from_scientific(text))
        .map(Some)
        .map_err(|e| serde::de::Error::custom(format!("invalid price '{text}': {e}")))
}

impl CreateOrderRequest {
    /// Checks the request and turns it into a [`NewOrder`].
    pub fn validate(self) -> Result<NewOrder, ApiError> {
        let customer_name = self.customer_name.trim();
        if customer_name.is_empty() {
            return Err(ApiError::BadRequest("customerName must not be blank".to_string()));
        }
        let product_name = self.product_name.trim();
        if product_name.is_empty() {
            return Err(ApiError::BadRequest("productName must not be blank".to_string()));
        }

        let quantity = self
            .quantity
            .ok_or_else(|| ApiError::BadRequest("quantity is required".to_string()))?;
        let quantity = u32::try_from(quantity)
            .ok()
            .filter(|q| *q >= 1)
            .ok_or_else(|| {
                ApiError::BadRequest(format!("quantity must be at least 1, got {quantity}"))
            })?;

        let price = self
            .price
            .ok_or_else(|| ApiError::BadRequest("price is required".to_string()))?;
        if price.is_sign_negative() && !price.is_zero() {
            return Err(ApiError::BadRequest(format!(
                "price must not be negative, got {price}"
            )));
        }
        if price.normalize().scale() > PRICE_SCALE {
            return Err(ApiError::BadRequest(format!(
                "price must have at most {PRICE_SCALE} decimal places, got {price}"
            )));
        }
        if price >= Decimal::from(PRICE_LIMIT) {
            return Err(ApiError::BadRequest(format!(
                "price must be less than {PRICE_LIMIT}, got {price}"
            )));
        }

        let price = price.round_dp(PRICE_SCALE);

        Ok(NewOrder::new(customer_name, product_name, quantity, price))
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusParam {
    pub status: String,
}

// -- Handlers --

/// POST /api/orders: create a new order.
#[tracing::instrument(skip(state, payload))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let new_order = req.validate()?;

    let order = state.order_service.create_order(new_order).await?;

    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /api/orders: list every order.
#[tracing::instrument(skip(state))]
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(state.order_service.list_orders().await?))
}

/// GET /api/orders/{id}: load one order.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let id = parse_order_id(&id)?;
    Ok(Json(state.order_service.get_order(id).await?))
}

/// GET /api/orders/status/{status}: list orders in a status (case-insensitive).
#[tracing::instrument(skip(state))]
pub async fn by_status(
    State(state): State<Arc<AppState>>,
    Path(status): Path<String>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let status = parse_status(&status)?;
    Ok(Json(state.order_service.list_by_status(status).await?))
}

/// GET /api/orders/customer/{customer_name}: list a customer's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn by_customer(
    State(state): State<Arc<AppState>>,
    Path(customer_name): Path<String>,
) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(
        state.order_service.list_by_customer(&customer_name).await?,
    ))
}

/// PATCH /api/orders/{id}/status?status=...: set an order's status directly.
#[tracing::instrument(skip(state))]
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(param): Query<StatusParam>,
) -> Result<Json<Order>, ApiError> {
    let id = parse_order_id(&id)?;
    let status = parse_status(&param.status)?;

    let order = state.order_service.update_order_status(id, status).await?;

    Ok(Json(order))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    id.parse::<OrderId>()
        .map_err(|e| ApiError::BadRequest(format!("Invalid order id '{id}': {e}")))
}

fn parse_status(status: &str) -> Result<OrderStatus, ApiError> {
    status
        .parse::<OrderStatus>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn request(quantity: Option<i64>, price: Option<&str>) -> CreateOrderRequest {
        CreateOrderRequest {
            customer_name: "John Doe".to_string(),
            product_name: "Laptop".to_string(),
            quantity,
            price: price.map(|p| Decimal::from_str(p).unwrap()),
        }
    }

    #[test]
    fn valid_request_becomes_new_order() {
        let order = request(Some(2), Some("999.99")).validate().unwrap();
        assert_eq!(order.customer_name, "John Doe");
        assert_eq!(order.quantity, 2);
        assert_eq!(order.price, Decimal::from_str("999.99").unwrap());
    }

    #[test]
    fn zero_price_is_allowed() {
        assert!(request(Some(1), Some("0.00")).validate().is_ok());
    }

    #[test]
    fn price_must_fit_two_decimal_places() {
        assert!(matches!(
            request(Some(1), Some("1.999")).validate(),
            Err(ApiError::BadRequest(_))
        ));

        // Trailing zeros don't count
        let order = request(Some(1), Some("1.500")).validate().unwrap();
        assert_eq!(order.price.to_string(), "1.50");
    }

    #[test]
    fn price_must_fit_ten_integer_digits() {
        assert!(request(Some(1), Some("9999999999.99")).validate().is_ok());
        assert!(matches!(
            request(Some(1), Some("10000000000")).validate(),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn numeric_price_is_read_exactly() {
        let body = r#"{"customerName":"A","productName":"B","quantity":1,"price":0.1}"#;
        let req: CreateOrderRequest = serde_json::from_str(body).unwrap();
        assert_eq!(req.price, Some(Decimal::from_str("0.1").unwrap()));

        let body = r#"{"customerName":"A","productName":"B","quantity":1,"price":1.999999999999999999}"#;
        let req: CreateOrderRequest = serde_json::from_str(body).unwrap();
        assert_eq!(
            req.price,
            Some(Decimal::from_str("1.999999999999999999").unwrap())
        );
    }

    #[test]
    fn price_accepts_strings_exponents_and_null() {
        let parse = |price: &str| {
            let body = format!(r#"{{"customerName":"A","productName":"B","quantity":1,"price":{price}}}"#);
            serde_json::from_str::<CreateOrderRequest>(&body).map(|r| r.price)
        };

        assert_eq!(parse(r#""19.99""#).unwrap(), Some(Decimal::from_str("19.99").unwrap()));
        assert_eq!(parse("1.5e2").unwrap(), Some(Decimal::from(150)));
        assert_eq!(parse("null").unwrap(), None);
        assert!(parse(r#""abc""#).is_err());
        assert!(parse("true").is_err());
    }

    #[test]
    fn invalid_requests_are_rejected() {
        let cases = [
            request(Some(0), Some("1")),
            request(Some(-3), Some("1")),
            request(None, Some("1")),
            request(Some(1), Some("-0.01")),
            request(Some(1), None),
            CreateOrderRequest {
                customer_name: "   ".to_string(),
                ..request(Some(1), Some("1"))
            },
            CreateOrderRequest {
                product_name: String::new(),
                ..request(Some(1), Some("1"))
            },
        ];

        for case in cases {
            assert!(matches!(case.validate(), Err(ApiError::BadRequest(_))));
        }
    }

    #[test]
    fn status_parsing_ignores_case() {
        assert_eq!(parse_status("pending").unwrap(), OrderStatus::Pending);
        assert_eq!(parse_status("Completed").unwrap(), OrderStatus::Completed);
        assert!(matches!(parse_status("shipped"), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn order_id_must_be_numeric() {
        assert_eq!(parse_order_id("12").unwrap(), OrderId::new(12));
        assert!(matches!(parse_order_id("abc"), Err(ApiError::BadRequest(_))));
    }
}
