//! Payload normalization.
//!
//! Provider payloads are loosely shaped: the same fact can live under
//! `data`, under `object`, nested inside a `subscription` object, or at the
//! top level, depending on event type and provider version. Each extractor
//! here walks a fixed candidate chain and takes the first usable value.
//! Chain order is part of the contract; reordering changes which value wins
//! when a payload carries several.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use super::event_type::EventType;
use super::models::{IdentityHints, InvoiceSnapshot, SubscriptionPatch};
use super::plan::Plan;
use super::webhook_errors::WebhookError;

/// A webhook payload reduced to canonical facts.
#[derive(Debug, Clone)]
pub struct NormalizedEvent {
    pub event_type: EventType,
    pub provider_event_id: Option<String>,
    pub subscription: SubscriptionPatch,
    pub invoice: Option<InvoiceSnapshot>,
    pub identity: IdentityHints,
}

/// Normalizes a parsed payload.
///
/// Fails only when the payload is not a JSON object; missing fields
/// degrade to `None`, never to an error.
pub fn normalize(payload: &Value) -> Result<NormalizedEvent, WebhookError> {
    if !payload.is_object() {
        return Err(WebhookError::MalformedPayload(
            "payload is not a JSON object".into(),
        ));
    }

    let event_type = extract_event_type(payload)
        .map(|raw| EventType::parse(&raw))
        .unwrap_or(EventType::Unknown);

    Ok(NormalizedEvent {
        event_type,
        provider_event_id: string_at(payload, &["id"]),
        subscription: extract_subscription_patch(payload, event_type),
        invoice: extract_invoice(payload, event_type),
        identity: extract_identity(payload),
    })
}

/// Raw event type string, wherever the provider put it.
pub fn extract_event_type(payload: &Value) -> Option<String> {
    first_string(
        payload,
        &[
            &["type"],
            &["event"],
            &["eventType"],
            &["data", "type"],
            &["data", "event"],
            &["data", "eventType"],
            &["object", "type"],
            &["object", "event"],
            &["object", "eventType"],
        ],
    )
}

/// Extracts subscription state from the payload.
pub fn extract_subscription_patch(payload: &Value, event_type: EventType) -> SubscriptionPatch {
    let sub = embedded_subscription(payload, event_type);

    SubscriptionPatch {
        subscription_id: extract_subscription_id(payload, event_type),
        customer_id: extract_customer_id(payload, event_type),
        plan: extract_plan(payload, sub, event_type),
        status: extract_status(payload, sub),
        current_period_end: extract_current_period_end(payload, sub),
    }
}

/// The subscription object carried by the payload.
///
/// A nested `data.subscription`/`object.subscription` always wins. For
/// subscription lifecycle events the provider's primary shape makes
/// `data`/`object` the subscription entity itself, so those fall back to
/// the envelope; its `id` is then the provider subscription id.
fn embedded_subscription(payload: &Value, event_type: EventType) -> Option<&Value> {
    let nested = [&["data", "subscription"][..], &["object", "subscription"][..]]
        .iter()
        .filter_map(|path| value_at(payload, path))
        .find(|v| v.is_object());
    if nested.is_some() || !event_type.is_subscription_lifecycle() {
        return nested;
    }
    [&["data"][..], &["object"][..]]
        .iter()
        .filter_map(|path| value_at(payload, path))
        .find(|v| v.is_object())
}

fn extract_plan(payload: &Value, sub: Option<&Value>, event_type: EventType) -> Option<Plan> {
    // Checkout payloads carry the chosen plan in metadata, which outranks
    // whatever the product record says.
    let from_field = if event_type == EventType::CheckoutCompleted && sub.is_none() {
        first_string(
            payload,
            &[
                &["data", "metadata", "plan"],
                &["metadata", "plan"],
                &["data", "product", "plan"],
                &["object", "product", "plan"],
            ],
        )
    } else {
        sub.and_then(|s| first_string(s, &[&["plan"], &["product", "plan"]]))
            .or_else(|| {
                first_string(
                    payload,
                    &[
                        &["data", "product", "plan"],
                        &["object", "product", "plan"],
                        &["data", "plan"],
                        &["data", "metadata", "plan"],
                    ],
                )
            })
    };

    // Fallback: infer from the product name. "team" beats "pro" so a
    // product called "Pro Team Plan" lands on the team tier.
    from_field.and_then(|raw| Plan::parse(&raw)).or_else(|| {
        first_string(
            payload,
            &[&["object", "product", "name"], &["data", "product", "name"]],
        )
        .and_then(|name| Plan::infer_from_product_name(&name))
    })
}

fn extract_status(payload: &Value, sub: Option<&Value>) -> Option<String> {
    sub.and_then(|s| string_at(s, &["status"]))
        .or_else(|| {
            first_string(
                payload,
                &[
                    &["data", "subscription", "status"],
                    &["data", "status"],
                    &["object", "subscription", "status"],
                    &["object", "status"],
                ],
            )
        })
        .map(|s| s.to_ascii_lowercase())
}

fn extract_current_period_end(payload: &Value, sub: Option<&Value>) -> Option<DateTime<Utc>> {
    sub.and_then(|s| first_timestamp(s, &[&["current_period_end"], &["period_end"]]))
        .or_else(|| {
            first_timestamp(
                payload,
                &[
                    &["data", "subscription", "current_period_end"],
                    &["data", "current_period_end"],
                    &["object", "subscription", "current_period_end"],
                    &["object", "subscription", "current_period_end_date"],
                    &["object", "current_period_end"],
                ],
            )
        })
}

/// Provider customer id. Several shapes occur: a bare string, an object
/// with an `id`, or an id buried in an order or subscription.
pub fn extract_customer_id(payload: &Value, event_type: EventType) -> Option<String> {
    if let Some(sub) = embedded_subscription(payload, event_type) {
        if let Some(id) = first_string(sub, &[&["customer"], &["customer_id"]]) {
            return Some(id);
        }
    }
    first_string(
        payload,
        &[
            &["data", "customer"],
            &["data", "customer_id"],
            &["data", "customer", "id"],
            &["object", "customer"],
            &["object", "customer", "id"],
            &["object", "order", "customer"],
            &["object", "subscription", "customer"],
        ],
    )
}

/// Provider subscription id, as a bare string or an object id.
pub fn extract_subscription_id(payload: &Value, event_type: EventType) -> Option<String> {
    if let Some(sub) = embedded_subscription(payload, event_type) {
        if let Some(id) = string_at(sub, &["id"]) {
            return Some(id);
        }
    }
    first_string(
        payload,
        &[
            &["data", "subscription"],
            &["data", "subscription", "id"],
            &["object", "subscription"],
            &["object", "subscription", "id"],
        ],
    )
}

/// Identity hints. The metadata user id chain is checked in full before
/// any email candidate is considered.
pub fn extract_identity(payload: &Value) -> IdentityHints {
    let metadata_user_id = first_string(
        payload,
        &[
            &["data", "metadata", "user_id"],
            &["metadata", "user_id"],
            &["object", "metadata", "user_id"],
        ],
    );

    let mut email_candidates = Vec::new();
    for path in [
        &["data", "customer", "email"][..],
        &["data", "customer_email"][..],
        &["customer", "email"][..],
        &["object", "customer", "email"][..],
        &["data", "metadata", "email"][..],
        &["metadata", "email"][..],
        &["object", "metadata", "email"][..],
    ] {
        if let Some(email) = string_at(payload, path) {
            let lowered = email.to_ascii_lowercase();
            if !email_candidates.contains(&lowered) {
                email_candidates.push(lowered);
            }
        }
    }

    IdentityHints {
        metadata_user_id,
        email_candidates,
    }
}

/// Extracts an invoice snapshot when the event carries billing-history
/// data. Checkout and order completions synthesize one from the order so
/// one-off purchases still show up.
pub fn extract_invoice(payload: &Value, event_type: EventType) -> Option<InvoiceSnapshot> {
    let synthesized = matches!(
        event_type,
        EventType::CheckoutCompleted | EventType::OrderCompleted
    );
    if !event_type.affects_invoice() && !synthesized {
        return None;
    }

    let invoice_id = if synthesized {
        first_string(
            payload,
            &[
                &["data", "order", "id"],
                &["object", "order", "id"],
                &["data", "order"],
                &["object", "order"],
                &["data", "id"],
                &["object", "id"],
            ],
        )?
    } else {
        first_string(
            payload,
            &[
                &["data", "invoice_id"],
                &["data", "invoice", "id"],
                &["object", "invoice_id"],
                &["object", "invoice", "id"],
                &["data", "id"],
                &["object", "id"],
            ],
        )?
    };

    let status = first_string(payload, &[&["data", "status"], &["object", "status"]])
        .map(|s| s.to_ascii_lowercase())
        .unwrap_or_else(|| default_invoice_status(event_type).to_string());

    let amount = extract_amount(payload);

    let raw = value_at(payload, &["data"])
        .filter(|v| v.is_object())
        .or_else(|| value_at(payload, &["object"]).filter(|v| v.is_object()))
        .cloned()
        .unwrap_or_else(|| payload.clone());

    Some(InvoiceSnapshot {
        invoice_id,
        customer_id: extract_customer_id(payload, event_type),
        subscription_id: extract_subscription_id(payload, event_type),
        status,
        currency: first_string(payload, &[&["data", "currency"], &["object", "currency"]]),
        amount,
        hosted_url: first_string(
            payload,
            &[
                &["data", "hosted_invoice_url"],
                &["data", "invoice_url"],
                &["data", "hosted_url"],
                &["data", "url"],
                &["object", "hosted_invoice_url"],
                &["object", "invoice_url"],
                &["object", "hosted_url"],
                &["object", "url"],
            ],
        ),
        issued_at: first_timestamp(
            payload,
            &[
                &["data", "created_at"],
                &["data", "created"],
                &["data", "issued_at"],
                &["object", "created_at"],
                &["object", "created"],
                &["object", "issued_at"],
            ],
        ),
        paid_at: first_timestamp(payload, &[&["data", "paid_at"], &["object", "paid_at"]]),
        period_start: first_timestamp(
            payload,
            &[&["data", "period_start"], &["object", "period_start"]],
        ),
        period_end: first_timestamp(
            payload,
            &[&["data", "period_end"], &["object", "period_end"]],
        ),
        raw,
    })
}

fn default_invoice_status(event_type: EventType) -> &'static str {
    match event_type {
        EventType::PaymentFailed => "failed",
        EventType::PaymentSucceeded | EventType::CheckoutCompleted | EventType::OrderCompleted => {
            "paid"
        }
        _ => "open",
    }
}

/// Amount in minor units. Accepts integers, floats (rounded), and numeric
/// strings, under any of the provider's amount field names.
fn extract_amount(payload: &Value) -> Option<i64> {
    for field in ["total", "amount_due", "amount", "amount_paid"] {
        for scope in ["data", "object"] {
            if let Some(v) = value_at(payload, &[scope, field]) {
                if let Some(n) = numeric(v) {
                    return Some(n.round() as i64);
                }
            }
        }
    }
    None
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Parses a timestamp the provider may send as RFC 3339, epoch seconds,
/// or epoch milliseconds.
pub fn parse_flexible_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            s.parse::<i64>().ok().and_then(epoch_to_datetime)
        }
        Value::Number(n) => n
            .as_f64()
            .map(|f| f.round() as i64)
            .and_then(epoch_to_datetime),
        _ => None,
    }
}

fn epoch_to_datetime(epoch: i64) -> Option<DateTime<Utc>> {
    // Anything past ~5138 AD in seconds is assumed to be milliseconds.
    if epoch >= 100_000_000_000 {
        Utc.timestamp_millis_opt(epoch).single()
    } else {
        Utc.timestamp_opt(epoch, 0).single()
    }
}

fn value_at<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = root;
    for segment in path {
        current = current.get(segment)?;
    }
    Some(current)
}

fn string_at(root: &Value, path: &[&str]) -> Option<String> {
    value_at(root, path)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn first_string(root: &Value, paths: &[&[&str]]) -> Option<String> {
    paths.iter().find_map(|path| string_at(root, path))
}

fn first_timestamp(root: &Value, paths: &[&[&str]]) -> Option<DateTime<Utc>> {
    paths
        .iter()
        .filter_map(|path| value_at(root, path))
        .find_map(parse_flexible_timestamp)
}
