//! Payment step route handlers.
//!
//! The page is rendered once per visit; every later interaction posts the
//! billing form to a fragment endpoint and swaps `#payment-form` (HTMX).
//! Requests without `HX-Request` get full pages and plain redirects.
//!
//! Every handler requires a signed-in buyer. The order is fetched and
//! changed with the buyer's own token, and screens are scoped to their
//! sign-in.

use std::collections::HashMap;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use gallery_core::{CountryCode, Order, OrderId};
use secrecy::SecretString;
use tracing::{info, instrument};

use crate::checkout::{AddressField, Clock, PaymentScreen, SubmitOutcome};
use crate::error::{Result, add_breadcrumb};
use crate::middleware::{BuyerSession, RequireBuyer};
use crate::state::{AppState, SharedScreen};
use crate::stripe::CardDetails;

// =============================================================================
// Views
// =============================================================================

/// One text input of the billing form.
#[derive(Clone)]
pub struct FieldView {
    pub key: &'static str,
    pub title: &'static str,
    pub value: String,
    pub error: Option<&'static str>,
}

/// One option of the country select.
#[derive(Clone)]
pub struct CountryOption {
    pub code: String,
    pub name: String,
    pub selected: bool,
}

/// The error dialog.
#[derive(Clone)]
pub struct DialogView {
    pub title: String,
    pub message: String,
}

/// Everything inside `#payment-form`.
#[derive(Clone)]
pub struct PaymentFormView {
    pub order_id: String,
    pub shows_toggle: bool,
    pub same_address: bool,
    pub form_visible: bool,
    pub shipping_lines: Vec<String>,
    pub fields: Vec<FieldView>,
    pub countries: Vec<CountryOption>,
    pub country_error: Option<&'static str>,
    pub inline_error: Option<String>,
    pub dialog: Option<DialogView>,
}

impl From<&PaymentScreen> for PaymentFormView {
    fn from(screen: &PaymentScreen) -> Self {
        let form = screen.billing_form();

        let fields = AddressField::ALL
            .into_iter()
            .filter(|field| *field != AddressField::Country)
            .map(|field| FieldView {
                key: field.key(),
                title: field.title(),
                value: field.value(form).to_string(),
                error: screen.visible_error(field).map(|e| e.message()),
            })
            .collect();

        let selected = form.country.trim().to_ascii_uppercase();
        let mut countries: Vec<CountryOption> = CountryCode::known()
            .map(|(code, name)| CountryOption {
                code: code.to_string(),
                name: name.to_string(),
                selected: code == selected,
            })
            .collect();
        // Keep an unlisted code selectable rather than silently switching it
        if !selected.is_empty() && !countries.iter().any(|c| c.selected) {
            countries.push(CountryOption {
                code: selected.clone(),
                name: selected,
                selected: true,
            });
        }

        Self {
            order_id: screen.order_id().to_string(),
            shows_toggle: screen.shows_same_address_toggle(),
            same_address: screen.same_address_selected(),
            form_visible: screen.billing_form_visible(),
            shipping_lines: screen
                .shipping_address()
                .map(gallery_core::Ship::summary_lines)
                .unwrap_or_default(),
            fields,
            countries,
            country_error: screen
                .visible_error(AddressField::Country)
                .map(|e| e.message()),
            inline_error: screen.inline_error(),
            dialog: screen.error_dialog().map(|d| DialogView {
                title: d.title,
                message: d.message,
            }),
        }
    }
}

/// Order summary shown above the form.
#[derive(Clone)]
pub struct OrderSummaryView {
    pub id: String,
    pub state: String,
    pub countdown: String,
    pub expired: bool,
    pub offer: Option<String>,
}

impl OrderSummaryView {
    fn new(order: &Order, screen: &PaymentScreen, clock: &dyn Clock) -> Self {
        Self {
            id: order.id.to_string(),
            state: order.state.to_string(),
            countdown: screen.countdown(clock),
            expired: screen.is_expired(clock),
            offer: order.last_offer_amount().map(|price| price.display()),
        }
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Payment page template.
#[derive(Template, WebTemplate)]
#[template(path = "payment/show.html")]
pub struct PaymentShowTemplate {
    pub order: OrderSummaryView,
    pub form: PaymentFormView,
}

/// Payment form fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/payment_form.html")]
pub struct PaymentFormTemplate {
    pub form: PaymentFormView,
}

// =============================================================================
// Helpers
// =============================================================================

fn is_htmx(headers: &HeaderMap) -> bool {
    headers
        .get("HX-Request")
        .is_some_and(|value| value.as_bytes() == b"true")
}

fn payment_path(order_id: &OrderId) -> String {
    format!("/orders/{order_id}/payment")
}

/// Send the browser to `path`.
fn navigate(headers: &HeaderMap, path: &str) -> Response {
    if is_htmx(headers) {
        (StatusCode::OK, AppendHeaders([("HX-Redirect", path.to_string())])).into_response()
    } else {
        Redirect::to(path).into_response()
    }
}

/// Render the screen for the request: the form fragment for HTMX, the whole
/// page otherwise.
fn render(state: &AppState, headers: &HeaderMap, order: &Order, screen: &PaymentScreen) -> Response {
    let form = PaymentFormView::from(screen);
    if is_htmx(headers) {
        PaymentFormTemplate { form }.into_response()
    } else {
        PaymentShowTemplate {
            order: OrderSummaryView::new(order, screen, state.clock()),
            form,
        }
        .into_response()
    }
}

/// The buyer's open screen, or a trip back to the page when there is none.
async fn open_screen(
    state: &AppState,
    headers: &HeaderMap,
    buyer: &BuyerSession,
    order_id: &OrderId,
) -> std::result::Result<SharedScreen, Response> {
    match state.screens().get(buyer.key(), order_id).await {
        Some(screen) => Ok(screen),
        None => {
            info!(order_id = %order_id, "payment screen expired");
            Err(navigate(headers, &payment_path(order_id)))
        }
    }
}

/// Copy posted billing fields into the screen.
///
/// Changed fields are touched; so is the field named by `HX-Trigger-Name`
/// (the input that lost focus).
fn apply_fields(screen: &mut PaymentScreen, headers: &HeaderMap, values: &HashMap<String, String>) {
    if !screen.billing_form_visible() {
        return;
    }

    for field in AddressField::ALL {
        if let Some(value) = values.get(field.key())
            && value != field.value(screen.billing_form())
        {
            screen.set_field(field, value.clone());
        }
    }

    if let Some(field) = headers
        .get("HX-Trigger-Name")
        .and_then(|v| v.to_str().ok())
        .and_then(AddressField::from_key)
    {
        screen.touch(field);
    }
}

/// Card fields from the posted form.
fn card_details(values: &HashMap<String, String>) -> CardDetails {
    let value = |key: &str| values.get(key).map(|v| v.trim().to_string()).unwrap_or_default();

    CardDetails {
        number: SecretString::from(value("card_number").replace(' ', "")),
        exp_month: value("card_exp_month"),
        exp_year: value("card_exp_year"),
        cvc: SecretString::from(value("card_cvc")),
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the payment page with a fresh screen.
#[instrument(skip(state, buyer), fields(order_id = %order_id))]
pub async fn show(
    State(state): State<AppState>,
    RequireBuyer(buyer): RequireBuyer,
    Path(order_id): Path<OrderId>,
) -> Result<impl IntoResponse> {
    let order = state
        .exchange()
        .as_buyer(buyer.access_token())
        .fetch_order(&order_id)
        .await?;
    let open = state.screens().open(buyer.key(), &order).await;
    let screen = open.screen.lock().await;

    info!(
        order_id = %order.id,
        state = %order.state,
        fulfillment = ?order.fulfillment_type(),
        "payment page viewed"
    );

    Ok(PaymentShowTemplate {
        order: OrderSummaryView::new(&order, &screen, state.clock()),
        form: PaymentFormView::from(&*screen),
    })
}

/// Flip the same-address toggle (HTMX).
#[instrument(skip(state, buyer, headers), fields(order_id = %order_id))]
pub async fn toggle_same_address(
    State(state): State<AppState>,
    RequireBuyer(buyer): RequireBuyer,
    Path(order_id): Path<OrderId>,
    headers: HeaderMap,
) -> Response {
    let open = match open_screen(&state, &headers, &buyer, &order_id).await {
        Ok(open) => open,
        Err(response) => return response,
    };
    let mut screen = open.screen.lock().await;

    if screen.toggle_same_address() {
        add_breadcrumb(
            "checkout",
            "Toggled billing address",
            Some(&[(
                "same_address",
                if screen.same_address_selected() { "true" } else { "false" },
            )]),
        );
    }

    render(&state, &headers, &open.order, &screen)
}

/// Apply billing field edits (HTMX, on blur/change).
#[instrument(skip(state, buyer, headers, values), fields(order_id = %order_id))]
pub async fn update_fields(
    State(state): State<AppState>,
    RequireBuyer(buyer): RequireBuyer,
    Path(order_id): Path<OrderId>,
    headers: HeaderMap,
    Form(values): Form<HashMap<String, String>>,
) -> Response {
    let open = match open_screen(&state, &headers, &buyer, &order_id).await {
        Ok(open) => open,
        Err(response) => return response,
    };
    let mut screen = open.screen.lock().await;

    apply_fields(&mut screen, &headers, &values);
    render(&state, &headers, &open.order, &screen)
}

/// Submit the payment.
///
/// A submit arriving while another one on the same screen is still running
/// is dropped with `204 No Content`.
#[instrument(skip(state, buyer, headers, values), fields(order_id = %order_id))]
pub async fn submit(
    State(state): State<AppState>,
    RequireBuyer(buyer): RequireBuyer,
    Path(order_id): Path<OrderId>,
    headers: HeaderMap,
    Form(values): Form<HashMap<String, String>>,
) -> Response {
    let open = match open_screen(&state, &headers, &buyer, &order_id).await {
        Ok(open) => open,
        Err(response) => return response,
    };
    let Ok(mut screen) = open.screen.try_lock() else {
        info!("submit ignored while another is in flight");
        return StatusCode::NO_CONTENT.into_response();
    };

    apply_fields(&mut screen, &headers, &values);
    add_breadcrumb("checkout", "Submitted payment", Some(&[("order_id", order_id.as_str())]));

    let tokenizer = state.stripe().tokenizer(card_details(&values));
    let exchange = state.exchange().as_buyer(buyer.access_token());
    let outcome = screen.submit(&tokenizer, &exchange).await;

    match outcome {
        SubmitOutcome::Redirect(path) => {
            info!(redirect = %path, "payment attached");
            navigate(&headers, &path)
        }
        SubmitOutcome::Blocked
        | SubmitOutcome::InvalidCard { .. }
        | SubmitOutcome::Fatal(_)
        | SubmitOutcome::Ignored => render(&state, &headers, &open.order, &screen),
    }
}

/// Close the error dialog (HTMX).
#[instrument(skip(state, buyer, headers), fields(order_id = %order_id))]
pub async fn dismiss_error(
    State(state): State<AppState>,
    RequireBuyer(buyer): RequireBuyer,
    Path(order_id): Path<OrderId>,
    headers: HeaderMap,
) -> Response {
    let open = match open_screen(&state, &headers, &buyer, &order_id).await {
        Ok(open) => open,
        Err(response) => return response,
    };
    let mut screen = open.screen.lock().await;

    screen.dismiss_error();
    render(&state, &headers, &open.order, &screen)
}
